//! Command handlers for the fintrack CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod categories;
mod init;
mod remote;
mod report;
mod sync;
mod transactions;
mod transfer;

use crate::api::{self, Mode, SyncGateway, SyncScheduler};
use crate::app::App;
use crate::args::CategoryRef;
use crate::error::ErrorType;
use crate::model::{Categories, CategoryId, Kind};
use crate::{Config, Error, Result};
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info, warn};

pub use categories::{category_add, category_delete, category_list};
pub use init::init;
pub use remote::{remote_set, remote_show, RemoteInfo};
pub use report::{report_balance, report_dashboard, report_top, report_yearly, Dashboard};
pub use sync::{sync_auto, sync_down, sync_status, sync_up};
pub use transactions::{tx_add, tx_delete, tx_edit, tx_list};
pub use transfer::{clear, export, import};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Builds the sync gateway from the saved remote settings. Returns `None` if no remote has been
/// set.
async fn gateway(config: &Config, mode: Mode) -> Result<Option<SyncGateway>> {
    let persistence = config.persistence();
    let Some(remote_config) = persistence.remote_config().await? else {
        return Ok(None);
    };
    let remote = api::remote(&remote_config, mode)?;
    Ok(Some(SyncGateway::new(remote, persistence)))
}

/// Like `gateway`, but a missing remote is an error.
async fn require_gateway(config: &Config, mode: Mode) -> Result<SyncGateway> {
    gateway(config, mode).await?.ok_or_else(|| {
        Error::msg(
            ErrorType::Config,
            "No remote endpoint is set, run 'fintrack remote set'",
        )
    })
}

/// Opens the app with backups enabled and, when a remote is set and sync-on-change is enabled, a
/// scheduler that pushes after each change.
async fn open_app(config: &Config, mode: Mode) -> Result<App> {
    let (app, warnings) = App::open(config.persistence()).await?;
    for warning in &warnings {
        warn!("{warning}");
    }
    let app = app.with_backup(config.backup());

    let settings = config.sync();
    if !settings.push_on_change() {
        return Ok(app);
    }
    Ok(match gateway(config, mode).await? {
        Some(gateway) => app.with_scheduler(SyncScheduler::new(
            gateway,
            settings.debounce(),
            settings.interval(),
        )),
        None => app,
    })
}

/// Sends the push that the last change scheduled, instead of waiting for the debounce delay. The
/// CLI exits right after a command, so without this the push would be dropped. A failed push is
/// only logged: the change is already saved locally.
async fn finish(app: App) {
    match app.finish().await {
        Some(outcome) if !outcome.is_synced() => {
            warn!("The change was saved locally but could not be pushed to the remote")
        }
        Some(_) => debug!("The change was pushed to the remote"),
        None => {}
    }
}

/// Resolves a category given by id or name within `group`.
fn resolve_category(
    categories: &Categories,
    group: Kind,
    category: &CategoryRef,
) -> Result<CategoryId> {
    match category {
        CategoryRef::Id(id) => Ok(*id),
        CategoryRef::Name(name) => categories
            .find_by_name(group, name)
            .map(|c| c.id())
            .ok_or_else(|| {
                Error::not_found(format!("There is no {group} category named '{name}'"))
            }),
    }
}

/// Resolves a category given by id or name in either group. Used by filters, which are not tied
/// to a group.
fn resolve_any_category(categories: &Categories, category: &CategoryRef) -> Result<CategoryId> {
    match category {
        CategoryRef::Id(id) => Ok(*id),
        CategoryRef::Name(_) => Kind::ALL
            .into_iter()
            .find_map(|group| resolve_category(categories, group, category).ok())
            .ok_or_else(|| Error::not_found(format!("There is no category named {category}"))),
    }
}
