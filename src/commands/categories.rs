//! Category command handlers.

use crate::api::Mode;
use crate::app::{Action, Applied};
use crate::args::{CategoryAddArgs, CategoryDeleteArgs, CategoryListArgs};
use crate::commands::{finish, open_app, resolve_category, Out};
use crate::model::{Category, CategoryDraft, Kind};
use crate::{Config, Error, ErrorType, Result};
use serde::Serialize;
use tracing::warn;

/// A category together with the group it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct GroupedCategory {
    pub group: Kind,
    #[serde(flatten)]
    pub category: Category,
}

/// Creates a category. Empty icon and color get the defaults.
///
/// # Errors
/// - `Validation` if the name is empty.
pub async fn category_add(
    config: Config,
    mode: Mode,
    args: CategoryAddArgs,
) -> Result<Out<GroupedCategory>> {
    let mut app = open_app(&config, mode).await?;
    let draft = CategoryDraft::new(args.name())
        .with_icon(args.icon())
        .with_color(args.color());
    let applied = app
        .apply(Action::AddCategory {
            group: args.group(),
            draft,
        })
        .await?;
    finish(app).await;
    match applied {
        Applied::CategoryAdded { group, category } => Ok(Out::new(
            format!(
                "Added {group} category '{}' with id {}",
                category.name(),
                category.id()
            ),
            GroupedCategory { group, category },
        )),
        other => Err(Error::msg(
            ErrorType::Internal,
            format!("Unexpected result from the ledger: {other:?}"),
        )),
    }
}

/// Deletes a category that no transaction uses.
///
/// # Errors
/// - `Conflict` if a transaction uses the category.
/// - `NotFound` if the group has no such category.
pub async fn category_delete(
    config: Config,
    mode: Mode,
    args: CategoryDeleteArgs,
) -> Result<Out<GroupedCategory>> {
    let mut app = open_app(&config, mode).await?;
    let id = resolve_category(&app.dataset().categories, args.group(), args.category())?;
    let applied = app
        .apply(Action::DeleteCategory {
            group: args.group(),
            id,
        })
        .await?;
    finish(app).await;
    match applied {
        Applied::CategoryDeleted { group, category } => Ok(Out::new(
            format!("Deleted {group} category '{}'", category.name()),
            GroupedCategory { group, category },
        )),
        other => Err(Error::msg(
            ErrorType::Internal,
            format!("Unexpected result from the ledger: {other:?}"),
        )),
    }
}

/// Lists categories in insertion order, income first.
pub async fn category_list(
    config: Config,
    args: CategoryListArgs,
) -> Result<Out<Vec<GroupedCategory>>> {
    let loaded = config.persistence().load().await?;
    for warning in &loaded.warnings {
        warn!("{warning}");
    }
    let categories: Vec<GroupedCategory> = loaded
        .dataset
        .categories
        .iter()
        .filter(|(group, _)| args.group().is_none_or(|g| g == *group))
        .map(|(group, category)| GroupedCategory {
            group,
            category: category.clone(),
        })
        .collect();

    let message = categories
        .iter()
        .map(|c| {
            format!(
                "{:<8} {:>14}  {:<16} {} {}",
                c.group,
                c.category.id(),
                c.category.name(),
                c.category.icon(),
                c.category.color()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    Ok(Out::new(message, categories))
}
