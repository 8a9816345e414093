//! The sync gateway: talking to the remote spreadsheet.
//!
//! The remote is reached through the `Remote` trait. `WebhookRemote` posts to a spreadsheet
//! script endpoint over HTTP. `TestRemote` keeps the remote's data in process memory so that the
//! whole program can be run, top to bottom, without a network.
//!
//! On top of `Remote`, `SyncGateway` pushes and pulls whole datasets and records when the last
//! push happened, and `SyncScheduler` decides when pushes happen.

mod gateway;
mod scheduler;
mod test_remote;
mod webhook;

pub use gateway::{SyncGateway, SyncOutcome};
pub use scheduler::{SyncScheduler, SyncStatus, DEFAULT_DEBOUNCE, DEFAULT_INTERVAL};
pub use test_remote::{TestRemote, TestRemoteState};
pub use webhook::WebhookRemote;

use crate::error::Res;
use crate::model::{Categories, Dataset, Transaction, Transactions};
use crate::{Error, ErrorType, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// When set to a non-empty value, the in-process `TestRemote` is used instead of the network.
pub const TEST_MODE_ENV: &str = "FINTRACK_SYNC_IN_TEST_MODE";

/// Which `Remote` implementation to use.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Webhook,
    Test,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    /// `Mode::Test` if `FINTRACK_SYNC_IN_TEST_MODE` is set and non-empty, otherwise
    /// `Mode::Webhook`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Webhook,
        }
    }
}

/// The remote spreadsheet, as seen by the sync gateway.
#[async_trait::async_trait]
pub trait Remote: Send + Sync {
    /// Sends the whole dataset. The remote replaces what it had.
    async fn push(&self, payload: &SyncPayload) -> anyhow::Result<()>;

    /// Fetches the whole dataset that the remote holds.
    async fn pull(&self) -> anyhow::Result<Dataset>;
}

/// Creates the `Remote` for `config` according to `mode`.
pub fn remote(config: &RemoteConfig, mode: Mode) -> Result<Arc<dyn Remote>> {
    match mode {
        Mode::Test => Ok(Arc::new(TestRemote::new(config.webhook_url()))),
        Mode::Webhook => Ok(Arc::new(WebhookRemote::new(config.url()?)?)),
    }
}

/// Where and how to reach the remote spreadsheet.
///
/// Only `webhook_url` is used for syncing. The other fields identify the spreadsheet and its API
/// credentials, and are kept so they can be shown and exported.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    webhook_url: String,
    #[serde(default)]
    spreadsheet_id: String,
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    client_id: String,
}

impl RemoteConfig {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            ..Default::default()
        }
    }

    pub fn with_spreadsheet_id(mut self, spreadsheet_id: impl Into<String>) -> Self {
        self.spreadsheet_id = spreadsheet_id.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Parses the webhook URL.
    ///
    /// # Errors
    /// - `Validation` unless the URL is a valid `http` or `https` URL.
    pub fn url(&self) -> Result<Url> {
        let url = Url::parse(self.webhook_url.trim()).map_err(|e| {
            Error::validation(format!("Invalid webhook URL '{}': {e}", self.webhook_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::validation(format!(
                "The webhook URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        Ok(url)
    }
}

/// Extracts the spreadsheet id from a Google Sheets URL such as
/// `https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/edit`. Returns an empty string if the
/// URL is empty.
pub fn extract_spreadsheet_id(url: &str) -> Result<&str> {
    if url.is_empty() {
        return Ok(url);
    }
    let mut parts = url.split('/');
    while let Some(part) = parts.next() {
        if part == "d" {
            if let Some(id_part) = parts.next() {
                let id = id_part
                    .split(['?', '#'])
                    .next()
                    .unwrap_or(id_part);
                if !id.is_empty() {
                    return Ok(id);
                }
            }
        }
    }
    Err(Error::msg(
        ErrorType::Validation,
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID",
    ))
}

/// What a push sends: every transaction with its category name resolved, plus both category
/// groups.
#[derive(Debug, Clone, Serialize)]
pub struct SyncPayload {
    action: &'static str,
    transactions: Vec<PayloadTransaction>,
    categories: Categories,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayloadTransaction {
    #[serde(flatten)]
    transaction: Transaction,
    /// Empty when the category does not resolve.
    category_name: String,
}

impl SyncPayload {
    pub fn new(dataset: &Dataset) -> Self {
        let transactions = dataset
            .transactions
            .list()
            .iter()
            .map(|t| PayloadTransaction {
                category_name: t
                    .category_id()
                    .and_then(|id| dataset.categories.find(id))
                    .map(|c| c.name().to_string())
                    .unwrap_or_default(),
                transaction: t.clone(),
            })
            .collect();
        Self {
            action: "sync",
            transactions,
            categories: dataset.categories.clone(),
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// The dataset this payload was built from.
    pub fn to_dataset(&self) -> Dataset {
        Dataset::new(
            self.transactions
                .iter()
                .map(|t| t.transaction.clone())
                .collect(),
            self.categories.clone(),
        )
    }
}

/// The body of a request asking the remote for its data.
#[derive(Debug, Clone, Serialize)]
struct ImportRequest {
    action: &'static str,
}

impl Default for ImportRequest {
    fn default() -> Self {
        Self { action: "import" }
    }
}

/// What the remote script answers with.
#[derive(Debug, Clone, Deserialize)]
struct RemoteResponse {
    success: bool,
    #[serde(default)]
    transactions: Option<Transactions>,
    #[serde(default)]
    categories: Option<Categories>,
    #[serde(default)]
    error: Option<String>,
}

impl RemoteResponse {
    /// Turns `success: false` into an error carrying the remote's message.
    fn check(&self) -> Res<()> {
        if self.success {
            return Ok(());
        }
        anyhow::bail!(
            "The remote reported an error: {}",
            self.error.as_deref().unwrap_or("no details given")
        )
    }

    fn into_dataset(self) -> Res<Dataset> {
        self.check()?;
        let Some(transactions) = self.transactions else {
            anyhow::bail!("The remote response has no transactions");
        };
        Ok(Dataset::new(
            transactions,
            self.categories.unwrap_or_else(Categories::defaults),
        ))
    }
}
