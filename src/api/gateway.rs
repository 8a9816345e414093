use crate::api::{Remote, SyncPayload};
use crate::error::{ErrorType, IntoResult};
use crate::model::Dataset;
use crate::store::Persistence;
use crate::{Error, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// The result of a push. A failed push is an outcome, not an error: local data is never affected
/// by it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced {
        at: DateTime<Utc>,
        transactions: usize,
    },
    Failed {
        reason: String,
    },
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced { .. })
    }
}

/// Pushes and pulls whole datasets, and remembers when the last successful push happened.
#[derive(Clone)]
pub struct SyncGateway {
    remote: Arc<dyn Remote>,
    persistence: Persistence,
}

impl std::fmt::Debug for SyncGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncGateway")
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}

impl SyncGateway {
    pub fn new(remote: Arc<dyn Remote>, persistence: Persistence) -> Self {
        Self {
            remote,
            persistence,
        }
    }

    /// Sends `dataset` to the remote right away. Never fails: problems are logged and returned as
    /// `SyncOutcome::Failed`. On success the time is recorded as the last sync.
    pub async fn push_now(&self, dataset: &Dataset) -> SyncOutcome {
        let payload = SyncPayload::new(dataset);
        match self.remote.push(&payload).await {
            Ok(()) => {
                let at = Utc::now();
                if let Err(e) = self.persistence.set_last_sync(at).await {
                    warn!("The push succeeded but the sync time could not be saved: {e}");
                }
                info!("Synced {} transactions", payload.transaction_count());
                SyncOutcome::Synced {
                    at,
                    transactions: payload.transaction_count(),
                }
            }
            Err(e) => {
                let reason = format!("{e:#}");
                warn!("Sync failed: {reason}");
                SyncOutcome::Failed { reason }
            }
        }
    }

    /// Fetches the remote's dataset. This is meant to replace local data, so it requires explicit
    /// confirmation. Local data is not touched here; the caller decides what to do with the
    /// result.
    ///
    /// # Errors
    /// - `Validation` if `confirm` is false. The remote is not contacted.
    /// - `Sync` if the remote cannot be reached or its answer is unusable.
    pub async fn pull_latest(&self, confirm: bool) -> Result<Dataset> {
        if !confirm {
            return Err(Error::validation(
                "Confirmation required: pulling replaces all local data",
            ));
        }
        let dataset = self
            .remote
            .pull()
            .await
            .context("Unable to pull data from the remote")
            .pub_result(ErrorType::Sync)?;
        if let Err(e) = dataset.transactions.check_amounts() {
            return Err(Error::msg(
                ErrorType::Sync,
                format!("The remote sent data that cannot be stored: {e}"),
            ));
        }
        Ok(dataset)
    }

    /// When the last successful push happened, if ever.
    pub async fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        self.persistence.last_sync().await
    }
}
