//! The application state and its single mutation entry point.
//!
//! `App` owns the `Ledger`. Every change goes through `App::apply`, which mutates the ledger,
//! saves the dataset and, when a scheduler is attached, schedules a push.

use crate::api::{SyncGateway, SyncOutcome, SyncScheduler};
use crate::backup::{self, Backup};
use crate::model::{
    Category, CategoryDraft, CategoryId, Dataset, IdAllocator, Kind, Transaction,
    TransactionDraft, TransactionId,
};
use crate::store::{export_snapshot, import_snapshot, Bundle, ImportMode, ImportSummary, Persistence};
use crate::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// How many times a save is attempted before the error is returned.
const SAVE_ATTEMPTS: u32 = 2;

/// The dataset plus the id allocator that hands out ids for new records.
#[derive(Debug, Clone)]
pub struct Ledger {
    dataset: Dataset,
    ids: IdAllocator,
}

impl Ledger {
    pub fn new(dataset: Dataset) -> Self {
        let ids = IdAllocator::new(floor(&dataset));
        Self { dataset, ids }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Swaps in a whole new dataset. Ids issued so far are still never reused.
    fn replace(&mut self, dataset: Dataset) {
        self.ids.observe(floor(&dataset));
        self.dataset = dataset;
    }
}

fn floor(dataset: &Dataset) -> i64 {
    dataset
        .transactions
        .max_id()
        .max(dataset.categories.max_id())
}

/// Every change a user can make.
#[derive(Debug, Clone)]
pub enum Action {
    AddTransaction(TransactionDraft),
    UpdateTransaction {
        id: TransactionId,
        draft: TransactionDraft,
    },
    DeleteTransaction(TransactionId),
    AddCategory {
        group: Kind,
        draft: CategoryDraft,
    },
    DeleteCategory {
        group: Kind,
        id: CategoryId,
    },
    Import {
        bundle: Bundle,
        mode: ImportMode,
    },
    /// Resets to an empty transaction list and the built-in categories.
    Clear,
}

/// What an `Action` did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "applied", rename_all = "snake_case")]
pub enum Applied {
    TransactionAdded(Transaction),
    TransactionUpdated(Transaction),
    TransactionDeleted(Transaction),
    CategoryAdded { group: Kind, category: Category },
    CategoryDeleted { group: Kind, category: Category },
    Imported(ImportSummary),
    Cleared,
}

/// Owns the ledger and the collaborators that keep it saved and synced.
#[derive(Debug)]
pub struct App {
    ledger: Ledger,
    persistence: Persistence,
    scheduler: Option<SyncScheduler>,
    backup: Option<Backup>,
}

impl App {
    /// Loads the dataset from `persistence`. Returns the app and the load warnings, one per
    /// stored value that was corrupt and reset to its default.
    ///
    /// # Errors
    /// - `Persistence` if the store cannot be read.
    pub async fn open(persistence: Persistence) -> Result<(Self, Vec<String>)> {
        let loaded = persistence.load().await?;
        let app = Self {
            ledger: Ledger::new(loaded.dataset),
            persistence,
            scheduler: None,
            backup: None,
        };
        Ok((app, loaded.warnings))
    }

    /// Pushes are scheduled after every successful change.
    pub fn with_scheduler(mut self, scheduler: SyncScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Snapshots are written here before an import, a clear or a pull replaces local data.
    pub fn with_backup(mut self, backup: Backup) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn dataset(&self) -> &Dataset {
        self.ledger.dataset()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn scheduler(&self) -> Option<&SyncScheduler> {
        self.scheduler.as_ref()
    }

    /// Applies `action`, saves, then schedules a push.
    ///
    /// # Errors
    /// - `Validation`, `NotFound` or `Conflict` from the ledger. Nothing was changed.
    /// - `Persistence` if a backup could not be written before a destructive action. Nothing was
    ///   changed.
    /// - `Persistence` if the save failed twice. The change is kept in memory and no push is
    ///   scheduled.
    pub async fn apply(&mut self, action: Action) -> Result<Applied> {
        let applied = self.mutate(action).await?;
        debug!("Applied {applied:?}");
        self.write_through(matches!(applied, Applied::Cleared)).await?;
        if let Some(scheduler) = &self.scheduler {
            scheduler.schedule(self.ledger.dataset.clone()).await;
        }
        Ok(applied)
    }

    async fn mutate(&mut self, action: Action) -> Result<Applied> {
        let ledger = &mut self.ledger;
        let dataset = &mut ledger.dataset;
        let applied = match action {
            Action::AddTransaction(draft) => {
                let id = ledger.ids.next_transaction_id()?;
                Applied::TransactionAdded(dataset.transactions.add(
                    draft,
                    &dataset.categories,
                    id,
                )?)
            }
            Action::UpdateTransaction { id, draft } => Applied::TransactionUpdated(
                dataset
                    .transactions
                    .update(id, draft, &dataset.categories)?,
            ),
            Action::DeleteTransaction(id) => {
                Applied::TransactionDeleted(dataset.transactions.remove(id)?)
            }
            Action::AddCategory { group, draft } => {
                let id = ledger.ids.next_category_id()?;
                let category = dataset.categories.add(group, draft, id)?;
                Applied::CategoryAdded { group, category }
            }
            Action::DeleteCategory { group, id } => {
                let category = dataset
                    .categories
                    .remove(group, id, &dataset.transactions)?;
                Applied::CategoryDeleted { group, category }
            }
            Action::Import { bundle, mode } => {
                bundle.transactions.check_amounts()?;
                self.snapshot(backup::PRE_IMPORT).await?;
                let (merged, summary) = import_snapshot(self.ledger.dataset(), bundle, mode);
                info!(
                    "Imported ({}): {} transactions and {} categories added",
                    summary.mode, summary.transactions_added, summary.categories_added
                );
                self.ledger.replace(merged);
                Applied::Imported(summary)
            }
            Action::Clear => {
                self.snapshot(backup::PRE_CLEAR).await?;
                self.ledger.replace(Dataset::with_defaults());
                Applied::Cleared
            }
        };
        Ok(applied)
    }

    /// Fetches the remote dataset and replaces local data with it. The local data is backed up
    /// first. No push is scheduled.
    ///
    /// # Errors
    /// - `Validation` if `confirm` is false. Neither the remote nor local data is touched.
    /// - `Sync` if the pull fails. Local data is unchanged.
    /// - `Persistence` if the backup or the save fails.
    pub async fn pull_latest(&mut self, gateway: &SyncGateway, confirm: bool) -> Result<&Dataset> {
        let pulled = gateway.pull_latest(confirm).await?;
        self.snapshot(backup::SYNC_DOWN_PRE).await?;
        info!(
            "Replacing local data with {} transactions from the remote",
            pulled.transactions.len()
        );
        self.ledger.replace(pulled);
        self.write_through(false).await?;
        Ok(self.ledger.dataset())
    }

    /// The whole dataset as an export bundle stamped with the current time.
    pub fn export(&self) -> Bundle {
        export_snapshot(self.ledger.dataset(), Utc::now())
    }

    /// Sends a pending push right away instead of dropping it. Returns `None` if nothing was
    /// pending or no scheduler is attached.
    pub async fn finish(self) -> Option<SyncOutcome> {
        match &self.scheduler {
            Some(scheduler) => scheduler.flush().await,
            None => None,
        }
    }

    async fn snapshot(&self, prefix: &str) -> Result<()> {
        if let Some(backup) = &self.backup {
            let path = backup.save_json(prefix, &self.export()).await?;
            info!("Backed up local data to {}", path.display());
        }
        Ok(())
    }

    async fn write_through(&self, cleared: bool) -> Result<()> {
        let mut attempt = 1;
        loop {
            let result = if cleared {
                self.persistence.clear().await
            } else {
                self.persistence.save(self.ledger.dataset()).await
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < SAVE_ATTEMPTS => {
                    warn!("Save failed, retrying: {e}");
                    attempt += 1;
                }
                Err(e) => {
                    error!("Save failed, the change is only held in memory: {e}");
                    return Err(e);
                }
            }
        }
    }
}
