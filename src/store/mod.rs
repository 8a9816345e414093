//! The persistence gateway. Reads and writes the dataset, and a few auxiliary values, through a
//! `KeyValueStore`.
//!
//! Each collection is stored under its own key. Loading never fails because of bad data: a value
//! that cannot be parsed is replaced by its default and reported as a warning.

mod bundle;
mod rows;

pub use bundle::{export_snapshot, import_snapshot, Bundle, ImportMode, ImportSummary, VERSION};
pub use rows::{categories_csv, transactions_csv};

use crate::api::RemoteConfig;
use crate::error::{ErrorType, IntoResult, Res};
use crate::model::{Categories, Dataset, Transactions};
use crate::{utils, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const TRANSACTIONS: &str = "transactions";
pub const CATEGORIES: &str = "categories";
pub const LAST_SYNC: &str = "last_sync";
pub const REMOTE: &str = "remote";

/// A string-keyed store of string values.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` if nothing is stored under `key`.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    /// Removing a key that does not exist is not an error.
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Stores each key as `<dir>/<key>.json`. Writes go to a temp file that is then renamed, so a
/// crash never leaves a half-written value behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Res<Option<String>> {
        utils::read_if_exists(&self.path(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Res<()> {
        utils::write_atomic(self.path(key), value).await
    }

    async fn remove(&self, key: &str) -> Res<()> {
        utils::remove(self.path(key)).await
    }
}

/// An in-memory store, for tests and for running without a home directory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
    #[cfg(test)]
    failing_writes: std::sync::atomic::AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` calls to `set` fail.
    #[cfg(test)]
    pub(crate) fn fail_next_writes(&self, n: usize) {
        self.failing_writes
            .store(n, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Res<Option<String>> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Res<()> {
        #[cfg(test)]
        {
            use std::sync::atomic::Ordering;
            let remaining = self.failing_writes.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failing_writes.store(remaining - 1, Ordering::SeqCst);
                anyhow::bail!("Simulated write failure for '{key}'");
            }
        }
        self.data
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Res<()> {
        self.data.lock().await.remove(key);
        Ok(())
    }
}

/// The result of `Persistence::load`.
#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub dataset: Dataset,
    /// One entry per stored value that could not be parsed and was replaced by its default.
    pub warnings: Vec<String>,
}

/// Loads and saves the dataset and auxiliary values.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence").finish_non_exhaustive()
    }
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Reads both collections. A missing value yields its default: an empty transaction list or
    /// the built-in categories. A corrupt value also yields its default, plus a warning. A stored
    /// transaction whose amount is out of range is skipped with a warning.
    ///
    /// # Errors
    /// - `Persistence` only if the store itself cannot be read.
    pub async fn load(&self) -> Result<Loaded> {
        let mut warnings = Vec::new();
        let mut transactions: Transactions = self
            .read_or_default(TRANSACTIONS, Transactions::default, &mut warnings)
            .await
            .pub_result(ErrorType::Persistence)?;
        for dropped in transactions.retain_valid_amounts() {
            let message = format!("A stored {dropped}");
            warn!("{message}");
            warnings.push(message);
        }
        let categories: Categories = self
            .read_or_default(CATEGORIES, Categories::defaults, &mut warnings)
            .await
            .pub_result(ErrorType::Persistence)?;
        debug!(
            "Loaded {} transactions and {} categories",
            transactions.len(),
            categories.len()
        );
        Ok(Loaded {
            dataset: Dataset::new(transactions, categories),
            warnings,
        })
    }

    async fn read_or_default<T, F>(
        &self,
        key: &str,
        default: F,
        warnings: &mut Vec<String>,
    ) -> Res<T>
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        let Some(raw) = self
            .store
            .get(key)
            .await
            .with_context(|| format!("Unable to read '{key}' from the store"))?
        else {
            return Ok(default());
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                let message = format!("The stored '{key}' could not be read and was reset: {e}");
                warn!("{message}");
                warnings.push(message);
                Ok(default())
            }
        }
    }

    /// Writes both collections. Both are serialized before anything is written.
    ///
    /// # Errors
    /// - `Persistence` if serializing or writing fails.
    pub async fn save(&self, dataset: &Dataset) -> Result<()> {
        self.save_inner(dataset)
            .await
            .pub_result(ErrorType::Persistence)
    }

    async fn save_inner(&self, dataset: &Dataset) -> Res<()> {
        let transactions = serde_json::to_string(&dataset.transactions)
            .context("Unable to serialize transactions")?;
        let categories =
            serde_json::to_string(&dataset.categories).context("Unable to serialize categories")?;
        self.store
            .set(TRANSACTIONS, &transactions)
            .await
            .context("Unable to save transactions")?;
        self.store
            .set(CATEGORIES, &categories)
            .await
            .context("Unable to save categories")?;
        Ok(())
    }

    /// Deletes both collections, so that the next load yields the defaults.
    pub async fn clear(&self) -> Result<()> {
        async {
            self.store.remove(TRANSACTIONS).await?;
            self.store.remove(CATEGORIES).await
        }
        .await
        .context("Unable to clear the store")
        .pub_result(ErrorType::Persistence)
    }

    /// When the last successful push happened, if ever.
    pub async fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_json(LAST_SYNC)
            .await
            .pub_result(ErrorType::Persistence)
    }

    pub async fn set_last_sync(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_json(LAST_SYNC, &at)
            .await
            .pub_result(ErrorType::Persistence)
    }

    /// The remote endpoint settings, if they have been set.
    pub async fn remote_config(&self) -> Result<Option<RemoteConfig>> {
        self.get_json(REMOTE)
            .await
            .pub_result(ErrorType::Persistence)
    }

    pub async fn set_remote_config(&self, remote: &RemoteConfig) -> Result<()> {
        self.set_json(REMOTE, remote)
            .await
            .pub_result(ErrorType::Persistence)
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Res<Option<T>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        let value =
            serde_json::from_str(&raw).with_context(|| format!("Unable to parse stored '{key}'"))?;
        Ok(Some(value))
    }

    async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Res<()> {
        let raw =
            serde_json::to_string(value).with_context(|| format!("Unable to serialize '{key}'"))?;
        self.store.set(key, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, CategoryId, Kind, TransactionDraft, TransactionId};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn sample() -> Dataset {
        let mut dataset = Dataset::with_defaults();
        let draft = TransactionDraft {
            kind: Kind::Expense,
            description: "Bus pass".into(),
            amount: Amount::new(Decimal::new(4550, 2)),
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
            category_id: Some(CategoryId::new(6)),
            notes: "monthly".into(),
        };
        dataset
            .transactions
            .add(draft, &dataset.categories, TransactionId::new(10))
            .unwrap();
        dataset
    }

    #[tokio::test]
    async fn test_load_empty_store_gives_defaults() {
        let persistence = Persistence::new(Arc::new(MemoryStore::new()));
        let loaded = persistence.load().await.unwrap();
        assert!(loaded.dataset.transactions.is_empty());
        assert_eq!(loaded.dataset.categories, Categories::defaults());
        assert!(loaded.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_in_file_store() {
        let dir = TempDir::new().unwrap();
        let persistence = Persistence::new(Arc::new(FileStore::new(dir.path())));
        let dataset = sample();
        persistence.save(&dataset).await.unwrap();
        assert!(dir.path().join("transactions.json").is_file());
        assert!(dir.path().join("categories.json").is_file());

        let loaded = persistence.load().await.unwrap();
        assert_eq!(loaded.dataset, dataset);
    }

    #[tokio::test]
    async fn test_corrupt_value_loads_default_with_warning() {
        let store = Arc::new(MemoryStore::new());
        store.set(TRANSACTIONS, "{not json").await.unwrap();
        store
            .set(CATEGORIES, r#"{"income":[],"expense":[{"id":5,"name":"Food"}]}"#)
            .await
            .unwrap();
        let persistence = Persistence::new(store);
        let loaded = persistence.load().await.unwrap();
        assert!(loaded.dataset.transactions.is_empty());
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("transactions"));
        // The valid key is still read.
        assert_eq!(loaded.dataset.categories.len(), 1);
    }

    #[tokio::test]
    async fn test_largest_amount_is_stored_exactly() {
        let persistence = Persistence::new(Arc::new(MemoryStore::new()));
        let mut dataset = Dataset::with_defaults();
        let draft = TransactionDraft {
            kind: Kind::Income,
            description: "House sale".into(),
            amount: Amount::MAX,
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
            category_id: Some(CategoryId::new(3)),
            notes: String::new(),
        };
        dataset
            .transactions
            .add(draft, &dataset.categories, TransactionId::new(1))
            .unwrap();
        persistence.save(&dataset).await.unwrap();
        let loaded = persistence.load().await.unwrap();
        assert_eq!(loaded.dataset, dataset);
    }

    #[tokio::test]
    async fn test_out_of_range_stored_amount_is_skipped_with_warning() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                TRANSACTIONS,
                r#"[
                    {"id": 1, "type": "expense", "description": "Bus", "amount": 2.5,
                     "date": "2024-03-01", "categoryId": 6},
                    {"id": 2, "type": "expense", "description": "Huge",
                     "amount": "50000000000000000000000000000", "date": "2024-03-02",
                     "categoryId": 6}
                ]"#,
            )
            .await
            .unwrap();
        let loaded = Persistence::new(store).load().await.unwrap();
        assert_eq!(loaded.dataset.transactions.len(), 1);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("transaction 2"));
    }

    #[tokio::test]
    async fn test_save_failure_is_persistence_error() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_writes(1);
        let persistence = Persistence::new(store);
        let e = persistence.save(&sample()).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Persistence);
    }

    #[tokio::test]
    async fn test_clear() {
        let persistence = Persistence::new(Arc::new(MemoryStore::new()));
        persistence.save(&sample()).await.unwrap();
        persistence.clear().await.unwrap();
        let loaded = persistence.load().await.unwrap();
        assert_eq!(loaded.dataset, Dataset::with_defaults());
    }

    #[tokio::test]
    async fn test_auxiliary_keys() {
        let persistence = Persistence::new(Arc::new(MemoryStore::new()));
        assert!(persistence.last_sync().await.unwrap().is_none());
        let at = Utc::now();
        persistence.set_last_sync(at).await.unwrap();
        assert_eq!(persistence.last_sync().await.unwrap(), Some(at));

        let remote = RemoteConfig::new("https://script.example.com/exec");
        persistence.set_remote_config(&remote).await.unwrap();
        assert_eq!(persistence.remote_config().await.unwrap(), Some(remote));
    }
}
