//! Implements the `Remote` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the production build so that the whole app can be run,
//! top-to-bottom, without a network. Set `FINTRACK_SYNC_IN_TEST_MODE` to use it.

use crate::api::{Remote, SyncPayload};
use crate::error::Res;
use crate::model::{Categories, Dataset, Transactions};
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Remote data for every endpoint used in this process, keyed by endpoint.
static STATES: LazyLock<Mutex<HashMap<String, TestRemoteState>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn states() -> MutexGuard<'static, HashMap<String, TestRemoteState>> {
    // A panic while holding the lock cannot leave the map half-updated.
    STATES.lock().unwrap_or_else(|e| e.into_inner())
}

/// Everything the fake remote knows about one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRemoteState {
    pub dataset: Dataset,
    /// How many pushes have been received.
    pub pushes: usize,
    /// When set, every push and pull fails with this message.
    pub fail_with: Option<String>,
}

impl Default for TestRemoteState {
    /// Seeded with a small dataset.
    fn default() -> Self {
        Self {
            dataset: seed(),
            pushes: 0,
            fail_with: None,
        }
    }
}

/// An implementation of `Remote` that does not use the network. Instances with the same endpoint
/// share their state, like a real remote would.
#[derive(Debug, Clone)]
pub struct TestRemote {
    endpoint: String,
}

impl TestRemote {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn get_state(&self) -> TestRemoteState {
        states().entry(self.endpoint.clone()).or_default().clone()
    }

    pub fn set_state(&self, state: TestRemoteState) {
        states().insert(self.endpoint.clone(), state);
    }
}

#[async_trait::async_trait]
impl Remote for TestRemote {
    async fn push(&self, payload: &SyncPayload) -> Res<()> {
        let mut states = states();
        let state = states.entry(self.endpoint.clone()).or_default();
        if let Some(message) = &state.fail_with {
            anyhow::bail!("Test remote '{}' failed: {message}", self.endpoint);
        }
        state.dataset = payload.to_dataset();
        state.pushes += 1;
        debug!(
            "Test remote '{}' received push #{} with {} transactions",
            self.endpoint,
            state.pushes,
            payload.transaction_count()
        );
        Ok(())
    }

    async fn pull(&self) -> Res<Dataset> {
        let mut states = states();
        let state = states.entry(self.endpoint.clone()).or_default();
        if let Some(message) = &state.fail_with {
            anyhow::bail!("Test remote '{}' failed: {message}", self.endpoint);
        }
        Ok(state.dataset.clone())
    }
}

/// Seed transaction data.
const TRANSACTION_DATA: &str = r##"[
  {"id": 1709632800000, "type": "income", "description": "March salary", "amount": 1000,
   "date": "2024-03-05", "categoryId": 1, "notes": "", "createdAt": "2024-03-05T10:00:00Z"},
  {"id": 1710064800000, "type": "expense", "description": "Groceries", "amount": 300,
   "date": "2024-03-10", "categoryId": 5, "notes": "", "createdAt": "2024-03-10T10:00:00Z"},
  {"id": 1710151200000, "type": "expense", "description": "Bus pass", "amount": "45.50",
   "date": "2024-03-11", "categoryId": 6, "notes": "monthly", "createdAt": "2024-03-11T10:00:00Z"}
]"##;

fn seed() -> Dataset {
    match serde_json::from_str::<Transactions>(TRANSACTION_DATA) {
        Ok(transactions) => Dataset::new(transactions, Categories::defaults()),
        Err(e) => {
            warn!("Unable to parse the test remote seed data: {e}");
            Dataset::with_defaults()
        }
    }
}
