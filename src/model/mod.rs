//! Types that represent the core data model, such as `Transaction` and `Category`.
mod amount;
mod category;
mod ids;
mod transaction;

pub use amount::{format_currency, round_currency, Amount, AmountError};
pub use category::{Categories, Category, CategoryDraft, DEFAULT_COLOR, DEFAULT_ICON};
pub use ids::{CategoryId, IdAllocator, TransactionId};
use serde::{Deserialize, Serialize};
pub use transaction::{Transaction, TransactionDraft, Transactions};

/// Whether money came in or went out. A transaction has a `Kind`, and so does each of the two
/// category groups.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Income,
    #[default]
    Expense,
}

serde_plain::derive_display_from_serialize!(Kind);
serde_plain::derive_fromstr_from_deserialize!(Kind);

impl Kind {
    pub const ALL: [Kind; 2] = [Kind::Income, Kind::Expense];
}

/// The full set of user data: every transaction and both category groups. This is the unit that
/// is saved, exported, imported and synced.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub transactions: Transactions,
    pub categories: Categories,
}

impl Dataset {
    pub fn new(transactions: Transactions, categories: Categories) -> Self {
        Self {
            transactions,
            categories,
        }
    }

    /// An empty transaction list with the built-in categories.
    pub fn with_defaults() -> Self {
        Self::new(Transactions::default(), Categories::defaults())
    }
}

/// Collects per-field problems so that a single validation error can name all of them.
#[derive(Debug, Default)]
pub(crate) struct FieldErrors {
    what: &'static str,
    problems: Vec<String>,
}

impl FieldErrors {
    pub(crate) fn new(what: &'static str) -> Self {
        Self {
            what,
            problems: Vec::new(),
        }
    }

    pub(crate) fn check(&mut self, ok: bool, problem: impl Into<String>) {
        if !ok {
            self.problems.push(problem.into());
        }
    }

    pub(crate) fn push(&mut self, problem: impl Into<String>) {
        self.problems.push(problem.into());
    }

    /// Returns a `Validation` error listing every problem, or `Ok` if there were none.
    pub(crate) fn finish(self) -> crate::Result<()> {
        if self.problems.is_empty() {
            return Ok(());
        }
        Err(crate::Error::validation(format!(
            "Invalid {}: {}",
            self.what,
            self.problems.join("; ")
        )))
    }
}
