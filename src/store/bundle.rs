use crate::model::{Categories, Dataset, Transactions};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The only export format version that exists.
pub const VERSION: &str = "1.0";

/// A portable snapshot of the whole dataset, as written by `export` and read by `import`.
///
/// ```json
/// {
///   "transactions": [ ... ],
///   "categories": { "income": [ ... ], "expense": [ ... ] },
///   "exportDate": "2024-03-31T18:00:00Z",
///   "version": "1.0"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub transactions: Transactions,
    pub categories: Categories,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Bundle {
    /// Parses an export file.
    ///
    /// # Errors
    /// - `Validation` if the text is not a bundle, if the bundle has a version other than `1.0`,
    ///   or if a transaction amount is out of range. A bundle without a version is accepted.
    pub fn from_json(text: &str) -> Result<Self> {
        let bundle: Bundle = serde_json::from_str(text)
            .map_err(|e| Error::validation(format!("Invalid export file: {e}")))?;
        if let Some(other) = bundle.version.as_deref().filter(|v| *v != VERSION) {
            return Err(Error::validation(format!(
                "Unsupported export version '{other}', expected '{VERSION}'"
            )));
        }
        bundle.transactions.check_amounts()?;
        Ok(bundle)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::msg(crate::ErrorType::Internal, e))
    }

    pub fn into_dataset(self) -> Dataset {
        Dataset::new(self.transactions, self.categories)
    }
}

/// Builds an export bundle stamped with `now`.
pub fn export_snapshot(dataset: &Dataset, now: DateTime<Utc>) -> Bundle {
    Bundle {
        transactions: dataset.transactions.clone(),
        categories: dataset.categories.clone(),
        export_date: Some(now),
        version: Some(VERSION.to_string()),
    }
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Discard the current dataset and use the bundle's.
    #[default]
    Replace,
    /// Keep the current dataset and add everything from the bundle whose id is new.
    Merge,
}

serde_plain::derive_display_from_serialize!(ImportMode);
serde_plain::derive_fromstr_from_deserialize!(ImportMode);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct ImportSummary {
    pub mode: ImportMode,
    pub transactions_added: usize,
    pub categories_added: usize,
    pub transactions_total: usize,
    pub categories_total: usize,
}

/// Combines `current` with `bundle` and returns the resulting dataset.
///
/// Merging is by id and per collection: a transaction or category whose id already exists locally
/// is dropped, and local records always win. Imported transactions are not checked against
/// category groups.
pub fn import_snapshot(
    current: &Dataset,
    bundle: Bundle,
    mode: ImportMode,
) -> (Dataset, ImportSummary) {
    let (dataset, transactions_added, categories_added) = match mode {
        ImportMode::Replace => {
            let incoming = bundle.into_dataset();
            let t = incoming.transactions.len();
            let c = incoming.categories.len();
            (incoming, t, c)
        }
        ImportMode::Merge => {
            let mut merged = current.clone();
            let t = merged.transactions.merge(bundle.transactions);
            let c = merged.categories.merge(bundle.categories);
            (merged, t, c)
        }
    };
    let summary = ImportSummary {
        mode,
        transactions_added,
        categories_added,
        transactions_total: dataset.transactions.len(),
        categories_total: dataset.categories.len(),
    };
    (dataset, summary)
}
