use crate::model::{Amount, Categories, CategoryId, FieldErrors, Kind, TransactionId};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The transaction store: every transaction in insertion order. Serializes as a plain JSON array.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transactions {
    data: Vec<Transaction>,
}

impl Transactions {
    pub fn new(data: Vec<Transaction>) -> Self {
        Self { data }
    }

    /// A snapshot of every transaction, unfiltered, in insertion order.
    pub fn list(&self) -> &[Transaction] {
        &self.data
    }

    pub fn get(&self, id: TransactionId) -> Option<&Transaction> {
        self.data.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The largest transaction id, or zero.
    pub fn max_id(&self) -> i64 {
        self.data.iter().map(|t| t.id.value()).max().unwrap_or(0)
    }

    /// Returns true if any transaction points at `category_id`.
    pub fn references(&self, category_id: CategoryId) -> bool {
        self.data
            .iter()
            .any(|t| t.category_id == Some(category_id))
    }

    /// Validates `draft` and appends it as a new transaction with `id`.
    ///
    /// # Errors
    /// - `Validation` listing every missing or invalid field. Nothing is appended.
    /// - `Conflict` if `id` is already used.
    pub fn add(
        &mut self,
        draft: TransactionDraft,
        categories: &Categories,
        id: TransactionId,
    ) -> Result<Transaction> {
        let valid = draft.validate(categories)?;
        if self.get(id).is_some() {
            return Err(Error::conflict(format!(
                "Transaction id {id} already exists"
            )));
        }
        let transaction = Transaction {
            id,
            kind: valid.kind,
            description: valid.description,
            amount: valid.amount,
            date: valid.date,
            category_id: Some(valid.category_id),
            notes: valid.notes,
            created_at: Some(Utc::now()),
        };
        self.data.push(transaction.clone());
        Ok(transaction)
    }

    /// Replaces every editable field of transaction `id` with the values in `draft`. The id and
    /// the creation timestamp are preserved.
    ///
    /// # Errors
    /// - `NotFound` if there is no transaction with this id.
    /// - `Validation` if the draft is invalid. The stored transaction is left untouched.
    pub fn update(
        &mut self,
        id: TransactionId,
        draft: TransactionDraft,
        categories: &Categories,
    ) -> Result<Transaction> {
        let Some(ix) = self.data.iter().position(|t| t.id == id) else {
            return Err(Error::not_found(format!("Transaction {id} not found")));
        };
        let valid = draft.validate(categories)?;
        let existing = &mut self.data[ix];
        existing.kind = valid.kind;
        existing.description = valid.description;
        existing.amount = valid.amount;
        existing.date = valid.date;
        existing.category_id = Some(valid.category_id);
        existing.notes = valid.notes;
        Ok(existing.clone())
    }

    /// Deletes transaction `id`. Transactions have no dependents, so this never conflicts.
    ///
    /// # Errors
    /// - `NotFound` if there is no transaction with this id.
    pub fn remove(&mut self, id: TransactionId) -> Result<Transaction> {
        match self.data.iter().position(|t| t.id == id) {
            Some(ix) => Ok(self.data.remove(ix)),
            None => Err(Error::not_found(format!("Transaction {id} not found"))),
        }
    }

    /// Checks that every amount could have been entered through `add`. Data that arrives whole,
    /// from an import or a pull, goes through this before it is accepted.
    ///
    /// # Errors
    /// - `Validation` listing every transaction whose amount is out of range.
    pub fn check_amounts(&self) -> Result<()> {
        let mut errors = FieldErrors::new("transactions");
        for t in &self.data {
            if let Some(reason) = t.amount.invalid_reason() {
                errors.push(format!("transaction {}: {reason}", t.id));
            }
        }
        errors.finish()
    }

    /// Drops every transaction whose amount is out of range and describes each one dropped.
    pub(crate) fn retain_valid_amounts(&mut self) -> Vec<String> {
        let mut dropped = Vec::new();
        self.data.retain(|t| match t.amount.invalid_reason() {
            Some(reason) => {
                dropped.push(format!("transaction {} was skipped: {reason}", t.id));
                false
            }
            None => true,
        });
        dropped
    }

    /// Appends every transaction from `other` whose id is not already present. Existing
    /// transactions always win. Returns the number of transactions added.
    pub fn merge(&mut self, other: Transactions) -> usize {
        let mut seen: HashSet<TransactionId> = self.data.iter().map(|t| t.id).collect();
        let before = self.data.len();
        for transaction in other.data {
            if seen.insert(transaction.id) {
                self.data.push(transaction);
            }
        }
        self.data.len() - before
    }
}

impl<'a> IntoIterator for &'a Transactions {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl FromIterator<Transaction> for Transactions {
    fn from_iter<T: IntoIterator<Item = Transaction>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A single income or expense.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    id: TransactionId,
    #[serde(rename = "type")]
    kind: Kind,
    description: String,
    amount: Amount,
    date: NaiveDate,
    /// May be `None`, or point at a category that no longer exists, in data that was imported.
    #[serde(default)]
    category_id: Option<CategoryId>,
    #[serde(default)]
    notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Builds a transaction directly, without validation. Used for data that comes from
    /// storage, a remote sheet or tests.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TransactionId,
        kind: Kind,
        description: impl Into<String>,
        amount: Amount,
        date: NaiveDate,
        category_id: Option<CategoryId>,
        notes: impl Into<String>,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            kind,
            description: description.into(),
            amount,
            date,
            category_id,
            notes: notes.into(),
            created_at,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn is_income(&self) -> bool {
        self.kind == Kind::Income
    }

    pub fn is_expense(&self) -> bool {
        self.kind == Kind::Expense
    }

    /// The draft that would recreate this transaction's editable fields.
    pub fn to_draft(&self) -> TransactionDraft {
        TransactionDraft {
            kind: self.kind,
            description: self.description.clone(),
            amount: self.amount,
            date: Some(self.date),
            category_id: self.category_id,
            notes: self.notes.clone(),
        }
    }
}

/// The caller-supplied, unvalidated fields of a transaction.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    #[serde(rename = "type")]
    pub kind: Kind,
    pub description: String,
    pub amount: Amount,
    pub date: Option<NaiveDate>,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub notes: String,
}

/// A draft that passed validation.
struct ValidDraft {
    kind: Kind,
    description: String,
    amount: Amount,
    date: NaiveDate,
    category_id: CategoryId,
    notes: String,
}

impl TransactionDraft {
    /// Checks every field and reports all problems at once. The category must exist and belong to
    /// the group that matches the transaction's kind.
    fn validate(self, categories: &Categories) -> Result<ValidDraft> {
        let mut errors = FieldErrors::new("transaction");
        let description = self.description.trim().to_string();
        errors.check(!description.is_empty(), "description is required");
        if let Some(reason) = self.amount.invalid_reason() {
            errors.push(reason);
        }
        errors.check(self.date.is_some(), "date is required");
        match self.category_id {
            None => errors.push("category is required"),
            Some(id) => match categories.group_of(id) {
                None => errors.push(format!("category {id} does not exist")),
                Some(group) if group != self.kind => errors.push(format!(
                    "category {id} is an {group} category but the transaction is an {}",
                    self.kind
                )),
                Some(_) => {}
            },
        }
        errors.finish()?;

        match (self.date, self.category_id) {
            (Some(date), Some(category_id)) => Ok(ValidDraft {
                kind: self.kind,
                description,
                amount: self.amount,
                date,
                category_id,
                notes: self.notes.trim().to_string(),
            }),
            _ => Err(Error::validation("Invalid transaction")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorType;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn salary_draft() -> TransactionDraft {
        TransactionDraft {
            kind: Kind::Income,
            description: "March salary".into(),
            amount: Amount::new(Decimal::new(1000, 0)),
            date: Some(date(2024, 3, 5)),
            category_id: Some(CategoryId::new(1)),
            notes: String::new(),
        }
    }

    #[test]
    fn test_add_then_list_contains_one_new_record() {
        let categories = Categories::defaults();
        let mut transactions = Transactions::default();
        let draft = salary_draft();
        let added = transactions
            .add(draft.clone(), &categories, TransactionId::new(1))
            .unwrap();

        assert_eq!(transactions.list().len(), 1);
        let stored = &transactions.list()[0];
        assert_eq!(stored, &added);
        assert_eq!(stored.id(), TransactionId::new(1));
        assert!(stored.created_at().is_some());
        assert_eq!(stored.to_draft(), draft);
    }

    #[test]
    fn test_add_lists_every_invalid_field() {
        let categories = Categories::defaults();
        let mut transactions = Transactions::default();
        let draft = TransactionDraft {
            kind: Kind::Expense,
            description: "  ".into(),
            amount: Amount::ZERO,
            date: None,
            category_id: None,
            notes: String::new(),
        };
        let e = transactions
            .add(draft, &categories, TransactionId::new(1))
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
        let msg = e.to_string();
        assert!(msg.contains("description"));
        assert!(msg.contains("amount"));
        assert!(msg.contains("date"));
        assert!(msg.contains("category"));
        assert!(transactions.is_empty());
    }

    #[test]
    fn test_add_rejects_negative_amount() {
        let categories = Categories::defaults();
        let mut transactions = Transactions::default();
        let mut draft = salary_draft();
        draft.amount = Amount::new(Decimal::new(-5, 0));
        let e = transactions
            .add(draft, &categories, TransactionId::new(1))
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
    }

    #[test]
    fn test_add_rejects_amount_beyond_the_largest_storable() {
        let categories = Categories::defaults();
        let mut transactions = Transactions::default();
        let mut draft = salary_draft();
        draft.amount = Amount::new(
            Decimal::from_str_exact("50000000000000000000000000000").unwrap(),
        );
        let e = transactions
            .add(draft.clone(), &categories, TransactionId::new(1))
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
        assert!(e.to_string().contains("at most"));

        draft.amount = Amount::new(Decimal::new(1999, 3));
        assert!(transactions
            .add(draft.clone(), &categories, TransactionId::new(1))
            .is_err());

        draft.amount = Amount::MAX;
        transactions
            .add(draft, &categories, TransactionId::new(1))
            .unwrap();
        assert_eq!(transactions.len(), 1);
    }

    #[test]
    fn test_check_and_retain_amounts() {
        let d = date(2024, 3, 5);
        let tx = |id, amount: Decimal| {
            Transaction::new(
                TransactionId::new(id),
                Kind::Expense,
                "Imported",
                Amount::new(amount),
                d,
                None,
                "",
                None,
            )
        };
        let mut transactions: Transactions = vec![
            tx(1, Decimal::new(1250, 2)),
            tx(2, Decimal::MAX),
            tx(3, Decimal::ZERO),
        ]
        .into_iter()
        .collect();
        let e = transactions.check_amounts().unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
        assert!(e.to_string().contains("transaction 2"));
        assert!(e.to_string().contains("transaction 3"));

        let dropped = transactions.retain_valid_amounts();
        assert_eq!(dropped.len(), 2);
        assert_eq!(transactions.len(), 1);
        transactions.check_amounts().unwrap();
    }

    #[test]
    fn test_add_rejects_category_of_other_kind() {
        let categories = Categories::defaults();
        let mut transactions = Transactions::default();
        let mut draft = salary_draft();
        draft.category_id = Some(CategoryId::new(5));
        let e = transactions
            .add(draft, &categories, TransactionId::new(1))
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
        assert!(e.to_string().contains("expense category"));
    }

    #[test]
    fn test_add_rejects_unknown_category() {
        let categories = Categories::defaults();
        let mut transactions = Transactions::default();
        let mut draft = salary_draft();
        draft.category_id = Some(CategoryId::new(404));
        let e = transactions
            .add(draft, &categories, TransactionId::new(1))
            .unwrap_err();
        assert!(e.to_string().contains("does not exist"));
    }

    #[test]
    fn test_update_preserves_id_and_created_at() {
        let categories = Categories::defaults();
        let mut transactions = Transactions::default();
        let original = transactions
            .add(salary_draft(), &categories, TransactionId::new(7))
            .unwrap();

        let mut draft = salary_draft();
        draft.kind = Kind::Expense;
        draft.description = "Rent".into();
        draft.category_id = Some(CategoryId::new(7));
        draft.notes = " april ".into();
        let updated = transactions
            .update(TransactionId::new(7), draft, &categories)
            .unwrap();

        assert_eq!(updated.id(), original.id());
        assert_eq!(updated.created_at(), original.created_at());
        assert_eq!(updated.kind(), Kind::Expense);
        assert_eq!(updated.description(), "Rent");
        assert_eq!(updated.notes(), "april");
        assert_eq!(transactions.len(), 1);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let categories = Categories::defaults();
        let mut transactions = Transactions::default();
        let e = transactions
            .update(TransactionId::new(1), salary_draft(), &categories)
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::NotFound);
    }

    #[test]
    fn test_update_invalid_leaves_record_untouched() {
        let categories = Categories::defaults();
        let mut transactions = Transactions::default();
        transactions
            .add(salary_draft(), &categories, TransactionId::new(1))
            .unwrap();
        let before = transactions.clone();
        let mut draft = salary_draft();
        draft.description.clear();
        let e = transactions
            .update(TransactionId::new(1), draft, &categories)
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
        assert_eq!(transactions, before);
    }

    #[test]
    fn test_remove() {
        let categories = Categories::defaults();
        let mut transactions = Transactions::default();
        transactions
            .add(salary_draft(), &categories, TransactionId::new(1))
            .unwrap();
        assert!(transactions.references(CategoryId::new(1)));
        transactions.remove(TransactionId::new(1)).unwrap();
        assert!(transactions.is_empty());
        let e = transactions.remove(TransactionId::new(1)).unwrap_err();
        assert_eq!(e.error_type(), ErrorType::NotFound);
    }

    #[test]
    fn test_merge_drops_duplicate_ids() {
        let t = |id: i64, desc: &str| {
            Transaction::new(
                TransactionId::new(id),
                Kind::Expense,
                desc,
                Amount::new(Decimal::ONE),
                date(2024, 1, 1),
                Some(CategoryId::new(5)),
                "",
                None,
            )
        };
        let mut local: Transactions = vec![t(1, "T1"), t(2, "T2")].into_iter().collect();
        let incoming: Transactions = vec![t(2, "T2 remote"), t(3, "T3")].into_iter().collect();
        let added = local.merge(incoming);
        assert_eq!(added, 1);
        let ids: Vec<i64> = local.list().iter().map(|t| t.id().value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(local.get(TransactionId::new(2)).unwrap().description(), "T2");
    }

    #[test]
    fn test_json_shape() {
        let json = r##"[{
            "id": 1700000000000,
            "type": "expense",
            "description": "Lunch",
            "amount": 25.9,
            "date": "2024-03-01",
            "categoryId": 5,
            "notes": "",
            "createdAt": "2024-03-01T12:00:00Z"
        }]"##;
        let transactions: Transactions = serde_json::from_str(json).unwrap();
        let t = &transactions.list()[0];
        assert_eq!(t.kind(), Kind::Expense);
        assert_eq!(t.date(), date(2024, 3, 1));
        assert_eq!(t.amount().value(), Decimal::new(259, 1));

        let back = serde_json::to_value(&transactions).unwrap();
        assert_eq!(back[0]["categoryId"], 5);
        assert_eq!(back[0]["type"], "expense");
        assert_eq!(back[0]["date"], "2024-03-01");
    }

    #[test]
    fn test_json_tolerates_missing_optional_fields() {
        let json = r#"[{"id": 3, "type": "income", "description": "Gift",
            "amount": "10", "date": "2024-02-29", "categoryId": null}]"#;
        let transactions: Transactions = serde_json::from_str(json).unwrap();
        let t = &transactions.list()[0];
        assert_eq!(t.category_id(), None);
        assert_eq!(t.notes(), "");
        assert_eq!(t.created_at(), None);
    }
}
