//! Transaction command handlers.

use crate::api::Mode;
use crate::app::{Action, Applied};
use crate::args::{TxAddArgs, TxDeleteArgs, TxEditArgs, TxListArgs};
use crate::commands::{finish, open_app, resolve_any_category, resolve_category, Out};
use crate::model::{Categories, Transaction, TransactionDraft};
use crate::report::{self, TransactionFilter, UNCATEGORIZED};
use crate::{Config, Error, ErrorType, Result};
use chrono::Local;
use tracing::warn;

/// Records a new transaction. The date defaults to today. The id is generated.
///
/// # Errors
/// - `Validation` if a field is missing or invalid, or the category belongs to the other group.
/// - `NotFound` if the category name does not exist.
/// - `Persistence` if the change cannot be saved.
pub async fn tx_add(config: Config, mode: Mode, args: TxAddArgs) -> Result<Out<Transaction>> {
    let mut app = open_app(&config, mode).await?;
    let category_id = resolve_category(&app.dataset().categories, args.kind(), args.category())?;
    let draft = TransactionDraft {
        kind: args.kind(),
        description: args.description().to_string(),
        amount: args.amount(),
        date: Some(args.date().unwrap_or_else(|| Local::now().date_naive())),
        category_id: Some(category_id),
        notes: args.notes().to_string(),
    };
    let applied = app.apply(Action::AddTransaction(draft)).await?;
    finish(app).await;
    match applied {
        Applied::TransactionAdded(t) => Ok(Out::new(
            format!("Added transaction {}: {}", t.id(), t.description()),
            t,
        )),
        other => Err(unexpected(other)),
    }
}

/// Changes an existing transaction. Fields that are not given keep their current value.
///
/// # Errors
/// - `NotFound` if there is no such transaction or category.
/// - `Validation` if the result is invalid. Nothing is changed.
pub async fn tx_edit(config: Config, mode: Mode, args: TxEditArgs) -> Result<Out<Transaction>> {
    let mut app = open_app(&config, mode).await?;
    let existing = app
        .dataset()
        .transactions
        .get(args.id())
        .ok_or_else(|| Error::not_found(format!("Transaction {} not found", args.id())))?;

    let mut draft = existing.to_draft();
    if let Some(kind) = args.kind() {
        draft.kind = kind;
    }
    if let Some(description) = args.description() {
        draft.description = description.to_string();
    }
    if let Some(amount) = args.amount() {
        draft.amount = amount;
    }
    if let Some(date) = args.date() {
        draft.date = Some(date);
    }
    if let Some(category) = args.category() {
        draft.category_id = Some(resolve_category(
            &app.dataset().categories,
            draft.kind,
            category,
        )?);
    }
    if let Some(notes) = args.notes() {
        draft.notes = notes.to_string();
    }

    let applied = app
        .apply(Action::UpdateTransaction {
            id: args.id(),
            draft,
        })
        .await?;
    finish(app).await;
    match applied {
        Applied::TransactionUpdated(t) => {
            Ok(Out::new(format!("Updated transaction {}", t.id()), t))
        }
        other => Err(unexpected(other)),
    }
}

/// Deletes a transaction.
///
/// # Errors
/// - `NotFound` if there is no such transaction.
pub async fn tx_delete(config: Config, mode: Mode, args: TxDeleteArgs) -> Result<Out<Transaction>> {
    let mut app = open_app(&config, mode).await?;
    let applied = app.apply(Action::DeleteTransaction(args.id())).await?;
    finish(app).await;
    match applied {
        Applied::TransactionDeleted(t) => Ok(Out::new(
            format!("Deleted transaction {}: {}", t.id(), t.description()),
            t,
        )),
        other => Err(unexpected(other)),
    }
}

/// Lists transactions newest first, optionally narrowed to a month, a type, a category or a
/// description search.
pub async fn tx_list(config: Config, args: TxListArgs) -> Result<Out<Vec<Transaction>>> {
    let loaded = config.persistence().load().await?;
    for warning in &loaded.warnings {
        warn!("{warning}");
    }
    let dataset = loaded.dataset;

    let category = args
        .category()
        .map(|c| resolve_any_category(&dataset.categories, c))
        .transpose()?;
    let filter = TransactionFilter {
        kind: args.kind(),
        category,
        search: args.search().map(str::to_string),
    };
    let in_month = match args.month() {
        Some(month) => report::transactions_in_month(&dataset.transactions, month),
        None => dataset.transactions.list().iter().collect(),
    };
    let mut rows = report::filter(in_month, &filter);
    if let Some(limit) = args.limit() {
        rows.truncate(limit);
    }

    let message = if rows.is_empty() {
        "No transactions found".to_string()
    } else {
        rows.iter()
            .map(|t| format_row(t, &dataset.categories))
            .collect::<Vec<_>>()
            .join("\n")
    };
    Ok(Out::new(message, rows.into_iter().cloned().collect()))
}

/// One line of the transactions table.
pub(super) fn format_row(t: &Transaction, categories: &Categories) -> String {
    let category = t
        .category_id()
        .and_then(|id| categories.find(id))
        .map(|c| c.name())
        .unwrap_or(UNCATEGORIZED);
    let sign = if t.is_income() { "+" } else { "-" };
    format!(
        "{}  {sign}{:>12}  {:<14}  {}  [{}]",
        t.date(),
        t.amount(),
        category,
        t.description(),
        t.id()
    )
}

fn unexpected(applied: Applied) -> Error {
    Error::msg(
        ErrorType::Internal,
        format!("Unexpected result from the ledger: {applied:?}"),
    )
}
