//! Report command handlers. These only read data.

use crate::args::{MonthArgs, TopArgs, YearArgs};
use crate::commands::transactions::format_row;
use crate::commands::Out;
use crate::model::{format_currency, Dataset, Kind, Transaction};
use crate::report::{
    self, round_percent, BalanceRow, CategoryRollup, Progress, Totals, YearMonth, YearlySeries,
};
use crate::{Config, Result};
use chrono::{Month, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

const RECENT: usize = 5;
const TOP: usize = 5;

/// Everything the dashboard shows for one month.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub month: YearMonth,
    pub totals: Totals,
    pub progress: Progress,
    pub top_expenses: Vec<CategoryRollup>,
    /// Every expense category, for the expense chart.
    pub expense_breakdown: Vec<CategoryRollup>,
    pub income_breakdown: Vec<CategoryRollup>,
    pub recent: Vec<Transaction>,
    /// Cumulative balance over the month, one point per day with transactions.
    pub balance_series: Vec<(NaiveDate, Decimal)>,
}

impl Dashboard {
    pub fn build(dataset: &Dataset, month: YearMonth) -> Self {
        let in_month = report::transactions_in_month(&dataset.transactions, month);
        let totals = report::totals(in_month.iter().copied());
        Self {
            month,
            progress: report::progress(&totals),
            totals,
            top_expenses: report::top_expense_categories(
                in_month.iter().copied(),
                &dataset.categories,
                TOP,
            ),
            expense_breakdown: report::category_breakdown(
                in_month.iter().copied(),
                &dataset.categories,
                Kind::Expense,
            ),
            income_breakdown: report::category_breakdown(
                in_month.iter().copied(),
                &dataset.categories,
                Kind::Income,
            ),
            recent: report::recent(in_month.iter().copied(), RECENT)
                .into_iter()
                .cloned()
                .collect(),
            balance_series: report::running_balance(in_month.iter().copied()),
        }
    }
}

async fn load(config: &Config) -> Result<Dataset> {
    let loaded = config.persistence().load().await?;
    for warning in &loaded.warnings {
        warn!("{warning}");
    }
    Ok(loaded.dataset)
}

/// Totals, top expense categories and recent transactions for a month.
pub async fn report_dashboard(config: Config, args: MonthArgs) -> Result<Out<Dashboard>> {
    let dataset = load(&config).await?;
    let dashboard = Dashboard::build(&dataset, args.month());

    let t = &dashboard.totals;
    let mut message = format!(
        "{}\n  Income:       {}\n  Expenses:     {}\n  Balance:      {}\n  Savings rate: {}%\n",
        dashboard.month,
        format_currency(t.income),
        format_currency(t.expense),
        format_currency(t.balance),
        round_percent(t.savings_rate)
    );
    message.push_str("\nTop expense categories:\n");
    if dashboard.top_expenses.is_empty() {
        message.push_str("  No expenses this month\n");
    }
    for rollup in &dashboard.top_expenses {
        message.push_str(&format!(
            "  {:<16} {:>12}\n",
            rollup.name,
            format_currency(rollup.total)
        ));
    }
    message.push_str("\nRecent transactions:\n");
    if dashboard.recent.is_empty() {
        message.push_str("  No transactions this month");
    }
    let recent: Vec<String> = dashboard
        .recent
        .iter()
        .map(|tx| format!("  {}", format_row(tx, &dataset.categories)))
        .collect();
    message.push_str(&recent.join("\n"));

    Ok(Out::new(message, dashboard))
}

/// Income and expense for each month of a year.
pub async fn report_yearly(config: Config, args: YearArgs) -> Result<Out<YearlySeries>> {
    let dataset = load(&config).await?;
    let series = report::yearly_series(&dataset.transactions, args.year());

    let mut message = format!(
        "{}\n  {:<10} {:>12} {:>12}\n",
        series.year, "Month", "Income", "Expenses"
    );
    for (ix, (income, expense)) in series
        .income_by_month
        .iter()
        .zip(series.expense_by_month.iter())
        .enumerate()
    {
        let name = Month::try_from(ix as u8 + 1)
            .map(|m| m.name())
            .unwrap_or_default();
        message.push_str(&format!(
            "  {name:<10} {:>12} {:>12}\n",
            format_currency(*income),
            format_currency(*expense)
        ));
    }
    Ok(Out::new(message.trim_end().to_string(), series))
}

/// The expense categories with the highest totals in a month.
pub async fn report_top(config: Config, args: TopArgs) -> Result<Out<Vec<CategoryRollup>>> {
    let dataset = load(&config).await?;
    let month = args.month();
    let in_month = report::transactions_in_month(&dataset.transactions, month);
    let top = report::top_expense_categories(in_month, &dataset.categories, args.count());

    let mut message = format!("Top expense categories, {month}");
    for (rank, rollup) in top.iter().enumerate() {
        message.push_str(&format!(
            "\n  {}. {:<16} {:>12}  ({} transactions)",
            rank + 1,
            rollup.name,
            format_currency(rollup.total),
            rollup.count
        ));
    }
    Ok(Out::new(message, top))
}

/// Per-category expense totals, shares and averages for a month.
pub async fn report_balance(config: Config, args: MonthArgs) -> Result<Out<Vec<BalanceRow>>> {
    let dataset = load(&config).await?;
    let month = args.month();
    let in_month = report::transactions_in_month(&dataset.transactions, month);
    let rows = report::category_balance_table(in_month, &dataset.categories);

    let mut message = format!(
        "Expenses by category, {month}\n  {:<16} {:>12} {:>8} {:>12}",
        "Category", "Total", "Share", "Average"
    );
    for row in &rows {
        message.push_str(&format!(
            "\n  {:<16} {:>12} {:>7}% {:>12}",
            row.name,
            format_currency(row.total),
            round_percent(row.percent_of_total),
            format_currency(row.average)
        ));
    }
    Ok(Out::new(message, rows))
}
