//! Derived views over a snapshot of transactions: monthly filtering, totals, category rollups,
//! rankings and chart series.
//!
//! Everything here is a pure function. Sums are exact `Decimal` arithmetic; rounding is left to
//! the code that displays the values (see `round_currency` and `round_percent`). Stored amounts
//! never exceed `Amount::MAX`, which keeps every sum far inside `Decimal`'s range.

mod month;

pub use month::{ParseYearMonthError, YearMonth};

use crate::model::{Categories, CategoryId, Kind, Transaction, DEFAULT_COLOR, DEFAULT_ICON};
use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::cmp::Ordering;

/// The bucket name for transactions whose category id does not resolve.
pub const UNCATEGORIZED: &str = "Uncategorized";

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Rounds a percentage to one decimal place for display.
pub fn round_percent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Returns the transactions whose date falls in `month`, in their original order.
pub fn transactions_in_month<'a, I>(transactions: I, month: YearMonth) -> Vec<&'a Transaction>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .filter(|t| month.contains(t.date()))
        .collect()
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct Totals {
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
    /// `balance / income * 100`, or zero when there is no income.
    pub savings_rate: Decimal,
}

pub fn totals<'a, I>(transactions: I) -> Totals
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let (income, expense) =
        transactions
            .into_iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(inc, exp), t| match t.kind() {
                Kind::Income => (inc + t.amount().value(), exp),
                Kind::Expense => (inc, exp + t.amount().value()),
            });
    let balance = income - expense;
    let savings_rate = if income > Decimal::ZERO {
        balance / income * HUNDRED
    } else {
        Decimal::ZERO
    };
    Totals {
        income,
        expense,
        balance,
        savings_rate,
    }
}

/// The `n` most recent transactions, newest first. Transactions on the same date keep their
/// original relative order.
pub fn recent<'a, I>(transactions: I, n: usize) -> Vec<&'a Transaction>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut sorted = by_date_desc(transactions);
    sorted.truncate(n);
    sorted
}

fn by_date_desc<'a, I>(transactions: I) -> Vec<&'a Transaction>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut sorted: Vec<&Transaction> = transactions.into_iter().collect();
    // `sort_by` is stable.
    sorted.sort_by(|a, b| b.date().cmp(&a.date()));
    sorted
}

/// Criteria for the transactions table. `None` means "all".
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct TransactionFilter {
    pub kind: Option<Kind>,
    pub category: Option<CategoryId>,
    /// Case-insensitive substring of the description.
    pub search: Option<String>,
}

/// Applies `filter` and sorts the result newest first.
pub fn filter<'a, I>(transactions: I, filter: &TransactionFilter) -> Vec<&'a Transaction>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    by_date_desc(transactions.into_iter().filter(|t| {
        filter.kind.is_none_or(|k| t.kind() == k)
            && filter.category.is_none_or(|c| t.category_id() == Some(c))
            && search
                .as_deref()
                .is_none_or(|s| t.description().to_lowercase().contains(s))
    }))
}

/// One category's share of a set of transactions.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CategoryRollup {
    pub name: String,
    pub total: Decimal,
    pub color: String,
    pub icon: String,
    pub count: usize,
}

/// Groups the transactions of `kind` by category name, in order of first appearance.
///
/// Transactions whose category is missing or does not resolve are summed under
/// [`UNCATEGORIZED`], so the rollup totals always add up to the total of the input.
pub fn category_breakdown<'a, I>(
    transactions: I,
    categories: &Categories,
    kind: Kind,
) -> Vec<CategoryRollup>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut rollups: Vec<CategoryRollup> = Vec::new();
    for t in transactions.into_iter().filter(|t| t.kind() == kind) {
        let category = t.category_id().and_then(|id| categories.find(id));
        let (name, color, icon) = match category {
            Some(c) => (c.name(), c.color(), c.icon()),
            None => (UNCATEGORIZED, DEFAULT_COLOR, DEFAULT_ICON),
        };
        match rollups.iter_mut().find(|r| r.name == name) {
            Some(rollup) => {
                rollup.total += t.amount().value();
                rollup.count += 1;
            }
            None => rollups.push(CategoryRollup {
                name: name.to_string(),
                total: t.amount().value(),
                color: color.to_string(),
                icon: icon.to_string(),
                count: 1,
            }),
        }
    }
    rollups
}

/// Largest total first, then by name so that the order is deterministic.
fn by_total_then_name(a_total: Decimal, a_name: &str, b_total: Decimal, b_name: &str) -> Ordering {
    b_total.cmp(&a_total).then_with(|| a_name.cmp(b_name))
}

/// The `n` expense categories with the highest totals.
pub fn top_expense_categories<'a, I>(
    transactions: I,
    categories: &Categories,
    n: usize,
) -> Vec<CategoryRollup>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut rollups = category_breakdown(transactions, categories, Kind::Expense);
    rollups.sort_by(|a, b| by_total_then_name(a.total, &a.name, b.total, &b.name));
    rollups.truncate(n);
    rollups
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct BalanceRow {
    pub name: String,
    pub total: Decimal,
    /// Share of all expenses, 0 to 100. Unrounded.
    pub percent_of_total: Decimal,
    /// Average amount per transaction. Unrounded.
    pub average: Decimal,
    pub count: usize,
}

/// Per-category expense table, largest total first.
pub fn category_balance_table<'a, I>(transactions: I, categories: &Categories) -> Vec<BalanceRow>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let rollups = category_breakdown(transactions, categories, Kind::Expense);
    let grand_total: Decimal = rollups.iter().map(|r| r.total).sum();
    let mut rows: Vec<BalanceRow> = rollups
        .into_iter()
        .map(|r| BalanceRow {
            percent_of_total: if grand_total.is_zero() {
                Decimal::ZERO
            } else {
                r.total / grand_total * HUNDRED
            },
            // count is at least 1 for every rollup
            average: r.total / Decimal::from(r.count),
            name: r.name,
            total: r.total,
            count: r.count,
        })
        .collect();
    rows.sort_by(|a, b| by_total_then_name(a.total, &a.name, b.total, &b.name));
    rows
}

/// Monthly income and expense sums for one calendar year. Index 0 is January.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize)]
pub struct YearlySeries {
    pub year: i32,
    pub income_by_month: [Decimal; 12],
    pub expense_by_month: [Decimal; 12],
}

/// Buckets every transaction dated in `year` by month. Other years are ignored.
pub fn yearly_series<'a, I>(transactions: I, year: i32) -> YearlySeries
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut series = YearlySeries {
        year,
        ..Default::default()
    };
    for t in transactions.into_iter().filter(|t| t.date().year() == year) {
        let ix = t.date().month0() as usize;
        match t.kind() {
            Kind::Income => series.income_by_month[ix] += t.amount().value(),
            Kind::Expense => series.expense_by_month[ix] += t.amount().value(),
        }
    }
    series
}

/// Income and expense as a share of whichever is larger, for drawing two comparable bars.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct Progress {
    pub income_pct: Decimal,
    pub expense_pct: Decimal,
}

/// Scales against `max(income, expense, 1)` so that empty months give two empty bars.
pub fn progress(totals: &Totals) -> Progress {
    let max = totals.income.max(totals.expense).max(Decimal::ONE);
    Progress {
        income_pct: totals.income / max * HUNDRED,
        expense_pct: totals.expense / max * HUNDRED,
    }
}

/// The cumulative balance at the end of each day that has at least one transaction, oldest first.
pub fn running_balance<'a, I>(transactions: I) -> Vec<(NaiveDate, Decimal)>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut sorted: Vec<&Transaction> = transactions.into_iter().collect();
    sorted.sort_by_key(|t| t.date());

    let mut points: Vec<(NaiveDate, Decimal)> = Vec::new();
    let mut balance = Decimal::ZERO;
    for t in sorted {
        match t.kind() {
            Kind::Income => balance += t.amount().value(),
            Kind::Expense => balance -= t.amount().value(),
        }
        match points.last_mut() {
            Some((date, value)) if *date == t.date() => *value = balance,
            _ => points.push((t.date(), balance)),
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, TransactionId};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn tx(id: i64, kind: Kind, amount: i64, day: &str, category: Option<i64>) -> Transaction {
        Transaction::new(
            TransactionId::new(id),
            kind,
            format!("tx {id}"),
            Amount::new(Decimal::from(amount)),
            date(day),
            category.map(CategoryId::new),
            "",
            None,
        )
    }

    fn scenario() -> Vec<Transaction> {
        vec![
            tx(1, Kind::Income, 1000, "2024-03-05", Some(1)),
            tx(2, Kind::Expense, 300, "2024-03-10", Some(5)),
        ]
    }

    #[test]
    fn test_totals_for_march() {
        let all = scenario();
        let march = transactions_in_month(&all, YearMonth::new(2024, 3).unwrap());
        let t = totals(march);
        assert_eq!(t.income, Decimal::from(1000));
        assert_eq!(t.expense, Decimal::from(300));
        assert_eq!(t.balance, Decimal::from(700));
        assert_eq!(round_percent(t.savings_rate), Decimal::new(700, 1));
    }

    #[test]
    fn test_totals_without_income() {
        let empty: Vec<Transaction> = Vec::new();
        let t = totals(&empty);
        assert_eq!(t, Totals::default());

        let only_expense = vec![tx(1, Kind::Expense, 40, "2024-01-01", Some(5))];
        let t = totals(&only_expense);
        assert_eq!(t.balance, t.income - t.expense);
        assert_eq!(t.savings_rate, Decimal::ZERO);
    }

    #[test]
    fn test_totals_are_exact() {
        let tenth = Amount::new(Decimal::new(1, 1));
        let all: Vec<Transaction> = (0..3)
            .map(|i| {
                Transaction::new(
                    TransactionId::new(i),
                    Kind::Income,
                    "dime",
                    tenth,
                    date("2024-01-01"),
                    None,
                    "",
                    None,
                )
            })
            .collect();
        assert_eq!(totals(&all).income, Decimal::new(3, 1));
    }

    #[test]
    fn test_reports_over_many_largest_amounts() {
        let categories = Categories::defaults();
        let n = 10_000;
        let mut all: Vec<Transaction> = (0..n)
            .map(|i| {
                Transaction::new(
                    TransactionId::new(i),
                    Kind::Expense,
                    "big",
                    Amount::MAX,
                    date("2024-03-15"),
                    Some(CategoryId::new(7)),
                    "",
                    None,
                )
            })
            .collect();
        all.push(Transaction::new(
            TransactionId::new(n),
            Kind::Income,
            "cent",
            Amount::new(Decimal::new(1, 2)),
            date("2024-03-01"),
            Some(CategoryId::new(1)),
            "",
            None,
        ));

        let expected = Amount::MAX.value() * Decimal::from(n);
        let t = totals(&all);
        assert_eq!(t.expense, expected);
        assert!(t.savings_rate < Decimal::ZERO);

        let rows = category_balance_table(&all, &categories);
        assert_eq!(rows[0].total, expected);
        assert_eq!(rows[0].average, Amount::MAX.value());
        assert_eq!(
            category_breakdown(&all, &categories, Kind::Expense)[0].total,
            expected
        );
        assert_eq!(yearly_series(&all, 2024).expense_by_month[2], expected);
        let series = running_balance(&all);
        assert_eq!(series.last().unwrap().1, t.balance);
    }

    #[test]
    fn test_months_partition_a_year() {
        let mut all = Vec::new();
        let mut id = 0;
        for m in 1..=12u32 {
            for d in [1u32, 15, 28] {
                id += 1;
                let day = NaiveDate::from_ymd_opt(2024, m, d).unwrap();
                all.push(Transaction::new(
                    TransactionId::new(id),
                    Kind::Expense,
                    "x",
                    Amount::new(Decimal::ONE),
                    day,
                    Some(CategoryId::new(5)),
                    "",
                    None,
                ));
            }
        }
        all.push(tx(999, Kind::Expense, 1, "2025-01-01", Some(5)));

        let mut seen = std::collections::HashSet::new();
        let mut count = 0;
        for m in 1..=12 {
            let bucket = transactions_in_month(&all, YearMonth::new(2024, m).unwrap());
            for t in bucket {
                assert!(seen.insert(t.id()));
                count += 1;
            }
        }
        assert_eq!(count, 36);
    }

    #[test]
    fn test_recent_is_stable() {
        let all = vec![
            tx(1, Kind::Expense, 1, "2024-03-01", None),
            tx(2, Kind::Expense, 1, "2024-03-05", None),
            tx(3, Kind::Expense, 1, "2024-03-01", None),
            tx(4, Kind::Expense, 1, "2024-03-05", None),
        ];
        let ids: Vec<i64> = recent(&all, 3).iter().map(|t| t.id().value()).collect();
        assert_eq!(ids, vec![2, 4, 1]);
    }

    #[test]
    fn test_top_expense_categories() {
        let categories = Categories::defaults();
        let all = vec![
            tx(1, Kind::Expense, 300, "2024-03-01", Some(5)),
            tx(2, Kind::Expense, 200, "2024-03-02", Some(5)),
            tx(3, Kind::Expense, 150, "2024-03-03", Some(6)),
            tx(4, Kind::Income, 5000, "2024-03-03", Some(1)),
        ];
        let top = top_expense_categories(&all, &categories, 2);
        let got: Vec<(&str, Decimal)> = top.iter().map(|r| (r.name.as_str(), r.total)).collect();
        assert_eq!(
            got,
            vec![("Food", Decimal::from(500)), ("Transport", Decimal::from(150))]
        );
    }

    #[test]
    fn test_top_ties_break_by_name() {
        let categories = Categories::defaults();
        let all = vec![
            tx(1, Kind::Expense, 100, "2024-03-01", Some(6)),
            tx(2, Kind::Expense, 100, "2024-03-02", Some(5)),
        ];
        let top = top_expense_categories(&all, &categories, 5);
        assert_eq!(top[0].name, "Food");
        assert_eq!(top[1].name, "Transport");
    }

    #[test]
    fn test_breakdown_keeps_dangling_ids() {
        let categories = Categories::defaults();
        let all = vec![
            tx(1, Kind::Expense, 10, "2024-03-01", Some(404)),
            tx(2, Kind::Expense, 20, "2024-03-02", Some(5)),
            tx(3, Kind::Expense, 5, "2024-03-03", None),
        ];
        let rollups = category_breakdown(&all, &categories, Kind::Expense);
        assert_eq!(rollups.len(), 2);
        assert_eq!(rollups[0].name, UNCATEGORIZED);
        assert_eq!(rollups[0].total, Decimal::from(15));
        assert_eq!(rollups[0].count, 2);
        let sum: Decimal = rollups.iter().map(|r| r.total).sum();
        assert_eq!(sum, totals(&all).expense);
    }

    #[test]
    fn test_balance_table() {
        let categories = Categories::defaults();
        let all = vec![
            tx(1, Kind::Expense, 100, "2024-03-01", Some(6)),
            tx(2, Kind::Expense, 200, "2024-03-02", Some(5)),
            tx(3, Kind::Expense, 100, "2024-03-03", Some(5)),
        ];
        let rows = category_balance_table(&all, &categories);
        assert_eq!(rows[0].name, "Food");
        assert_eq!(rows[0].total, Decimal::from(300));
        assert_eq!(rows[0].average, Decimal::from(150));
        assert_eq!(rows[0].percent_of_total, Decimal::from(75));
        assert_eq!(rows[1].name, "Transport");
        assert_eq!(round_percent(rows[1].percent_of_total), Decimal::from(25));
    }

    #[test]
    fn test_balance_table_empty() {
        let empty: Vec<Transaction> = Vec::new();
        let rows = category_balance_table(&empty, &Categories::defaults());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_yearly_series_ignores_other_years() {
        let all = vec![
            tx(1, Kind::Income, 1000, "2024-01-31", Some(1)),
            tx(2, Kind::Expense, 300, "2024-12-01", Some(5)),
            tx(3, Kind::Expense, 999, "2023-12-31", Some(5)),
        ];
        let series = yearly_series(&all, 2024);
        assert_eq!(series.income_by_month[0], Decimal::from(1000));
        assert_eq!(series.expense_by_month[11], Decimal::from(300));
        let total: Decimal = series.expense_by_month.iter().sum();
        assert_eq!(total, Decimal::from(300));
    }

    #[test]
    fn test_filter() {
        let all = vec![
            tx(1, Kind::Expense, 10, "2024-03-01", Some(5)),
            tx(2, Kind::Income, 10, "2024-03-09", Some(1)),
            tx(3, Kind::Expense, 10, "2024-03-05", Some(6)),
        ];
        let f = TransactionFilter {
            kind: Some(Kind::Expense),
            ..Default::default()
        };
        let ids: Vec<i64> = filter(&all, &f).iter().map(|t| t.id().value()).collect();
        assert_eq!(ids, vec![3, 1]);

        let f = TransactionFilter {
            search: Some("TX 2".into()),
            ..Default::default()
        };
        assert_eq!(filter(&all, &f).len(), 1);

        let f = TransactionFilter {
            category: Some(CategoryId::new(6)),
            ..Default::default()
        };
        assert_eq!(filter(&all, &f)[0].id(), TransactionId::new(3));
    }

    #[test]
    fn test_progress() {
        let p = progress(&Totals::default());
        assert_eq!(p, Progress::default());

        let t = totals(&scenario());
        let p = progress(&t);
        assert_eq!(p.income_pct, Decimal::from(100));
        assert_eq!(p.expense_pct, Decimal::from(30));
    }

    #[test]
    fn test_running_balance() {
        let all = vec![
            tx(1, Kind::Expense, 50, "2024-03-02", None),
            tx(2, Kind::Income, 100, "2024-03-01", None),
            tx(3, Kind::Expense, 20, "2024-03-02", None),
        ];
        let points = running_balance(&all);
        assert_eq!(
            points,
            vec![
                (date("2024-03-01"), Decimal::from(100)),
                (date("2024-03-02"), Decimal::from(30)),
            ]
        );
    }
}
