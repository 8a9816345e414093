//! Flat CSV renditions of the dataset, one row per transaction and one row per category. These are
//! the same tables the remote spreadsheet holds.

use crate::error::{ErrorType, IntoResult, Res};
use crate::model::Dataset;
use crate::Result;
use anyhow::Context;

const TRANSACTION_HEADERS: [&str; 9] = [
    "ID",
    "Type",
    "Description",
    "Amount",
    "Date",
    "Category ID",
    "Category Name",
    "Notes",
    "Created At",
];

const CATEGORY_HEADERS: [&str; 5] = ["ID", "Type", "Name", "Icon", "Color"];

/// Renders every transaction, with its category name resolved. A dangling category id leaves the
/// name column empty.
pub fn transactions_csv(dataset: &Dataset) -> Result<String> {
    let rows = dataset.transactions.list().iter().map(|t| {
        let category_name = t
            .category_id()
            .and_then(|id| dataset.categories.find(id))
            .map(|c| c.name().to_string())
            .unwrap_or_default();
        vec![
            t.id().to_string(),
            t.kind().to_string(),
            t.description().to_string(),
            t.amount().value().to_string(),
            t.date().format("%Y-%m-%d").to_string(),
            t.category_id().map(|id| id.to_string()).unwrap_or_default(),
            category_name,
            t.notes().to_string(),
            t.created_at().map(|at| at.to_rfc3339()).unwrap_or_default(),
        ]
    });
    write_rows(&TRANSACTION_HEADERS, rows).pub_result(ErrorType::Internal)
}

/// Renders both category groups, income first.
pub fn categories_csv(dataset: &Dataset) -> Result<String> {
    let rows = dataset.categories.iter().map(|(kind, c)| {
        vec![
            c.id().to_string(),
            kind.to_string(),
            c.name().to_string(),
            c.icon().to_string(),
            c.color().to_string(),
        ]
    });
    write_rows(&CATEGORY_HEADERS, rows).pub_result(ErrorType::Internal)
}

fn write_rows<I>(headers: &[&str], rows: I) -> Res<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(headers)
        .context("Unable to write CSV headers")?;
    for row in rows {
        writer.write_record(&row).context("Unable to write CSV row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Unable to flush CSV: {e}"))?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, CategoryId, Kind, Transaction, TransactionId};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn test_transactions_csv() {
        let mut dataset = Dataset::with_defaults();
        dataset.transactions = vec![
            Transaction::new(
                TransactionId::new(1),
                Kind::Expense,
                "Pizza, large",
                Amount::new(Decimal::new(2599, 2)),
                NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
                Some(CategoryId::new(5)),
                "",
                None,
            ),
            Transaction::new(
                TransactionId::new(2),
                Kind::Income,
                "Mystery",
                Amount::new(Decimal::from(10)),
                NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
                Some(CategoryId::new(404)),
                "",
                None,
            ),
        ]
        .into_iter()
        .collect();
        let csv = transactions_csv(&dataset).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID,Type,Description"));
        assert_eq!(lines[1], r#"1,expense,"Pizza, large",25.99,2024-03-02,5,Food,,"#);
        assert_eq!(lines[2], "2,income,Mystery,10,2024-03-03,404,,,");
    }

    #[test]
    fn test_categories_csv() {
        let csv = categories_csv(&Dataset::with_defaults()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 13);
        assert_eq!(lines[1], "1,income,Salary,fas fa-briefcase,#10b981");
        assert_eq!(lines[5], "5,expense,Food,fas fa-utensils,#ef4444");
    }
}
