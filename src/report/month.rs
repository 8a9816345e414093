use chrono::{Datelike, Local, Month, NaiveDate};
use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A calendar month, e.g. March 2024. This is the unit the dashboard is filtered by.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct YearMonth {
    year: i32,
    /// 1 through 12.
    month: u32,
}

impl YearMonth {
    /// Returns `None` if `month` is not in 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month that `date` falls in.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current month in the local timezone.
    pub fn current() -> Self {
        Self::of(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Moves forward (positive) or backward (negative) by `months`, crossing year boundaries.
    /// Returns `None` if the result falls outside the years an `i32` can hold.
    pub fn shift(&self, months: i32) -> Option<Self> {
        // Months since year 0, in i64 so that no i32 year can overflow it.
        let index = i64::from(self.year) * 12 + i64::from(self.month) - 1 + i64::from(months);
        let year = i32::try_from(index.div_euclid(12)).ok()?;
        let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
        Self::new(year, month)
    }

    /// Compares the calendar fields of `date` only. There is no timezone conversion.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// The ISO-style `YYYY-MM` form accepted by `FromStr`.
    pub fn to_iso(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
            .unwrap_or("?");
        write!(f, "{name} {}", self.year)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParseYearMonthError(String);

impl Display for ParseYearMonthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Expected a month in the form YYYY-MM, got '{}'", self.0)
    }
}

impl std::error::Error for ParseYearMonthError {}

impl FromStr for YearMonth {
    type Err = ParseYearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseYearMonthError(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(err)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(err());
        }
        let year: i32 = year.parse().map_err(|_| err())?;
        let month: u32 = month.parse().map_err(|_| err())?;
        Self::new(year, month).ok_or_else(err)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_crosses_years() {
        let jan = YearMonth::new(2024, 1).unwrap();
        assert_eq!(jan.shift(-1), YearMonth::new(2023, 12));
        assert_eq!(jan.shift(11), YearMonth::new(2024, 12));
        assert_eq!(jan.shift(12), YearMonth::new(2025, 1));
        assert_eq!(jan.shift(-25), YearMonth::new(2021, 12));
    }

    #[test]
    fn test_shift_at_the_ends_of_the_year_range() {
        let last = YearMonth::new(i32::MAX, 12).unwrap();
        assert_eq!(last.shift(1), None);
        assert_eq!(last.shift(i32::MAX), None);
        assert_eq!(last.shift(-11), YearMonth::new(i32::MAX, 1));

        let first = YearMonth::new(i32::MIN, 1).unwrap();
        assert_eq!(first.shift(-1), None);
        assert_eq!(first.shift(i32::MIN), None);
        assert_eq!(first.shift(13), YearMonth::new(i32::MIN + 1, 2));
    }

    #[test]
    fn test_parse_and_display() {
        let m = YearMonth::from_str("2024-03").unwrap();
        assert_eq!(m.to_string(), "March 2024");
        assert_eq!(m.to_iso(), "2024-03");
        assert!(YearMonth::from_str("2024-13").is_err());
        assert!(YearMonth::from_str("2024-3").is_err());
        assert!(YearMonth::from_str("March").is_err());
    }

    #[test]
    fn test_contains() {
        let m = YearMonth::new(2024, 2).unwrap();
        assert!(m.contains(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!m.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert!(!m.contains(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()));
    }
}
