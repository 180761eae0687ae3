//! Calendar date encoding for the date dimension.
//!
//! The date dimension uses a numeric `YYYYMMDD` surrogate key so the same
//! calendar date always resolves to the same key without a lookup
//! round-trip.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Numeric `YYYYMMDD` surrogate key for a calendar date.
#[must_use]
pub fn date_key(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day())
}

/// One fully-attributed row of the date dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateDimRow {
    pub date_key: i64,
    pub full_date: NaiveDate,
    /// 0 = Monday .. 6 = Sunday.
    pub day_of_week: u32,
    pub day_name: &'static str,
    pub month: u32,
    pub month_name: &'static str,
    pub quarter: u32,
    pub year: i32,
    pub is_weekend: bool,
}

impl DateDimRow {
    /// Synthesize the dimension row for a calendar date.
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        let dow = date.weekday().num_days_from_monday();
        let month = date.month();
        Self {
            date_key: date_key(date),
            full_date: date,
            day_of_week: dow,
            day_name: DAY_NAMES[dow as usize],
            month,
            month_name: MONTH_NAMES[(month - 1) as usize],
            quarter: (month - 1) / 3 + 1,
            year: date.year(),
            is_weekend: matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_key_is_yyyymmdd() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(date_key(d), 20_240_301);
        let d = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        assert_eq!(date_key(d), 19_991_231);
    }

    #[test]
    fn same_date_same_key() {
        let a = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
        assert_eq!(date_key(a), date_key(b));
    }

    #[test]
    fn dim_row_attributes() {
        // 2024-03-01 was a Friday.
        let row = DateDimRow::for_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(row.date_key, 20_240_301);
        assert_eq!(row.day_of_week, 4);
        assert_eq!(row.day_name, "Friday");
        assert_eq!(row.month, 3);
        assert_eq!(row.month_name, "March");
        assert_eq!(row.quarter, 1);
        assert_eq!(row.year, 2024);
        assert!(!row.is_weekend);
    }

    #[test]
    fn weekend_flag() {
        // 2024-03-02 was a Saturday.
        let sat = DateDimRow::for_date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert!(sat.is_weekend);
        assert_eq!(sat.day_of_week, 5);
    }

    #[test]
    fn quarter_boundaries() {
        for (month, quarter) in [(1, 1), (3, 1), (4, 2), (6, 2), (7, 3), (10, 4), (12, 4)] {
            let row = DateDimRow::for_date(NaiveDate::from_ymd_opt(2024, month, 15).unwrap());
            assert_eq!(row.quarter, quarter, "month {month}");
        }
    }
}
