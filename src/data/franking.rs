//! Trailing-12-month franking calculation
//!
//! Franking is weighted by cash amount: a large fully franked final dividend
//! counts for more than a small unfranked special.

use chrono::{Duration, NaiveDate};

use super::DividendRecord;

/// Only dividends going ex within this many days of today are counted
pub const TRAILING_WINDOW_DAYS: i64 = 365;

/// Franking figures for one security
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrankingSummary {
    /// Total cash dividend over the window, rounded to 6 dp
    pub dividend12: f64,
    /// Amount-weighted franking percentage, rounded to 2 dp
    pub franking: f64,
}

/// Computes the weighted franking percentage over the trailing window.
///
/// Returns `None` when no dividend went ex inside the window, so callers keep
/// whatever they already had rather than recording a zero.
pub fn weighted_franking(records: &[DividendRecord], today: NaiveDate) -> Option<FrankingSummary> {
    let cutoff = today - Duration::days(TRAILING_WINDOW_DAYS);

    let (total, franked) = records
        .iter()
        .filter(|r| r.ex_date >= cutoff)
        .fold((0.0_f64, 0.0_f64), |(total, franked), r| {
            (total + r.amount, franked + r.amount * (r.franking_pct / 100.0))
        });

    if total <= 0.0 {
        return None;
    }

    Some(FrankingSummary {
        dividend12: round_to(total, 6),
        franking: round_to(franked / total * 100.0, 2),
    })
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn record(days_ago: i64, amount: f64, franking_pct: f64) -> DividendRecord {
        DividendRecord {
            ex_date: today() - Duration::days(days_ago),
            amount,
            franking_pct,
        }
    }

    #[test]
    fn test_single_fully_franked_dividend() {
        let summary = weighted_franking(&[record(30, 0.85, 100.0)], today()).unwrap();
        assert_eq!(summary.franking, 100.0);
        assert_eq!(summary.dividend12, 0.85);
    }

    #[test]
    fn test_franking_is_weighted_by_amount() {
        // 3.00 fully franked + 1.00 unfranked = 75% franked
        let records = [record(30, 3.0, 100.0), record(200, 1.0, 0.0)];
        let summary = weighted_franking(&records, today()).unwrap();
        assert_eq!(summary.franking, 75.0);
        assert_eq!(summary.dividend12, 4.0);
    }

    #[test]
    fn test_old_dividends_are_excluded() {
        let records = [record(30, 1.0, 100.0), record(400, 5.0, 0.0)];
        let summary = weighted_franking(&records, today()).unwrap();
        assert_eq!(summary.franking, 100.0);
        assert_eq!(summary.dividend12, 1.0);
    }

    #[test]
    fn test_cutoff_day_is_inclusive() {
        let records = [record(TRAILING_WINDOW_DAYS, 1.0, 50.0)];
        let summary = weighted_franking(&records, today()).unwrap();
        assert_eq!(summary.franking, 50.0);

        let records = [record(TRAILING_WINDOW_DAYS + 1, 1.0, 50.0)];
        assert!(weighted_franking(&records, today()).is_none());
    }

    #[test]
    fn test_no_records_is_none() {
        assert!(weighted_franking(&[], today()).is_none());
    }

    #[test]
    fn test_zero_amounts_are_none() {
        assert!(weighted_franking(&[record(10, 0.0, 100.0)], today()).is_none());
    }

    #[test]
    fn test_rounding() {
        // 1/3 franked -> 33.33
        let records = [record(10, 1.0, 100.0), record(20, 2.0, 0.0)];
        let summary = weighted_franking(&records, today()).unwrap();
        assert_eq!(summary.franking, 33.33);

        let records = [record(10, 0.1234567, 0.0)];
        let summary = weighted_franking(&records, today()).unwrap();
        assert_eq!(summary.dividend12, 0.123457);
    }
}
