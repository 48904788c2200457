//! # Financial Year & Invoice Numbering
//!
//! The Indian financial year runs 1 April to 31 March and is written
//! `2025-26`. Invoice numbers restart at 1 each year:
//!
//! ```text
//! INV/2025-26/000001   first invoice dated on or after 1 Apr 2025 (IST)
//! INV/2025-26/000002
//! INV/2026-27/000001   first invoice dated on or after 1 Apr 2026 (IST)
//! ```
//!
//! The year is decided on the business date in India Standard Time, so an
//! invoice raised at 00:30 IST on 1 April belongs to the new year even though
//! it is still 31 March in UTC.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::{INVOICE_PREFIX, INVOICE_SEQUENCE_WIDTH};

/// IST offset from UTC in seconds (+05:30).
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Converts an instant to the calendar date in India.
pub fn business_date(instant: DateTime<Utc>) -> NaiveDate {
    match FixedOffset::east_opt(IST_OFFSET_SECS) {
        Some(ist) => instant.with_timezone(&ist).date_naive(),
        None => instant.date_naive(),
    }
}

/// A financial year, identified by the calendar year it starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FinancialYear {
    pub start_year: i32,
}

impl FinancialYear {
    /// The year containing `date`.
    pub fn for_date(date: NaiveDate) -> Self {
        let start_year = if date.month() >= 4 {
            date.year()
        } else {
            date.year() - 1
        };
        FinancialYear { start_year }
    }

    /// The year containing the IST business date of `instant`.
    pub fn for_instant(instant: DateTime<Utc>) -> Self {
        Self::for_date(business_date(instant))
    }

    /// `2025-26`.
    pub fn label(&self) -> String {
        format!(
            "{}-{:02}",
            self.start_year,
            (self.start_year + 1).rem_euclid(100)
        )
    }

    /// `INV/2025-26/`, the prefix shared by every invoice of this year.
    pub fn invoice_prefix(&self) -> String {
        invoice_prefix_with(INVOICE_PREFIX, *self)
    }
}

impl fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// `{prefix}/{FY}/` for a configurable series prefix.
pub fn invoice_prefix_with(prefix: &str, fy: FinancialYear) -> String {
    format!("{}/{}/", prefix, fy.label())
}

/// `{prefix}/{FY}/{sequence:06}`.
///
/// ```rust
/// use aurum_core::fiscal::{format_invoice_number, FinancialYear};
///
/// let fy = FinancialYear { start_year: 2025 };
/// assert_eq!(format_invoice_number("INV", fy, 42), "INV/2025-26/000042");
/// ```
pub fn format_invoice_number(prefix: &str, fy: FinancialYear, sequence: i64) -> String {
    format!(
        "{}{:0width$}",
        invoice_prefix_with(prefix, fy),
        sequence,
        width = INVOICE_SEQUENCE_WIDTH
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_year_boundaries() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(FinancialYear::for_date(d(2025, 4, 1)).label(), "2025-26");
        assert_eq!(FinancialYear::for_date(d(2026, 3, 31)).label(), "2025-26");
        assert_eq!(FinancialYear::for_date(d(2026, 4, 1)).label(), "2026-27");
        assert_eq!(FinancialYear::for_date(d(2100, 1, 15)).label(), "2099-00");
    }

    #[test]
    fn test_instant_uses_ist_date() {
        // 19:00 UTC on 31 March is 00:30 IST on 1 April
        let instant = Utc.with_ymd_and_hms(2026, 3, 31, 19, 0, 0).unwrap();
        assert_eq!(business_date(instant), NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        assert_eq!(FinancialYear::for_instant(instant).label(), "2026-27");

        let instant = Utc.with_ymd_and_hms(2026, 3, 31, 18, 0, 0).unwrap();
        assert_eq!(FinancialYear::for_instant(instant).label(), "2025-26");
    }

    #[test]
    fn test_invoice_number_format() {
        let fy = FinancialYear { start_year: 2025 };
        assert_eq!(fy.invoice_prefix(), "INV/2025-26/");
        assert_eq!(format_invoice_number("INV", fy, 1), "INV/2025-26/000001");
        assert_eq!(format_invoice_number("AJ", fy, 1_234_567), "AJ/2025-26/1234567");
    }
}
