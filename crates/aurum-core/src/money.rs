//! # Money Module
//!
//! Provides the `Money` type for rupee amounts.
//!
//! ## Why Integer Paise?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  An invoice must reconcile to the paisa:                                │
//! │    grand_total - round_off == taxable + cgst + sgst + igst              │
//! │                                                                         │
//! │  OUR SOLUTION: every amount is an i64 count of paise (1/100 rupee),    │
//! │  rates are basis points, weights are milligrams.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use aurum_core::money::Money;
//!
//! let making = Money::from_paise(45_050); // ₹450.50
//! let doubled = making * 2;
//! assert_eq!(doubled.paise(), 90_100);
//! assert_eq!(Money::from_rupees(1180).round_to_rupee(), Money::from_rupees(1180));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A rupee amount in paise (the smallest currency unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: round-off and balance due can be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serialized as the raw paise count**: the database and API both use paise
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise.
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee portion (truncated toward zero).
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero rupees.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// `self + other`, or `None` when the sum leaves the i64 range.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// Calculates tax on this amount, rounding half away from zero to the paisa.
    ///
    /// ## Example
    /// ```rust
    /// use aurum_core::money::Money;
    /// use aurum_core::types::TaxRate;
    ///
    /// // ₹1,000.00 at 3% GST = ₹30.00
    /// let gst = Money::from_rupees(1000).calculate_tax(TaxRate::from_bps(300));
    /// assert_eq!(gst.paise(), 3000);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.apply_bps(rate.bps())
    }

    /// Returns `self × bps / 10000`, rounded half away from zero.
    ///
    /// Used for every percentage in the pricing rules: wastage, making
    /// charges quoted as a percentage, discounts, GST.
    pub fn apply_bps(&self, bps: u32) -> Money {
        Money::from_paise(div_round(self.0 as i128 * bps as i128, 10_000))
    }

    /// Multiplies by a line quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Rounds to the nearest whole rupee, half away from zero.
    ///
    /// ## Invoice Round-Off
    /// ```text
    /// unrounded  = ₹12,345.49  →  grand_total = ₹12,345.00, round_off = -0.49
    /// unrounded  = ₹12,345.50  →  grand_total = ₹12,346.00, round_off = +0.50
    /// ```
    pub fn round_to_rupee(&self) -> Money {
        Money(div_round(self.0 as i128, 100) * 100)
    }

    /// [`Money::round_to_rupee`], or `None` when rounding up leaves the
    /// i64 range.
    pub fn checked_round_to_rupee(&self) -> Option<Money> {
        i64::try_from(div_round_wide(self.0 as i128, 100) * 100)
            .ok()
            .map(Money)
    }

    /// Half of this amount and the remainder, so that `a + b == self`.
    ///
    /// The first half takes the odd paisa. Used for the CGST/SGST split.
    pub fn split_half(&self) -> (Money, Money) {
        let first = div_round(self.0 as i128, 2);
        (Money(first), Money(self.0 - first))
    }
}

/// Integer division rounding half away from zero.
pub(crate) fn div_round(numerator: i128, denominator: i128) -> i64 {
    div_round_wide(numerator, denominator) as i64
}

/// [`div_round`] without narrowing, for callers that check the range.
pub(crate) fn div_round_wide(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display with Indian digit grouping, e.g. `₹12,34,567.89`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let digits = self.rupees().abs().to_string();

        // last three digits, then groups of two
        let grouped = if digits.len() <= 3 {
            digits
        } else {
            let (head, tail) = digits.split_at(digits.len() - 3);
            let mut groups: Vec<&str> = Vec::new();
            let mut end = head.len();
            while end > 0 {
                let start = end.saturating_sub(2);
                groups.push(&head[start..end]);
                end = start;
            }
            groups.reverse();
            format!("{},{}", groups.join(","), tail)
        };

        write!(f, "{}₹{}.{:02}", sign, grouped, self.paise_part())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
