//! # Settlement Math
//!
//! Invoice totals, round-off and payment allocation. The transactional
//! orchestration lives in `aurum-db`; everything here is arithmetic.
//!
//! ## Totals
//! ```text
//! sub_total   = Σ line_amount
//! discount    = Σ discount
//! taxable     = Σ taxable
//! gst         = Σ cgst + Σ sgst + Σ igst
//! unrounded   = taxable + gst
//! grand_total = round_to_rupee(unrounded)
//! round_off   = grand_total - unrounded          (in -0.50 ..= +0.50)
//! ```
//!
//! ## Allocation (FIFO by recording time)
//! ```text
//! grand_total ₹1,180    payments: ₹500 ─► 500   remaining 680
//!                                 ₹900 ─► 680   remaining 0
//!                                 ₹200 ─► (not allocated)
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::LinePrice;
use crate::types::{InvoiceItem, Payment, SalesOrderItem};

// =============================================================================
// Totals
// =============================================================================

/// Header amounts of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceTotals {
    pub sub_total: Money,
    pub discount: Money,
    pub taxable: Money,
    pub cgst: Money,
    pub sgst: Money,
    pub igst: Money,
    pub grand_total: Money,
    pub round_off: Money,
}

impl InvoiceTotals {
    /// Sums the line prices and rounds the grand total to the rupee.
    ///
    /// Fails with [`CoreError::AmountOverflow`] instead of wrapping when the
    /// lines add up past the representable range.
    ///
    /// ```rust
    /// use aurum_core::pricing::LinePrice;
    /// use aurum_core::settlement::InvoiceTotals;
    ///
    /// let line = LinePrice {
    ///     taxable_paise: 100_000,
    ///     cgst_paise: 9_000,
    ///     sgst_paise: 9_000,
    ///     ..Default::default()
    /// };
    /// let totals = InvoiceTotals::from_prices([&line]).unwrap();
    /// assert_eq!(totals.grand_total.paise(), 118_000);
    /// assert!(totals.round_off.is_zero());
    /// ```
    pub fn from_prices<'a, I>(prices: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = &'a LinePrice>,
    {
        fn add(acc: Money, paise: i64, what: &str) -> CoreResult<Money> {
            acc.checked_add(Money::from_paise(paise))
                .ok_or_else(|| CoreError::AmountOverflow(what.to_string()))
        }

        let mut totals = InvoiceTotals::default();
        for price in prices {
            totals.sub_total = add(totals.sub_total, price.line_amount_paise, "sub_total")?;
            totals.discount = add(totals.discount, price.discount_paise, "discount")?;
            totals.taxable = add(totals.taxable, price.taxable_paise, "taxable")?;
            totals.cgst = add(totals.cgst, price.cgst_paise, "cgst")?;
            totals.sgst = add(totals.sgst, price.sgst_paise, "sgst")?;
            totals.igst = add(totals.igst, price.igst_paise, "igst")?;
        }

        let gst = add(totals.cgst, totals.sgst.paise(), "gst")?;
        let gst = add(gst, totals.igst.paise(), "gst")?;
        let unrounded = add(totals.taxable, gst.paise(), "grand_total")?;
        totals.grand_total = unrounded
            .checked_round_to_rupee()
            .ok_or_else(|| CoreError::AmountOverflow("grand_total".to_string()))?;
        totals.round_off = totals.grand_total - unrounded;
        Ok(totals)
    }

    pub fn from_items(items: &[InvoiceItem]) -> CoreResult<Self> {
        Self::from_prices(items.iter().map(|item| &item.price))
    }

    #[inline]
    pub fn total_gst(&self) -> Money {
        self.cgst + self.sgst + self.igst
    }

    /// `taxable + gst` before rounding.
    #[inline]
    pub fn unrounded(&self) -> Money {
        self.taxable + self.total_gst()
    }
}

// =============================================================================
// Payment Allocation
// =============================================================================

/// One payment's share of the invoice total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Allocation {
    pub payment_id: String,
    pub amount: Money,
}

/// Allocations plus the resulting paid and due figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AllocationResult {
    pub allocations: Vec<Allocation>,
    pub total_paid: Money,
    /// `grand_total - total_paid`. Positive means the customer still owes.
    pub balance_due: Money,
}

/// Applies payments to `grand_total` in recording order.
///
/// Payments are sorted by `recorded_at` (ties keep input order). Each takes
/// `min(amount, remaining)`; allocation stops once nothing remains, so
/// overpayment is never allocated and zero-amount rows are skipped.
pub fn allocate_payments(payments: &[Payment], grand_total: Money) -> AllocationResult {
    let mut ordered: Vec<&Payment> = payments.iter().collect();
    ordered.sort_by_key(|p| p.recorded_at);

    let mut remaining = grand_total;
    let mut allocations = Vec::new();

    for payment in ordered {
        if !remaining.is_positive() {
            break;
        }
        let amount = payment.amount().min(remaining);
        if !amount.is_positive() {
            continue;
        }
        remaining -= amount;
        allocations.push(Allocation {
            payment_id: payment.id.clone(),
            amount,
        });
    }

    let total_paid: Money = allocations.iter().map(|a| a.amount).sum();
    AllocationResult {
        allocations,
        total_paid,
        balance_due: grand_total - total_paid,
    }
}

// =============================================================================
// Item Snapshot
// =============================================================================

/// Copies an order line onto an invoice line, price components verbatim.
pub fn snapshot_item(invoice_id: &str, id: String, item: &SalesOrderItem) -> InvoiceItem {
    InvoiceItem {
        id,
        invoice_id: invoice_id.to_string(),
        sales_order_item_id: item.id.clone(),
        item_id: item.item_id.clone(),
        warehouse_id: item.warehouse_id.clone(),
        sku: item.sku.clone(),
        description: item.description.clone(),
        hsn_code: item.hsn_code.clone(),
        purity_label: item.purity_label.clone(),
        quantity: item.quantity,
        price: item.price.clone(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethod;
    use chrono::{Duration, TimeZone, Utc};

    fn price(taxable: i64, cgst: i64, sgst: i64, igst: i64) -> LinePrice {
        LinePrice {
            line_amount_paise: taxable,
            taxable_paise: taxable,
            cgst_paise: cgst,
            sgst_paise: sgst,
            igst_paise: igst,
            total_paise: taxable + cgst + sgst + igst,
            ..Default::default()
        }
    }

    fn payment(id: &str, amount: i64, minutes: i64) -> Payment {
        Payment {
            id: id.to_string(),
            order_id: "so-1".to_string(),
            method: PaymentMethod::Cash,
            amount_paise: amount,
            reference: None,
            recorded_at: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    #[test]
    fn test_scenario_exact_rupee_total() {
        let totals = InvoiceTotals::from_prices([&price(100_000, 9_000, 9_000, 0)]).unwrap();
        assert_eq!(totals.taxable.paise(), 100_000);
        assert_eq!(totals.total_gst().paise(), 18_000);
        assert_eq!(totals.grand_total.paise(), 118_000);
        assert_eq!(totals.round_off.paise(), 0);
    }

    #[test]
    fn test_round_off_both_directions() {
        let down = InvoiceTotals::from_prices([&price(1_234_549, 0, 0, 0)]).unwrap();
        assert_eq!(down.grand_total.paise(), 1_234_500);
        assert_eq!(down.round_off.paise(), -49);

        let up = InvoiceTotals::from_prices([&price(1_234_400, 75, 75, 0)]).unwrap();
        assert_eq!(up.grand_total.paise(), 1_234_600);
        assert_eq!(up.round_off.paise(), 50);

        for totals in [down, up] {
            assert_eq!(totals.grand_total - totals.round_off, totals.unrounded());
        }
    }

    #[test]
    fn test_totals_sum_mixed_lines() {
        let lines = [price(50_000, 750, 750, 0), price(25_010, 0, 0, 750)];
        let totals = InvoiceTotals::from_prices(lines.iter()).unwrap();
        assert_eq!(totals.sub_total.paise(), 75_010);
        assert_eq!(totals.total_gst().paise(), 2_250);
        assert_eq!(totals.grand_total.paise(), 77_300);
        assert_eq!(totals.round_off.paise(), 40);
    }

    #[test]
    fn test_totals_overflow_is_an_error() {
        let huge = price(5_000_000_000_000_000_000, 0, 0, 0);
        let err = InvoiceTotals::from_prices([&huge, &huge]).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow(ref what) if what == "sub_total"));

        // taxable fits, taxable + gst does not
        let edge = LinePrice {
            line_amount_paise: i64::MAX - 10,
            taxable_paise: i64::MAX - 10,
            igst_paise: 20,
            ..Default::default()
        };
        let err = InvoiceTotals::from_prices([&edge]).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow(ref what) if what == "grand_total"));
    }

    #[test]
    fn test_allocation_fifo_stops_at_total() {
        let payments = vec![
            payment("late", 20_000, 30),
            payment("first", 50_000, 0),
            payment("second", 90_000, 10),
        ];
        let result = allocate_payments(&payments, Money::from_paise(118_000));

        assert_eq!(
            result.allocations,
            vec![
                Allocation {
                    payment_id: "first".to_string(),
                    amount: Money::from_paise(50_000)
                },
                Allocation {
                    payment_id: "second".to_string(),
                    amount: Money::from_paise(68_000)
                },
            ]
        );
        assert_eq!(result.total_paid.paise(), 118_000);
        assert!(result.balance_due.is_zero());
    }

    #[test]
    fn test_allocation_underpaid_and_properties() {
        let payments = vec![payment("a", 30_000, 0), payment("b", 0, 1), payment("c", 10_000, 2)];
        let grand_total = Money::from_paise(118_000);
        let result = allocate_payments(&payments, grand_total);

        assert_eq!(result.allocations.len(), 2);
        assert_eq!(result.total_paid.paise(), 40_000);
        assert_eq!(result.balance_due.paise(), 78_000);

        let paid: Money = payments.iter().map(|p| p.amount()).sum();
        assert_eq!(result.total_paid, paid.min(grand_total));
        for alloc in &result.allocations {
            let source = payments.iter().find(|p| p.id == alloc.payment_id).unwrap();
            assert!(alloc.amount <= source.amount());
        }
    }

    #[test]
    fn test_allocation_without_payments() {
        let result = allocate_payments(&[], Money::from_paise(500));
        assert!(result.allocations.is_empty());
        assert_eq!(result.balance_due.paise(), 500);
    }
}
