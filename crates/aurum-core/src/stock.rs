//! # Stock Counter Transitions
//!
//! The arithmetic behind the stock ledger, kept pure so every rule can be
//! tested without a database.
//!
//! ## Counters
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  quantity          ████████████████████  10  units on the shelf         │
//! │  reserved_quantity ████████               4  held for draft orders     │
//! │  available                 ████████████   6  = quantity - reserved     │
//! │                                                                         │
//! │  Invariant after every committed mutation:                              │
//! │      0 <= reserved_quantity <= quantity                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//! | op      | quantity     | reserved                  | fails when            |
//! |---------|--------------|---------------------------|-----------------------|
//! | reserve | -            | + qty                     | available < qty       |
//! | release | -            | - min(qty, reserved)      | never (saturating)    |
//! | deduct  | - qty        | - min(qty, reserved)      | quantity < qty        |
//! | restore | + qty        | -                         | never                 |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

// =============================================================================
// Stock Level
// =============================================================================

/// The two counters of a stock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub quantity: i64,
    pub reserved: i64,
}

/// A requested change to a stock level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "quantity", rename_all = "snake_case")]
pub enum StockOp {
    Reserve(i64),
    Release(i64),
    Deduct(i64),
    Restore(i64),
}

impl StockOp {
    /// The quantity the caller asked for.
    pub fn requested(&self) -> i64 {
        match *self {
            StockOp::Reserve(q) | StockOp::Release(q) | StockOp::Deduct(q) | StockOp::Restore(q) => q,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StockOp::Reserve(_) => "reserve",
            StockOp::Release(_) => "release",
            StockOp::Deduct(_) => "deduct",
            StockOp::Restore(_) => "restore",
        }
    }
}

/// Result of applying a [`StockOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub before: StockLevel,
    pub after: StockLevel,
    /// Units the operation actually moved. Smaller than requested only for a
    /// clamped release.
    pub applied: i64,
}

impl Transition {
    /// True when a release asked for more than was reserved.
    pub fn was_clamped(&self, op: StockOp) -> bool {
        self.applied < op.requested()
    }
}

/// Why an operation was refused. Expected business outcome, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockRejection {
    /// Reserve: not enough unreserved stock.
    InsufficientAvailable { available: i64, requested: i64 },
    /// Deduct: not enough physical stock.
    InsufficientOnHand { on_hand: i64, requested: i64 },
    /// Restore would overflow the counter.
    Overflow,
}

impl StockLevel {
    pub const fn new(quantity: i64, reserved: i64) -> Self {
        StockLevel { quantity, reserved }
    }

    /// Units that can still be reserved.
    #[inline]
    pub const fn available(&self) -> i64 {
        self.quantity - self.reserved
    }

    /// `0 <= reserved <= quantity`.
    #[inline]
    pub const fn is_consistent(&self) -> bool {
        self.reserved >= 0 && self.reserved <= self.quantity
    }

    /// Availability check with no side effect.
    #[inline]
    pub const fn can_reserve(&self, qty: i64) -> bool {
        self.available() >= qty
    }

    /// Computes the level after `op`.
    ///
    /// ## Example
    /// ```rust
    /// use aurum_core::stock::{StockLevel, StockOp};
    ///
    /// let level = StockLevel::new(5, 2);
    /// let t = level.apply(StockOp::Deduct(3)).unwrap();
    /// assert_eq!(t.after, StockLevel::new(2, 0));
    ///
    /// let t = level.apply(StockOp::Release(10)).unwrap();
    /// assert_eq!(t.after.reserved, 0);
    /// assert_eq!(t.applied, 2);
    /// ```
    pub fn apply(&self, op: StockOp) -> Result<Transition, StockRejection> {
        let before = *self;
        let (after, applied) = match op {
            StockOp::Reserve(qty) => {
                if !self.can_reserve(qty) {
                    return Err(StockRejection::InsufficientAvailable {
                        available: self.available(),
                        requested: qty,
                    });
                }
                (StockLevel::new(self.quantity, self.reserved + qty), qty)
            }
            StockOp::Release(qty) => {
                // saturating by policy
                let released = qty.min(self.reserved);
                (StockLevel::new(self.quantity, self.reserved - released), released)
            }
            StockOp::Deduct(qty) => {
                if self.quantity < qty {
                    return Err(StockRejection::InsufficientOnHand {
                        on_hand: self.quantity,
                        requested: qty,
                    });
                }
                let consumed = qty.min(self.reserved);
                (
                    StockLevel::new(self.quantity - qty, self.reserved - consumed),
                    qty,
                )
            }
            StockOp::Restore(qty) => {
                let quantity = self
                    .quantity
                    .checked_add(qty)
                    .ok_or(StockRejection::Overflow)?;
                (StockLevel::new(quantity, self.reserved), qty)
            }
        };

        debug_assert!(!before.is_consistent() || after.is_consistent());

        Ok(Transition {
            before,
            after,
            applied,
        })
    }
}

// =============================================================================
// Batch Validation
// =============================================================================

/// One line of an availability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockRequest {
    pub item_id: String,
    pub warehouse_id: Option<String>,
    pub quantity: i64,
}

impl StockRequest {
    pub fn new(item_id: impl Into<String>, warehouse_id: Option<&str>, quantity: i64) -> Self {
        StockRequest {
            item_id: item_id.into(),
            warehouse_id: warehouse_id.map(str::to_string),
            quantity,
        }
    }
}

/// A line that cannot be covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockShortfall {
    pub item_id: String,
    pub warehouse_id: Option<String>,
    pub requested: i64,
    /// What was left for this line; 0 when the record is missing.
    pub available: i64,
}

impl StockShortfall {
    pub fn new(
        item_id: impl Into<String>,
        warehouse_id: Option<&str>,
        requested: i64,
        available: i64,
    ) -> Self {
        StockShortfall {
            item_id: item_id.into(),
            warehouse_id: warehouse_id.map(str::to_string),
            requested,
            available,
        }
    }
}

/// Outcome of checking many lines at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchValidation {
    pub is_valid: bool,
    pub errors: Vec<StockShortfall>,
}

/// Checks every line; never stops at the first failure.
///
/// `lookup` resolves a line to its stock record key and current level
/// (`None` when no record exists). Lines that resolve to the same record draw
/// down the same availability in order, so two lines of 3 against 5
/// available report the second line short.
pub fn validate_batch<F>(lines: &[StockRequest], mut lookup: F) -> BatchValidation
where
    F: FnMut(&StockRequest) -> Option<(String, StockLevel)>,
{
    let mut drawn: HashMap<String, i64> = HashMap::new();
    let mut errors = Vec::new();

    for line in lines {
        match lookup(line) {
            Some((key, level)) => {
                let already = drawn.entry(key).or_insert(0);
                let remaining = level.available() - *already;
                if remaining >= line.quantity {
                    *already += line.quantity;
                } else {
                    errors.push(StockShortfall::new(
                        line.item_id.clone(),
                        line.warehouse_id.as_deref(),
                        line.quantity,
                        remaining.max(0),
                    ));
                }
            }
            None => errors.push(StockShortfall::new(
                line.item_id.clone(),
                line.warehouse_id.as_deref(),
                line.quantity,
                0,
            )),
        }
    }

    BatchValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_scenario() {
        let level = StockLevel::new(5, 2);
        assert_eq!(level.available(), 3);
        assert!(level.can_reserve(3));
        assert!(!level.can_reserve(4));
    }

    #[test]
    fn test_reserve_rejects_beyond_available() {
        let level = StockLevel::new(5, 2);
        assert_eq!(
            level.apply(StockOp::Reserve(4)),
            Err(StockRejection::InsufficientAvailable {
                available: 3,
                requested: 4
            })
        );
        let t = level.apply(StockOp::Reserve(3)).unwrap();
        assert_eq!(t.after, StockLevel::new(5, 5));
        assert!(t.after.is_consistent());
    }

    #[test]
    fn test_release_is_saturating() {
        let level = StockLevel::new(5, 2);
        let op = StockOp::Release(7);
        let t = level.apply(op).unwrap();
        assert_eq!(t.after, StockLevel::new(5, 0));
        assert_eq!(t.applied, 2);
        assert!(t.was_clamped(op));
    }

    #[test]
    fn test_deduct_consumes_reservation() {
        // reservation smaller than deduction: reservation cleared, stock reduced by full qty
        let t = StockLevel::new(10, 1).apply(StockOp::Deduct(3)).unwrap();
        assert_eq!(t.after, StockLevel::new(7, 0));

        let t = StockLevel::new(10, 6).apply(StockOp::Deduct(3)).unwrap();
        assert_eq!(t.after, StockLevel::new(7, 3));

        assert_eq!(
            StockLevel::new(2, 2).apply(StockOp::Deduct(3)),
            Err(StockRejection::InsufficientOnHand {
                on_hand: 2,
                requested: 3
            })
        );
    }

    #[test]
    fn test_restore_leaves_reservation_alone() {
        let t = StockLevel::new(4, 1).apply(StockOp::Restore(3)).unwrap();
        assert_eq!(t.after, StockLevel::new(7, 1));
        assert_eq!(
            StockLevel::new(i64::MAX, 0).apply(StockOp::Restore(1)),
            Err(StockRejection::Overflow)
        );
    }

    #[test]
    fn test_inverse_pairs() {
        let start = StockLevel::new(9, 4);

        let deducted = start.apply(StockOp::Deduct(2)).unwrap().after;
        let restored = deducted.apply(StockOp::Restore(2)).unwrap().after;
        assert_eq!(restored.quantity, start.quantity);

        let reserved = start.apply(StockOp::Reserve(3)).unwrap().after;
        let released = reserved.apply(StockOp::Release(3)).unwrap().after;
        assert_eq!(released.reserved, start.reserved);
    }

    #[test]
    fn test_invariant_holds_over_operation_sequence() {
        let ops = [
            StockOp::Reserve(4),
            StockOp::Deduct(6),
            StockOp::Release(9),
            StockOp::Reserve(2),
            StockOp::Restore(1),
            StockOp::Deduct(3),
            StockOp::Reserve(5),
        ];
        let mut level = StockLevel::new(10, 0);
        for op in ops {
            if let Ok(t) = level.apply(op) {
                level = t.after;
            }
            assert!(level.is_consistent(), "{:?} broke {:?}", op, level);
        }
    }

    #[test]
    fn test_validate_batch_reports_every_line() {
        let lines = vec![
            StockRequest::new("ring-1", Some("wh-main"), 3),
            StockRequest::new("ring-1", Some("wh-main"), 3),
            StockRequest::new("missing", None, 1),
            StockRequest::new("chain-9", Some("wh-main"), 1),
        ];

        let result = validate_batch(&lines, |line| match line.item_id.as_str() {
            "ring-1" => Some(("s-ring".to_string(), StockLevel::new(7, 2))),
            "chain-9" => Some(("s-chain".to_string(), StockLevel::new(1, 0))),
            _ => None,
        });

        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec![
                StockShortfall::new("ring-1", Some("wh-main"), 3, 2),
                StockShortfall::new("missing", None, 1, 0),
            ]
        );
    }

    #[test]
    fn test_stock_op_serialization() {
        let json = serde_json::to_string(&StockOp::Reserve(2)).unwrap();
        assert_eq!(json, r#"{"op":"reserve","quantity":2}"#);
    }
}
