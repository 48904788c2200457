//! # Stock Ledger
//!
//! The only writer of `stock_records`.
//!
//! ## One Mutation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  retry.run("reserve", ...)                                             │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │  BEGIN                                                            │  │
//! │  │  1. resolve (item, warehouse?) → StockRecord { version: 7 }       │  │
//! │  │  2. StockLevel::apply(Reserve(2))   (pure, aurum-core)            │  │
//! │  │       └── rejected? → return false, nothing written               │  │
//! │  │  3. UPDATE ... WHERE id = ? AND version = 7                       │  │
//! │  │       └── 0 rows? → StaleWrite ──► rollback, back off, re-run     │  │
//! │  │  4. INSERT INTO stock_movements                                   │  │
//! │  │  COMMIT                                                           │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Order and settlement code runs steps 1-4 through [`apply_in`] on their
//! own transaction, so a reservation or a deduction commits or rolls back
//! together with the rest of their work.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use aurum_core::stock::{self as stock_math, BatchValidation, StockLevel, StockOp, StockRejection, StockRequest, Transition};
use aurum_core::validation::validate_stock_quantity;
use aurum_core::{CallerContext, MovementKind, StockMovement, StockRecord, ValidationError};

use crate::error::{DbError, LedgerError, LedgerResult};
use crate::repository::stock;
use crate::retry::RetryPolicy;

// =============================================================================
// In-transaction primitive
// =============================================================================

/// What happened to one ledger operation.
#[derive(Debug, Clone)]
pub(crate) enum LedgerOutcome {
    /// Written and journalled. `record` is the row as committed.
    Applied {
        record: StockRecord,
        transition: Transition,
    },
    /// The counters did not allow it; nothing was written.
    Rejected(StockRejection),
    /// No stock record for this (item, warehouse).
    Missing,
}

fn movement_kind(op: StockOp) -> MovementKind {
    match op {
        StockOp::Reserve(_) => MovementKind::Reserve,
        StockOp::Release(_) => MovementKind::Release,
        StockOp::Deduct(_) => MovementKind::Deduct,
        StockOp::Restore(_) => MovementKind::Restore,
    }
}

/// Applies `op` on `conn`, which the caller may be holding a transaction on.
///
/// A transition that changes nothing (release against zero reserved) is
/// not written. A lost compare-and-swap surfaces as a retryable
/// [`DbError::StaleWrite`].
pub(crate) async fn apply_in(
    conn: &mut SqliteConnection,
    ctx: &CallerContext,
    item_id: &str,
    warehouse_id: Option<&str>,
    op: StockOp,
    reference: Option<&str>,
) -> LedgerResult<LedgerOutcome> {
    let record = match stock::resolve(conn, item_id, warehouse_id).await? {
        Some(record) => record,
        None => return Ok(LedgerOutcome::Missing),
    };

    let transition = match record.level().apply(op) {
        Ok(t) => t,
        Err(rejection) => {
            debug!(item_id, warehouse_id = %record.warehouse_id, op = op.name(), ?rejection, "Stock operation rejected");
            return Ok(LedgerOutcome::Rejected(rejection));
        }
    };

    if transition.was_clamped(op) {
        warn!(
            item_id,
            warehouse_id = %record.warehouse_id,
            requested = op.requested(),
            released = transition.applied,
            "Release exceeded reserved quantity; clamped"
        );
    }

    if transition.after == transition.before {
        return Ok(LedgerOutcome::Applied { record, transition });
    }

    let written = stock::compare_and_swap(conn, &record, transition.after, ctx).await?;

    stock::insert_movement(
        conn,
        &StockMovement {
            id: Uuid::new_v4().to_string(),
            stock_record_id: written.id.clone(),
            item_id: written.item_id.clone(),
            warehouse_id: written.warehouse_id.clone(),
            kind: movement_kind(op),
            quantity: transition.applied,
            quantity_after: written.quantity,
            reserved_after: written.reserved_quantity,
            reference: reference.map(str::to_string),
            created_at: ctx.now,
            created_by: ctx.user_id.clone(),
        },
    )
    .await?;

    Ok(LedgerOutcome::Applied {
        record: written,
        transition,
    })
}

// =============================================================================
// Service
// =============================================================================

/// Stock counters per (item, warehouse).
///
/// ## Usage
/// ```rust,ignore
/// let ledger = db.stock_ledger();
/// let ctx = CallerContext::new("cashier-1");
///
/// if ledger.reserve(&ctx, "ring-1", Some("wh-main"), 1).await? {
///     // held for the order
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl StockLedger {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        StockLedger { pool, retry }
    }

    /// True when `qty` units are unreserved. A missing record is not
    /// available.
    pub async fn check_availability(
        &self,
        item_id: &str,
        warehouse_id: Option<&str>,
        qty: i64,
    ) -> LedgerResult<bool> {
        validate_stock_quantity(qty)?;

        let mut conn = self.pool.acquire().await?;
        let record = stock::resolve(&mut conn, item_id, warehouse_id).await?;

        Ok(record.map_or(false, |r| r.level().can_reserve(qty)))
    }

    /// Checks every line and reports every shortfall.
    ///
    /// Lines hitting the same record draw down its availability in order.
    pub async fn validate_batch(&self, lines: &[StockRequest]) -> LedgerResult<BatchValidation> {
        for line in lines {
            validate_stock_quantity(line.quantity)?;
        }

        let mut conn = self.pool.acquire().await?;
        let mut resolved: Vec<Option<(String, StockLevel)>> = Vec::with_capacity(lines.len());
        for line in lines {
            let record = stock::resolve(&mut conn, &line.item_id, line.warehouse_id.as_deref()).await?;
            resolved.push(record.map(|r| (r.id.clone(), r.level())));
        }

        // validate_batch calls the lookup once per line, in order
        let mut levels = resolved.into_iter();
        let result = stock_math::validate_batch(lines, |_| levels.next().flatten());

        debug!(lines = lines.len(), errors = result.errors.len(), "Validated stock batch");
        Ok(result)
    }

    /// Holds `qty` units. False, with nothing written, when the record is
    /// missing or too few units are available.
    pub async fn reserve(
        &self,
        ctx: &CallerContext,
        item_id: &str,
        warehouse_id: Option<&str>,
        qty: i64,
    ) -> LedgerResult<bool> {
        validate_stock_quantity(qty)?;

        let outcome = self.mutate(ctx, item_id, warehouse_id, StockOp::Reserve(qty)).await?;
        Ok(matches!(outcome, LedgerOutcome::Applied { .. }))
    }

    /// Gives back up to `qty` reserved units. Releasing more than is
    /// reserved clamps to zero.
    pub async fn release(
        &self,
        ctx: &CallerContext,
        item_id: &str,
        warehouse_id: Option<&str>,
        qty: i64,
    ) -> LedgerResult<()> {
        validate_stock_quantity(qty)?;

        match self.mutate(ctx, item_id, warehouse_id, StockOp::Release(qty)).await? {
            LedgerOutcome::Missing => Err(LedgerError::not_found("StockRecord", item_id)),
            _ => Ok(()),
        }
    }

    /// Removes `qty` units from the shelf, consuming reservations first.
    /// False when fewer than `qty` units are on hand.
    pub async fn deduct(
        &self,
        ctx: &CallerContext,
        item_id: &str,
        warehouse_id: Option<&str>,
        qty: i64,
    ) -> LedgerResult<bool> {
        validate_stock_quantity(qty)?;

        let outcome = self.mutate(ctx, item_id, warehouse_id, StockOp::Deduct(qty)).await?;
        Ok(matches!(outcome, LedgerOutcome::Applied { .. }))
    }

    /// Puts `qty` units back on the shelf. Reservations are untouched.
    pub async fn restore(
        &self,
        ctx: &CallerContext,
        item_id: &str,
        warehouse_id: Option<&str>,
        qty: i64,
    ) -> LedgerResult<()> {
        validate_stock_quantity(qty)?;

        match self.mutate(ctx, item_id, warehouse_id, StockOp::Restore(qty)).await? {
            LedgerOutcome::Applied { .. } => Ok(()),
            LedgerOutcome::Missing => Err(LedgerError::not_found("StockRecord", item_id)),
            LedgerOutcome::Rejected(_) => Err(LedgerError::invalid_state(
                "StockRecord",
                item_id,
                "restore would overflow the quantity",
            )),
        }
    }

    /// The record for `(item, warehouse?)`, if any.
    pub async fn get_by_item(
        &self,
        item_id: &str,
        warehouse_id: Option<&str>,
    ) -> LedgerResult<Option<StockRecord>> {
        let mut conn = self.pool.acquire().await?;
        stock::resolve(&mut conn, item_id, warehouse_id).await
    }

    /// Creates the record for a first receipt of `item_id` into
    /// `warehouse_id`.
    pub async fn open_record(
        &self,
        ctx: &CallerContext,
        item_id: &str,
        warehouse_id: &str,
        quantity: i64,
    ) -> LedgerResult<StockRecord> {
        aurum_core::validation::validate_required("item_id", item_id, 100)?;
        aurum_core::validation::validate_required("warehouse_id", warehouse_id, 100)?;
        if quantity < 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        let record = StockRecord {
            id: Uuid::new_v4().to_string(),
            item_id: item_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            quantity,
            reserved_quantity: 0,
            version: 0,
            updated_at: ctx.now,
            updated_by: ctx.user_id.clone(),
        };

        let mut tx = self.pool.begin().await?;

        match stock::insert_record(&mut tx, &record).await {
            Ok(()) => {}
            Err(DbError::UniqueViolation { .. }) => {
                return Err(LedgerError::invalid_state(
                    "StockRecord",
                    format!("{}@{}", item_id, warehouse_id),
                    "a record already exists",
                ));
            }
            Err(e) => return Err(e.into()),
        }

        stock::insert_movement(
            &mut tx,
            &StockMovement {
                id: Uuid::new_v4().to_string(),
                stock_record_id: record.id.clone(),
                item_id: record.item_id.clone(),
                warehouse_id: record.warehouse_id.clone(),
                kind: MovementKind::Open,
                quantity,
                quantity_after: quantity,
                reserved_after: 0,
                reference: None,
                created_at: ctx.now,
                created_by: ctx.user_id.clone(),
            },
        )
        .await?;

        tx.commit().await?;

        info!(item_id, warehouse_id, quantity, "Opened stock record");
        Ok(record)
    }

    /// Journal of the record for `(item, warehouse?)`, oldest first.
    pub async fn movements(
        &self,
        item_id: &str,
        warehouse_id: Option<&str>,
    ) -> LedgerResult<Vec<StockMovement>> {
        let mut conn = self.pool.acquire().await?;
        let record = stock::resolve(&mut conn, item_id, warehouse_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("StockRecord", item_id))?;

        Ok(stock::list_movements(&mut conn, &record.id).await?)
    }

    /// One operation in its own transaction, retried on conflict.
    async fn mutate(
        &self,
        ctx: &CallerContext,
        item_id: &str,
        warehouse_id: Option<&str>,
        op: StockOp,
    ) -> LedgerResult<LedgerOutcome> {
        let pool = &self.pool;

        let outcome = self
            .retry
            .run(op.name(), move || async move {
                let mut tx = pool.begin().await?;
                let outcome = apply_in(&mut tx, ctx, item_id, warehouse_id, op, None).await?;
                if let LedgerOutcome::Applied { .. } = outcome {
                    tx.commit().await?;
                }
                Ok(outcome)
            })
            .await?;

        if let LedgerOutcome::Applied { record, transition } = &outcome {
            info!(
                item_id,
                warehouse_id = %record.warehouse_id,
                op = op.name(),
                applied = transition.applied,
                quantity = record.quantity,
                reserved = record.reserved_quantity,
                "Stock updated"
            );
        }

        Ok(outcome)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pool::{Database, DbConfig};
    use std::time::Duration;

    async fn ledger_with(quantity: i64, reserved: i64) -> (Database, StockLedger, CallerContext) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = db.stock_ledger();
        let ctx = CallerContext::new("tester");

        ledger.open_record(&ctx, "ring-1", "wh-main", quantity).await.unwrap();
        if reserved > 0 {
            assert!(ledger.reserve(&ctx, "ring-1", Some("wh-main"), reserved).await.unwrap());
        }
        (db, ledger, ctx)
    }

    async fn level(ledger: &StockLedger) -> (i64, i64) {
        let record = ledger.get_by_item("ring-1", Some("wh-main")).await.unwrap().unwrap();
        (record.quantity, record.reserved_quantity)
    }

    #[tokio::test]
    async fn test_check_availability() {
        let (_db, ledger, _ctx) = ledger_with(5, 2).await;

        assert!(ledger.check_availability("ring-1", Some("wh-main"), 3).await.unwrap());
        assert!(!ledger.check_availability("ring-1", Some("wh-main"), 4).await.unwrap());
        assert!(!ledger.check_availability("ring-9", Some("wh-main"), 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_positive_quantity_is_rejected() {
        let (_db, ledger, ctx) = ledger_with(5, 0).await;

        let err = ledger.reserve(&ctx, "ring-1", Some("wh-main"), 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = ledger.check_availability("ring-1", None, -1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_reserve_then_release_round_trips() {
        let (_db, ledger, ctx) = ledger_with(10, 0).await;

        assert!(ledger.reserve(&ctx, "ring-1", Some("wh-main"), 4).await.unwrap());
        assert_eq!(level(&ledger).await, (10, 4));

        ledger.release(&ctx, "ring-1", Some("wh-main"), 4).await.unwrap();
        assert_eq!(level(&ledger).await, (10, 0));
    }

    #[tokio::test]
    async fn test_reserve_denied_leaves_record_untouched() {
        let (_db, ledger, ctx) = ledger_with(5, 2).await;
        let before = ledger.get_by_item("ring-1", None).await.unwrap().unwrap();

        assert!(!ledger.reserve(&ctx, "ring-1", Some("wh-main"), 4).await.unwrap());
        assert!(!ledger.reserve(&ctx, "ring-9", Some("wh-main"), 1).await.unwrap());

        let after = ledger.get_by_item("ring-1", None).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_release_clamps_to_zero() {
        let (_db, ledger, ctx) = ledger_with(10, 2).await;

        ledger.release(&ctx, "ring-1", Some("wh-main"), 5).await.unwrap();
        assert_eq!(level(&ledger).await, (10, 0));

        let journal = ledger.movements("ring-1", Some("wh-main")).await.unwrap();
        let last = journal.last().unwrap();
        assert_eq!(last.kind, MovementKind::Release);
        assert_eq!(last.quantity, 2);
    }

    #[tokio::test]
    async fn test_release_on_missing_record_is_not_found() {
        let (_db, ledger, ctx) = ledger_with(10, 0).await;
        let err = ledger.release(&ctx, "ring-9", Some("wh-main"), 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_deduct_consumes_reservation_and_restore_reverses() {
        let (_db, ledger, ctx) = ledger_with(5, 2).await;

        assert!(ledger.deduct(&ctx, "ring-1", Some("wh-main"), 3).await.unwrap());
        assert_eq!(level(&ledger).await, (2, 0));

        assert!(!ledger.deduct(&ctx, "ring-1", Some("wh-main"), 3).await.unwrap());
        assert_eq!(level(&ledger).await, (2, 0));

        ledger.restore(&ctx, "ring-1", Some("wh-main"), 3).await.unwrap();
        assert_eq!(level(&ledger).await, (5, 0));
    }

    #[tokio::test]
    async fn test_omitted_warehouse() {
        let (_db, ledger, ctx) = ledger_with(5, 0).await;

        assert!(ledger.reserve(&ctx, "ring-1", None, 1).await.unwrap());

        ledger.open_record(&ctx, "ring-1", "wh-branch", 3).await.unwrap();
        let err = ledger.reserve(&ctx, "ring-1", None, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        assert!(ledger.reserve(&ctx, "ring-1", Some("wh-branch"), 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_open_record_twice_is_invalid_state() {
        let (_db, ledger, ctx) = ledger_with(5, 0).await;
        let err = ledger.open_record(&ctx, "ring-1", "wh-main", 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_validate_batch_reports_every_line() {
        let (_db, ledger, ctx) = ledger_with(5, 0).await;
        ledger.open_record(&ctx, "chain-1", "wh-main", 1).await.unwrap();

        let result = ledger
            .validate_batch(&[
                StockRequest::new("ring-1", Some("wh-main"), 3),
                StockRequest::new("ring-1", Some("wh-main"), 3),
                StockRequest::new("chain-1", Some("wh-main"), 2),
                StockRequest::new("bangle-1", Some("wh-main"), 1),
            ])
            .await
            .unwrap();

        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 3);
        assert_eq!(result.errors[0].item_id, "ring-1");
        assert_eq!(result.errors[0].available, 2);
        assert_eq!(result.errors[1].item_id, "chain-1");
        assert_eq!(result.errors[2].item_id, "bangle-1");
        assert_eq!(result.errors[2].available, 0);
    }

    #[tokio::test]
    async fn test_movement_journal() {
        let (_db, ledger, ctx) = ledger_with(10, 0).await;

        ledger.reserve(&ctx, "ring-1", Some("wh-main"), 2).await.unwrap();
        ledger.deduct(&ctx, "ring-1", Some("wh-main"), 2).await.unwrap();
        ledger.restore(&ctx, "ring-1", Some("wh-main"), 1).await.unwrap();

        let kinds: Vec<MovementKind> = ledger
            .movements("ring-1", Some("wh-main"))
            .await
            .unwrap()
            .iter()
            .map(|m| m.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                MovementKind::Open,
                MovementKind::Reserve,
                MovementKind::Deduct,
                MovementKind::Restore
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_reserves_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("ledger.db")).max_connections(4))
            .await
            .unwrap();
        let ctx = CallerContext::new("tester");
        db.stock_ledger().open_record(&ctx, "ring-1", "wh-main", 10).await.unwrap();

        let retry = RetryPolicy {
            max_attempts: 50,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(20),
        };

        let mut handles = Vec::new();
        for n in 0..20 {
            let ledger = StockLedger::new(db.pool().clone(), retry.clone());
            let ctx = CallerContext::new(format!("cashier-{}", n));
            handles.push(tokio::spawn(async move {
                ledger.reserve(&ctx, "ring-1", Some("wh-main"), 1).await
            }));
        }

        let mut granted = 0;
        let mut denied = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                granted += 1;
            } else {
                denied += 1;
            }
        }

        let record = db
            .stock_ledger()
            .get_by_item("ring-1", Some("wh-main"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!((granted, denied), (10, 10));
        assert_eq!(record.reserved_quantity, 10);
        assert_eq!(record.quantity, 10);
    }
}
