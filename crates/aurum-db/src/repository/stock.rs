//! # Stock Repository
//!
//! SQL for `stock_records` and `stock_movements`.
//!
//! Every function takes a `&mut SqliteConnection` so the same statement can
//! run on a pooled connection or inside an open transaction. Only
//! [`crate::ledger::StockLedger`] (and the services that borrow its
//! transaction) call the write functions.
//!
//! ## Compare-and-Swap
//! ```text
//! SELECT ... version = 7                     (inside the transaction)
//!      │
//!      ▼  pure StockLevel::apply
//! UPDATE stock_records SET ..., version = 8
//!  WHERE id = ? AND version = 7
//!      │
//!      ├── 1 row  → our write won
//!      └── 0 rows → someone else wrote first → DbError::StaleWrite (retried)
//! ```

use sqlx::SqliteConnection;
use tracing::debug;

use aurum_core::stock::StockLevel;
use aurum_core::{CallerContext, StockMovement, StockRecord};

use crate::error::{DbError, DbResult, LedgerError, LedgerResult};

const RECORD_COLUMNS: &str = r#"
    id, item_id, warehouse_id, quantity, reserved_quantity, version, updated_at, updated_by
"#;

const MOVEMENT_COLUMNS: &str = r#"
    id, stock_record_id, item_id, warehouse_id, kind, quantity,
    quantity_after, reserved_after, reference, created_at, created_by
"#;

/// All records holding `item_id`, ordered by warehouse.
pub async fn find_by_item(conn: &mut SqliteConnection, item_id: &str) -> DbResult<Vec<StockRecord>> {
    let records = sqlx::query_as::<_, StockRecord>(&format!(
        "SELECT {} FROM stock_records WHERE item_id = ?1 ORDER BY warehouse_id",
        RECORD_COLUMNS
    ))
    .bind(item_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(records)
}

/// The record for one (item, warehouse).
pub async fn find_one(
    conn: &mut SqliteConnection,
    item_id: &str,
    warehouse_id: &str,
) -> DbResult<Option<StockRecord>> {
    let record = sqlx::query_as::<_, StockRecord>(&format!(
        "SELECT {} FROM stock_records WHERE item_id = ?1 AND warehouse_id = ?2",
        RECORD_COLUMNS
    ))
    .bind(item_id)
    .bind(warehouse_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(record)
}

/// Resolves `(item, warehouse?)` to at most one record.
///
/// Without a warehouse the item must be held in exactly one place; more
/// than one match is ambiguous and rejected.
pub async fn resolve(
    conn: &mut SqliteConnection,
    item_id: &str,
    warehouse_id: Option<&str>,
) -> LedgerResult<Option<StockRecord>> {
    match warehouse_id {
        Some(wh) => Ok(find_one(conn, item_id, wh).await?),
        None => {
            let mut records = find_by_item(conn, item_id).await?;
            match records.len() {
                0 => Ok(None),
                1 => Ok(records.pop()),
                n => Err(LedgerError::invalid_state(
                    "StockRecord",
                    item_id,
                    format!("held in {} warehouses; a warehouse must be given", n),
                )),
            }
        }
    }
}

/// Creates a record.
pub async fn insert_record(conn: &mut SqliteConnection, record: &StockRecord) -> DbResult<()> {
    debug!(item_id = %record.item_id, warehouse_id = %record.warehouse_id, "Inserting stock record");

    sqlx::query(
        r#"
        INSERT INTO stock_records (
            id, item_id, warehouse_id, quantity, reserved_quantity,
            version, updated_at, updated_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&record.id)
    .bind(&record.item_id)
    .bind(&record.warehouse_id)
    .bind(record.quantity)
    .bind(record.reserved_quantity)
    .bind(record.version)
    .bind(record.updated_at)
    .bind(&record.updated_by)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Writes `level` if the row still carries `record.version`.
///
/// Returns the record as written.
pub async fn compare_and_swap(
    conn: &mut SqliteConnection,
    record: &StockRecord,
    level: StockLevel,
    ctx: &CallerContext,
) -> DbResult<StockRecord> {
    let result = sqlx::query(
        r#"
        UPDATE stock_records SET
            quantity = ?1,
            reserved_quantity = ?2,
            version = version + 1,
            updated_at = ?3,
            updated_by = ?4
        WHERE id = ?5 AND version = ?6
        "#,
    )
    .bind(level.quantity)
    .bind(level.reserved)
    .bind(ctx.now)
    .bind(&ctx.user_id)
    .bind(&record.id)
    .bind(record.version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        debug!(id = %record.id, version = record.version, "Stock record changed underneath us");
        return Err(DbError::stale("StockRecord", &record.id));
    }

    Ok(StockRecord {
        quantity: level.quantity,
        reserved_quantity: level.reserved,
        version: record.version + 1,
        updated_at: ctx.now,
        updated_by: ctx.user_id.clone(),
        ..record.clone()
    })
}

/// Appends a journal line.
pub async fn insert_movement(conn: &mut SqliteConnection, movement: &StockMovement) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, stock_record_id, item_id, warehouse_id, kind, quantity,
            quantity_after, reserved_after, reference, created_at, created_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.stock_record_id)
    .bind(&movement.item_id)
    .bind(&movement.warehouse_id)
    .bind(movement.kind)
    .bind(movement.quantity)
    .bind(movement.quantity_after)
    .bind(movement.reserved_after)
    .bind(&movement.reference)
    .bind(movement.created_at)
    .bind(&movement.created_by)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Journal of one record, oldest first.
pub async fn list_movements(
    conn: &mut SqliteConnection,
    stock_record_id: &str,
) -> DbResult<Vec<StockMovement>> {
    let movements = sqlx::query_as::<_, StockMovement>(&format!(
        "SELECT {} FROM stock_movements WHERE stock_record_id = ?1 ORDER BY created_at, rowid",
        MOVEMENT_COLUMNS
    ))
    .bind(stock_record_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(movements)
}
