//! # Sales Order Repository
//!
//! The draft-order workflow that feeds settlement.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CREATE DRAFT                                                       │
//! │     └── create_draft() → SalesOrder { status: Draft }                  │
//! │                                                                         │
//! │  2. ADD ITEMS (each one reserves stock in the same transaction)        │
//! │     └── add_item() → SalesOrderItem        reserved += qty             │
//! │     └── remove_item()                      reserved -= qty             │
//! │                                                                         │
//! │  3. TAKE PAYMENTS                                                      │
//! │     └── add_payment() → Payment                                        │
//! │                                                                         │
//! │  4. SETTLE (InvoiceSettlement)                                         │
//! │     └── Draft → Invoiced → (optional) Cancelled                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use aurum_core::pricing::LinePrice;
use aurum_core::stock::{StockOp, StockRejection, StockShortfall};
use aurum_core::validation::{
    validate_line_price, validate_order_size, validate_payment_amount, validate_quantity,
    validate_required, validate_sku,
};
use aurum_core::{CallerContext, OrderStatus, Payment, PaymentMethod, SalesOrder, SalesOrderItem};

use super::{bind_price, party, placeholders, PRICE_COLUMNS, PRICE_COLUMN_COUNT};
use crate::error::{DbResult, LedgerError, LedgerResult};
use crate::ledger::{apply_in, LedgerOutcome};
use crate::retry::RetryPolicy;

const ORDER_COLUMNS: &str =
    "id, order_number, party_id, warehouse_id, status, created_at, updated_at, updated_by";

const ITEM_COLUMNS: &str = r#"
    id, order_id, item_id, warehouse_id, sku, description, hsn_code, purity_label, quantity
"#;

const ITEM_COLUMN_COUNT: usize = 9;

/// A priced line to add to a draft order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub item_id: String,
    /// Defaults to the order's warehouse.
    pub warehouse_id: Option<String>,
    pub sku: String,
    pub description: String,
    pub hsn_code: String,
    pub purity_label: String,
    pub quantity: i64,
    /// From [`crate::pricer::OrderItemPricer::price`].
    pub price: LinePrice,
}

// =============================================================================
// Connection-level functions
// =============================================================================

pub async fn find_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<SalesOrder>> {
    let order = sqlx::query_as::<_, SalesOrder>(&format!(
        "SELECT {} FROM sales_orders WHERE id = ?1",
        ORDER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(order)
}

/// Lines of an order, in the order they were added.
pub async fn list_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<SalesOrderItem>> {
    let items = sqlx::query_as::<_, SalesOrderItem>(&format!(
        "SELECT {}, {}, created_at FROM sales_order_items WHERE order_id = ?1 ORDER BY created_at, rowid",
        ITEM_COLUMNS, PRICE_COLUMNS
    ))
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

/// Payments of an order, oldest first.
pub async fn list_payments(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<Payment>> {
    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, order_id, method, amount_paise, reference, recorded_at
        FROM payments
        WHERE order_id = ?1
        ORDER BY recorded_at, rowid
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(payments)
}

/// Moves an order from `from` to `to`. Returns false when it was not in
/// `from`.
pub async fn transition_status(
    conn: &mut SqliteConnection,
    order_id: &str,
    from: OrderStatus,
    to: OrderStatus,
    ctx: &CallerContext,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE sales_orders SET
            status = ?1,
            updated_at = ?2,
            updated_by = ?3
        WHERE id = ?4 AND status = ?5
        "#,
    )
    .bind(to)
    .bind(ctx.now)
    .bind(&ctx.user_id)
    .bind(order_id)
    .bind(from)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

async fn touch(conn: &mut SqliteConnection, order_id: &str, ctx: &CallerContext) -> DbResult<()> {
    sqlx::query("UPDATE sales_orders SET updated_at = ?1, updated_by = ?2 WHERE id = ?3")
        .bind(ctx.now)
        .bind(&ctx.user_id)
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Loads an order that must still be a draft.
pub(crate) async fn draft_order(conn: &mut SqliteConnection, order_id: &str) -> LedgerResult<SalesOrder> {
    let order = find_order(conn, order_id)
        .await?
        .ok_or_else(|| LedgerError::not_found("SalesOrder", order_id))?;

    if order.status != OrderStatus::Draft {
        return Err(LedgerError::invalid_state(
            "SalesOrder",
            order_id,
            format!("order is {}, not draft", order.status.as_str()),
        ));
    }
    Ok(order)
}

/// `SO-20260416-3F9A1C2B`.
fn generate_order_number(ctx: &CallerContext) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();
    format!("SO-{}-{}", ctx.now.format("%Y%m%d"), suffix.to_uppercase())
}

// =============================================================================
// Repository
// =============================================================================

/// Draft orders, their lines and payments.
#[derive(Debug, Clone)]
pub struct SalesOrderRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl SalesOrderRepository {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        SalesOrderRepository { pool, retry }
    }

    /// Opens a draft order for `party_id`, taking stock from `warehouse_id`
    /// unless a line says otherwise.
    pub async fn create_draft(
        &self,
        ctx: &CallerContext,
        party_id: &str,
        warehouse_id: &str,
    ) -> LedgerResult<SalesOrder> {
        validate_required("warehouse_id", warehouse_id, 100)?;

        let mut conn = self.pool.acquire().await?;
        if party::find(&mut conn, party_id).await?.is_none() {
            return Err(LedgerError::not_found("Party", party_id));
        }

        let order = SalesOrder {
            id: Uuid::new_v4().to_string(),
            order_number: generate_order_number(ctx),
            party_id: party_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            status: OrderStatus::Draft,
            created_at: ctx.now,
            updated_at: ctx.now,
            updated_by: ctx.user_id.clone(),
        };

        debug!(id = %order.id, order_number = %order.order_number, "Creating draft order");

        sqlx::query(&format!(
            "INSERT INTO sales_orders ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            ORDER_COLUMNS
        ))
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.party_id)
        .bind(&order.warehouse_id)
        .bind(order.status)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(&order.updated_by)
        .execute(&mut *conn)
        .await?;

        Ok(order)
    }

    /// Adds a line and reserves its stock in one transaction.
    ///
    /// A denied reservation fails with `InsufficientStock` and adds nothing.
    pub async fn add_item(
        &self,
        ctx: &CallerContext,
        order_id: &str,
        item: &NewOrderItem,
    ) -> LedgerResult<SalesOrderItem> {
        validate_required("item_id", &item.item_id, 100)?;
        validate_sku(&item.sku)?;
        validate_required("description", &item.description, 200)?;
        validate_required("hsn_code", &item.hsn_code, 8)?;
        validate_quantity(item.quantity)?;
        validate_line_price(&item.price)?;

        let pool = &self.pool;
        let line = self
            .retry
            .run("add_item", move || async move {
                let mut tx = pool.begin().await?;

                let order = draft_order(&mut tx, order_id).await?;
                let lines: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM sales_order_items WHERE order_id = ?1")
                        .bind(order_id)
                        .fetch_one(&mut *tx)
                        .await?;
                validate_order_size(lines as usize)?;

                let warehouse_id = item.warehouse_id.clone().unwrap_or(order.warehouse_id);
                let outcome = apply_in(
                    &mut tx,
                    ctx,
                    &item.item_id,
                    Some(warehouse_id.as_str()),
                    StockOp::Reserve(item.quantity),
                    Some(order_id),
                )
                .await?;

                match outcome {
                    LedgerOutcome::Applied { .. } => {}
                    LedgerOutcome::Rejected(StockRejection::InsufficientAvailable { available, .. }) => {
                        return Err(LedgerError::InsufficientStock(vec![StockShortfall::new(
                            &item.item_id,
                            Some(warehouse_id.as_str()),
                            item.quantity,
                            available,
                        )]));
                    }
                    LedgerOutcome::Rejected(_) | LedgerOutcome::Missing => {
                        return Err(LedgerError::InsufficientStock(vec![StockShortfall::new(
                            &item.item_id,
                            Some(warehouse_id.as_str()),
                            item.quantity,
                            0,
                        )]));
                    }
                }

                let line = SalesOrderItem {
                    id: Uuid::new_v4().to_string(),
                    order_id: order_id.to_string(),
                    item_id: item.item_id.clone(),
                    warehouse_id,
                    sku: item.sku.clone(),
                    description: item.description.clone(),
                    hsn_code: item.hsn_code.clone(),
                    purity_label: item.purity_label.clone(),
                    quantity: item.quantity,
                    price: item.price.clone(),
                    created_at: ctx.now,
                };

                let sql = format!(
                    "INSERT INTO sales_order_items ({}, {}, created_at) VALUES ({})",
                    ITEM_COLUMNS,
                    PRICE_COLUMNS,
                    placeholders(ITEM_COLUMN_COUNT + PRICE_COLUMN_COUNT + 1)
                );
                let query = sqlx::query(&sql)
                    .bind(&line.id)
                    .bind(&line.order_id)
                    .bind(&line.item_id)
                    .bind(&line.warehouse_id)
                    .bind(&line.sku)
                    .bind(&line.description)
                    .bind(&line.hsn_code)
                    .bind(&line.purity_label)
                    .bind(line.quantity);
                bind_price(query, &line.price)
                    .bind(line.created_at)
                    .execute(&mut *tx)
                    .await?;

                touch(&mut tx, order_id, ctx).await?;
                tx.commit().await?;
                Ok(line)
            })
            .await?;

        info!(
            order_id,
            item_id = %line.item_id,
            warehouse_id = %line.warehouse_id,
            quantity = line.quantity,
            "Added order line"
        );
        Ok(line)
    }

    /// Removes a line and releases its reservation in one transaction.
    pub async fn remove_item(
        &self,
        ctx: &CallerContext,
        order_id: &str,
        line_id: &str,
    ) -> LedgerResult<()> {
        let pool = &self.pool;
        self.retry
            .run("remove_item", move || async move {
                let mut tx = pool.begin().await?;

                draft_order(&mut tx, order_id).await?;
                let line = list_items(&mut tx, order_id)
                    .await?
                    .into_iter()
                    .find(|l| l.id == line_id)
                    .ok_or_else(|| LedgerError::not_found("SalesOrderItem", line_id))?;

                apply_in(
                    &mut tx,
                    ctx,
                    &line.item_id,
                    Some(line.warehouse_id.as_str()),
                    StockOp::Release(line.quantity),
                    Some(order_id),
                )
                .await?;

                sqlx::query("DELETE FROM sales_order_items WHERE id = ?1")
                    .bind(line_id)
                    .execute(&mut *tx)
                    .await?;

                touch(&mut tx, order_id, ctx).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;

        info!(order_id, line_id, "Removed order line");
        Ok(())
    }

    /// Records a payment against a draft order.
    pub async fn add_payment(
        &self,
        ctx: &CallerContext,
        order_id: &str,
        method: PaymentMethod,
        amount_paise: i64,
        reference: Option<&str>,
    ) -> LedgerResult<Payment> {
        validate_payment_amount(amount_paise)?;

        let mut tx = self.pool.begin().await?;
        draft_order(&mut tx, order_id).await?;

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            method,
            amount_paise,
            reference: reference.map(str::to_string),
            recorded_at: ctx.now,
        };

        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, method, amount_paise, reference, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.method)
        .bind(payment.amount_paise)
        .bind(&payment.reference)
        .bind(payment.recorded_at)
        .execute(&mut *tx)
        .await?;

        touch(&mut tx, order_id, ctx).await?;
        tx.commit().await?;

        debug!(order_id, amount_paise, "Recorded payment");
        Ok(payment)
    }

    pub async fn get(&self, order_id: &str) -> DbResult<Option<SalesOrder>> {
        let mut conn = self.pool.acquire().await?;
        find_order(&mut conn, order_id).await
    }

    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<SalesOrderItem>> {
        let mut conn = self.pool.acquire().await?;
        list_items(&mut conn, order_id).await
    }

    pub async fn get_payments(&self, order_id: &str) -> DbResult<Vec<Payment>> {
        let mut conn = self.pool.acquire().await?;
        list_payments(&mut conn, order_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
