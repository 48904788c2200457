//! # Invoice Repository
//!
//! Invoice headers, frozen lines, payment allocations and the per-series
//! number counter.
//!
//! ## Numbering
//! ```text
//! invoice_sequences
//! ┌──────────────────┬────────────┐
//! │ series           │ last_value │
//! ├──────────────────┼────────────┤
//! │ INV/2025-26/     │ 1843       │
//! │ INV/2026-27/     │ 12         │ ◄── upsert +1 RETURNING → INV/2026-27/000013
//! └──────────────────┴────────────┘
//! ```
//! The first draw of a series starts after the highest number already on
//! `invoices`, so a lost counter row never reissues a number. The UNIQUE
//! constraint on `invoice_number` is the last line of defence; a collision
//! is retryable.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use aurum_core::{CallerContext, Invoice, InvoiceAggregate, InvoiceItem, InvoicePayment, InvoiceStatus};

use super::{bind_price, placeholders, PRICE_COLUMNS, PRICE_COLUMN_COUNT};
use crate::error::DbResult;

const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, fiscal_year, sales_order_id, invoice_date,
    party_id, party_name, party_address, party_gstin, party_state_code, party_phone,
    company_name, company_address, company_gstin, company_state_code,
    sub_total_paise, discount_paise, taxable_paise, cgst_paise, sgst_paise, igst_paise,
    grand_total_paise, round_off_paise, grand_total_in_words,
    total_paid_paise, balance_due_paise,
    status_id, created_at, created_by, updated_at, updated_by
"#;

const INVOICE_COLUMN_COUNT: usize = 31;

const ITEM_COLUMNS: &str = r#"
    id, invoice_id, sales_order_item_id, item_id, warehouse_id,
    sku, description, hsn_code, purity_label, quantity
"#;

const ITEM_COLUMN_COUNT: usize = 10;

// =============================================================================
// Connection-level functions
// =============================================================================

/// Draws the next sequence number of `series` (e.g. `INV/2026-27/`).
pub async fn next_sequence(conn: &mut SqliteConnection, series: &str) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO invoice_sequences (series, last_value)
        VALUES (
            ?1,
            (SELECT COALESCE(MAX(CAST(substr(invoice_number, length(?1) + 1) AS INTEGER)), 0)
               FROM invoices
              WHERE substr(invoice_number, 1, length(?1)) = ?1) + 1
        )
        ON CONFLICT (series) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(series)
    .fetch_one(&mut *conn)
    .await?;

    debug!(series = %series, value, "Drew invoice sequence");
    Ok(value)
}

/// Writes the header.
pub async fn insert_invoice(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
    debug!(invoice_number = %invoice.invoice_number, "Inserting invoice");

    sqlx::query(&format!(
        "INSERT INTO invoices ({}) VALUES ({})",
        INVOICE_COLUMNS,
        placeholders(INVOICE_COLUMN_COUNT)
    ))
    .bind(&invoice.id)
    .bind(&invoice.invoice_number)
    .bind(&invoice.fiscal_year)
    .bind(&invoice.sales_order_id)
    .bind(invoice.invoice_date)
    .bind(&invoice.party_id)
    .bind(&invoice.party_name)
    .bind(&invoice.party_address)
    .bind(&invoice.party_gstin)
    .bind(&invoice.party_state_code)
    .bind(&invoice.party_phone)
    .bind(&invoice.company_name)
    .bind(&invoice.company_address)
    .bind(&invoice.company_gstin)
    .bind(&invoice.company_state_code)
    .bind(invoice.sub_total_paise)
    .bind(invoice.discount_paise)
    .bind(invoice.taxable_paise)
    .bind(invoice.cgst_paise)
    .bind(invoice.sgst_paise)
    .bind(invoice.igst_paise)
    .bind(invoice.grand_total_paise)
    .bind(invoice.round_off_paise)
    .bind(&invoice.grand_total_in_words)
    .bind(invoice.total_paid_paise)
    .bind(invoice.balance_due_paise)
    .bind(invoice.status_id)
    .bind(invoice.created_at)
    .bind(&invoice.created_by)
    .bind(invoice.updated_at)
    .bind(&invoice.updated_by)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Writes the frozen lines.
pub async fn insert_items(conn: &mut SqliteConnection, items: &[InvoiceItem]) -> DbResult<()> {
    let sql = format!(
        "INSERT INTO invoice_items ({}, {}) VALUES ({})",
        ITEM_COLUMNS,
        PRICE_COLUMNS,
        placeholders(ITEM_COLUMN_COUNT + PRICE_COLUMN_COUNT)
    );

    for item in items {
        let query = sqlx::query(&sql)
            .bind(&item.id)
            .bind(&item.invoice_id)
            .bind(&item.sales_order_item_id)
            .bind(&item.item_id)
            .bind(&item.warehouse_id)
            .bind(&item.sku)
            .bind(&item.description)
            .bind(&item.hsn_code)
            .bind(&item.purity_label)
            .bind(item.quantity);

        bind_price(query, &item.price).execute(&mut *conn).await?;
    }

    Ok(())
}

/// Writes the payment allocations.
pub async fn insert_allocations(
    conn: &mut SqliteConnection,
    allocations: &[InvoicePayment],
) -> DbResult<()> {
    for allocation in allocations {
        sqlx::query(
            r#"
            INSERT INTO invoice_payments (id, invoice_id, payment_id, allocated_paise)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&allocation.id)
        .bind(&allocation.invoice_id)
        .bind(&allocation.payment_id)
        .bind(allocation.allocated_paise)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn find_by_number(
    conn: &mut SqliteConnection,
    invoice_number: &str,
) -> DbResult<Option<Invoice>> {
    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {} FROM invoices WHERE invoice_number = ?1",
        INVOICE_COLUMNS
    ))
    .bind(invoice_number)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(invoice)
}

pub async fn find_by_order(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Option<Invoice>> {
    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {} FROM invoices WHERE sales_order_id = ?1",
        INVOICE_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(invoice)
}

pub async fn list_items(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
    let items = sqlx::query_as::<_, InvoiceItem>(&format!(
        "SELECT {}, {} FROM invoice_items WHERE invoice_id = ?1 ORDER BY rowid",
        ITEM_COLUMNS, PRICE_COLUMNS
    ))
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

pub async fn list_allocations(
    conn: &mut SqliteConnection,
    invoice_id: &str,
) -> DbResult<Vec<InvoicePayment>> {
    let allocations = sqlx::query_as::<_, InvoicePayment>(
        r#"
        SELECT id, invoice_id, payment_id, allocated_paise
        FROM invoice_payments
        WHERE invoice_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(allocations)
}

/// Header plus lines and allocations.
pub async fn load_aggregate(conn: &mut SqliteConnection, invoice: Invoice) -> DbResult<InvoiceAggregate> {
    let items = list_items(conn, &invoice.id).await?;
    let payments = list_allocations(conn, &invoice.id).await?;

    Ok(InvoiceAggregate {
        invoice,
        items,
        payments,
    })
}

/// Moves an invoice from `from` to `to`. Returns false when the invoice was
/// not in `from`.
pub async fn transition_status(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    from: InvoiceStatus,
    to: InvoiceStatus,
    ctx: &CallerContext,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE invoices SET
            status_id = ?1,
            updated_at = ?2,
            updated_by = ?3
        WHERE id = ?4 AND status_id = ?5
        "#,
    )
    .bind(to)
    .bind(ctx.now)
    .bind(&ctx.user_id)
    .bind(invoice_id)
    .bind(from)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to settled invoices.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Gets an invoice aggregate by its number.
    pub async fn get_by_number(&self, invoice_number: &str) -> DbResult<Option<InvoiceAggregate>> {
        let mut conn = self.pool.acquire().await?;
        match find_by_number(&mut conn, invoice_number).await? {
            Some(invoice) => Ok(Some(load_aggregate(&mut conn, invoice).await?)),
            None => Ok(None),
        }
    }

    /// Gets the invoice settled from `order_id`.
    pub async fn get_by_order(&self, order_id: &str) -> DbResult<Option<InvoiceAggregate>> {
        let mut conn = self.pool.acquire().await?;
        match find_by_order(&mut conn, order_id).await? {
            Some(invoice) => Ok(Some(load_aggregate(&mut conn, invoice).await?)),
            None => Ok(None),
        }
    }

    /// Headers of one financial year (`"2026-27"`), in number order.
    pub async fn list_by_fiscal_year(&self, fiscal_year: &str) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE fiscal_year = ?1 ORDER BY invoice_number",
            INVOICE_COLUMNS
        ))
        .bind(fiscal_year)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }
}
