//! # Repository Module
//!
//! SQL for each table group, behind small typed functions.
//!
//! ## Two Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Repository structs (own a SqlitePool)                                 │
//! │    db.rates().latest_metal_rate("22K", now)                            │
//! │    db.invoices().get_by_number("INV/2026-27/000001")                   │
//! │                                                                         │
//! │  Connection-level functions (take &mut SqliteConnection)               │
//! │    stock::compare_and_swap(&mut tx, ...)                               │
//! │    invoice::insert_invoice(&mut tx, ...)                               │
//! │    outbox::enqueue(&mut tx, ...)                                       │
//! │                                                                         │
//! │  The services compose the second kind inside one transaction.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`invoice::InvoiceRepository`] - Invoice aggregates, numbering
//! - [`order::SalesOrderRepository`] - Draft order workflow
//! - [`outbox::OutboxRepository`] - Event outbox
//! - [`party::PartyRepository`] - Customer lookups
//! - [`rate::RateRepository`] - Metal and stone rates
//! - [`stock`] - Stock records and the movement journal

pub mod invoice;
pub mod order;
pub mod outbox;
pub mod party;
pub mod rate;
pub mod stock;

use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;

use aurum_core::pricing::LinePrice;

/// The [`LinePrice`] columns shared by `sales_order_items` and
/// `invoice_items`, in [`bind_price`] order.
pub(crate) const PRICE_COLUMNS: &str = r#"
    gross_weight_mg, net_weight_mg, metal_rate_paise, metal_amount_paise,
    wastage_paise, making_charges_paise, stone_amount_paise, line_amount_paise,
    discount_paise, taxable_paise, gst_rate_bps, cgst_paise, sgst_paise,
    igst_paise, total_paise
"#;

/// Number of columns in [`PRICE_COLUMNS`].
pub(crate) const PRICE_COLUMN_COUNT: usize = 15;

/// Binds the price breakdown in [`PRICE_COLUMNS`] order.
pub(crate) fn bind_price<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    price: &LinePrice,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(price.gross_weight_mg)
        .bind(price.net_weight_mg)
        .bind(price.metal_rate_paise)
        .bind(price.metal_amount_paise)
        .bind(price.wastage_paise)
        .bind(price.making_charges_paise)
        .bind(price.stone_amount_paise)
        .bind(price.line_amount_paise)
        .bind(price.discount_paise)
        .bind(price.taxable_paise)
        .bind(price.gst_rate_bps)
        .bind(price.cgst_paise)
        .bind(price.sgst_paise)
        .bind(price.igst_paise)
        .bind(price.total_paise)
}

/// `?, ?, ...` for `count` positional parameters.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
