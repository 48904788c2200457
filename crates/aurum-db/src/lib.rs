//! # aurum-db: Storage and Transactional Services for Aurum
//!
//! SQLite persistence for the stock ledger and the invoice settlement
//! engine, built on sqlx. Every transaction boundary lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Aurum Data Flow                                  │
//! │                                                                         │
//! │  caller (counter app, back office job)                                 │
//! │       │  CallerContext { user_id, now }                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     aurum-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐  ┌──────────────────┐  ┌───────────────┐   │   │
//! │  │   │  StockLedger  │  │InvoiceSettlement │  │ SalesOrderRepo│   │   │
//! │  │   │  (ledger.rs)  │◄─│ (settlement.rs)  │  │ (order.rs)    │   │   │
//! │  │   │  CAS + retry  │  │ one tx per unit  │  │ reserve on add│   │   │
//! │  │   └───────┬───────┘  └────────┬─────────┘  └───────┬───────┘   │   │
//! │  │           │                   │                    │           │   │
//! │  │   ┌───────▼───────────────────▼────────────────────▼───────┐   │   │
//! │  │   │ repository/ (stock, invoice, order, party, rate, outbox)│   │   │
//! │  │   └───────────────────────────┬─────────────────────────────┘   │   │
//! │  └───────────────────────────────┼─────────────────────────────────┘   │
//! │                                  ▼                                      │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite (WAL)                                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, [`Database`] handle, service settings
//! - [`config`] - `aurum.toml` + environment overrides
//! - [`ledger`] - The stock ledger: availability, reserve, release, deduct, restore
//! - [`settlement`] - Order → invoice settlement and cancellation
//! - [`pricer`] - Line pricing against the rate tables
//! - [`retry`] - Bounded retry of a whole unit of work
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage and service error types
//! - [`repository`] - Row-level access (stock, orders, invoices, parties, rates, outbox)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aurum_db::{AurumConfig, Database};
//! use aurum_core::CallerContext;
//!
//! let config = AurumConfig::load(None)?;
//! let db = Database::from_config(&config).await?;
//! let ctx = CallerContext::new("cashier-1");
//!
//! let order = db.orders().create_draft(&ctx, "party-1", "wh-main").await?;
//! db.orders().add_item(&ctx, &order.id, &line).await?;
//! let invoice = db.settlement().generate_invoice(&ctx, &order.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod pricer;
pub mod repository;
pub mod retry;
pub mod settlement;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::AurumConfig;
pub use error::{DbError, DbResult, ErrorKind, LedgerError, LedgerResult};
pub use ledger::StockLedger;
pub use pool::{Database, DbConfig, ServiceSettings};
pub use pricer::OrderItemPricer;
pub use retry::RetryPolicy;
pub use settlement::InvoiceSettlement;

// Repository re-exports for convenience
pub use repository::invoice::InvoiceRepository;
pub use repository::order::{NewOrderItem, SalesOrderRepository};
pub use repository::outbox::OutboxRepository;
pub use repository::party::PartyRepository;
pub use repository::rate::RateRepository;
