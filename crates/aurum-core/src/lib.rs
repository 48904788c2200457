//! # aurum-core: Pure Business Logic for the Aurum Settlement Engine
//!
//! This crate holds every calculation the stock ledger and the invoice
//! settlement engine perform, as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Aurum Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Request-handling layer (out of scope)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   aurum-db: StockLedger, InvoiceSettlement, OrderItemPricer     │   │
//! │  │   (transactions, SQLite, retry)                                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ pure calls                             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ aurum-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌────────────┐ ┌───────────────┐   │   │
//! │  │   │  stock   │ │ pricing  │ │ settlement │ │ fiscal/words  │   │   │
//! │  │   │ counters │ │ line GST │ │ totals,    │ │ INV/25-26/..  │   │   │
//! │  │   │ reserve  │ │ making   │ │ round-off, │ │ crore/lakh    │   │   │
//! │  │   │ deduct   │ │ wastage  │ │ allocation │ │               │   │   │
//! │  │   └──────────┘ └──────────┘ └────────────┘ └───────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (stock records, orders, invoices, rates)
//! - [`money`] - Money in paise with integer arithmetic
//! - [`stock`] - Stock counter transitions (reserve, release, deduct, restore)
//! - [`pricing`] - Line-item pricing for jewellery
//! - [`settlement`] - Invoice totals, round-off and payment allocation
//! - [`fiscal`] - Indian financial year and invoice numbering
//! - [`words`] - Amount in words with Indian digit grouping
//! - [`exchange`] - Buy-back / exchange valuation
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input, same output. The clock is an argument.
//! 2. **No I/O**: database, network and file system access are forbidden here
//! 3. **Integer Money**: amounts in paise (i64), weights in milligrams, rates in basis points
//! 4. **Explicit Errors**: typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use aurum_core::money::Money;
//! use aurum_core::words::amount_in_words;
//!
//! let total = Money::from_paise(118_000); // ₹1,180.00
//! assert_eq!(amount_in_words(total), "One Thousand One Hundred Eighty Rupees");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod exchange;
pub mod fiscal;
pub mod money;
pub mod pricing;
pub mod settlement;
pub mod stock;
pub mod types;
pub mod validation;
pub mod words;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Prefix of every sales invoice number (`INV/2025-26/000001`).
pub const INVOICE_PREFIX: &str = "INV";

/// Width of the zero-padded per-year invoice sequence.
pub const INVOICE_SEQUENCE_WIDTH: usize = 6;

/// GST on gold, silver and diamond jewellery: 3%.
pub const DEFAULT_JEWELLERY_GST_BPS: u32 = 300;

/// Maximum quantity of a single SKU on one order line.
///
/// ## Business Reason
/// Jewellery lines are almost always single pieces; a four-digit quantity is a
/// typing mistake, not an order.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum number of lines on a single sales order.
pub const MAX_ORDER_LINES: usize = 200;

/// Ceiling for any single amount on an order line (₹10 lakh crore).
///
/// Keeps the sum of a full order well inside i64 paise.
pub const MAX_LINE_AMOUNT_PAISE: i64 = 1_000_000_000_000_000;
