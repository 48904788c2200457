//! # Domain Types
//!
//! Core domain types shared by the ledger and the settlement engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  StockRecord    │   │   SalesOrder    │   │    Invoice      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  item_id        │   │  order_number   │   │  invoice_number │       │
//! │  │  warehouse_id   │   │  status         │   │  party snapshot │       │
//! │  │  quantity       │   │  party_id       │   │  totals         │       │
//! │  │  reserved_qty   │   │                 │   │  status_id      │       │
//! │  │  version        │   │  1─* items      │   │  1─* items      │       │
//! │  └─────────────────┘   │  1─* payments   │   │  1─* payments   │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   MetalRate     │   │   StoneRate     │   │ CallerContext   │       │
//! │  │  purity_id      │   │  4Cs + carat    │   │  user_id        │       │
//! │  │  rate_per_gram  │   │  rate_per_carat │   │  now            │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Invoice rows copy party, company and price data at the moment of settlement.
//! Later edits to the customer master or the item master never alter a
//! historical invoice.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::pricing::LinePrice;
use crate::stock::StockLevel;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%. Jewellery GST is 300 bps (3%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Caller Context
// =============================================================================

/// Who is acting, and when.
///
/// Passed explicitly into every mutating ledger and settlement call. The
/// instant drives audit stamps, rate effectivity and the financial year of a
/// new invoice, so tests can pin it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub user_id: String,
    pub now: DateTime<Utc>,
}

impl CallerContext {
    /// Context for `user_id` at the current instant.
    pub fn new(user_id: impl Into<String>) -> Self {
        CallerContext {
            user_id: user_id.into(),
            now: Utc::now(),
        }
    }

    /// Same actor, pinned to `now`.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

// =============================================================================
// Stock
// =============================================================================

/// Quantity counters for one item in one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockRecord {
    pub id: String,
    pub item_id: String,
    pub warehouse_id: String,
    /// Units physically present.
    pub quantity: i64,
    /// Units earmarked for open orders. Never above `quantity`.
    pub reserved_quantity: i64,
    /// Bumped on every mutation; the compare-and-swap key.
    pub version: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl StockRecord {
    /// The counters as a pure value.
    #[inline]
    pub fn level(&self) -> StockLevel {
        StockLevel::new(self.quantity, self.reserved_quantity)
    }

    /// Units that can still be reserved.
    #[inline]
    pub fn available(&self) -> i64 {
        self.level().available()
    }
}

/// What a stock movement did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Record created with its first receipt.
    Open,
    Reserve,
    Release,
    Deduct,
    Restore,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Open => "open",
            MovementKind::Reserve => "reserve",
            MovementKind::Release => "release",
            MovementKind::Deduct => "deduct",
            MovementKind::Restore => "restore",
        }
    }
}

/// One journal line of the stock ledger.
///
/// `quantity` is the amount actually applied, so a clamped release records
/// what was released, not what was asked for.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub stock_record_id: String,
    pub item_id: String,
    pub warehouse_id: String,
    pub kind: MovementKind,
    pub quantity: i64,
    pub quantity_after: i64,
    pub reserved_after: i64,
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

// =============================================================================
// Parties
// =============================================================================

/// Customer master row (owned by the out-of-scope CRUD layer).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Party {
    pub id: String,
    pub name: String,
    pub address: String,
    pub gstin: Option<String>,
    /// Two-digit GST state code, e.g. "27" for Maharashtra.
    pub state_code: String,
    pub phone: Option<String>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Seller details printed on every invoice. Comes from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CompanyProfile {
    pub name: String,
    pub address: String,
    pub gstin: String,
    pub state_code: String,
}

impl Default for CompanyProfile {
    fn default() -> Self {
        CompanyProfile {
            name: "Aurum Jewellers".to_string(),
            address: "Zaveri Bazaar, Mumbai".to_string(),
            gstin: "27AAACA0000A1Z5".to_string(),
            state_code: "27".to_string(),
        }
    }
}

// =============================================================================
// Sales Orders
// =============================================================================

/// Lifecycle of a sales order.
///
/// ```text
/// Draft ──generate_invoice──► Invoiced ──cancel_invoice──► Cancelled
///   ▲            │
///   └── failure ─┘  (transaction rolled back, order stays Draft)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Items being added; each addition holds a reservation.
    #[default]
    Draft,
    /// Settled into an invoice; stock deducted.
    Invoiced,
    /// Invoice voided; stock restored.
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Invoiced => "invoiced",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// A customer order, the input to settlement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrder {
    pub id: String,
    pub order_number: String,
    pub party_id: String,
    /// Default warehouse for lines that do not name one.
    pub warehouse_id: String,
    pub status: OrderStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// A priced order line. Immutable once the order is invoiced.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrderItem {
    pub id: String,
    pub order_id: String,
    pub item_id: String,
    pub warehouse_id: String,
    pub sku: String,
    pub description: String,
    pub hsn_code: String,
    /// e.g. "22K", "18K", "925".
    pub purity_label: String,
    pub quantity: i64,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub price: LinePrice,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// How a payment was tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
    BankTransfer,
    /// Credit from an old-gold exchange.
    OldGold,
}

/// A payment recorded against an order before invoicing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub method: PaymentMethod,
    pub amount_paise: i64,
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub recorded_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_paise(self.amount_paise)
    }
}

// =============================================================================
// Invoices
// =============================================================================

/// Invoice status, stored as an integer `status_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i32)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Voided. The rows stay for audit.
    Cancelled = 0,
    Active = 1,
}

/// Invoice header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    /// `INV/{FY}/{sequence:06}`.
    pub invoice_number: String,
    /// e.g. "2025-26".
    pub fiscal_year: String,
    pub sales_order_id: Option<String>,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,

    pub party_id: String,
    pub party_name: String,
    pub party_address: String,
    pub party_gstin: Option<String>,
    pub party_state_code: String,
    pub party_phone: Option<String>,

    pub company_name: String,
    pub company_address: String,
    pub company_gstin: String,
    pub company_state_code: String,

    pub sub_total_paise: i64,
    pub discount_paise: i64,
    pub taxable_paise: i64,
    pub cgst_paise: i64,
    pub sgst_paise: i64,
    pub igst_paise: i64,
    pub grand_total_paise: i64,
    /// `grand_total - (taxable + gst)`.
    pub round_off_paise: i64,
    pub grand_total_in_words: String,
    pub total_paid_paise: i64,
    /// May be positive (customer owes); never forced to zero.
    pub balance_due_paise: i64,

    pub status_id: InvoiceStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl Invoice {
    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_paise(self.grand_total_paise)
    }

    #[inline]
    pub fn total_gst(&self) -> Money {
        Money::from_paise(self.cgst_paise + self.sgst_paise + self.igst_paise)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.status_id == InvoiceStatus::Cancelled
    }
}

/// Frozen copy of one settled order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub sales_order_item_id: String,
    pub item_id: String,
    pub warehouse_id: String,
    pub sku: String,
    pub description: String,
    pub hsn_code: String,
    pub purity_label: String,
    pub quantity: i64,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub price: LinePrice,
}

/// How much of one payment was applied to an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoicePayment {
    pub id: String,
    pub invoice_id: String,
    pub payment_id: String,
    pub allocated_paise: i64,
}

/// Header, lines and allocations, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceAggregate {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<InvoicePayment>,
}

// =============================================================================
// Rates
// =============================================================================

/// Board rate for one purity, effective from an instant.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MetalRate {
    pub id: String,
    pub purity_id: String,
    /// "gold", "silver", "platinum".
    pub metal: String,
    /// Fineness in basis points: 22K = 9167, 18K = 7500, 925 silver = 9250.
    pub purity_bps: i64,
    /// Rate for one gram at this purity.
    pub rate_per_gram_paise: i64,
    #[ts(as = "String")]
    pub effective_from: DateTime<Utc>,
}

/// Rate for a stone grade (type + 4Cs) within a carat band.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StoneRate {
    pub id: String,
    pub stone_type: String,
    pub clarity: String,
    pub color: String,
    pub cut: String,
    /// Inclusive lower bound of the carat band, in thousandths of a carat.
    pub carat_from_milli: i64,
    /// Inclusive upper bound of the carat band, in thousandths of a carat.
    pub carat_to_milli: i64,
    pub rate_per_carat_paise: i64,
    #[ts(as = "String")]
    pub effective_from: DateTime<Utc>,
}

/// The 4Cs lookup key for a stone rate. Carat picks the band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StoneCriteria {
    pub stone_type: String,
    pub clarity: String,
    pub color: String,
    pub cut: String,
    /// Weight of one stone, in thousandths of a carat.
    pub carat_milli: i64,
}

// =============================================================================
// Outbox
// =============================================================================

/// A settlement event waiting to be handed to downstream systems.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OutboxEntry {
    pub id: String,
    /// "INVOICE_GENERATED", "INVOICE_CANCELLED".
    pub event_type: String,
    pub aggregate_id: String,
    /// The full aggregate as JSON.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub published_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(300);
        assert_eq!(rate.bps(), 300);
        assert!((rate.percentage() - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_order_status_default() {
        assert_eq!(OrderStatus::default(), OrderStatus::Draft);
        assert_eq!(OrderStatus::Invoiced.as_str(), "invoiced");
    }

    #[test]
    fn test_caller_context_pinned() {
        let at = Utc.with_ymd_and_hms(2026, 3, 31, 18, 0, 0).unwrap();
        let ctx = CallerContext::new("cashier-1").at(at);
        assert_eq!(ctx.user_id, "cashier-1");
        assert_eq!(ctx.now, at);
    }

    #[test]
    fn test_stock_record_available() {
        let record = StockRecord {
            id: "s1".to_string(),
            item_id: "ring-1".to_string(),
            warehouse_id: "wh-main".to_string(),
            quantity: 5,
            reserved_quantity: 2,
            version: 0,
            updated_at: Utc::now(),
            updated_by: "test".to_string(),
        };
        assert_eq!(record.available(), 3);
    }

    #[test]
    fn test_invoice_status_serializes_by_name() {
        let json = serde_json::to_string(&InvoiceStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        assert_eq!(InvoiceStatus::Active as i32, 1);
    }
}
