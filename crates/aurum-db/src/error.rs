//! # Database Error Types
//!
//! Storage errors and the error taxonomy of the ledger and settlement
//! services.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← constraint / busy / stale-write categorisation              │
//! │       │                                                                 │
//! │       │        CoreError (aurum-core) ← business rule violations       │
//! │       │             │                                                   │
//! │       ▼             ▼                                                   │
//! │  LedgerError ← what StockLedger / InvoiceSettlement callers see        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ErrorKind ← stable, serializable; the caller picks a status code      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Retryable Errors
//! Busy/locked database, a lost compare-and-swap on a stock row and an
//! invoice-number collision are transient. The retry loop re-runs the whole
//! unit of work for these and only these.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use aurum_core::stock::StockShortfall;
use aurum_core::{CoreError, ValidationError};

// =============================================================================
// Database Error
// =============================================================================

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two settlements drew the same invoice number
    /// - A second stock record for the same (item, warehouse)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation, e.g. `reserved_quantity > quantity`.
    #[error("Check constraint failed: {message}")]
    CheckViolation { message: String },

    /// SQLITE_BUSY / SQLITE_LOCKED: another writer holds the lock.
    #[error("Database is busy: {0}")]
    Busy(String),

    /// A compare-and-swap update matched no row: someone else wrote first.
    #[error("Stale write to {entity} {id}")]
    StaleWrite { entity: String, id: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Payload could not be encoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Configuration file or environment override is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a StaleWrite error.
    pub fn stale(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::StaleWrite {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// True for errors that go away when the unit of work is re-run.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::Busy(_) | DbError::StaleWrite { .. } | DbError::PoolExhausted => true,
            DbError::UniqueViolation { field, .. } => field.contains("invoice_number"),
            _ => false,
        }
    }
}

/// SQLite primary/extended result codes we classify.
fn is_busy_code(code: &str) -> bool {
    // SQLITE_BUSY, SQLITE_LOCKED, BUSY_RECOVERY, BUSY_SNAPSHOT, LOCKED_SHAREDCACHE
    matches!(code, "5" | "6" | "261" | "517" | "262")
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → code / message decide the constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();

                if is_busy_code(&code)
                    || msg.contains("database is locked")
                    || msg.contains("database table is locked")
                {
                    DbError::Busy(msg)
                } else if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation { message: msg }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation { message: msg }
                } else {
                    DbError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Ledger Error
// =============================================================================

/// Errors returned by `StockLedger`, `InvoiceSettlement` and the order
/// workflow.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("{entity} {id} cannot be changed: {reason}")]
    InvalidState {
        entity: String,
        id: String,
        reason: String,
    },

    /// Every line that could not be covered.
    #[error("Insufficient stock on {} line(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),

    /// Retries exhausted while racing other writers.
    #[error("{operation} gave up after {attempts} attempt(s) due to concurrent updates")]
    ConcurrencyConflict { operation: String, attempts: u32 },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Persistence failure: {0}")]
    Persistence(DbError),
}

/// Stable category of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InsufficientStock,
    ConcurrencyConflict,
    Validation,
    PersistenceFailure,
}

impl LedgerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid_state(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        LedgerError::InvalidState {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::InvalidState { .. } => ErrorKind::InvalidState,
            LedgerError::InsufficientStock(_) => ErrorKind::InsufficientStock,
            LedgerError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            LedgerError::Validation(_) => ErrorKind::Validation,
            LedgerError::Persistence(_) => ErrorKind::PersistenceFailure,
        }
    }

    /// True when re-running the unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Persistence(e) if e.is_retryable())
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            other => LedgerError::Persistence(other),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::RateUnavailable { kind, key } => LedgerError::NotFound {
                entity: format!("{} rate", kind),
                id: key,
            },
            CoreError::AmountOverflow(what) => {
                LedgerError::Validation(ValidationError::InvalidFormat {
                    field: what,
                    reason: "amount out of range".to_string(),
                })
            }
            CoreError::Validation(v) => LedgerError::Validation(v),
        }
    }
}

/// Result type for ledger and settlement operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DbError::Busy("database is locked".into()).is_retryable());
        assert!(DbError::stale("StockRecord", "s1").is_retryable());
        assert!(DbError::duplicate("invoices.invoice_number", "INV/2025-26/000001").is_retryable());
        assert!(!DbError::duplicate("stock_records.item_id, stock_records.warehouse_id", "x")
            .is_retryable());
        assert!(!DbError::not_found("Invoice", "x").is_retryable());

        let err: LedgerError = DbError::stale("StockRecord", "s1").into();
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    }

    #[test]
    fn test_db_not_found_becomes_ledger_not_found() {
        let err: LedgerError = DbError::not_found("SalesOrder", "so-1").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "SalesOrder not found: so-1");
    }

    #[test]
    fn test_core_error_mapping() {
        let err: LedgerError = CoreError::AmountOverflow("sub_total".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: LedgerError = CoreError::RateUnavailable {
            kind: "metal".into(),
            key: "22K".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_error_kind_serializes_stably() {
        let json = serde_json::to_string(&ErrorKind::ConcurrencyConflict).unwrap();
        assert_eq!(json, "\"CONCURRENCY_CONFLICT\"");
    }
}
