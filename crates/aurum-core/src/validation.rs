//! # Validation Module
//!
//! Input validation for ledger and settlement calls.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (request-handling layer, out of scope)                │
//! │  └── Deserialization, basic shape                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Quantities positive, amounts in range                             │
//! │  └── GSTIN / state code / SKU formats                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (0 <= reserved_quantity <= quantity)                        │
//! │  ├── UNIQUE (item_id, warehouse_id), UNIQUE invoice_number             │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use aurum_core::validation::{validate_gstin, validate_quantity};
//!
//! validate_quantity(2).unwrap();
//! validate_gstin("27AAACA0000A1Z5").unwrap();
//! ```

use crate::error::ValidationError;
use crate::pricing::LinePrice;
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_AMOUNT_PAISE, MAX_ORDER_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Non-empty after trimming, at most `max` characters.
pub fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a SKU.
///
/// ## Rules
/// - 1 to 50 characters
/// - Letters, digits, hyphens, underscores
///
/// ```rust
/// use aurum_core::validation::validate_sku;
///
/// assert!(validate_sku("RNG-22K-0042").is_ok());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    validate_required("sku", sku, 50)?;

    if !sku
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a two-digit GST state code ("01" to "38", "97" other territory).
pub fn validate_state_code(code: &str) -> ValidationResult<()> {
    let invalid = || ValidationError::InvalidFormat {
        field: "state_code".to_string(),
        reason: "must be a two-digit GST state code".to_string(),
    };

    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    match code.parse::<u8>() {
        Ok(1..=38) | Ok(97) => Ok(()),
        _ => Err(invalid()),
    }
}

/// Validates a GSTIN.
///
/// ## Layout
/// ```text
/// 27 AAACA0000A 1 Z 5
/// ── ────────── ─ ─ ─
/// │  │          │ │ └─ check character
/// │  │          │ └─── always 'Z'
/// │  │          └───── entity number
/// │  └──────────────── PAN
/// └─────────────────── state code
/// ```
/// The check character is not verified.
pub fn validate_gstin(gstin: &str) -> ValidationResult<()> {
    let gstin = gstin.trim();
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "gstin".to_string(),
        reason: reason.to_string(),
    };

    if gstin.len() != 15 {
        return Err(invalid("must be 15 characters"));
    }
    if !gstin
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
    {
        return Err(invalid("must contain only digits and upper-case letters"));
    }
    validate_state_code(&gstin[..2]).map_err(|_| invalid("must start with a state code"))?;
    if gstin.as_bytes()[13] != b'Z' {
        return Err(invalid("14th character must be Z"));
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order-line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a ledger quantity. Receipts may exceed the order-line cap.
pub fn validate_stock_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a payment amount in paise.
pub fn validate_payment_amount(paise: i64) -> ValidationResult<()> {
    if paise <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a GST rate in basis points.
///
/// ## Rules
/// - 0 to 2800 (the highest GST slab is 28%)
pub fn validate_gst_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 2800 {
        return Err(ValidationError::OutOfRange {
            field: "gst_rate".to_string(),
            min: 0,
            max: 2800,
        });
    }

    Ok(())
}

/// Validates a rate in paise (metal per gram, stone per carat).
pub fn validate_rate_paise(field: &str, paise: i64) -> ValidationResult<()> {
    if paise <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that an order can take one more line.
pub fn validate_order_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "order lines".to_string(),
            min: 0,
            max: MAX_ORDER_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Line Price Validators
// =============================================================================

/// Validates a price breakdown supplied with an order line.
///
/// ## Rules
/// - Every amount, weight and rate is between 0 and MAX_LINE_AMOUNT_PAISE
/// - `taxable == line_amount - discount`
/// - `total == taxable + cgst + sgst + igst`
///
/// ```rust
/// use aurum_core::pricing::LinePrice;
/// use aurum_core::validation::validate_line_price;
///
/// let price = LinePrice {
///     line_amount_paise: 100_000,
///     taxable_paise: 100_000,
///     cgst_paise: 1_500,
///     sgst_paise: 1_500,
///     total_paise: 103_000,
///     ..Default::default()
/// };
/// assert!(validate_line_price(&price).is_ok());
/// ```
pub fn validate_line_price(price: &LinePrice) -> ValidationResult<()> {
    let components = [
        ("gross_weight_mg", price.gross_weight_mg),
        ("net_weight_mg", price.net_weight_mg),
        ("metal_rate_paise", price.metal_rate_paise),
        ("metal_amount_paise", price.metal_amount_paise),
        ("wastage_paise", price.wastage_paise),
        ("making_charges_paise", price.making_charges_paise),
        ("stone_amount_paise", price.stone_amount_paise),
        ("line_amount_paise", price.line_amount_paise),
        ("discount_paise", price.discount_paise),
        ("taxable_paise", price.taxable_paise),
        ("gst_rate_bps", price.gst_rate_bps),
        ("cgst_paise", price.cgst_paise),
        ("sgst_paise", price.sgst_paise),
        ("igst_paise", price.igst_paise),
        ("total_paise", price.total_paise),
    ];
    for (field, value) in components {
        if !(0..=MAX_LINE_AMOUNT_PAISE).contains(&value) {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                min: 0,
                max: MAX_LINE_AMOUNT_PAISE,
            });
        }
    }

    // in range, so none of these sums can overflow
    if price.taxable_paise != price.line_amount_paise - price.discount_paise {
        return Err(ValidationError::InvalidFormat {
            field: "taxable_paise".to_string(),
            reason: "must equal line amount less discount".to_string(),
        });
    }
    if price.total_paise != price.taxable_paise + price.cgst_paise + price.sgst_paise + price.igst_paise {
        return Err(ValidationError::InvalidFormat {
            field: "total_paise".to_string(),
            reason: "must equal taxable amount plus GST".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
