//! # Exchange Valuation
//!
//! Credit offered for old jewellery brought in for exchange or buy-back.
//!
//! ```text
//! net weight        = gross weight - stone weight
//! equivalent weight = net weight × tested purity / rate purity
//! metal value       = equivalent weight × rate per gram
//! melting deduction = metal value × melting%
//! credit            = metal value - melting deduction
//! ```
//!
//! The rate is the board rate of the purity the shop buys against (usually
//! 22K), so a 20K piece is scaled down to its 22K-equivalent weight first.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{div_round_wide, Money};
use crate::types::MetalRate;

/// Old-metal details from the touchstone / XRF test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeInput {
    pub gross_weight_mg: i64,
    pub stone_weight_mg: i64,
    /// Measured fineness, e.g. 8_333 for 20K.
    pub tested_purity_bps: i64,
    pub melting_deduction_bps: u32,
}

/// Breakdown of the exchange credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeValuation {
    pub net_weight_mg: i64,
    pub equivalent_weight_mg: i64,
    pub metal_value: Money,
    pub melting_deduction: Money,
    pub credit: Money,
}

fn out_of_range(field: &str, min: i64, max: i64) -> CoreError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min,
        max,
    }
    .into()
}

/// Values old metal against `rate`.
pub fn value_exchange(input: &ExchangeInput, rate: &MetalRate) -> CoreResult<ExchangeValuation> {
    if input.gross_weight_mg <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "gross_weight_mg".to_string(),
        }
        .into());
    }
    if input.stone_weight_mg < 0 || input.stone_weight_mg > input.gross_weight_mg {
        return Err(out_of_range("stone_weight_mg", 0, input.gross_weight_mg));
    }
    if !(0..=10_000).contains(&input.tested_purity_bps) {
        return Err(out_of_range("tested_purity_bps", 0, 10_000));
    }
    if input.melting_deduction_bps > 10_000 {
        return Err(out_of_range("melting_deduction_bps", 0, 10_000));
    }
    if rate.purity_bps <= 0 {
        return Err(CoreError::RateUnavailable {
            kind: "metal".to_string(),
            key: rate.purity_id.clone(),
        });
    }

    let net_weight_mg = input.gross_weight_mg - input.stone_weight_mg;
    let equivalent = div_round_wide(
        net_weight_mg as i128 * input.tested_purity_bps as i128,
        rate.purity_bps as i128,
    );
    let value = div_round_wide(equivalent * rate.rate_per_gram_paise as i128, 1000);

    let equivalent_weight_mg = i64::try_from(equivalent)
        .map_err(|_| CoreError::AmountOverflow("equivalent weight".to_string()))?;
    let metal_value = Money::from_paise(
        i64::try_from(value).map_err(|_| CoreError::AmountOverflow("exchange value".to_string()))?,
    );
    let melting_deduction = metal_value.apply_bps(input.melting_deduction_bps);

    Ok(ExchangeValuation {
        net_weight_mg,
        equivalent_weight_mg,
        metal_value,
        melting_deduction,
        credit: metal_value - melting_deduction,
    })
}
