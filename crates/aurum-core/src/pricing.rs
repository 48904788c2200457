//! # Line Pricing
//!
//! Computes the full price breakdown of one jewellery order line from weights,
//! charges and the rates in force.
//!
//! ## Calculation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  per unit                                                               │
//! │    metal    = net_weight_g × rate_per_gram                              │
//! │    wastage  = metal × wastage%                                          │
//! │    making   = per-gram × net_weight_g │ metal × % │ flat                │
//! │    stones   = Σ count × carats × rate_per_carat                         │
//! │                                                                         │
//! │  per line                                                               │
//! │    gross    = (metal + wastage + making + stones) × quantity            │
//! │    discount = gross × % │ flat (never above gross)                      │
//! │    taxable  = gross - discount                                          │
//! │    gst      = taxable × gst%                                            │
//! │    intrastate → cgst = ⌈gst/2⌉, sgst = gst - cgst                      │
//! │    interstate → igst = gst                                              │
//! │    total    = taxable + gst                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every percentage rounds half away from zero to the paisa. Amount fields of
//! [`LinePrice`] are line totals (already multiplied by quantity); weights
//! and the metal rate are per unit.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{div_round_wide, Money};
use crate::types::{StoneCriteria, TaxRate};
use crate::validation::{validate_gst_rate_bps, validate_quantity};
use crate::ValidationError;

// =============================================================================
// Line Price
// =============================================================================

/// Price breakdown of one line, as stored on order and invoice items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LinePrice {
    pub gross_weight_mg: i64,
    pub net_weight_mg: i64,
    pub metal_rate_paise: i64,
    pub metal_amount_paise: i64,
    pub wastage_paise: i64,
    pub making_charges_paise: i64,
    pub stone_amount_paise: i64,
    /// metal + wastage + making + stones.
    pub line_amount_paise: i64,
    pub discount_paise: i64,
    pub taxable_paise: i64,
    pub gst_rate_bps: i64,
    pub cgst_paise: i64,
    pub sgst_paise: i64,
    pub igst_paise: i64,
    pub total_paise: i64,
}

impl LinePrice {
    #[inline]
    pub fn taxable(&self) -> Money {
        Money::from_paise(self.taxable_paise)
    }

    #[inline]
    pub fn gst(&self) -> Money {
        Money::from_paise(self.cgst_paise + self.sgst_paise + self.igst_paise)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paise(self.total_paise)
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// How making charges are quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum MakingCharge {
    /// Paise per gram of net weight.
    PerGram { paise_per_gram: i64 },
    /// Basis points of the metal amount.
    Percentage { bps: u32 },
    /// Fixed amount per piece.
    Flat { paise: i64 },
}

/// Line-level discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum Discount {
    #[default]
    None,
    Percentage { bps: u32 },
    /// Capped at the gross line amount.
    Flat { paise: i64 },
}

/// Stones of one grade set in the piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StoneInput {
    pub criteria: StoneCriteria,
    /// Number of stones of this grade per piece.
    pub count: i64,
}

/// Whether seller and buyer are in the same state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SupplyType {
    /// CGST + SGST.
    Intrastate,
    /// IGST.
    Interstate,
}

impl SupplyType {
    /// Compares GST state codes of seller and buyer.
    pub fn between(seller_state: &str, buyer_state: &str) -> Self {
        if seller_state.trim() == buyer_state.trim() {
            SupplyType::Intrastate
        } else {
            SupplyType::Interstate
        }
    }
}

/// Everything about a line except the rates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingInput {
    pub purity_id: String,
    pub quantity: i64,
    pub gross_weight_mg: i64,
    pub net_weight_mg: i64,
    pub wastage_bps: u32,
    pub making: MakingCharge,
    #[serde(default)]
    pub stones: Vec<StoneInput>,
    #[serde(default)]
    pub discount: Discount,
    pub gst_rate_bps: u32,
    pub supply: SupplyType,
}

/// Rates resolved for one [`PricingInput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRates {
    pub metal_rate_per_gram_paise: i64,
    /// One entry per [`PricingInput::stones`], same order.
    pub stone_rates_per_carat_paise: Vec<i64>,
}

// =============================================================================
// Pricing
// =============================================================================

fn checked(value: i128, what: &str) -> CoreResult<i64> {
    i64::try_from(value).map_err(|_| CoreError::AmountOverflow(what.to_string()))
}

/// `milli_units × rate / 1000`, rounded to the paisa.
fn per_thousandth(milli_units: i64, rate_paise: i64, what: &str) -> CoreResult<i64> {
    checked(
        div_round_wide(milli_units as i128 * rate_paise as i128, 1000),
        what,
    )
}

fn validate_input(input: &PricingInput, rates: &ResolvedRates) -> CoreResult<()> {
    validate_quantity(input.quantity)?;
    validate_gst_rate_bps(input.gst_rate_bps)?;

    if input.net_weight_mg < 0 || input.gross_weight_mg < 0 {
        return Err(ValidationError::MustBePositive {
            field: "weight".to_string(),
        }
        .into());
    }
    if input.net_weight_mg > input.gross_weight_mg {
        return Err(ValidationError::OutOfRange {
            field: "net_weight_mg".to_string(),
            min: 0,
            max: input.gross_weight_mg,
        }
        .into());
    }
    if rates.stone_rates_per_carat_paise.len() != input.stones.len() {
        return Err(ValidationError::InvalidFormat {
            field: "stones".to_string(),
            reason: "one rate per stone grade is required".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Prices one line.
///
/// ## Example
/// ```rust
/// use aurum_core::pricing::*;
///
/// let input = PricingInput {
///     purity_id: "22K".to_string(),
///     quantity: 1,
///     gross_weight_mg: 10_500,
///     net_weight_mg: 10_000,
///     wastage_bps: 0,
///     making: MakingCharge::Flat { paise: 0 },
///     stones: vec![],
///     discount: Discount::None,
///     gst_rate_bps: 300,
///     supply: SupplyType::Intrastate,
/// };
/// let rates = ResolvedRates {
///     metal_rate_per_gram_paise: 600_000, // ₹6,000/g
///     stone_rates_per_carat_paise: vec![],
/// };
/// let price = price_line(&input, &rates).unwrap();
/// assert_eq!(price.taxable_paise, 6_000_000);
/// assert_eq!(price.cgst_paise + price.sgst_paise, 180_000);
/// ```
pub fn price_line(input: &PricingInput, rates: &ResolvedRates) -> CoreResult<LinePrice> {
    validate_input(input, rates)?;

    let metal_unit = per_thousandth(
        input.net_weight_mg,
        rates.metal_rate_per_gram_paise,
        "metal amount",
    )?;
    let wastage_unit = Money::from_paise(metal_unit).apply_bps(input.wastage_bps).paise();
    let making_unit = match input.making {
        MakingCharge::PerGram { paise_per_gram } => {
            per_thousandth(input.net_weight_mg, paise_per_gram, "making charges")?
        }
        MakingCharge::Percentage { bps } => Money::from_paise(metal_unit).apply_bps(bps).paise(),
        MakingCharge::Flat { paise } => paise,
    };

    let mut stone_unit: i128 = 0;
    for (stone, rate) in input.stones.iter().zip(&rates.stone_rates_per_carat_paise) {
        let per_stone = per_thousandth(stone.criteria.carat_milli, *rate, "stone amount")?;
        stone_unit += per_stone as i128 * stone.count as i128;
    }
    let stone_unit = checked(stone_unit, "stone amount")?;

    let qty = input.quantity as i128;
    let metal = checked(metal_unit as i128 * qty, "metal amount")?;
    let wastage = checked(wastage_unit as i128 * qty, "wastage")?;
    let making = checked(making_unit as i128 * qty, "making charges")?;
    let stones = checked(stone_unit as i128 * qty, "stone amount")?;
    let gross = checked(
        metal as i128 + wastage as i128 + making as i128 + stones as i128,
        "line amount",
    )?;
    let gross_money = Money::from_paise(gross);

    let discount = match input.discount {
        Discount::None => Money::zero(),
        Discount::Percentage { bps } => gross_money.apply_bps(bps),
        Discount::Flat { paise } => Money::from_paise(paise.max(0)).min(gross_money),
    };
    let taxable = gross_money - discount;
    let gst = taxable.calculate_tax(TaxRate::from_bps(input.gst_rate_bps));

    let (cgst, sgst, igst) = match input.supply {
        SupplyType::Intrastate => {
            let (c, s) = gst.split_half();
            (c, s, Money::zero())
        }
        SupplyType::Interstate => (Money::zero(), Money::zero(), gst),
    };

    Ok(LinePrice {
        gross_weight_mg: input.gross_weight_mg,
        net_weight_mg: input.net_weight_mg,
        metal_rate_paise: rates.metal_rate_per_gram_paise,
        metal_amount_paise: metal,
        wastage_paise: wastage,
        making_charges_paise: making,
        stone_amount_paise: stones,
        line_amount_paise: gross,
        discount_paise: discount.paise(),
        taxable_paise: taxable.paise(),
        gst_rate_bps: input.gst_rate_bps as i64,
        cgst_paise: cgst.paise(),
        sgst_paise: sgst.paise(),
        igst_paise: igst.paise(),
        total_paise: (taxable + gst).paise(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ring() -> PricingInput {
        PricingInput {
            purity_id: "22K".to_string(),
            quantity: 1,
            gross_weight_mg: 8_400,
            net_weight_mg: 8_000,
            wastage_bps: 800,
            making: MakingCharge::PerGram {
                paise_per_gram: 50_000,
            },
            stones: vec![],
            discount: Discount::None,
            gst_rate_bps: 300,
            supply: SupplyType::Intrastate,
        }
    }

    fn rates(metal: i64) -> ResolvedRates {
        ResolvedRates {
            metal_rate_per_gram_paise: metal,
            stone_rates_per_carat_paise: vec![],
        }
    }

    #[test]
    fn test_gold_ring_breakdown() {
        // 8g at ₹6,000/g, 8% wastage, ₹500/g making, 3% GST
        let price = price_line(&ring(), &rates(600_000)).unwrap();

        assert_eq!(price.metal_amount_paise, 4_800_000);
        assert_eq!(price.wastage_paise, 384_000);
        assert_eq!(price.making_charges_paise, 400_000);
        assert_eq!(price.line_amount_paise, 5_584_000);
        assert_eq!(price.taxable_paise, 5_584_000);
        assert_eq!(price.cgst_paise, 83_760);
        assert_eq!(price.sgst_paise, 83_760);
        assert_eq!(price.igst_paise, 0);
        assert_eq!(price.total_paise, 5_751_520);
    }

    #[test]
    fn test_interstate_puts_gst_in_igst() {
        let mut input = ring();
        input.supply = SupplyType::between("27", "29");
        assert_eq!(input.supply, SupplyType::Interstate);

        let price = price_line(&input, &rates(600_000)).unwrap();
        assert_eq!(price.cgst_paise, 0);
        assert_eq!(price.sgst_paise, 0);
        assert_eq!(price.igst_paise, 167_520);
    }

    #[test]
    fn test_quantity_multiplies_and_discount_caps() {
        let mut input = ring();
        input.quantity = 2;
        input.making = MakingCharge::Flat { paise: 100_000 };
        input.wastage_bps = 0;
        input.discount = Discount::Flat { paise: 99_999_999 };

        let price = price_line(&input, &rates(600_000)).unwrap();
        assert_eq!(price.line_amount_paise, 2 * (4_800_000 + 100_000));
        assert_eq!(price.discount_paise, price.line_amount_paise);
        assert_eq!(price.taxable_paise, 0);
        assert_eq!(price.total_paise, 0);
    }

    #[test]
    fn test_percentage_making_and_discount() {
        let mut input = ring();
        input.wastage_bps = 0;
        input.making = MakingCharge::Percentage { bps: 1_200 };
        input.discount = Discount::Percentage { bps: 500 };

        let price = price_line(&input, &rates(600_000)).unwrap();
        assert_eq!(price.making_charges_paise, 576_000);
        assert_eq!(price.line_amount_paise, 5_376_000);
        assert_eq!(price.discount_paise, 268_800);
        assert_eq!(price.taxable_paise, 5_107_200);
    }

    #[test]
    fn test_stone_amount() {
        let mut input = ring();
        input.stones = vec![StoneInput {
            criteria: StoneCriteria {
                stone_type: "diamond".to_string(),
                clarity: "VS1".to_string(),
                color: "F".to_string(),
                cut: "excellent".to_string(),
                carat_milli: 250,
            },
            count: 4,
        }];
        let rates = ResolvedRates {
            metal_rate_per_gram_paise: 600_000,
            stone_rates_per_carat_paise: vec![8_000_000],
        };

        let price = price_line(&input, &rates).unwrap();
        // 4 × 0.25ct × ₹80,000/ct
        assert_eq!(price.stone_amount_paise, 8_000_000);
    }

    #[test]
    fn test_odd_gst_paisa_goes_to_cgst() {
        let mut input = ring();
        input.wastage_bps = 0;
        input.making = MakingCharge::Flat { paise: 0 };
        input.net_weight_mg = 1_000;
        input.gross_weight_mg = 1_000;

        let price = price_line(&input, &rates(100_033)).unwrap();
        // 3% of 100_033 = 3001
        assert_eq!(price.cgst_paise, 1_501);
        assert_eq!(price.sgst_paise, 1_500);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut input = ring();
        input.quantity = 0;
        assert!(matches!(
            price_line(&input, &rates(600_000)),
            Err(CoreError::Validation(_))
        ));

        let mut input = ring();
        input.net_weight_mg = 9_000;
        assert!(price_line(&input, &rates(600_000)).is_err());

        let mut input = ring();
        input.stones.push(StoneInput {
            criteria: StoneCriteria {
                stone_type: "ruby".to_string(),
                clarity: "-".to_string(),
                color: "-".to_string(),
                cut: "-".to_string(),
                carat_milli: 100,
            },
            count: 1,
        });
        assert!(price_line(&input, &rates(600_000)).is_err());
    }
}
