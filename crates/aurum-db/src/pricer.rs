//! # Order Item Pricer
//!
//! Resolves board rates in force at the caller's instant and hands them to
//! the pure pricing and exchange functions of `aurum-core`.
//!
//! ```text
//! PricingInput { purity_id: "22K", stones: [VS1/F 0.25ct × 4] }
//!      │
//!      ├── latest_metal_rate("22K", ctx.now)           → ₹6,310/g
//!      ├── latest_stone_rate(VS1/F/0.250ct, ctx.now)   → ₹40,000/ct
//!      ▼
//! pricing::price_line(input, ResolvedRates)            → LinePrice
//! ```

use tracing::debug;

use aurum_core::exchange::{self, ExchangeInput, ExchangeValuation};
use aurum_core::pricing::{price_line, LinePrice, PricingInput, ResolvedRates};
use aurum_core::{CallerContext, CoreError, MetalRate, StoneCriteria};

use crate::error::LedgerResult;
use crate::repository::rate::RateRepository;

fn stone_key(criteria: &StoneCriteria) -> String {
    format!(
        "{}/{}/{}/{}/{}mct",
        criteria.stone_type, criteria.clarity, criteria.color, criteria.cut, criteria.carat_milli
    )
}

/// Prices order lines and exchange metal against the rate tables.
#[derive(Debug, Clone)]
pub struct OrderItemPricer {
    rates: RateRepository,
}

impl OrderItemPricer {
    pub fn new(rates: RateRepository) -> Self {
        OrderItemPricer { rates }
    }

    async fn metal_rate(&self, ctx: &CallerContext, purity_id: &str) -> LedgerResult<MetalRate> {
        self.rates
            .latest_metal_rate(purity_id, ctx.now)
            .await?
            .ok_or_else(|| {
                CoreError::RateUnavailable {
                    kind: "metal".to_string(),
                    key: purity_id.to_string(),
                }
                .into()
            })
    }

    /// Prices one line with the rates in force at `ctx.now`.
    ///
    /// A missing metal or stone rate is reported as `NotFound`.
    pub async fn price(&self, ctx: &CallerContext, input: &PricingInput) -> LedgerResult<LinePrice> {
        let metal = self.metal_rate(ctx, &input.purity_id).await?;

        let mut stone_rates = Vec::with_capacity(input.stones.len());
        for stone in &input.stones {
            let rate = self
                .rates
                .latest_stone_rate(&stone.criteria, ctx.now)
                .await?
                .ok_or_else(|| CoreError::RateUnavailable {
                    kind: "stone".to_string(),
                    key: stone_key(&stone.criteria),
                })?;
            stone_rates.push(rate.rate_per_carat_paise);
        }

        let price = price_line(
            input,
            &ResolvedRates {
                metal_rate_per_gram_paise: metal.rate_per_gram_paise,
                stone_rates_per_carat_paise: stone_rates,
            },
        )?;

        debug!(
            purity_id = %input.purity_id,
            quantity = input.quantity,
            total = price.total_paise,
            "Priced line"
        );
        Ok(price)
    }

    /// Values old metal offered in exchange, against today's rate for
    /// `purity_id`.
    pub async fn value_exchange(
        &self,
        ctx: &CallerContext,
        purity_id: &str,
        input: &ExchangeInput,
    ) -> LedgerResult<ExchangeValuation> {
        let rate = self.metal_rate(ctx, purity_id).await?;
        Ok(exchange::value_exchange(input, &rate)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pool::{Database, DbConfig};
    use aurum_core::pricing::{Discount, MakingCharge, StoneInput, SupplyType};
    use aurum_core::StoneRate;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn ring(stones: Vec<StoneInput>) -> PricingInput {
        PricingInput {
            purity_id: "22K".to_string(),
            quantity: 1,
            gross_weight_mg: 10_500,
            net_weight_mg: 10_000,
            wastage_bps: 0,
            making: MakingCharge::Flat { paise: 0 },
            stones,
            discount: Discount::None,
            gst_rate_bps: 300,
            supply: SupplyType::Intrastate,
        }
    }

    fn vs1(carat_milli: i64) -> StoneCriteria {
        StoneCriteria {
            stone_type: "diamond".into(),
            clarity: "VS1".into(),
            color: "F".into(),
            cut: "excellent".into(),
            carat_milli,
        }
    }

    #[tokio::test]
    async fn test_price_uses_rate_in_force() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        db.rates()
            .insert_metal_rate("22K", "gold", 9_167, 600_000, now - Duration::days(1))
            .await
            .unwrap();
        db.rates()
            .insert_metal_rate("22K", "gold", 9_167, 700_000, now + Duration::days(1))
            .await
            .unwrap();

        let ctx = CallerContext::new("tester").at(now);
        let price = db.pricer().price(&ctx, &ring(vec![])).await.unwrap();

        assert_eq!(price.metal_rate_paise, 600_000);
        assert_eq!(price.taxable_paise, 6_000_000);
        assert_eq!(price.cgst_paise + price.sgst_paise, 180_000);
    }

    #[tokio::test]
    async fn test_missing_rates_are_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ctx = CallerContext::new("tester");

        let err = db.pricer().price(&ctx, &ring(vec![])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        db.rates()
            .insert_metal_rate("22K", "gold", 9_167, 600_000, ctx.now - Duration::hours(1))
            .await
            .unwrap();
        let err = db
            .pricer()
            .price(&ctx, &ring(vec![StoneInput { criteria: vs1(250), count: 4 }]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("diamond/VS1/F/excellent/250mct"));
    }

    #[tokio::test]
    async fn test_price_with_stones() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ctx = CallerContext::new("tester");
        let from = ctx.now - Duration::hours(1);

        db.rates().insert_metal_rate("22K", "gold", 9_167, 600_000, from).await.unwrap();
        db.rates()
            .insert_stone_rate(&StoneRate {
                id: Uuid::new_v4().to_string(),
                stone_type: "diamond".into(),
                clarity: "VS1".into(),
                color: "F".into(),
                cut: "excellent".into(),
                carat_from_milli: 0,
                carat_to_milli: 499,
                rate_per_carat_paise: 4_000_000,
                effective_from: from,
            })
            .await
            .unwrap();

        let price = db
            .pricer()
            .price(&ctx, &ring(vec![StoneInput { criteria: vs1(250), count: 4 }]))
            .await
            .unwrap();

        // 4 × 0.25ct × ₹40,000
        assert_eq!(price.stone_amount_paise, 4_000_000);
        assert_eq!(price.taxable_paise, 10_000_000);
    }

    #[tokio::test]
    async fn test_value_exchange_resolves_rate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ctx = CallerContext::new("tester");
        db.rates()
            .insert_metal_rate("22K", "gold", 9_167, 600_000, ctx.now - Duration::hours(1))
            .await
            .unwrap();

        let valuation = db
            .pricer()
            .value_exchange(
                &ctx,
                "22K",
                &ExchangeInput {
                    gross_weight_mg: 10_000,
                    stone_weight_mg: 0,
                    tested_purity_bps: 9_167,
                    melting_deduction_bps: 0,
                },
            )
            .await
            .unwrap();

        assert_eq!(valuation.net_weight_mg, 10_000);
        assert_eq!(valuation.credit.paise(), 6_000_000);
    }
}
