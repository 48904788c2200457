//! # Rate Repository
//!
//! Board rates for metals and stones. A rate applies from its
//! `effective_from` instant until a newer row for the same key takes over.
//!
//! ```text
//! metal_rates (purity_id = "22K")
//!   effective_from 2026-04-01 09:00  ₹6,250/g
//!   effective_from 2026-04-02 09:00  ₹6,310/g   ◄── latest_metal_rate("22K", 2026-04-02 15:00)
//!   effective_from 2026-04-03 09:00  ₹6,290/g
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use aurum_core::validation::{validate_rate_paise, validate_required};
use aurum_core::{MetalRate, StoneCriteria, StoneRate, ValidationError};

use crate::error::{DbResult, LedgerResult};

/// Repository for metal and stone rates.
#[derive(Debug, Clone)]
pub struct RateRepository {
    pool: SqlitePool,
}

impl RateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RateRepository { pool }
    }

    /// The metal rate in force for `purity_id` at `as_of`.
    pub async fn latest_metal_rate(
        &self,
        purity_id: &str,
        as_of: DateTime<Utc>,
    ) -> DbResult<Option<MetalRate>> {
        let rate = sqlx::query_as::<_, MetalRate>(
            r#"
            SELECT id, purity_id, metal, purity_bps, rate_per_gram_paise, effective_from
            FROM metal_rates
            WHERE purity_id = ?1 AND effective_from <= ?2
            ORDER BY effective_from DESC
            LIMIT 1
            "#,
        )
        .bind(purity_id)
        .bind(as_of)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rate)
    }

    /// The stone rate in force for a grade whose carat band contains
    /// `criteria.carat_milli`.
    pub async fn latest_stone_rate(
        &self,
        criteria: &StoneCriteria,
        as_of: DateTime<Utc>,
    ) -> DbResult<Option<StoneRate>> {
        let rate = sqlx::query_as::<_, StoneRate>(
            r#"
            SELECT id, stone_type, clarity, color, cut,
                   carat_from_milli, carat_to_milli, rate_per_carat_paise, effective_from
            FROM stone_rates
            WHERE stone_type = ?1 AND clarity = ?2 AND color = ?3 AND cut = ?4
              AND carat_from_milli <= ?5 AND carat_to_milli >= ?5
              AND effective_from <= ?6
            ORDER BY effective_from DESC
            LIMIT 1
            "#,
        )
        .bind(&criteria.stone_type)
        .bind(&criteria.clarity)
        .bind(&criteria.color)
        .bind(&criteria.cut)
        .bind(criteria.carat_milli)
        .bind(as_of)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rate)
    }

    /// Publishes a metal rate.
    pub async fn insert_metal_rate(
        &self,
        purity_id: &str,
        metal: &str,
        purity_bps: i64,
        rate_per_gram_paise: i64,
        effective_from: DateTime<Utc>,
    ) -> LedgerResult<MetalRate> {
        validate_required("purity_id", purity_id, 20)?;
        validate_rate_paise("rate_per_gram_paise", rate_per_gram_paise)?;
        if !(1..=10_000).contains(&purity_bps) {
            return Err(ValidationError::OutOfRange {
                field: "purity_bps".to_string(),
                min: 1,
                max: 10_000,
            }
            .into());
        }

        let rate = MetalRate {
            id: Uuid::new_v4().to_string(),
            purity_id: purity_id.to_string(),
            metal: metal.to_string(),
            purity_bps,
            rate_per_gram_paise,
            effective_from,
        };

        debug!(purity_id = %rate.purity_id, rate = rate.rate_per_gram_paise, "Inserting metal rate");

        sqlx::query(
            r#"
            INSERT INTO metal_rates (id, purity_id, metal, purity_bps, rate_per_gram_paise, effective_from)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&rate.id)
        .bind(&rate.purity_id)
        .bind(&rate.metal)
        .bind(rate.purity_bps)
        .bind(rate.rate_per_gram_paise)
        .bind(rate.effective_from)
        .execute(&self.pool)
        .await?;

        Ok(rate)
    }

    /// Publishes a stone rate for a carat band.
    pub async fn insert_stone_rate(&self, rate: &StoneRate) -> LedgerResult<()> {
        validate_required("stone_type", &rate.stone_type, 50)?;
        validate_rate_paise("rate_per_carat_paise", rate.rate_per_carat_paise)?;
        if rate.carat_from_milli < 0 || rate.carat_from_milli > rate.carat_to_milli {
            return Err(ValidationError::OutOfRange {
                field: "carat_from_milli".to_string(),
                min: 0,
                max: rate.carat_to_milli,
            }
            .into());
        }

        sqlx::query(
            r#"
            INSERT INTO stone_rates (
                id, stone_type, clarity, color, cut,
                carat_from_milli, carat_to_milli, rate_per_carat_paise, effective_from
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&rate.id)
        .bind(&rate.stone_type)
        .bind(&rate.clarity)
        .bind(&rate.color)
        .bind(&rate.cut)
        .bind(rate.carat_from_milli)
        .bind(rate.carat_to_milli)
        .bind(rate.rate_per_carat_paise)
        .bind(rate.effective_from)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
