//! # Party Repository
//!
//! Read access to the customer master, plus the upsert used by seeding and
//! tests. Full customer CRUD lives outside this crate.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use aurum_core::validation::{validate_gstin, validate_required, validate_state_code};
use aurum_core::Party;

use crate::error::{DbResult, LedgerResult};

const PARTY_COLUMNS: &str = "id, name, address, gstin, state_code, phone, updated_at";

/// Repository for party lookups.
#[derive(Debug, Clone)]
pub struct PartyRepository {
    pool: SqlitePool,
}

impl PartyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PartyRepository { pool }
    }

    /// Gets a party by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Party>> {
        let mut conn = self.pool.acquire().await?;
        find(&mut conn, id).await
    }

    /// Inserts or replaces a party.
    ///
    /// Name and state code are required; a GSTIN, when present, must be
    /// well formed.
    pub async fn upsert(&self, party: &Party) -> LedgerResult<()> {
        validate_required("name", &party.name, 200)?;
        validate_state_code(&party.state_code)?;
        if let Some(gstin) = &party.gstin {
            validate_gstin(gstin)?;
        }

        debug!(id = %party.id, name = %party.name, "Upserting party");

        sqlx::query(
            r#"
            INSERT INTO parties (id, name, address, gstin, state_code, phone, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                address = excluded.address,
                gstin = excluded.gstin,
                state_code = excluded.state_code,
                phone = excluded.phone,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&party.id)
        .bind(&party.name)
        .bind(&party.address)
        .bind(&party.gstin)
        .bind(&party.state_code)
        .bind(&party.phone)
        .bind(party.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Reads a party on an existing connection.
pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Party>> {
    let party = sqlx::query_as::<_, Party>(&format!(
        "SELECT {} FROM parties WHERE id = ?1",
        PARTY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(party)
}
