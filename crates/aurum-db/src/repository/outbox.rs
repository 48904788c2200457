//! # Event Outbox Repository
//!
//! Settlement events queued in the same transaction as the business write.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  generate_invoice / cancel_invoice                                     │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │                   SINGLE TRANSACTION                              │  │
//! │  │  1. invoice rows, stock movements, order status                   │  │
//! │  │  2. INSERT INTO event_outbox (event_type, aggregate_id, payload)  │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │       │ COMMIT: both or neither                                        │
//! │       ▼                                                                 │
//! │  Publisher (outside this crate)                                        │
//! │    get_pending → deliver → mark_published | mark_failed                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use aurum_core::OutboxEntry;

use crate::error::{DbError, DbResult};

pub const INVOICE_GENERATED: &str = "INVOICE_GENERATED";
pub const INVOICE_CANCELLED: &str = "INVOICE_CANCELLED";

/// Queues an event on the caller's connection, normally inside the
/// transaction that produced it.
pub async fn enqueue<T: Serialize>(
    conn: &mut SqliteConnection,
    event_type: &str,
    aggregate_id: &str,
    payload: &T,
    now: DateTime<Utc>,
) -> DbResult<OutboxEntry> {
    let entry = OutboxEntry {
        id: Uuid::new_v4().to_string(),
        event_type: event_type.to_string(),
        aggregate_id: aggregate_id.to_string(),
        payload: serde_json::to_string(payload)?,
        attempts: 0,
        last_error: None,
        created_at: now,
        published_at: None,
    };

    debug!(event_type = %entry.event_type, aggregate_id = %entry.aggregate_id, "Queuing event");

    sqlx::query(
        r#"
        INSERT INTO event_outbox (
            id, event_type, aggregate_id, payload,
            attempts, last_error, created_at, published_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.event_type)
    .bind(&entry.aggregate_id)
    .bind(&entry.payload)
    .bind(entry.attempts)
    .bind(&entry.last_error)
    .bind(entry.created_at)
    .bind(entry.published_at)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

/// Repository for the publisher side of the outbox.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Unpublished entries, oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(
            r#"
            SELECT id, event_type, aggregate_id, payload, attempts, last_error,
                   created_at, published_at
            FROM event_outbox
            WHERE published_at IS NULL
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Marks an entry as delivered.
    pub async fn mark_published(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE event_outbox SET published_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("OutboxEntry", id));
        }
        Ok(())
    }

    /// Records a failed delivery attempt.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE event_outbox SET
                attempts = attempts + 1,
                last_error = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("OutboxEntry", id));
        }
        Ok(())
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM event_outbox WHERE published_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_publish_cycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let outbox = db.outbox();

        let entry = {
            let mut conn = db.pool().acquire().await.unwrap();
            enqueue(
                &mut conn,
                INVOICE_GENERATED,
                "inv-1",
                &serde_json::json!({ "invoice_number": "INV/2026-27/000001" }),
                Utc::now(),
            )
            .await
            .unwrap()
        };
        assert_eq!(outbox.count_pending().await.unwrap(), 1);

        outbox.mark_failed(&entry.id, "downstream unavailable").await.unwrap();
        let pending = outbox.get_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("downstream unavailable"));

        outbox.mark_published(&entry.id).await.unwrap();
        assert_eq!(outbox.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_unknown_entry() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.outbox().mark_published("missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
