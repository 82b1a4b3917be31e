/// Raw billing event log
///
/// Every verified billing webhook is stored before it is applied. The unique
/// `provider_event_id` makes redelivery idempotent: a second insert of the
/// same event id is a no-op and reported as a duplicate.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE billing_events (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     provider_event_id VARCHAR(255) NOT NULL UNIQUE,
///     event_type VARCHAR(64) NOT NULL,
///     payload JSONB NOT NULL,
///     received_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     processed_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// Stored billing event
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BillingEventRecord {
    pub id: Uuid,
    pub provider_event_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl BillingEventRecord {
    /// Stores an event unless its provider id was seen before
    ///
    /// Returns None for duplicates.
    pub async fn record(
        pool: &PgPool,
        provider_event_id: &str,
        event_type: &str,
        payload: &JsonValue,
    ) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, BillingEventRecord>(
            r#"
            INSERT INTO billing_events (provider_event_id, event_type, payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider_event_id) DO NOTHING
            RETURNING id, provider_event_id, event_type, payload, received_at, processed_at
            "#,
        )
        .bind(provider_event_id)
        .bind(event_type)
        .bind(payload)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    pub async fn find_by_provider_id(
        pool: &PgPool,
        provider_event_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, BillingEventRecord>(
            r#"
            SELECT id, provider_event_id, event_type, payload, received_at, processed_at
            FROM billing_events
            WHERE provider_event_id = $1
            "#,
        )
        .bind(provider_event_id)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    /// Marks an event as applied
    pub async fn mark_processed(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE billing_events SET processed_at = NOW() WHERE id = $1 AND processed_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
