/// Audit trail of administrative and engine actions
///
/// # Schema
///
/// ```sql
/// CREATE TABLE audit_logs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     actor_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     action VARCHAR(64) NOT NULL,
///     entity_type VARCHAR(64) NOT NULL,
///     entity_id UUID,
///     details JSONB NOT NULL DEFAULT '{}'::jsonb,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// `actor_id` is None for actions taken by the worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Input for an audit entry
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: JsonValue,
}

impl NewAuditLog {
    pub fn new(action: &str, entity_type: &str, entity_id: Option<Uuid>) -> Self {
        Self {
            actor_id: None,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details: JsonValue::Object(Default::default()),
        }
    }

    pub fn actor(mut self, actor_id: Option<Uuid>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }
}

const AUDIT_COLUMNS: &str = "id, actor_id, action, entity_type, entity_id, details, created_at";

impl AuditLog {
    pub async fn record(pool: &PgPool, entry: NewAuditLog) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::record_with(&mut conn, entry).await
    }

    /// Same as [`AuditLog::record`] inside an existing transaction
    pub async fn record_with(
        conn: &mut PgConnection,
        entry: NewAuditLog,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {AUDIT_COLUMNS}
            "#
        );

        let log = sqlx::query_as::<_, AuditLog>(&query)
            .bind(entry.actor_id)
            .bind(entry.action)
            .bind(entry.entity_type)
            .bind(entry.entity_id)
            .bind(entry.details)
            .fetch_one(conn)
            .await?;

        Ok(log)
    }

    /// Lists entries, newest first, optionally narrowed to one entity type/id
    pub async fn list(
        pool: &PgPool,
        entity_type: Option<&str>,
        entity_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {AUDIT_COLUMNS}
            FROM audit_logs
            WHERE ($1::varchar IS NULL OR entity_type = $1)
              AND ($2::uuid IS NULL OR entity_id = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        );

        let logs = sqlx::query_as::<_, AuditLog>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_audit_log_builder() {
        let actor = Uuid::new_v4();
        let entity = Uuid::new_v4();
        let entry = NewAuditLog::new("membership.status_changed", "membership", Some(entity))
            .actor(Some(actor))
            .details(serde_json::json!({ "from": "active", "to": "suspended" }));

        assert_eq!(entry.actor_id, Some(actor));
        assert_eq!(entry.entity_id, Some(entity));
        assert_eq!(entry.details["to"], "suspended");
    }

    #[test]
    fn test_new_audit_log_defaults() {
        let entry = NewAuditLog::new("queue.refreshed", "queue", None);
        assert!(entry.actor_id.is_none());
        assert!(entry.details.as_object().map(|o| o.is_empty()).unwrap_or(false));
    }
}
