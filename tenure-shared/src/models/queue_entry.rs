/// Materialised queue snapshot
///
/// `queue_entries` holds the last computed ranking. It is replaced wholesale
/// by a queue refresh; readers go through `active_member_queue_view`, which
/// joins in the member's display name and hides members whose status changed
/// since the last refresh.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE queue_entries (
///     membership_id UUID PRIMARY KEY REFERENCES memberships(id) ON DELETE CASCADE,
///     position INTEGER NOT NULL UNIQUE CHECK (position > 0),
///     tenure_start TIMESTAMPTZ NOT NULL,
///     tenure_days BIGINT NOT NULL,
///     lifetime_paid_cents BIGINT NOT NULL,
///     computed_at TIMESTAMPTZ NOT NULL
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::rules::QueueEntry;

/// A row of `active_member_queue_view`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueEntryRow {
    pub position: i32,
    pub membership_id: Uuid,
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub tenure_start: DateTime<Utc>,
    pub tenure_days: i64,
    pub lifetime_paid_cents: i64,
    pub joined_at: DateTime<Utc>,
    pub computed_at: DateTime<Utc>,
}

const QUEUE_VIEW_COLUMNS: &str = "position, membership_id, user_id, display_name, tenure_start, \
                                  tenure_days, lifetime_paid_cents, joined_at, computed_at";

impl QueueEntryRow {
    /// Replaces the stored queue with a freshly ranked one
    ///
    /// Must run inside the caller's transaction so readers never observe a
    /// half-written queue.
    pub async fn replace_all(
        conn: &mut PgConnection,
        entries: &[QueueEntry],
        computed_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        sqlx::query("DELETE FROM queue_entries")
            .execute(&mut *conn)
            .await?;

        if entries.is_empty() {
            return Ok(0);
        }

        let membership_ids: Vec<Uuid> = entries.iter().map(|e| e.membership_id).collect();
        let positions: Vec<i32> = entries.iter().map(|e| e.position as i32).collect();
        let tenure_starts: Vec<DateTime<Utc>> = entries.iter().map(|e| e.tenure_start).collect();
        let tenure_days: Vec<i64> = entries.iter().map(|e| e.tenure_days).collect();
        let lifetime_paid: Vec<i64> = entries.iter().map(|e| e.lifetime_paid_cents).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO queue_entries (
                membership_id, position, tenure_start, tenure_days,
                lifetime_paid_cents, computed_at
            )
            SELECT membership_id, position, tenure_start, tenure_days, lifetime_paid_cents, $6
            FROM UNNEST($1::uuid[], $2::int4[], $3::timestamptz[], $4::int8[], $5::int8[])
                AS t(membership_id, position, tenure_start, tenure_days, lifetime_paid_cents)
            "#,
        )
        .bind(&membership_ids)
        .bind(&positions)
        .bind(&tenure_starts)
        .bind(&tenure_days)
        .bind(&lifetime_paid)
        .bind(computed_at)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Stored positions keyed by membership, read before a refresh replaces them
    pub async fn positions(conn: &mut PgConnection) -> Result<Vec<(Uuid, i32)>, sqlx::Error> {
        let rows: Vec<(Uuid, i32)> =
            sqlx::query_as("SELECT membership_id, position FROM queue_entries")
                .fetch_all(conn)
                .await?;

        Ok(rows)
    }

    /// Lists the queue in position order
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {QUEUE_VIEW_COLUMNS}
            FROM active_member_queue_view
            ORDER BY position ASC
            LIMIT $1 OFFSET $2
            "#
        );

        let rows = sqlx::query_as::<_, QueueEntryRow>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok(rows)
    }

    /// Number of members currently queued
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM active_member_queue_view")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn find_by_membership(
        pool: &PgPool,
        membership_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {QUEUE_VIEW_COLUMNS} FROM active_member_queue_view WHERE membership_id = $1"
        );

        let row = sqlx::query_as::<_, QueueEntryRow>(&query)
            .bind(membership_id)
            .fetch_optional(pool)
            .await?;

        Ok(row)
    }
}
