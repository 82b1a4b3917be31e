/// Payout model and database operations
///
/// Payout rows are bookkeeping for pool distributions. A payout run creates
/// them as `scheduled`; an operator moves them through `processing` to
/// `completed` or `failed` once money has actually moved outside the system.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE payout_status AS ENUM ('scheduled', 'processing', 'completed', 'failed', 'cancelled');
///
/// CREATE TABLE payouts (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     membership_id UUID NOT NULL REFERENCES memberships(id) ON DELETE CASCADE,
///     amount_cents BIGINT NOT NULL CHECK (amount_cents > 0),
///     status payout_status NOT NULL DEFAULT 'scheduled',
///     queue_position INTEGER NOT NULL,
///     reference VARCHAR(64) NOT NULL UNIQUE,
///     failure_reason TEXT,
///     scheduled_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     completed_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Payout lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payout_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Scheduled,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Scheduled => "scheduled",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
            PayoutStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the payout's amount is taken out of the pool
    pub fn is_committed(&self) -> bool {
        matches!(
            self,
            PayoutStatus::Scheduled | PayoutStatus::Processing | PayoutStatus::Completed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PayoutStatus::Completed | PayoutStatus::Failed | PayoutStatus::Cancelled
        )
    }

    /// Allowed operator transitions
    pub fn can_transition_to(&self, next: PayoutStatus) -> bool {
        use PayoutStatus::*;
        matches!(
            (self, next),
            (Scheduled, Processing)
                | (Scheduled, Cancelled)
                | (Scheduled, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

/// A scheduled or settled payout
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payout {
    pub id: Uuid,
    pub membership_id: Uuid,
    pub amount_cents: i64,
    pub status: PayoutStatus,

    /// Queue position the member held when the payout was scheduled
    pub queue_position: i32,

    /// Human-readable reference shared with finance (`PO-XXXXXXXXXX`)
    pub reference: String,

    pub failure_reason: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for scheduling a payout
#[derive(Debug, Clone)]
pub struct CreatePayout {
    pub membership_id: Uuid,
    pub amount_cents: i64,
    pub queue_position: i32,
}

const PAYOUT_COLUMNS: &str = "id, membership_id, amount_cents, status, queue_position, reference, \
                              failure_reason, scheduled_at, completed_at, created_at, updated_at";

/// Generates a payout reference such as `PO-7KQ2M9XJ4D`
pub fn generate_reference() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("PO-{}", suffix)
}

impl Payout {
    /// Schedules a payout inside the caller's transaction
    pub async fn create(conn: &mut PgConnection, data: CreatePayout) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO payouts (membership_id, amount_cents, queue_position, reference)
            VALUES ($1, $2, $3, $4)
            RETURNING {PAYOUT_COLUMNS}
            "#
        );

        let payout = sqlx::query_as::<_, Payout>(&query)
            .bind(data.membership_id)
            .bind(data.amount_cents)
            .bind(data.queue_position)
            .bind(generate_reference())
            .fetch_one(conn)
            .await?;

        Ok(payout)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1");

        let payout = sqlx::query_as::<_, Payout>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(payout)
    }

    /// Lists payouts, newest first, optionally filtered by status
    pub async fn list(
        pool: &PgPool,
        status: Option<PayoutStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {PAYOUT_COLUMNS}
            FROM payouts
            WHERE ($1::payout_status IS NULL OR status = $1)
            ORDER BY scheduled_at DESC, queue_position ASC
            LIMIT $2 OFFSET $3
            "#
        );

        let payouts = sqlx::query_as::<_, Payout>(&query)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok(payouts)
    }

    pub async fn list_by_membership(
        pool: &PgPool,
        membership_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {PAYOUT_COLUMNS}
            FROM payouts
            WHERE membership_id = $1
            ORDER BY scheduled_at DESC
            "#
        );

        let payouts = sqlx::query_as::<_, Payout>(&query)
            .bind(membership_id)
            .fetch_all(pool)
            .await?;

        Ok(payouts)
    }

    /// Locks the payout row for the rest of the caller's transaction
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1 FOR UPDATE");

        let payout = sqlx::query_as::<_, Payout>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(payout)
    }

    /// Moves a payout to a new status inside the caller's transaction
    ///
    /// Stamps `completed_at` when completing. Returns None if the payout
    /// doesn't exist.
    pub async fn update_status_with(
        conn: &mut PgConnection,
        id: Uuid,
        status: PayoutStatus,
        failure_reason: Option<String>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE payouts
            SET status = $2,
                failure_reason = $3,
                completed_at = CASE
                    WHEN $2 = 'completed'::payout_status THEN NOW()
                    ELSE completed_at
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PAYOUT_COLUMNS}
            "#
        );

        let payout = sqlx::query_as::<_, Payout>(&query)
            .bind(id)
            .bind(status)
            .bind(failure_reason)
            .fetch_optional(conn)
            .await?;

        Ok(payout)
    }

    /// Total amount already taken out of the pool
    pub async fn committed_total(conn: &mut PgConnection) -> Result<i64, sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0)::BIGINT
            FROM payouts
            WHERE status IN ('scheduled', 'processing', 'completed')
            "#,
        )
        .fetch_one(conn)
        .await?;

        Ok(total)
    }
}
