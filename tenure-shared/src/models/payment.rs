/// Payment model and database operations
///
/// Payments are recorded from billing webhooks (keyed by the provider's
/// payment id) or entered manually by an administrator. They are the primary
/// input of the tenure rules.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE payment_kind AS ENUM ('joining', 'monthly', 'other');
/// CREATE TYPE payment_status AS ENUM ('pending', 'succeeded', 'failed', 'refunded');
///
/// CREATE TABLE payments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     membership_id UUID NOT NULL REFERENCES memberships(id) ON DELETE CASCADE,
///     kind payment_kind NOT NULL,
///     status payment_status NOT NULL,
///     amount_cents BIGINT NOT NULL CHECK (amount_cents >= 0),
///     currency VARCHAR(3) NOT NULL DEFAULT 'usd',
///     provider_payment_id VARCHAR(255) UNIQUE,
///     paid_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// What a payment was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    /// One-off joining fee
    Joining,

    /// Recurring monthly membership fee
    Monthly,

    /// Anything else (adjustments, donations); counts toward the pool only
    Other,
}

impl PaymentKind {
    /// Whether this kind of payment counts toward tenure
    pub fn is_qualifying(&self) -> bool {
        matches!(self, PaymentKind::Joining | PaymentKind::Monthly)
    }
}

/// Settlement status of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// A recorded payment
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub membership_id: Uuid,
    pub kind: PaymentKind,
    pub status: PaymentStatus,

    /// Amount in the smallest currency unit
    pub amount_cents: i64,

    /// ISO 4217 currency code, lowercase
    pub currency: String,

    /// Billing provider's payment id (None for manual entries)
    pub provider_payment_id: Option<String>,

    /// When the payment was made (or attempted, for failures)
    pub paid_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording a payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePayment {
    pub membership_id: Uuid,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub provider_payment_id: Option<String>,
    pub paid_at: DateTime<Utc>,
}

const PAYMENT_COLUMNS: &str = "id, membership_id, kind, status, amount_cents, currency, \
                               provider_payment_id, paid_at, created_at, updated_at";

impl Payment {
    /// Records a payment
    pub async fn create(pool: &PgPool, data: CreatePayment) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO payments
                (membership_id, kind, status, amount_cents, currency, provider_payment_id, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        let payment = sqlx::query_as::<_, Payment>(&query)
            .bind(data.membership_id)
            .bind(data.kind)
            .bind(data.status)
            .bind(data.amount_cents)
            .bind(data.currency)
            .bind(data.provider_payment_id)
            .bind(data.paid_at)
            .fetch_one(pool)
            .await?;

        Ok(payment)
    }

    /// Inserts a provider payment, or updates its status when the provider
    /// re-reports it
    ///
    /// Only `pending` payments change freely and a `succeeded` one may become
    /// `refunded`. Any other report leaves the stored status, so a late or
    /// out-of-order event cannot undo a settled payment. The returned row
    /// carries the stored status. `provider_payment_id` must be set.
    pub async fn upsert_by_provider_id(
        pool: &PgPool,
        data: CreatePayment,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO payments
                (membership_id, kind, status, amount_cents, currency, provider_payment_id, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (provider_payment_id) DO UPDATE
            SET status = CASE
                    WHEN payments.status = 'pending'
                      OR (payments.status = 'succeeded' AND EXCLUDED.status = 'refunded')
                    THEN EXCLUDED.status
                    ELSE payments.status
                END,
                updated_at = NOW()
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        let payment = sqlx::query_as::<_, Payment>(&query)
            .bind(data.membership_id)
            .bind(data.kind)
            .bind(data.status)
            .bind(data.amount_cents)
            .bind(data.currency)
            .bind(data.provider_payment_id)
            .bind(data.paid_at)
            .fetch_one(pool)
            .await?;

        Ok(payment)
    }

    /// Finds a payment by the billing provider's id
    pub async fn find_by_provider_id(
        pool: &PgPool,
        provider_payment_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE provider_payment_id = $1"
        );

        let payment = sqlx::query_as::<_, Payment>(&query)
            .bind(provider_payment_id)
            .fetch_optional(pool)
            .await?;

        Ok(payment)
    }

    /// Payment history of one membership, newest first
    pub async fn list_by_membership(
        pool: &PgPool,
        membership_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE membership_id = $1
            ORDER BY paid_at DESC
            LIMIT $2 OFFSET $3
            "#
        );

        let payments = sqlx::query_as::<_, Payment>(&query)
            .bind(membership_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok(payments)
    }

    /// Full payment history of one membership, oldest first
    pub async fn list_for_membership(
        pool: &PgPool,
        membership_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE membership_id = $1 ORDER BY paid_at ASC"
        );

        let payments = sqlx::query_as::<_, Payment>(&query)
            .bind(membership_id)
            .fetch_all(pool)
            .await?;

        Ok(payments)
    }

    /// Every payment, ordered for in-memory grouping by the rule engine
    pub async fn list_all(conn: &mut PgConnection) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY membership_id, paid_at ASC"
        );

        let payments = sqlx::query_as::<_, Payment>(&query)
            .fetch_all(conn)
            .await?;

        Ok(payments)
    }

    /// Sum of all succeeded payments, in cents
    pub async fn total_collected_with(conn: &mut PgConnection) -> Result<i64, sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0)::BIGINT
            FROM payments
            WHERE status = 'succeeded'
            "#,
        )
        .fetch_one(conn)
        .await?;

        Ok(total)
    }
}
