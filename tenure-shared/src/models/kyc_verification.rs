/// KYC verification model and database operations
///
/// One row per verification session opened with the external KYC provider.
/// The latest final decision of a user decides whether they are verified.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE kyc_status AS ENUM ('pending', 'verified', 'rejected', 'expired');
///
/// CREATE TABLE kyc_verifications (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     provider_reference VARCHAR(255) NOT NULL UNIQUE,
///     status kyc_status NOT NULL DEFAULT 'pending',
///     failure_reason TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     verified_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Verification outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "kyc_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
    Expired,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::Verified => "verified",
            KycStatus::Rejected => "rejected",
            KycStatus::Expired => "expired",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, KycStatus::Pending)
    }
}

/// A verification session
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct KycVerification {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Provider-side session reference
    pub provider_reference: String,

    pub status: KycStatus,

    /// Provider's explanation for rejected/expired sessions
    pub failure_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

const KYC_COLUMNS: &str = "id, user_id, provider_reference, status, failure_reason, \
                           created_at, updated_at, verified_at";

impl KycVerification {
    /// Opens a pending verification for a user
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        provider_reference: &str,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO kyc_verifications (user_id, provider_reference)
            VALUES ($1, $2)
            RETURNING {KYC_COLUMNS}
            "#
        );

        let verification = sqlx::query_as::<_, KycVerification>(&query)
            .bind(user_id)
            .bind(provider_reference)
            .fetch_one(pool)
            .await?;

        Ok(verification)
    }

    /// Most recent verification session of a user
    pub async fn find_latest_by_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {KYC_COLUMNS}
            FROM kyc_verifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#
        );

        let verification = sqlx::query_as::<_, KycVerification>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        Ok(verification)
    }

    /// Finds a session by its provider reference
    pub async fn find_by_reference(
        pool: &PgPool,
        provider_reference: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {KYC_COLUMNS} FROM kyc_verifications WHERE provider_reference = $1"
        );

        let verification = sqlx::query_as::<_, KycVerification>(&query)
            .bind(provider_reference)
            .fetch_optional(pool)
            .await?;

        Ok(verification)
    }

    /// Applies a provider decision to a pending session
    ///
    /// A session takes one decision only: returns None if the reference is
    /// unknown or already decided. `verified_at` is stamped when the new
    /// status is `verified`.
    pub async fn update_by_reference(
        pool: &PgPool,
        provider_reference: &str,
        status: KycStatus,
        failure_reason: Option<String>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE kyc_verifications
            SET status = $2,
                failure_reason = $3,
                verified_at = CASE WHEN $2 = 'verified'::kyc_status THEN NOW() ELSE verified_at END,
                updated_at = NOW()
            WHERE provider_reference = $1 AND status = 'pending'
            RETURNING {KYC_COLUMNS}
            "#
        );

        let verification = sqlx::query_as::<_, KycVerification>(&query)
            .bind(provider_reference)
            .bind(status)
            .bind(failure_reason)
            .fetch_optional(pool)
            .await?;

        Ok(verification)
    }

    /// Users whose latest final decision is `verified`
    ///
    /// A newer pending session does not revoke an earlier verification.
    pub async fn verified_user_ids(conn: &mut PgConnection) -> Result<Vec<Uuid>, sqlx::Error> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM (
                SELECT DISTINCT ON (user_id) user_id, status
                FROM kyc_verifications
                WHERE status <> 'pending'
                ORDER BY user_id, updated_at DESC
            ) latest
            WHERE status = 'verified'
            "#,
        )
        .fetch_all(conn)
        .await?;

        Ok(ids)
    }

    /// Whether a single user's latest final decision is `verified`
    pub async fn is_verified(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let status: Option<KycStatus> = sqlx::query_scalar(
            r#"
            SELECT status
            FROM kyc_verifications
            WHERE user_id = $1 AND status <> 'pending'
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(status == Some(KycStatus::Verified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kyc_status_final() {
        assert!(!KycStatus::Pending.is_final());
        assert!(KycStatus::Verified.is_final());
        assert!(KycStatus::Rejected.is_final());
        assert!(KycStatus::Expired.is_final());
        assert_eq!(KycStatus::Verified.as_str(), "verified");
    }
}
