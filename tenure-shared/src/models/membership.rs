/// Membership model and database operations
///
/// A membership is a user's seat in the fee rotation. Its status drives queue
/// eligibility; the status column doubles as the soft-delete flag
/// (`cancelled`) and records payout winners (`won`).
///
/// # Schema
///
/// ```sql
/// CREATE TYPE member_status AS ENUM ('pending', 'active', 'suspended', 'cancelled', 'won');
///
/// CREATE TABLE memberships (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
///     status member_status NOT NULL DEFAULT 'pending',
///     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Lifecycle
///
/// ```text
/// pending   ──(joining fee paid, or admin)──> active
/// pending   ──(admin)──> cancelled
/// active    ──(admin)──> suspended | cancelled
/// suspended ──(admin)──> active | cancelled
/// active    ──(payout scheduled)──> won
/// won       ──(payout failed or cancelled)──> active
/// ```
///
/// `cancelled` is terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Membership lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// Signed up, joining fee not yet received
    Pending,

    /// Paying member, eligible for the queue
    Active,

    /// Temporarily excluded by an administrator
    Suspended,

    /// Left the platform (soft delete)
    Cancelled,

    /// Received a payout
    Won,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Pending => "pending",
            MemberStatus::Active => "active",
            MemberStatus::Suspended => "suspended",
            MemberStatus::Cancelled => "cancelled",
            MemberStatus::Won => "won",
        }
    }

    /// Whether an administrator may move a membership from `self` to `next`
    ///
    /// `won` is entered and left only through payouts, never by an
    /// administrator.
    pub fn can_transition_to(&self, next: MemberStatus) -> bool {
        use MemberStatus::*;
        match (self, next) {
            (current, target) if *current == target => false,
            (Won, _) | (Cancelled, _) => false,
            (_, Won) => false,
            (Pending, Active) | (Pending, Cancelled) => true,
            (Active, Suspended) | (Active, Cancelled) => true,
            (Suspended, Active) | (Suspended, Cancelled) => true,
            _ => false,
        }
    }
}

/// A user's membership in the rotation
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Lifecycle status
    pub status: MemberStatus,

    /// When the member signed up
    pub joined_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    pub user_id: Uuid,

    /// Initial status (defaults to pending)
    #[serde(default = "default_status")]
    pub status: MemberStatus,
}

fn default_status() -> MemberStatus {
    MemberStatus::Pending
}

impl Membership {
    /// Creates a membership for a user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation (`memberships_user_id_key`) when the user
    /// already holds a membership.
    pub async fn create(pool: &PgPool, data: CreateMembership) -> Result<Self, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (user_id, status)
            VALUES ($1, $2)
            RETURNING id, user_id, status, joined_at, created_at, updated_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.status)
        .fetch_one(pool)
        .await?;

        Ok(membership)
    }

    /// Finds a membership by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT id, user_id, status, joined_at, created_at, updated_at
            FROM memberships
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(membership)
    }

    /// Finds the membership owned by a user
    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT id, user_id, status, joined_at, created_at, updated_at
            FROM memberships
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(membership)
    }

    /// Lists memberships, oldest first, optionally filtered by status
    pub async fn list(
        pool: &PgPool,
        status: Option<MemberStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let memberships = sqlx::query_as::<_, Membership>(
            r#"
            SELECT id, user_id, status, joined_at, created_at, updated_at
            FROM memberships
            WHERE ($1::member_status IS NULL OR status = $1)
            ORDER BY joined_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(memberships)
    }

    /// Loads every membership, used by the rule engine's bulk snapshot
    pub async fn list_all(conn: &mut PgConnection) -> Result<Vec<Self>, sqlx::Error> {
        let memberships = sqlx::query_as::<_, Membership>(
            r#"
            SELECT id, user_id, status, joined_at, created_at, updated_at
            FROM memberships
            ORDER BY joined_at ASC, id ASC
            "#,
        )
        .fetch_all(conn)
        .await?;

        Ok(memberships)
    }

    /// Updates the status of a membership
    ///
    /// Returns None if the membership doesn't exist. Transition rules are
    /// enforced by callers via [`MemberStatus::can_transition_to`].
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: MemberStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::update_status_with(&mut conn, id, status).await
    }

    /// Moves a `won` membership back to `active`
    ///
    /// Returns None when the membership isn't currently `won`.
    pub async fn restore_winner_with(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET status = 'active', updated_at = NOW()
            WHERE id = $1 AND status = 'won'
            RETURNING id, user_id, status, joined_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(membership)
    }

    /// Same as [`Membership::update_status`] on an explicit connection, so
    /// it can participate in a transaction.
    pub async fn update_status_with(
        conn: &mut PgConnection,
        id: Uuid,
        status: MemberStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, status, joined_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(conn)
        .await?;

        Ok(membership)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_status_as_str() {
        assert_eq!(MemberStatus::Pending.as_str(), "pending");
        assert_eq!(MemberStatus::Active.as_str(), "active");
        assert_eq!(MemberStatus::Suspended.as_str(), "suspended");
        assert_eq!(MemberStatus::Cancelled.as_str(), "cancelled");
        assert_eq!(MemberStatus::Won.as_str(), "won");
    }

    #[test]
    fn test_status_transitions() {
        assert!(MemberStatus::Pending.can_transition_to(MemberStatus::Active));
        assert!(MemberStatus::Active.can_transition_to(MemberStatus::Suspended));
        assert!(MemberStatus::Suspended.can_transition_to(MemberStatus::Active));
        assert!(MemberStatus::Active.can_transition_to(MemberStatus::Cancelled));
        assert!(MemberStatus::Pending.can_transition_to(MemberStatus::Cancelled));
        assert!(MemberStatus::Suspended.can_transition_to(MemberStatus::Cancelled));

        // Won is entered and left only through payouts
        assert!(!MemberStatus::Active.can_transition_to(MemberStatus::Won));
        assert!(!MemberStatus::Won.can_transition_to(MemberStatus::Active));

        // Cancelled is terminal
        assert!(!MemberStatus::Cancelled.can_transition_to(MemberStatus::Active));

        // No-op transitions are rejected
        assert!(!MemberStatus::Active.can_transition_to(MemberStatus::Active));

        // Pending members must pay before suspension makes sense
        assert!(!MemberStatus::Pending.can_transition_to(MemberStatus::Suspended));
    }

    #[test]
    fn test_create_membership_default_status() {
        assert_eq!(default_status(), MemberStatus::Pending);

        let parsed: CreateMembership =
            serde_json::from_value(serde_json::json!({ "user_id": Uuid::nil() })).unwrap();
        assert_eq!(parsed.status, MemberStatus::Pending);
    }
}
