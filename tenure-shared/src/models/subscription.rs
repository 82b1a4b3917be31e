/// Subscription model and database operations
///
/// Mirrors the billing provider's recurring subscription for a membership.
/// Rows are written from `subscription.*` billing events. A membership has
/// at most one subscription: `subscription.created` replaces it (a
/// re-subscription carries a new provider id), while updates and deletions
/// only touch the row whose provider id they name, so a late event for an
/// old subscription never clobbers the current one.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE subscriptions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     membership_id UUID NOT NULL UNIQUE REFERENCES memberships(id) ON DELETE CASCADE,
///     provider_subscription_id VARCHAR(255) NOT NULL UNIQUE,
///     status subscription_status NOT NULL,
///     current_period_start TIMESTAMPTZ,
///     current_period_end TIMESTAMPTZ,
///     cancel_at_period_end BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Provider subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Incomplete => "incomplete",
        }
    }

    /// Whether the subscription keeps a member in good standing
    ///
    /// `past_due` still counts: the provider is retrying and the grace period
    /// rules decide when the member actually lapses.
    pub fn is_in_good_standing(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::PastDue)
    }
}

/// A membership's recurring subscription
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub membership_id: Uuid,
    pub provider_subscription_id: String,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or refreshing a subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertSubscription {
    pub membership_id: Uuid,
    pub provider_subscription_id: String,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

const SUBSCRIPTION_COLUMNS: &str = "id, membership_id, provider_subscription_id, status, \
                                    current_period_start, current_period_end, \
                                    cancel_at_period_end, created_at, updated_at";

impl Subscription {
    /// Stores a newly created subscription, replacing any earlier one of the
    /// membership
    pub async fn upsert(pool: &PgPool, data: UpsertSubscription) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO subscriptions
                (membership_id, provider_subscription_id, status,
                 current_period_start, current_period_end, cancel_at_period_end)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (membership_id) DO UPDATE
            SET provider_subscription_id = EXCLUDED.provider_subscription_id,
                status = EXCLUDED.status,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                updated_at = NOW()
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        );

        let subscription = sqlx::query_as::<_, Subscription>(&query)
            .bind(data.membership_id)
            .bind(data.provider_subscription_id)
            .bind(data.status)
            .bind(data.current_period_start)
            .bind(data.current_period_end)
            .bind(data.cancel_at_period_end)
            .fetch_one(pool)
            .await?;

        Ok(subscription)
    }

    /// Refreshes the membership's subscription if it is the one named
    ///
    /// Inserts when the membership has no subscription yet (the created event
    /// may have been missed). Returns None when the membership's current
    /// subscription has a different provider id.
    pub async fn sync(
        pool: &PgPool,
        data: UpsertSubscription,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO subscriptions
                (membership_id, provider_subscription_id, status,
                 current_period_start, current_period_end, cancel_at_period_end)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (membership_id) DO UPDATE
            SET status = EXCLUDED.status,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                updated_at = NOW()
            WHERE subscriptions.provider_subscription_id = EXCLUDED.provider_subscription_id
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        );

        let subscription = sqlx::query_as::<_, Subscription>(&query)
            .bind(data.membership_id)
            .bind(data.provider_subscription_id)
            .bind(data.status)
            .bind(data.current_period_start)
            .bind(data.current_period_end)
            .bind(data.cancel_at_period_end)
            .fetch_optional(pool)
            .await?;

        Ok(subscription)
    }

    /// Finds the subscription of a membership
    pub async fn find_by_membership(
        pool: &PgPool,
        membership_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE membership_id = $1"
        );

        let subscription = sqlx::query_as::<_, Subscription>(&query)
            .bind(membership_id)
            .fetch_optional(pool)
            .await?;

        Ok(subscription)
    }

    /// Every subscription, for the rule engine's bulk snapshot
    pub async fn list_all(conn: &mut PgConnection) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions");

        let subscriptions = sqlx::query_as::<_, Subscription>(&query)
            .fetch_all(conn)
            .await?;

        Ok(subscriptions)
    }
}
