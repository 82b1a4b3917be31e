/// In-app notifications
///
/// Notifications are only stored; delivering them by e-mail or SMS is left
/// to external systems.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE notifications (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     kind notification_kind NOT NULL,
///     title VARCHAR(255) NOT NULL,
///     body TEXT NOT NULL,
///     read_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    QueuePosition,
    PaymentFailed,
    PayoutScheduled,
    KycUpdate,
    General,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, body, read_at, created_at";

impl Notification {
    pub async fn create(pool: &PgPool, data: NewNotification) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::create_with(&mut conn, data).await
    }

    pub async fn create_with(
        conn: &mut PgConnection,
        data: NewNotification,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO notifications (user_id, kind, title, body)
            VALUES ($1, $2, $3, $4)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );

        let notification = sqlx::query_as::<_, Notification>(&query)
            .bind(data.user_id)
            .bind(data.kind)
            .bind(data.title)
            .bind(data.body)
            .fetch_one(conn)
            .await?;

        Ok(notification)
    }

    /// Lists a user's notifications, newest first
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        );

        let notifications = sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .bind(unread_only)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok(notifications)
    }

    /// Marks a notification read
    ///
    /// Scoped to the owner: returns None when the id is unknown or belongs to
    /// someone else. Marking twice keeps the first `read_at`.
    pub async fn mark_read(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );

        let notification = sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_format() {
        let json = serde_json::to_string(&NotificationKind::PayoutScheduled).unwrap();
        assert_eq!(json, "\"payout_scheduled\"");

        let kind: NotificationKind = serde_json::from_str("\"queue_position\"").unwrap();
        assert_eq!(kind, NotificationKind::QueuePosition);
    }
}
