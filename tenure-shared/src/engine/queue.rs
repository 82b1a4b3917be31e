/// Queue computation and refresh

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::snapshot::{load_snapshot, load_snapshots, load_snapshots_with};
use super::{lock_for_transaction, EngineError, QUEUE_LOCK_KEY};
use crate::models::notification::{NewNotification, Notification, NotificationKind};
use crate::models::queue_entry::QueueEntryRow;
use crate::rules::{evaluate, rank, EligibilityReport, MemberSnapshot, QueueEntry, RulesConfig};

/// A member whose position moved during a refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionChange {
    pub membership_id: Uuid,
    pub user_id: Uuid,

    /// None when the member was not queued before
    pub previous: Option<u32>,

    /// None when the member dropped out of the queue
    pub current: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRefreshOutcome {
    pub computed_at: DateTime<Utc>,
    pub queued: usize,
    pub previously_queued: usize,
    pub changes: Vec<PositionChange>,

    /// Queue-position notifications stored for `changes`
    pub notified: usize,
}

/// Ranks every member without persisting anything
pub async fn compute_queue(
    pool: &PgPool,
    config: &RulesConfig,
    as_of: DateTime<Utc>,
) -> Result<Vec<QueueEntry>, EngineError> {
    let snapshots = load_snapshots(pool).await?;
    Ok(rank(&snapshots, config, as_of))
}

/// Evaluates a single membership; None if it doesn't exist
pub async fn evaluate_member(
    pool: &PgPool,
    config: &RulesConfig,
    membership_id: Uuid,
    as_of: DateTime<Utc>,
) -> Result<Option<EligibilityReport>, EngineError> {
    let snapshot = load_snapshot(pool, membership_id).await?;
    Ok(snapshot.map(|member| evaluate(&member, config, as_of)))
}

/// Recomputes the queue and replaces the stored ranking
pub async fn refresh_queue(
    pool: &PgPool,
    config: &RulesConfig,
    as_of: DateTime<Utc>,
) -> Result<QueueRefreshOutcome, EngineError> {
    let mut tx = pool.begin().await?;
    let outcome = refresh_queue_with(&mut *tx, config, as_of, &[]).await?;
    tx.commit().await?;

    tracing::info!(
        queued = outcome.queued,
        previously_queued = outcome.previously_queued,
        changes = outcome.changes.len(),
        notified = outcome.notified,
        "Queue refreshed"
    );

    Ok(outcome)
}

/// Same as [`refresh_queue`] inside the caller's transaction
///
/// Members whose position moved get a `queue_position` notification, except
/// the memberships listed in `silent`.
pub(crate) async fn refresh_queue_with(
    conn: &mut PgConnection,
    config: &RulesConfig,
    as_of: DateTime<Utc>,
    silent: &[Uuid],
) -> Result<QueueRefreshOutcome, EngineError> {
    lock_for_transaction(&mut *conn, QUEUE_LOCK_KEY).await?;

    let snapshots = load_snapshots_with(&mut *conn).await?;
    let queue = rank(&snapshots, config, as_of);

    let previous: HashMap<Uuid, u32> = QueueEntryRow::positions(&mut *conn)
        .await?
        .into_iter()
        .map(|(id, position)| (id, position as u32))
        .collect();

    QueueEntryRow::replace_all(&mut *conn, &queue, as_of).await?;

    let changes = diff_positions(&previous, &queue, &snapshots);

    let mut notified = 0;
    for change in changes.iter().filter(|c| !silent.contains(&c.membership_id)) {
        if let Some(notification) = position_notification(change) {
            Notification::create_with(&mut *conn, notification).await?;
            notified += 1;
        }
    }

    Ok(QueueRefreshOutcome {
        computed_at: as_of,
        queued: queue.len(),
        previously_queued: previous.len(),
        changes,
        notified,
    })
}

/// Builds the message for a member whose position moved
pub fn position_notification(change: &PositionChange) -> Option<NewNotification> {
    let (title, body) = match (change.previous, change.current) {
        (None, Some(current)) => (
            "You're in the payout queue".to_string(),
            format!("You joined the payout queue at position {current}."),
        ),
        (Some(previous), Some(current)) if current < previous => (
            "You moved up the queue".to_string(),
            format!("Your queue position moved from {previous} to {current}."),
        ),
        (Some(previous), Some(current)) if current > previous => (
            "Your queue position changed".to_string(),
            format!("Your queue position moved from {previous} to {current}."),
        ),
        (Some(_), None) => (
            "You left the payout queue".to_string(),
            "You are no longer in the payout queue. Check your membership for details."
                .to_string(),
        ),
        _ => return None,
    };

    Some(NewNotification {
        user_id: change.user_id,
        kind: NotificationKind::QueuePosition,
        title,
        body,
    })
}

fn diff_positions(
    previous: &HashMap<Uuid, u32>,
    queue: &[QueueEntry],
    snapshots: &[MemberSnapshot],
) -> Vec<PositionChange> {
    let mut changes: Vec<PositionChange> = queue
        .iter()
        .filter_map(|entry| {
            let before = previous.get(&entry.membership_id).copied();
            (before != Some(entry.position)).then(|| PositionChange {
                membership_id: entry.membership_id,
                user_id: entry.user_id,
                previous: before,
                current: Some(entry.position),
            })
        })
        .collect();

    let users: HashMap<Uuid, Uuid> = snapshots
        .iter()
        .map(|s| (s.membership_id, s.user_id))
        .collect();
    let queued: HashMap<Uuid, u32> = queue.iter().map(|e| (e.membership_id, e.position)).collect();

    let mut dropped: Vec<PositionChange> = previous
        .iter()
        .filter(|(id, _)| !queued.contains_key(*id))
        .filter_map(|(id, position)| {
            users.get(id).map(|user_id| PositionChange {
                membership_id: *id,
                user_id: *user_id,
                previous: Some(*position),
                current: None,
            })
        })
        .collect();
    dropped.sort_by_key(|c| c.previous);

    changes.append(&mut dropped);
    changes
}
