/// Payout evaluation and scheduling

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::queue::{refresh_queue_with, QueueRefreshOutcome};
use super::snapshot::load_snapshots_with;
use super::{lock_for_transaction, EngineError, PAYOUT_LOCK_KEY};
use crate::models::audit_log::{AuditLog, NewAuditLog};
use crate::models::membership::{MemberStatus, Membership};
use crate::models::notification::{NewNotification, Notification, NotificationKind};
use crate::models::payment::Payment;
use crate::models::payout::{CreatePayout, Payout, PayoutStatus};
use crate::rules::{payout_readiness, PayoutDecision, PoolBalance, RulesConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRunOutcome {
    pub decision: PayoutDecision,
    pub payouts: Vec<Payout>,
    pub queue: QueueRefreshOutcome,
}

impl PayoutRunOutcome {
    pub fn total_cents(&self) -> i64 {
        self.payouts.iter().map(|p| p.amount_cents).sum()
    }
}

/// Computes the payout decision without changing anything
pub async fn evaluate_payouts(
    pool: &PgPool,
    config: &RulesConfig,
    as_of: DateTime<Utc>,
) -> Result<PayoutDecision, EngineError> {
    let mut conn = pool.acquire().await?;
    evaluate_payouts_with(&mut conn, config, as_of).await
}

async fn evaluate_payouts_with(
    conn: &mut PgConnection,
    config: &RulesConfig,
    as_of: DateTime<Utc>,
) -> Result<PayoutDecision, EngineError> {
    let snapshots = load_snapshots_with(&mut *conn).await?;
    let balance = PoolBalance {
        collected_cents: Payment::total_collected_with(&mut *conn).await?,
        committed_cents: Payout::committed_total(&mut *conn).await?,
    };

    Ok(payout_readiness(&snapshots, balance, config, as_of))
}

/// Schedules payouts for every winner of a fresh decision
///
/// Re-evaluates under the payout lock; if blockers remain nothing is written
/// and [`EngineError::NotReady`] is returned. For each winner the run creates
/// a scheduled payout, marks the membership `won`, stores a notification and
/// an audit entry, then refreshes the queue, all in one transaction.
/// `actor` is None when the worker triggers the run.
pub async fn run_payouts(
    pool: &PgPool,
    config: &RulesConfig,
    as_of: DateTime<Utc>,
    actor: Option<Uuid>,
) -> Result<PayoutRunOutcome, EngineError> {
    let mut tx = pool.begin().await?;
    lock_for_transaction(&mut *tx, PAYOUT_LOCK_KEY).await?;

    let decision = evaluate_payouts_with(&mut *tx, config, as_of).await?;
    if !decision.ready {
        tracing::info!(blockers = ?decision.blockers, "Payout run skipped, not ready");
        return Err(EngineError::NotReady {
            blockers: decision.blockers,
        });
    }

    let mut payouts = Vec::with_capacity(decision.winners.len());
    for winner in &decision.winners {
        let payout = Payout::create(
            &mut *tx,
            CreatePayout {
                membership_id: winner.membership_id,
                amount_cents: winner.amount_cents,
                queue_position: winner.position as i32,
            },
        )
        .await?;

        Membership::update_status_with(&mut *tx, winner.membership_id, MemberStatus::Won).await?;

        Notification::create_with(
            &mut *tx,
            NewNotification {
                user_id: winner.user_id,
                kind: NotificationKind::PayoutScheduled,
                title: "Your payout has been scheduled".to_string(),
                body: format!(
                    "A payout of {} has been scheduled for you. Reference: {}.",
                    format_cents(payout.amount_cents),
                    payout.reference
                ),
            },
        )
        .await?;

        AuditLog::record_with(
            &mut *tx,
            NewAuditLog::new("payout.scheduled", "payout", Some(payout.id))
                .actor(actor)
                .details(serde_json::json!({
                    "membership_id": winner.membership_id,
                    "amount_cents": payout.amount_cents,
                    "queue_position": payout.queue_position,
                    "reference": payout.reference,
                })),
        )
        .await?;

        tracing::info!(
            payout_id = %payout.id,
            membership_id = %winner.membership_id,
            position = winner.position,
            amount_cents = payout.amount_cents,
            "Payout scheduled"
        );

        payouts.push(payout);
    }

    // Winners already received a payout notification
    let winners: Vec<Uuid> = decision.winners.iter().map(|w| w.membership_id).collect();
    let queue = refresh_queue_with(&mut *tx, config, as_of, &winners).await?;
    tx.commit().await?;

    let outcome = PayoutRunOutcome {
        decision,
        payouts,
        queue,
    };

    tracing::info!(
        count = outcome.payouts.len(),
        total_cents = outcome.total_cents(),
        actor = ?actor,
        "Payout run completed"
    );

    Ok(outcome)
}

/// Result of an operator moving a payout along its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutUpdate {
    pub payout: Payout,
    pub previous: PayoutStatus,

    /// The member went back from `won` to `active`
    pub membership_restored: bool,
}

/// Records settlement progress for a payout
///
/// Runs under the payout lock with the payout row locked, so the transition
/// check and the write see the same status. When a payout ends `failed` or
/// `cancelled` its member never received the money; a `won` membership goes
/// back to `active` and rejoins the queue on the next refresh. Returns None
/// for an unknown payout.
pub async fn update_payout_status(
    pool: &PgPool,
    payout_id: Uuid,
    status: PayoutStatus,
    failure_reason: Option<String>,
    actor: Option<Uuid>,
) -> Result<Option<PayoutUpdate>, EngineError> {
    let mut tx = pool.begin().await?;
    lock_for_transaction(&mut *tx, PAYOUT_LOCK_KEY).await?;

    let Some(current) = Payout::find_for_update(&mut *tx, payout_id).await? else {
        return Ok(None);
    };

    if !current.status.can_transition_to(status) {
        return Err(EngineError::InvalidPayoutTransition {
            from: current.status,
            to: status,
        });
    }

    let updated = Payout::update_status_with(&mut *tx, payout_id, status, failure_reason).await?;
    let Some(payout) = updated else {
        return Ok(None);
    };

    AuditLog::record_with(
        &mut *tx,
        NewAuditLog::new("payout.status_changed", "payout", Some(payout.id))
            .actor(actor)
            .details(serde_json::json!({
                "from": current.status,
                "to": payout.status,
                "failure_reason": payout.failure_reason,
            })),
    )
    .await?;

    let mut membership_restored = false;
    if !payout.status.is_committed() {
        let restored = Membership::restore_winner_with(&mut *tx, payout.membership_id).await?;
        if restored.is_some() {
            AuditLog::record_with(
                &mut *tx,
                NewAuditLog::new("membership.restored", "membership", Some(payout.membership_id))
                    .actor(actor)
                    .details(serde_json::json!({
                        "payout_id": payout.id,
                        "payout_status": payout.status,
                    })),
            )
            .await?;

            membership_restored = true;
        }
    }

    tx.commit().await?;

    tracing::info!(
        payout_id = %payout.id,
        from = current.status.as_str(),
        to = payout.status.as_str(),
        membership_restored,
        "Payout status updated"
    );

    Ok(Some(PayoutUpdate {
        payout,
        previous: current.status,
        membership_restored,
    }))
}

/// Formats cents as a dollar amount, e.g. `$1,250.00`
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (index, digit) in dollars.chars().enumerate() {
        if index > 0 && (dollars.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(2_500), "$25.00");
        assert_eq!(format_cents(125_099), "$1,250.99");
        assert_eq!(format_cents(10_000_000), "$100,000.00");
        assert_eq!(format_cents(-30_000), "-$300.00");
    }
}
