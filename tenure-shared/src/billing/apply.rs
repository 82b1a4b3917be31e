/// Applying billing events to the local mirror
///
/// Each event is stored in `billing_events` first. A redelivered event whose
/// earlier delivery was fully applied is reported as a duplicate; one whose
/// earlier delivery failed half-way is applied again. Every write below is an
/// upsert, so re-applying is safe.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::events::{BillingEvent, BillingEventKind, PaymentEventData};
use super::BillingError;
use crate::engine::payouts::format_cents;
use crate::models::audit_log::{AuditLog, NewAuditLog};
use crate::models::billing_event::BillingEventRecord;
use crate::models::membership::{MemberStatus, Membership};
use crate::models::notification::{NewNotification, Notification, NotificationKind};
use crate::models::payment::{CreatePayment, Payment, PaymentKind, PaymentStatus};
use crate::models::subscription::{Subscription, SubscriptionStatus, UpsertSubscription};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Event id was already applied
    Duplicate,

    /// Event type is not one we act on
    Ignored,

    PaymentRecorded {
        payment_id: Uuid,
        status: PaymentStatus,
        membership_activated: bool,
    },

    SubscriptionSynced {
        subscription_id: Uuid,
        status: SubscriptionStatus,
    },
}

/// Records and applies one billing event
pub async fn apply_event(
    pool: &PgPool,
    event: &BillingEvent,
) -> Result<ApplyOutcome, BillingError> {
    let payload = serde_json::to_value(event)?;

    let recorded = BillingEventRecord::record(pool, &event.id, &event.event_type, &payload).await?;
    let record = match recorded {
        Some(record) => record,
        None => match BillingEventRecord::find_by_provider_id(pool, &event.id).await? {
            Some(existing) if existing.processed_at.is_none() => {
                tracing::warn!(event_id = %event.id, "Re-applying unprocessed billing event");
                existing
            }
            _ => {
                tracing::debug!(event_id = %event.id, "Duplicate billing event");
                return Ok(ApplyOutcome::Duplicate);
            }
        },
    };

    let outcome = match event.kind() {
        BillingEventKind::PaymentSucceeded => {
            apply_payment(pool, event, PaymentStatus::Succeeded).await?
        }
        BillingEventKind::PaymentFailed => apply_payment(pool, event, PaymentStatus::Failed).await?,
        BillingEventKind::PaymentRefunded => {
            apply_payment(pool, event, PaymentStatus::Refunded).await?
        }
        BillingEventKind::SubscriptionCreated => {
            apply_subscription(pool, event, SubscriptionChange::Created).await?
        }
        BillingEventKind::SubscriptionUpdated => {
            apply_subscription(pool, event, SubscriptionChange::Updated).await?
        }
        BillingEventKind::SubscriptionDeleted => {
            apply_subscription(pool, event, SubscriptionChange::Deleted).await?
        }
        BillingEventKind::Unknown => {
            tracing::info!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Ignoring billing event"
            );
            ApplyOutcome::Ignored
        }
    };

    BillingEventRecord::mark_processed(pool, record.id).await?;

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        outcome = ?outcome,
        "Billing event applied"
    );

    Ok(outcome)
}

async fn find_membership(pool: &PgPool, membership_id: Uuid) -> Result<Membership, BillingError> {
    Membership::find_by_id(pool, membership_id)
        .await?
        .ok_or(BillingError::UnknownMembership(membership_id))
}

async fn apply_payment(
    pool: &PgPool,
    event: &BillingEvent,
    status: PaymentStatus,
) -> Result<ApplyOutcome, BillingError> {
    let data = event.payment_data()?;
    let membership = find_membership(pool, data.membership_id).await?;

    let payment = Payment::upsert_by_provider_id(
        pool,
        CreatePayment {
            membership_id: membership.id,
            kind: data.kind,
            status,
            amount_cents: data.amount_cents,
            currency: data.currency.clone(),
            provider_payment_id: Some(data.payment_id.clone()),
            paid_at: data.paid_at.unwrap_or_else(|| event.created_at()),
        },
    )
    .await?;

    if payment.status != status {
        tracing::info!(
            payment_id = %payment.id,
            stored = payment.status.as_str(),
            received = status.as_str(),
            "Payment status change not allowed, keeping stored status"
        );
        return Ok(ApplyOutcome::PaymentRecorded {
            payment_id: payment.id,
            status: payment.status,
            membership_activated: false,
        });
    }

    let mut membership_activated = false;
    match status {
        PaymentStatus::Succeeded
            if data.kind == PaymentKind::Joining && membership.status == MemberStatus::Pending =>
        {
            Membership::update_status(pool, membership.id, MemberStatus::Active).await?;
            AuditLog::record(
                pool,
                NewAuditLog::new("membership.activated", "membership", Some(membership.id))
                    .details(serde_json::json!({ "payment_id": payment.id })),
            )
            .await?;
            membership_activated = true;

            tracing::info!(membership_id = %membership.id, "Membership activated by joining fee");
        }
        PaymentStatus::Failed => {
            notify_failed_payment(pool, &membership, &data).await?;
        }
        _ => {}
    }

    Ok(ApplyOutcome::PaymentRecorded {
        payment_id: payment.id,
        status: payment.status,
        membership_activated,
    })
}

async fn notify_failed_payment(
    pool: &PgPool,
    membership: &Membership,
    data: &PaymentEventData,
) -> Result<(), BillingError> {
    let label = match data.kind {
        PaymentKind::Joining => "joining fee",
        PaymentKind::Monthly => "monthly fee",
        PaymentKind::Other => "membership",
    };
    let mut body = format!(
        "Your {} payment of {} could not be processed.",
        label,
        format_cents(data.amount_cents)
    );

    if let Some(reason) = &data.failure_reason {
        body.push_str(&format!(" Reason: {}.", reason));
    }
    body.push_str(" Please update your payment method to keep your place in the queue.");

    Notification::create(
        pool,
        NewNotification {
            user_id: membership.user_id,
            kind: NotificationKind::PaymentFailed,
            title: "Payment failed".to_string(),
            body,
        },
    )
    .await?;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionChange {
    Created,
    Updated,
    Deleted,
}

async fn apply_subscription(
    pool: &PgPool,
    event: &BillingEvent,
    change: SubscriptionChange,
) -> Result<ApplyOutcome, BillingError> {
    let data = event.subscription_data()?;
    let membership = find_membership(pool, data.membership_id).await?;

    let upsert = UpsertSubscription {
        membership_id: membership.id,
        provider_subscription_id: data.subscription_id,
        status: match change {
            SubscriptionChange::Deleted => SubscriptionStatus::Canceled,
            _ => data.status,
        },
        current_period_start: data.current_period_start,
        current_period_end: data.current_period_end,
        cancel_at_period_end: data.cancel_at_period_end,
    };

    let subscription = match change {
        SubscriptionChange::Created => Subscription::upsert(pool, upsert).await?,
        SubscriptionChange::Updated | SubscriptionChange::Deleted => {
            match Subscription::sync(pool, upsert).await? {
                Some(subscription) => subscription,
                None => {
                    tracing::info!(
                        event_id = %event.id,
                        membership_id = %membership.id,
                        "Ignoring event for a superseded subscription"
                    );
                    return Ok(ApplyOutcome::Ignored);
                }
            }
        }
    };

    Ok(ApplyOutcome::SubscriptionSynced {
        subscription_id: subscription.id,
        status: subscription.status,
    })
}
