/// Integration tests for queue refresh, payout runs and billing ingestion
///
/// Run with: cargo test -p tenure-shared --test engine_tests -- --test-threads=1
///
/// The queue and pool are global, so assertions only look at members each
/// test creates itself.

mod common;

use chrono::Utc;
use common::{create_member, days_ago, pay_steadily, record_payment, setup_pool, subscribe};
use tenure_shared::billing::{apply_event, ApplyOutcome, BillingEvent, BillingError};
use tenure_shared::engine::{self, EngineError};
use tenure_shared::models::membership::{MemberStatus, Membership};
use tenure_shared::models::notification::{Notification, NotificationKind};
use tenure_shared::models::payment::{Payment, PaymentKind, PaymentStatus};
use tenure_shared::models::payout::{Payout, PayoutStatus};
use tenure_shared::models::queue_entry::QueueEntryRow;
use tenure_shared::models::subscription::{Subscription, SubscriptionStatus};
use tenure_shared::rules::{IneligibilityReason, PayoutBlocker, RulesConfig};
use uuid::Uuid;

#[tokio::test]
async fn test_refresh_queue_ranks_eligible_members_only() {
    let pool = setup_pool().await;
    let config = RulesConfig::default();

    let steady = create_member(&pool, MemberStatus::Active).await;
    pay_steadily(&pool, steady.id, 400).await;
    subscribe(&pool, steady.id, SubscriptionStatus::Active).await;

    let lapsed = create_member(&pool, MemberStatus::Active).await;
    let history = [(PaymentKind::Joining, 30_000, 300), (PaymentKind::Monthly, 2_500, 200)];
    for (kind, cents, days) in history {
        let paid_at = days_ago(days);
        record_payment(&pool, lapsed.id, kind, PaymentStatus::Succeeded, cents, paid_at).await;
    }
    subscribe(&pool, lapsed.id, SubscriptionStatus::Active).await;

    let outcome = engine::refresh_queue(&pool, &config, Utc::now()).await.unwrap();
    assert!(outcome.queued >= 1);
    assert!(outcome
        .changes
        .iter()
        .any(|c| c.membership_id == steady.id && c.previous.is_none() && c.current.is_some()));

    let row = QueueEntryRow::find_by_membership(&pool, steady.id)
        .await
        .unwrap()
        .expect("steady payer is queued");
    assert!(row.position >= 1);
    assert!(row.tenure_days >= 399);
    assert_eq!(row.display_name.as_deref(), Some("Test Member"));

    assert!(QueueEntryRow::find_by_membership(&pool, lapsed.id)
        .await
        .unwrap()
        .is_none());

    let report = engine::evaluate_member(&pool, &config, lapsed.id, Utc::now())
        .await
        .unwrap()
        .expect("membership exists");
    assert!(!report.eligible);
    assert!(report
        .reasons
        .iter()
        .any(|r| matches!(r, IneligibilityReason::PaymentLapsed { .. })));
}

#[tokio::test]
async fn test_second_refresh_reports_no_change_for_stable_member() {
    let pool = setup_pool().await;
    let config = RulesConfig::default();

    let member = create_member(&pool, MemberStatus::Active).await;
    pay_steadily(&pool, member.id, 90).await;
    subscribe(&pool, member.id, SubscriptionStatus::Active).await;

    let now = Utc::now();
    engine::refresh_queue(&pool, &config, now).await.unwrap();
    let second = engine::refresh_queue(&pool, &config, now).await.unwrap();

    assert!(second.changes.iter().all(|c| c.membership_id != member.id));
}

#[tokio::test]
async fn test_refresh_queue_notifies_moved_members() {
    let pool = setup_pool().await;
    let config = RulesConfig::default();

    let member = create_member(&pool, MemberStatus::Active).await;
    pay_steadily(&pool, member.id, 120).await;
    subscribe(&pool, member.id, SubscriptionStatus::Active).await;

    let now = Utc::now();
    let first = engine::refresh_queue(&pool, &config, now).await.unwrap();
    assert!(first.notified >= 1);

    engine::refresh_queue(&pool, &config, now).await.unwrap();

    let notifications = Notification::list_by_user(&pool, member.user_id, false, 10, 0)
        .await
        .unwrap();
    let queue_updates: Vec<_> = notifications
        .iter()
        .filter(|n| n.kind == NotificationKind::QueuePosition)
        .collect();
    assert_eq!(queue_updates.len(), 1);
    assert_eq!(queue_updates[0].title, "You're in the payout queue");
}

#[tokio::test]
async fn test_evaluate_unknown_member() {
    let pool = setup_pool().await;
    let report = engine::evaluate_member(&pool, &RulesConfig::default(), Uuid::new_v4(), Utc::now())
        .await
        .unwrap();
    assert!(report.is_none());
}

#[tokio::test]
async fn test_run_payouts_not_ready_writes_nothing() {
    let pool = setup_pool().await;
    let config = RulesConfig {
        payout_amount_cents: i64::MAX / 4,
        ..RulesConfig::default()
    };

    let member = create_member(&pool, MemberStatus::Active).await;
    pay_steadily(&pool, member.id, 400).await;
    subscribe(&pool, member.id, SubscriptionStatus::Active).await;

    let err = engine::run_payouts(&pool, &config, Utc::now(), None)
        .await
        .unwrap_err();

    match err {
        EngineError::NotReady { blockers } => assert!(blockers
            .iter()
            .any(|b| matches!(b, PayoutBlocker::InsufficientPool { .. }))),
        other => panic!("expected NotReady, got {other}"),
    }

    assert!(Payout::list_by_membership(&pool, member.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_run_payouts_schedules_winner() {
    let pool = setup_pool().await;
    let config = RulesConfig {
        payout_amount_cents: 100,
        min_payout_tenure_days: 0,
        require_kyc_for_payout: false,
        ..RulesConfig::default()
    };

    let member = create_member(&pool, MemberStatus::Active).await;
    pay_steadily(&pool, member.id, 400).await;
    subscribe(&pool, member.id, SubscriptionStatus::Active).await;

    let decision = engine::evaluate_payouts(&pool, &config, Utc::now()).await.unwrap();
    assert!(decision.ready);
    assert!(decision.winners.iter().any(|w| w.membership_id == member.id));

    let outcome = engine::run_payouts(&pool, &config, Utc::now(), None)
        .await
        .unwrap();
    assert!(outcome.total_cents() >= 100);

    let payouts = Payout::list_by_membership(&pool, member.id).await.unwrap();
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].status, PayoutStatus::Scheduled);
    assert!(payouts[0].reference.starts_with("PO-"));

    let membership = Membership::find_by_id(&pool, member.id).await.unwrap().unwrap();
    assert_eq!(membership.status, MemberStatus::Won);

    assert!(QueueEntryRow::find_by_membership(&pool, member.id)
        .await
        .unwrap()
        .is_none());

    let notifications = Notification::list_by_user(&pool, member.user_id, false, 10, 0)
        .await
        .unwrap();
    assert!(notifications
        .iter()
        .any(|n| n.kind == NotificationKind::PayoutScheduled));
    assert!(!notifications
        .iter()
        .any(|n| n.kind == NotificationKind::QueuePosition));
}

#[tokio::test]
async fn test_failed_payout_restores_membership() {
    let pool = setup_pool().await;
    let config = RulesConfig {
        payout_amount_cents: 100,
        min_payout_tenure_days: 0,
        require_kyc_for_payout: false,
        ..RulesConfig::default()
    };

    let member = create_member(&pool, MemberStatus::Active).await;
    pay_steadily(&pool, member.id, 400).await;
    subscribe(&pool, member.id, SubscriptionStatus::Active).await;

    engine::run_payouts(&pool, &config, Utc::now(), None)
        .await
        .unwrap();
    let payout = Payout::list_by_membership(&pool, member.id).await.unwrap().remove(0);

    let update = engine::update_payout_status(
        &pool,
        payout.id,
        PayoutStatus::Failed,
        Some("bank account closed".to_string()),
        None,
    )
    .await
    .unwrap()
    .expect("payout exists");

    assert_eq!(update.previous, PayoutStatus::Scheduled);
    assert_eq!(update.payout.status, PayoutStatus::Failed);
    assert!(update.membership_restored);

    let membership = Membership::find_by_id(&pool, member.id).await.unwrap().unwrap();
    assert_eq!(membership.status, MemberStatus::Active);

    engine::refresh_queue(&pool, &config, Utc::now()).await.unwrap();
    assert!(QueueEntryRow::find_by_membership(&pool, member.id)
        .await
        .unwrap()
        .is_some());

    // Failed is terminal
    let err = engine::update_payout_status(&pool, payout.id, PayoutStatus::Processing, None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidPayoutTransition {
            from: PayoutStatus::Failed,
            to: PayoutStatus::Processing
        }
    ));

    let unknown =
        engine::update_payout_status(&pool, Uuid::new_v4(), PayoutStatus::Processing, None, None)
            .await
            .unwrap();
    assert!(unknown.is_none());
}

#[tokio::test]
async fn test_completed_payout_keeps_member_won() {
    let pool = setup_pool().await;
    let config = RulesConfig {
        payout_amount_cents: 100,
        min_payout_tenure_days: 0,
        require_kyc_for_payout: false,
        ..RulesConfig::default()
    };

    let member = create_member(&pool, MemberStatus::Active).await;
    pay_steadily(&pool, member.id, 400).await;
    subscribe(&pool, member.id, SubscriptionStatus::Active).await;

    engine::run_payouts(&pool, &config, Utc::now(), None)
        .await
        .unwrap();
    let payout = Payout::list_by_membership(&pool, member.id).await.unwrap().remove(0);

    for status in [PayoutStatus::Processing, PayoutStatus::Completed] {
        let update = engine::update_payout_status(&pool, payout.id, status, None, None)
            .await
            .unwrap()
            .unwrap();
        assert!(!update.membership_restored);
    }

    let payout = Payout::find_by_id(&pool, payout.id).await.unwrap().unwrap();
    assert!(payout.completed_at.is_some());

    let membership = Membership::find_by_id(&pool, member.id).await.unwrap().unwrap();
    assert_eq!(membership.status, MemberStatus::Won);
}

fn payment_event(
    id: &str,
    event_type: &str,
    membership_id: Uuid,
    kind: &str,
    payment_id: &str,
) -> BillingEvent {
    BillingEvent {
        id: id.to_string(),
        event_type: event_type.to_string(),
        created: Utc::now().timestamp(),
        data: serde_json::json!({
            "payment_id": payment_id,
            "membership_id": membership_id,
            "kind": kind,
            "amount_cents": 30000,
            "currency": "usd",
            "failure_reason": "card_declined"
        }),
    }
}

#[tokio::test]
async fn test_joining_fee_event_activates_membership_once() {
    let pool = setup_pool().await;
    let member = create_member(&pool, MemberStatus::Pending).await;

    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    let payment_id = format!("pay_{}", Uuid::new_v4().simple());
    let event = payment_event(&event_id, "payment.succeeded", member.id, "joining", &payment_id);

    let outcome = apply_event(&pool, &event).await.unwrap();
    assert!(matches!(
        outcome,
        ApplyOutcome::PaymentRecorded {
            status: PaymentStatus::Succeeded,
            membership_activated: true,
            ..
        }
    ));

    let membership = Membership::find_by_id(&pool, member.id).await.unwrap().unwrap();
    assert_eq!(membership.status, MemberStatus::Active);

    assert_eq!(apply_event(&pool, &event).await.unwrap(), ApplyOutcome::Duplicate);

    let payments = Payment::list_for_membership(&pool, member.id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].provider_payment_id.as_deref(), Some(payment_id.as_str()));
}

#[tokio::test]
async fn test_failed_payment_notifies_member() {
    let pool = setup_pool().await;
    let member = create_member(&pool, MemberStatus::Active).await;

    let event = payment_event(
        &format!("evt_{}", Uuid::new_v4().simple()),
        "payment.failed",
        member.id,
        "monthly",
        &format!("pay_{}", Uuid::new_v4().simple()),
    );
    apply_event(&pool, &event).await.unwrap();

    let notifications = Notification::list_by_user(&pool, member.user_id, true, 10, 0)
        .await
        .unwrap();
    let failed = notifications
        .iter()
        .find(|n| n.kind == NotificationKind::PaymentFailed)
        .expect("failure notification");
    assert!(failed.body.contains("monthly fee"));
    assert!(failed.body.contains("card_declined"));
}

#[tokio::test]
async fn test_settled_payment_status_only_moves_to_refunded() {
    let pool = setup_pool().await;
    let member = create_member(&pool, MemberStatus::Active).await;
    let payment_id = format!("pay_{}", Uuid::new_v4().simple());
    let event = |event_type: &str| {
        payment_event(
            &format!("evt_{}", Uuid::new_v4().simple()),
            event_type,
            member.id,
            "monthly",
            &payment_id,
        )
    };

    apply_event(&pool, &event("payment.succeeded")).await.unwrap();

    // A late failure doesn't undo the settled payment or alert the member
    let late_failure = apply_event(&pool, &event("payment.failed")).await.unwrap();
    assert!(matches!(
        late_failure,
        ApplyOutcome::PaymentRecorded {
            status: PaymentStatus::Succeeded,
            ..
        }
    ));
    let notifications = Notification::list_by_user(&pool, member.user_id, false, 10, 0)
        .await
        .unwrap();
    assert!(!notifications
        .iter()
        .any(|n| n.kind == NotificationKind::PaymentFailed));

    apply_event(&pool, &event("payment.refunded")).await.unwrap();
    apply_event(&pool, &event("payment.succeeded")).await.unwrap();

    let stored = Payment::find_by_provider_id(&pool, &payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn test_subscription_events_sync_status() {
    let pool = setup_pool().await;
    let member = create_member(&pool, MemberStatus::Active).await;
    let subscription_id = format!("sub_{}", Uuid::new_v4().simple());

    let event = |event_type: &str, status: &str| BillingEvent {
        id: format!("evt_{}", Uuid::new_v4().simple()),
        event_type: event_type.to_string(),
        created: Utc::now().timestamp(),
        data: serde_json::json!({
            "subscription_id": subscription_id,
            "membership_id": member.id,
            "status": status,
        }),
    };

    let created = apply_event(&pool, &event("subscription.created", "active"))
        .await
        .unwrap();
    assert!(matches!(
        created,
        ApplyOutcome::SubscriptionSynced { status: SubscriptionStatus::Active, .. }
    ));

    let deleted = apply_event(&pool, &event("subscription.deleted", "active"))
        .await
        .unwrap();
    assert!(matches!(
        deleted,
        ApplyOutcome::SubscriptionSynced { status: SubscriptionStatus::Canceled, .. }
    ));
}

fn subscription_event(
    event_type: &str,
    membership_id: Uuid,
    subscription_id: &str,
) -> BillingEvent {
    BillingEvent {
        id: format!("evt_{}", Uuid::new_v4().simple()),
        event_type: event_type.to_string(),
        created: Utc::now().timestamp(),
        data: serde_json::json!({
            "subscription_id": subscription_id,
            "membership_id": membership_id,
            "status": "active",
        }),
    }
}

#[tokio::test]
async fn test_late_events_for_replaced_subscription_are_ignored() {
    let pool = setup_pool().await;
    let member = create_member(&pool, MemberStatus::Active).await;
    let old_id = format!("sub_{}", Uuid::new_v4().simple());
    let new_id = format!("sub_{}", Uuid::new_v4().simple());

    apply_event(&pool, &subscription_event("subscription.created", member.id, &old_id))
        .await
        .unwrap();
    apply_event(&pool, &subscription_event("subscription.created", member.id, &new_id))
        .await
        .unwrap();

    let late_delete = subscription_event("subscription.deleted", member.id, &old_id);
    assert_eq!(apply_event(&pool, &late_delete).await.unwrap(), ApplyOutcome::Ignored);

    let late_update = subscription_event("subscription.updated", member.id, &old_id);
    assert_eq!(apply_event(&pool, &late_update).await.unwrap(), ApplyOutcome::Ignored);

    let current = Subscription::find_by_membership(&pool, member.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.provider_subscription_id, new_id);
    assert_eq!(current.status, SubscriptionStatus::Active);

    // Deleting the current subscription still cancels it
    let current_deleted = subscription_event("subscription.deleted", member.id, &new_id);
    let deleted = apply_event(&pool, &current_deleted).await.unwrap();
    assert!(matches!(
        deleted,
        ApplyOutcome::SubscriptionSynced { status: SubscriptionStatus::Canceled, .. }
    ));
}

#[tokio::test]
async fn test_unknown_membership_and_event_type() {
    let pool = setup_pool().await;

    let event = payment_event(
        &format!("evt_{}", Uuid::new_v4().simple()),
        "payment.succeeded",
        Uuid::new_v4(),
        "monthly",
        &format!("pay_{}", Uuid::new_v4().simple()),
    );
    assert!(matches!(
        apply_event(&pool, &event).await,
        Err(BillingError::UnknownMembership(_))
    ));

    let ignored = BillingEvent {
        id: format!("evt_{}", Uuid::new_v4().simple()),
        event_type: "customer.updated".to_string(),
        created: Utc::now().timestamp(),
        data: serde_json::json!({}),
    };
    assert_eq!(apply_event(&pool, &ignored).await.unwrap(), ApplyOutcome::Ignored);
}
