/// Member snapshot loading
///
/// The bulk loader issues one query per table and joins the results in
/// memory, so ranking the whole membership costs a fixed number of round
/// trips regardless of its size.

use std::collections::{HashMap, HashSet};

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::kyc_verification::KycVerification;
use crate::models::membership::Membership;
use crate::models::payment::Payment;
use crate::models::subscription::Subscription;
use crate::models::user::User;
use crate::rules::{MemberSnapshot, PaymentRecord, SubscriptionRecord};

/// Loads a snapshot of every membership
pub async fn load_snapshots(pool: &PgPool) -> Result<Vec<MemberSnapshot>, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    load_snapshots_with(&mut conn).await
}

/// Same as [`load_snapshots`] on an explicit connection or transaction
pub async fn load_snapshots_with(
    conn: &mut PgConnection,
) -> Result<Vec<MemberSnapshot>, sqlx::Error> {
    let memberships = Membership::list_all(&mut *conn).await?;
    let names = User::display_names(&mut *conn).await?;
    let subscriptions = Subscription::list_all(&mut *conn).await?;
    let payments = Payment::list_all(&mut *conn).await?;
    let verified = KycVerification::verified_user_ids(&mut *conn).await?;

    tracing::debug!(
        memberships = memberships.len(),
        payments = payments.len(),
        subscriptions = subscriptions.len(),
        "Loaded member snapshots"
    );

    Ok(assemble(memberships, names, subscriptions, payments, verified))
}

/// Loads the snapshot of a single membership
pub async fn load_snapshot(
    pool: &PgPool,
    membership_id: Uuid,
) -> Result<Option<MemberSnapshot>, sqlx::Error> {
    let Some(membership) = Membership::find_by_id(pool, membership_id).await? else {
        return Ok(None);
    };

    let display_name = User::find_by_id(pool, membership.user_id)
        .await?
        .and_then(|user| user.name);
    let subscription = Subscription::find_by_membership(pool, membership.id).await?;
    let payments = Payment::list_for_membership(pool, membership.id).await?;
    let kyc_verified = KycVerification::is_verified(pool, membership.user_id).await?;

    let mut snapshot = MemberSnapshot::from_membership(&membership, display_name);
    snapshot.subscription = subscription.as_ref().map(SubscriptionRecord::from);
    snapshot.payments = payments.iter().map(PaymentRecord::from).collect();
    snapshot.kyc_verified = kyc_verified;

    Ok(Some(snapshot))
}

fn assemble(
    memberships: Vec<Membership>,
    names: Vec<(Uuid, Option<String>)>,
    subscriptions: Vec<Subscription>,
    payments: Vec<Payment>,
    verified_users: Vec<Uuid>,
) -> Vec<MemberSnapshot> {
    let names: HashMap<Uuid, Option<String>> = names.into_iter().collect();
    let verified: HashSet<Uuid> = verified_users.into_iter().collect();

    let mut subscriptions: HashMap<Uuid, SubscriptionRecord> = subscriptions
        .iter()
        .map(|s| (s.membership_id, SubscriptionRecord::from(s)))
        .collect();

    let mut history: HashMap<Uuid, Vec<PaymentRecord>> = HashMap::new();
    for payment in &payments {
        history
            .entry(payment.membership_id)
            .or_default()
            .push(PaymentRecord::from(payment));
    }

    memberships
        .iter()
        .map(|membership| {
            let display_name = names.get(&membership.user_id).cloned().flatten();
            let mut snapshot = MemberSnapshot::from_membership(membership, display_name);
            snapshot.subscription = subscriptions.remove(&membership.id);
            snapshot.payments = history.remove(&membership.id).unwrap_or_default();
            snapshot.kyc_verified = verified.contains(&membership.user_id);
            snapshot
        })
        .collect()
}
