/// Business rule engine
///
/// Pure functions over member snapshots: no database access, no clock. The
/// caller passes `as_of` explicitly so every decision is reproducible.
///
/// # Pipeline
///
/// ```text
/// MemberSnapshot ──> tenure::continuous_tenure ──┐
///                ──> tenure::missed_periods      ├──> eligibility::evaluate
///                ──> tenure::consecutive_failures┘            │
///                                                             ▼
///                                      queue::rank ──> payout::payout_readiness
/// ```
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use tenure_shared::rules::{rank, RulesConfig};
///
/// let config = RulesConfig::default();
/// let queue = rank(&[], &config, Utc::now());
/// assert!(queue.is_empty());
/// ```

pub mod config;
pub mod eligibility;
pub mod payout;
pub mod queue;
pub mod tenure;

pub use config::{RulesConfig, RulesConfigError};
pub use eligibility::{evaluate, EligibilityReport, IneligibilityReason};
pub use payout::{
    payout_readiness, PayoutBlocker, PayoutCandidate, PayoutDecision, PoolBalance, SkipReason,
    SkippedCandidate,
};
pub use queue::{rank, QueueEntry};
pub use tenure::{
    consecutive_failures, continuous_tenure, lifetime_paid_cents, missed_periods, TenureSummary,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::membership::{MemberStatus, Membership};
use crate::models::payment::{Payment, PaymentKind, PaymentStatus};
use crate::models::subscription::{Subscription, SubscriptionStatus};

/// The subset of a payment the rules look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub paid_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentRecord {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id,
            kind: payment.kind,
            status: payment.status,
            amount_cents: payment.amount_cents,
            paid_at: payment.paid_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl From<&Subscription> for SubscriptionRecord {
    fn from(subscription: &Subscription) -> Self {
        Self {
            status: subscription.status,
            current_period_end: subscription.current_period_end,
        }
    }
}

/// Everything the rules need to know about one member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub membership_id: Uuid,
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub status: MemberStatus,
    pub joined_at: DateTime<Utc>,
    pub subscription: Option<SubscriptionRecord>,
    pub payments: Vec<PaymentRecord>,
    pub kyc_verified: bool,
}

impl MemberSnapshot {
    /// Builds a snapshot from a membership with no history attached
    pub fn from_membership(membership: &Membership, display_name: Option<String>) -> Self {
        Self {
            membership_id: membership.id,
            user_id: membership.user_id,
            display_name,
            status: membership.status,
            joined_at: membership.joined_at,
            subscription: None,
            payments: Vec::new(),
            kyc_verified: false,
        }
    }

    /// Payments made on or before `as_of`
    pub(crate) fn payments_as_of(&self, as_of: DateTime<Utc>) -> Vec<PaymentRecord> {
        self.payments
            .iter()
            .filter(|p| p.paid_at <= as_of)
            .copied()
            .collect()
    }
}
