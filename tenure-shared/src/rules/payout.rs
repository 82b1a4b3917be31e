/// Payout readiness
///
/// Decides how many members the pool can pay and who they are. The ranked
/// queue is walked in order; a member is selected when they have held
/// continuous tenure for `min_payout_tenure_days` and, if required, passed
/// KYC. Members walked past are reported with the reason they were skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::queue::{rank, QueueEntry};
use super::{MemberSnapshot, RulesConfig};

/// Money in and out of the pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBalance {
    /// Sum of all succeeded payments
    pub collected_cents: i64,

    /// Sum of payouts that are scheduled, processing or completed
    pub committed_cents: i64,
}

impl PoolBalance {
    pub fn available_cents(&self) -> i64 {
        (self.collected_cents - self.committed_cents).max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum PayoutBlocker {
    LaunchGateNotMet { opens_at: DateTime<Utc> },
    InsufficientPool { pool_cents: i64, required_cents: i64 },
    NoEligibleCandidates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SkipReason {
    TenureTooShort { tenure_days: i64, required_days: i64 },
    KycNotVerified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutCandidate {
    pub position: u32,
    pub membership_id: Uuid,
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub tenure_days: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    pub position: u32,
    pub membership_id: Uuid,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDecision {
    pub as_of: DateTime<Utc>,

    /// True when payouts can be scheduled right now
    pub ready: bool,

    pub pool_cents: i64,
    pub payout_amount_cents: i64,
    pub available_slots: i64,
    pub launch_gate_met: bool,
    pub queue_length: usize,
    pub blockers: Vec<PayoutBlocker>,

    /// Members who would be paid, in queue order; only acted on when `ready`
    pub winners: Vec<PayoutCandidate>,

    pub skipped: Vec<SkippedCandidate>,
}

impl PayoutDecision {
    pub fn total_cents(&self) -> i64 {
        self.winners.iter().map(|w| w.amount_cents).sum()
    }
}

fn skip_reason(
    entry: &QueueEntry,
    kyc_verified: bool,
    config: &RulesConfig,
) -> Option<SkipReason> {
    if entry.tenure_days < config.min_payout_tenure_days {
        return Some(SkipReason::TenureTooShort {
            tenure_days: entry.tenure_days,
            required_days: config.min_payout_tenure_days,
        });
    }

    if config.require_kyc_for_payout && !kyc_verified {
        return Some(SkipReason::KycNotVerified);
    }

    None
}

/// Decides whether payouts can run at `as_of` and who receives them
pub fn payout_readiness(
    members: &[MemberSnapshot],
    pool: PoolBalance,
    config: &RulesConfig,
    as_of: DateTime<Utc>,
) -> PayoutDecision {
    let queue = rank(members, config, as_of);
    let kyc: HashMap<Uuid, bool> = members
        .iter()
        .map(|m| (m.membership_id, m.kyc_verified))
        .collect();

    let pool_cents = pool.available_cents();
    let available_slots = pool_cents / config.payout_amount_cents;

    let gate = config.launch_gate_date();
    let launch_gate_met = gate.map(|opens_at| as_of >= opens_at).unwrap_or(true);

    let mut winners = Vec::new();
    let mut skipped = Vec::new();
    let mut found_candidate = false;

    for entry in &queue {
        if found_candidate && winners.len() as i64 >= available_slots {
            break;
        }

        let verified = kyc.get(&entry.membership_id).copied().unwrap_or(false);
        match skip_reason(entry, verified, config) {
            Some(reason) => skipped.push(SkippedCandidate {
                position: entry.position,
                membership_id: entry.membership_id,
                reason,
            }),
            None => {
                found_candidate = true;
                if (winners.len() as i64) < available_slots {
                    winners.push(PayoutCandidate {
                        position: entry.position,
                        membership_id: entry.membership_id,
                        user_id: entry.user_id,
                        display_name: entry.display_name.clone(),
                        tenure_days: entry.tenure_days,
                        amount_cents: config.payout_amount_cents,
                    });
                }
            }
        }
    }

    let mut blockers = Vec::new();
    if let (false, Some(opens_at)) = (launch_gate_met, gate) {
        blockers.push(PayoutBlocker::LaunchGateNotMet { opens_at });
    }
    if available_slots == 0 {
        blockers.push(PayoutBlocker::InsufficientPool {
            pool_cents,
            required_cents: config.payout_amount_cents,
        });
    }
    if !found_candidate {
        blockers.push(PayoutBlocker::NoEligibleCandidates);
    }

    PayoutDecision {
        as_of,
        ready: blockers.is_empty() && !winners.is_empty(),
        pool_cents,
        payout_amount_cents: config.payout_amount_cents,
        available_slots,
        launch_gate_met,
        queue_length: queue.len(),
        blockers,
        winners,
        skipped,
    }
}
