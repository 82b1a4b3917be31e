/// Queue ranking
///
/// Eligible members are ordered by:
///
/// 1. `tenure_start` ascending (longest continuous tenure first)
/// 2. `lifetime_paid_cents` descending
/// 3. `joined_at` ascending
/// 4. `membership_id` ascending, so the order is total
///
/// Positions are 1-based and contiguous.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

use super::eligibility::evaluate;
use super::{MemberSnapshot, RulesConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub position: u32,
    pub membership_id: Uuid,
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub tenure_start: DateTime<Utc>,
    pub tenure_days: i64,
    pub lifetime_paid_cents: i64,
    pub joined_at: DateTime<Utc>,
}

fn queue_order(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    a.tenure_start
        .cmp(&b.tenure_start)
        .then_with(|| b.lifetime_paid_cents.cmp(&a.lifetime_paid_cents))
        .then_with(|| a.joined_at.cmp(&b.joined_at))
        .then_with(|| a.membership_id.cmp(&b.membership_id))
}

/// Ranks the eligible members at `as_of`
pub fn rank(
    members: &[MemberSnapshot],
    config: &RulesConfig,
    as_of: DateTime<Utc>,
) -> Vec<QueueEntry> {
    let mut entries: Vec<QueueEntry> = members
        .iter()
        .filter_map(|member| {
            let report = evaluate(member, config, as_of);
            if !report.eligible {
                return None;
            }
            let tenure = report.tenure?;

            Some(QueueEntry {
                position: 0,
                membership_id: member.membership_id,
                user_id: member.user_id,
                display_name: member.display_name.clone(),
                tenure_start: tenure.tenure_start,
                tenure_days: tenure.tenure_days,
                lifetime_paid_cents: report.lifetime_paid_cents,
                joined_at: member.joined_at,
            })
        })
        .collect();

    entries.sort_by(queue_order);
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.position = index as u32 + 1;
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::membership::MemberStatus;
    use crate::rules::fixtures::*;

    #[test]
    fn test_empty_queue() {
        assert!(rank(&[], &RulesConfig::default(), as_of()).is_empty());
    }

    #[test]
    fn test_longest_tenure_first() {
        let config = RulesConfig::default();
        let newer = active_member(100);
        let oldest = active_member(500);
        let middle = active_member(300);

        let queue = rank(&[newer.clone(), oldest.clone(), middle.clone()], &config, as_of());

        let order: Vec<Uuid> = queue.iter().map(|e| e.membership_id).collect();
        assert_eq!(order, vec![oldest.membership_id, middle.membership_id, newer.membership_id]);
        let positions: Vec<u32> = queue.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_ineligible_members_excluded_without_gaps() {
        let config = RulesConfig::default();
        let first = active_member(400);
        let mut suspended = active_member(350);
        suspended.status = MemberStatus::Suspended;
        let third = active_member(200);

        let queue = rank(&[first.clone(), suspended, third.clone()], &config, as_of());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].membership_id, first.membership_id);
        assert_eq!(queue[1].membership_id, third.membership_id);
        assert_eq!(queue[1].position, 2);
    }

    #[test]
    fn test_tie_broken_by_lifetime_paid() {
        let config = RulesConfig::default();
        let modest = active_member(200);
        let mut generous = active_member(200);
        generous.payments.push(payment(
            crate::models::payment::PaymentKind::Other,
            crate::models::payment::PaymentStatus::Succeeded,
            5_000,
            50,
        ));

        let queue = rank(&[modest.clone(), generous.clone()], &config, as_of());
        assert_eq!(queue[0].membership_id, generous.membership_id);
        assert_eq!(queue[1].membership_id, modest.membership_id);
    }

    #[test]
    fn test_tie_broken_by_joined_at_then_id() {
        let config = RulesConfig::default();
        let mut late_joiner = active_member(200);
        let mut early_joiner = active_member(200);
        late_joiner.joined_at = days_ago(210);
        early_joiner.joined_at = days_ago(220);

        let queue = rank(&[late_joiner.clone(), early_joiner.clone()], &config, as_of());
        assert_eq!(queue[0].membership_id, early_joiner.membership_id);

        let mut twin_a = active_member(200);
        let mut twin_b = active_member(200);
        twin_b.joined_at = twin_a.joined_at;
        if twin_a.membership_id > twin_b.membership_id {
            std::mem::swap(&mut twin_a, &mut twin_b);
        }

        let queue = rank(&[twin_b.clone(), twin_a.clone()], &config, as_of());
        assert_eq!(queue[0].membership_id, twin_a.membership_id);
        assert_eq!(queue[1].membership_id, twin_b.membership_id);
    }

    #[test]
    fn test_reset_tenure_moves_member_back() {
        let config = RulesConfig::default();
        let steady = active_member(300);
        let mut restarted = active_member(600);
        restarted.payments = vec![
            joining(600),
            monthly(570),
            monthly(90),
            monthly(60),
            monthly(30),
            monthly(0),
        ];

        let queue = rank(&[restarted.clone(), steady.clone()], &config, as_of());
        assert_eq!(queue[0].membership_id, steady.membership_id);
        assert_eq!(queue[1].membership_id, restarted.membership_id);
        assert_eq!(queue[1].tenure_days, 90);
    }
}
