/// Queue eligibility
///
/// A member is eligible for the queue when all of the following hold:
///
/// 1. membership status is `active`
/// 2. a succeeded joining fee of at least `joining_fee_cents` exists
/// 3. at least one qualifying payment exists
/// 4. the subscription is `active` or `past_due`
/// 5. no billing period has been missed
/// 6. fewer than `max_consecutive_failures` failed attempts in a row
///
/// Every failing condition is reported, in the order above.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tenure::{consecutive_failures, continuous_tenure, lifetime_paid_cents, missed_periods};
use super::{MemberSnapshot, RulesConfig, TenureSummary};
use crate::models::membership::MemberStatus;
use crate::models::payment::{PaymentKind, PaymentStatus};
use crate::models::subscription::SubscriptionStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum IneligibilityReason {
    MembershipNotActive { status: MemberStatus },
    NoJoiningFee,
    NoQualifyingPayments,
    NoSubscription,
    SubscriptionInactive { status: SubscriptionStatus },
    PaymentLapsed { missed_periods: i64 },
    PaymentDefault { consecutive_failures: u32 },
}

impl IneligibilityReason {
    /// Human-readable explanation shown to members
    pub fn describe(&self) -> String {
        match self {
            IneligibilityReason::MembershipNotActive { status } => {
                format!("Membership is {}", status.as_str())
            }
            IneligibilityReason::NoJoiningFee => "Joining fee has not been paid".to_string(),
            IneligibilityReason::NoQualifyingPayments => {
                "No qualifying membership payments".to_string()
            }
            IneligibilityReason::NoSubscription => "No monthly subscription".to_string(),
            IneligibilityReason::SubscriptionInactive { status } => {
                format!("Subscription is {}", status.as_str())
            }
            IneligibilityReason::PaymentLapsed { missed_periods } => {
                format!("{} billing period(s) missed", missed_periods)
            }
            IneligibilityReason::PaymentDefault {
                consecutive_failures,
            } => format!("{} consecutive failed payments", consecutive_failures),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub membership_id: Uuid,
    pub eligible: bool,
    pub reasons: Vec<IneligibilityReason>,
    pub tenure: Option<TenureSummary>,
    pub lifetime_paid_cents: i64,
    pub missed_periods: i64,
    pub consecutive_failures: u32,
}

/// Evaluates one member against the eligibility rules at `as_of`
pub fn evaluate(
    member: &MemberSnapshot,
    config: &RulesConfig,
    as_of: DateTime<Utc>,
) -> EligibilityReport {
    let payments = member.payments_as_of(as_of);
    let mut reasons = Vec::new();

    if member.status != MemberStatus::Active {
        reasons.push(IneligibilityReason::MembershipNotActive {
            status: member.status,
        });
    }

    let joining_fee_paid = payments.iter().any(|p| {
        p.kind == PaymentKind::Joining
            && p.status == PaymentStatus::Succeeded
            && p.amount_cents >= config.joining_fee_cents
    });
    if !joining_fee_paid {
        reasons.push(IneligibilityReason::NoJoiningFee);
    }

    let tenure = continuous_tenure(&payments, config, as_of);
    if tenure.is_none() {
        reasons.push(IneligibilityReason::NoQualifyingPayments);
    }

    match member.subscription {
        None => reasons.push(IneligibilityReason::NoSubscription),
        Some(subscription) if !subscription.status.is_in_good_standing() => {
            reasons.push(IneligibilityReason::SubscriptionInactive {
                status: subscription.status,
            });
        }
        Some(_) => {}
    }

    let missed = tenure
        .map(|t| missed_periods(t.last_payment_at, config, as_of))
        .unwrap_or(0);
    if missed > 0 {
        reasons.push(IneligibilityReason::PaymentLapsed {
            missed_periods: missed,
        });
    }

    let failures = consecutive_failures(&payments);
    if failures >= config.max_consecutive_failures {
        reasons.push(IneligibilityReason::PaymentDefault {
            consecutive_failures: failures,
        });
    }

    EligibilityReport {
        membership_id: member.membership_id,
        eligible: reasons.is_empty(),
        reasons,
        tenure,
        lifetime_paid_cents: lifetime_paid_cents(&payments),
        missed_periods: missed,
        consecutive_failures: failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::*;
    use crate::rules::SubscriptionRecord;

    #[test]
    fn test_active_paying_member_is_eligible() {
        let config = RulesConfig::default();
        let member = active_member(400);

        let report = evaluate(&member, &config, as_of());
        assert!(report.eligible, "unexpected reasons: {:?}", report.reasons);
        assert!(report.reasons.is_empty());
        assert_eq!(report.tenure.map(|t| t.tenure_days), Some(400));
        assert_eq!(report.missed_periods, 0);
        assert_eq!(report.consecutive_failures, 0);
    }

    #[test]
    fn test_member_without_payments() {
        let config = RulesConfig::default();
        let mut member = active_member(0);
        member.payments.clear();

        let report = evaluate(&member, &config, as_of());
        assert!(!report.eligible);
        assert_eq!(
            report.reasons,
            vec![
                IneligibilityReason::NoJoiningFee,
                IneligibilityReason::NoQualifyingPayments
            ]
        );
        assert!(report.tenure.is_none());
        assert_eq!(report.lifetime_paid_cents, 0);
    }

    #[test]
    fn test_short_joining_fee_is_rejected() {
        let config = RulesConfig::default();
        let mut member = active_member(60);
        member.payments[0].amount_cents = 29_999;

        let report = evaluate(&member, &config, as_of());
        assert_eq!(report.reasons, vec![IneligibilityReason::NoJoiningFee]);
    }

    #[test]
    fn test_suspended_member() {
        let config = RulesConfig::default();
        let mut member = active_member(100);
        member.status = MemberStatus::Suspended;

        let report = evaluate(&member, &config, as_of());
        assert_eq!(
            report.reasons,
            vec![IneligibilityReason::MembershipNotActive {
                status: MemberStatus::Suspended
            }]
        );
    }

    #[test]
    fn test_subscription_states() {
        let config = RulesConfig::default();

        let mut member = active_member(100);
        member.subscription = None;
        assert_eq!(
            evaluate(&member, &config, as_of()).reasons,
            vec![IneligibilityReason::NoSubscription]
        );

        member.subscription = Some(SubscriptionRecord {
            status: SubscriptionStatus::PastDue,
            current_period_end: None,
        });
        assert!(evaluate(&member, &config, as_of()).eligible);

        member.subscription = Some(SubscriptionRecord {
            status: SubscriptionStatus::Canceled,
            current_period_end: None,
        });
        assert_eq!(
            evaluate(&member, &config, as_of()).reasons,
            vec![IneligibilityReason::SubscriptionInactive {
                status: SubscriptionStatus::Canceled
            }]
        );
    }

    #[test]
    fn test_lapsed_member() {
        let config = RulesConfig::default();
        let mut member = active_member(200);
        member.payments = vec![joining(200), monthly(170), monthly(140), monthly(110), monthly(80)];

        let report = evaluate(&member, &config, as_of());
        assert_eq!(
            report.reasons,
            vec![IneligibilityReason::PaymentLapsed { missed_periods: 2 }]
        );
    }

    #[test]
    fn test_payment_default() {
        let config = RulesConfig::default();
        let mut member = active_member(100);
        member.payments = vec![
            joining(100),
            monthly(70),
            monthly(40),
            monthly(10),
            failed_monthly(8),
            failed_monthly(5),
            failed_monthly(2),
        ];

        let report = evaluate(&member, &config, as_of());
        assert_eq!(
            report.reasons,
            vec![IneligibilityReason::PaymentDefault {
                consecutive_failures: 3
            }]
        );

        member.payments.pop();
        assert!(evaluate(&member, &config, as_of()).eligible);
    }

    #[test]
    fn test_all_reasons_reported_in_order() {
        let config = RulesConfig::default();
        let mut member = active_member(0);
        member.status = MemberStatus::Pending;
        member.subscription = Some(SubscriptionRecord {
            status: SubscriptionStatus::Unpaid,
            current_period_end: None,
        });
        member.payments = vec![
            monthly(200),
            failed_monthly(150),
            failed_monthly(120),
            failed_monthly(90),
        ];

        let report = evaluate(&member, &config, as_of());
        assert_eq!(
            report.reasons,
            vec![
                IneligibilityReason::MembershipNotActive {
                    status: MemberStatus::Pending
                },
                IneligibilityReason::NoJoiningFee,
                IneligibilityReason::SubscriptionInactive {
                    status: SubscriptionStatus::Unpaid
                },
                IneligibilityReason::PaymentLapsed { missed_periods: 6 },
                IneligibilityReason::PaymentDefault {
                    consecutive_failures: 3
                },
            ]
        );
    }

    #[test]
    fn test_reason_serialization() {
        let json = serde_json::to_value(IneligibilityReason::PaymentLapsed { missed_periods: 2 })
            .unwrap();
        assert_eq!(json["code"], "payment_lapsed");
        assert_eq!(json["missed_periods"], 2);

        let json = serde_json::to_value(IneligibilityReason::NoSubscription).unwrap();
        assert_eq!(json, serde_json::json!({ "code": "no_subscription" }));
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            IneligibilityReason::MembershipNotActive {
                status: MemberStatus::Cancelled
            }
            .describe(),
            "Membership is cancelled"
        );
        assert_eq!(
            IneligibilityReason::PaymentDefault {
                consecutive_failures: 4
            }
            .describe(),
            "4 consecutive failed payments"
        );
    }
}
