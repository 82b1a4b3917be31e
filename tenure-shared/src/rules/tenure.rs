/// Tenure and payment-history arithmetic
///
/// Only *qualifying* payments build tenure: succeeded joining or monthly
/// fees. A gap longer than one billing period plus the grace period between
/// two qualifying payments breaks continuity and tenure restarts at the later
/// payment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PaymentRecord, RulesConfig};
use crate::models::payment::PaymentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenureSummary {
    /// First qualifying payment of the current continuous run
    pub tenure_start: DateTime<Utc>,

    /// Most recent qualifying payment
    pub last_payment_at: DateTime<Utc>,

    /// Whole days from `tenure_start` to `as_of`
    pub tenure_days: i64,

    /// Qualifying payments since `tenure_start`
    pub qualifying_payments: u32,

    /// How many times continuity was broken
    pub resets: u32,
}

/// Computes the current run of continuous tenure
///
/// Returns None when there is no qualifying payment on or before `as_of`.
pub fn continuous_tenure(
    payments: &[PaymentRecord],
    config: &RulesConfig,
    as_of: DateTime<Utc>,
) -> Option<TenureSummary> {
    let mut qualifying: Vec<&PaymentRecord> = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Succeeded && p.kind.is_qualifying())
        .filter(|p| p.paid_at <= as_of)
        .collect();
    qualifying.sort_by_key(|p| p.paid_at);

    let first = qualifying.first()?;
    let window = config.lapse_window();

    let mut tenure_start = first.paid_at;
    let mut last_payment_at = first.paid_at;
    let mut run_length = 1u32;
    let mut resets = 0u32;

    for payment in qualifying.iter().skip(1) {
        if payment.paid_at - last_payment_at > window {
            tenure_start = payment.paid_at;
            run_length = 0;
            resets += 1;
        }
        run_length += 1;
        last_payment_at = payment.paid_at;
    }

    Some(TenureSummary {
        tenure_start,
        last_payment_at,
        tenure_days: (as_of - tenure_start).num_days().max(0),
        qualifying_payments: run_length,
        resets,
    })
}

/// Billing periods missed since the last qualifying payment
///
/// Zero while the member is within one period plus grace.
pub fn missed_periods(
    last_payment_at: DateTime<Utc>,
    config: &RulesConfig,
    as_of: DateTime<Utc>,
) -> i64 {
    let days = (as_of - last_payment_at).num_days();
    if days <= config.billing_period_days + config.grace_period_days {
        return 0;
    }

    (days - config.grace_period_days) / config.billing_period_days
}

/// Failed joining/monthly attempts since the most recent successful one
pub fn consecutive_failures(payments: &[PaymentRecord]) -> u32 {
    let mut fee_payments: Vec<&PaymentRecord> =
        payments.iter().filter(|p| p.kind.is_qualifying()).collect();
    fee_payments.sort_by_key(|p| p.paid_at);

    fee_payments
        .iter()
        .rev()
        .take_while(|p| p.status != PaymentStatus::Succeeded)
        .filter(|p| p.status == PaymentStatus::Failed)
        .count() as u32
}

/// Sum of all succeeded payments, any kind
pub fn lifetime_paid_cents(payments: &[PaymentRecord]) -> i64 {
    payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Succeeded)
        .map(|p| p.amount_cents)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment::PaymentKind;
    use crate::rules::fixtures::*;

    #[test]
    fn test_no_payments_no_tenure() {
        let config = RulesConfig::default();
        assert!(continuous_tenure(&[], &config, as_of()).is_none());
    }

    #[test]
    fn test_steady_history_is_continuous() {
        let config = RulesConfig::default();
        let payments = steady_history(400);

        let tenure = continuous_tenure(&payments, &config, as_of()).unwrap();
        assert_eq!(tenure.tenure_start, days_ago(400));
        assert_eq!(tenure.tenure_days, 400);
        assert_eq!(tenure.resets, 0);
        assert_eq!(tenure.qualifying_payments as usize, payments.len());
        assert_eq!(tenure.last_payment_at, days_ago(10));
    }

    #[test]
    fn test_gap_within_grace_keeps_tenure() {
        let config = RulesConfig::default();
        // 37-day gap is exactly period + grace
        let payments = vec![joining(100), monthly(63), monthly(30)];

        let tenure = continuous_tenure(&payments, &config, as_of()).unwrap();
        assert_eq!(tenure.tenure_start, days_ago(100));
        assert_eq!(tenure.resets, 0);
    }

    #[test]
    fn test_gap_beyond_grace_resets_tenure() {
        let config = RulesConfig::default();
        // 38-day gap breaks continuity
        let payments = vec![joining(200), monthly(170), monthly(132), monthly(102)];

        let tenure = continuous_tenure(&payments, &config, as_of()).unwrap();
        assert_eq!(tenure.tenure_start, days_ago(132));
        assert_eq!(tenure.tenure_days, 132);
        assert_eq!(tenure.resets, 1);
        assert_eq!(tenure.qualifying_payments, 2);
    }

    #[test]
    fn test_unordered_input_is_sorted() {
        let config = RulesConfig::default();
        let payments = vec![monthly(30), joining(60), monthly(0)];

        let tenure = continuous_tenure(&payments, &config, as_of()).unwrap();
        assert_eq!(tenure.tenure_start, days_ago(60));
        assert_eq!(tenure.last_payment_at, days_ago(0));
    }

    #[test]
    fn test_non_qualifying_payments_ignored() {
        let config = RulesConfig::default();
        let payments = vec![
            payment(PaymentKind::Other, PaymentStatus::Succeeded, 10_000, 300),
            payment(PaymentKind::Joining, PaymentStatus::Refunded, 30_000, 250),
            payment(PaymentKind::Monthly, PaymentStatus::Pending, 2_500, 220),
            failed_monthly(200),
            joining(100),
        ];

        let tenure = continuous_tenure(&payments, &config, as_of()).unwrap();
        assert_eq!(tenure.tenure_start, days_ago(100));
        assert_eq!(tenure.qualifying_payments, 1);
    }

    #[test]
    fn test_future_payments_ignored() {
        let config = RulesConfig::default();
        let payments = vec![joining(10), monthly(-20)];

        let tenure = continuous_tenure(&payments, &config, as_of()).unwrap();
        assert_eq!(tenure.last_payment_at, days_ago(10));
        assert_eq!(tenure.qualifying_payments, 1);

        let only_future = vec![joining(-5)];
        assert!(continuous_tenure(&only_future, &config, as_of()).is_none());
    }

    #[test]
    fn test_missed_periods() {
        let config = RulesConfig::default();
        assert_eq!(missed_periods(days_ago(0), &config, as_of()), 0);
        assert_eq!(missed_periods(days_ago(37), &config, as_of()), 0);
        assert_eq!(missed_periods(days_ago(38), &config, as_of()), 1);
        assert_eq!(missed_periods(days_ago(67), &config, as_of()), 2);
        assert_eq!(missed_periods(days_ago(97), &config, as_of()), 3);
    }

    #[test]
    fn test_consecutive_failures() {
        assert_eq!(consecutive_failures(&[]), 0);

        let recovered = vec![failed_monthly(90), failed_monthly(60), monthly(30)];
        assert_eq!(consecutive_failures(&recovered), 0);

        let defaulting = vec![
            monthly(120),
            failed_monthly(90),
            payment(PaymentKind::Monthly, PaymentStatus::Pending, 2_500, 75),
            failed_monthly(60),
            failed_monthly(30),
        ];
        assert_eq!(consecutive_failures(&defaulting), 3);
    }

    #[test]
    fn test_other_kind_failures_do_not_count() {
        let payments = vec![
            monthly(30),
            payment(PaymentKind::Other, PaymentStatus::Failed, 500, 10),
        ];
        assert_eq!(consecutive_failures(&payments), 0);
    }

    #[test]
    fn test_lifetime_paid_excludes_refunds() {
        let payments = vec![
            joining(100),
            monthly(70),
            payment(PaymentKind::Monthly, PaymentStatus::Refunded, 2_500, 40),
            payment(PaymentKind::Other, PaymentStatus::Succeeded, 1_000, 20),
            failed_monthly(10),
        ];
        assert_eq!(lifetime_paid_cents(&payments), 30_000 + 2_500 + 1_000);
    }
}
