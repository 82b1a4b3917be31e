/// Payout job
///
/// Checks payout readiness on every tick. With automatic payouts enabled a
/// ready decision is turned into a payout run; otherwise the decision is only
/// logged so an operator can trigger the run from the admin API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tenure_shared::engine::{evaluate_payouts, run_payouts, EngineError};

use super::{Job, JobContext, JobError, JobReport};

pub struct PayoutJob {
    interval: Duration,
    auto_payouts: bool,
}

impl PayoutJob {
    pub fn new(interval: Duration, auto_payouts: bool) -> Self {
        Self {
            interval,
            auto_payouts,
        }
    }
}

#[async_trait]
impl Job for PayoutJob {
    fn name(&self) -> &str {
        "payouts"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self, ctx: &JobContext) -> Result<JobReport, JobError> {
        let now = Utc::now();
        let decision = evaluate_payouts(&ctx.pool, &ctx.rules, now).await?;

        if !decision.ready {
            tracing::info!(
                pool_cents = decision.pool_cents,
                queue_length = decision.queue_length,
                blockers = ?decision.blockers,
                "Payouts not ready"
            );
            return Ok(JobReport::skipped());
        }

        if !self.auto_payouts {
            tracing::info!(
                slots = decision.available_slots,
                winners = decision.winners.len(),
                "Payouts ready, waiting for an operator"
            );
            return Ok(JobReport::skipped());
        }

        let outcome = match run_payouts(&ctx.pool, &ctx.rules, now, None).await {
            Ok(outcome) => outcome,
            // Another run took the slots between evaluation and locking
            Err(EngineError::NotReady { blockers }) => {
                tracing::info!(blockers = ?blockers, "Payout run skipped");
                return Ok(JobReport::skipped());
            }
            Err(other) => return Err(other.into()),
        };

        tracing::info!(
            payouts = outcome.payouts.len(),
            total_cents = outcome.total_cents(),
            notified = outcome.queue.notified,
            "Payouts scheduled"
        );

        Ok(JobReport::affected(outcome.payouts.len()))
    }
}
