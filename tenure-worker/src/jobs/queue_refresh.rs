/// Queue refresh job
///
/// Re-ranks the queue. The engine stores a notification for every member
/// whose position moved.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tenure_shared::engine::refresh_queue;

use super::{Job, JobContext, JobError, JobReport};

pub struct QueueRefreshJob {
    interval: Duration,
}

impl QueueRefreshJob {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl Job for QueueRefreshJob {
    fn name(&self) -> &str {
        "queue_refresh"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self, ctx: &JobContext) -> Result<JobReport, JobError> {
        let outcome = refresh_queue(&ctx.pool, &ctx.rules, Utc::now()).await?;

        tracing::debug!(
            queued = outcome.queued,
            changes = outcome.changes.len(),
            notified = outcome.notified,
            "Queue refresh job finished"
        );

        Ok(JobReport::affected(outcome.queued))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_interval() {
        let job = QueueRefreshJob::new(Duration::from_secs(300));
        assert_eq!(job.name(), "queue_refresh");
        assert_eq!(job.interval(), Duration::from_secs(300));
    }
}
