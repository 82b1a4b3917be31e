/// Job scheduler
///
/// Runs every registered [`Job`] on its own interval until the shutdown token
/// is cancelled.
///
/// # Architecture
///
/// ```text
/// Scheduler
///   ├─> QueueRefreshJob: every WORKER_QUEUE_REFRESH_SECS
///   └─> PayoutJob: every WORKER_PAYOUT_CHECK_SECS
/// ```
///
/// Each job gets its own Tokio task, so a slow payout run never delays the
/// queue refresh. Ticks missed while a run was still in progress are not
/// replayed. A failed run is logged and the job tries again on its next tick.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tenure_worker::jobs::{JobContext, QueueRefreshJob};
/// use tenure_worker::scheduler::Scheduler;
///
/// # async fn example(ctx: JobContext) {
/// let scheduler = Scheduler::new(ctx)
///     .with_job(QueueRefreshJob::new(Duration::from_secs(300)));
///
/// let token = scheduler.shutdown_token();
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     token.cancel();
/// });
///
/// scheduler.run().await;
/// # }
/// ```

use std::sync::Arc;
use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::jobs::{Job, JobContext, JobReport};

pub struct Scheduler {
    ctx: JobContext,
    jobs: Vec<Arc<dyn Job>>,
    shutdown_token: CancellationToken,
}

impl Scheduler {
    pub fn new(ctx: JobContext) -> Self {
        Scheduler {
            ctx,
            jobs: Vec::new(),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn with_job<J: Job + 'static>(mut self, job: J) -> Self {
        self.jobs.push(Arc::new(job));
        self
    }

    /// Token that stops the scheduler when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs until shutdown; in-flight runs finish before this returns
    pub async fn run(self) {
        tracing::info!(jobs = self.jobs.len(), "Scheduler starting");

        let handles: Vec<_> = self
            .jobs
            .into_iter()
            .map(|job| {
                let ctx = self.ctx.clone();
                let token = self.shutdown_token.clone();
                tokio::spawn(job_loop(job, ctx, token))
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Job loop panicked");
            }
        }

        tracing::info!("Scheduler stopped");
    }
}

async fn job_loop(job: Arc<dyn Job>, ctx: JobContext, token: CancellationToken) {
    let mut ticker = tokio::time::interval(job.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(job = job.name(), interval_secs = job.interval().as_secs(), "Job registered");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        run_once(job.as_ref(), &ctx).await;
    }

    tracing::debug!(job = job.name(), "Job loop stopped");
}

/// Executes a job once and logs the result
pub async fn run_once(job: &dyn Job, ctx: &JobContext) -> Option<JobReport> {
    let started = Instant::now();

    match job.run(ctx).await {
        Ok(report) => {
            tracing::debug!(
                job = job.name(),
                affected = report.affected,
                skipped = report.skipped,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job run finished"
            );
            Some(report)
        }
        Err(e) => {
            tracing::error!(job = job.name(), error = %e, "Job run failed");
            None
        }
    }
}
