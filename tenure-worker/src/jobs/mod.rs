/// Periodic jobs run by the scheduler
///
/// Each job owns one maintenance concern (queue ranking, payout scheduling)
/// and is executed on its own interval. Jobs are stateless between ticks; a
/// failed tick is logged by the scheduler and retried on the next one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tenure_shared::engine::EngineError;
use tenure_shared::rules::RulesConfig;

pub mod payouts;
pub mod queue_refresh;

pub use payouts::PayoutJob;
pub use queue_refresh::QueueRefreshJob;

/// Shared resources handed to every job run
#[derive(Clone)]
pub struct JobContext {
    pub pool: PgPool,
    pub rules: Arc<RulesConfig>,
}

impl JobContext {
    pub fn new(pool: PgPool, rules: RulesConfig) -> Self {
        Self {
            pool,
            rules: Arc::new(rules),
        }
    }
}

/// Job error
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// What a single run did, for logging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Rows written (queue entries, payouts, notifications)
    pub affected: usize,

    /// True when the job decided there was nothing to do
    pub skipped: bool,
}

impl JobReport {
    pub fn skipped() -> Self {
        Self {
            affected: 0,
            skipped: true,
        }
    }

    pub fn affected(affected: usize) -> Self {
        Self {
            affected,
            skipped: false,
        }
    }
}

/// A unit of periodic work
#[async_trait]
pub trait Job: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Delay between two runs
    fn interval(&self) -> Duration;

    /// Executes one run
    async fn run(&self, ctx: &JobContext) -> Result<JobReport, JobError>;
}
