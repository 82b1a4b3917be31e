/// Database-backed rule evaluation
///
/// Loads member snapshots from Postgres, runs them through [`crate::rules`]
/// and persists the results. Operations that read and then write (queue
/// refresh, payout run) execute in a single transaction holding a
/// transaction-scoped advisory lock, so two concurrent runs cannot act on
/// the same snapshot.
///
/// # Example
///
/// ```no_run
/// use chrono::Utc;
/// use tenure_shared::engine;
/// use tenure_shared::rules::RulesConfig;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let outcome = engine::refresh_queue(&pool, &RulesConfig::default(), Utc::now()).await?;
/// println!("{} members queued", outcome.queued);
/// # Ok(())
/// # }
/// ```

pub mod payouts;
pub mod queue;
pub mod snapshot;

pub use payouts::{
    evaluate_payouts, run_payouts, update_payout_status, PayoutRunOutcome, PayoutUpdate,
};
pub use queue::{
    compute_queue, evaluate_member, position_notification, refresh_queue, PositionChange,
    QueueRefreshOutcome,
};
pub use snapshot::{load_snapshot, load_snapshots};

use sqlx::PgConnection;

use crate::models::payout::PayoutStatus;
use crate::rules::PayoutBlocker;

/// Advisory lock serialising queue refreshes
pub const QUEUE_LOCK_KEY: i64 = 0x7465_6e75_7265_0001;

/// Advisory lock serialising payout runs
pub const PAYOUT_LOCK_KEY: i64 = 0x7465_6e75_7265_0002;

/// Error type for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A payout run was requested while blockers remain
    #[error("Payouts are not ready")]
    NotReady { blockers: Vec<PayoutBlocker> },

    /// The payout's current status doesn't allow the requested move
    #[error("Cannot move payout from {} to {}", from.as_str(), to.as_str())]
    InvalidPayoutTransition { from: PayoutStatus, to: PayoutStatus },
}

/// Takes an advisory lock released when the surrounding transaction ends
pub(crate) async fn lock_for_transaction(
    conn: &mut PgConnection,
    key: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_keys_distinct() {
        assert_ne!(QUEUE_LOCK_KEY, PAYOUT_LOCK_KEY);
    }

    #[test]
    fn test_not_ready_message() {
        let err = EngineError::NotReady {
            blockers: vec![PayoutBlocker::NoEligibleCandidates],
        };
        assert_eq!(err.to_string(), "Payouts are not ready");
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = EngineError::InvalidPayoutTransition {
            from: PayoutStatus::Completed,
            to: PayoutStatus::Failed,
        };
        assert_eq!(err.to_string(), "Cannot move payout from completed to failed");
    }
}
