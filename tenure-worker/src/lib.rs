///! # Tenure Worker Library
///!
///! Background maintenance for the Tenure platform: keeps the payout queue
///! ranked and schedules payouts once the pool can fund them.
///!
///! ## Modules
///!
///! - `config`: Worker configuration from the environment
///! - `jobs`: The periodic jobs (queue refresh, payouts)
///! - `scheduler`: Runs jobs on their intervals until shutdown
///!
///! ## Example
///!
///! ```no_run
///! use std::time::Duration;
///! use tenure_worker::jobs::{Job, PayoutJob};
///!
///! let job = PayoutJob::new(Duration::from_secs(3600), false);
///! println!("Job: {}", job.name());
///! ```

pub mod config;
pub mod jobs;
pub mod scheduler;
