/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 5)
/// - `WORKER_QUEUE_REFRESH_SECS`: queue refresh interval (default: 300)
/// - `WORKER_PAYOUT_CHECK_SECS`: payout readiness check interval (default: 3600)
/// - `WORKER_AUTO_PAYOUTS`: schedule payouts without an operator (default: false)
/// - `TENURE_*`: business rules, shared with the API

use anyhow::Context;
use std::str::FromStr;
use std::time::Duration;
use tenure_shared::rules::RulesConfig;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub queue_refresh_interval: Duration,
    pub payout_check_interval: Duration,

    /// When false the payout job only reports readiness
    pub auto_payouts: bool,

    pub rules: RulesConfig,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .context("DATABASE_URL environment variable is required")?;

        let queue_secs: u64 = parse_or(&lookup, "WORKER_QUEUE_REFRESH_SECS", 300)?;
        let payout_secs: u64 = parse_or(&lookup, "WORKER_PAYOUT_CHECK_SECS", 3600)?;
        if queue_secs == 0 || payout_secs == 0 {
            anyhow::bail!("worker intervals must be at least one second");
        }

        Ok(Self {
            database_url,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            queue_refresh_interval: Duration::from_secs(queue_secs),
            payout_check_interval: Duration::from_secs(payout_secs),
            auto_payouts: parse_or(&lookup, "WORKER_AUTO_PAYOUTS", false)?,
            rules: RulesConfig::from_lookup(&lookup).context("invalid business rules")?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw}")),
        None => Ok(default),
    }
}
