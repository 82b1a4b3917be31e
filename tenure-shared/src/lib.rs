//! # Tenure Shared Library
//!
//! Types and business logic shared by the Tenure API server and worker.
//!
//! ## Module Organization
//!
//! - `rules`: the pure queue-position / business-rule engine
//! - `engine`: rule evaluation over Postgres (queue refresh, payout runs)
//! - `models`: database models and queries
//! - `db`: connection pool and migrations
//! - `auth`: passwords, JWTs, middleware and authorization
//! - `billing`: signed billing webhooks and event ingestion
//! - `kyc`: identity verification provider client and callbacks

pub mod auth;
pub mod billing;
pub mod db;
pub mod engine;
pub mod kyc;
pub mod models;
pub mod rules;

/// Current version of the Tenure shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
