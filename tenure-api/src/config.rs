/// Configuration for the API server
///
/// Loaded from environment variables (a `.env` file is read first in
/// development).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any (default: `*`)
/// - `PRODUCTION`: enables HSTS (default: false)
/// - `JWT_SECRET`: HS256 signing key, at least 32 characters (required)
/// - `BILLING_WEBHOOK_SECRET`: billing webhook signing secret (required)
/// - `KYC_WEBHOOK_SECRET`: KYC callback signing secret (required)
/// - `WEBHOOK_TOLERANCE_SECS`: accepted signature age (default: 300)
/// - `KYC_BASE_URL` / `KYC_API_KEY`: verification provider (required)
/// - `KYC_TIMEOUT_SECS`: provider request timeout (default: 10)
/// - `TENURE_*`: business rules, see [`RulesConfig`]
///
/// # Example
///
/// ```no_run
/// use tenure_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tenure_shared::billing::DEFAULT_TOLERANCE_SECS;
use tenure_shared::rules::RulesConfig;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub webhooks: WebhookConfig,
    pub kyc: KycConfig,
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Served behind HTTPS; turns on HSTS
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,
}

/// Shared secrets for inbound signed webhooks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(skip_serializing)]
    pub billing_secret: String,

    #[serde(skip_serializing)]
    pub kyc_secret: String,

    pub tolerance_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycConfig {
    pub base_url: String,

    #[serde(skip_serializing)]
    pub api_key: String,

    pub timeout_secs: u64,
}

impl Config {
    /// Loads configuration from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{key} environment variable is required"))
        };

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let rules = RulesConfig::from_lookup(&lookup).context("invalid business rules")?;

        Ok(Self {
            api: ApiConfig {
                host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "API_PORT", 8080)?,
                cors_origins,
                production: parse_or(&lookup, "PRODUCTION", false)?,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            jwt: JwtConfig { secret: jwt_secret },
            webhooks: WebhookConfig {
                billing_secret: required("BILLING_WEBHOOK_SECRET")?,
                kyc_secret: required("KYC_WEBHOOK_SECRET")?,
                tolerance_secs: parse_or(
                    &lookup,
                    "WEBHOOK_TOLERANCE_SECS",
                    DEFAULT_TOLERANCE_SECS,
                )?,
            },
            kyc: KycConfig {
                base_url: required("KYC_BASE_URL")?,
                api_key: required("KYC_API_KEY")?,
                timeout_secs: parse_or(&lookup, "KYC_TIMEOUT_SECS", 10)?,
            },
            rules,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
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
