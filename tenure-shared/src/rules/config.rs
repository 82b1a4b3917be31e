/// Business rule parameters
///
/// Every amount is in cents and every period in whole days. Values come from
/// `TENURE_*` environment variables and fall back to the platform defaults.
///
/// # Environment Variables
///
/// - `TENURE_JOINING_FEE_CENTS` (default: 30000)
/// - `TENURE_MONTHLY_FEE_CENTS` (default: 2500)
/// - `TENURE_BILLING_PERIOD_DAYS` (default: 30)
/// - `TENURE_GRACE_PERIOD_DAYS` (default: 7)
/// - `TENURE_MAX_CONSECUTIVE_FAILURES` (default: 3)
/// - `TENURE_PAYOUT_AMOUNT_CENTS` (default: 10000000)
/// - `TENURE_MIN_PAYOUT_TENURE_DAYS` (default: 365)
/// - `TENURE_LAUNCH_DATE` (optional, RFC 3339 or `YYYY-MM-DD`)
/// - `TENURE_MIN_MONTHS_SINCE_LAUNCH` (default: 12)
/// - `TENURE_REQUIRE_KYC_FOR_PAYOUT` (default: true)

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Error type for rule configuration
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RulesConfigError {
    /// A variable was set but could not be parsed
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    /// A value is outside its allowed range
    #[error("{field} must be {requirement}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesConfig {
    pub joining_fee_cents: i64,
    pub monthly_fee_cents: i64,
    pub billing_period_days: i64,
    pub grace_period_days: i64,
    pub max_consecutive_failures: u32,
    pub payout_amount_cents: i64,
    pub min_payout_tenure_days: i64,

    /// Platform launch; no payout may happen before the launch gate opens
    pub launch_date: Option<DateTime<Utc>>,

    pub min_months_since_launch: u32,
    pub require_kyc_for_payout: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            joining_fee_cents: 30_000,
            monthly_fee_cents: 2_500,
            billing_period_days: 30,
            grace_period_days: 7,
            max_consecutive_failures: 3,
            payout_amount_cents: 10_000_000,
            min_payout_tenure_days: 365,
            launch_date: None,
            min_months_since_launch: 12,
            require_kyc_for_payout: true,
        }
    }
}

impl RulesConfig {
    /// Loads rules from `TENURE_*` environment variables
    pub fn from_env() -> Result<Self, RulesConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads rules through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RulesConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            joining_fee_cents: parse_or(
                &lookup,
                "TENURE_JOINING_FEE_CENTS",
                defaults.joining_fee_cents,
            )?,
            monthly_fee_cents: parse_or(
                &lookup,
                "TENURE_MONTHLY_FEE_CENTS",
                defaults.monthly_fee_cents,
            )?,
            billing_period_days: parse_or(
                &lookup,
                "TENURE_BILLING_PERIOD_DAYS",
                defaults.billing_period_days,
            )?,
            grace_period_days: parse_or(
                &lookup,
                "TENURE_GRACE_PERIOD_DAYS",
                defaults.grace_period_days,
            )?,
            max_consecutive_failures: parse_or(
                &lookup,
                "TENURE_MAX_CONSECUTIVE_FAILURES",
                defaults.max_consecutive_failures,
            )?,
            payout_amount_cents: parse_or(
                &lookup,
                "TENURE_PAYOUT_AMOUNT_CENTS",
                defaults.payout_amount_cents,
            )?,
            min_payout_tenure_days: parse_or(
                &lookup,
                "TENURE_MIN_PAYOUT_TENURE_DAYS",
                defaults.min_payout_tenure_days,
            )?,
            launch_date: match lookup("TENURE_LAUNCH_DATE").filter(|v| !v.trim().is_empty()) {
                Some(raw) => Some(parse_launch_date(&raw)?),
                None => None,
            },
            min_months_since_launch: parse_or(
                &lookup,
                "TENURE_MIN_MONTHS_SINCE_LAUNCH",
                defaults.min_months_since_launch,
            )?,
            require_kyc_for_payout: parse_or(
                &lookup,
                "TENURE_REQUIRE_KYC_FOR_PAYOUT",
                defaults.require_kyc_for_payout,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the rules cannot work with
    pub fn validate(&self) -> Result<(), RulesConfigError> {
        let positive = [
            ("joining_fee_cents", self.joining_fee_cents),
            ("monthly_fee_cents", self.monthly_fee_cents),
            ("billing_period_days", self.billing_period_days),
            ("payout_amount_cents", self.payout_amount_cents),
        ];
        for (field, value) in positive {
            if value <= 0 {
                return Err(RulesConfigError::OutOfRange {
                    field,
                    requirement: "greater than zero",
                });
            }
        }

        if self.max_consecutive_failures == 0 {
            return Err(RulesConfigError::OutOfRange {
                field: "max_consecutive_failures",
                requirement: "greater than zero",
            });
        }

        if self.grace_period_days < 0 {
            return Err(RulesConfigError::OutOfRange {
                field: "grace_period_days",
                requirement: "zero or more",
            });
        }

        if self.min_payout_tenure_days < 0 {
            return Err(RulesConfigError::OutOfRange {
                field: "min_payout_tenure_days",
                requirement: "zero or more",
            });
        }

        Ok(())
    }

    /// Longest allowed gap between two qualifying payments
    pub fn lapse_window(&self) -> Duration {
        Duration::days(self.billing_period_days + self.grace_period_days)
    }

    /// Earliest moment payouts may happen, if a launch date is configured
    pub fn launch_gate_date(&self) -> Option<DateTime<Utc>> {
        self.launch_date.and_then(|launch| {
            launch.checked_add_months(Months::new(self.min_months_since_launch))
        })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, RulesConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| RulesConfigError::InvalidValue { var, value: raw }),
        None => Ok(default),
    }
}

fn parse_launch_date(raw: &str) -> Result<DateTime<Utc>, RulesConfigError> {
    let raw = raw.trim();

    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Ok(datetime.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| RulesConfigError::InvalidValue {
            var: "TENURE_LAUNCH_DATE",
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = RulesConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, RulesConfig::default());
        assert_eq!(config.joining_fee_cents, 30_000);
        assert_eq!(config.payout_amount_cents, 10_000_000);
        assert!(config.require_kyc_for_payout);
    }

    #[test]
    fn test_overrides() {
        let config = RulesConfig::from_lookup(lookup_from(&[
            ("TENURE_MONTHLY_FEE_CENTS", "3000"),
            ("TENURE_GRACE_PERIOD_DAYS", "10"),
            ("TENURE_REQUIRE_KYC_FOR_PAYOUT", "false"),
            ("TENURE_LAUNCH_DATE", "2025-01-15"),
        ]))
        .unwrap();

        assert_eq!(config.monthly_fee_cents, 3000);
        assert_eq!(config.grace_period_days, 10);
        assert!(!config.require_kyc_for_payout);
        assert_eq!(
            config.launch_date,
            Some(Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_launch_date_rfc3339() {
        let config = RulesConfig::from_lookup(lookup_from(&[(
            "TENURE_LAUNCH_DATE",
            "2025-03-01T12:00:00+02:00",
        )]))
        .unwrap();

        assert_eq!(
            config.launch_date,
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_invalid_number() {
        let err = RulesConfig::from_lookup(lookup_from(&[("TENURE_BILLING_PERIOD_DAYS", "thirty")]))
            .unwrap_err();

        assert_eq!(
            err,
            RulesConfigError::InvalidValue {
                var: "TENURE_BILLING_PERIOD_DAYS",
                value: "thirty".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_launch_date() {
        let err = RulesConfig::from_lookup(lookup_from(&[("TENURE_LAUNCH_DATE", "next spring")]))
            .unwrap_err();
        assert!(matches!(err, RulesConfigError::InvalidValue { var: "TENURE_LAUNCH_DATE", .. }));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = RulesConfig {
            billing_period_days: 0,
            ..RulesConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RulesConfig {
            payout_amount_cents: 0,
            ..RulesConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RulesConfig {
            max_consecutive_failures: 0,
            ..RulesConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RulesConfig {
            grace_period_days: 0,
            ..RulesConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_launch_gate_date() {
        let config = RulesConfig {
            launch_date: Some(Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap()),
            min_months_since_launch: 1,
            ..RulesConfig::default()
        };

        // Month arithmetic clamps to the end of shorter months
        assert_eq!(
            config.launch_gate_date(),
            Some(Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap())
        );

        assert_eq!(RulesConfig::default().launch_gate_date(), None);
    }

    #[test]
    fn test_lapse_window() {
        assert_eq!(RulesConfig::default().lapse_window(), Duration::days(37));
    }
}
