/// API route handlers
///
/// Organized by resource:
///
/// - `health`: liveness and database status
/// - `auth`: register, login, refresh, current user
/// - `members`: joining and the caller's membership
/// - `payments`, `subscriptions`, `payouts`: the caller's money records
/// - `queue`: ranked queue and refresh
/// - `business_rules`: eligibility and payout readiness
/// - `kyc`: identity verification sessions
/// - `notifications`: in-app notifications
/// - `webhooks`: signed billing and KYC callbacks
/// - `admin`: member management, manual payments, audit log

pub mod admin;
pub mod auth;
pub mod business_rules;
pub mod health;
pub mod kyc;
pub mod members;
pub mod notifications;
pub mod payments;
pub mod payouts;
pub mod queue;
pub mod subscriptions;
pub mod webhooks;

use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tenure_shared::models::membership::Membership;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

/// `limit` / `offset` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Requested page size clamped to `1..=MAX_PAGE_SIZE`
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// A page of results
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub limit: i64,
    pub offset: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination) -> Self {
        Self {
            items,
            limit: pagination.limit(),
            offset: pagination.offset(),
            total: None,
        }
    }

    pub fn with_total(mut self, total: i64) -> Self {
        self.total = Some(total);
        self
    }
}

/// The caller's membership, or 404 if they haven't joined
pub(crate) async fn membership_for_user(pool: &PgPool, user_id: Uuid) -> ApiResult<Membership> {
    Membership::find_by_user(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Membership not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let page = Pagination::default();
        assert_eq!(page.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_pagination_clamps() {
        let page = Pagination {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(page.limit(), MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = Pagination {
            limit: Some(0),
            offset: Some(20),
        };
        assert_eq!(page.limit(), 1);
        assert_eq!(page.offset(), 20);
    }
}
