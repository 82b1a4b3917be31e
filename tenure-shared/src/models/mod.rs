/// Database models for Tenure
///
/// This module contains all database models and their CRUD operations.
///
/// # Models
///
/// - `user`: User accounts and roles
/// - `membership`: A user's seat in the rotation and its lifecycle
/// - `payment`: Joining/monthly fee payments
/// - `subscription`: Mirror of the billing provider's subscription
/// - `billing_event`: Raw billing webhook log (idempotency)
/// - `kyc_verification`: Identity verification sessions
/// - `queue_entry`: Materialised queue ranking
/// - `payout`: Pool distributions
/// - `audit_log`: Administrative audit trail
/// - `notification`: In-app notifications
///
/// # Example
///
/// ```no_run
/// use tenure_shared::models::user::{User, CreateUser};
/// use tenure_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let new_user = CreateUser {
///     email: "member@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Ada Member".to_string()),
///     phone: None,
/// };
///
/// let user = User::create(&pool, new_user).await?;
/// # Ok(())
/// # }
/// ```

pub mod audit_log;
pub mod billing_event;
pub mod kyc_verification;
pub mod membership;
pub mod notification;
pub mod payment;
pub mod payout;
pub mod queue_entry;
pub mod subscription;
pub mod user;
