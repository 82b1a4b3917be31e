/// Authentication and authorization
///
/// - [`password`]: Argon2id hashing and registration strength rules
/// - [`jwt`]: HS256 access/refresh tokens carrying the user's role
/// - [`middleware`]: Axum middleware producing an [`middleware::AuthContext`]
/// - [`authorization`]: admin and ownership checks
///
/// # Example
///
/// ```no_run
/// use tenure_shared::auth::jwt::{issue_token_pair, validate_access_token};
/// use tenure_shared::auth::password::{hash_password, verify_password};
/// use tenure_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("monthly fee 25")?;
/// assert!(verify_password("monthly fee 25", &hash)?);
///
/// let secret = "a-secret-that-is-at-least-32-bytes-long";
/// let pair = issue_token_pair(Uuid::new_v4(), UserRole::Member, secret)?;
/// let claims = validate_access_token(&pair.access_token, secret)?;
/// assert_eq!(claims.role, UserRole::Member);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
