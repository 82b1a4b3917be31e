/// Authorization checks
///
/// Two roles exist platform-wide. Members may read and act on their own
/// records; admins may read and act on everything, and are the only callers
/// allowed to change business rules, run payouts or alter membership status.
///
/// # Example
///
/// ```
/// use tenure_shared::auth::authorization::{require_admin, require_self_or_admin};
/// use tenure_shared::auth::middleware::AuthContext;
/// use tenure_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let member = AuthContext::new(Uuid::new_v4(), UserRole::Member);
/// assert!(require_admin(&member).is_err());
/// assert!(require_self_or_admin(&member, member.user_id).is_ok());
/// ```

use uuid::Uuid;

use super::middleware::AuthContext;

/// Error type for authorization checks
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Caller must be an admin
    #[error("Admin role required")]
    AdminRequired,

    /// Caller doesn't own the resource
    #[error("Not authorized to access this resource")]
    NotOwner,
}

/// Fails unless the caller is an admin
pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if auth.is_admin() {
        Ok(())
    } else {
        tracing::debug!(user_id = %auth.user_id, "Admin check failed");
        Err(AuthzError::AdminRequired)
    }
}

/// Fails unless the caller owns the resource or is an admin
pub fn require_self_or_admin(auth: &AuthContext, owner_user_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id == owner_user_id || auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::NotOwner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    #[test]
    fn test_require_admin() {
        let admin = AuthContext::new(Uuid::new_v4(), UserRole::Admin);
        let member = AuthContext::new(Uuid::new_v4(), UserRole::Member);

        assert!(require_admin(&admin).is_ok());
        assert_eq!(require_admin(&member), Err(AuthzError::AdminRequired));
    }

    #[test]
    fn test_require_self_or_admin() {
        let owner = Uuid::new_v4();
        let admin = AuthContext::new(Uuid::new_v4(), UserRole::Admin);
        let member = AuthContext::new(owner, UserRole::Member);
        let stranger = AuthContext::new(Uuid::new_v4(), UserRole::Member);

        assert!(require_self_or_admin(&member, owner).is_ok());
        assert!(require_self_or_admin(&admin, owner).is_ok());
        assert_eq!(
            require_self_or_admin(&stranger, owner),
            Err(AuthzError::NotOwner)
        );
    }
}
