/// Resource ownership checks
///
/// Goals belong to exactly one user; every goal handler verifies the caller
/// owns the goal before reading or changing it.

use uuid::Uuid;

use super::middleware::AuthContext;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Not authorized to access this resource")]
    NotOwner,
}

/// Succeeds only when the authenticated caller is `owner_id`
pub fn ensure_owner(auth: &AuthContext, owner_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id == owner_id {
        Ok(())
    } else {
        tracing::warn!(user_id = %auth.user_id, owner_id = %owner_id, "Ownership check failed");
        Err(AuthzError::NotOwner)
    }
}
