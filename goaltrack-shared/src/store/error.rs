/// Error type shared by every storage operation
///
/// Backends report duplicate keys as [`StoreError::Duplicate`]; the model layer
/// translates those into user-facing [`StoreError::Conflict`] messages.

use super::keyspace::Table;

/// Errors raised by the keyspace backends and the entity models built on them
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The addressed entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Required fields are missing or malformed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A uniqueness rule was violated (duplicate email, username, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An insert-if-absent write found an existing row; the batch was not applied
    #[error("Duplicate key in {table}: {key}")]
    Duplicate { table: Table, key: String },

    /// The backend did not answer within the configured call timeout
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the error describes bad caller input rather than a backend fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_)
                | StoreError::Validation(_)
                | StoreError::Conflict(_)
                | StoreError::Duplicate { .. }
        )
    }
}
