//! Error types for the data authorization cache

use thiserror::Error;

/// Data authorization cache errors
#[derive(Debug, Error)]
pub enum DataAuthError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The rule store could not be queried
    #[error("Rule store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored rule payload could not be parsed into a filter group
    #[error("Invalid rule payload for role {role_id} / entity type {entity_type_id}: {message}")]
    Deserialization {
        role_id: String,
        entity_type_id: String,
        message: String,
    },

    /// An association points at a role or entity type that does not exist
    #[error("Association references missing {kind} {id}")]
    DanglingReference {
        kind: &'static str,
        id: String,
    },

    /// A filter group could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The rule cache backend failed
    #[error("Rule cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DataAuthError {
    /// Whether the error is scoped to a single association and can be skipped
    /// during a rebuild without invalidating the rest of the run.
    pub fn is_per_association(&self) -> bool {
        matches!(
            self,
            DataAuthError::Deserialization { .. } | DataAuthError::DanglingReference { .. }
        )
    }
}

/// Result type for data authorization operations
pub type Result<T> = std::result::Result<T, DataAuthError>;
