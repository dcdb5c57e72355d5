//! Error types for the parameter model

use crate::path::PathError;

/// Errors raised by snapshot and graph operations
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    /// Serialization failure while encoding or decoding
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed fingerprint text
    #[error("invalid snapshot hash: {0}")]
    InvalidHash(String),

    /// Path did not name a parameter leaf
    #[error(transparent)]
    Path(#[from] PathError),

    /// Leaf cannot be stored on this entity kind
    #[error("leaf '{leaf}' does not belong on a {kind}")]
    WrongEntityKind {
        /// Offending leaf
        leaf: String,
        /// Kind it was addressed against
        kind: &'static str,
    },

    /// Two entities of the same kind share an id or uuid
    #[error("duplicate {kind} {key}")]
    DuplicateEntity {
        /// Entity kind label
        kind: &'static str,
        /// Duplicated id/uuid
        key: String,
    },

    /// Edge endpoint does not reference a node
    #[error("edge '{edge}' references unknown node '{node}'")]
    DanglingEndpoint {
        /// Edge id
        edge: String,
        /// Missing node reference
        node: String,
    },
}

/// Result alias for parameter model operations
pub type Result<T> = std::result::Result<T, ParamsError>;
