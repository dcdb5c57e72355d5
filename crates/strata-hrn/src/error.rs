//! Address parse errors
//!
//! Only malformed address text is an error. Failing to find the addressed
//! entity is a [`Resolution`](crate::Resolution) outcome instead.

use strata_params::PathError;

/// Errors raised while parsing an address
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Text does not split into segments
    #[error("malformed address '{input}' at offset {offset}")]
    Syntax {
        /// Full input
        input: String,
        /// Byte offset of the failure
        offset: usize,
    },

    /// First segment is not `e` or `n`
    #[error("unknown entity kind '{0}', expected 'e' or 'n'")]
    UnknownKind(String),

    /// No entity selector after the kind
    #[error("address '{0}' has no entity selector")]
    MissingSelector(String),

    /// Selector present but malformed
    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    /// Parameter path after the selector is not a known leaf
    #[error(transparent)]
    Path(#[from] PathError),

    /// Leaf belongs on the other entity kind
    #[error("'{leaf}' cannot be addressed on a {kind}")]
    WrongKind {
        /// Leaf text
        leaf: String,
        /// Entity kind label
        kind: &'static str,
    },
}
