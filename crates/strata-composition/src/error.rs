//! Composition error types

/// Errors raised by the diff engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompositionError {
    /// Tolerance is negative or NaN
    #[error("invalid epsilon {0}: must be a non-negative number")]
    InvalidEpsilon(f64),
}

/// Result alias for composition operations
pub type Result<T> = std::result::Result<T, CompositionError>;
