//! DSL error types

use chrono::NaiveDate;

/// Errors raised while parsing or resolving a query DSL string
///
/// A parse error rejects the whole string; no partial constraint set is
/// ever returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DslError {
    /// Text does not match the term grammar
    #[error("syntax error at offset {offset} in '{input}': {message}")]
    Syntax {
        /// Full input text
        input: String,
        /// Byte offset of the failure
        offset: usize,
        /// What was expected
        message: String,
    },

    /// Well-formed term with an unknown function name
    #[error("unknown function '{name}'")]
    UnknownFunction {
        /// Function name as written
        name: String,
    },

    /// Window bound is neither a relative offset nor a recognised date
    #[error("invalid date '{text}'")]
    InvalidDate {
        /// Offending bound
        text: String,
    },

    /// Function arguments have the wrong shape
    #[error("invalid argument to {function}(): {message}")]
    InvalidArgument {
        /// Function name
        function: String,
        /// What went wrong
        message: String,
    },

    /// Window resolves to a start after its end
    #[error("window start {from} is after end {to}")]
    InvertedWindow {
        /// Resolved start
        from: NaiveDate,
        /// Resolved end
        to: NaiveDate,
    },
}

impl DslError {
    /// Create an invalid-argument error
    #[must_use]
    pub fn invalid_argument(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function: function.into(),
            message: message.into(),
        }
    }
}

/// Result alias for DSL operations
pub type Result<T> = std::result::Result<T, DslError>;
