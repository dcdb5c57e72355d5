//! Error types for scenarios and regeneration
//!
//! Resolution and fetch problems for individual items never surface here;
//! they are reported inside regeneration outcomes so a batch keeps going.

use crate::scenario::ScenarioId;
use crate::state::RegenState;
use strata_composition::CompositionError;
use strata_dsl::DslError;

/// Scenario stack and orchestration errors
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// No scenario with this id in the stack
    #[error("unknown scenario: {0}")]
    UnknownScenario(ScenarioId),

    /// A scenario's query text does not parse
    #[error("invalid query on scenario {scenario}: {source}")]
    InvalidDsl {
        /// Owning scenario
        scenario: ScenarioId,
        /// Parse failure
        source: DslError,
    },

    /// The base query text does not parse
    #[error("invalid base query: {0}")]
    InvalidBaseDsl(#[source] DslError),

    /// The current layer's what-if text does not parse
    #[error("invalid what-if selection: {0}")]
    InvalidWhatIf(#[source] DslError),

    /// Static scenarios have nothing to regenerate
    #[error("scenario {0} is not live")]
    NotLive(ScenarioId),

    /// Caller cancelled before applying began
    #[error("regeneration cancelled during {state}")]
    Cancelled {
        /// State the regeneration was in
        state: RegenState,
    },

    /// Regeneration state machine violation
    #[error("illegal state transition: {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: RegenState,
        /// Requested state
        to: RegenState,
    },

    /// Stack position out of range
    #[error("index {index} out of range for stack of {len}")]
    InvalidIndex {
        /// Requested index
        index: usize,
        /// Stack length
        len: usize,
    },

    /// Diff engine rejected its inputs
    #[error("composition failed: {0}")]
    Composition(#[from] CompositionError),
}

impl ScenarioError {
    /// Whether the error came from the caller cancelling
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Failure fetching one item from the external collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Transport or upstream failure
    #[error("fetch failed for {item}: {message}")]
    Failed {
        /// Item label
        item: String,
        /// Upstream message
        message: String,
    },

    /// Upstream had no data for the window and slice
    #[error("no data for {item}")]
    NoData {
        /// Item label
        item: String,
    },

    /// Upstream refused the request for now
    #[error("rate limited fetching {item}")]
    RateLimited {
        /// Item label
        item: String,
    },
}

/// Result type for scenario operations
pub type Result<T> = std::result::Result<T, ScenarioError>;
