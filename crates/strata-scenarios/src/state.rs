//! Regeneration state machine

use crate::error::{Result, ScenarioError};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Where a live scenario's regeneration is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenState {
    /// Not regenerating
    #[default]
    Idle,
    /// Building the effective query from the stack below
    Inheriting,
    /// Deciding which connected items need fresh data
    CacheChecking,
    /// Calling the fetch collaborator
    Fetching,
    /// Baking what-if selections and capturing the diff
    Applying,
}

impl RegenState {
    /// All states
    pub const ALL: [Self; 5] = [
        Self::Idle,
        Self::Inheriting,
        Self::CacheChecking,
        Self::Fetching,
        Self::Applying,
    ];

    /// Whether a caller may still cancel from this state
    #[inline]
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        !matches!(self, Self::Applying)
    }
}

impl Display for RegenState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Inheriting => "inheriting",
            Self::CacheChecking => "cache_checking",
            Self::Fetching => "fetching",
            Self::Applying => "applying",
        };
        f.write_str(name)
    }
}

/// Validate a state transition
///
/// Every non-idle state may fall back to `Idle` except `Applying`, which
/// always runs to completion first.
///
/// # Errors
/// Returns `ScenarioError::IllegalTransition` for any other move
pub fn validate_transition(from: RegenState, to: RegenState) -> Result<()> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(ScenarioError::IllegalTransition { from, to })
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: RegenState) -> Vec<RegenState> {
    use RegenState::{Applying, CacheChecking, Fetching, Idle, Inheriting};
    match from {
        Idle => vec![Inheriting],
        Inheriting => vec![CacheChecking, Idle],
        CacheChecking => vec![Fetching, Applying, Idle],
        Fetching => vec![Applying, Idle],
        Applying => vec![Idle],
    }
}

/// Current state plus every state visited so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StateTrace {
    states: Vec<RegenState>,
}

impl StateTrace {
    pub(crate) fn new() -> Self {
        Self {
            states: vec![RegenState::Idle],
        }
    }

    pub(crate) fn current(&self) -> RegenState {
        self.states.last().copied().unwrap_or_default()
    }

    pub(crate) fn advance(&mut self, to: RegenState) -> Result<()> {
        validate_transition(self.current(), to)?;
        self.states.push(to);
        Ok(())
    }

    pub(crate) fn into_states(self) -> Vec<RegenState> {
        self.states
    }
}
