//! Query inheritance through the stack
//!
//! A live scenario fetches with the base query, then every live scenario
//! beneath it, then its own fetch terms, folded in that order. Static
//! scenarios do not take part. What-if terms are never inherited.

use crate::error::{Result, ScenarioError};
use crate::scenario::Scenario;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use strata_dsl::{merge, parse, ConstraintSet, QueryDsl};
use tracing::warn;

/// Queries a live scenario regenerates with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveDsl {
    /// Fetch terms inherited from the base and live scenarios below
    pub inherited: ConstraintSet,
    /// Inherited fetch terms with the scenario's own on top
    pub fetch: ConstraintSet,
    /// The scenario's own what-if terms
    pub what_if: ConstraintSet,
}

impl EffectiveDsl {
    /// Fetch and what-if terms in one set
    #[must_use]
    pub fn combined(&self) -> ConstraintSet {
        merge(&self.fetch, &self.what_if)
    }
}

impl Display for EffectiveDsl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.combined())
    }
}

/// Effective queries for the scenario at `target` in `stack`
///
/// Pure function of its arguments. A live scenario below the target whose
/// text does not parse is skipped with a warning; it cannot be regenerated
/// itself, but it does not poison the scenarios above it.
///
/// # Errors
/// Returns error if `target` is out of range, the base query is malformed,
/// or the target's own query is malformed
pub fn inherit(base_dsl: Option<&str>, stack: &[Scenario], target: usize) -> Result<EffectiveDsl> {
    let scenario = stack.get(target).ok_or(ScenarioError::InvalidIndex {
        index: target,
        len: stack.len(),
    })?;

    let mut inherited = match base_dsl {
        Some(text) => parse(text)
            .map_err(ScenarioError::InvalidBaseDsl)?
            .fetch_parts(),
        None => ConstraintSet::new(),
    };

    for below in &stack[..target] {
        let Some(text) = below.query_dsl() else {
            continue;
        };
        match parse(text) {
            Ok(set) => inherited = merge(&inherited, &set.fetch_parts()),
            Err(e) => warn!(scenario = %below.id, error = %e, "skipping unparseable query below target"),
        }
    }

    let own = match scenario.query_dsl() {
        Some(text) => QueryDsl::parse(text).map_err(|source| ScenarioError::InvalidDsl {
            scenario: scenario.id,
            source,
        })?,
        None => QueryDsl::default(),
    };

    Ok(EffectiveDsl {
        fetch: merge(&inherited, &own.fetch),
        what_if: own.what_if,
        inherited,
    })
}
