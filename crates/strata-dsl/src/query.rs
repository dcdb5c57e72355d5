//! A scenario query split into its fetch and what-if halves

use crate::constraint::ConstraintSet;
use crate::error::Result;
use crate::merge::merge;
use crate::parser::parse;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Parsed query text with fetch and what-if constraints separated
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryDsl {
    /// Window and context constraints
    pub fetch: ConstraintSet,

    /// Case, visited, visitedAny and exclude constraints
    pub what_if: ConstraintSet,
}

impl QueryDsl {
    /// Parse and split DSL text
    ///
    /// # Errors
    /// Returns error if the text does not parse
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self::from_set(&parse(text)?))
    }

    /// Split an already-parsed set
    #[must_use]
    pub fn from_set(set: &ConstraintSet) -> Self {
        Self {
            fetch: set.fetch_parts(),
            what_if: set.what_if_parts(),
        }
    }

    /// Both halves recombined
    #[must_use]
    pub fn combined(&self) -> ConstraintSet {
        merge(&self.fetch, &self.what_if)
    }

    /// Neither half sets anything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fetch.is_empty() && self.what_if.is_empty()
    }
}

impl Display for QueryDsl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.combined())
    }
}
