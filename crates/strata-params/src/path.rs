//! Parameter paths for addressing leaves within a snapshot entity
//!
//! A [`ParamPath`] is the ordered list of segments after the entity selector
//! in a human-readable address, e.g. `p.mean`, `cost_gbp.stdev`,
//! `conditional_p.visited(promo).mean` or `case(checkout:treatment).weight`.
//! [`ParamPath::to_leaf`] interprets it as a concrete [`ParamLeaf`].

use crate::snapshot::EntityKind;
use std::fmt::{self, Display, Formatter};

/// Segment name for the edge probability slot
pub const PROBABILITY_SLOT: &str = "p";

/// Segment name introducing a conditional-probability entry
pub const CONDITIONAL_SLOT: &str = "conditional_p";

/// Segment name for case variant weights
pub const CASE_SEGMENT: &str = "case";

/// One path segment, optionally parameterised: `name` or `name(arg)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathSegment {
    name: String,
    arg: Option<String>,
}

impl PathSegment {
    /// Plain segment
    #[inline]
    #[must_use]
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg: None,
        }
    }

    /// Parameterised segment `name(arg)`
    #[inline]
    #[must_use]
    pub fn call(name: impl Into<String>, arg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg: Some(arg.into()),
        }
    }

    /// Segment name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Argument text, if parameterised
    #[inline]
    #[must_use]
    pub fn arg(&self) -> Option<&str> {
        self.arg.as_deref()
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.arg {
            Some(arg) => write!(f, "{}({})", self.name, arg),
            None => f.write_str(&self.name),
        }
    }
}

/// Path within an entity's parameter slots
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ParamPath(Vec<PathSegment>);

impl ParamPath {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&PathSegment> {
        self.0.first()
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut new = self.clone();
        new.0.push(segment);
        new
    }

    /// Interpret the path as a concrete leaf
    ///
    /// # Errors
    /// Returns error if the segments do not name a known parameter leaf
    pub fn to_leaf(&self) -> Result<ParamLeaf, PathError> {
        let segs = &self.0;
        let Some(head) = segs.first() else {
            return Err(PathError::Empty);
        };

        match (head.name(), head.arg()) {
            (CASE_SEGMENT, Some(arg)) => {
                if segs.len() != 2 || segs[1] != PathSegment::plain("weight") {
                    return Err(PathError::UnknownLeaf(self.to_string()));
                }
                let (case_id, variant) = split_case_arg(arg)?;
                Ok(ParamLeaf::CaseWeight { case_id, variant })
            }
            (CONDITIONAL_SLOT, None) => {
                if segs.len() < 3 {
                    return Err(PathError::UnknownLeaf(self.to_string()));
                }
                let stat = Stat::from_segment(&segs[segs.len() - 1])
                    .ok_or_else(|| PathError::MissingStat(self.to_string()))?;
                let condition = segs[1..segs.len() - 1]
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(".");
                Ok(ParamLeaf::Conditional { condition, stat })
            }
            (name, None) => {
                if segs.len() != 2 {
                    return Err(PathError::UnknownLeaf(self.to_string()));
                }
                let stat = Stat::from_segment(&segs[1])
                    .ok_or_else(|| PathError::MissingStat(self.to_string()))?;
                if name == PROBABILITY_SLOT {
                    Ok(ParamLeaf::Probability(stat))
                } else {
                    validate_slot_name(name)?;
                    Ok(ParamLeaf::Cost {
                        slot: name.to_string(),
                        stat,
                    })
                }
            }
            _ => Err(PathError::UnknownLeaf(self.to_string())),
        }
    }
}

impl Display for ParamPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

impl From<Vec<PathSegment>> for ParamPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

fn split_case_arg(arg: &str) -> Result<(String, String), PathError> {
    match arg.split_once(':') {
        Some((case_id, variant)) if !case_id.trim().is_empty() && !variant.trim().is_empty() => {
            Ok((case_id.trim().to_string(), variant.trim().to_string()))
        }
        _ => Err(PathError::InvalidSegment(format!("case({arg})"))),
    }
}

fn validate_slot_name(name: &str) -> Result<(), PathError> {
    if name.is_empty() {
        return Err(PathError::EmptySegment);
    }
    if name.contains(|c: char| !c.is_alphanumeric() && c != '_' && c != '-') {
        return Err(PathError::InvalidSegment(name.to_string()));
    }
    Ok(())
}

/// Statistic carried by a moments slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stat {
    /// Mean
    Mean,
    /// Standard deviation
    Stdev,
}

impl Stat {
    /// Segment text
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Stdev => "stdev",
        }
    }

    fn from_segment(seg: &PathSegment) -> Option<Self> {
        match (seg.name(), seg.arg()) {
            ("mean", None) => Some(Self::Mean),
            ("stdev", None) => Some(Self::Stdev),
            _ => None,
        }
    }
}

/// A concrete, addressable parameter leaf
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamLeaf {
    /// Edge probability mean/stdev
    Probability(Stat),

    /// Named cost slot on an edge
    Cost {
        /// Slot name, e.g. `cost_gbp`
        slot: String,
        /// Statistic
        stat: Stat,
    },

    /// Conditional probability entry on an edge
    Conditional {
        /// Condition key, e.g. `visited(promo)`
        condition: String,
        /// Statistic
        stat: Stat,
    },

    /// Weight of one variant on a case node
    CaseWeight {
        /// Case identifier
        case_id: String,
        /// Variant name
        variant: String,
    },
}

impl ParamLeaf {
    /// Entity kind this leaf lives on
    #[inline]
    #[must_use]
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Self::CaseWeight { .. } => EntityKind::Node,
            _ => EntityKind::Edge,
        }
    }

    /// Render back into path segments
    #[must_use]
    pub fn to_path(&self) -> ParamPath {
        let segments = match self {
            Self::Probability(stat) => vec![
                PathSegment::plain(PROBABILITY_SLOT),
                PathSegment::plain(stat.as_str()),
            ],
            Self::Cost { slot, stat } => {
                vec![PathSegment::plain(slot.clone()), PathSegment::plain(stat.as_str())]
            }
            Self::Conditional { condition, stat } => vec![
                PathSegment::plain(CONDITIONAL_SLOT),
                PathSegment::plain(condition.clone()),
                PathSegment::plain(stat.as_str()),
            ],
            Self::CaseWeight { case_id, variant } => vec![
                PathSegment::call(CASE_SEGMENT, format!("{case_id}:{variant}")),
                PathSegment::plain("weight"),
            ],
        };
        ParamPath(segments)
    }
}

impl Display for ParamLeaf {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_path())
    }
}

/// Errors related to parameter paths
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    /// No segments at all
    #[error("parameter path is empty")]
    Empty,

    /// Empty segment in path
    #[error("path contains empty segment")]
    EmptySegment,

    /// Invalid segment characters
    #[error("invalid segment: {0}")]
    InvalidSegment(String),

    /// Path does not end in `mean`/`stdev` where required
    #[error("path '{0}' must end in 'mean' or 'stdev'")]
    MissingStat(String),

    /// Path does not name a known leaf
    #[error("unknown parameter leaf: {0}")]
    UnknownLeaf(String),
}
