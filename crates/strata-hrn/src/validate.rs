//! Param pack validation
//!
//! Problems with the values themselves (malformed address, non-numeric or
//! out-of-range value) are blocking errors. Problems locating the entity are
//! warnings only: the entry is skipped when the pack is applied.

use crate::address::Address;
use crate::pack::ParamPack;
use crate::resolve::{entity_id, resolve, Resolution};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use strata_params::{EntityKind, FlowGraph, ParamLeaf, Stat};

/// What is wrong with one pack entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    /// Address text did not parse
    #[error("malformed address: {message}")]
    Malformed {
        /// Parser message
        message: String,
    },

    /// Value is not a JSON number
    #[error("value is not numeric")]
    NotNumeric,

    /// Value is NaN or infinite
    #[error("value is not finite")]
    NonFinite,

    /// Probability or weight outside its range
    #[error("value {value} outside [{min}, {max}]")]
    OutOfRange {
        /// Offending value
        value: f64,
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },

    /// Standard deviation below zero
    #[error("negative stdev {value}")]
    NegativeStdev {
        /// Offending value
        value: f64,
    },

    /// No entity matches the address
    #[error("no matching entity")]
    NotFound,

    /// Several entities match the address
    #[error("ambiguous address, candidates: {}", .candidates.join(", "))]
    Ambiguous {
        /// Uuids of every match
        candidates: Vec<String>,
    },

    /// Node has no case with this id
    #[error("node has no case '{case_id}'")]
    UnknownCase {
        /// Requested case id
        case_id: String,
    },

    /// Case has no such variant
    #[error("case '{case_id}' has no variant '{variant}'")]
    UnknownVariant {
        /// Case id
        case_id: String,
        /// Requested variant
        variant: String,
    },
}

impl IssueKind {
    /// Whether this issue blocks an apply/save
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::Malformed { .. }
                | Self::NotNumeric
                | Self::NonFinite
                | Self::OutOfRange { .. }
                | Self::NegativeStdev { .. }
        )
    }
}

/// One problem found in a pack, tied to its address text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Address as written in the pack
    pub address: String,

    /// What is wrong
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl Display for Issue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.address, self.kind)
    }
}

/// Result of validating a pack
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Blocking problems
    pub errors: Vec<Issue>,

    /// Non-blocking problems
    pub warnings: Vec<Issue>,
}

impl ValidationReport {
    /// Any blocking error present
    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        !self.errors.is_empty()
    }

    /// No errors and no warnings
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    fn push(&mut self, address: &str, kind: IssueKind) {
        let issue = Issue {
            address: address.to_string(),
            kind,
        };
        if issue.kind.is_blocking() {
            self.errors.push(issue);
        } else {
            self.warnings.push(issue);
        }
    }
}

/// Check every entry of a pack against the graph
#[must_use]
pub fn validate_pack(graph: &FlowGraph, pack: &ParamPack) -> ValidationReport {
    let mut report = ValidationReport::default();
    for (text, value) in pack.iter() {
        let address = match Address::parse(text) {
            Ok(address) => address,
            Err(e) => {
                report.push(
                    text,
                    IssueKind::Malformed {
                        message: e.to_string(),
                    },
                );
                continue;
            }
        };
        match numeric(value) {
            Ok(v) => {
                if let Some(issue) = range_issue(address.leaf(), v) {
                    report.push(text, issue);
                }
            }
            Err(issue) => report.push(text, issue),
        }
        if let Err(issue) = locate(graph, &address) {
            report.push(text, issue);
        }
    }
    report
}

/// Finite f64 from a JSON value
pub(crate) fn numeric(value: &Value) -> Result<f64, IssueKind> {
    let v = value.as_f64().ok_or(IssueKind::NotNumeric)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(IssueKind::NonFinite)
    }
}

fn range_issue(leaf: &ParamLeaf, value: f64) -> Option<IssueKind> {
    let is_stdev = matches!(
        leaf,
        ParamLeaf::Probability(Stat::Stdev)
            | ParamLeaf::Cost {
                stat: Stat::Stdev,
                ..
            }
            | ParamLeaf::Conditional {
                stat: Stat::Stdev,
                ..
            }
    );
    if is_stdev {
        return (value < 0.0).then_some(IssueKind::NegativeStdev { value });
    }
    let is_unit = matches!(
        leaf,
        ParamLeaf::Probability(Stat::Mean)
            | ParamLeaf::Conditional {
                stat: Stat::Mean,
                ..
            }
            | ParamLeaf::CaseWeight { .. }
    );
    (is_unit && !(0.0..=1.0).contains(&value)).then_some(IssueKind::OutOfRange {
        value,
        min: 0.0,
        max: 1.0,
    })
}

/// Entity id the address lands on, checking case/variant for weight leaves
pub(crate) fn locate(graph: &FlowGraph, address: &Address) -> Result<String, IssueKind> {
    let uuid = match resolve(graph, address) {
        Resolution::Resolved { uuid } => uuid,
        Resolution::Ambiguous { candidates } => return Err(IssueKind::Ambiguous { candidates }),
        Resolution::NotFound => return Err(IssueKind::NotFound),
    };
    let id = entity_id(graph, address.kind(), &uuid).ok_or(IssueKind::NotFound)?;

    if let (EntityKind::Node, ParamLeaf::CaseWeight { case_id, variant }) =
        (address.kind(), address.leaf())
    {
        let case = graph
            .node(&id)
            .and_then(|n| n.case.as_ref())
            .filter(|c| &c.case_id == case_id)
            .ok_or_else(|| IssueKind::UnknownCase {
                case_id: case_id.clone(),
            })?;
        if !case.has_variant(variant) {
            return Err(IssueKind::UnknownVariant {
                case_id: case_id.clone(),
                variant: variant.clone(),
            });
        }
    }
    Ok(id)
}
