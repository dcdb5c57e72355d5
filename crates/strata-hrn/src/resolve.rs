//! Soft-failing resolution of addresses against a graph

use crate::address::{Address, Selector};
use serde::{Deserialize, Serialize};
use strata_params::{EntityKind, FlowGraph};

/// Outcome of resolving an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    /// Exactly one entity matched
    Resolved {
        /// Entity uuid
        uuid: String,
    },

    /// More than one entity matched
    Ambiguous {
        /// Uuids of every match
        candidates: Vec<String>,
    },

    /// Nothing matched
    NotFound,
}

impl Resolution {
    /// Uuid when resolved
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> Option<&str> {
        match self {
            Self::Resolved { uuid } => Some(uuid.as_str()),
            _ => None,
        }
    }

    /// Check if resolution succeeded
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    fn from_matches(mut uuids: Vec<String>) -> Self {
        match uuids.len() {
            0 => Self::NotFound,
            1 => Self::Resolved {
                uuid: uuids.remove(0),
            },
            _ => Self::Ambiguous { candidates: uuids },
        }
    }
}

/// Resolve an address to a single entity
///
/// Bare ids fall back to uuid matching when no entity carries the id.
#[must_use]
pub fn resolve(graph: &FlowGraph, address: &Address) -> Resolution {
    let uuids: Vec<String> = match (address.kind(), address.selector()) {
        (EntityKind::Edge, Selector::ById(id)) => {
            let by_id: Vec<String> = graph.edges_by_id(id).iter().map(|e| e.uuid.clone()).collect();
            if by_id.is_empty() {
                graph.edge_by_uuid(id).map(|e| e.uuid.clone()).into_iter().collect()
            } else {
                by_id
            }
        }
        (EntityKind::Edge, Selector::ByEndpoints { from, to }) => graph
            .edges_between(from, to)
            .iter()
            .map(|e| e.uuid.clone())
            .collect(),
        (EntityKind::Edge, Selector::ByUuid(uuid)) => {
            graph.edge_by_uuid(uuid).map(|e| e.uuid.clone()).into_iter().collect()
        }
        (EntityKind::Node, Selector::ById(id)) => {
            let by_id: Vec<String> = graph.nodes_by_id(id).iter().map(|n| n.uuid.clone()).collect();
            if by_id.is_empty() {
                graph.node_by_uuid(id).map(|n| n.uuid.clone()).into_iter().collect()
            } else {
                by_id
            }
        }
        (EntityKind::Node, Selector::ByUuid(uuid)) => {
            graph.node_by_uuid(uuid).map(|n| n.uuid.clone()).into_iter().collect()
        }
        (EntityKind::Node, Selector::ByCaseId(case_id)) => graph
            .nodes_by_case_id(case_id)
            .iter()
            .map(|n| n.uuid.clone())
            .collect(),
        (EntityKind::Edge | EntityKind::Node, _) => Vec::new(),
    };
    Resolution::from_matches(uuids)
}

/// Entity id (snapshot key) for a resolved uuid
#[must_use]
pub fn entity_id(graph: &FlowGraph, kind: EntityKind, uuid: &str) -> Option<String> {
    match kind {
        EntityKind::Edge => graph.edge_by_uuid(uuid).map(|e| e.id.clone()),
        EntityKind::Node => graph.node_by_uuid(uuid).map(|n| n.id.clone()),
    }
}
