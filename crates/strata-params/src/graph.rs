//! Read-only flow graph model
//!
//! The graph carries entity identity (id and uuid), edge endpoints, case-node
//! variants, the committed base parameters, and per-slot external connections
//! with whatever data has already been cached for them.

use crate::error::{ParamsError, Result};
use crate::snapshot::{EdgeParams, NodeParams, ParamSnapshot, VariantWeights};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A probabilistic flow graph
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    /// Nodes
    #[serde(default)]
    pub nodes: Vec<GraphNode>,

    /// Edges
    #[serde(default)]
    pub edges: Vec<GraphEdge>,

    /// Graph-wide base query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dsl: Option<String>,
}

/// Graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Stable unique identifier
    pub uuid: String,

    /// Human id
    pub id: String,

    /// Present on selector ("case") nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case: Option<CaseNode>,
}

/// Case (experiment selector) definition on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseNode {
    /// Case identifier used by `case(...)` terms
    pub case_id: String,

    /// Variants with committed weights
    #[serde(default)]
    pub variants: Vec<CaseVariant>,

    /// External source for variant weights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
}

impl CaseNode {
    /// Variant names in declaration order
    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|v| v.name.as_str())
    }

    /// Check if a variant exists
    #[must_use]
    pub fn has_variant(&self, name: &str) -> bool {
        self.variants.iter().any(|v| v.name == name)
    }

    /// Committed weights as a map
    #[must_use]
    pub fn weights(&self) -> VariantWeights {
        self.variants
            .iter()
            .map(|v| (v.name.clone(), v.weight))
            .collect()
    }
}

/// One case variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseVariant {
    /// Variant name
    pub name: String,

    /// Committed weight
    #[serde(default)]
    pub weight: f64,
}

/// Graph edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Stable unique identifier
    pub uuid: String,

    /// Human id
    pub id: String,

    /// Source node id
    pub from: String,

    /// Target node id
    pub to: String,

    /// Committed parameters
    #[serde(default)]
    pub params: EdgeParams,

    /// External connections per slot
    #[serde(default, skip_serializing_if = "EdgeConnections::is_empty")]
    pub connections: EdgeConnections,
}

/// External connections configured on an edge's slots
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeConnections {
    /// Probability connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<Connection>,

    /// Cost slot connections
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub costs: BTreeMap<String, Connection>,

    /// Conditional-probability connections keyed by condition
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditional_p: BTreeMap<String, Connection>,
}

impl EdgeConnections {
    /// No slot is connected
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.p.is_none() && self.costs.is_empty() && self.conditional_p.is_empty()
    }
}

/// A configured external data source plus its cached results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Opaque source name
    pub source: String,

    /// Previously fetched slices
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cache: Vec<CachedSlice>,
}

impl Connection {
    /// Connection with no cached data
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            cache: Vec::new(),
        }
    }

    /// Add a cached slice, returning self
    #[inline]
    #[must_use]
    pub fn with_cached(mut self, slice: CachedSlice) -> Self {
        self.cache.push(slice);
        self
    }

    /// First cached slice for `slice` covering `[from, to]`
    #[must_use]
    pub fn covering(&self, slice: &str, from: NaiveDate, to: NaiveDate) -> Option<&CachedSlice> {
        self.cache.iter().find(|c| c.covers(slice, from, to))
    }
}

/// Data cached for one window and context slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSlice {
    /// Window start (inclusive)
    pub window_from: NaiveDate,

    /// Window end (inclusive)
    pub window_to: NaiveDate,

    /// Canonical context text; empty for uncontexted
    #[serde(default)]
    pub slice: String,

    /// Mean
    pub mean: f64,

    /// Standard deviation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdev: Option<f64>,

    /// Trials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u64>,

    /// Successes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<u64>,

    /// Variant weights, for case connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<VariantWeights>,
}

impl CachedSlice {
    /// Whether this slice answers `slice` over `[from, to]`
    #[inline]
    #[must_use]
    pub fn covers(&self, slice: &str, from: NaiveDate, to: NaiveDate) -> bool {
        self.slice == slice && self.window_from <= from && self.window_to >= to
    }
}

impl FlowGraph {
    /// Parse a graph from JSON
    ///
    /// # Errors
    /// Returns error on malformed JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check uuid/id uniqueness and that every edge endpoint names a node
    ///
    /// # Errors
    /// Returns the first structural problem found
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for uuid in self.nodes.iter().map(|n| &n.uuid).chain(self.edges.iter().map(|e| &e.uuid)) {
            if !seen.insert(uuid.as_str()) {
                return Err(ParamsError::DuplicateEntity {
                    kind: "uuid",
                    key: uuid.clone(),
                });
            }
        }
        let mut node_ids = BTreeSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                return Err(ParamsError::DuplicateEntity {
                    kind: "node",
                    key: node.id.clone(),
                });
            }
        }
        let mut edge_ids = BTreeSet::new();
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(ParamsError::DuplicateEntity {
                    kind: "edge",
                    key: edge.id.clone(),
                });
            }
            for end in [&edge.from, &edge.to] {
                if !node_ids.contains(end.as_str()) {
                    return Err(ParamsError::DanglingEndpoint {
                        edge: edge.id.clone(),
                        node: end.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The committed base layer
    #[must_use]
    pub fn base_snapshot(&self) -> ParamSnapshot {
        let mut snap = ParamSnapshot::new();
        for edge in &self.edges {
            snap.edges.insert(edge.id.clone(), edge.params.clone());
        }
        for node in &self.nodes {
            if let Some(case) = &node.case {
                snap.nodes
                    .insert(node.id.clone(), NodeParams::with_variants(case.weights()));
            }
        }
        snap.pruned()
    }

    /// Node by id
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Node by uuid
    #[must_use]
    pub fn node_by_uuid(&self, uuid: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.uuid == uuid)
    }

    /// All nodes carrying `id` (more than one means ambiguity)
    #[must_use]
    pub fn nodes_by_id(&self, id: &str) -> Vec<&GraphNode> {
        self.nodes.iter().filter(|n| n.id == id).collect()
    }

    /// Nodes whose case definition uses `case_id`
    #[must_use]
    pub fn nodes_by_case_id(&self, case_id: &str) -> Vec<&GraphNode> {
        self.nodes
            .iter()
            .filter(|n| n.case.as_ref().is_some_and(|c| c.case_id == case_id))
            .collect()
    }

    /// Edge by id
    #[must_use]
    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Edge by uuid
    #[must_use]
    pub fn edge_by_uuid(&self, uuid: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.uuid == uuid)
    }

    /// All edges carrying `id` (more than one means ambiguity)
    #[must_use]
    pub fn edges_by_id(&self, id: &str) -> Vec<&GraphEdge> {
        self.edges.iter().filter(|e| e.id == id).collect()
    }

    /// Edges from `from` to `to`; endpoints match node id or node uuid
    #[must_use]
    pub fn edges_between(&self, from: &str, to: &str) -> Vec<&GraphEdge> {
        let matches = |node_id: &str, reference: &str| {
            node_id == reference || self.node(node_id).is_some_and(|n| n.uuid == reference)
        };
        self.edges
            .iter()
            .filter(|e| matches(&e.from, from) && matches(&e.to, to))
            .collect()
    }

    /// Edges entering node `id`
    pub fn incoming(&self, id: &str) -> impl Iterator<Item = &GraphEdge> {
        let id = id.to_string();
        self.edges.iter().filter(move |e| e.to == id)
    }

    /// Case id of the node with the given id, if it is a case node
    #[must_use]
    pub fn case_id_of(&self, node_id: &str) -> Option<String> {
        self.node(node_id)?.case.as_ref().map(|c| c.case_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Moments;

    fn node(id: &str) -> GraphNode {
        GraphNode {
            uuid: format!("uuid-{id}"),
            id: id.into(),
            case: None,
        }
    }

    fn edge(id: &str, from: &str, to: &str, p: f64) -> GraphEdge {
        GraphEdge {
            uuid: format!("uuid-{id}"),
            id: id.into(),
            from: from.into(),
            to: to.into(),
            params: EdgeParams {
                p: Moments::mean_only(p),
                ..EdgeParams::default()
            },
            connections: EdgeConnections::default(),
        }
    }

    fn sample() -> FlowGraph {
        let mut gate = node("gate");
        gate.case = Some(CaseNode {
            case_id: "exp".into(),
            variants: vec![
                CaseVariant {
                    name: "control".into(),
                    weight: 0.5,
                },
                CaseVariant {
                    name: "treatment".into(),
                    weight: 0.5,
                },
            ],
            connection: None,
        });
        FlowGraph {
            nodes: vec![node("a"), node("b"), gate],
            edges: vec![edge("e1", "a", "b", 0.4), edge("e2", "a", "b", 0.6)],
            base_dsl: None,
        }
    }

    #[test]
    fn base_snapshot_contains_edges_and_cases() {
        let snap = sample().base_snapshot();
        assert_eq!(snap.edges["e1"].p.mean.value(), Some(0.4));
        assert_eq!(snap.nodes["gate"].case.variants.get().unwrap()["treatment"], 0.5);
        assert!(!snap.nodes.contains_key("a"));
    }

    #[test]
    fn parallel_edges_share_endpoints() {
        let g = sample();
        assert_eq!(g.edges_between("a", "b").len(), 2);
        assert_eq!(g.edges_between("uuid-a", "b").len(), 2);
        assert!(g.edges_between("b", "a").is_empty());
    }

    #[test]
    fn validate_catches_dangling_endpoint() {
        let mut g = sample();
        g.edges.push(edge("e3", "a", "missing", 0.1));
        assert!(matches!(
            g.validate(),
            Err(ParamsError::DanglingEndpoint { .. })
        ));
    }

    #[test]
    fn validate_catches_duplicate_uuid() {
        let mut g = sample();
        g.nodes.push(node("a"));
        assert!(matches!(g.validate(), Err(ParamsError::DuplicateEntity { .. })));
    }

    #[test]
    fn cached_slice_coverage() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let conn = Connection::new("amplitude").with_cached(CachedSlice {
            window_from: d("2025-01-01"),
            window_to: d("2025-01-31"),
            slice: String::new(),
            mean: 0.3,
            stdev: None,
            n: Some(100),
            k: Some(30),
            variants: None,
        });
        assert!(conn.covering("", d("2025-01-05"), d("2025-01-20")).is_some());
        assert!(conn.covering("", d("2024-12-31"), d("2025-01-20")).is_none());
        assert!(conn
            .covering("context(channel:google)", d("2025-01-05"), d("2025-01-20"))
            .is_none());
    }
}
