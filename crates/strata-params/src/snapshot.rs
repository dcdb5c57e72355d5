//! Parameter snapshots
//!
//! A [`ParamSnapshot`] is a value tree `entity kind -> entity id -> slot ->
//! field`. The same type serves as a full base layer and as a sparse overlay;
//! in an overlay every [`Field`] left [`Field::Absent`] inherits from below.

use crate::error::{ParamsError, Result};
use crate::field::Field;
use crate::hash::SnapshotHash;
use crate::path::{ParamLeaf, Stat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Variant name -> weight
pub type VariantWeights = BTreeMap<String, f64>;

/// Kind of entity a parameter lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Graph edge
    Edge,
    /// Graph node
    Node,
}

impl EntityKind {
    /// Address prefix (`e` / `n`)
    #[inline]
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Edge => "e",
            Self::Node => "n",
        }
    }

    /// Human label
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Edge => "edge",
            Self::Node => "node",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Mean/stdev pair
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Moments {
    /// Mean
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub mean: Field<f64>,

    /// Standard deviation
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub stdev: Field<f64>,
}

impl Moments {
    /// Both fields set
    #[inline]
    #[must_use]
    pub fn new(mean: f64, stdev: f64) -> Self {
        Self {
            mean: Field::Set(mean),
            stdev: Field::Set(stdev),
        }
    }

    /// Only the mean set
    #[inline]
    #[must_use]
    pub fn mean_only(mean: f64) -> Self {
        Self {
            mean: Field::Set(mean),
            stdev: Field::Absent,
        }
    }

    /// Neither field set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mean.is_absent() && self.stdev.is_absent()
    }

    /// Field for a statistic
    #[inline]
    #[must_use]
    pub fn stat(&self, stat: Stat) -> &Field<f64> {
        match stat {
            Stat::Mean => &self.mean,
            Stat::Stdev => &self.stdev,
        }
    }

    /// Mutable field for a statistic
    #[inline]
    pub fn stat_mut(&mut self, stat: Stat) -> &mut Field<f64> {
        match stat {
            Stat::Mean => &mut self.mean,
            Stat::Stdev => &mut self.stdev,
        }
    }
}

/// Parameter slots of one edge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeParams {
    /// Transition probability
    #[serde(default, skip_serializing_if = "Moments::is_empty")]
    pub p: Moments,

    /// Named cost slots
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub costs: BTreeMap<String, Moments>,

    /// Conditional probabilities keyed by condition text
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditional_p: BTreeMap<String, Moments>,
}

impl EdgeParams {
    /// No slot carries a value
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.p.is_empty()
            && self.costs.values().all(Moments::is_empty)
            && self.conditional_p.values().all(Moments::is_empty)
    }

    /// Drop empty cost and conditional entries
    pub fn prune(&mut self) {
        self.costs.retain(|_, m| !m.is_empty());
        self.conditional_p.retain(|_, m| !m.is_empty());
    }
}

/// Case-node slot: variant weights, replaced as one map
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaseParams {
    /// Variant weights
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub variants: Field<VariantWeights>,
}

/// Parameter slots of one node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeParams {
    /// Case slot
    #[serde(default, skip_serializing_if = "NodeParams::case_is_empty")]
    pub case: CaseParams,
}

impl NodeParams {
    /// Node params carrying the given variant weights
    #[must_use]
    pub fn with_variants(variants: VariantWeights) -> Self {
        Self {
            case: CaseParams {
                variants: Field::Set(variants),
            },
        }
    }

    /// No slot carries a value
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.case.variants.is_absent()
    }

    fn case_is_empty(case: &CaseParams) -> bool {
        case.variants.is_absent()
    }
}

/// Parameter values for a whole graph, or a sparse overlay of them
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParamSnapshot {
    /// Edge parameters keyed by edge id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub edges: BTreeMap<String, EdgeParams>,

    /// Node parameters keyed by node id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<String, NodeParams>,
}

impl ParamSnapshot {
    /// Create an empty snapshot
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Edge entry, created if missing
    pub fn edge_mut(&mut self, id: &str) -> &mut EdgeParams {
        self.edges.entry(id.to_string()).or_default()
    }

    /// Node entry, created if missing
    pub fn node_mut(&mut self, id: &str) -> &mut NodeParams {
        self.nodes.entry(id.to_string()).or_default()
    }

    /// No entity carries a value
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.values().all(EdgeParams::is_empty) && self.nodes.values().all(NodeParams::is_empty)
    }

    /// Number of entities present
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.edges.len() + self.nodes.len()
    }

    /// Remove empty intermediate containers
    pub fn prune(&mut self) {
        for params in self.edges.values_mut() {
            params.prune();
        }
        self.edges.retain(|_, e| !e.is_empty());
        self.nodes.retain(|_, n| !n.is_empty());
    }

    /// Pruned copy
    #[must_use]
    pub fn pruned(mut self) -> Self {
        self.prune();
        self
    }

    /// Fingerprint of the canonical encoding
    ///
    /// # Errors
    /// Returns error if the snapshot cannot be serialized
    pub fn fingerprint(&self) -> Result<SnapshotHash> {
        SnapshotHash::of(self)
    }

    /// Read one numeric leaf of an entity
    #[must_use]
    pub fn get(&self, entity_id: &str, leaf: &ParamLeaf) -> Option<f64> {
        match leaf {
            ParamLeaf::Probability(stat) => self.edges.get(entity_id)?.p.stat(*stat).value(),
            ParamLeaf::Cost { slot, stat } => {
                self.edges.get(entity_id)?.costs.get(slot)?.stat(*stat).value()
            }
            ParamLeaf::Conditional { condition, stat } => self
                .edges
                .get(entity_id)?
                .conditional_p
                .get(condition)?
                .stat(*stat)
                .value(),
            ParamLeaf::CaseWeight { variant, .. } => self
                .nodes
                .get(entity_id)?
                .case
                .variants
                .get()?
                .get(variant)
                .copied(),
        }
    }

    /// Write one numeric leaf of an entity
    ///
    /// Writing a case weight inserts into the node's variant map, creating
    /// the map if the node has none yet.
    pub fn set(&mut self, entity_id: &str, leaf: &ParamLeaf, value: f64) {
        match leaf {
            ParamLeaf::Probability(stat) => {
                self.edge_mut(entity_id).p.stat_mut(*stat).set(value);
            }
            ParamLeaf::Cost { slot, stat } => {
                self.edge_mut(entity_id)
                    .costs
                    .entry(slot.clone())
                    .or_default()
                    .stat_mut(*stat)
                    .set(value);
            }
            ParamLeaf::Conditional { condition, stat } => {
                self.edge_mut(entity_id)
                    .conditional_p
                    .entry(condition.clone())
                    .or_default()
                    .stat_mut(*stat)
                    .set(value);
            }
            ParamLeaf::CaseWeight { variant, .. } => {
                let variants = &mut self.node_mut(entity_id).case.variants;
                if variants.is_absent() {
                    variants.set(VariantWeights::new());
                }
                if let Some(map) = variants.get_mut() {
                    map.insert(variant.clone(), value);
                }
            }
        }
    }

    /// Write a leaf after checking it belongs on `kind`
    ///
    /// # Errors
    /// Returns error if the leaf addresses the other entity kind
    pub fn set_checked(
        &mut self,
        kind: EntityKind,
        entity_id: &str,
        leaf: &ParamLeaf,
        value: f64,
    ) -> Result<()> {
        if leaf.entity_kind() != kind {
            return Err(ParamsError::WrongEntityKind {
                leaf: leaf.to_string(),
                kind: kind.label(),
            });
        }
        self.set(entity_id, leaf, value);
        Ok(())
    }

    /// Every numeric leaf present, in deterministic order
    ///
    /// Case leaves use `case_id_of` to recover the node's case id.
    #[must_use]
    pub fn leaves<F>(&self, case_id_of: F) -> Vec<(EntityKind, String, ParamLeaf, f64)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = Vec::new();
        for (id, edge) in &self.edges {
            for stat in [Stat::Mean, Stat::Stdev] {
                if let Some(v) = edge.p.stat(stat).value() {
                    out.push((EntityKind::Edge, id.clone(), ParamLeaf::Probability(stat), v));
                }
            }
            for (slot, m) in &edge.costs {
                for stat in [Stat::Mean, Stat::Stdev] {
                    if let Some(v) = m.stat(stat).value() {
                        let leaf = ParamLeaf::Cost {
                            slot: slot.clone(),
                            stat,
                        };
                        out.push((EntityKind::Edge, id.clone(), leaf, v));
                    }
                }
            }
            for (condition, m) in &edge.conditional_p {
                for stat in [Stat::Mean, Stat::Stdev] {
                    if let Some(v) = m.stat(stat).value() {
                        let leaf = ParamLeaf::Conditional {
                            condition: condition.clone(),
                            stat,
                        };
                        out.push((EntityKind::Edge, id.clone(), leaf, v));
                    }
                }
            }
        }
        for (id, node) in &self.nodes {
            let Some(variants) = node.case.variants.get() else {
                continue;
            };
            let case_id = case_id_of(id).unwrap_or_else(|| id.clone());
            for (variant, weight) in variants {
                let leaf = ParamLeaf::CaseWeight {
                    case_id: case_id.clone(),
                    variant: variant.clone(),
                };
                out.push((EntityKind::Node, id.clone(), leaf, *weight));
            }
        }
        out
    }
}
