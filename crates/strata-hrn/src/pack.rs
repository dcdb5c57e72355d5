//! Param packs: ordered `address -> value` maps
//!
//! [`apply_pack`] turns a pack into a sparse overlay, skipping (never
//! aborting on) entries that cannot be placed. [`flatten`] exports a snapshot
//! back into a pack using `e.<id>` / `n.<id>` addresses.

use crate::address::Address;
use crate::validate::{locate, numeric, IssueKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_params::{EntityKind, FlowGraph, ParamLeaf, ParamSnapshot};
use tracing::{debug, warn};

/// Ordered map of address text to value; later entries win
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamPack(IndexMap<String, Value>);

impl ParamPack {
    /// Create an empty pack
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a pack from a JSON object
    ///
    /// # Errors
    /// Returns error if the text is not a JSON object
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Insert an entry, returning the previous value for that address
    pub fn insert(&mut self, address: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(address.into(), value.into())
    }

    /// Value for an address
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&Value> {
        self.0.get(address)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if pack is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for ParamPack {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Entry that made it into the overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedEntry {
    /// Address as written
    pub address: String,
    /// Entity kind
    pub kind: EntityKind,
    /// Entity id written to
    pub entity_id: String,
    /// Value written
    pub value: f64,
}

/// Entry left out of the overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Address as written
    pub address: String,
    /// Why it was skipped
    pub reason: IssueKind,
}

/// Result of applying a pack
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackApplication {
    /// Sparse overlay holding every applied entry
    pub diff: ParamSnapshot,
    /// Applied entries in pack order
    pub applied: Vec<AppliedEntry>,
    /// Skipped entries in pack order
    pub skipped: Vec<SkippedEntry>,
}

/// Apply a pack as a sparse overlay
///
/// Writing one variant weight carries the node's other committed weights
/// along, because variant maps are replaced as a whole when layers compose.
#[must_use]
pub fn apply_pack(graph: &FlowGraph, pack: &ParamPack) -> PackApplication {
    let mut out = PackApplication::default();

    for (text, value) in pack.iter() {
        let placed = Address::parse(text)
            .map_err(|e| IssueKind::Malformed {
                message: e.to_string(),
            })
            .and_then(|address| {
                let v = numeric(value)?;
                let id = locate(graph, &address)?;
                Ok((address, id, v))
            });

        let (address, id, v) = match placed {
            Ok(placed) => placed,
            Err(reason) => {
                warn!(address = %text, %reason, "skipping param pack entry");
                out.skipped.push(SkippedEntry {
                    address: text.clone(),
                    reason,
                });
                continue;
            }
        };

        if let ParamLeaf::CaseWeight { .. } = address.leaf() {
            seed_variants(graph, &mut out.diff, &id);
        }
        out.diff.set(&id, address.leaf(), v);
        out.applied.push(AppliedEntry {
            address: text.clone(),
            kind: address.kind(),
            entity_id: id,
            value: v,
        });
    }

    debug!(
        applied = out.applied.len(),
        skipped = out.skipped.len(),
        "param pack applied"
    );
    out
}

fn seed_variants(graph: &FlowGraph, diff: &mut ParamSnapshot, node_id: &str) {
    let Some(case) = graph.node(node_id).and_then(|n| n.case.as_ref()) else {
        return;
    };
    let variants = &mut diff.node_mut(node_id).case.variants;
    if variants.is_absent() {
        variants.set(case.weights());
    }
}

/// Export every leaf of a snapshot as a pack
#[must_use]
pub fn flatten(snapshot: &ParamSnapshot, graph: &FlowGraph) -> ParamPack {
    snapshot
        .leaves(|id| graph.case_id_of(id))
        .into_iter()
        .map(|(kind, id, leaf, value)| {
            let address = Address::by_id(kind, id, leaf);
            (address.to_string(), Value::from(value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_entries_replace_earlier() {
        let mut pack = ParamPack::new();
        pack.insert("e.e1.p.mean", 0.1);
        assert_eq!(pack.insert("e.e1.p.mean", 0.2), Some(json!(0.1)));
        assert_eq!(pack.len(), 1);
        assert_eq!(pack.get("e.e1.p.mean"), Some(&json!(0.2)));
    }

    #[test]
    fn json_keeps_order() {
        let pack = ParamPack::from_json(r#"{"e.b.p.mean": 0.1, "e.a.p.mean": 0.2}"#).unwrap();
        let keys: Vec<_> = pack.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["e.b.p.mean", "e.a.p.mean"]);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let mut pack = ParamPack::new();
        pack.insert("not an address", 0.5);
        let out = apply_pack(&FlowGraph::default(), &pack);
        assert!(out.applied.is_empty());
        assert!(matches!(out.skipped[0].reason, IssueKind::Malformed { .. }));
        assert!(out.diff.is_empty());
    }
}
