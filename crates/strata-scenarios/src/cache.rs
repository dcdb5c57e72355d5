//! Cache-need evaluation
//!
//! Every externally connected parameter slot in the graph is a candidate
//! fetch item. An item needs fetching when none of its cached slices covers
//! the query's resolved window for the query's exact context slice. Items
//! without a connection never need anything.

use crate::config::EngineConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use strata_dsl::{parse, ConstraintSet, DslError, ResolvedWindow, Window};
use strata_params::{
    Connection, EntityKind, FlowGraph, CASE_SEGMENT, CONDITIONAL_SLOT, PROBABILITY_SLOT,
};
use tracing::{debug, warn};

/// One atomic unit of externally fetched data
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FetchItem {
    /// Entity kind
    pub kind: EntityKind,
    /// Entity id
    pub entity_id: String,
    /// `p`, a cost slot name, `conditional_p`, or `case`
    pub slot: String,
    /// Condition key for conditional-probability items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl FetchItem {
    /// Edge probability
    #[must_use]
    pub fn probability(edge_id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Edge,
            entity_id: edge_id.into(),
            slot: PROBABILITY_SLOT.to_string(),
            condition: None,
        }
    }

    /// Named cost slot on an edge
    #[must_use]
    pub fn cost(edge_id: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Edge,
            entity_id: edge_id.into(),
            slot: slot.into(),
            condition: None,
        }
    }

    /// Conditional-probability entry on an edge
    #[must_use]
    pub fn conditional(edge_id: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Edge,
            entity_id: edge_id.into(),
            slot: CONDITIONAL_SLOT.to_string(),
            condition: Some(condition.into()),
        }
    }

    /// Variant weights of a case node
    #[must_use]
    pub fn case_weights(node_id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Node,
            entity_id: node_id.into(),
            slot: CASE_SEGMENT.to_string(),
            condition: None,
        }
    }

    /// Every connected item in `graph`, edges first, in graph order
    #[must_use]
    pub fn connected(graph: &FlowGraph) -> Vec<Self> {
        let mut items = Vec::new();
        for edge in &graph.edges {
            let c = &edge.connections;
            if c.p.is_some() {
                items.push(Self::probability(&edge.id));
            }
            items.extend(c.costs.keys().map(|slot| Self::cost(&edge.id, slot)));
            items.extend(
                c.conditional_p
                    .keys()
                    .map(|cond| Self::conditional(&edge.id, cond)),
            );
        }
        for node in &graph.nodes {
            if node.case.as_ref().is_some_and(|c| c.connection.is_some()) {
                items.push(Self::case_weights(&node.id));
            }
        }
        items
    }

    /// The connection this item reads from
    #[must_use]
    pub fn connection<'g>(&self, graph: &'g FlowGraph) -> Option<&'g Connection> {
        match self.kind {
            EntityKind::Node => graph.node(&self.entity_id)?.case.as_ref()?.connection.as_ref(),
            EntityKind::Edge => {
                let c = &graph.edge(&self.entity_id)?.connections;
                match (self.slot.as_str(), &self.condition) {
                    (PROBABILITY_SLOT, None) => c.p.as_ref(),
                    (CONDITIONAL_SLOT, Some(cond)) => c.conditional_p.get(cond),
                    (slot, None) => c.costs.get(slot),
                    _ => None,
                }
            }
        }
    }
}

impl Display for FetchItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.kind, self.entity_id, self.slot)?;
        if let Some(cond) = &self.condition {
            write!(f, ".{cond}")?;
        }
        Ok(())
    }
}

/// Cache-need verdict for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheNeed {
    /// Query text this verdict is for
    pub dsl: String,
    /// Whether anything must be fetched
    pub needs_fetch: bool,
    /// Items lacking covering cache data
    pub items: Vec<FetchItem>,
    /// Why the evaluator failed open, if it did
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

/// Decides which connected items lack cached coverage for a query
#[derive(Debug, Clone)]
pub struct CacheNeedEvaluator {
    default_window: String,
}

impl CacheNeedEvaluator {
    /// Evaluator using the config's fallback window
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            default_window: config.default_window.clone(),
        }
    }

    /// Evaluate query text
    ///
    /// Never fails: malformed text or an unresolvable window yields
    /// `needs_fetch = true`, no items, and a diagnostic.
    #[must_use]
    pub fn needs_fetch(&self, dsl: &str, graph: &FlowGraph, today: NaiveDate) -> CacheNeed {
        let evaluated = parse(dsl).and_then(|set| self.missing_items(&set, graph, today));
        match evaluated {
            Ok(items) => {
                debug!(dsl, missing = items.len(), "cache check");
                CacheNeed {
                    dsl: dsl.to_string(),
                    needs_fetch: !items.is_empty(),
                    items,
                    diagnostics: Vec::new(),
                }
            }
            Err(e) => {
                let diagnostic = e.to_string();
                warn!(dsl, error = %diagnostic, "cache check failed open");
                CacheNeed {
                    dsl: dsl.to_string(),
                    needs_fetch: true,
                    items: Vec::new(),
                    diagnostics: vec![diagnostic],
                }
            }
        }
    }

    /// Evaluate several queries, one verdict per input in input order
    #[must_use]
    pub fn check_multiple<S: AsRef<str>>(
        &self,
        dsls: &[S],
        graph: &FlowGraph,
        today: NaiveDate,
    ) -> Vec<CacheNeed> {
        dsls.iter()
            .map(|d| self.needs_fetch(d.as_ref(), graph, today))
            .collect()
    }

    /// The window a query's fetch terms resolve to
    ///
    /// # Errors
    /// Returns error if the fallback window is malformed or the window
    /// cannot be resolved against `today`
    pub fn resolve_window(
        &self,
        dsl: &ConstraintSet,
        today: NaiveDate,
    ) -> Result<ResolvedWindow, DslError> {
        let window = match dsl.window {
            Some(w) => w,
            None => self.fallback_window()?,
        };
        window.resolve(today)
    }

    /// `dsl` with the fallback window filled in when it has none
    ///
    /// This is the query both coverage and fetching are judged against.
    ///
    /// # Errors
    /// Returns error if `dsl` has no window and the fallback is malformed
    pub fn windowed(&self, dsl: &ConstraintSet) -> Result<ConstraintSet, DslError> {
        let mut out = dsl.clone();
        if out.window.is_none() {
            out.window = Some(self.fallback_window()?);
        }
        Ok(out)
    }

    fn fallback_window(&self) -> Result<Window, DslError> {
        parse(&self.default_window)?
            .window
            .ok_or_else(|| DslError::invalid_argument("window", "fallback window is empty"))
    }

    /// Connected items with no covering cached slice
    ///
    /// # Errors
    /// Returns error if the window cannot be resolved
    pub fn missing_items(
        &self,
        dsl: &ConstraintSet,
        graph: &FlowGraph,
        today: NaiveDate,
    ) -> Result<Vec<FetchItem>, DslError> {
        let window = self.resolve_window(dsl, today)?;
        let slice = dsl.context_slice();
        Ok(FetchItem::connected(graph)
            .into_iter()
            .filter(|item| {
                item.connection(graph)
                    .is_some_and(|c| c.covering(&slice, window.from, window.to).is_none())
            })
            .collect())
    }
}
