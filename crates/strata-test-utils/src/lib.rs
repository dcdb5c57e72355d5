//! Testing utilities for the Strata workspace
//!
//! Shared fixture graphs and a scripted fetch collaborator.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use strata_dsl::ConstraintSet;
use strata_params::{
    CachedSlice, CaseNode, CaseVariant, Connection, EdgeParams, FlowGraph, GraphEdge, GraphNode,
    Moments,
};
use strata_scenarios::{FetchClient, FetchError, FetchItem, FetchedValue};

pub fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

pub fn node(id: &str) -> GraphNode {
    GraphNode {
        uuid: format!("u-{id}"),
        id: id.to_string(),
        case: None,
    }
}

pub fn case_node(id: &str, case_id: &str, variants: &[(&str, f64)]) -> GraphNode {
    GraphNode {
        case: Some(CaseNode {
            case_id: case_id.to_string(),
            variants: variants
                .iter()
                .map(|(name, weight)| CaseVariant {
                    name: (*name).to_string(),
                    weight: *weight,
                })
                .collect(),
            connection: None,
        }),
        ..node(id)
    }
}

pub fn edge(id: &str, from: &str, to: &str, p: f64) -> GraphEdge {
    GraphEdge {
        uuid: format!("u-{id}"),
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        params: EdgeParams {
            p: Moments::mean_only(p),
            ..EdgeParams::default()
        },
        connections: Default::default(),
    }
}

/// Checkout funnel with one experiment and one connected edge
///
/// - `e1` landing -> checkout: p 0.4±0.05, `cost_gbp` 1.5±0.2, connected,
///   cached uncontexted for January 2025 (mean 0.41)
/// - `e2` checkout -> done: p 0.6, `visited(promo)` 0.8
/// - `e3` landing -> promo, `e4` promo -> checkout, `e5` checkout -> abandon
/// - `checkout` carries case `experiment` (control 0.5 / treatment 0.5)
pub fn funnel_graph() -> FlowGraph {
    let mut e1 = edge("e1", "landing", "checkout", 0.4);
    e1.params.p = Moments::new(0.4, 0.05);
    e1.params.costs.insert("cost_gbp".into(), Moments::new(1.5, 0.2));
    e1.connections.p = Some(Connection::new("events").with_cached(CachedSlice {
        window_from: date("2025-01-01"),
        window_to: date("2025-01-31"),
        slice: String::new(),
        mean: 0.41,
        stdev: None,
        n: Some(1000),
        k: Some(410),
        variants: None,
    }));

    let mut e2 = edge("e2", "checkout", "done", 0.6);
    e2.params
        .conditional_p
        .insert("visited(promo)".into(), Moments::mean_only(0.8));

    FlowGraph {
        nodes: vec![
            node("landing"),
            node("promo"),
            case_node("checkout", "experiment", &[("control", 0.5), ("treatment", 0.5)]),
            node("done"),
            node("abandon"),
        ],
        edges: vec![
            e1,
            e2,
            edge("e3", "landing", "promo", 0.3),
            edge("e4", "promo", "checkout", 0.5),
            edge("e5", "checkout", "abandon", 0.4),
        ],
        base_dsl: Some("window(-30d:-1d)".into()),
    }
}

/// Two edges sharing both endpoints, so endpoint addressing is ambiguous
pub fn parallel_edges_graph() -> FlowGraph {
    FlowGraph {
        nodes: vec![node("a"), node("b")],
        edges: vec![edge("ab-main", "a", "b", 0.6), edge("ab-alt", "a", "b", 0.4)],
        base_dsl: None,
    }
}

/// Graph with a case node and no connections at all
pub fn experiment_graph() -> FlowGraph {
    FlowGraph {
        nodes: vec![
            node("start"),
            case_node("n1", "experiment", &[("control", 0.5), ("treatment", 0.5)]),
            node("end"),
        ],
        edges: vec![edge("s1", "start", "n1", 1.0), edge("s2", "n1", "end", 0.7)],
        base_dsl: None,
    }
}

/// One recorded fetch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub item: FetchItem,
    pub dsl: String,
}

/// Fetch collaborator answering from a script and recording every call
///
/// Unscripted items answer `FetchError::NoData`.
#[derive(Debug, Default)]
pub struct ScriptedFetch {
    values: Mutex<BTreeMap<String, FetchedValue>>,
    sliced: Mutex<BTreeMap<(String, String), FetchedValue>>,
    failing: Mutex<BTreeSet<(String, Option<String>)>>,
    calls: AtomicUsize,
    log: Mutex<Vec<FetchCall>>,
}

impl ScriptedFetch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `value` for every item on `entity_id`, any slice
    pub fn with_value(self, entity_id: &str, value: FetchedValue) -> Self {
        self.values.lock().insert(entity_id.to_string(), value);
        self
    }

    /// Answer `value` for `entity_id` only when the query's context slice
    /// is `slice`
    pub fn with_slice_value(self, entity_id: &str, slice: &str, value: FetchedValue) -> Self {
        self.sliced
            .lock()
            .insert((entity_id.to_string(), slice.to_string()), value);
        self
    }

    /// Fail every fetch on `entity_id`
    pub fn failing(self, entity_id: &str) -> Self {
        self.failing.lock().insert((entity_id.to_string(), None));
        self
    }

    /// Fail fetches on `entity_id` under context slice `slice`
    pub fn failing_for_slice(self, entity_id: &str, slice: &str) -> Self {
        self.failing
            .lock()
            .insert((entity_id.to_string(), Some(slice.to_string())));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, entity_id: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|c| c.item.entity_id == entity_id)
            .count()
    }

    pub fn log(&self) -> Vec<FetchCall> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl FetchClient for ScriptedFetch {
    async fn fetch(
        &self,
        item: &FetchItem,
        dsl: &ConstraintSet,
    ) -> Result<FetchedValue, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(FetchCall {
            item: item.clone(),
            dsl: dsl.to_string(),
        });
        tokio::task::yield_now().await;

        let slice = dsl.context_slice();
        let id = item.entity_id.clone();
        {
            let failing = self.failing.lock();
            if failing.contains(&(id.clone(), None)) || failing.contains(&(id.clone(), Some(slice.clone()))) {
                return Err(FetchError::Failed {
                    item: item.to_string(),
                    message: "scripted failure".into(),
                });
            }
        }
        if let Some(v) = self.sliced.lock().get(&(id.clone(), slice)) {
            return Ok(v.clone());
        }
        self.values
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| FetchError::NoData {
                item: item.to_string(),
            })
    }
}
