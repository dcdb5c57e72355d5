//! Live regeneration orchestrator
//!
//! Drives one live scenario through
//! `Idle -> Inheriting -> CacheChecking -> (Fetching) -> Applying -> Idle`.
//!
//! - Inheritance is sequential over the stack and pure
//! - Fetches for one scenario fan out with a bounded concurrency limit
//! - Applying is local and always runs to completion once entered
//!
//! Regenerating every live scenario plans them all first (the sequential
//! inheritance pass), then fetches and applies them concurrently. Each
//! (item, effective fetch query) pair is fetched at most once per pass.
//!
//! An item whose fetch fails keeps the value the scenario already held for
//! it; only successfully refreshed items change.

use crate::cache::{CacheNeedEvaluator, FetchItem};
use crate::cancel::CancelSignal;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{FetchError, Result, ScenarioError};
use crate::fetch::{FetchClient, FetchedValue};
use crate::inherit::{inherit, EffectiveDsl};
use crate::scenario::ScenarioId;
use crate::stack::{ScenarioStack, SharedStack};
use crate::state::{RegenState, StateTrace};
use crate::what_if::apply_what_if;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use strata_composition::diff;
use strata_dsl::ConstraintSet;
use strata_params::{
    EntityKind, Field, FlowGraph, Moments, ParamSnapshot, CONDITIONAL_SLOT, PROBABILITY_SLOT,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// How a regeneration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenStatus {
    /// Every needed item was fetched
    Succeeded,
    /// Some fetches failed; those items kept their base values
    PartiallyFailed,
}

/// A fetch that did not succeed
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    /// Item that failed
    pub item: FetchItem,
    /// Why
    pub error: FetchError,
}

/// Result of regenerating one scenario, ready to store
#[derive(Debug, Clone, PartialEq)]
pub struct RegenOutcome {
    /// Scenario regenerated
    pub scenario: ScenarioId,
    /// Overall status
    pub status: RegenStatus,
    /// New sparse params
    pub params: ParamSnapshot,
    /// Queries used
    pub effective: EffectiveDsl,
    /// Text of the full effective query
    pub effective_dsl: String,
    /// Items fetched successfully
    pub fetched: Vec<FetchItem>,
    /// Items whose fetch failed
    pub failures: Vec<ItemFailure>,
    /// Non-fatal problems (unknown cases, fail-open cache checks)
    pub diagnostics: Vec<String>,
    /// States visited, starting and ending at `Idle`
    pub states: Vec<RegenState>,
    /// Completion time
    pub finished_at: DateTime<Utc>,
}

/// Per-scenario results of a batch regeneration, in stack order
pub type BatchResults = Vec<(ScenarioId, Result<RegenOutcome>)>;

type FetchKey = (String, FetchItem);
type FetchCell = Arc<OnceCell<std::result::Result<FetchedValue, FetchError>>>;

/// One fetch per (query, item) within a pass
#[derive(Default)]
struct FetchMemo {
    cells: Mutex<HashMap<FetchKey, FetchCell>>,
}

impl FetchMemo {
    async fn fetch(
        &self,
        client: &dyn FetchClient,
        item: &FetchItem,
        dsl: &ConstraintSet,
    ) -> std::result::Result<FetchedValue, FetchError> {
        let cell = self
            .cells
            .lock()
            .entry((dsl.to_string(), item.clone()))
            .or_default()
            .clone();
        cell.get_or_init(|| client.fetch(item, dsl)).await.clone()
    }
}

/// A scenario with its inheritance resolved
struct Plan {
    id: ScenarioId,
    dsl: EffectiveDsl,
    prior: ParamSnapshot,
    trace: StateTrace,
}

/// Regenerates live scenarios against a fetch collaborator
pub struct Orchestrator {
    client: Arc<dyn FetchClient>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    evaluator: CacheNeedEvaluator,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator on the wall clock
    #[must_use]
    pub fn new(client: Arc<dyn FetchClient>, config: EngineConfig) -> Self {
        Self {
            client,
            clock: Arc::new(SystemClock),
            evaluator: CacheNeedEvaluator::new(&config),
            config,
        }
    }

    /// With a different time source
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Regenerate one live scenario
    ///
    /// The stack is read, never written; store the outcome with
    /// [`ScenarioStack::apply_regeneration`].
    ///
    /// # Errors
    /// Returns error for an unknown or static scenario, a malformed query,
    /// or cancellation before applying began. Fetch failures are not
    /// errors; see [`RegenStatus::PartiallyFailed`].
    pub async fn regenerate(
        &self,
        graph: &FlowGraph,
        stack: &ScenarioStack,
        id: ScenarioId,
        cancel: &CancelSignal,
    ) -> Result<RegenOutcome> {
        checkpoint(id, RegenState::Idle, cancel)?;
        let plan = self.plan(stack, id)?;
        self.run(plan, graph, &FetchMemo::default(), cancel).await
    }

    /// Regenerate every live scenario
    ///
    /// One scenario's failure never affects another's result.
    pub async fn regenerate_all(
        &self,
        graph: &FlowGraph,
        stack: &ScenarioStack,
        cancel: &CancelSignal,
    ) -> BatchResults {
        let plans: Vec<_> = stack
            .live_ids()
            .into_iter()
            .map(|id| (id, self.plan(stack, id)))
            .collect();
        info!(scenarios = plans.len(), "regenerating live scenarios");

        let memo = FetchMemo::default();
        let runs = plans.into_iter().map(|(id, plan)| {
            let memo = &memo;
            async move {
                let result = match plan {
                    Ok(plan) => self.run(plan, graph, memo, cancel).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = &result {
                    warn!(scenario = %id, error = %e, "regeneration did not complete");
                }
                (id, result)
            }
        });
        join_all(runs).await
    }

    /// Regenerate one scenario of a shared stack and store the outcome
    ///
    /// # Errors
    /// As [`Self::regenerate`], plus the scenario having been deleted while
    /// the regeneration was in flight
    pub async fn regenerate_shared(
        &self,
        shared: &SharedStack,
        graph: &FlowGraph,
        id: ScenarioId,
        cancel: &CancelSignal,
    ) -> Result<RegenOutcome> {
        let stack = shared.read().clone();
        let outcome = self.regenerate(graph, &stack, id, cancel).await?;
        shared.write().apply_regeneration(&outcome)?;
        Ok(outcome)
    }

    /// Replace the base query, then regenerate and store every live scenario
    ///
    /// # Errors
    /// Returns error if `dsl` does not parse; nothing changes in that case
    pub async fn put_to_base(
        &self,
        shared: &SharedStack,
        graph: &FlowGraph,
        dsl: &str,
        cancel: &CancelSignal,
    ) -> Result<BatchResults> {
        let stack = {
            let mut guard = shared.write();
            guard.set_base_dsl(Some(dsl.to_string()))?;
            guard.clone()
        };
        info!(base = dsl, "base query replaced");

        let results = self.regenerate_all(graph, &stack, cancel).await;

        let mut guard = shared.write();
        for (id, result) in &results {
            if let Ok(outcome) = result {
                if let Err(e) = guard.apply_regeneration(outcome) {
                    warn!(scenario = %id, error = %e, "outcome discarded");
                }
            }
        }
        Ok(results)
    }

    fn plan(&self, stack: &ScenarioStack, id: ScenarioId) -> Result<Plan> {
        let index = stack.index_of(id)?;
        let scenario = &stack.scenarios()[index];
        if !scenario.is_live() {
            return Err(ScenarioError::NotLive(id));
        }
        let mut trace = StateTrace::new();
        trace.advance(RegenState::Inheriting)?;
        let dsl = inherit(stack.base_dsl.as_deref(), stack.scenarios(), index)?;
        debug!(scenario = %id, fetch = %dsl.fetch, what_if = %dsl.what_if, "inherited");
        Ok(Plan {
            id,
            dsl,
            prior: scenario.params.clone(),
            trace,
        })
    }

    async fn run(
        &self,
        plan: Plan,
        graph: &FlowGraph,
        memo: &FetchMemo,
        cancel: &CancelSignal,
    ) -> Result<RegenOutcome> {
        let Plan {
            id,
            dsl,
            prior,
            mut trace,
        } = plan;
        info!(scenario = %id, dsl = %dsl, "regeneration started");

        checkpoint(id, trace.current(), cancel)?;
        trace.advance(RegenState::CacheChecking)?;
        let today = self.clock.today();
        let mut diagnostics = Vec::new();
        let windowed = self.evaluator.windowed(&dsl.fetch).and_then(|fetch| {
            let window = self.evaluator.resolve_window(&fetch, today)?;
            Ok((fetch, window))
        });
        let (fetch_dsl, window) = match windowed {
            Ok((fetch, w)) => (fetch, Some(w)),
            Err(e) => {
                warn!(scenario = %id, error = %e, "window unresolved, fetching everything");
                diagnostics.push(e.to_string());
                (dsl.fetch.clone(), None)
            }
        };
        let slice = fetch_dsl.context_slice();
        let connected = FetchItem::connected(graph);
        let needed: BTreeSet<FetchItem> = connected
            .iter()
            .filter(|item| match (window, item.connection(graph)) {
                (Some(w), Some(c)) => c.covering(&slice, w.from, w.to).is_none(),
                (None, Some(_)) => true,
                (_, None) => false,
            })
            .cloned()
            .collect();
        debug!(scenario = %id, connected = connected.len(), needed = needed.len(), "cache checked");

        let mut fetched = BTreeMap::new();
        let mut failures = Vec::new();
        if !needed.is_empty() {
            checkpoint(id, trace.current(), cancel)?;
            trace.advance(RegenState::Fetching)?;
            info!(scenario = %id, items = needed.len(), "fetching");
            let fetch_dsl = &fetch_dsl;
            let client = self.client.as_ref();
            let results: Vec<_> = stream::iter(needed)
                .map(|item| async move {
                    let result = memo.fetch(client, &item, fetch_dsl).await;
                    (item, result)
                })
                .buffer_unordered(self.config.max_concurrent_fetches.max(1))
                .collect()
                .await;
            for (item, result) in results {
                match result {
                    Ok(value) => {
                        fetched.insert(item, value);
                    }
                    Err(error) => {
                        warn!(scenario = %id, item = %item, error = %error, "fetch failed");
                        failures.push(ItemFailure { item, error });
                    }
                }
            }
        }

        checkpoint(id, trace.current(), cancel)?;
        trace.advance(RegenState::Applying)?;
        let base = graph.base_snapshot();
        let mut raw = base.clone();
        for item in &connected {
            let value = fetched.get(item).cloned().or_else(|| {
                let w = window?;
                item.connection(graph)?
                    .covering(&slice, w.from, w.to)
                    .map(FetchedValue::from)
            });
            if let Some(value) = value {
                write_value(&mut raw, item, &value);
            }
        }
        let baked = apply_what_if(raw, graph, &dsl.what_if);
        diagnostics.extend(baked.diagnostics);
        let mut params =
            diff(&base, &baked.snapshot, self.config.capture_mode, self.config.epsilon)?;
        for failure in &failures {
            keep_prior(&mut params, &prior, &failure.item);
        }
        params.prune();
        trace.advance(RegenState::Idle)?;

        let status = if failures.is_empty() {
            RegenStatus::Succeeded
        } else {
            RegenStatus::PartiallyFailed
        };
        info!(
            scenario = %id,
            status = ?status,
            fetched = fetched.len(),
            failed = failures.len(),
            "regeneration finished"
        );
        failures.sort_by(|a: &ItemFailure, b: &ItemFailure| a.item.cmp(&b.item));
        Ok(RegenOutcome {
            scenario: id,
            status,
            params,
            effective_dsl: dsl.to_string(),
            effective: dsl,
            fetched: fetched.into_keys().collect(),
            failures,
            diagnostics,
            states: trace.into_states(),
            finished_at: self.clock.now(),
        })
    }
}

fn checkpoint(id: ScenarioId, state: RegenState, cancel: &CancelSignal) -> Result<()> {
    if cancel.is_cancelled() && state.is_cancellable() {
        info!(scenario = %id, state = %state, "regeneration cancelled");
        return Err(ScenarioError::Cancelled { state });
    }
    Ok(())
}

/// Write fetched or cached raw values for one item into a snapshot
fn write_value(snapshot: &mut ParamSnapshot, item: &FetchItem, value: &FetchedValue) {
    match item.kind {
        EntityKind::Node => {
            if let Some(variants) = &value.variants {
                snapshot.node_mut(&item.entity_id).case.variants = Field::Set(variants.clone());
            }
        }
        EntityKind::Edge => {
            let edge = snapshot.edge_mut(&item.entity_id);
            let moments = match (item.slot.as_str(), &item.condition) {
                (PROBABILITY_SLOT, None) => &mut edge.p,
                (CONDITIONAL_SLOT, Some(cond)) => {
                    edge.conditional_p.entry(cond.clone()).or_default()
                }
                (slot, _) => edge.costs.entry(slot.to_string()).or_default(),
            };
            moments.mean = Field::Set(value.mean);
            if let Some(stdev) = value.stdev {
                moments.stdev = Field::Set(stdev);
            }
        }
    }
}

/// Put back whatever `prior` held for one item's slot
fn keep_prior(params: &mut ParamSnapshot, prior: &ParamSnapshot, item: &FetchItem) {
    match item.kind {
        EntityKind::Node => {
            let held = prior
                .nodes
                .get(&item.entity_id)
                .map(|n| n.case.variants.clone())
                .unwrap_or_default();
            params.node_mut(&item.entity_id).case.variants = held;
        }
        EntityKind::Edge => {
            let held = prior.edges.get(&item.entity_id);
            let edge = params.edge_mut(&item.entity_id);
            match (item.slot.as_str(), &item.condition) {
                (PROBABILITY_SLOT, None) => {
                    edge.p = held.map(|e| e.p.clone()).unwrap_or_default();
                }
                (CONDITIONAL_SLOT, Some(cond)) => restore(
                    &mut edge.conditional_p,
                    cond,
                    held.and_then(|e| e.conditional_p.get(cond)),
                ),
                (slot, _) => restore(&mut edge.costs, slot, held.and_then(|e| e.costs.get(slot))),
            }
        }
    }
}

fn restore(slots: &mut BTreeMap<String, Moments>, key: &str, held: Option<&Moments>) {
    match held {
        Some(m) => {
            slots.insert(key.to_string(), m.clone());
        }
        None => {
            slots.remove(key);
        }
    }
}
