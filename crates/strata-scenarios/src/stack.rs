//! The ordered scenario stack
//!
//! Stack position is the only thing that decides precedence: index 0 sits
//! directly above the base, the last scenario sits directly below the
//! current layer.

use crate::config::EngineConfig;
use crate::error::{Result, ScenarioError};
use crate::orchestrator::RegenOutcome;
use crate::scenario::{CurrentLayer, DisplayMeta, Scenario, ScenarioId, ScenarioMeta};
use crate::what_if::apply_what_if;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strata_composition::{compose_onto, compose_visible, diff, CaptureMode};
use strata_dsl::parse;
use strata_params::{FlowGraph, ParamSnapshot};
use tracing::{debug, info};

/// Stack shared between editors and the orchestrator
///
/// Never hold the guard across an `.await`.
pub type SharedStack = Arc<RwLock<ScenarioStack>>;

/// How a new scenario gets its initial contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateKind {
    /// Full copy of the current effective view
    SnapshotAll,
    /// Only where the current view differs from the base
    SnapshotDifferences,
    /// Empty static overlay
    Blank,
    /// Live overlay driven by the given query text
    FromQuery(String),
}

/// Everything needed to compute the view a snapshot captures
#[derive(Debug, Clone, Copy)]
pub struct CreateContext<'a> {
    /// Graph providing the base layer
    pub graph: &'a FlowGraph,
    /// Unsaved edits and active what-if
    pub current: &'a CurrentLayer,
    /// Engine tunables
    pub config: &'a EngineConfig,
    /// Creation time
    pub now: DateTime<Utc>,
}

/// Base query plus ordered overlays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStack {
    /// Query every live scenario inherits from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dsl: Option<String>,
    #[serde(default)]
    scenarios: Vec<Scenario>,
}

impl ScenarioStack {
    /// Empty stack
    #[inline]
    #[must_use]
    pub fn new(base_dsl: Option<String>) -> Self {
        Self {
            base_dsl,
            scenarios: Vec::new(),
        }
    }

    /// Stack from existing scenarios, renumbered in the given order
    #[must_use]
    pub fn from_scenarios(base_dsl: Option<String>, scenarios: Vec<Scenario>) -> Self {
        let mut stack = Self {
            base_dsl,
            scenarios,
        };
        stack.renumber();
        stack
    }

    /// Parse a persisted stack, renumbering to match list order
    ///
    /// # Errors
    /// Returns error on malformed JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut stack: Self = serde_json::from_str(json)?;
        stack.renumber();
        Ok(stack)
    }

    /// Scenarios bottom to top
    #[inline]
    #[must_use]
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Number of scenarios
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// No scenarios
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Scenario by id
    #[must_use]
    pub fn get(&self, id: ScenarioId) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    /// Stack position of a scenario
    ///
    /// # Errors
    /// Returns error if no scenario has this id
    pub fn index_of(&self, id: ScenarioId) -> Result<usize> {
        self.scenarios
            .iter()
            .position(|s| s.id == id)
            .ok_or(ScenarioError::UnknownScenario(id))
    }

    /// Ids of live scenarios, bottom to top
    #[must_use]
    pub fn live_ids(&self) -> Vec<ScenarioId> {
        self.scenarios
            .iter()
            .filter(|s| s.is_live())
            .map(|s| s.id)
            .collect()
    }

    /// Create a scenario on top of the stack
    ///
    /// Snapshot kinds capture the current view (base, visible overlays and
    /// the current layer) relative to the base.
    ///
    /// # Errors
    /// Returns error if query text or the current layer's what-if does not
    /// parse, or the configured epsilon is invalid
    pub fn create(
        &mut self,
        name: impl Into<String>,
        kind: CreateKind,
        ctx: CreateContext<'_>,
    ) -> Result<ScenarioId> {
        let meta = ScenarioMeta::new(name, ctx.config.colour_for(self.scenarios.len()), ctx.now);
        let mut scenario = Scenario::new(meta);

        match &kind {
            CreateKind::Blank => {}
            CreateKind::FromQuery(text) => {
                parse(text).map_err(|source| ScenarioError::InvalidDsl {
                    scenario: scenario.id,
                    source,
                })?;
                scenario.meta.query_dsl = Some(text.clone());
            }
            CreateKind::SnapshotAll | CreateKind::SnapshotDifferences => {
                let mode = if kind == CreateKind::SnapshotAll {
                    CaptureMode::All
                } else {
                    CaptureMode::Differences
                };
                let base = ctx.graph.base_snapshot();
                let view = self.current_view(ctx.graph, ctx.current)?;
                scenario.params = diff(&base, &view, mode, ctx.config.epsilon)?;
            }
        }

        let id = scenario.id;
        scenario.order_index = self.scenarios.len();
        info!(scenario = %id, kind = ?kind, "scenario created");
        self.scenarios.push(scenario);
        Ok(id)
    }

    /// Move a scenario to `new_index`, shifting the others
    ///
    /// # Errors
    /// Returns error for an unknown id or out-of-range index
    pub fn reorder(&mut self, id: ScenarioId, new_index: usize) -> Result<()> {
        let from = self.index_of(id)?;
        if new_index >= self.scenarios.len() {
            return Err(ScenarioError::InvalidIndex {
                index: new_index,
                len: self.scenarios.len(),
            });
        }
        let scenario = self.scenarios.remove(from);
        self.scenarios.insert(new_index, scenario);
        self.renumber();
        debug!(scenario = %id, from, to = new_index, "scenario moved");
        Ok(())
    }

    /// Remove a scenario
    ///
    /// # Errors
    /// Returns error if no scenario has this id
    pub fn delete(&mut self, id: ScenarioId) -> Result<Scenario> {
        let index = self.index_of(id)?;
        let removed = self.scenarios.remove(index);
        self.renumber();
        info!(scenario = %id, "scenario deleted");
        Ok(removed)
    }

    /// Change a scenario's display name
    ///
    /// # Errors
    /// Returns error if no scenario has this id
    pub fn rename(&mut self, id: ScenarioId, name: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        let s = self.get_mut(id)?;
        s.meta.name = name.into();
        s.meta.updated_at = now;
        Ok(())
    }

    /// Show or hide a scenario in composed views
    ///
    /// # Errors
    /// Returns error if no scenario has this id
    pub fn set_visible(&mut self, id: ScenarioId, visible: bool) -> Result<()> {
        self.get_mut(id)?.meta.visible = visible;
        Ok(())
    }

    /// Replace a scenario's params wholesale
    ///
    /// # Errors
    /// Returns error if no scenario has this id
    pub fn edit_params(&mut self, id: ScenarioId, params: ParamSnapshot, now: DateTime<Utc>) -> Result<()> {
        let s = self.get_mut(id)?;
        s.params = params.pruned();
        s.meta.updated_at = now;
        debug!(scenario = %id, "params replaced");
        Ok(())
    }

    /// Set or clear a scenario's query text
    ///
    /// Text that does not parse is rejected and nothing is saved.
    ///
    /// # Errors
    /// Returns error for an unknown id or malformed text
    pub fn set_query_dsl(
        &mut self,
        id: ScenarioId,
        dsl: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(text) = &dsl {
            parse(text).map_err(|source| ScenarioError::InvalidDsl { scenario: id, source })?;
        }
        let s = self.get_mut(id)?;
        s.meta.query_dsl = dsl;
        s.meta.updated_at = now;
        Ok(())
    }

    /// Replace the base query
    ///
    /// # Errors
    /// Returns error if the text does not parse
    pub fn set_base_dsl(&mut self, dsl: Option<String>) -> Result<()> {
        if let Some(text) = &dsl {
            parse(text).map_err(ScenarioError::InvalidBaseDsl)?;
        }
        self.base_dsl = dsl;
        Ok(())
    }

    /// Base with every visible overlay folded on, in stack order
    #[must_use]
    pub fn compose_visible(&self, base: &ParamSnapshot) -> ParamSnapshot {
        compose_visible(
            base,
            self.scenarios
                .iter()
                .filter(|s| s.meta.visible)
                .map(|s| &s.params),
        )
    }

    /// The view a consumer displays: visible overlays, then the current
    /// layer's edits, then its what-if selection
    ///
    /// # Errors
    /// Returns error if the current layer's what-if text does not parse
    pub fn current_view(&self, graph: &FlowGraph, current: &CurrentLayer) -> Result<ParamSnapshot> {
        let mut view = self.compose_visible(&graph.base_snapshot());
        compose_onto(&mut view, &current.edits);
        match &current.what_if_dsl {
            Some(text) => {
                let what_if = parse(text).map_err(ScenarioError::InvalidWhatIf)?;
                Ok(apply_what_if(view, graph, &what_if.what_if_parts()).snapshot)
            }
            None => Ok(view),
        }
    }

    /// Legend data for every scenario, bottom to top
    #[must_use]
    pub fn display_meta(&self) -> Vec<DisplayMeta> {
        self.scenarios.iter().map(DisplayMeta::from).collect()
    }

    /// Store a regeneration result
    ///
    /// Last writer wins: whatever was in `params` is replaced, including
    /// edits made while the regeneration was in flight.
    ///
    /// # Errors
    /// Returns error if the scenario was deleted in the meantime
    pub fn apply_regeneration(&mut self, outcome: &RegenOutcome) -> Result<()> {
        let s = self.get_mut(outcome.scenario)?;
        s.params = outcome.params.clone();
        s.meta.last_regenerated_at = Some(outcome.finished_at);
        s.meta.last_effective_dsl = Some(outcome.effective_dsl.clone());
        s.meta.updated_at = outcome.finished_at;
        info!(scenario = %outcome.scenario, status = ?outcome.status, "regeneration stored");
        Ok(())
    }

    fn get_mut(&mut self, id: ScenarioId) -> Result<&mut Scenario> {
        self.scenarios
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(ScenarioError::UnknownScenario(id))
    }

    fn renumber(&mut self) {
        for (i, s) in self.scenarios.iter_mut().enumerate() {
            s.order_index = i;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strata_params::{GraphEdge, GraphNode, Moments, ParamLeaf, Stat};

    const MEAN: ParamLeaf = ParamLeaf::Probability(Stat::Mean);

    fn graph() -> FlowGraph {
        let node = |id: &str| GraphNode {
            uuid: format!("u-{id}"),
            id: id.into(),
            case: None,
        };
        let mut edge = GraphEdge {
            uuid: "u-e1".into(),
            id: "e1".into(),
            from: "a".into(),
            to: "b".into(),
            params: Default::default(),
            connections: Default::default(),
        };
        edge.params.p = Moments::new(0.4, 0.05);
        FlowGraph {
            nodes: vec![node("a"), node("b")],
            edges: vec![edge],
            base_dsl: None,
        }
    }

    fn ctx<'a>(graph: &'a FlowGraph, current: &'a CurrentLayer, config: &'a EngineConfig) -> CreateContext<'a> {
        CreateContext {
            graph,
            current,
            config,
            now: Utc::now(),
        }
    }

    fn overlay(mean: f64) -> ParamSnapshot {
        let mut s = ParamSnapshot::new();
        s.set("e1", &MEAN, mean);
        s
    }

    #[test]
    fn create_assigns_order_and_colours() {
        let (g, cur, cfg) = (graph(), CurrentLayer::default(), EngineConfig::default());
        let mut stack = ScenarioStack::new(None);
        let a = stack.create("a", CreateKind::Blank, ctx(&g, &cur, &cfg)).unwrap();
        let b = stack.create("b", CreateKind::Blank, ctx(&g, &cur, &cfg)).unwrap();

        assert_eq!(stack.index_of(a).unwrap(), 0);
        assert_eq!(stack.get(b).unwrap().order_index, 1);
        assert_ne!(stack.get(a).unwrap().meta.colour, stack.get(b).unwrap().meta.colour);
    }

    #[test]
    fn from_query_validates_text() {
        let (g, cur, cfg) = (graph(), CurrentLayer::default(), EngineConfig::default());
        let mut stack = ScenarioStack::new(None);
        let bad = stack.create("q", CreateKind::FromQuery("window(".into()), ctx(&g, &cur, &cfg));
        assert!(matches!(bad, Err(ScenarioError::InvalidDsl { .. })));
        assert!(stack.is_empty());

        let id = stack
            .create("q", CreateKind::FromQuery("context(channel:google)".into()), ctx(&g, &cur, &cfg))
            .unwrap();
        assert!(stack.get(id).unwrap().is_live());
        assert_eq!(stack.live_ids(), vec![id]);
    }

    #[test]
    fn snapshots_capture_the_current_view() {
        let g = graph();
        let cfg = EngineConfig::default();
        let current = CurrentLayer {
            edits: overlay(0.9),
            what_if_dsl: None,
        };
        let mut stack = ScenarioStack::new(None);

        let diffs = stack
            .create("d", CreateKind::SnapshotDifferences, ctx(&g, &current, &cfg))
            .unwrap();
        let params = &stack.get(diffs).unwrap().params;
        assert_eq!(params.get("e1", &MEAN), Some(0.9));
        assert!(params.edges["e1"].p.stdev.is_absent());

        let all = stack
            .create("a", CreateKind::SnapshotAll, ctx(&g, &current, &cfg))
            .unwrap();
        let params = &stack.get(all).unwrap().params;
        assert_eq!(params.edges["e1"].p.stdev.value(), Some(0.05));
    }

    #[test]
    fn reorder_changes_precedence() {
        let (g, cur, cfg) = (graph(), CurrentLayer::default(), EngineConfig::default());
        let mut stack = ScenarioStack::new(None);
        let low = stack.create("low", CreateKind::Blank, ctx(&g, &cur, &cfg)).unwrap();
        let high = stack.create("high", CreateKind::Blank, ctx(&g, &cur, &cfg)).unwrap();
        stack.edit_params(low, overlay(0.1), Utc::now()).unwrap();
        stack.edit_params(high, overlay(0.2), Utc::now()).unwrap();

        let base = g.base_snapshot();
        assert_eq!(stack.compose_visible(&base).get("e1", &MEAN), Some(0.2));

        stack.reorder(high, 0).unwrap();
        assert_eq!(stack.compose_visible(&base).get("e1", &MEAN), Some(0.1));
        assert_eq!(stack.get(low).unwrap().order_index, 1);

        assert!(matches!(
            stack.reorder(low, 2),
            Err(ScenarioError::InvalidIndex { index: 2, len: 2 })
        ));
    }

    #[test]
    fn hidden_scenarios_do_not_compose() {
        let (g, cur, cfg) = (graph(), CurrentLayer::default(), EngineConfig::default());
        let mut stack = ScenarioStack::new(None);
        let id = stack.create("s", CreateKind::Blank, ctx(&g, &cur, &cfg)).unwrap();
        stack.edit_params(id, overlay(0.7), Utc::now()).unwrap();
        stack.set_visible(id, false).unwrap();

        assert_eq!(stack.compose_visible(&g.base_snapshot()).get("e1", &MEAN), Some(0.4));
        assert!(!stack.display_meta()[0].visible);
    }

    #[test]
    fn malformed_query_edit_is_rejected() {
        let (g, cur, cfg) = (graph(), CurrentLayer::default(), EngineConfig::default());
        let mut stack = ScenarioStack::new(None);
        let id = stack.create("s", CreateKind::Blank, ctx(&g, &cur, &cfg)).unwrap();

        assert!(stack.set_query_dsl(id, Some("case(".into()), Utc::now()).is_err());
        assert!(!stack.get(id).unwrap().is_live());

        stack.set_query_dsl(id, Some("window(-7d)".into()), Utc::now()).unwrap();
        assert!(stack.display_meta()[0].live);
    }

    #[test]
    fn delete_renumbers() {
        let (g, cur, cfg) = (graph(), CurrentLayer::default(), EngineConfig::default());
        let mut stack = ScenarioStack::new(None);
        let a = stack.create("a", CreateKind::Blank, ctx(&g, &cur, &cfg)).unwrap();
        let b = stack.create("b", CreateKind::Blank, ctx(&g, &cur, &cfg)).unwrap();
        stack.delete(a).unwrap();
        assert_eq!(stack.get(b).unwrap().order_index, 0);
        assert!(matches!(stack.delete(a), Err(ScenarioError::UnknownScenario(_))));
    }
}
