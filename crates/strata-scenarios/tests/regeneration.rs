//! End-to-end regeneration against scripted fetch collaborators

use chrono::Utc;
use parking_lot::RwLock;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use strata_params::{Connection, FlowGraph, ParamLeaf, ParamSnapshot, Stat};
use strata_scenarios::{
    CacheNeedEvaluator, CancelSignal, EngineConfig, FetchedValue, FixedClock, Orchestrator,
    RegenState, RegenStatus, Scenario, ScenarioError, ScenarioMeta, ScenarioStack, SharedStack,
};
use strata_test_utils::{date, experiment_graph, funnel_graph, ScriptedFetch};

const MEAN: ParamLeaf = ParamLeaf::Probability(Stat::Mean);

fn scenario(name: &str, dsl: Option<&str>) -> Scenario {
    let mut s = Scenario::new(ScenarioMeta::new(name, "#000000", Utc::now()));
    s.meta.query_dsl = dsl.map(str::to_string);
    s
}

fn stack_for(graph: &FlowGraph, scenarios: Vec<Scenario>) -> ScenarioStack {
    ScenarioStack::from_scenarios(graph.base_dsl.clone(), scenarios)
}

fn orchestrator(fetch: &Arc<ScriptedFetch>) -> Orchestrator {
    Orchestrator::new(fetch.clone(), EngineConfig::default())
        .with_clock(Arc::new(FixedClock::on(date("2025-02-01"))))
}

#[tokio::test]
async fn live_context_scenario_stores_fetched_value() {
    let graph = funnel_graph();
    let fetch = Arc::new(ScriptedFetch::new().with_value("e1", FetchedValue::mean(0.55)));
    let stack = stack_for(&graph, vec![scenario("google", Some("context(channel:google)"))]);
    let id = stack.scenarios()[0].id;

    let outcome = orchestrator(&fetch)
        .regenerate(&graph, &stack, id, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(
        outcome.effective.fetch.to_string(),
        "window(-30d:-1d).context(channel:google)"
    );
    assert_eq!(outcome.status, RegenStatus::Succeeded);
    assert_eq!(outcome.params.get("e1", &MEAN), Some(0.55));
    assert_eq!(fetch.calls(), 1);
    assert_eq!(
        outcome.states,
        vec![
            RegenState::Idle,
            RegenState::Inheriting,
            RegenState::CacheChecking,
            RegenState::Fetching,
            RegenState::Applying,
            RegenState::Idle,
        ]
    );
}

#[tokio::test]
async fn covered_window_uses_cache_without_fetching() {
    let graph = funnel_graph();
    let fetch = Arc::new(ScriptedFetch::new());
    let stack = stack_for(&graph, vec![scenario("jan", Some("window(1-Jan-25:31-Jan-25)"))]);
    let id = stack.scenarios()[0].id;

    let outcome = orchestrator(&fetch)
        .regenerate(&graph, &stack, id, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(fetch.calls(), 0);
    assert!(!outcome.states.contains(&RegenState::Fetching));
    assert_eq!(outcome.params.get("e1", &MEAN), Some(0.41));
}

#[tokio::test]
async fn what_if_case_is_baked_without_fetch() {
    let graph = experiment_graph();
    let fetch = Arc::new(ScriptedFetch::new());
    let stack = stack_for(&graph, vec![scenario("treat", Some("case(experiment:treatment)"))]);
    let id = stack.scenarios()[0].id;

    let outcome = orchestrator(&fetch)
        .regenerate(&graph, &stack, id, &CancelSignal::never())
        .await
        .unwrap();

    let weights = outcome.params.nodes["n1"].case.variants.get().unwrap();
    assert_eq!(weights["treatment"], 1.0);
    assert_eq!(weights["control"], 0.0);
    assert_eq!(fetch.calls(), 0);
}

#[tokio::test]
async fn partial_failure_keeps_the_scenarios_prior_value() {
    let mut graph = funnel_graph();
    graph.edges[2].connections.p = Some(Connection::new("events"));
    let stack = stack_for(&graph, vec![scenario("google", Some("context(channel:google)"))]);
    let id = stack.scenarios()[0].id;
    let shared: SharedStack = Arc::new(RwLock::new(stack));

    let healthy = Arc::new(
        ScriptedFetch::new()
            .with_value("e1", FetchedValue::mean(0.55))
            .with_value("e3", FetchedValue::mean(0.9)),
    );
    orchestrator(&healthy)
        .regenerate_shared(&shared, &graph, id, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(shared.read().get(id).unwrap().params.get("e3", &MEAN), Some(0.9));

    let flaky = Arc::new(
        ScriptedFetch::new()
            .with_value("e1", FetchedValue::mean(0.6))
            .failing("e3"),
    );
    let outcome = orchestrator(&flaky)
        .regenerate_shared(&shared, &graph, id, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome.status, RegenStatus::PartiallyFailed);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].item.entity_id, "e3");

    let guard = shared.read();
    let params = &guard.get(id).unwrap().params;
    assert_eq!(params.get("e1", &MEAN), Some(0.6));
    assert_eq!(params.get("e3", &MEAN), Some(0.9));
}

#[tokio::test]
async fn failure_on_a_never_refreshed_item_keeps_base() {
    let mut graph = funnel_graph();
    graph.edges[2].connections.p = Some(Connection::new("events"));
    let fetch = Arc::new(
        ScriptedFetch::new()
            .with_value("e1", FetchedValue::mean(0.55))
            .failing("e3"),
    );
    let stack = stack_for(&graph, vec![scenario("google", Some("context(channel:google)"))]);
    let id = stack.scenarios()[0].id;

    let outcome = orchestrator(&fetch)
        .regenerate(&graph, &stack, id, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome.status, RegenStatus::PartiallyFailed);
    assert_eq!(outcome.params.get("e1", &MEAN), Some(0.55));
    assert!(!outcome.params.edges.contains_key("e3"));
}

#[tokio::test]
async fn fetches_use_the_window_coverage_was_judged_on() {
    let mut graph = funnel_graph();
    graph.base_dsl = None;
    let fetch = Arc::new(ScriptedFetch::new().with_value("e1", FetchedValue::mean(0.55)));
    let stack = stack_for(&graph, vec![scenario("google", Some("context(channel:google)"))]);
    let id = stack.scenarios()[0].id;

    let outcome = orchestrator(&fetch)
        .regenerate(&graph, &stack, id, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome.effective.fetch.to_string(), "context(channel:google)");
    let dsls: Vec<String> = fetch.log().into_iter().map(|c| c.dsl).collect();
    assert_eq!(dsls, vec!["window(-30d:-1d).context(channel:google)".to_string()]);
}

#[tokio::test]
async fn shared_fetch_query_is_fetched_once_per_pass() {
    let graph = funnel_graph();
    let fetch = Arc::new(ScriptedFetch::new().with_value("e1", FetchedValue::mean(0.55)));
    let stack = stack_for(
        &graph,
        vec![
            scenario("google", Some("context(channel:google)")),
            scenario("treat", Some("case(experiment:treatment)")),
        ],
    );

    let results = orchestrator(&fetch)
        .regenerate_all(&graph, &stack, &CancelSignal::never())
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(fetch.calls_for("e1"), 1);
    let treat = results[1].1.as_ref().unwrap();
    assert_eq!(treat.params.get("e1", &MEAN), Some(0.55));
    assert_eq!(
        treat.params.nodes["checkout"].case.variants.get().unwrap()["treatment"],
        1.0
    );
}

#[tokio::test]
async fn sibling_failures_are_independent() {
    let graph = funnel_graph();
    let fetch = Arc::new(
        ScriptedFetch::new()
            .failing_for_slice("e1", "context(channel:google)")
            .with_value("e1", FetchedValue::mean(0.3)),
    );
    let stack = stack_for(
        &graph,
        vec![
            scenario("google", Some("context(channel:google)")),
            scenario("frozen", None),
            scenario("meta", Some("context(channel:meta)")),
            scenario("broken", Some("window(")),
        ],
    );

    let results = orchestrator(&fetch)
        .regenerate_all(&graph, &stack, &CancelSignal::never())
        .await;

    assert_eq!(results.len(), 3);
    let google = results[0].1.as_ref().unwrap();
    assert_eq!(google.status, RegenStatus::PartiallyFailed);
    let meta = results[1].1.as_ref().unwrap();
    assert_eq!(meta.status, RegenStatus::Succeeded);
    assert_eq!(meta.effective.fetch.to_string(), "window(-30d:-1d).context(channel:meta)");
    assert_eq!(meta.params.get("e1", &MEAN), Some(0.3));
    assert!(matches!(results[2].1, Err(ScenarioError::InvalidDsl { .. })));
}

#[tokio::test]
async fn cancelled_regeneration_leaves_stack_untouched() {
    let graph = funnel_graph();
    let fetch = Arc::new(ScriptedFetch::new().with_value("e1", FetchedValue::mean(0.55)));
    let stack = stack_for(&graph, vec![scenario("google", Some("context(channel:google)"))]);
    let id = stack.scenarios()[0].id;
    let shared: SharedStack = Arc::new(RwLock::new(stack.clone()));

    let (handle, signal) = CancelSignal::pair();
    handle.cancel();
    let err = orchestrator(&fetch)
        .regenerate_shared(&shared, &graph, id, &signal)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(fetch.calls(), 0);
    assert_eq!(*shared.read(), stack);
}

#[tokio::test]
async fn static_scenarios_are_not_regenerated() {
    let graph = funnel_graph();
    let fetch = Arc::new(ScriptedFetch::new());
    let stack = stack_for(&graph, vec![scenario("frozen", None)]);
    let id = stack.scenarios()[0].id;

    let err = orchestrator(&fetch)
        .regenerate(&graph, &stack, id, &CancelSignal::never())
        .await
        .unwrap_err();
    assert!(matches!(err, ScenarioError::NotLive(_)));
}

#[tokio::test]
async fn put_to_base_rebases_every_live_scenario() {
    let graph = funnel_graph();
    let fetch = Arc::new(ScriptedFetch::new().with_value("e1", FetchedValue::mean(0.55)));
    let stack = stack_for(
        &graph,
        vec![
            scenario("google", Some("context(channel:google)")),
            scenario("frozen", None),
        ],
    );
    let google = stack.scenarios()[0].id;
    let frozen = stack.scenarios()[1].id;
    let shared: SharedStack = Arc::new(RwLock::new(stack));
    let orch = orchestrator(&fetch);

    assert!(orch
        .put_to_base(&shared, &graph, "window(", &CancelSignal::never())
        .await
        .is_err());
    assert_eq!(shared.read().base_dsl.as_deref(), Some("window(-30d:-1d)"));

    let results = orch
        .put_to_base(&shared, &graph, "window(1-Jan-25:31-Jan-25)", &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);

    let guard = shared.read();
    assert_eq!(guard.base_dsl.as_deref(), Some("window(1-Jan-25:31-Jan-25)"));
    let meta = &guard.get(google).unwrap().meta;
    assert_eq!(
        meta.last_effective_dsl.as_deref(),
        Some("window(1-Jan-25:31-Jan-25).context(channel:google)")
    );
    assert_eq!(
        meta.last_regenerated_at,
        Some(FixedClock::on(date("2025-02-01")).0)
    );
    assert!(guard.get(frozen).unwrap().meta.last_regenerated_at.is_none());
}

#[tokio::test]
async fn regeneration_overwrites_earlier_edits() {
    let graph = funnel_graph();
    let fetch = Arc::new(ScriptedFetch::new().with_value("e1", FetchedValue::mean(0.55)));
    let stack = stack_for(&graph, vec![scenario("google", Some("context(channel:google)"))]);
    let id = stack.scenarios()[0].id;
    let shared: SharedStack = Arc::new(RwLock::new(stack));

    let mut edit = ParamSnapshot::new();
    edit.set("e5", &MEAN, 0.01);
    shared.write().edit_params(id, edit, Utc::now()).unwrap();

    orchestrator(&fetch)
        .regenerate_shared(&shared, &graph, id, &CancelSignal::never())
        .await
        .unwrap();

    let guard = shared.read();
    let params = &guard.get(id).unwrap().params;
    assert_eq!(params.get("e1", &MEAN), Some(0.55));
    assert_eq!(params.get("e5", &MEAN), None);
}

#[test]
fn batched_cache_checks_keep_input_order() {
    let graph = funnel_graph();
    let evaluator = CacheNeedEvaluator::new(&EngineConfig::default());
    let dsls = [
        "context(channel:google)",
        "window(1-Jan-25:31-Jan-25)",
        "window(",
    ];

    let needs = evaluator.check_multiple(&dsls, &graph, date("2025-02-01"));

    let tags: Vec<&str> = needs.iter().map(|n| n.dsl.as_str()).collect();
    assert_eq!(tags, dsls.to_vec());
    assert!(needs[0].needs_fetch);
    assert_eq!(needs[0].items.len(), 1);
    assert!(!needs[1].needs_fetch);
    assert!(needs[2].needs_fetch);
    assert!(needs[2].items.is_empty());
    assert!(!needs[2].diagnostics.is_empty());
}
