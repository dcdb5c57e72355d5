//! Param pack application, export and validation against fixture graphs

use pretty_assertions::assert_eq;
use proptest::collection::vec;
use proptest::prelude::*;
use serde_json::json;
use strata_hrn::{apply_pack, flatten, validate_pack, IssueKind, ParamPack};
use strata_params::{ParamLeaf, Stat};
use strata_test_utils::{funnel_graph, parallel_edges_graph};

/// One resolvable and one unresolvable address: the good one applies, the
/// bad one is reported, nothing panics.
#[test]
fn unknown_addresses_are_skipped_not_fatal() {
    let graph = funnel_graph();
    let mut pack = ParamPack::new();
    pack.insert("e.e1.p.mean", 0.55);
    pack.insert("e.nope.p.mean", 0.1);

    let out = apply_pack(&graph, &pack);

    assert_eq!(out.applied.len(), 1);
    assert_eq!(out.skipped.len(), 1);
    assert_eq!(out.skipped[0].address, "e.nope.p.mean");
    assert_eq!(out.skipped[0].reason, IssueKind::NotFound);
    assert_eq!(out.diff.get("e1", &ParamLeaf::Probability(Stat::Mean)), Some(0.55));
}

#[test]
fn ambiguous_endpoints_are_skipped() {
    let graph = parallel_edges_graph();
    let mut pack = ParamPack::new();
    pack.insert("e.from(a).to(b).p.mean", 0.3);
    pack.insert("e.ab-main.p.mean", 0.7);

    let out = apply_pack(&graph, &pack);

    assert_eq!(out.applied.len(), 1);
    assert!(matches!(out.skipped[0].reason, IssueKind::Ambiguous { ref candidates } if candidates.len() == 2));
    assert_eq!(out.diff.get("ab-main", &ParamLeaf::Probability(Stat::Mean)), Some(0.7));
}

#[test]
fn endpoint_and_uuid_selectors_land_on_ids() {
    let graph = funnel_graph();
    let mut pack = ParamPack::new();
    pack.insert("e.from(landing).to(checkout).cost_gbp.mean", 2.5);
    pack.insert("e.uuid(u-e2).conditional_p.visited(promo).mean", 0.9);

    let out = apply_pack(&graph, &pack);

    assert!(out.skipped.is_empty());
    assert_eq!(out.diff.edges["e1"].costs["cost_gbp"].mean.value(), Some(2.5));
    assert_eq!(
        out.diff.edges["e2"].conditional_p["visited(promo)"].mean.value(),
        Some(0.9)
    );
}

#[test]
fn case_weight_carries_sibling_variants() {
    let graph = funnel_graph();
    let mut pack = ParamPack::new();
    pack.insert("n.case(experiment:treatment).weight", 1.0);

    let out = apply_pack(&graph, &pack);
    let variants = out.diff.nodes["checkout"].case.variants.get().unwrap();

    assert_eq!(variants["treatment"], 1.0);
    assert_eq!(variants["control"], 0.5);
}

#[test]
fn unknown_variant_is_skipped() {
    let graph = funnel_graph();
    let mut pack = ParamPack::new();
    pack.insert("n.checkout.case(experiment:holdout).weight", 1.0);

    let out = apply_pack(&graph, &pack);

    assert!(out.applied.is_empty());
    assert!(matches!(out.skipped[0].reason, IssueKind::UnknownVariant { .. }));
}

#[test]
fn flatten_then_apply_reproduces_snapshot() {
    let graph = funnel_graph();
    let base = graph.base_snapshot();

    let pack = flatten(&base, &graph);
    assert!(pack.get("e.e1.p.stdev").is_some());
    assert!(pack.get("n.checkout.case(experiment:control).weight").is_some());

    let out = apply_pack(&graph, &pack);
    assert!(out.skipped.is_empty());
    assert_eq!(out.diff, base);
}

/// Non-numeric values block; unresolved addresses only warn.
#[test]
fn validation_splits_errors_and_warnings() {
    let graph = funnel_graph();
    let mut pack = ParamPack::new();
    pack.insert("e.e1.p.mean", json!("high"));
    pack.insert("e.ghost.p.mean", 0.2);
    pack.insert("e.e2.p.mean", 1.4);
    pack.insert("e.e3.p.stdev", -0.1);
    pack.insert("e.e3.cost_gbp.mean", 120.0);

    let report = validate_pack(&graph, &pack);

    assert!(report.is_blocking());
    let error_addresses: Vec<_> = report.errors.iter().map(|i| i.address.as_str()).collect();
    assert_eq!(error_addresses, vec!["e.e1.p.mean", "e.e2.p.mean", "e.e3.p.stdev"]);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].address, "e.ghost.p.mean");
}

#[test]
fn warnings_alone_do_not_block() {
    let graph = funnel_graph();
    let mut pack = ParamPack::new();
    pack.insert("e.ghost.p.mean", 0.2);

    let report = validate_pack(&graph, &pack);
    assert!(!report.is_blocking());
    assert!(!report.is_clean());
}

proptest! {
    #[test]
    fn prop_exported_pack_reapplies_cleanly(
        moments in vec((0.0_f64..=1.0, 0.0_f64..=0.5), 5),
    ) {
        let graph = funnel_graph();
        let mut snapshot = graph.base_snapshot();
        for (edge, (mean, stdev)) in graph.edges.iter().zip(&moments) {
            snapshot.set(&edge.id, &ParamLeaf::Probability(Stat::Mean), *mean);
            snapshot.set(&edge.id, &ParamLeaf::Probability(Stat::Stdev), *stdev);
        }

        let pack = flatten(&snapshot, &graph);
        prop_assert!(!validate_pack(&graph, &pack).is_blocking());

        let out = apply_pack(&graph, &pack);
        prop_assert!(out.skipped.is_empty());
        prop_assert_eq!(out.diff, snapshot);
    }
}
