//! Baking what-if selections into parameter values
//!
//! The same rules a consumer applies when rendering an active selection:
//! a selected case variant takes all the weight, satisfied conditional
//! probabilities stand in for an edge's plain probability, and edges into
//! excluded nodes carry nothing.

use std::collections::BTreeSet;
use strata_dsl::{parse, ConstraintSet};
use strata_params::{Field, FlowGraph, Moments, ParamSnapshot, VariantWeights};
use tracing::debug;

/// Snapshot with selections applied, plus anything that could not be honoured
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhatIfResult {
    /// Resulting values
    pub snapshot: ParamSnapshot,
    /// Unknown cases, variants, nodes or unparseable conditions
    pub diagnostics: Vec<String>,
}

/// Apply the what-if terms of `what_if` to `snapshot`
///
/// Fetch terms in `what_if` are ignored.
#[must_use]
pub fn apply_what_if(
    snapshot: ParamSnapshot,
    graph: &FlowGraph,
    what_if: &ConstraintSet,
) -> WhatIfResult {
    let mut out = WhatIfResult {
        snapshot,
        diagnostics: Vec::new(),
    };
    if let Some(cases) = &what_if.case {
        for (case_id, variant) in cases {
            select_variant(&mut out, graph, case_id, variant);
        }
    }
    substitute_conditionals(&mut out, graph, what_if);
    if let Some(excluded) = &what_if.exclude {
        for node in excluded {
            if graph.node(node).is_none() {
                out.diagnostics.push(format!("excluded node not found: {node}"));
                continue;
            }
            for edge in graph.incoming(node) {
                out.snapshot.edge_mut(&edge.id).p.mean = Field::Set(0.0);
            }
        }
    }
    out
}

fn select_variant(out: &mut WhatIfResult, graph: &FlowGraph, case_id: &str, variant: &str) {
    let nodes = graph.nodes_by_case_id(case_id);
    if nodes.is_empty() {
        out.diagnostics.push(format!("unknown case: {case_id}"));
        return;
    }
    for node in nodes {
        let Some(case) = &node.case else { continue };
        if !case.has_variant(variant) {
            out.diagnostics
                .push(format!("unknown variant {variant} for case {case_id}"));
            continue;
        }
        let weights: VariantWeights = case
            .variant_names()
            .map(|name| (name.to_string(), if name == variant { 1.0 } else { 0.0 }))
            .collect();
        out.snapshot.node_mut(&node.id).case.variants = Field::Set(weights);
    }
}

fn substitute_conditionals(out: &mut WhatIfResult, graph: &FlowGraph, what_if: &ConstraintSet) {
    // visitedAny groups only say "one of these", so they never count as
    // definitely visited
    let visited: BTreeSet<&str> = what_if
        .visited
        .iter()
        .flatten()
        .map(String::as_str)
        .collect();

    for edge in &graph.edges {
        let Some(params) = out.snapshot.edges.get(&edge.id) else {
            continue;
        };
        let mut best: Option<(usize, &Moments)> = None;
        for (key, moments) in &params.conditional_p {
            let condition = match parse(key) {
                Ok(c) => c,
                Err(e) => {
                    out.diagnostics
                        .push(format!("unparseable condition {key} on {}: {e}", edge.id));
                    continue;
                }
            };
            let weight = specificity(&condition);
            if weight == 0 || !satisfied(&condition, &visited, what_if) {
                continue;
            }
            if best.map_or(true, |(w, _)| weight > w) {
                best = Some((weight, moments));
            }
        }
        let Some((_, chosen)) = best else { continue };
        let chosen = chosen.clone();
        debug!(edge = %edge.id, "conditional probability substituted");
        let p = &mut out.snapshot.edge_mut(&edge.id).p;
        if chosen.mean.is_set() {
            p.mean = chosen.mean;
        }
        if chosen.stdev.is_set() {
            p.stdev = chosen.stdev;
        }
    }
}

fn specificity(condition: &ConstraintSet) -> usize {
    condition.visited.as_ref().map_or(0, BTreeSet::len)
        + condition.visited_any.as_ref().map_or(0, Vec::len)
        + condition.case.as_ref().map_or(0, |c| c.len())
}

fn satisfied(condition: &ConstraintSet, visited: &BTreeSet<&str>, what_if: &ConstraintSet) -> bool {
    let all_visited = condition
        .visited
        .iter()
        .flatten()
        .all(|n| visited.contains(n.as_str()));
    let any_groups = condition.visited_any.iter().flatten().all(|group| {
        group.iter().any(|n| visited.contains(n.as_str()))
            || what_if
                .visited_any
                .as_ref()
                .is_some_and(|groups| groups.contains(group))
    });
    let cases = condition.case.iter().flatten().all(|(case_id, variant)| {
        what_if
            .case
            .as_ref()
            .and_then(|c| c.get(case_id))
            .is_some_and(|v| v == variant)
    });
    all_visited && any_groups && cases
}
