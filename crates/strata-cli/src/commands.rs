//! Subcommand implementations
//!
//! Each command renders its report to a string; the binary decides where
//! it goes and how the process exits.

use crate::load::{load_graph, load_pack, load_stack};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::path::Path;
use strata_composition::compose;
use strata_dsl::QueryDsl;
use strata_hrn::{flatten, validate_pack};
use strata_params::ParamSnapshot;
use strata_scenarios::{inherit, CacheNeedEvaluator, EngineConfig, ScenarioId};
use tracing::{info, warn};

/// Rendered command result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Text for stdout
    pub text: String,
    /// False when the command found blocking problems
    pub ok: bool,
}

impl Report {
    fn ok(text: String) -> Self {
        Self { text, ok: true }
    }
}

/// Flatten the composed view of a stack into address/value pairs
///
/// With `all`, hidden overlays are folded in too.
///
/// # Errors
/// Returns error if either file fails to load
pub fn compose_cmd(graph: &Path, stack: &Path, all: bool) -> Result<Report> {
    let graph = load_graph(graph)?;
    let stack = load_stack(stack)?;
    let base = graph.base_snapshot();

    let view = if all {
        let overlays: Vec<ParamSnapshot> =
            stack.scenarios().iter().map(|s| s.params.clone()).collect();
        compose(&base, &overlays)
    } else {
        stack.compose_visible(&base)
    };
    info!(scenarios = stack.len(), all, "composed");

    let pack = flatten(&view, &graph);
    Ok(Report::ok(serde_json::to_string_pretty(&pack)?))
}

/// Effective fetch and what-if queries for one scenario
///
/// # Errors
/// Returns error for a bad id, an unknown scenario or a malformed query
pub fn inherit_cmd(stack: &Path, scenario: &str) -> Result<Report> {
    let stack = load_stack(stack)?;
    let id: ScenarioId = scenario
        .parse()
        .with_context(|| format!("invalid scenario id {scenario}"))?;
    let index = stack.index_of(id)?;
    let effective = inherit(stack.base_dsl.as_deref(), stack.scenarios(), index)?;

    let mut text = String::new();
    writeln!(text, "fetch:     {}", effective.fetch)?;
    writeln!(text, "what_if:   {}", effective.what_if)?;
    write!(text, "effective: {effective}")?;
    Ok(Report::ok(text))
}

/// Batched cache-need report, one entry per query in input order
///
/// # Errors
/// Returns error if the graph fails to load or the report cannot be encoded
pub fn cache_check_cmd(
    graph: &Path,
    dsls: &[String],
    today: NaiveDate,
    config: &EngineConfig,
) -> Result<Report> {
    let graph = load_graph(graph)?;
    let evaluator = CacheNeedEvaluator::new(config);
    let needs = evaluator.check_multiple(dsls, &graph, today);
    let fetching = needs.iter().filter(|n| n.needs_fetch).count();
    info!(queries = needs.len(), fetching, %today, "cache checked");
    Ok(Report::ok(serde_json::to_string_pretty(&needs)?))
}

/// Validation report for a param pack
///
/// The report is not ok when any blocking error is present.
///
/// # Errors
/// Returns error if either file fails to load
pub fn validate_pack_cmd(graph: &Path, pack: &Path) -> Result<Report> {
    let graph = load_graph(graph)?;
    let pack = load_pack(pack)?;
    let report = validate_pack(&graph, &pack);

    let mut text = String::new();
    for issue in &report.errors {
        writeln!(text, "error: {issue}")?;
    }
    for issue in &report.warnings {
        warn!(%issue, "pack warning");
        writeln!(text, "warning: {issue}")?;
    }
    write!(
        text,
        "{} entries, {} errors, {} warnings",
        pack.len(),
        report.errors.len(),
        report.warnings.len()
    )?;
    Ok(Report {
        text,
        ok: !report.is_blocking(),
    })
}

/// Canonical form of a query and its fetch/what-if split
///
/// # Errors
/// Returns error if the query does not parse
pub fn parse_cmd(dsl: &str) -> Result<Report> {
    let query = QueryDsl::parse(dsl).with_context(|| format!("cannot parse {dsl:?}"))?;

    let mut text = String::new();
    writeln!(text, "canonical: {}", query.combined())?;
    writeln!(text, "fetch:     {}", query.fetch)?;
    write!(text, "what_if:   {}", query.what_if)?;
    Ok(Report::ok(text))
}
