//! File loading for the command line
//!
//! Files ending in `.yaml` or `.yml` are read as YAML, everything else as
//! JSON.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use strata_hrn::ParamPack;
use strata_params::FlowGraph;
use strata_scenarios::{EngineConfig, ScenarioStack};
use tracing::debug;

/// Input format, picked from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON
    Json,
    /// YAML
    Yaml,
}

impl Format {
    /// Format for a path
    #[must_use]
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// Read and deserialize a JSON or YAML file
///
/// # Errors
/// Returns error if the file cannot be read or does not deserialize into `T`
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let format = Format::of(path);
    debug!(path = %path.display(), ?format, bytes = text.len(), "loading");
    match format {
        Format::Yaml => serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse {} as YAML", path.display())),
        Format::Json => serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {} as JSON", path.display())),
    }
}

/// Load and structurally validate a graph
///
/// # Errors
/// Returns error on an unreadable file or an inconsistent graph
pub fn load_graph(path: &Path) -> Result<FlowGraph> {
    let graph: FlowGraph = load_file(path)?;
    graph
        .validate()
        .with_context(|| format!("graph {} is inconsistent", path.display()))?;
    Ok(graph)
}

/// Load a persisted stack, renumbering to match list order
///
/// # Errors
/// Returns error on an unreadable file
pub fn load_stack(path: &Path) -> Result<ScenarioStack> {
    let stack: ScenarioStack = load_file(path)?;
    Ok(ScenarioStack::from_scenarios(
        stack.base_dsl.clone(),
        stack.scenarios().to_vec(),
    ))
}

/// Load a param pack
///
/// # Errors
/// Returns error on an unreadable file
pub fn load_pack(path: &Path) -> Result<ParamPack> {
    load_file(path)
}

/// Engine config from `path`, or the defaults
///
/// # Errors
/// Returns error on an unreadable file
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    path.map_or_else(|| Ok(EngineConfig::default()), load_file::<EngineConfig>)
}
