//! Strata Scenarios
//!
//! The ordered scenario stack and the machinery that keeps live scenarios
//! in step with their queries.
//!
//! # Core Concepts
//!
//! - [`ScenarioStack`]: base query plus ordered overlays; stack position is
//!   the only precedence rule
//! - [`inherit`]: a live scenario's effective query, folded up the stack
//! - [`CacheNeedEvaluator`]: which connected items lack cached coverage
//! - [`apply_what_if`]: bake case, visited and exclude selections into values
//! - [`Orchestrator`]: inherit, check cache, fetch, apply, store
//!
//! # Example
//!
//! ```rust
//! use strata_scenarios::inherit;
//! use strata_scenarios::{Scenario, ScenarioMeta};
//!
//! let mut live = Scenario::new(ScenarioMeta::new("google", "#4e79a7", chrono::Utc::now()));
//! live.meta.query_dsl = Some("context(channel:google)".into());
//!
//! let eff = inherit(Some("window(-30d:-1d)"), &[live], 0).unwrap();
//! assert_eq!(eff.fetch.to_string(), "window(-30d:-1d).context(channel:google)");
//! ```

#![warn(unreachable_pub)]

mod cache;
mod cancel;
mod clock;
mod config;
mod error;
mod fetch;
mod inherit;
mod orchestrator;
mod scenario;
mod stack;
mod state;
mod what_if;

pub use cache::{CacheNeed, CacheNeedEvaluator, FetchItem};
pub use cancel::{CancelHandle, CancelSignal};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EngineConfig, DEFAULT_WINDOW};
pub use error::{FetchError, Result, ScenarioError};
pub use fetch::{FetchClient, FetchedValue};
pub use inherit::{inherit, EffectiveDsl};
pub use orchestrator::{BatchResults, ItemFailure, Orchestrator, RegenOutcome, RegenStatus};
pub use scenario::{CurrentLayer, DisplayMeta, Scenario, ScenarioId, ScenarioMeta};
pub use stack::{CreateContext, CreateKind, ScenarioStack, SharedStack};
pub use state::{allowed_transitions, validate_transition, RegenState};
pub use what_if::{apply_what_if, WhatIfResult};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
