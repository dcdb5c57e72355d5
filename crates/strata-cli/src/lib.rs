//! Strata CLI
//!
//! Loads graphs, scenario stacks, param packs and engine config from JSON
//! or YAML files and drives the engine crates.
//!
//! # Subcommands
//!
//! - `compose`: flattened view of a stack over a graph's base
//! - `inherit`: a scenario's effective fetch and what-if queries
//! - `cache-check`: which connected items each query would have to fetch
//! - `validate-pack`: blocking errors and warnings for a param pack
//! - `parse`: canonical form of a query

#![warn(unreachable_pub)]

mod commands;
mod load;

pub use commands::{
    cache_check_cmd, compose_cmd, inherit_cmd, parse_cmd, validate_pack_cmd, Report,
};
pub use load::{load_config, load_file, load_graph, load_pack, load_stack, Format};

use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` overrides the default `info` filter. Logs go to stderr so
/// reports on stdout stay machine-readable.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
