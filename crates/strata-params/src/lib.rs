//! Strata parameter model
//!
//! Value types shared by every layer of the overlay engine.
//!
//! # Core Concepts
//!
//! - [`ParamSnapshot`]: entity kind -> entity id -> slot -> field value tree,
//!   used both as a full base layer and as a sparse overlay
//! - [`Field`]: per-leaf presence wrapper, so "set to zero" differs from "absent"
//! - [`ParamPath`] / [`ParamLeaf`]: addressing of leaves inside an entity
//! - [`FlowGraph`]: read-only graph with ids, endpoints, cases and connections
//! - [`SnapshotHash`]: Blake3 fingerprint of a snapshot's canonical encoding
//!
//! # Example
//!
//! ```rust
//! use strata_params::{ParamLeaf, ParamSnapshot, Stat};
//!
//! let mut overlay = ParamSnapshot::new();
//! overlay.set("e1", &ParamLeaf::Probability(Stat::Mean), 0.0);
//! assert_eq!(overlay.get("e1", &ParamLeaf::Probability(Stat::Mean)), Some(0.0));
//! ```

#![warn(unreachable_pub)]

mod error;
mod field;
mod graph;
mod hash;
mod path;
mod snapshot;

pub use error::{ParamsError, Result};
pub use field::Field;
pub use graph::{
    CachedSlice, CaseNode, CaseVariant, Connection, EdgeConnections, FlowGraph, GraphEdge,
    GraphNode,
};
pub use hash::SnapshotHash;
pub use path::{
    ParamLeaf, ParamPath, PathError, PathSegment, Stat, CASE_SEGMENT, CONDITIONAL_SLOT,
    PROBABILITY_SLOT,
};
pub use snapshot::{
    CaseParams, EdgeParams, EntityKind, Moments, NodeParams, ParamSnapshot, VariantWeights,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
