//! Strata Composition
//!
//! Sparse diffing and deterministic layering of parameter snapshots.
//!
//! # Core Concepts
//!
//! - [`diff`]: capture "after" relative to "before", either in full
//!   ([`CaptureMode::All`]) or only where values moved by more than an
//!   epsilon ([`CaptureMode::Differences`])
//! - [`compose`] / [`compose_visible`]: fold an ordered overlay list onto a
//!   base; the highest overlay wins per field
//! - [`compose_onto`]: one fold step, for incremental consumers
//!
//! # Example
//!
//! ```rust
//! use strata_composition::{compose, diff, CaptureMode, DEFAULT_EPSILON};
//! use strata_params::{ParamLeaf, ParamSnapshot, Stat};
//!
//! let mean = ParamLeaf::Probability(Stat::Mean);
//! let mut before = ParamSnapshot::new();
//! before.set("e1", &mean, 0.4);
//! let mut after = before.clone();
//! after.set("e1", &mean, 0.55);
//!
//! let overlay = diff(&before, &after, CaptureMode::Differences, DEFAULT_EPSILON).unwrap();
//! assert_eq!(compose(&before, &[overlay]), after);
//! ```

#![warn(unreachable_pub)]

mod compose;
mod diff;
mod error;

pub use compose::{compose, compose_onto, compose_visible};
pub use diff::{diff, CaptureMode, DEFAULT_EPSILON};
pub use error::{CompositionError, Result};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
