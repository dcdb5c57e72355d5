//! Strata human-readable parameter addresses
//!
//! - [`Address`]: parsed `e.<id>.p.mean`-style reference to one parameter leaf
//! - [`resolve`]: locate the addressed entity, returning a [`Resolution`]
//!   rather than an error when it is missing or ambiguous
//! - [`ParamPack`] / [`apply_pack`] / [`flatten`]: batch import and export of
//!   addressed values
//! - [`validate_pack`]: blocking errors vs. non-blocking warnings
//!
//! # Example
//!
//! ```rust
//! use strata_hrn::{apply_pack, ParamPack};
//! use strata_params::FlowGraph;
//!
//! let mut pack = ParamPack::new();
//! pack.insert("e.missing.p.mean", 0.5);
//!
//! let out = apply_pack(&FlowGraph::default(), &pack);
//! assert_eq!(out.skipped.len(), 1);
//! ```

#![warn(unreachable_pub)]

mod address;
mod error;
mod pack;
mod resolve;
mod validate;

pub use address::{Address, Selector};
pub use error::AddressError;
pub use pack::{apply_pack, flatten, AppliedEntry, PackApplication, ParamPack, SkippedEntry};
pub use resolve::{entity_id, resolve, Resolution};
pub use validate::{validate_pack, Issue, IssueKind, ValidationReport};
