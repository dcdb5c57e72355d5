//! Strata query DSL
//!
//! Query expressions are dot-chained function terms:
//!
//! ```text
//! window(-30d:-1d).context(channel:google).case(checkout:treatment)
//! ```
//!
//! `window`, `context` and `contextAny` select which data to fetch; `case`,
//! `visited`, `visitedAny` and `exclude` are what-if selections applied to
//! the fetched values. [`parse`] turns text into a [`ConstraintSet`], whose
//! `Display` impl prints the canonical form, and [`merge`] composes two sets
//! layer on layer.
//!
//! # Example
//!
//! ```rust
//! use strata_dsl::{merge, parse};
//!
//! let base = parse("window(-30d:-1d)").unwrap();
//! let scenario = parse("context(channel:google)").unwrap();
//! assert_eq!(
//!     merge(&base, &scenario).to_string(),
//!     "window(-30d:-1d).context(channel:google)"
//! );
//! ```

#![warn(unreachable_pub)]

mod constraint;
mod error;
mod merge;
mod parser;
mod query;
mod window;

pub use constraint::{Category, ConstraintSet};
pub use error::{DslError, Result};
pub use merge::{merge, merge_all};
pub use parser::parse;
pub use query::QueryDsl;
pub use window::{Bound, ResolvedWindow, Unit, Window};
