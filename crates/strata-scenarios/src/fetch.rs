//! External fetch collaborator seam

use crate::cache::FetchItem;
use crate::error::FetchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strata_dsl::ConstraintSet;
use strata_params::{CachedSlice, VariantWeights};

/// Raw values returned for one item
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchedValue {
    /// Mean
    pub mean: f64,
    /// Standard deviation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdev: Option<f64>,
    /// Trials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u64>,
    /// Successes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<u64>,
    /// Variant weights, for case items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<VariantWeights>,
}

impl FetchedValue {
    /// Value with only a mean
    #[inline]
    #[must_use]
    pub fn mean(mean: f64) -> Self {
        Self {
            mean,
            ..Self::default()
        }
    }

    /// With standard deviation
    #[inline]
    #[must_use]
    pub fn with_stdev(mut self, stdev: f64) -> Self {
        self.stdev = Some(stdev);
        self
    }

    /// With trial counts
    #[inline]
    #[must_use]
    pub fn with_counts(mut self, n: u64, k: u64) -> Self {
        self.n = Some(n);
        self.k = Some(k);
        self
    }

    /// With variant weights
    #[inline]
    #[must_use]
    pub fn with_variants(mut self, variants: VariantWeights) -> Self {
        self.variants = Some(variants);
        self
    }
}

impl From<&CachedSlice> for FetchedValue {
    fn from(c: &CachedSlice) -> Self {
        Self {
            mean: c.mean,
            stdev: c.stdev,
            n: c.n,
            k: c.k,
            variants: c.variants.clone(),
        }
    }
}

/// Opaque, possibly slow transport for item data
///
/// Called at most once per item and effective fetch query within one
/// regeneration pass.
#[async_trait]
pub trait FetchClient: Send + Sync {
    /// Fetch one item for the given fetch constraints
    async fn fetch(&self, item: &FetchItem, dsl: &ConstraintSet)
        -> Result<FetchedValue, FetchError>;
}
