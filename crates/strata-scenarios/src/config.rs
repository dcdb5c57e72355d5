//! Engine configuration

use serde::{Deserialize, Serialize};
use strata_composition::{CaptureMode, DEFAULT_EPSILON};

/// Window the cache check assumes when a query carries none
pub const DEFAULT_WINDOW: &str = "window(-30d:-1d)";

/// Tunables shared by the stack, cache evaluator and orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Diff tolerance
    pub epsilon: f64,
    /// How regeneration captures its result
    pub capture_mode: CaptureMode,
    /// Fallback window for queries without one
    pub default_window: String,
    /// Upper bound on in-flight fetches per scenario
    pub max_concurrent_fetches: usize,
    /// Colours handed out to new scenarios, round-robin
    pub palette: Vec<String>,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With diff tolerance
    #[inline]
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// With capture mode
    #[inline]
    #[must_use]
    pub fn with_capture_mode(mut self, mode: CaptureMode) -> Self {
        self.capture_mode = mode;
        self
    }

    /// With fallback window
    #[inline]
    #[must_use]
    pub fn with_default_window(mut self, window: impl Into<String>) -> Self {
        self.default_window = window.into();
        self
    }

    /// With fetch fan-out bound
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    /// With palette
    #[inline]
    #[must_use]
    pub fn with_palette(mut self, palette: Vec<String>) -> Self {
        self.palette = palette;
        self
    }

    /// Colour for the `n`th scenario created
    #[must_use]
    pub fn colour_for(&self, n: usize) -> String {
        if self.palette.is_empty() {
            return "#808080".to_string();
        }
        self.palette[n % self.palette.len()].clone()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            capture_mode: CaptureMode::Differences,
            default_window: DEFAULT_WINDOW.to_string(),
            max_concurrent_fetches: 8,
            palette: [
                "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}
