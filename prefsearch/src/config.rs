//! Search tuning knobs.

use serde::Deserialize;
use std::time::Duration;

/// Quiet period a query must survive before a debounced search runs.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Minimum best-word similarity for the fuzzy fallback rule.
pub const DEFAULT_FUZZY_THRESHOLD: f32 = 0.4;

/// Queries shorter than this never engage the fuzzy fallback.
pub const DEFAULT_MIN_FUZZY_QUERY_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: u64,
    /// Truncate ranked results to this many matches. `None` keeps all of them.
    pub max_results: Option<usize>,
    pub fuzzy_threshold: f32,
    pub min_fuzzy_query_len: usize,
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_results: None,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            min_fuzzy_query_len: DEFAULT_MIN_FUZZY_QUERY_LEN,
        }
    }
}
