//! Search over an index snapshot
//!
//! Every candidate is scored independently, so scoring fans out over rayon and
//! checks the cancellation token per entry. Results are then stably sorted by
//! descending score: ties keep index order, which keeps results for a fixed
//! snapshot and query deterministic.

use crate::config::SearchConfig;
use crate::indexer::IndexSnapshot;
use crate::interface::{SearchError, SearchMatch};
use crate::ranking::score_candidate;
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

/// Trim and lowercase a raw query once per search
pub(crate) fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Score every entry of `snapshot` against `query`.
///
/// A blank query yields no matches. A cancelled token yields
/// `SearchError::Cancelled` rather than partial results.
pub(crate) fn search_snapshot(
    snapshot: &IndexSnapshot,
    query: &str,
    config: &SearchConfig,
    token: &CancellationToken,
) -> Result<Vec<SearchMatch>, SearchError> {
    let normalized = normalize_query(query);
    if normalized.is_empty() {
        return Ok(Vec::new());
    }
    if token.is_cancelled() {
        return Err(SearchError::Cancelled);
    }

    #[cfg(feature = "perf-log")]
    let t0 = std::time::Instant::now();

    let mut matches: Vec<SearchMatch> = snapshot
        .candidates()
        .par_iter()
        .filter_map(|candidate| {
            if token.is_cancelled() {
                return None;
            }
            score_candidate(candidate, &normalized, config)
        })
        .collect();

    if token.is_cancelled() {
        return Err(SearchError::Cancelled);
    }

    // sort_by is stable: equal scores stay in index order
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    if let Some(limit) = config.max_results {
        matches.truncate(limit);
    }

    #[cfg(feature = "perf-log")]
    tracing::debug!(
        elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0,
        candidates = snapshot.len(),
        matched = matches.len(),
        "[perf] search"
    );

    Ok(matches)
}
