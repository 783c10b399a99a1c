//! Index candidate with memoized derived state.
//!
//! Module isolation ensures no code outside this module can mutate the entry
//! after construction, so the `OnceLock` caches can never go stale.

use crate::interface::IndexedEntry;
use std::sync::OnceLock;

/// An indexed entry plus lazily lowercased copies of its searchable fields.
/// Lowercasing happens once per snapshot instead of once per query.
#[derive(Debug)]
pub(crate) struct IndexCandidate {
    entry: IndexedEntry,
    title_lower: OnceLock<String>,
    key_lower: OnceLock<String>,
    summary_lower: OnceLock<String>,
    category_lower: OnceLock<String>,
    title_len: OnceLock<usize>,
}

impl IndexCandidate {
    pub(crate) fn new(entry: IndexedEntry) -> Self {
        Self {
            entry,
            title_lower: OnceLock::new(),
            key_lower: OnceLock::new(),
            summary_lower: OnceLock::new(),
            category_lower: OnceLock::new(),
            title_len: OnceLock::new(),
        }
    }

    pub(crate) fn entry(&self) -> &IndexedEntry {
        &self.entry
    }

    pub(crate) fn title_lower(&self) -> &str {
        self.title_lower.get_or_init(|| self.entry.title.to_lowercase())
    }

    pub(crate) fn key_lower(&self) -> &str {
        self.key_lower.get_or_init(|| self.entry.key.to_lowercase())
    }

    pub(crate) fn summary_lower(&self) -> &str {
        self.summary_lower.get_or_init(|| self.entry.summary.to_lowercase())
    }

    pub(crate) fn category_lower(&self) -> &str {
        self.category_lower
            .get_or_init(|| self.entry.category_title.to_lowercase())
    }

    /// Title length in chars, as seen by the short-title bonus
    pub(crate) fn title_len(&self) -> usize {
        *self.title_len.get_or_init(|| self.entry.title.chars().count())
    }
}
