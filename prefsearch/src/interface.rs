//! Settings Search Interface Definition
//!
//! Types shared between the index, the search engine and the host that feeds
//! it trees and renders its results. The host owns rendering; everything here
//! is plain data that can be serialized for inspection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Scoring rule that contributed to a match.
///
/// Weights are ordered so exact title/key matches outrank substring matches,
/// which outrank the fuzzy fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    TitleExact,
    TitleStart,
    TitleContains,
    KeyExact,
    KeyContains,
    SummaryExact,
    SummaryContains,
    CategoryMatch,
    Fuzzy,
}

impl MatchField {
    /// Base weight added to an entry's score when this rule matches
    pub const fn weight(self) -> f32 {
        match self {
            MatchField::TitleExact => 10.0,
            MatchField::TitleStart => 8.0,
            MatchField::TitleContains => 5.0,
            MatchField::KeyExact => 9.0,
            MatchField::KeyContains => 6.0,
            MatchField::SummaryExact => 7.0,
            MatchField::SummaryContains => 4.0,
            MatchField::CategoryMatch => 3.0,
            MatchField::Fuzzy => 2.0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// One node of a host-supplied settings tree.
///
/// The root node of a category tree stands for the settings screen itself and
/// is never indexed; its children are the top-level entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    /// Marks an expandable section even when it has no children.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub group: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Entry>,
}

impl Entry {
    /// Create a leaf entry
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Create a section that groups `children`
    pub fn section(key: impl Into<String>, title: impl Into<String>, children: Vec<Entry>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            group: true,
            children,
            ..Self::default()
        }
    }

    /// Create a screen root holding top-level entries
    pub fn root(children: Vec<Entry>) -> Self {
        Self {
            group: true,
            children,
            ..Self::default()
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn is_group(&self) -> bool {
        self.group || !self.children.is_empty()
    }
}

/// Immutable snapshot of one settings entry at index time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedEntry {
    /// May be empty for container-only nodes
    pub key: String,
    pub title: String,
    pub summary: String,
    pub category_key: String,
    pub category_title: String,
    pub is_group: bool,
    /// 0 = top level within its category tree
    pub depth: usize,
    /// Key of the enclosing group; `None` at depth 0 or when the group has no key
    pub parent_key: Option<String>,
}

/// Result of scoring one entry against one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMatch {
    pub entry: IndexedEntry,
    pub score: f32,
    pub matched_fields: BTreeSet<MatchField>,
}

/// Entry from the structural recall pass, with nesting preserved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchicalResult {
    pub entry: IndexedEntry,
    /// True for expandable groups, whether they matched directly or through a descendant
    pub is_parent: bool,
    /// Weighted score from the search engine, if it matched the entry at all
    pub score: Option<f32>,
}

impl HierarchicalResult {
    pub fn parent_key(&self) -> Option<&str> {
        self.entry.parent_key.as_deref()
    }
}

/// Hierarchical results of one category, in display order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryResults {
    pub category_key: String,
    pub category_title: String,
    pub results: Vec<HierarchicalResult>,
}

/// Outcome of one index build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub generation: u64,
    /// Number of indexed entries in the new snapshot
    pub entries: usize,
    /// Categories whose trees failed to load and were left out
    pub skipped: Vec<String>,
    /// False when a newer build had already been published
    pub published: bool,
}

/// Error type for search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search engine has been disposed")]
    Disposed,
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Background worker failed: {0}")]
    Build(String),
}
