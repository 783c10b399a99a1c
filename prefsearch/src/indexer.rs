//! Index builder for settings trees
//!
//! Flattens each category tree depth-first, pre-order, into an immutable
//! [`IndexSnapshot`]. The [`Indexer`] publishes snapshots by swapping an `Arc`
//! under a write lock, so a reader holds either the old complete snapshot or
//! the new complete one. Searches clone the `Arc` and never block a rebuild.

use crate::candidate::IndexCandidate;
use crate::interface::{BuildReport, Entry, IndexedEntry};
use crate::source::Category;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// A category tree as it was loaded for a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTree {
    pub key: String,
    pub title: String,
    pub root: Entry,
}

/// Immutable, fully built index generation
#[derive(Debug)]
pub struct IndexSnapshot {
    generation: u64,
    candidates: Vec<IndexCandidate>,
    trees: Vec<CategoryTree>,
}

impl IndexSnapshot {
    pub(crate) fn empty(generation: u64) -> Self {
        Self {
            generation,
            candidates: Vec::new(),
            trees: Vec::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Indexed entries in index order
    pub fn entries(&self) -> impl Iterator<Item = &IndexedEntry> {
        self.candidates.iter().map(IndexCandidate::entry)
    }

    /// The trees this snapshot was built from, for structural search
    pub fn trees(&self) -> &[CategoryTree] {
        &self.trees
    }

    pub(crate) fn candidates(&self) -> &[IndexCandidate] {
        &self.candidates
    }
}

/// Flatten one category tree into indexed entries.
///
/// The root stands for the category screen and is not emitted; its children
/// are depth 0. Groups precede their children and siblings keep source order.
pub fn flatten_tree(category_key: &str, category_title: &str, root: &Entry) -> Vec<IndexedEntry> {
    let mut entries = Vec::new();
    collect_entries(root, category_key, category_title, None, 0, &mut entries);
    entries
}

fn collect_entries(
    group: &Entry,
    category_key: &str,
    category_title: &str,
    parent_key: Option<&str>,
    depth: usize,
    out: &mut Vec<IndexedEntry>,
) {
    for child in &group.children {
        out.push(IndexedEntry {
            key: child.key.clone(),
            title: child.title.clone(),
            summary: child.summary.clone(),
            category_key: category_key.to_string(),
            category_title: category_title.to_string(),
            is_group: child.is_group(),
            depth,
            parent_key: parent_key.map(str::to_string),
        });

        if child.is_group() {
            let child_key = Some(child.key.as_str()).filter(|key| !key.is_empty());
            collect_entries(child, category_key, category_title, child_key, depth + 1, out);
        }
    }
}

/// Build a snapshot from `categories`. Categories whose tree fails to load are
/// logged and skipped; their keys are returned alongside the snapshot.
pub(crate) fn build_snapshot(categories: &[Category], generation: u64) -> (IndexSnapshot, Vec<String>) {
    let mut candidates = Vec::new();
    let mut trees = Vec::with_capacity(categories.len());
    let mut skipped = Vec::new();

    for category in categories {
        let root = match category.load() {
            Ok(root) => root,
            Err(e) => {
                error!(category = category.key(), "failed to load settings tree: {e}");
                skipped.push(category.key().to_string());
                continue;
            }
        };

        candidates.extend(
            flatten_tree(category.key(), category.title(), &root)
                .into_iter()
                .map(IndexCandidate::new),
        );
        trees.push(CategoryTree {
            key: category.key().to_string(),
            title: category.title().to_string(),
            root,
        });
    }

    let snapshot = IndexSnapshot {
        generation,
        candidates,
        trees,
    };
    (snapshot, skipped)
}

/// Owner of the published snapshot
pub struct Indexer {
    current: RwLock<Arc<IndexSnapshot>>,
    next_generation: AtomicU64,
    /// Set under the write lock; a closed indexer never publishes again
    closed: AtomicBool,
}

impl Indexer {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexSnapshot::empty(0))),
            next_generation: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// The latest published snapshot
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn num_entries(&self) -> usize {
        self.current.read().len()
    }

    /// Build and publish a new generation. Runs on the calling thread.
    ///
    /// If a build that started later has already been published, or the
    /// indexer was closed meanwhile, this one is dropped and the report says so.
    pub fn build(&self, categories: &[Category]) -> BuildReport {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);

        #[cfg(feature = "perf-log")]
        let t0 = std::time::Instant::now();
        let (snapshot, skipped) = build_snapshot(categories, generation);
        let entries = snapshot.len();
        let published = self.publish(snapshot);

        #[cfg(feature = "perf-log")]
        debug!(
            generation,
            elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0,
            "[perf] index build"
        );
        debug!(generation, entries, skipped = skipped.len(), published, "settings index built");

        BuildReport {
            generation,
            entries,
            skipped,
            published,
        }
    }

    /// Release the published snapshot and refuse every later publish,
    /// including builds already in progress
    pub fn close(&self) {
        let mut current = self.current.write();
        self.closed.store(true, Ordering::SeqCst);
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        *current = Arc::new(IndexSnapshot::empty(generation));
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn publish(&self, snapshot: IndexSnapshot) -> bool {
        let mut current = self.current.write();
        if self.closed.load(Ordering::SeqCst) || snapshot.generation <= current.generation {
            return false;
        }
        *current = Arc::new(snapshot);
        true
    }
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{TreeError, TreeSource};

    struct FailingSource;

    impl TreeSource for FailingSource {
        fn load(&self) -> Result<Entry, TreeError> {
            Err(TreeError::Manifest("unreadable".to_string()))
        }
    }

    fn downloads_tree() -> Entry {
        Entry::root(vec![
            Entry::new("download_dir", "Download location"),
            Entry::section(
                "audio",
                "Audio",
                vec![
                    Entry::new("bitrate", "Bitrate"),
                    Entry::section("codec", "Codec", vec![Entry::new("opus", "Prefer Opus")]),
                ],
            ),
            Entry::new("proxy", "Proxy"),
        ])
    }

    #[test]
    fn test_flatten_pre_order_with_depth_and_parent() {
        let entries = flatten_tree("downloading", "Downloading", &downloads_tree());
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["download_dir", "audio", "bitrate", "codec", "opus", "proxy"]);

        let depths: Vec<usize> = entries.iter().map(|e| e.depth).collect();
        assert_eq!(depths, vec![0, 0, 1, 1, 2, 0]);

        assert_eq!(entries[0].parent_key, None);
        assert_eq!(entries[2].parent_key.as_deref(), Some("audio"));
        assert_eq!(entries[4].parent_key.as_deref(), Some("codec"));
        assert!(entries[1].is_group);
        assert!(!entries[2].is_group);
        assert!(entries.iter().all(|e| e.category_title == "Downloading"));
    }

    #[test]
    fn test_flatten_empty_group_key_has_no_parent_key() {
        let root = Entry::root(vec![Entry::section("", "", vec![Entry::new("theme", "Theme")])]);
        let entries = flatten_tree("appearance", "Appearance", &root);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].parent_key, None);
        assert_eq!(entries[1].depth, 1);
    }

    #[test]
    fn test_flatten_keeps_explicit_empty_group() {
        let root = Entry::root(vec![Entry::section("advanced", "Advanced", Vec::new())]);
        let entries = flatten_tree("general", "General", &root);
        assert!(entries[0].is_group);
    }

    #[test]
    fn test_build_skips_failing_category() {
        let categories = vec![
            Category::from_source("broken", "Broken", Arc::new(FailingSource)),
            Category::new("downloading", "Downloading", downloads_tree()),
        ];
        let indexer = Indexer::new();

        let report = indexer.build(&categories);

        assert_eq!(report.skipped, vec!["broken".to_string()]);
        assert_eq!(report.entries, 6);
        assert!(report.published);
        let snapshot = indexer.snapshot();
        assert_eq!(snapshot.trees().len(), 1);
        assert!(snapshot.entries().all(|e| e.category_key == "downloading"));
    }

    #[test]
    fn test_rebuild_replaces_snapshot_and_old_readers_keep_theirs() {
        let indexer = Indexer::new();
        indexer.build(&[Category::new("downloading", "Downloading", downloads_tree())]);
        let old = indexer.snapshot();

        let report = indexer.build(&[Category::new(
            "appearance",
            "Appearance",
            Entry::root(vec![Entry::new("theme", "Theme")]),
        )]);

        assert_eq!(old.len(), 6);
        assert_eq!(indexer.snapshot().len(), 1);
        assert!(indexer.snapshot().generation() > old.generation());
        assert_eq!(report.generation, indexer.snapshot().generation());
    }

    #[test]
    fn test_stale_generation_not_published() {
        let indexer = Indexer::new();
        let (stale, _) = build_snapshot(&[Category::new("downloading", "Downloading", downloads_tree())], 1);
        indexer.build(&[]);
        indexer.build(&[]);

        assert!(!indexer.publish(stale));
        assert_eq!(indexer.snapshot().generation(), 2);
    }

    #[test]
    fn test_close_publishes_empty_snapshot() {
        let indexer = Indexer::new();
        indexer.build(&[Category::new("downloading", "Downloading", downloads_tree())]);
        indexer.close();
        assert!(indexer.is_closed());
        assert!(indexer.snapshot().is_empty());
        assert_eq!(indexer.num_entries(), 0);
    }

    #[test]
    fn test_closed_indexer_refuses_builds() {
        let indexer = Indexer::new();
        indexer.close();

        let report = indexer.build(&[Category::new("downloading", "Downloading", downloads_tree())]);

        assert!(!report.published);
        assert!(indexer.snapshot().is_empty());
    }

    #[test]
    fn test_build_in_progress_when_closed_is_not_published() {
        let (snapshot, _) = build_snapshot(&[Category::new("downloading", "Downloading", downloads_tree())], 0);
        let indexer = Indexer::new();
        let generation = indexer.next_generation.fetch_add(1, Ordering::SeqCst);
        let pending = IndexSnapshot { generation, ..snapshot };

        indexer.close();

        assert!(!indexer.publish(pending));
        assert!(indexer.snapshot().is_empty());
    }
}
