//! SettingsSearch - main API for indexing and querying settings trees
//!
//! Async Cancellation Architecture:
//! When a caller drops the future returned by `search_async`, a DropGuard
//! cancels the search's CancellationToken. The blocking scoring worker checks
//! the token per entry and abandons the search. Disposing the engine cancels
//! the parent token, which reaches every in-flight search at once.

use crate::config::SearchConfig;
use crate::hierarchy;
use crate::indexer::{IndexSnapshot, Indexer};
use crate::interface::{BuildReport, CategoryResults, SearchError, SearchMatch};
use crate::search::search_snapshot;
use crate::source::Category;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Global fallback Tokio runtime for when async functions are called outside any runtime context.
/// Shared across all SettingsSearch instances and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("prefsearch-fallback")
        .build()
        .expect("Failed to create fallback tokio runtime")
});

static RAYON_INIT: Once = Once::new();

/// Initialize global Rayon thread pool with core reservation and lower priority
fn init_rayon() {
    RAYON_INIT.call_once(|| {
        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        // Reserve 2 cores for Tokio to ensure responsiveness, but use at least 1 thread.
        let rayon_threads = num_threads.saturating_sub(2).max(1);

        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(rayon_threads)
            .thread_name(|i| format!("prefsearch-rayon-{}", i))
            .start_handler(|_| {
                // Keystroke-driven scoring should never starve the host's threads.
                use thread_priority::*;
                let _ = set_current_thread_priority(ThreadPriority::Min);
            })
            .build_global();
    });
}

/// Get a tokio runtime handle - uses current runtime if available, otherwise global fallback
pub(crate) fn runtime_handle() -> tokio::runtime::Handle {
    tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
}

/// Run `work` on a blocking worker. A panicking worker surfaces as `SearchError::Build`.
async fn run_blocking<T, F>(work: F) -> Result<T, SearchError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match runtime_handle().spawn_blocking(work).await {
        Ok(value) => Ok(value),
        Err(join_error) => {
            warn!("blocking worker failed: {join_error}");
            Err(SearchError::Build(join_error.to_string()))
        }
    }
}

/// RAII guard that cancels a token when dropped.
struct DropGuard {
    token: CancellationToken,
}

impl DropGuard {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Thread-safe settings search engine
///
/// Concurrency Model:
/// - The index is an immutable snapshot swapped atomically on rebuild
/// - Index builds and async searches run on tokio spawn_blocking threads
/// - Scoring fans out over the global rayon pool
/// - Uses the global FALLBACK_RUNTIME when called outside any runtime
pub struct SettingsSearch {
    indexer: Arc<Indexer>,
    config: SearchConfig,
    /// Parent of every search token; cancelled on dispose
    shutdown: CancellationToken,
    searches_run: AtomicU64,
}

impl SettingsSearch {
    /// Create an engine with an empty index
    pub fn new(config: SearchConfig) -> Self {
        init_rayon();
        Self {
            indexer: Arc::new(Indexer::new()),
            config,
            shutdown: CancellationToken::new(),
            searches_run: AtomicU64::new(0),
        }
    }

    /// Create an engine and build its first index on the calling thread
    pub fn with_categories(config: SearchConfig, categories: &[Category]) -> Self {
        let engine = Self::new(config);
        engine.indexer.build(categories);
        engine
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn is_disposed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of entries in the published index
    pub fn num_entries(&self) -> usize {
        self.indexer.num_entries()
    }

    /// Generation of the published index; 0 before the first build
    pub fn generation(&self) -> u64 {
        self.indexer.snapshot().generation()
    }

    /// Number of searches that reached the scoring stage
    pub fn searches_run(&self) -> u64 {
        self.searches_run.load(Ordering::Relaxed)
    }

    /// The published snapshot. Stays valid for the holder across rebuilds.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.indexer.snapshot()
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    fn ensure_live(&self) -> Result<(), SearchError> {
        if self.is_disposed() {
            return Err(SearchError::Disposed);
        }
        Ok(())
    }
}

/// Index builds.
impl SettingsSearch {
    /// Rebuild the index on the calling thread.
    ///
    /// Once the engine is disposed the indexer is closed, so a build that was
    /// already running never publishes and this returns `Disposed`.
    pub fn rebuild_blocking(&self, categories: &[Category]) -> Result<BuildReport, SearchError> {
        self.ensure_live()?;
        let report = self.indexer.build(categories);
        self.ensure_live()?;
        Ok(report)
    }

    /// Rebuild the index on a blocking worker and resolve once it is published.
    /// Searches issued meanwhile keep using the previous snapshot.
    pub async fn rebuild(&self, categories: Vec<Category>) -> Result<BuildReport, SearchError> {
        self.ensure_live()?;
        let indexer = Arc::clone(&self.indexer);
        let report = run_blocking(move || indexer.build(&categories)).await?;
        self.ensure_live()?;
        Ok(report)
    }

    /// Fire-and-forget rebuild that reports through `on_complete`
    pub fn spawn_rebuild<F>(self: &Arc<Self>, categories: Vec<Category>, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<BuildReport, SearchError>) + Send + 'static,
    {
        let engine = Arc::clone(self);
        runtime_handle().spawn(async move {
            let result = engine.rebuild(categories).await;
            on_complete(result);
        })
    }
}

/// Search operations.
impl SettingsSearch {
    /// Ranked matches for `query` against the current snapshot, on the calling thread
    pub fn search(&self, query: &str) -> Result<Vec<SearchMatch>, SearchError> {
        let token = self.shutdown.child_token();
        self.search_with_token(query, &token)
    }

    pub(crate) fn search_with_token(&self, query: &str, token: &CancellationToken) -> Result<Vec<SearchMatch>, SearchError> {
        self.ensure_live()?;
        let snapshot = self.indexer.snapshot();
        self.searches_run.fetch_add(1, Ordering::Relaxed);
        search_snapshot(&snapshot, query, &self.config, token)
    }

    /// Ranked matches computed on a blocking worker.
    ///
    /// Dropping the returned future cancels the scoring mid-flight.
    pub async fn search_async(&self, query: String) -> Result<Vec<SearchMatch>, SearchError> {
        self.ensure_live()?;

        let token = self.shutdown.child_token();
        let _guard = DropGuard::new(token.clone());

        let snapshot = self.indexer.snapshot();
        let config = self.config.clone();
        let token_clone = token.clone();
        self.searches_run.fetch_add(1, Ordering::Relaxed);

        run_blocking(move || search_snapshot(&snapshot, &query, &config, &token_clone)).await?
    }

    /// Structural matches per category, reordered by weighted scores
    pub fn search_hierarchical(&self, query: &str) -> Result<Vec<CategoryResults>, SearchError> {
        let token = self.shutdown.child_token();
        self.search_hierarchical_with_token(query, &token)
    }

    pub(crate) fn search_hierarchical_with_token(
        &self,
        query: &str,
        token: &CancellationToken,
    ) -> Result<Vec<CategoryResults>, SearchError> {
        self.ensure_live()?;
        let snapshot = self.indexer.snapshot();
        self.searches_run.fetch_add(1, Ordering::Relaxed);

        // Scores for every match, not just the first max_results
        let unlimited = SearchConfig {
            max_results: None,
            ..self.config.clone()
        };
        let matches = search_snapshot(&snapshot, query, &unlimited, token)?;
        Ok(hierarchy::assemble(snapshot.trees(), query, &matches))
    }
}

/// Teardown.
impl SettingsSearch {
    /// Release the index and refuse further work. In-flight searches are
    /// cancelled and pending debounced callbacks never fire.
    pub fn dispose(&self) {
        self.shutdown.cancel();
        self.indexer.close();
    }
}
