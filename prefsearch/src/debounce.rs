//! Debounced search for keystroke-driven queries.
//!
//! Each submission gets a ticket and a child of the engine's shutdown token.
//! A newer submission cancels the pending one, so only the latest query that
//! survives the quiet window reaches the scoring worker. The callback runs on
//! the coordinator's async task once the worker hands its result back.
//!
//! ```text
//! Idle ──submit──▶ Scheduled ──window elapsed──▶ Searching ──▶ Delivered
//!                      │                            │
//!                      └──── superseded / cancel_all / dispose ──▶ Cancelled
//! ```

use crate::interface::{CategoryResults, SearchError, SearchMatch};
use crate::store::{runtime_handle, SettingsSearch};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Where the most recent submission is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebouncePhase {
    Idle,
    Scheduled,
    Searching,
    Delivered,
    Cancelled,
}

#[derive(Debug)]
struct DebounceState {
    ticket: u64,
    phase: DebouncePhase,
    pending: Option<CancellationToken>,
}

impl DebounceState {
    /// Move `ticket` to `phase` if it is still the live submission.
    /// Holding the lock across the check is what makes `cancel_all` final.
    fn advance(&mut self, ticket: u64, token: &CancellationToken, phase: DebouncePhase) -> bool {
        if self.ticket != ticket {
            return false;
        }
        if token.is_cancelled() {
            self.retire(ticket);
            return false;
        }
        self.phase = phase;
        if phase == DebouncePhase::Delivered {
            self.pending = None;
        }
        true
    }

    /// Mark `ticket` cancelled if no newer submission has replaced it
    fn retire(&mut self, ticket: u64) {
        if self.ticket == ticket {
            self.phase = DebouncePhase::Cancelled;
            self.pending = None;
        }
    }
}

/// Last-write-wins search coordinator over a shared engine
pub struct Debouncer {
    engine: Arc<SettingsSearch>,
    window: Duration,
    state: Arc<Mutex<DebounceState>>,
    runtime: Handle,
}

impl Debouncer {
    /// Coordinator using the engine's configured debounce window
    pub fn new(engine: Arc<SettingsSearch>) -> Self {
        let window = engine.config().debounce();
        Self::with_window(engine, window)
    }

    pub fn with_window(engine: Arc<SettingsSearch>, window: Duration) -> Self {
        Self {
            engine,
            window,
            state: Arc::new(Mutex::new(DebounceState {
                ticket: 0,
                phase: DebouncePhase::Idle,
                pending: None,
            })),
            runtime: runtime_handle(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn phase(&self) -> DebouncePhase {
        self.state.lock().phase
    }

    /// Schedule a ranked search for `query`, superseding any pending one.
    ///
    /// `on_result` fires at most once, only if no newer submission,
    /// `cancel_all` or dispose intervenes.
    pub fn submit<F>(&self, query: impl Into<String>, on_result: F) -> Result<(), SearchError>
    where
        F: FnOnce(Vec<SearchMatch>) + Send + 'static,
    {
        self.schedule(
            query.into(),
            |engine, query, token| engine.search_with_token(query, token),
            on_result,
        )
    }

    /// Like [`Debouncer::submit`], delivering hierarchy-preserving results
    pub fn submit_hierarchical<F>(&self, query: impl Into<String>, on_result: F) -> Result<(), SearchError>
    where
        F: FnOnce(Vec<CategoryResults>) + Send + 'static,
    {
        self.schedule(
            query.into(),
            |engine, query, token| engine.search_hierarchical_with_token(query, token),
            on_result,
        )
    }

    /// Cancel the pending submission.
    ///
    /// A submission that has not yet passed its final delivery check never
    /// calls back once this returns. A callback that already passed that check
    /// runs outside the state lock and may still be executing, or about to
    /// start, when this returns.
    pub fn cancel_all(&self) {
        let mut state = self.state.lock();
        if let Some(token) = state.pending.take() {
            token.cancel();
            state.phase = DebouncePhase::Cancelled;
        }
    }

    fn schedule<T, W, F>(&self, query: String, work: W, on_result: F) -> Result<(), SearchError>
    where
        T: Default + Send + 'static,
        W: FnOnce(&SettingsSearch, &str, &CancellationToken) -> Result<T, SearchError> + Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        if self.engine.is_disposed() {
            return Err(SearchError::Disposed);
        }

        let token = self.engine.shutdown_token().child_token();
        let ticket = {
            let mut state = self.state.lock();
            if let Some(previous) = state.pending.replace(token.clone()) {
                previous.cancel();
            }
            state.ticket += 1;
            state.phase = DebouncePhase::Scheduled;
            state.ticket
        };

        let engine = Arc::clone(&self.engine);
        let state = Arc::clone(&self.state);
        let window = self.window;

        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(ticket, "debounced search cancelled before it ran");
                    state.lock().retire(ticket);
                    return;
                }
                _ = tokio::time::sleep(window) => {}
            }

            if !state.lock().advance(ticket, &token, DebouncePhase::Searching) {
                return;
            }

            let worker_token = token.clone();
            let handle = tokio::task::spawn_blocking(move || work(&engine, &query, &worker_token));

            let value = match handle.await {
                Ok(Ok(value)) => value,
                Ok(Err(SearchError::Cancelled | SearchError::Disposed)) => {
                    state.lock().retire(ticket);
                    return;
                }
                Ok(Err(e)) => {
                    warn!(ticket, "debounced search failed: {e}");
                    T::default()
                }
                Err(join_error) => {
                    warn!(ticket, "debounced search worker failed: {join_error}");
                    T::default()
                }
            };

            if !state.lock().advance(ticket, &token, DebouncePhase::Delivered) {
                return;
            }
            on_result(value);
        });

        Ok(())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::interface::Entry;
    use crate::source::Category;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio::time::{sleep, sleep_until, Instant};

    fn engine() -> Arc<SettingsSearch> {
        let categories = vec![Category::new(
            "general",
            "General",
            Entry::root(vec![
                Entry::new("abc_mode", "ABC mode"),
                Entry::section("audio", "Audio", vec![Entry::new("bitrate", "Bitrate")]),
            ]),
        )];
        Arc::new(SettingsSearch::with_categories(SearchConfig::default(), &categories))
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_latest_submission_runs() {
        let engine = engine();
        let debouncer = Debouncer::new(Arc::clone(&engine));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = Instant::now();

        for (at_ms, query) in [(0, "a"), (100, "ab"), (120, "abc")] {
            sleep_until(start + Duration::from_millis(at_ms)).await;
            let tx = tx.clone();
            debouncer
                .submit(query, move |matches| {
                    let _ = tx.send((query, Instant::now(), matches));
                })
                .unwrap();
        }
        drop(tx);

        let (query, delivered_at, matches) = rx.recv().await.unwrap();
        let elapsed = delivered_at - start;
        assert_eq!(query, "abc");
        assert!(elapsed >= Duration::from_millis(420), "delivered after {elapsed:?}");
        assert!(elapsed < Duration::from_millis(450), "delivered after {elapsed:?}");
        assert_eq!(matches[0].entry.key, "abc_mode");

        assert!(rx.recv().await.is_none(), "superseded submissions never deliver");
        assert_eq!(engine.searches_run(), 1);
        assert_eq!(debouncer.phase(), DebouncePhase::Delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_suppresses_callback() {
        let engine = engine();
        let debouncer = Debouncer::new(Arc::clone(&engine));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        debouncer
            .submit("abc", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(debouncer.phase(), DebouncePhase::Scheduled);

        sleep(Duration::from_millis(100)).await;
        debouncer.cancel_all();
        sleep(Duration::from_secs(1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.searches_run(), 0);
        assert_eq!(debouncer.phase(), DebouncePhase::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_suppresses_pending_callback() {
        let engine = engine();
        let debouncer = Debouncer::new(Arc::clone(&engine));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        debouncer
            .submit("abc", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        engine.dispose();
        sleep(Duration::from_secs(1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(debouncer.phase(), DebouncePhase::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_submission_leaves_phase_to_newer_one() {
        let debouncer = Debouncer::new(engine());
        debouncer.submit("a", |_| {}).unwrap();
        sleep(Duration::from_millis(50)).await;
        debouncer.submit("abc", |_| {}).unwrap();
        sleep(Duration::from_millis(50)).await;

        // the first task has observed its cancellation by now
        assert_eq!(debouncer.phase(), DebouncePhase::Scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_after_delivery_keeps_delivered() {
        let debouncer = Debouncer::new(engine());
        let (tx, rx) = tokio::sync::oneshot::channel();
        debouncer
            .submit("abc", move |matches| {
                let _ = tx.send(matches.len());
            })
            .unwrap();

        assert_eq!(rx.await.unwrap(), 1);
        debouncer.cancel_all();
        assert_eq!(debouncer.phase(), DebouncePhase::Delivered);
    }

    #[tokio::test]
    async fn test_submit_after_dispose_fails_fast() {
        let engine = engine();
        let debouncer = Debouncer::new(Arc::clone(&engine));
        engine.dispose();

        let result = debouncer.submit("abc", |_| panic!("callback must not run"));
        assert!(matches!(result, Err(SearchError::Disposed)));
        assert_eq!(debouncer.phase(), DebouncePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_hierarchical_delivers_grouped_results() {
        let debouncer = Debouncer::new(engine());
        let (tx, rx) = tokio::sync::oneshot::channel();

        debouncer
            .submit_hierarchical("bitrate", move |results| {
                let _ = tx.send(results);
            })
            .unwrap();

        let results = rx.await.unwrap();
        assert_eq!(results.len(), 1);
        let keys: Vec<&str> = results[0].results.iter().map(|r| r.entry.key.as_str()).collect();
        assert_eq!(keys, vec!["audio", "bitrate"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_search_delivers_empty_list() {
        let debouncer = Debouncer::with_window(engine(), Duration::from_millis(10));
        let (tx, rx) = tokio::sync::oneshot::channel();

        debouncer
            .schedule(
                "abc".to_string(),
                |_, _, _| -> Result<Vec<SearchMatch>, SearchError> { panic!("scoring worker died") },
                move |matches| {
                    let _ = tx.send(matches);
                },
            )
            .unwrap();

        assert!(rx.await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending() {
        let engine = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let debouncer = Debouncer::new(Arc::clone(&engine));
            let counter = Arc::clone(&calls);
            debouncer
                .submit("abc", move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
