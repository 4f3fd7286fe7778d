//! Diagnostics reconciliation: push notifications raced against a polling
//! fallback.
//!
//! Servers are supposed to push `textDocument/publishDiagnostics`, but not
//! all of them do so promptly (or at all) for every document. Each tracked
//! document moves through `AwaitingFirstResult → Ready`; a waiter first
//! gives the push path an event window (scaled up for large documents),
//! then falls back to re-checking on an interval. An empty result is only
//! trusted as "no diagnostics" after a minimum number of checks, because
//! early emptiness can mean "not analyzed yet".

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;

use sextant_types::{Diagnostic, DiagnosticSet, DiagnosticsConfig, DiagnosticsOrigin};

use crate::error::ClientError;

/// Tracking phase for one document. Untracked documents are simply absent
/// from the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocPhase {
    /// Tracked, but no result has arrived since the last open/update.
    AwaitingFirstResult,
    /// At least one result has arrived; the stored set is current.
    Ready,
}

#[derive(Debug)]
struct Entry {
    phase: DocPhase,
    set: Option<DiagnosticSet>,
}

/// Latest-known diagnostics per document, shared between the reader task
/// (push path) and waiting tool calls (poll path).
///
/// A `watch` generation counter wakes waiters on every mutation; waiters
/// re-check state rather than consuming events, so missed wake-ups cannot
/// lose results.
pub(crate) struct SharedDiagnostics {
    entries: std::sync::Mutex<HashMap<String, Entry>>,
    generation: watch::Sender<u64>,
    dead: std::sync::atomic::AtomicBool,
}

impl SharedDiagnostics {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            entries: std::sync::Mutex::new(HashMap::new()),
            generation,
            dead: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn bump(&self) {
        self.generation.send_modify(|g| *g += 1);
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Store a pushed diagnostic set and mark the document ready.
    pub fn record_push(&self, uri: &str, path: PathBuf, diagnostics: Vec<Diagnostic>) {
        let set = DiagnosticSet::new(path, diagnostics, DiagnosticsOrigin::Pushed);
        self.entries.lock().expect("diagnostics lock").insert(
            uri.to_string(),
            Entry {
                phase: DocPhase::Ready,
                set: Some(set),
            },
        );
        self.bump();
    }

    /// Start (or restart) tracking after an open/update: any previous
    /// result is stale for the new content.
    pub fn reset(&self, uri: &str) {
        self.entries.lock().expect("diagnostics lock").insert(
            uri.to_string(),
            Entry {
                phase: DocPhase::AwaitingFirstResult,
                set: None,
            },
        );
        self.bump();
    }

    /// Drop all state for the document (on close), so a later reopen
    /// starts from a clean slate instead of serving stale results.
    pub fn clear(&self, uri: &str) {
        self.entries.lock().expect("diagnostics lock").remove(uri);
        self.bump();
    }

    /// The current set, only when a real result has arrived.
    pub fn ready_snapshot(&self, uri: &str) -> Option<DiagnosticSet> {
        let entries = self.entries.lock().expect("diagnostics lock");
        entries
            .get(uri)
            .filter(|entry| entry.phase == DocPhase::Ready)
            .and_then(|entry| entry.set.clone())
    }

    fn is_tracked(&self, uri: &str) -> bool {
        self.entries
            .lock()
            .expect("diagnostics lock")
            .contains_key(uri)
    }

    /// Wake all waiters permanently; called when the server process dies.
    pub fn mark_dead(&self) {
        self.dead.store(true, std::sync::atomic::Ordering::Release);
        self.bump();
    }

    fn is_dead(&self) -> bool {
        self.dead.load(std::sync::atomic::Ordering::Acquire)
    }
}

/// Wait for a confident diagnostic result for `uri`, racing the push path
/// against the polling fallback. Never blocks past `timeout`.
pub(crate) async fn wait_for(
    shared: &SharedDiagnostics,
    uri: &str,
    path: &Path,
    document_bytes: usize,
    config: &DiagnosticsConfig,
    timeout: Duration,
) -> Result<DiagnosticSet, ClientError> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut rx = shared.subscribe();

    // Event window: give the push path first claim.
    let event_window = config.event_window(document_bytes).min(timeout);
    let event_deadline = tokio::time::Instant::now() + event_window;
    loop {
        if shared.is_dead() {
            return Err(ClientError::ProcessExited);
        }
        if let Some(set) = shared.ready_snapshot(uri) {
            return Ok(set);
        }
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Err(ClientError::ProcessExited);
                }
            }
            () = tokio::time::sleep_until(event_deadline) => break,
        }
    }

    // Poll fallback: re-check on an interval. A push arriving mid-poll
    // still wins; emptiness is only trusted after min_poll_count checks.
    let mut polls: u32 = 0;
    while polls < config.max_polls && tokio::time::Instant::now() < deadline {
        polls += 1;

        if shared.is_dead() {
            return Err(ClientError::ProcessExited);
        }
        if let Some(set) = shared.ready_snapshot(uri) {
            return Ok(set);
        }
        if polls >= config.min_poll_count && shared.is_tracked(uri) {
            return Ok(DiagnosticSet::new(
                path.to_path_buf(),
                Vec::new(),
                DiagnosticsOrigin::Polled,
            ));
        }

        let wake = (tokio::time::Instant::now() + config.poll_interval()).min(deadline);
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Err(ClientError::ProcessExited);
                }
            }
            () = tokio::time::sleep_until(wake) => {}
        }
    }

    Err(ClientError::DiagnosticsTimeout {
        path: path.to_path_buf(),
        timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sextant_types::{DiagnosticSeverity, Position, Range};
    use std::sync::Arc;

    const URI: &str = "file:///src/app.ts";

    fn test_path() -> PathBuf {
        PathBuf::from("/src/app.ts")
    }

    fn make_diag(msg: &str) -> Diagnostic {
        Diagnostic::new(
            DiagnosticSeverity::Error,
            msg.to_string(),
            Range::new(Position::new(1, 7), Position::new(1, 8)),
            Some("2322".to_string()),
            "typescript".to_string(),
        )
    }

    fn fast_config() -> DiagnosticsConfig {
        serde_json::from_value(serde_json::json!({
            "event_timeout_ms": 100,
            "poll_interval_ms": 20,
            "max_polls": 10,
            "min_poll_count": 3
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_before_wait_returns_immediately() {
        let shared = SharedDiagnostics::new();
        shared.reset(URI);
        shared.record_push(URI, test_path(), vec![make_diag("type mismatch")]);

        let set = wait_for(
            &shared,
            URI,
            &test_path(),
            0,
            &fast_config(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(set.origin(), DiagnosticsOrigin::Pushed);
        assert_eq!(set.error_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_during_event_window_wins_race() {
        let shared = Arc::new(SharedDiagnostics::new());
        shared.reset(URI);

        let pusher = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                shared.record_push(URI, test_path(), vec![make_diag("late push")]);
            })
        };

        let set = wait_for(
            &shared,
            URI,
            &test_path(),
            0,
            &fast_config(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(set.origin(), DiagnosticsOrigin::Pushed);
        assert_eq!(set.diagnostics()[0].message(), "late push");
        pusher.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_during_poll_phase_still_wins() {
        let shared = Arc::new(SharedDiagnostics::new());
        shared.reset(URI);

        let config = fast_config();
        // Push arrives after the event window but before the empty result
        // becomes trustworthy.
        let pusher = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(110)).await;
                shared.record_push(URI, test_path(), vec![make_diag("poll-phase push")]);
            })
        };

        let set = wait_for(
            &shared,
            URI,
            &test_path(),
            0,
            &config,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(set.origin(), DiagnosticsOrigin::Pushed);
        pusher.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_push_yields_confident_empty_after_min_polls() {
        let shared = SharedDiagnostics::new();
        shared.reset(URI);

        let set = wait_for(
            &shared,
            URI,
            &test_path(),
            0,
            &fast_config(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert!(set.is_empty());
        assert_eq!(set.origin(), DiagnosticsOrigin::Polled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untracked_uri_times_out_distinctly() {
        let shared = SharedDiagnostics::new();
        // No reset: the document was never opened (or was closed).

        let err = wait_for(
            &shared,
            URI,
            &test_path(),
            0,
            &fast_config(),
            Duration::from_millis(500),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::DiagnosticsTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_timeout_bounds_the_wait() {
        let shared = SharedDiagnostics::new();
        shared.reset(URI);

        let config: DiagnosticsConfig = serde_json::from_value(serde_json::json!({
            // min_poll_count can never be reached before the caller deadline.
            "event_timeout_ms": 50,
            "poll_interval_ms": 100,
            "max_polls": 100,
            "min_poll_count": 50
        }))
        .unwrap();

        let started = tokio::time::Instant::now();
        let err = wait_for(
            &shared,
            URI,
            &test_path(),
            0,
            &config,
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::DiagnosticsTimeout { .. }));
        assert!(started.elapsed() <= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_invalidates_previous_result() {
        let shared = SharedDiagnostics::new();
        shared.record_push(URI, test_path(), vec![make_diag("old content error")]);
        assert!(shared.ready_snapshot(URI).is_some());

        // New content: the old set must not satisfy the next wait.
        shared.reset(URI);
        assert!(shared.ready_snapshot(URI).is_none());

        let set = wait_for(
            &shared,
            URI,
            &test_path(),
            0,
            &fast_config(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert!(set.is_empty(), "stale push must not leak through a reset");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_removes_tracking_entirely() {
        let shared = SharedDiagnostics::new();
        shared.reset(URI);
        shared.record_push(URI, test_path(), vec![make_diag("x")]);
        shared.clear(URI);
        assert!(shared.ready_snapshot(URI).is_none());
        assert!(!shared.is_tracked(URI));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_dead_fails_waiters() {
        let shared = Arc::new(SharedDiagnostics::new());
        shared.reset(URI);

        let killer = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                shared.mark_dead();
            })
        };

        let err = wait_for(
            &shared,
            URI,
            &test_path(),
            0,
            &fast_config(),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::ProcessExited));
        killer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_document_extends_event_window() {
        let shared = Arc::new(SharedDiagnostics::new());
        shared.reset(URI);
        let config = fast_config();

        // Push at 250ms: past the base 100ms window, but within the
        // large-file window (300ms) — and before 3 polls elapse.
        let pusher = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(250)).await;
                shared.record_push(URI, test_path(), vec![make_diag("slow analysis")]);
            })
        };

        let set = wait_for(
            &shared,
            URI,
            &test_path(),
            config.large_file_bytes,
            &config,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(set.origin(), DiagnosticsOrigin::Pushed);
        pusher.await.unwrap();
    }
}
