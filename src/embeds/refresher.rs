//! Per-embed credential scheduler.
//!
//! An [`EmbedRefresher`] owns the local render state of one embed: the
//! current signed URL, its expiry, the last refresh error and whether a
//! refresh is in flight. It renews the URL shortly before expiry, either
//! from its poll loop or on a manual trigger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, EmbedRefreshRequest};
use crate::clock::{Clock, system_clock};
use crate::config::RefreshConfig;
use crate::store::ChatStore;
use crate::transcript::MetabaseEmbedData;

use super::error::RefreshError;
use super::lock::RefreshLock;

/// Read-only view of an embed's render state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedSnapshot {
    /// Question identifier.
    pub question_id: i64,
    /// Display title.
    pub title: String,
    /// Stable deep link.
    pub open_url: String,
    /// Current signed URL; may be stale after a failed refresh.
    pub iframe_url: String,
    /// Expiry of `iframe_url` in epoch seconds.
    pub expires_at: i64,
    /// Last refresh failure, verbatim.
    pub refresh_error: Option<String>,
    /// Whether a refresh request is outstanding.
    pub is_refreshing: bool,
}

impl EmbedSnapshot {
    /// Initial state for an embed, before any local refresh.
    #[must_use]
    pub fn from_embed(embed: &MetabaseEmbedData) -> Self {
        Self {
            question_id: embed.question_id,
            title: embed.display_title(),
            open_url: embed.open_url.clone(),
            iframe_url: embed.iframe_url.clone(),
            expires_at: embed.expires_at,
            refresh_error: None,
            is_refreshing: false,
        }
    }
}

/// What a refresh trigger did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new URL was fetched and applied.
    Refreshed,
    /// The URL is not close enough to expiry.
    NotDue,
    /// Another refresh was already outstanding; this trigger was dropped.
    AlreadyInFlight,
    /// The result arrived after teardown or after newer source data.
    Discarded,
}

/// Keeps one embed's signed URL valid.
pub struct EmbedRefresher {
    source: Mutex<MetabaseEmbedData>,
    state: watch::Sender<EmbedSnapshot>,
    lock: RefreshLock,
    generation: AtomicU64,
    backend: Arc<dyn Backend>,
    store: Arc<ChatStore>,
    config: RefreshConfig,
    clock: Clock,
    live: CancellationToken,
    recheck: Notify,
}

impl EmbedRefresher {
    /// Create a refresher for `embed`, reading the target from `store`.
    #[must_use]
    pub fn new(
        embed: MetabaseEmbedData,
        backend: Arc<dyn Backend>,
        store: Arc<ChatStore>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            state: watch::Sender::new(EmbedSnapshot::from_embed(&embed)),
            source: Mutex::new(embed),
            lock: RefreshLock::new(),
            generation: AtomicU64::new(0),
            backend,
            store,
            config,
            clock: system_clock(),
            live: CancellationToken::new(),
            recheck: Notify::new(),
        }
    }

    /// Replace the clock used for expiry checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current render state.
    #[must_use]
    pub fn snapshot(&self) -> EmbedSnapshot {
        self.state.borrow().clone()
    }

    /// Watch render state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EmbedSnapshot> {
        self.state.subscribe()
    }

    /// Whether the embed's display has been torn down.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.live.is_cancelled()
    }

    /// Tear down: stops the poll loop and discards any in-flight result.
    pub fn dispose(&self) {
        if !self.live.is_cancelled() {
            tracing::debug!(question_id = self.snapshot().question_id, "Disposing embed refresher");
            self.live.cancel();
        }
    }

    /// Whether the current URL is within the skew window at `now`.
    #[must_use]
    pub fn is_due(&self, now: i64) -> bool {
        let expires_at = self.state.borrow().expires_at;
        now >= expires_at.saturating_sub(self.config.skew_seconds)
    }

    /// Refresh if the URL expires within the skew window at `now`.
    ///
    /// # Errors
    /// Same as [`Self::refresh`].
    pub async fn maybe_refresh_at(&self, now: i64) -> Result<RefreshOutcome, RefreshError> {
        if !self.is_due(now) {
            return Ok(RefreshOutcome::NotDue);
        }
        self.refresh().await
    }

    /// [`Self::maybe_refresh_at`] with the refresher's clock.
    ///
    /// # Errors
    /// Same as [`Self::refresh`].
    pub async fn maybe_refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        self.maybe_refresh_at((self.clock)()).await
    }

    /// Request a new signed URL now.
    ///
    /// A no-op while another refresh is outstanding. On failure the previous
    /// URL is kept and the error message is recorded in the snapshot.
    ///
    /// # Errors
    /// Returns an error if no endpoint is selected or the backend call fails.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        if self.live.is_cancelled() {
            return Ok(RefreshOutcome::Discarded);
        }

        let target = self.store.target();
        if target.endpoint_url().is_none() {
            return Err(RefreshError::NoEndpoint);
        }

        let Some(_permit) = self.lock.try_acquire() else {
            tracing::debug!("Embed refresh already in flight, skipping");
            return Ok(RefreshOutcome::AlreadyInFlight);
        };

        let generation = self.generation.load(Ordering::Acquire);
        let request = {
            let source = self.source.lock().unwrap_or_else(PoisonError::into_inner);
            EmbedRefreshRequest {
                question_id: source.question_id,
                title: source.title.clone(),
            }
        };

        let _refreshing = RefreshingFlag::raise(&self.state);
        let result = self.backend.refresh_embed_credential(&target, &request).await;

        if self.live.is_cancelled() || self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!(question_id = request.question_id, "Discarding stale embed refresh");
            return Ok(RefreshOutcome::Discarded);
        }

        match result {
            Ok(credential) => {
                tracing::info!(
                    question_id = request.question_id,
                    expires_at = credential.expires_at,
                    "Embed credential refreshed"
                );
                self.state.send_modify(|state| {
                    state.iframe_url = credential.iframe_url;
                    state.expires_at = credential.expires_at;
                    state.refresh_error = None;
                });
                Ok(RefreshOutcome::Refreshed)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(question_id = request.question_id, error = %message, "Embed refresh failed");
                self.state.send_modify(|state| state.refresh_error = Some(message));
                Err(err.into())
            }
        }
    }

    /// Adopt fresh source data for this embed.
    ///
    /// When the signed URL or expiry differ from the current source, the
    /// local state is reset to the new values and any stale error cleared.
    /// Returns whether the source changed.
    pub fn reconcile(&self, embed: &MetabaseEmbedData) -> bool {
        let changed = {
            let mut source = self.source.lock().unwrap_or_else(PoisonError::into_inner);
            let changed =
                source.iframe_url != embed.iframe_url || source.expires_at != embed.expires_at;
            *source = embed.clone();
            changed
        };

        if changed {
            self.generation.fetch_add(1, Ordering::AcqRel);
            self.state.send_modify(|state| {
                *state = EmbedSnapshot {
                    is_refreshing: state.is_refreshing,
                    ..EmbedSnapshot::from_embed(embed)
                };
            });
            self.recheck.notify_one();
        } else {
            self.state.send_if_modified(|state| {
                let title = embed.display_title();
                let modified = state.title != title || state.open_url != embed.open_url;
                state.title = title;
                state.open_url.clone_from(&embed.open_url);
                modified
            });
        }
        changed
    }

    /// Start the poll loop.
    ///
    /// The first expiry check runs immediately, then every poll interval and
    /// whenever [`Self::reconcile`] adopts new source data. Must be called
    /// within a Tokio runtime.
    pub fn spawn(self: Arc<Self>) -> EmbedRefreshHandle {
        let refresher = Arc::clone(&self);
        let task = tokio::spawn(async move { refresher.run().await });
        EmbedRefreshHandle {
            refresher: self,
            task,
        }
    }

    async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.live.cancelled() => break,
                _ = ticker.tick() => {}
                () = self.recheck.notified() => {}
            }

            match self.maybe_refresh().await {
                Ok(_) | Err(RefreshError::Backend(_)) => {}
                Err(err) => tracing::debug!(%err, "Skipping embed refresh"),
            }
        }
    }
}

/// Owner of a running poll loop; dropping it tears the embed down.
pub struct EmbedRefreshHandle {
    refresher: Arc<EmbedRefresher>,
    task: JoinHandle<()>,
}

impl EmbedRefreshHandle {
    /// The refresher driven by this loop.
    #[must_use]
    pub const fn refresher(&self) -> &Arc<EmbedRefresher> {
        &self.refresher
    }

    /// Stop the poll loop.
    pub fn dispose(&self) {
        self.refresher.dispose();
    }

    /// Whether the poll loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for EmbedRefreshHandle {
    fn drop(&mut self) {
        self.refresher.dispose();
    }
}

/// Holds `is_refreshing` up for the duration of a request.
struct RefreshingFlag<'a> {
    state: &'a watch::Sender<EmbedSnapshot>,
}

impl<'a> RefreshingFlag<'a> {
    fn raise(state: &'a watch::Sender<EmbedSnapshot>) -> Self {
        state.send_modify(|state| state.is_refreshing = true);
        Self { state }
    }
}

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|state| state.is_refreshing = false);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicI64;
    use std::time::Duration;

    use super::*;
    use crate::backend::testing::ScriptedBackend;
    use crate::backend::{BackendTarget, EmbedCredential};
    use crate::clock::fixed_clock;
    use crate::transcript::EmbedKind;

    const NOW: i64 = 1_700_000_000;

    fn embed(expires_at: i64) -> MetabaseEmbedData {
        MetabaseEmbedData {
            kind: EmbedKind::MetabaseQuestion,
            question_id: 42,
            title: Some("Revenue".to_string()),
            iframe_url: "https://mb.example/embed/old".to_string(),
            open_url: "https://mb.example/question/42".to_string(),
            expires_at,
        }
    }

    fn credential(url: &str, expires_at: i64) -> EmbedCredential {
        EmbedCredential {
            iframe_url: url.to_string(),
            expires_at,
        }
    }

    fn store() -> Arc<ChatStore> {
        Arc::new(ChatStore::new(BackendTarget::new("http://localhost:7777")))
    }

    fn refresher(backend: &Arc<ScriptedBackend>, expires_at: i64) -> Arc<EmbedRefresher> {
        let backend: Arc<dyn Backend> = backend.clone();
        Arc::new(
            EmbedRefresher::new(embed(expires_at), backend, store(), RefreshConfig::default())
                .with_clock(fixed_clock(NOW)),
        )
    }

    #[tokio::test]
    async fn test_refresh_within_skew_window() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_credential(Ok(credential("https://mb.example/embed/new", NOW + 600)));
        let near = refresher(&backend, NOW + 10);

        assert_eq!(near.maybe_refresh().await.ok(), Some(RefreshOutcome::Refreshed));
        assert_eq!(backend.refreshes(), 1);

        let snapshot = near.snapshot();
        assert_eq!(snapshot.iframe_url, "https://mb.example/embed/new");
        assert_eq!(snapshot.expires_at, NOW + 600);
        assert!(!snapshot.is_refreshing);

        let request = backend.last_refresh.lock().ok().and_then(|r| r.clone());
        assert_eq!(request.map(|r| (r.question_id, r.title)), Some((42, Some("Revenue".to_string()))));
    }

    #[tokio::test]
    async fn test_no_refresh_outside_skew_window() {
        let backend = Arc::new(ScriptedBackend::new());
        let far = refresher(&backend, NOW + 3600);

        assert_eq!(far.maybe_refresh().await.ok(), Some(RefreshOutcome::NotDue));
        assert_eq!(backend.refreshes(), 0);
        assert!(far.is_due(NOW + 3570));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_refreshes_once() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_credential(Ok(credential("https://mb.example/embed/new", NOW + 3600)));
        let handle = refresher(&backend, NOW + 10).spawn();

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(backend.refreshes(), 1);
        assert_eq!(handle.refresher().snapshot().expires_at, NOW + 3600);
        assert!(!handle.is_finished());
    }

    #[tokio::test]
    async fn test_concurrent_triggers_are_single_flight() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend::gated(Arc::clone(&gate)));
        backend.push_credential(Ok(credential("https://mb.example/embed/new", NOW + 600)));
        backend.push_credential(Ok(credential("https://mb.example/embed/other", NOW + 900)));
        let r = refresher(&backend, NOW + 10);

        let (first, second, ()) = tokio::join!(r.refresh(), r.refresh(), async {
            tokio::task::yield_now().await;
            assert!(r.snapshot().is_refreshing);
            gate.notify_one();
        });

        assert_eq!(first.ok(), Some(RefreshOutcome::Refreshed));
        assert_eq!(second.ok(), Some(RefreshOutcome::AlreadyInFlight));
        assert_eq!(backend.refreshes(), 1);
        assert_eq!(r.snapshot().iframe_url, "https://mb.example/embed/new");
    }

    #[tokio::test]
    async fn test_failure_keeps_url_and_records_error() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_credential(Err("signing key unavailable"));
        backend.push_credential(Ok(credential("https://mb.example/embed/new", NOW + 600)));
        let r = refresher(&backend, NOW + 10);

        let err = r.refresh().await.err().map(|e| e.to_string());
        let snapshot = r.snapshot();
        assert!(err.as_deref().is_some_and(|e| e.contains("signing key unavailable")));
        assert_eq!(snapshot.refresh_error, err);
        assert_eq!(snapshot.iframe_url, "https://mb.example/embed/old");
        assert!(!snapshot.is_refreshing);

        assert_eq!(r.refresh().await.ok(), Some(RefreshOutcome::Refreshed));
        assert_eq!(r.snapshot().refresh_error, None);
    }

    #[tokio::test]
    async fn test_no_endpoint_is_silent() {
        let backend = Arc::new(ScriptedBackend::new());
        let store = Arc::new(ChatStore::new(BackendTarget::new("  ")));
        let dyn_backend: Arc<dyn Backend> = backend.clone();
        let r = EmbedRefresher::new(embed(NOW), dyn_backend, store, RefreshConfig::default());

        assert!(matches!(r.refresh().await, Err(RefreshError::NoEndpoint)));
        assert_eq!(backend.refreshes(), 0);
        assert_eq!(r.snapshot().refresh_error, None);
    }

    #[tokio::test]
    async fn test_reconcile_resets_local_state() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_credential(Err("expired signature"));
        let r = refresher(&backend, NOW + 3600);
        assert!(r.refresh().await.is_err());
        assert!(r.snapshot().refresh_error.is_some());

        assert!(!r.reconcile(&embed(NOW + 3600)));
        assert!(r.snapshot().refresh_error.is_some());

        let fresh = MetabaseEmbedData {
            iframe_url: "https://mb.example/embed/from-history".to_string(),
            ..embed(NOW + 7200)
        };
        assert!(r.reconcile(&fresh));
        let snapshot = r.snapshot();
        assert_eq!(snapshot.iframe_url, fresh.iframe_url);
        assert_eq!(snapshot.expires_at, NOW + 7200);
        assert_eq!(snapshot.refresh_error, None);
    }

    #[tokio::test]
    async fn test_in_flight_result_discarded_after_dispose() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend::gated(Arc::clone(&gate)));
        backend.push_credential(Ok(credential("https://mb.example/embed/new", NOW + 600)));
        let r = refresher(&backend, NOW + 10);

        let (outcome, ()) = tokio::join!(r.refresh(), async {
            tokio::task::yield_now().await;
            r.dispose();
            gate.notify_one();
        });

        assert_eq!(outcome.ok(), Some(RefreshOutcome::Discarded));
        assert_eq!(r.snapshot().iframe_url, "https://mb.example/embed/old");
        assert_eq!(backend.refreshes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_poll_loop() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_credential(Ok(credential("https://mb.example/embed/new", NOW + 600)));
        let now = Arc::new(AtomicI64::new(NOW));
        let clock: Clock = {
            let now = Arc::clone(&now);
            Arc::new(move || now.load(Ordering::SeqCst))
        };
        let dyn_backend: Arc<dyn Backend> = backend.clone();
        let handle = Arc::new(
            EmbedRefresher::new(embed(NOW + 3600), dyn_backend, store(), RefreshConfig::default())
                .with_clock(clock),
        )
        .spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.dispose();
        now.store(NOW + 7200, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(backend.refreshes(), 0);
        assert!(handle.is_finished());
        assert!(handle.refresher().is_disposed());
    }
}
