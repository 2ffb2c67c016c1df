// ABOUTME: CacheCoordinator routes payloads to the transport or the durable cache and drains the cache.
// ABOUTME: Owns the backoff window, the single-flight upload flag, and the auto-upload policy toggles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use spool_core::{CacheConfig, Entry, UploadTransport};
use spool_store::{BackendKind, CacheBackend, FallbackQueue, JournaledStore, RawEntry};
use tokio::sync::{Mutex, MutexGuard, watch};

use crate::backoff::Backoff;

/// Everything that must change together: the backend and the backoff timer.
struct CacheState {
    backend: Box<dyn CacheBackend>,
    backoff: Backoff,
}

struct Shared {
    state: Mutex<CacheState>,
    transport: Arc<dyn UploadTransport>,
    auto_upload: AtomicBool,
    mid_session_auto_upload: AtomicBool,
    uploading: watch::Sender<bool>,
    gateway_url: String,
}

/// Point-in-time view of the cache, for status output.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub backend: String,
    pub entries_ready: usize,
    pub has_content: bool,
    pub fill_ratio: f64,
    pub uploading: bool,
    pub auto_upload: bool,
    pub mid_session_auto_upload: bool,
    pub in_backoff: bool,
    pub last_error_at: Option<DateTime<Utc>>,
}

/// Public handle for routing telemetry payloads through the durable cache.
///
/// Cheap to clone; every clone drives the same cache. Backend and backoff
/// state sit behind one async mutex that is never held across a delivery
/// attempt, so producers caching entries are not blocked by the network.
/// At most one drain runs at a time.
#[derive(Clone)]
pub struct CacheCoordinator {
    shared: Arc<Shared>,
}

/// Resets the uploading flag when a drain ends, including by panic.
struct UploadGuard<'a>(&'a watch::Sender<bool>);

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

impl CacheCoordinator {
    /// Open the journaled store at `config.cache_dir`, falling back to a
    /// bounded in-memory queue if the store cannot be created.
    pub fn open(config: &CacheConfig, transport: Arc<dyn UploadTransport>) -> Self {
        let backend: Box<dyn CacheBackend> =
            match JournaledStore::open(&config.cache_dir, config.max_cache_bytes) {
                Ok(store) => Box::new(store),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        capacity = config.fallback_capacity,
                        "journaled store unavailable, caching in memory"
                    );
                    Box::new(FallbackQueue::new(config.fallback_capacity))
                }
            };
        Self::with_backend(backend, transport, config)
    }

    /// Build a coordinator around an already-constructed backend.
    pub fn with_backend(
        backend: Box<dyn CacheBackend>,
        transport: Arc<dyn UploadTransport>,
        config: &CacheConfig,
    ) -> Self {
        let (uploading, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CacheState {
                    backend,
                    backoff: Backoff::new(config.backoff),
                }),
                transport,
                auto_upload: AtomicBool::new(config.auto_upload),
                mid_session_auto_upload: AtomicBool::new(config.mid_session_auto_upload),
                uploading,
                gateway_url: config.gateway_url.trim_end_matches('/').to_string(),
            }),
        }
    }

    pub fn auto_upload(&self) -> bool {
        self.shared.auto_upload.load(Ordering::SeqCst)
    }

    pub fn set_auto_upload(&self, enabled: bool) {
        self.shared.auto_upload.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "auto upload toggled");
    }

    pub fn mid_session_auto_upload(&self) -> bool {
        self.shared.mid_session_auto_upload.load(Ordering::SeqCst)
    }

    pub fn set_mid_session_auto_upload(&self, enabled: bool) {
        self.shared
            .mid_session_auto_upload
            .store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "mid-session auto upload toggled");
    }

    /// True while a drain is running.
    pub fn is_uploading(&self) -> bool {
        *self.shared.uploading.borrow()
    }

    pub async fn backend_kind(&self) -> BackendKind {
        self.lock().await.backend.kind()
    }

    /// True when running on the in-memory fallback instead of the journal.
    pub async fn is_degraded(&self) -> bool {
        self.backend_kind().await == BackendKind::Memory
    }

    /// Route one payload.
    ///
    /// Caches without sending when auto upload is off or a delivery failed
    /// within the backoff window. Otherwise attempts delivery: on success a
    /// background drain of the cache starts and this returns true; on
    /// failure the backoff window is armed and the payload is cached.
    pub async fn handle(&self, destination: &str, body: &str) -> bool {
        if !self.auto_upload() {
            self.cache(destination, body).await;
            return false;
        }
        self.deliver_or_cache(destination, body).await
    }

    /// Same as [`CacheCoordinator::handle`], but also caches without sending
    /// while mid-session uploads are disabled.
    pub async fn handle_mid_session(&self, destination: &str, body: &str) -> bool {
        if !self.mid_session_auto_upload() {
            self.cache(destination, body).await;
            return false;
        }
        self.handle(destination, body).await
    }

    /// Persist first, then deliver if policy allows. For payloads such as
    /// session-end batches that must survive a crash during the attempt.
    ///
    /// The payload itself is attempted, not whatever the cache would replay
    /// first. After a successful delivery its cached copy is removed only if
    /// it is the backend's next entry; otherwise a later drain sends it again.
    pub async fn send_and_cache(&self, destination: &str, body: &str) {
        let cached = self.cache(destination, body).await;

        if !self.auto_upload() {
            return;
        }
        if self.in_backoff().await {
            tracing::debug!(destination = %destination, "in backoff window, leaving entry cached");
            return;
        }
        if !self.attempt(destination, body).await {
            return;
        }

        if cached {
            let (destination_line, body_line) = Entry::new(destination, body).to_lines();
            let sent = RawEntry {
                destination: destination_line.into_bytes(),
                body: body_line.into_bytes(),
            };
            self.remove_peeked(&sent).await;
        }
        self.spawn_drain();
    }

    /// Post exit-poll answers to `<gateway>/questionSets/<name>/<version>/responses`.
    pub async fn send_exit_poll_answers(
        &self,
        name: &str,
        version: u32,
        payload: &serde_json::Value,
    ) -> bool {
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, question_set = %name, "failed to serialize exit poll answers");
                return false;
            }
        };
        let destination = self.exit_poll_destination(name, version);
        self.handle(&destination, &body).await
    }

    pub fn exit_poll_destination(&self, name: &str, version: u32) -> String {
        format!(
            "{}/questionSets/{}/{}/responses",
            self.shared.gateway_url, name, version
        )
    }

    /// Store one payload without attempting delivery. Returns false if the
    /// backend refused it (closed, full, or I/O failure).
    pub async fn cache(&self, destination: &str, body: &str) -> bool {
        let mut state = self.lock().await;
        Self::cache_locked(&mut state, destination, body)
    }

    /// Replay cached entries through the transport until the cache is empty,
    /// auto upload is switched off, or a delivery fails.
    ///
    /// Returns immediately if another drain is already running.
    pub async fn drain(&self) {
        if !self.try_begin_upload() {
            tracing::debug!("drain already in progress");
            return;
        }
        self.run_drain().await;
    }

    /// Resolve once no drain is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.uploading.subscribe();
        let _ = rx.wait_for(|uploading| !*uploading).await;
    }

    /// True while a recent failure holds deliveries back.
    pub async fn in_backoff(&self) -> bool {
        self.lock().await.backoff.is_active()
    }

    pub async fn has_content(&self) -> bool {
        self.lock().await.backend.has_content()
    }

    pub async fn fill_ratio(&self) -> f64 {
        self.lock().await.backend.fill_ratio()
    }

    /// Drop every cached entry.
    pub async fn clear(&self) {
        self.lock().await.backend.clear();
        tracing::info!("cache cleared");
    }

    pub async fn status(&self) -> CacheStatus {
        let mut state = self.lock().await;
        let has_content = state.backend.has_content();
        CacheStatus {
            backend: state.backend.kind().to_string(),
            entries_ready: state.backend.ready_count(),
            has_content,
            fill_ratio: state.backend.fill_ratio(),
            uploading: self.is_uploading(),
            auto_upload: self.auto_upload(),
            mid_session_auto_upload: self.mid_session_auto_upload(),
            in_backoff: state.backoff.is_active(),
            last_error_at: state.backoff.last_error_at(),
        }
    }

    /// Wait for any running drain, then close the backend. Later writes fail.
    pub async fn close(&self) {
        self.wait_idle().await;
        self.lock().await.backend.close();
    }

    async fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.shared.state.lock().await
    }

    async fn deliver_or_cache(&self, destination: &str, body: &str) -> bool {
        {
            let mut state = self.lock().await;
            if let Some(remaining) = state.backoff.remaining() {
                tracing::debug!(
                    destination = %destination,
                    remaining_ms = remaining.as_millis() as u64,
                    "in backoff window, caching"
                );
                Self::cache_locked(&mut state, destination, body);
                return false;
            }
        }

        if self.attempt(destination, body).await {
            self.spawn_drain();
            true
        } else {
            self.cache(destination, body).await;
            false
        }
    }

    /// One delivery attempt outside the drain. Clears the backoff window on
    /// success and arms it on failure.
    async fn attempt(&self, destination: &str, body: &str) -> bool {
        let delivered = self.shared.transport.attempt_delivery(destination, body).await;
        let mut state = self.lock().await;
        if delivered {
            state.backoff.clear();
        } else {
            state.backoff.record_failure();
            tracing::info!(
                destination = %destination,
                transport = self.shared.transport.name(),
                backoff_secs = state.backoff.window().as_secs(),
                "delivery failed, backing off"
            );
        }
        delivered
    }

    fn cache_locked(state: &mut CacheState, destination: &str, body: &str) -> bool {
        let (destination_line, body_line) = Entry::new(destination, body).to_lines();
        let stored = state.backend.write(&destination_line, &body_line);
        if !stored {
            tracing::warn!(
                destination = %destination,
                backend = %state.backend.kind(),
                "could not cache entry, payload dropped"
            );
        }
        stored
    }

    /// Claim the single-flight slot. Returns false if a drain already holds it.
    fn try_begin_upload(&self) -> bool {
        self.shared.uploading.send_if_modified(|uploading| {
            if *uploading {
                false
            } else {
                *uploading = true;
                true
            }
        })
    }

    /// Start a drain on a background task. The slot is claimed before the
    /// task is spawned so `wait_idle` callers always observe it.
    fn spawn_drain(&self) {
        if !self.try_begin_upload() {
            return;
        }
        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.run_drain().await;
        });
    }

    async fn run_drain(&self) {
        let _guard = UploadGuard(&self.shared.uploading);
        let mut delivered = 0usize;
        let mut discarded = 0usize;

        tracing::debug!(transport = self.shared.transport.name(), "drain started");

        loop {
            if !self.auto_upload() {
                tracing::debug!("auto upload disabled, stopping drain");
                break;
            }

            let raw = {
                let mut state = self.lock().await;
                if !state.backend.has_content() {
                    break;
                }
                state.backend.peek()
            };
            let Some(raw) = raw else {
                break;
            };

            let entry = match raw.decode() {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding malformed cached entry, data lost");
                    if !self.remove_peeked(&raw).await {
                        return;
                    }
                    discarded += 1;
                    continue;
                }
            };

            if self
                .shared
                .transport
                .attempt_delivery(&entry.destination, &entry.body)
                .await
            {
                self.lock().await.backoff.clear();
                delivered += 1;
                if !self.remove_peeked(&raw).await {
                    tracing::error!(delivered, "drain halted, delivered entry could not be removed");
                    return;
                }
            } else {
                self.lock().await.backoff.record_failure();
                tracing::info!(
                    delivered,
                    destination = %entry.destination,
                    "drain halted by failed delivery"
                );
                return;
            }
        }

        tracing::info!(delivered, discarded, "drain finished");
    }

    /// Pop the backend's next entry only if it is still `peeked`.
    ///
    /// Returns false when the backend failed to remove it, so callers stop
    /// instead of replaying the same entry forever.
    async fn remove_peeked(&self, peeked: &RawEntry) -> bool {
        let mut state = self.lock().await;
        if state.backend.peek().as_ref() != Some(peeked) {
            tracing::debug!("cached entry changed during delivery, leaving cache as is");
            return true;
        }
        if state.backend.pop() {
            return true;
        }
        tracing::error!(backend = %state.backend.kind(), "failed to remove entry from cache");
        false
    }
}
