//! Capture coordinator: the entry point for producing a new capture.
//!
//! Remote-first with a local fallback, but only for the distinguished
//! offline condition: ambiguous and server-side errors are surfaced for the
//! user to retry, never queued, so a retriable remote failure cannot turn
//! into a silent duplicate. Reads degrade to the local queue on any error
//! because reads are safe to degrade.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::domain::{CaptureKind, CaptureRecord, Severity};
use crate::notify::NotificationSink;
use crate::queue::{CaptureQueue, QueueError};
use crate::remote::{ApiError, CaptureApi};
use crate::state::Store;
use crate::sync::SyncState;

/// Errors a capture request can terminate with.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] QueueError),
}

/// Terminal outcome of a successful capture request.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// Confirmed stored by the remote service
    Remote(CaptureRecord),

    /// Persisted to the local queue while offline
    QueuedOffline(CaptureRecord),
}

impl CaptureOutcome {
    pub fn record(&self) -> &CaptureRecord {
        match self {
            Self::Remote(record) | Self::QueuedOffline(record) => record,
        }
    }
}

/// In-memory recent-captures feed.
#[derive(Debug, Clone, Default)]
pub struct CaptureFeed {
    pub captures: Vec<CaptureRecord>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Coordinates capture requests between the remote client and the local
/// queue. The only place in the crate that branches on error kind.
pub struct CaptureCoordinator {
    api: Arc<dyn CaptureApi>,
    queue: Arc<CaptureQueue>,
    sync_state: Store<SyncState>,
    notifier: Arc<dyn NotificationSink>,
    feed: Store<CaptureFeed>,
}

impl CaptureCoordinator {
    pub fn new(
        api: Arc<dyn CaptureApi>,
        queue: Arc<CaptureQueue>,
        sync_state: Store<SyncState>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            api,
            queue,
            sync_state,
            notifier,
            feed: Store::new(CaptureFeed::default()),
        }
    }

    /// Handle on the recent-captures feed.
    pub fn feed(&self) -> Store<CaptureFeed> {
        self.feed.clone()
    }

    /// Capture text content. Remote first; queued locally only when the
    /// remote client reports the distinguished offline condition.
    #[instrument(skip(self, content))]
    pub async fn capture(&self, content: &str) -> Result<CaptureOutcome, CaptureError> {
        if content.trim().is_empty() {
            self.notifier.notify("Nothing to capture", Severity::Error);
            return Err(CaptureError::Validation("empty content".to_string()));
        }

        self.feed.update(|f| {
            f.loading = true;
            f.error = None;
        });

        match self.api.capture(content, CaptureKind::Text, None).await {
            Ok(record) => {
                self.feed.update(|f| {
                    f.loading = false;
                    f.captures.insert(0, record.clone());
                });
                self.notifier.notify("Capture saved", Severity::Success);
                Ok(CaptureOutcome::Remote(record))
            }
            Err(ApiError::Offline) => self.queue_offline(content).await,
            Err(e) => {
                self.fail_feed(&e);
                self.notifier.notify("Capture failed", Severity::Error);
                Err(e.into())
            }
        }
    }

    /// Offline is an expected operating mode, not a failure: persist the
    /// capture locally and let the sync coordinator replay it later.
    async fn queue_offline(&self, content: &str) -> Result<CaptureOutcome, CaptureError> {
        debug!("Remote unreachable, queueing capture locally");

        match self.queue.add_capture(content, CaptureKind::Text) {
            Ok(record) => {
                self.feed.update(|f| f.loading = false);
                self.sync_state.update(|s| s.pending_count += 1);
                self.notifier
                    .notify("Offline: capture saved locally", Severity::Warning);
                Ok(CaptureOutcome::QueuedOffline(record))
            }
            Err(e) => {
                // Both homes rejected the write; the capture is lost
                self.fail_feed(&e);
                self.notifier.notify("Failed to save capture", Severity::Error);
                Err(e.into())
            }
        }
    }

    /// Capture a voice recording. Remote-only: audio payloads are not
    /// queued locally.
    #[instrument(skip_all)]
    pub async fn capture_voice(
        &self,
        audio: Vec<u8>,
        mime: &str,
    ) -> Result<CaptureRecord, CaptureError> {
        self.feed.update(|f| {
            f.loading = true;
            f.error = None;
        });

        match self.api.capture_voice(audio, mime).await {
            Ok(record) => {
                self.feed.update(|f| {
                    f.loading = false;
                    f.captures.insert(0, record.clone());
                });
                self.notifier
                    .notify("Voice capture transcribed and saved", Severity::Success);
                Ok(record)
            }
            Err(e) => {
                self.fail_feed(&e);
                self.notifier
                    .notify("Voice capture failed", Severity::Error);
                Err(e.into())
            }
        }
    }

    /// Load recent captures into the feed. Falls back to the local queue on
    /// any remote failure, unconditional on error kind.
    #[instrument(skip(self))]
    pub async fn load_captures(&self, limit: u64) -> Result<Vec<CaptureRecord>, CaptureError> {
        self.feed.update(|f| f.loading = true);

        match self.api.timeline(limit).await {
            Ok(captures) => {
                self.feed.update(|f| {
                    f.loading = false;
                    f.error = None;
                    f.captures = captures.clone();
                });
                Ok(captures)
            }
            Err(e) => {
                warn!("Timeline unavailable, falling back to local store: {e}");

                match self.queue.all_captures(limit) {
                    Ok(captures) => {
                        self.feed.update(|f| {
                            f.loading = false;
                            f.error = None;
                            f.captures = captures.clone();
                        });
                        Ok(captures)
                    }
                    Err(db_err) => {
                        self.fail_feed(&db_err);
                        Err(db_err.into())
                    }
                }
            }
        }
    }

    /// Best-effort search against the remote. An empty query returns an
    /// empty result without a remote call; failures degrade to empty.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Vec<CaptureRecord> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        match self.api.search(query).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Search failed: {e}");
                Vec::new()
            }
        }
    }

    /// Reset the feed.
    pub fn clear(&self) {
        self.feed.set(CaptureFeed::default());
    }

    fn fail_feed(&self, error: &dyn std::fmt::Display) {
        let message = error.to_string();
        self.feed.update(|f| {
            f.loading = false;
            f.error = Some(message);
        });
    }
}
