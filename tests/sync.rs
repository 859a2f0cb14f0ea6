//! Synchronization Coordinator Integration Tests
//!
//! Exercises drain batch isolation, the pending-count invariant, the
//! reentrancy guard, and the auto-sync trigger on reachability transitions.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use quickcap::{
    ApiError, CaptureApi, CaptureKind, CaptureQueue, CaptureRecord, LogSink, NotificationSink,
    ReachabilityMonitor, Severity, Store, SyncCoordinator, SyncState, SyncStatus,
};

/// Remote that rejects a chosen set of contents and accepts the rest.
struct SelectiveApi {
    reject: HashSet<String>,
    accepted: Mutex<Vec<String>>,
    calls: AtomicU64,
}

impl SelectiveApi {
    fn new(reject: &[&str]) -> Self {
        Self {
            reject: reject.iter().map(|s| s.to_string()).collect(),
            accepted: Mutex::new(Vec::new()),
            calls: AtomicU64::new(0),
        }
    }

    fn accept_all() -> Self {
        Self::new(&[])
    }
}

#[async_trait]
impl CaptureApi for SelectiveApi {
    async fn capture(
        &self,
        content: &str,
        kind: CaptureKind,
        client_ref: Option<&str>,
    ) -> Result<CaptureRecord, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.reject.contains(content) {
            return Err(ApiError::Http {
                status: 500,
                message: "rejected".to_string(),
            });
        }

        self.accepted.lock().unwrap().push(content.to_string());

        Ok(CaptureRecord {
            id: client_ref.map(|r| format!("r-{r}")).unwrap_or_else(|| "r".to_string()),
            content: content.to_string(),
            kind,
            created_at: Utc::now(),
            status: SyncStatus::Synced,
            synced_at: Some(Utc::now()),
            error: None,
        })
    }

    async fn capture_voice(&self, _audio: Vec<u8>, _mime: &str) -> Result<CaptureRecord, ApiError> {
        Err(ApiError::Offline)
    }

    async fn timeline(&self, _limit: u64) -> Result<Vec<CaptureRecord>, ApiError> {
        Ok(Vec::new())
    }

    async fn search(&self, _query: &str) -> Result<Vec<CaptureRecord>, ApiError> {
        Ok(Vec::new())
    }

    async fn health(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

fn coordinator_with(api: Arc<dyn CaptureApi>, queue: Arc<CaptureQueue>) -> Arc<SyncCoordinator> {
    let pending = queue.stats().unwrap().unsynced;
    Arc::new(SyncCoordinator::new(
        queue,
        api,
        Store::new(SyncState::new(true, pending)),
        Arc::new(LogSink) as Arc<dyn NotificationSink>,
    ))
}

#[tokio::test]
async fn test_drain_replays_snapshot_in_insertion_order() {
    let queue = Arc::new(CaptureQueue::open_in_memory().unwrap());
    queue.add_capture("first", CaptureKind::Text).unwrap();
    queue.add_capture("second", CaptureKind::Text).unwrap();
    queue.add_capture("third", CaptureKind::Text).unwrap();

    let api = Arc::new(SelectiveApi::accept_all());
    let sync = coordinator_with(Arc::clone(&api) as Arc<dyn CaptureApi>, Arc::clone(&queue));

    let report = sync.sync_offline_captures().await.unwrap();

    assert_eq!(report.synced, 3);
    assert_eq!(
        *api.accepted.lock().unwrap(),
        vec!["first", "second", "third"]
    );
}

#[tokio::test]
async fn test_one_failure_does_not_abort_the_batch() {
    let queue = Arc::new(CaptureQueue::open_in_memory().unwrap());
    queue.add_capture("good-a", CaptureKind::Text).unwrap();
    queue.add_capture("poison", CaptureKind::Text).unwrap();
    queue.add_capture("good-b", CaptureKind::Text).unwrap();

    let api = Arc::new(SelectiveApi::new(&["poison"]));
    let sync = coordinator_with(Arc::clone(&api) as Arc<dyn CaptureApi>, Arc::clone(&queue));

    let report = sync.sync_offline_captures().await.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.synced, 2);
    assert_eq!(report.failed, 1);

    // good-b, after the failure, was still synced
    let pending = queue.unsynced().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].content, "poison");
    assert!(pending[0].error.is_some());

    // Pending count ends at 1, last-sync-time is updated regardless
    let state = sync.state().get();
    assert_eq!(state.pending_count, 1);
    assert!(state.last_sync_time.is_some());
    assert!(!state.syncing);
}

#[tokio::test]
async fn test_pending_count_zero_after_clean_drain() {
    let queue = Arc::new(CaptureQueue::open_in_memory().unwrap());
    for i in 0..5 {
        queue
            .add_capture(&format!("note {i}"), CaptureKind::Text)
            .unwrap();
    }

    let api = Arc::new(SelectiveApi::accept_all());
    let sync = coordinator_with(api as Arc<dyn CaptureApi>, Arc::clone(&queue));

    let report = sync.sync_offline_captures().await.unwrap();

    assert_eq!(report.synced, 5);
    assert_eq!(sync.state().get().pending_count, 0);
    assert_eq!(queue.stats().unwrap().unsynced, 0);
}

#[tokio::test]
async fn test_failed_records_are_retried_on_next_drain() {
    let queue = Arc::new(CaptureQueue::open_in_memory().unwrap());
    queue.add_capture("flaky", CaptureKind::Text).unwrap();

    // First drain: remote rejects
    let rejecting = Arc::new(SelectiveApi::new(&["flaky"]));
    let sync = coordinator_with(rejecting as Arc<dyn CaptureApi>, Arc::clone(&queue));
    let report = sync.sync_offline_captures().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(queue.stats().unwrap().unsynced, 1);

    // Second drain with a healthy remote picks the record back up
    let accepting = Arc::new(SelectiveApi::accept_all());
    let sync = coordinator_with(accepting as Arc<dyn CaptureApi>, Arc::clone(&queue));
    let report = sync.sync_offline_captures().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(queue.stats().unwrap().unsynced, 0);
}

/// Remote whose capture calls block until released, to hold a drain open.
struct GatedApi {
    gate: tokio::sync::Semaphore,
    inner: SelectiveApi,
}

impl GatedApi {
    fn new() -> Self {
        Self {
            gate: tokio::sync::Semaphore::new(0),
            inner: SelectiveApi::accept_all(),
        }
    }

    fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

#[async_trait]
impl CaptureApi for GatedApi {
    async fn capture(
        &self,
        content: &str,
        kind: CaptureKind,
        client_ref: Option<&str>,
    ) -> Result<CaptureRecord, ApiError> {
        let permit = self.gate.acquire().await.map_err(|_| ApiError::Offline)?;
        permit.forget();
        self.inner.capture(content, kind, client_ref).await
    }

    async fn capture_voice(&self, audio: Vec<u8>, mime: &str) -> Result<CaptureRecord, ApiError> {
        self.inner.capture_voice(audio, mime).await
    }

    async fn timeline(&self, limit: u64) -> Result<Vec<CaptureRecord>, ApiError> {
        self.inner.timeline(limit).await
    }

    async fn search(&self, query: &str) -> Result<Vec<CaptureRecord>, ApiError> {
        self.inner.search(query).await
    }

    async fn health(&self) -> Result<(), ApiError> {
        self.inner.health().await
    }
}

#[tokio::test]
async fn test_overlapping_drain_is_skipped() {
    let queue = Arc::new(CaptureQueue::open_in_memory().unwrap());
    queue.add_capture("held", CaptureKind::Text).unwrap();

    let api = Arc::new(GatedApi::new());
    let sync = coordinator_with(
        Arc::clone(&api) as Arc<dyn CaptureApi>,
        Arc::clone(&queue),
    );

    // First drain blocks inside the remote call
    let first = {
        let sync = Arc::clone(&sync);
        tokio::spawn(async move { sync.sync_offline_captures().await })
    };

    // Wait until the first drain has set the syncing flag
    let mut state_rx = sync.state().subscribe();
    while !state_rx.borrow().syncing {
        state_rx.changed().await.unwrap();
    }

    // A second drain while one is in flight is a skip, not a duplicate run
    let report = sync.sync_offline_captures().await.unwrap();
    assert!(report.skipped);
    assert_eq!(report.attempted, 0);

    api.release(1);
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(api.inner.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_auto_sync_drains_on_online_transition() {
    let queue = Arc::new(CaptureQueue::open_in_memory().unwrap());
    queue.add_capture("queued while offline", CaptureKind::Text).unwrap();

    let api = Arc::new(SelectiveApi::accept_all());
    let sync = coordinator_with(Arc::clone(&api) as Arc<dyn CaptureApi>, Arc::clone(&queue));

    let monitor = ReachabilityMonitor::new(false);
    let task = Arc::clone(&sync).spawn_auto_sync(&monitor);

    let mut state_rx = sync.state().subscribe();
    monitor.set_online(true);

    // Wait for the drain to finish
    tokio::time::timeout(Duration::from_secs(5), async {
        while state_rx.borrow().last_sync_time.is_none() {
            state_rx.changed().await.unwrap();
        }
    })
    .await
    .expect("auto-sync did not complete");

    assert_eq!(queue.stats().unwrap().unsynced, 0);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);

    let state = sync.state().get();
    assert!(state.online);
    assert_eq!(state.pending_count, 0);

    task.abort();
}

#[tokio::test]
async fn test_offline_transition_only_updates_state() {
    let queue = Arc::new(CaptureQueue::open_in_memory().unwrap());
    queue.add_capture("pending", CaptureKind::Text).unwrap();

    let api = Arc::new(SelectiveApi::accept_all());
    let sync = coordinator_with(Arc::clone(&api) as Arc<dyn CaptureApi>, Arc::clone(&queue));

    let monitor = ReachabilityMonitor::new(true);
    let task = Arc::clone(&sync).spawn_auto_sync(&monitor);

    let mut state_rx = sync.state().subscribe();
    monitor.set_online(false);

    tokio::time::timeout(Duration::from_secs(5), async {
        while state_rx.borrow().online {
            state_rx.changed().await.unwrap();
        }
    })
    .await
    .expect("offline transition not observed");

    // No drain happened
    assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    assert_eq!(queue.stats().unwrap().unsynced, 1);

    task.abort();
}

/// One notification per completed drain, warning when records failed.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(String, Severity)>>,
}

impl NotificationSink for RecordingSink {
    fn notify(&self, message: &str, severity: Severity) {
        self.events
            .lock()
            .unwrap()
            .push((message.to_string(), severity));
    }
}

#[tokio::test]
async fn test_drain_emits_one_completion_notification() {
    let queue = Arc::new(CaptureQueue::open_in_memory().unwrap());
    queue.add_capture("good", CaptureKind::Text).unwrap();
    queue.add_capture("poison", CaptureKind::Text).unwrap();

    let api = Arc::new(SelectiveApi::new(&["poison"]));
    let sink = Arc::new(RecordingSink::default());
    let sync = SyncCoordinator::new(
        Arc::clone(&queue),
        api as Arc<dyn CaptureApi>,
        Store::new(SyncState::new(true, 2)),
        Arc::clone(&sink) as Arc<dyn NotificationSink>,
    );

    sync.sync_offline_captures().await.unwrap();

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1, Severity::Warning);
}
