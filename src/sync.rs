//! Synchronization coordinator: drains the local queue to the remote service.
//!
//! The drain works on a snapshot of the pending records; captures queued
//! while a drain is in flight wait for the next run. One record's failure
//! never blocks the rest of the batch, so a single malformed record cannot
//! strand the queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::domain::Severity;
use crate::notify::NotificationSink;
use crate::queue::{CaptureQueue, QueueError};
use crate::reachability::{NetworkEvent, ReachabilityMonitor};
use crate::remote::CaptureApi;
use crate::state::Store;

/// Process-wide synchronization state. Never persisted; the pending count is
/// a cache of the queue's unsynced count and can be refreshed from it.
#[derive(Debug, Clone)]
pub struct SyncState {
    /// Current reachability
    pub online: bool,

    /// Whether a drain is in flight
    pub syncing: bool,

    /// When the last drain finished (regardless of per-record failures)
    pub last_sync_time: Option<DateTime<Utc>>,

    /// Cached count of unsynced records
    pub pending_count: u64,
}

impl SyncState {
    /// Initial state from the current network status.
    pub fn new(online: bool, pending_count: u64) -> Self {
        Self {
            online,
            syncing: false,
            last_sync_time: None,
            pending_count,
        }
    }
}

/// Outcome of one drain run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records in the snapshot
    pub attempted: u64,

    /// Successfully submitted and marked synced
    pub synced: u64,

    /// Left pending for a later run
    pub failed: u64,

    /// True when the run was skipped because a drain was already in flight
    pub skipped: bool,
}

impl SyncReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Moves queued records to the remote system when reachability returns or a
/// sync is requested explicitly.
pub struct SyncCoordinator {
    queue: Arc<CaptureQueue>,
    api: Arc<dyn CaptureApi>,
    state: Store<SyncState>,
    notifier: Arc<dyn NotificationSink>,
}

impl SyncCoordinator {
    pub fn new(
        queue: Arc<CaptureQueue>,
        api: Arc<dyn CaptureApi>,
        state: Store<SyncState>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            queue,
            api,
            state,
            notifier,
        }
    }

    /// Handle on the shared sync state.
    pub fn state(&self) -> Store<SyncState> {
        self.state.clone()
    }

    /// Drain the queue: snapshot the pending records and submit them in
    /// insertion order. Per-record failures are logged and skipped. If a
    /// drain is already in flight the call returns immediately with a
    /// skipped report.
    #[instrument(skip(self))]
    pub async fn sync_offline_captures(&self) -> Result<SyncReport, QueueError> {
        let started = self.state.try_update(|s| {
            if s.syncing {
                false
            } else {
                s.syncing = true;
                true
            }
        });

        if !started {
            debug!("Drain already in flight, skipping");
            return Ok(SyncReport::skipped());
        }

        let snapshot = match self.queue.unsynced() {
            Ok(records) => records,
            Err(e) => {
                self.state.update(|s| s.syncing = false);
                return Err(e);
            }
        };

        if snapshot.is_empty() {
            self.state.update(|s| s.syncing = false);
            return Ok(SyncReport::default());
        }

        info!(count = snapshot.len(), "Syncing offline captures");

        let mut report = SyncReport {
            attempted: snapshot.len() as u64,
            ..SyncReport::default()
        };

        for record in &snapshot {
            match self
                .api
                .capture(&record.content, record.kind, Some(&record.id))
                .await
            {
                Ok(_) => match self.queue.mark_synced(&record.id) {
                    Ok(()) => {
                        report.synced += 1;
                        self.state
                            .update(|s| s.pending_count = s.pending_count.saturating_sub(1));
                    }
                    Err(e) => {
                        warn!(id = %record.id, "Submitted but failed to mark synced: {e}");
                        report.failed += 1;
                    }
                },
                Err(e) => {
                    warn!(id = %record.id, "Failed to sync capture: {e}");
                    if let Err(db_err) = self.queue.record_error(&record.id, &e.to_string()) {
                        warn!(id = %record.id, "Failed to record sync error: {db_err}");
                    }
                    report.failed += 1;
                }
            }
        }

        // Last-sync-time is updated even when some records failed
        self.state.update(|s| {
            s.syncing = false;
            s.last_sync_time = Some(Utc::now());
        });

        if report.failed == 0 {
            self.notifier.notify("Sync complete", Severity::Success);
        } else {
            self.notifier.notify(
                &format!(
                    "Sync finished: {} synced, {} still pending",
                    report.synced, report.failed
                ),
                Severity::Warning,
            );
        }

        Ok(report)
    }

    /// Explicit user-triggered sync. Same operation as the auto-sync drain.
    pub async fn manual_sync(&self) -> Result<SyncReport, QueueError> {
        self.sync_offline_captures().await
    }

    /// Reload the cached pending count from the queue.
    pub fn refresh_pending_count(&self) -> Result<u64, QueueError> {
        let stats = self.queue.stats()?;
        self.state.update(|s| s.pending_count = stats.unsynced);
        Ok(stats.unsynced)
    }

    /// Spawn the auto-sync task: on each online transition, drain the queue
    /// if anything is pending. Runs until the monitor is dropped.
    pub fn spawn_auto_sync(self: Arc<Self>, monitor: &ReachabilityMonitor) -> JoinHandle<()> {
        let mut events = monitor.subscribe();
        let coordinator = self;

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(NetworkEvent::Online) => {
                        coordinator.state.update(|s| s.online = true);
                        coordinator.auto_sync().await;
                    }
                    Ok(NetworkEvent::Offline) => {
                        coordinator.state.update(|s| s.online = false);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Reachability events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn auto_sync(&self) {
        match self.queue.stats() {
            Ok(stats) if stats.unsynced > 0 => {
                info!(unsynced = stats.unsynced, "Auto-syncing offline captures");
                if let Err(e) = self.sync_offline_captures().await {
                    warn!("Auto-sync failed: {e}");
                }
            }
            Ok(_) => debug!("Nothing to auto-sync"),
            Err(e) => warn!("Auto-sync stats check failed: {e}"),
        }
    }
}
