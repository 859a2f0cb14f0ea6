//! quickcap - Offline-first capture queue with remote sync
//!
//! A capture client for a remote note-taking API that keeps working when the
//! network does not: writes go to the remote service when reachable and into
//! a local durable queue when confirmed offline, and a sync coordinator
//! drains the queue when reachability returns.
//!
//! # Architecture
//!
//! - A capture record lives in exactly one of two homes: remote-confirmed,
//!   or locally queued and pending
//! - Only the confirmed-offline condition triggers local queueing; other
//!   remote failures are surfaced for user retry
//! - The drain processes a snapshot of the queue in insertion order and
//!   tolerates per-record failures
//!
//! # Modules
//!
//! - `capture`: Capture coordinator (remote-first write path)
//! - `sync`: Sync coordinator and shared sync state
//! - `queue`: Local durable queue (SQLite)
//! - `remote`: Remote API trait, HTTP client, retry helper
//! - `reachability`: Online/offline monitor
//! - `state`: Reactive state container
//! - `notify`: Notification sinks
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Capture a thought
//! quickcap capture "Buy milk"
//!
//! # Replay anything queued while offline
//! quickcap sync
//!
//! # Recent captures (remote, or local fallback)
//! quickcap timeline --limit 20
//! ```

pub mod capture;
pub mod cli;
pub mod config;
pub mod domain;
pub mod notify;
pub mod queue;
pub mod reachability;
pub mod remote;
pub mod state;
pub mod sync;

// Re-export main types at crate root for convenience
pub use capture::{CaptureCoordinator, CaptureError, CaptureFeed, CaptureOutcome};
pub use config::Config;
pub use domain::{CaptureKind, CaptureRecord, Severity, SyncStatus, Toast};
pub use notify::{LogSink, NotificationSink, ToastBus};
pub use queue::{CaptureQueue, QueueError, QueueStats};
pub use reachability::{NetworkEvent, ReachabilityHandle, ReachabilityMonitor};
pub use remote::{ApiError, CaptureApi, HttpCaptureClient};
pub use state::Store;
pub use sync::{SyncCoordinator, SyncReport, SyncState};
