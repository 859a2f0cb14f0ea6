//! User-facing notification sinks.
//!
//! The coordinators emit exactly one notification per terminal outcome and
//! never wait on the sink; delivery is fire-and-forget.

use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::DEFAULT_TOAST_DURATION_MS;
use crate::domain::{Severity, Toast};
use crate::state::Store;

/// Receiver of transient status messages.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// In-memory toast feed with automatic expiry.
///
/// Holds the live toast list in a [`Store`]; each toast removes itself after
/// the configured duration.
pub struct ToastBus {
    toasts: Store<Vec<Toast>>,
    duration: Duration,
}

impl ToastBus {
    pub fn new(duration: Duration) -> Self {
        Self {
            toasts: Store::new(Vec::new()),
            duration,
        }
    }

    /// Handle on the live toast list.
    pub fn toasts(&self) -> Store<Vec<Toast>> {
        self.toasts.clone()
    }

    /// Remove a specific toast before it expires.
    pub fn remove(&self, id: Uuid) {
        self.toasts.update(|toasts| toasts.retain(|t| t.id != id));
    }

    /// Drop all toasts.
    pub fn clear(&self) {
        self.toasts.update(|toasts| toasts.clear());
    }
}

impl Default for ToastBus {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TOAST_DURATION_MS))
    }
}

impl NotificationSink for ToastBus {
    fn notify(&self, message: &str, severity: Severity) {
        let toast = Toast::new(message, severity);
        let id = toast.id;

        self.toasts.update(|toasts| toasts.push(toast));

        // Self-expiry
        let store = self.toasts.clone();
        let duration = self.duration;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            store.update(|toasts| toasts.retain(|t| t.id != id));
        });
    }
}

/// Sink that maps severities onto tracing levels. Used by the CLI, where
/// there is no toast surface.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Success | Severity::Info => info!("{message}"),
            Severity::Warning => warn!("{message}"),
            Severity::Error => error!("{message}"),
        }
    }
}
