//! Network reachability monitor.
//!
//! A two-state machine (online/offline) driven by platform connectivity
//! signals fed through [`ReachabilityMonitor::set_online`]. Each transition
//! emits exactly one event on a broadcast channel; duplicate signals are
//! swallowed. Rapid flapping is tolerated downstream because the sync drain
//! is tolerant of duplicate completion signals.

use tokio::sync::{broadcast, watch};
use tracing::info;

/// Reachability transition event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    Online,
    Offline,
}

/// Cheap read handle on the current reachability state.
///
/// Held by the HTTP client to decide whether a call should fail fast with
/// an offline error instead of touching the network.
#[derive(Debug, Clone)]
pub struct ReachabilityHandle {
    rx: watch::Receiver<bool>,
}

impl ReachabilityHandle {
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// A handle that always reports online. For tests and one-shot tools
    /// that probe reachability themselves.
    pub fn always_online() -> Self {
        let (_tx, rx) = watch::channel(true);
        Self { rx }
    }
}

/// Observes online/offline transitions and raises events.
pub struct ReachabilityMonitor {
    state: watch::Sender<bool>,
    events: broadcast::Sender<NetworkEvent>,
}

impl ReachabilityMonitor {
    /// Create a monitor seeded with the current network status.
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        let (events, _) = broadcast::channel(16);

        Self { state, events }
    }

    /// Feed a platform connectivity signal. Emits an event only on an
    /// actual transition.
    pub fn set_online(&self, online: bool) {
        let changed = self.state.send_if_modified(|current| {
            if *current != online {
                *current = online;
                true
            } else {
                false
            }
        });

        if changed {
            let event = if online {
                info!("Network: online");
                NetworkEvent::Online
            } else {
                info!("Network: offline");
                NetworkEvent::Offline
            };

            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Read handle for components that only need the current state.
    pub fn handle(&self) -> ReachabilityHandle {
        ReachabilityHandle {
            rx: self.state.subscribe(),
        }
    }

    /// Subscribe to transition events.
    pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.events.subscribe()
    }
}
