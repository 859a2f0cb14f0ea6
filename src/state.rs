//! Typed reactive state container.
//!
//! A `Store<T>` holds one piece of process-wide state and broadcasts changes
//! to subscribers. Updates are applied atomically through a transform
//! closure; subscribers receive the value after each change via a watch
//! channel. This is the seam the coordinators share state through instead of
//! referencing each other directly.

use std::sync::Arc;

use tokio::sync::watch;

/// A shared reactive state holder.
///
/// Cloning a `Store` clones a handle to the same state.
#[derive(Debug)]
pub struct Store<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone> Store<T> {
    /// Create a store with an initial value.
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Get a snapshot of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Apply a transform to the current value and notify subscribers.
    pub fn update<F>(&self, transform: F)
    where
        F: FnOnce(&mut T),
    {
        self.tx.send_modify(transform);
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        self.update(|v| *v = value);
    }

    /// Apply a transform that decides whether it modified the value.
    /// Returns that decision; subscribers are only notified when true.
    /// The check and the mutation happen under the same lock, so this is
    /// usable as a compare-and-set.
    pub fn try_update<F>(&self, transform: F) -> bool
    where
        F: FnOnce(&mut T) -> bool,
    {
        self.tx.send_if_modified(transform)
    }

    /// Subscribe to changes. The receiver observes the value at
    /// subscription time and every subsequent update.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
