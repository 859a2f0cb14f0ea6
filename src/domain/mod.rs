//! Domain types for the capture subsystem.
//!
//! - CaptureRecord: one unit of captured content and its sync lifecycle
//! - Toast: ephemeral user-facing notifications

pub mod capture;
pub mod toast;

// Re-export commonly used types
pub use capture::{CaptureKind, CaptureRecord, SyncStatus};
pub use toast::{Severity, Toast};
