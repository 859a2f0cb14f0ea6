//! Ephemeral user-facing notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

/// A transient toast-style notification.
///
/// Owned by the notification sink; self-expires after a fixed duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toast {
    /// Unique identifier for removal
    pub id: Uuid,

    /// Message shown to the user
    pub message: String,

    /// Severity, drives presentation
    pub severity: Severity,

    /// When the toast was created
    pub created_at: DateTime<Utc>,
}

impl Toast {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            severity,
            created_at: Utc::now(),
        }
    }
}
