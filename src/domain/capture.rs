//! Capture records and their synchronization lifecycle.
//!
//! A record lives in exactly one of two homes at any time: confirmed on the
//! remote service, or queued locally with status `Pending`. The local queue
//! is the source of truth for pending records; remote-confirmed records are
//! never deleted by this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of content a capture holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    /// Plain text entered by the user
    Text,

    /// Transcribed voice recording
    Voice,
}

impl CaptureKind {
    /// Wire name used in API payloads (`input_type` field)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }
}

/// Synchronization status of a capture record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Stored locally, not yet confirmed by the remote service
    Pending,

    /// Confirmed stored by the remote service
    Synced,
}

/// One unit of captured content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// Remote-assigned identifier on success, or a locally generated
    /// uuid while the record is pending
    pub id: String,

    /// The captured content (text, or a transcription for voice)
    pub content: String,

    /// Text or voice
    pub kind: CaptureKind,

    /// When the capture was created
    pub created_at: DateTime<Utc>,

    /// Pending or synced
    pub status: SyncStatus,

    /// When the record was confirmed by the remote service (if ever)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,

    /// Last synchronization error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptureRecord {
    /// Create a pending record with a locally generated identifier.
    pub fn pending(content: impl Into<String>, kind: CaptureKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            kind,
            created_at: Utc::now(),
            status: SyncStatus::Pending,
            synced_at: None,
            error: None,
        }
    }

    /// Whether this record still awaits remote confirmation.
    pub fn is_pending(&self) -> bool {
        self.status == SyncStatus::Pending
    }
}
