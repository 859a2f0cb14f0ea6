//! Remote capture API boundary.
//!
//! [`CaptureApi`] is the polymorphic transport capability the coordinators
//! program against; [`HttpCaptureClient`] is the production implementation.
//! Retries are the caller's responsibility except for the transient-network
//! retry built into the HTTP client itself.

pub mod http;
pub mod retry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{CaptureKind, CaptureRecord, SyncStatus};

pub use http::HttpCaptureClient;
pub use retry::{backoff_delay, retry_with_backoff};

/// Errors a remote call can fail with.
///
/// `Offline` is a distinguished variant, not a generic failure: the capture
/// coordinator branches on it to decide whether to queue locally.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No network path available")]
    Offline,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// A capture as the remote service reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCapture {
    /// Remote-assigned identifier
    pub id: String,

    pub content: String,

    #[serde(default)]
    pub input_type: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl RemoteCapture {
    /// Convert into a remote-confirmed [`CaptureRecord`].
    pub fn into_record(self) -> CaptureRecord {
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        let kind = match self.input_type.as_deref() {
            Some("voice") => CaptureKind::Voice,
            _ => CaptureKind::Text,
        };

        CaptureRecord {
            id: self.id,
            content: self.content,
            kind,
            created_at,
            status: SyncStatus::Synced,
            synced_at: Some(created_at),
            error: None,
        }
    }
}

/// Transport capability against the remote capture service.
///
/// Every call carries the bearer credential and a bounded deadline.
#[async_trait]
pub trait CaptureApi: Send + Sync {
    /// Create a capture. `client_ref` carries the local record id during
    /// queue replay so a deduplicating remote can use it; the client does
    /// not require that it does.
    async fn capture(
        &self,
        content: &str,
        kind: CaptureKind,
        client_ref: Option<&str>,
    ) -> Result<CaptureRecord, ApiError>;

    /// Create a capture from an audio payload.
    async fn capture_voice(&self, audio: Vec<u8>, mime: &str) -> Result<CaptureRecord, ApiError>;

    /// Most recent captures, newest first.
    async fn timeline(&self, limit: u64) -> Result<Vec<CaptureRecord>, ApiError>;

    /// Full-text search.
    async fn search(&self, query: &str) -> Result<Vec<CaptureRecord>, ApiError>;

    /// Liveness probe.
    async fn health(&self) -> Result<(), ApiError>;
}
