//! HTTP implementation of the remote capture API.
//!
//! Maps transport failures onto the [`ApiError`] taxonomy: the reachability
//! flag short-circuits to `Offline` before any I/O, reqwest timeouts become
//! `Timeout`, remote rejections become `Http`, and remaining transport
//! failures become `Network`. Only `Network` failures are retried, with
//! exponential backoff, and only when the request body is replayable.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::Serialize;

use crate::config::Config;
use crate::domain::{CaptureKind, CaptureRecord};
use crate::reachability::ReachabilityHandle;

use super::retry::backoff_delay;
use super::{ApiError, CaptureApi, RemoteCapture};

/// Base delay for the transient-failure backoff
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Capture creation payload (`POST /api/capture`)
#[derive(Debug, Serialize)]
struct CapturePayload<'a> {
    content: &'a str,
    input_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_ref: Option<&'a str>,
}

/// Timeline / search response page
#[derive(Debug, serde::Deserialize)]
struct Page {
    items: Vec<RemoteCapture>,
}

/// Remote capture client over HTTP with a bearer credential.
pub struct HttpCaptureClient {
    base_url: String,
    api_key: String,
    max_retries: u32,
    reachability: ReachabilityHandle,
    client: reqwest::Client,
}

impl HttpCaptureClient {
    /// Build a client from configuration. The per-request deadline comes
    /// from `config.timeout`.
    pub fn new(config: &Config, reachability: ReachabilityHandle) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries.max(1),
            reachability,
            client,
        })
    }

    /// Build an endpoint URL
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Single dispatch: send, map transport errors, reject non-2xx.
    async fn dispatch(&self, req: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = req
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    /// Dispatch with the transient-network retry loop.
    ///
    /// Requests with non-replayable bodies (multipart uploads) get exactly
    /// one attempt.
    async fn execute(&self, req: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        if !self.reachability.is_online() {
            return Err(ApiError::Offline);
        }

        let mut attempt = 0;
        let mut current = req;

        loop {
            let next = current.try_clone();

            match self.dispatch(current).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let transient = matches!(e, ApiError::Network(_));
                    match next {
                        Some(replay) if transient && attempt + 1 < self.max_retries => {
                            let delay = backoff_delay(attempt, RETRY_BASE_DELAY);
                            tracing::debug!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                "Transient network failure, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            current = replay;
                            attempt += 1;
                        }
                        _ => return Err(e),
                    }
                }
            }
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CaptureApi for HttpCaptureClient {
    async fn capture(
        &self,
        content: &str,
        kind: CaptureKind,
        client_ref: Option<&str>,
    ) -> Result<CaptureRecord, ApiError> {
        let payload = CapturePayload {
            content,
            input_type: kind.as_str(),
            client_ref,
        };

        let req = self
            .client
            .post(self.endpoint("/api/capture"))
            .json(&payload);

        let response = self.execute(req).await?;
        let remote: RemoteCapture = Self::decode(response).await?;

        Ok(remote.into_record())
    }

    async fn capture_voice(&self, audio: Vec<u8>, mime: &str) -> Result<CaptureRecord, ApiError> {
        let part = Part::bytes(audio)
            .file_name("capture")
            .mime_str(mime)
            .map_err(|e| ApiError::InvalidRequest(format!("bad mime type {mime:?}: {e}")))?;

        let form = Form::new().part("audio", part);

        let req = self.client.post(self.endpoint("/api/voice")).multipart(form);

        let response = self.execute(req).await?;
        let remote: RemoteCapture = Self::decode(response).await?;

        Ok(remote.into_record())
    }

    async fn timeline(&self, limit: u64) -> Result<Vec<CaptureRecord>, ApiError> {
        let req = self
            .client
            .get(self.endpoint("/api/timeline"))
            .query(&[("limit", limit)]);

        let response = self.execute(req).await?;
        let page: Page = Self::decode(response).await?;

        Ok(page.items.into_iter().map(RemoteCapture::into_record).collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<CaptureRecord>, ApiError> {
        let req = self
            .client
            .get(self.endpoint("/api/search"))
            .query(&[("query", query)]);

        let response = self.execute(req).await?;
        let page: Page = Self::decode(response).await?;

        Ok(page.items.into_iter().map(RemoteCapture::into_record).collect())
    }

    async fn health(&self) -> Result<(), ApiError> {
        let req = self.client.get(self.endpoint("/health"));
        self.execute(req).await?;
        Ok(())
    }
}

fn map_transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS};
    use crate::reachability::ReachabilityMonitor;
    use std::path::PathBuf;

    fn test_config(base_url: &str) -> Config {
        Config {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            home: PathBuf::from("/tmp/quickcap-test"),
            config_file: None,
        }
    }

    #[test]
    fn test_endpoint_building() {
        let config = test_config("https://notes.example.org/");
        let client =
            HttpCaptureClient::new(&config, ReachabilityHandle::always_online()).unwrap();

        assert_eq!(
            client.endpoint("/api/capture"),
            "https://notes.example.org/api/capture"
        );
    }

    #[test]
    fn test_capture_payload_omits_absent_client_ref() {
        let payload = CapturePayload {
            content: "Buy milk",
            input_type: "text",
            client_ref: None,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["content"], "Buy milk");
        assert_eq!(json["input_type"], "text");
        assert!(json.get("client_ref").is_none());
    }

    #[tokio::test]
    async fn test_offline_fails_before_any_io() {
        // Unroutable base URL: if the client tried the network the error
        // would be Network, not Offline.
        let config = test_config("http://127.0.0.1:1");

        let monitor = ReachabilityMonitor::new(false);
        let client = HttpCaptureClient::new(&config, monitor.handle()).unwrap();

        let err = client
            .capture("Buy milk", CaptureKind::Text, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Offline));

        let err = client.timeline(10).await.unwrap_err();
        assert!(matches!(err, ApiError::Offline));
    }
}
