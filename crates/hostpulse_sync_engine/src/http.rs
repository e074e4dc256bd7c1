//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so the collector
//! logic (status handling, endpoint routing) can be tested without sockets.
//! [`UreqClient`] is the production client.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::payload::{BulkSyncRequest, SingleSyncRequest};
use crate::transport::Collector;
use parking_lot::RwLock;
use std::time::Duration;
use tracing::debug;

/// HTTP client abstraction.
///
/// Implementations return the response status for any completed exchange,
/// whatever the code; only failures to complete the exchange are errors.
pub trait HttpClient: Send + Sync {
    /// Sends a POST with a JSON body and returns the response status.
    fn post_json(&self, url: &str, body: Vec<u8>) -> SyncResult<u16>;

    /// Sends a GET and returns the response status.
    fn get(&self, url: &str) -> SyncResult<u16>;
}

/// HTTP-based collector.
///
/// Uses JSON bodies and treats exactly HTTP 200 as success.
pub struct HttpCollector<C: HttpClient> {
    bulk_url: String,
    single_url: String,
    connectivity_url: String,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpCollector<C> {
    /// Creates a collector using the endpoints from `config`.
    pub fn new(config: &SyncConfig, client: C) -> Self {
        Self {
            bulk_url: config.bulk_url.clone(),
            single_url: config.single_url.clone(),
            connectivity_url: config.connectivity_url.clone(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the bulk endpoint URL.
    pub fn bulk_url(&self) -> &str {
        &self.bulk_url
    }

    /// Returns the single-window endpoint URL.
    pub fn single_url(&self) -> &str {
        &self.single_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn post(&self, url: &str, body: Vec<u8>) -> SyncResult<()> {
        let result = match self.client.post_json(url, body) {
            Ok(200) => Ok(()),
            Ok(status) => Err(SyncError::Status(status)),
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => *self.last_error.write() = None,
            Err(e) => *self.last_error.write() = Some(e.to_string()),
        }
        result
    }
}

impl<C: HttpClient> Collector for HttpCollector<C> {
    fn check_connectivity(&self) -> bool {
        match self.client.get(&self.connectivity_url) {
            Ok(status) => {
                debug!(status, "connectivity probe answered");
                true
            }
            Err(e) => {
                debug!(error = %e, "connectivity probe failed");
                *self.last_error.write() = Some(e.to_string());
                false
            }
        }
    }

    fn send_bulk(&self, request: &BulkSyncRequest) -> SyncResult<()> {
        let body = request.encode()?;
        self.post(&self.bulk_url, body)
    }

    fn send_window(&self, request: &SingleSyncRequest) -> SyncResult<()> {
        let body = request.encode()?;
        self.post(&self.single_url, body)
    }
}

/// Blocking HTTP client backed by `ureq`.
///
/// Every request, probe included, is bounded by one global timeout. Non-2xx
/// statuses are returned as values, not errors.
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    /// Creates a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl HttpClient for UreqClient {
    fn post_json(&self, url: &str, body: Vec<u8>) -> SyncResult<u16> {
        let response = self
            .agent
            .post(url)
            .header("content-type", "application/json")
            .send(&body[..])
            .map_err(classify_ureq_error)?;
        Ok(response.status().as_u16())
    }

    fn get(&self, url: &str) -> SyncResult<u16> {
        let response = self.agent.get(url).call().map_err(classify_ureq_error)?;
        Ok(response.status().as_u16())
    }
}

/// Maps a ureq failure onto the engine's error taxonomy.
fn classify_ureq_error(err: ureq::Error) -> SyncError {
    match err {
        ureq::Error::Timeout(_) => SyncError::Timeout,
        ureq::Error::BadUri(msg) => SyncError::transport_fatal(format!("bad url: {msg}")),
        other => SyncError::transport_retryable(other.to_string()),
    }
}
