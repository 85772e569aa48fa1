//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_VERSION, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::errors::{LrsError, Result};

/// Client configuration.
///
/// Constructed explicitly by the caller (or loaded by the infra config
/// loader); there is no process-wide default instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the record store, e.g. `https://lrs.example.com/xapi/`.
    pub endpoint: String,
    /// Seconds between automatic flushes; 0 disables the scheduler.
    pub flush_interval_secs: u64,
    /// Maximum statements per batch request.
    pub batch_size: usize,
    /// Seconds a request may stay active before it fails as timed out.
    pub request_timeout_secs: u64,
    /// Treat 4xx/5xx responses as failed requests.
    pub server_errors_are_failures: bool,
    /// Replace server error messages with fixed friendly messages.
    pub nice_error_messages: bool,
    /// File backing the queue; `None` keeps the queue in memory only.
    pub queue_path: Option<PathBuf>,
    /// Keep-and-retry cycles a statement may go through after permanent
    /// failures before it is dropped. `None` retries forever.
    pub max_permanent_retries: Option<u32>,
    /// Value of the version header sent with every request.
    pub api_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            server_errors_are_failures: true,
            nice_error_messages: false,
            queue_path: None,
            max_permanent_retries: None,
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), ..Self::default() }
    }

    pub fn with_flush_interval(mut self, secs: u64) -> Self {
        self.flush_interval_secs = secs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_queue_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.queue_path = Some(path.into());
        self
    }

    pub fn with_max_permanent_retries(mut self, retries: Option<u32>) -> Self {
        self.max_permanent_retries = retries;
        self
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Endpoint with a guaranteed trailing slash so relative paths join
    /// beneath it instead of replacing its last segment.
    pub fn base_url(&self) -> Result<url::Url> {
        let mut raw = self.endpoint.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        url::Url::parse(&raw)
            .map_err(|e| LrsError::Config(format!("Invalid endpoint '{}': {e}", self.endpoint)))
    }

    /// Reject configurations the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(LrsError::Config("endpoint must not be empty".to_string()));
        }
        let url = self.base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(LrsError::Config(format!("unsupported endpoint scheme: {}", url.scheme())));
        }
        if self.batch_size == 0 {
            return Err(LrsError::Config("batch_size must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(LrsError::Config("request_timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }
}
