//! Connectivity monitors

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lrsync_core::ConnectivityMonitor;
use lrsync_domain::{LrsError, Result};
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

/// Manually toggled connectivity flag. Starts online.
#[derive(Debug)]
pub struct StaticConnectivity {
    online: AtomicBool,
}

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        Self { online: AtomicBool::new(online) }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for StaticConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConnectivityMonitor for StaticConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Reports online when a TCP connection to the store's host succeeds.
#[derive(Debug, Clone)]
pub struct TcpProbeConnectivity {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbeConnectivity {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    /// Probe the host and port of `endpoint`.
    pub fn for_endpoint(endpoint: &Url) -> Result<Self> {
        let host = endpoint
            .host_str()
            .ok_or_else(|| LrsError::Config(format!("endpoint has no host: {endpoint}")))?;
        let port = endpoint
            .port_or_known_default()
            .ok_or_else(|| LrsError::Config(format!("endpoint has no port: {endpoint}")))?;
        Ok(Self {
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port,
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ConnectivityMonitor for TcpProbeConnectivity {
    async fn is_online(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!(host = %self.host, port = self.port, error = %err, "Connectivity probe failed");
                false
            }
            Err(_) => {
                debug!(host = %self.host, port = self.port, "Connectivity probe timed out");
                false
            }
        }
    }
}
