//! Port interfaces consumed by the delivery pipeline

use async_trait::async_trait;
use lrsync_domain::RequestHeaders;

/// Reports whether the network is usable.
///
/// Consulted before each scheduled flush. Enqueueing never asks.
#[async_trait]
pub trait ConnectivityMonitor: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Decorates outgoing requests with credentials.
///
/// Implementations must not perform network I/O. Decorating the same
/// headers twice must leave them as after the first call.
pub trait AuthorizationProvider: Send + Sync {
    fn decorate(&self, headers: &mut RequestHeaders);
}

/// Authorization provider that adds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthorization;

impl AuthorizationProvider for NoAuthorization {
    fn decorate(&self, _headers: &mut RequestHeaders) {}
}
