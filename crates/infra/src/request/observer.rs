//! Request events and the observer that receives them

use lrsync_domain::RequestError;

use super::lifecycle::LrsRequest;
use super::response::ApiResponse;

/// One lifecycle event. A request emits at most one `Started` and exactly
/// one of `Finished`/`Failed`, or nothing at all when cancelled.
#[derive(Debug)]
pub enum RequestEvent<'a> {
    /// Emitted on entering Active, for asynchronous requests only.
    Started,
    Finished(&'a ApiResponse),
    Failed(&'a RequestError),
}

/// Owner-side hooks into a request's lifecycle.
pub trait RequestObserver: Send + Sync {
    /// Last chance to abandon the request before it goes active.
    /// Returning `false` drops it without emitting any event.
    fn should_start(&self, _request: &LrsRequest) -> bool {
        true
    }

    fn on_request_event(&self, request: &LrsRequest, event: RequestEvent<'_>);
}
