//! Request lifecycle shared by statement batches and one-shot resource calls

pub mod lifecycle;
pub mod observer;
pub mod response;

pub use lifecycle::{LrsRequest, RequestContext, RequestHandle, RequestOutcome};
pub use observer::{RequestEvent, RequestObserver};
pub use response::ApiResponse;
