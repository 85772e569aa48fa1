//! Statement delivery - batching queued statements into store requests

pub mod dispatcher;

pub use dispatcher::{BatchDispatcher, FlushTicket};
