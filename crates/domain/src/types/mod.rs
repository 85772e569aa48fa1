//! Domain types and models

pub mod outcome;
pub mod query;
pub mod queue;
pub mod request;
pub mod resources;
pub mod statement;

pub use outcome::{BatchOutcome, Decision, FailureClass, QueueEvent};
pub use query::{StatementQuery, StatementsResult};
pub use queue::{Batch, QueueEntry};
pub use request::{HttpMethod, RequestHeaders, RequestState};
pub use resources::{
    ActivityProfile, ActivityState, ActorProfile, ResourceKind, ResourceRequest,
};
pub use statement::Statement;
