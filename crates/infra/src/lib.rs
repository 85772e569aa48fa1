//! # lrsync Infrastructure
//!
//! Infrastructure implementations of the core ports and the client facade.
//!
//! This crate contains:
//! - The HTTP client and the request lifecycle built on it
//! - The batch dispatcher and the flush scheduler
//! - File persistence, connectivity probes and basic authentication
//! - The [`LrsClient`] facade with statement and document operations
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `lrsync-core`
//! - Depends on `lrsync-domain` and `lrsync-core`
//! - Contains all "impure" code (network, file system, timers)

pub mod auth;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod delivery;
pub mod errors;
pub mod http;
pub mod observability;
pub mod persistence;
pub mod request;
pub mod scheduling;

// Re-export commonly used items
pub use auth::BasicHttpAuthentication;
pub use client::{LrsClient, LrsClientBuilder};
pub use connectivity::{StaticConnectivity, TcpProbeConnectivity};
pub use delivery::{BatchDispatcher, FlushTicket};
pub use errors::InfraError;
pub use http::HttpClient;
pub use observability::{init_tracing, LogConfig};
pub use persistence::FileStatementPersistence;
pub use request::{
    ApiResponse, LrsRequest, RequestContext, RequestEvent, RequestHandle, RequestObserver,
    RequestOutcome,
};
pub use scheduling::{FlushScheduler, SchedulerError, TickOutcome};
