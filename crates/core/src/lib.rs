//! # lrsync Core
//!
//! Queueing and retry logic - no HTTP or file system code.
//!
//! This crate contains:
//! - The statement queue and its in-memory persistence adapter
//! - Port interfaces (traits) for persistence, connectivity, authorization
//!   and queue observers
//! - The failure classification and retry policy
//!
//! ## Architecture Principles
//! - Only depends on `lrsync-domain`
//! - All external collaborators via traits
//! - Pure, testable business logic

pub mod delivery;
pub mod queue;

// Re-export specific items to avoid ambiguity
pub use delivery::policy::{aggregate, classify_status, transport_kind, Disposition, RetryPolicy};
pub use delivery::ports::{AuthorizationProvider, ConnectivityMonitor, NoAuthorization};
pub use queue::ports::{QueueObserver, StatementPersistence};
pub use queue::{InMemoryPersistence, Resolution, StatementQueue};
