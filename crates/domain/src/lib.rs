//! # lrsync Domain
//!
//! Data types shared by every lrsync crate.
//!
//! This crate contains:
//! - Statements, queue entries and batches
//! - Request states, HTTP methods and header maps
//! - Batch outcomes and observer decisions
//! - The request error taxonomy and the crate-wide error type
//! - Client configuration
//! - Statement queries and non-statement resource descriptors
//!
//! ## Architecture
//! - No dependencies on other lrsync crates
//! - No I/O; only serialization and validation

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
