//! Delivery ports and the failure/retry policy

pub mod policy;
pub mod ports;

pub use policy::{Disposition, RetryPolicy};
