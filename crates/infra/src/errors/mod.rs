//! Infrastructure error mapping

pub mod conversions;

pub use conversions::{request_error_from_http, InfraError};
