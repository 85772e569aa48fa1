//! Observability infrastructure
//!
//! The library itself only emits `tracing` events and spans. Applications
//! that do not install their own subscriber can call [`init_tracing`].

pub mod logging;

pub use logging::{init_tracing, LogConfig};
