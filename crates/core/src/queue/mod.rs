//! Statement queue and its ports

pub mod memory;
pub mod ports;
pub mod service;

pub use memory::InMemoryPersistence;
pub use service::{Resolution, StatementQueue};
