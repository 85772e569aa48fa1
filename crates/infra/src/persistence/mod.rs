//! Persistence adapters for the statement queue

pub mod file;

pub use file::FileStatementPersistence;
