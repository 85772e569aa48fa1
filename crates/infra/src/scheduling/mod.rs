//! Scheduling infrastructure for automatic queue flushing
//!
//! The flush scheduler follows the runtime rules used across this crate:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout wrapping when awaiting background tasks

pub mod error;
pub mod flush_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use flush_scheduler::{FlushScheduler, TickOutcome};
