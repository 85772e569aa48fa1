//! Port interfaces for queue storage and queue observers

use lrsync_domain::{Decision, QueueEvent, Result, Statement};

/// Durable store for the queued statements.
///
/// Calls are synchronous: the queue invokes `save` while serializing its
/// own mutations, and a mutating queue call does not return before the
/// snapshot is written or the write has failed.
pub trait StatementPersistence: Send + Sync {
    /// Replace the stored snapshot with `statements`, in queue order.
    fn save(&self, statements: &[Statement]) -> Result<()>;

    /// True when a previously saved snapshot is available.
    fn needs_restore(&self) -> bool;

    /// Read the stored snapshot, oldest statement first.
    fn load(&self) -> Result<Vec<Statement>>;
}

/// Receives one event per resolved batch.
///
/// The returned decision only matters for
/// [`QueueEvent::FailedToPersist`]; it is ignored for persisted batches.
pub trait QueueObserver: Send + Sync {
    fn on_queue_event(&self, event: &QueueEvent) -> Decision;
}

impl<F> QueueObserver for F
where
    F: Fn(&QueueEvent) -> Decision + Send + Sync,
{
    fn on_queue_event(&self, event: &QueueEvent) -> Decision {
        self(event)
    }
}
