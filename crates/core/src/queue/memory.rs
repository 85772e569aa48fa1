//! In-memory persistence for tests and non-durable queues

use lrsync_domain::{Result, Statement};
use parking_lot::Mutex;

use super::ports::StatementPersistence;

/// Keeps the last saved snapshot in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    saved: Mutex<Option<Vec<Statement>>>,
    saves: Mutex<usize>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a saved snapshot, as if a previous run had written it.
    pub fn with_statements(statements: Vec<Statement>) -> Self {
        Self { saved: Mutex::new(Some(statements)), saves: Mutex::new(0) }
    }

    /// The last saved snapshot; empty when nothing was saved.
    pub fn snapshot(&self) -> Vec<Statement> {
        self.saved.lock().clone().unwrap_or_default()
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl StatementPersistence for InMemoryPersistence {
    fn save(&self, statements: &[Statement]) -> Result<()> {
        *self.saved.lock() = Some(statements.to_vec());
        *self.saves.lock() += 1;
        Ok(())
    }

    fn needs_restore(&self) -> bool {
        self.saved.lock().as_ref().is_some_and(|saved| !saved.is_empty())
    }

    fn load(&self) -> Result<Vec<Statement>> {
        Ok(self.snapshot())
    }
}
