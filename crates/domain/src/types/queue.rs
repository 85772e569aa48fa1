//! Queue entries and batches

use serde::{Deserialize, Serialize};

use super::statement::Statement;

/// A queued statement plus the queue's bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub statement: Statement,
    /// Monotonic insertion sequence; defines queue order.
    pub sequence: u64,
    /// Set while the entry belongs to an unresolved batch.
    pub in_flight: bool,
    /// Permanent failures this entry has been kept through.
    pub permanent_failures: u32,
}

impl QueueEntry {
    pub fn new(statement: Statement, sequence: u64) -> Self {
        Self { statement, sequence, in_flight: false, permanent_failures: 0 }
    }

    /// Identifier of the wrapped statement. Entries are only created for
    /// statements that already carry one.
    pub fn id(&self) -> &str {
        self.statement.id().unwrap_or_default()
    }
}

/// An ordered slice of queue entries claimed for one request.
///
/// The entries stay in the queue until the batch resolves; the batch only
/// carries copies of their statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub statements: Vec<Statement>,
}

impl Batch {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.statements.iter().filter_map(|s| s.id().map(str::to_string)).collect()
    }

    /// JSON array body for a batch POST, in queue order.
    pub fn to_body(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.statements)
    }
}
