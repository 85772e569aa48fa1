//! Shared test helpers for `lrsync-core` integration tests.

use std::sync::atomic::{AtomicBool, Ordering};

use lrsync_core::{InMemoryPersistence, StatementPersistence};
use lrsync_domain::{LrsError, Result, Statement};
use serde_json::json;

pub fn statement(id: &str) -> Statement {
    Statement::from_value(json!({ "id": id, "verb": { "id": "http://adlnet.gov/expapi/verbs/answered" } }))
        .unwrap_or_else(|err| panic!("fixture statement {id}: {err}"))
}

pub fn ids(statements: &[Statement]) -> Vec<String> {
    statements.iter().filter_map(Statement::id).map(str::to_string).collect()
}

/// In-memory persistence whose writes can be switched to fail.
#[derive(Default)]
pub struct FlakyPersistence {
    inner: InMemoryPersistence,
    failing: AtomicBool,
}

impl FlakyPersistence {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<Statement> {
        self.inner.snapshot()
    }
}

impl StatementPersistence for FlakyPersistence {
    fn save(&self, statements: &[Statement]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LrsError::Persistence("disk full".to_string()));
        }
        self.inner.save(statements)
    }

    fn needs_restore(&self) -> bool {
        self.inner.needs_restore()
    }

    fn load(&self) -> Result<Vec<Statement>> {
        self.inner.load()
    }
}
