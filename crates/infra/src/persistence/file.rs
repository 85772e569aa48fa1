//! File-backed statement persistence
//!
//! The queue is stored as one JSON document:
//!
//! ```json
//! { "version": 1, "created_at": "...", "statement_count": 2, "statements": [ ... ] }
//! ```
//!
//! Writes go to a temporary sibling, are fsynced, then renamed over the
//! previous file, so a crash leaves either the old or the new snapshot. A
//! `<file>.sha256` sidecar holds the hex digest of the document; a mismatch
//! on load is logged and the document is still used.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lrsync_core::StatementPersistence;
use lrsync_domain::{LrsError, Result, Statement};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::errors::InfraError;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct QueueDocument {
    version: u32,
    created_at: DateTime<Utc>,
    statement_count: usize,
    statements: Vec<Statement>,
}

/// Persists the statement queue to a single JSON file.
#[derive(Debug, Clone)]
pub struct FileStatementPersistence {
    path: PathBuf,
}

impl FileStatementPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn checksum_path(&self) -> PathBuf {
        sibling(&self.path, "sha256")
    }

    fn verify_checksum(&self, bytes: &[u8]) {
        let Ok(expected) = fs::read_to_string(self.checksum_path()) else {
            debug!(path = %self.path.display(), "No checksum sidecar for queue file");
            return;
        };
        let actual = digest(bytes);
        if expected.trim() != actual {
            warn!(
                path = %self.path.display(),
                expected = expected.trim(),
                actual = %actual,
                "Queue file checksum mismatch"
            );
        }
    }
}

impl StatementPersistence for FileStatementPersistence {
    fn save(&self, statements: &[Statement]) -> Result<()> {
        let document = QueueDocument {
            version: FORMAT_VERSION,
            created_at: Utc::now(),
            statement_count: statements.len(),
            statements: statements.to_vec(),
        };
        let bytes = serde_json::to_vec(&document).map_err(to_lrs)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(to_lrs)?;
        }
        write_atomically(&self.path, &bytes)?;
        write_atomically(&self.checksum_path(), digest(&bytes).as_bytes())?;

        debug!(path = %self.path.display(), statement_count = statements.len(), "Saved statement queue");
        Ok(())
    }

    fn needs_restore(&self) -> bool {
        self.path.is_file()
    }

    fn load(&self) -> Result<Vec<Statement>> {
        let bytes = fs::read(&self.path).map_err(to_lrs)?;
        self.verify_checksum(&bytes);

        let document: QueueDocument = serde_json::from_slice(&bytes).map_err(to_lrs)?;
        if document.version > FORMAT_VERSION {
            return Err(LrsError::Persistence(format!(
                "queue file version {} is newer than supported version {}",
                document.version, FORMAT_VERSION
            )));
        }
        if document.statement_count != document.statements.len() {
            warn!(
                declared = document.statement_count,
                found = document.statements.len(),
                "Queue file statement count mismatch"
            );
        }
        Ok(document.statements)
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp = sibling(path, "tmp");
    {
        let mut file = File::create(&temp).map_err(to_lrs)?;
        file.write_all(bytes).map_err(to_lrs)?;
        file.sync_all().map_err(to_lrs)?;
    }
    fs::rename(&temp, path).map_err(to_lrs)
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(extension);
    path.with_file_name(name)
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn to_lrs<E>(err: E) -> LrsError
where
    InfraError: From<E>,
{
    InfraError::from(err).into()
}
