//! Statement queue - ordered, persisted buffer of undelivered statements

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use lrsync_domain::constants::PERSISTED_ID_MEMORY;
use lrsync_domain::{
    Batch, BatchOutcome, Decision, FailureClass, QueueEntry, QueueEvent, Result, Statement,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::ports::{QueueObserver, StatementPersistence};
use crate::delivery::policy::{Disposition, RetryPolicy};

/// What the queue did with a resolved batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Entries removed after the store confirmed them.
    Removed(usize),
    /// In-flight flags cleared; `dropped` entries ran out of retries.
    Requeued { requeued: usize, dropped: usize },
    /// The whole queue was cleared.
    Discarded(usize),
}

struct QueueState {
    entries: Vec<QueueEntry>,
    next_sequence: u64,
    /// Ids the store confirmed; these are never accepted again.
    persisted_ids: LruCache<String, ()>,
    /// Set once the saved snapshot has been merged in. Nothing is written
    /// through the port before that, so a save never replaces unread data.
    restored: bool,
}

impl QueueState {
    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id() == id)
    }

    fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    fn snapshot(&self) -> Vec<Statement> {
        self.entries.iter().map(|entry| entry.statement.clone()).collect()
    }

    fn set_in_flight(&mut self, ids: &HashSet<&str>, in_flight: bool) -> usize {
        let mut touched = 0;
        for entry in self.entries.iter_mut().filter(|entry| ids.contains(entry.id())) {
            entry.in_flight = in_flight;
            touched += 1;
        }
        touched
    }

    fn resequence(&mut self) {
        for (sequence, entry) in self.entries.iter_mut().enumerate() {
            entry.sequence = sequence as u64;
        }
        self.next_sequence = self.entries.len() as u64;
    }
}

/// In-memory queue mirrored to a [`StatementPersistence`] port.
///
/// Every mutation happens under one lock, and membership changes are
/// written through the port before the call returns. The lock is never
/// held while observers run.
pub struct StatementQueue {
    state: Mutex<QueueState>,
    persistence: Arc<dyn StatementPersistence>,
    observers: RwLock<Vec<Arc<dyn QueueObserver>>>,
    policy: RetryPolicy,
}

impl StatementQueue {
    /// Create an empty queue. The saved snapshot is merged in by
    /// [`restore`](Self::restore) or, at the latest, by the first mutation.
    pub fn new(persistence: Arc<dyn StatementPersistence>, policy: RetryPolicy) -> Self {
        let capacity = NonZeroUsize::new(PERSISTED_ID_MEMORY).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(QueueState {
                entries: Vec::new(),
                next_sequence: 0,
                persisted_ids: LruCache::new(capacity),
                restored: false,
            }),
            persistence,
            observers: RwLock::new(Vec::new()),
            policy,
        }
    }

    /// Create a queue and load any saved snapshot into it.
    pub fn open(persistence: Arc<dyn StatementPersistence>, policy: RetryPolicy) -> Result<Self> {
        let queue = Self::new(persistence, policy);
        queue.restore()?;
        Ok(queue)
    }

    /// Load the saved snapshot ahead of anything already queued.
    ///
    /// Returns the number of restored statements. Saved statements whose id
    /// is already queued are skipped. Only the first call loads anything.
    pub fn restore(&self) -> Result<usize> {
        let mut state = self.state.lock();
        let count = self.restore_locked(&mut state)?;
        if count > 0 {
            self.persistence.save(&state.snapshot())?;
        }
        Ok(count)
    }

    fn restore_locked(&self, state: &mut QueueState) -> Result<usize> {
        if state.restored {
            return Ok(0);
        }
        if !self.persistence.needs_restore() {
            state.restored = true;
            return Ok(0);
        }
        let saved = self.persistence.load()?;
        state.restored = true;

        let mut seen: HashSet<String> = HashSet::new();
        let mut restored = Vec::with_capacity(saved.len());
        for mut statement in saved {
            let id = statement.ensure_id();
            if state.contains(&id) || !seen.insert(id) {
                continue;
            }
            restored.push(QueueEntry::new(statement, 0));
        }

        let count = restored.len();
        if count == 0 {
            return Ok(0);
        }
        let mut entries = restored;
        entries.append(&mut state.entries);
        state.entries = entries;
        state.resequence();
        info!(restored = count, queued = state.entries.len(), "Restored statement queue");
        Ok(count)
    }

    pub fn subscribe(&self, observer: Arc<dyn QueueObserver>) {
        self.observers.write().push(observer);
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Append statements at the tail in argument order.
    ///
    /// Statements without an id get a generated one. Statements whose id is
    /// already queued, repeated in the argument, or already confirmed by
    /// the store are skipped. Returns the accepted statements.
    ///
    /// If the snapshot cannot be written, nothing is added.
    pub fn enqueue(&self, statements: Vec<Statement>) -> Result<Vec<Statement>> {
        let mut state = self.state.lock();
        self.restore_locked(&mut state)?;
        let previous_len = state.entries.len();
        let previous_sequence = state.next_sequence;

        let mut accepted = Vec::with_capacity(statements.len());
        for mut statement in statements {
            let id = statement.ensure_id();
            if state.contains(&id) || state.persisted_ids.contains(&id) {
                debug!(statement_id = %id, "Skipping statement already queued or persisted");
                continue;
            }
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.entries.push(QueueEntry::new(statement.clone(), sequence));
            accepted.push(statement);
        }

        if accepted.is_empty() {
            return Ok(accepted);
        }

        if let Err(err) = self.persistence.save(&state.snapshot()) {
            state.entries.truncate(previous_len);
            state.next_sequence = previous_sequence;
            warn!(error = %err, "Failed to persist queue; enqueue rolled back");
            return Err(err);
        }

        debug!(statement_count = accepted.len(), queued = state.entries.len(), "Enqueued statements");
        Ok(accepted)
    }

    /// Statements not part of an outstanding batch, oldest first.
    pub fn unsent_statements(&self) -> Vec<Statement> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|entry| !entry.in_flight)
            .map(|entry| entry.statement.clone())
            .collect()
    }

    /// Flag the given statements as in flight. Unknown ids are ignored.
    pub fn mark_in_flight(&self, ids: &[String]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.state.lock().set_in_flight(&ids, true)
    }

    /// Clear the in-flight flag of the given statements. Unknown ids are
    /// ignored.
    pub fn clear_in_flight(&self, ids: &[String]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.state.lock().set_in_flight(&ids, false)
    }

    /// Take the unsent statements, split them into batches of at most
    /// `batch_size` and flag them in flight, all under one lock so two
    /// concurrent flushes never claim the same statement.
    pub fn claim_batches(&self, batch_size: usize) -> Vec<Batch> {
        let batch_size = batch_size.max(1);
        let mut state = self.state.lock();

        let mut batches = Vec::new();
        let mut current = Vec::with_capacity(batch_size);
        for entry in state.entries.iter_mut().filter(|entry| !entry.in_flight) {
            entry.in_flight = true;
            current.push(entry.statement.clone());
            if current.len() == batch_size {
                batches.push(Batch::new(std::mem::take(&mut current)));
            }
        }
        if !current.is_empty() {
            batches.push(Batch::new(current));
        }
        batches
    }

    /// Delete the matching statements.
    ///
    /// On a failed write the removal is kept in memory and the error is
    /// returned; the stored snapshot still holds the removed statements.
    pub fn remove(&self, statements: &[Statement]) -> Result<usize> {
        self.remove_entries(statements, false)
    }

    /// Remove entries and, for statements the store confirmed, remember
    /// their ids so `enqueue` refuses them later.
    fn remove_entries(&self, statements: &[Statement], confirmed: bool) -> Result<usize> {
        let ids: HashSet<&str> = statements.iter().filter_map(Statement::id).collect();
        let mut state = self.state.lock();
        self.restore_locked(&mut state)?;

        let before = state.entries.len();
        state.entries.retain(|entry| !ids.contains(entry.id()));
        if confirmed {
            for id in &ids {
                state.persisted_ids.put((*id).to_string(), ());
            }
        }
        let removed = before - state.entries.len();
        if removed > 0 {
            self.persistence.save(&state.snapshot())?;
        }
        Ok(removed)
    }

    pub fn remove_statement(&self, statement: &Statement) -> Result<bool> {
        Ok(self.remove(std::slice::from_ref(statement))? > 0)
    }

    /// Drop every queued statement.
    pub fn remove_all(&self) -> Result<usize> {
        let mut state = self.state.lock();
        self.restore_locked(&mut state)?;
        let removed = state.entries.len();
        state.entries.clear();
        self.persistence.save(&[])?;
        Ok(removed)
    }

    /// Write the current snapshot through the persistence port.
    pub fn persist(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.restore_locked(&mut state)?;
        self.persistence.save(&state.snapshot())
    }

    /// Number of queued statements, in flight or not.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_queued_statements(&self) -> bool {
        !self.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.lock().entries.iter().filter(|entry| entry.in_flight).count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().contains(id)
    }

    /// Up to `count` statements starting at `start_index`, in queue order.
    pub fn queued_statements(&self, count: usize, start_index: usize) -> Vec<Statement> {
        self.state
            .lock()
            .entries
            .iter()
            .skip(start_index)
            .take(count)
            .map(|entry| entry.statement.clone())
            .collect()
    }

    /// Snapshot of the entries with their bookkeeping.
    pub fn entries(&self) -> Vec<QueueEntry> {
        self.state.lock().entries.clone()
    }

    /// Apply a batch's outcome to the queue and notify observers.
    ///
    /// Observers of a confirmed batch are notified even when writing the
    /// shrunken snapshot fails; the write error is returned afterwards.
    pub fn resolve(&self, batch: &Batch, outcome: BatchOutcome) -> Result<Resolution> {
        let decisions = match &outcome {
            BatchOutcome::PersistedAll { .. } => Vec::new(),
            BatchOutcome::PersistedNone { class: FailureClass::Transient, error } => {
                debug!(error = %error, batch_size = batch.len(), "Transient failure; batch requeued");
                Vec::new()
            }
            BatchOutcome::PersistedNone { class: FailureClass::Permanent, error } => {
                warn!(error = %error, batch_size = batch.len(), "Batch failed to persist");
                self.notify(&QueueEvent::FailedToPersist {
                    statements: batch.statements.clone(),
                    error: error.clone(),
                })
            }
        };

        match self.policy.disposition(&outcome, &decisions) {
            Disposition::Remove => {
                let assigned_ids: &[String] = match &outcome {
                    BatchOutcome::PersistedAll { assigned_ids } => assigned_ids.as_slice(),
                    BatchOutcome::PersistedNone { .. } => &[],
                };
                let removed = self.remove_entries(&batch.statements, true);
                let statements = assign_ids(&batch.statements, assigned_ids);
                info!(statement_count = statements.len(), "Statements persisted");
                self.notify(&QueueEvent::Persisted { statements });
                Ok(Resolution::Removed(removed?))
            }
            Disposition::DiscardAll => {
                let discarded = self.remove_all()?;
                warn!(discarded, "Observer discarded the statement queue");
                Ok(Resolution::Discarded(discarded))
            }
            Disposition::Requeue => {
                let permanent = matches!(
                    outcome,
                    BatchOutcome::PersistedNone { class: FailureClass::Permanent, .. }
                );
                self.requeue(&batch.ids(), permanent)
            }
        }
    }

    fn requeue(&self, ids: &[String], permanent: bool) -> Result<Resolution> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut state = self.state.lock();
        self.restore_locked(&mut state)?;

        let mut dropped = 0;
        if permanent {
            let policy = self.policy;
            for entry in state.entries.iter_mut().filter(|entry| ids.contains(entry.id())) {
                entry.permanent_failures = entry.permanent_failures.saturating_add(1);
            }
            let before = state.entries.len();
            state.entries.retain(|entry| {
                !(ids.contains(entry.id()) && policy.exhausted(entry.permanent_failures))
            });
            dropped = before - state.entries.len();
        }

        let requeued = state.set_in_flight(&ids, false);
        if dropped > 0 {
            warn!(dropped, "Dropped statements that exhausted their retries");
            self.persistence.save(&state.snapshot())?;
        }
        Ok(Resolution::Requeued { requeued, dropped })
    }

    fn notify(&self, event: &QueueEvent) -> Vec<Decision> {
        let observers: Vec<Arc<dyn QueueObserver>> = self.observers.read().clone();
        observers.iter().map(|observer| observer.on_queue_event(event)).collect()
    }
}

impl std::fmt::Debug for StatementQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StatementQueue")
            .field("queued", &state.entries.len())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Copies of `statements` carrying the ids the store assigned, matched by
/// position.
fn assign_ids(statements: &[Statement], assigned_ids: &[String]) -> Vec<Statement> {
    statements
        .iter()
        .enumerate()
        .map(|(index, statement)| match assigned_ids.get(index) {
            Some(id) if !id.is_empty() => statement.clone().with_id(id.clone()),
            _ => statement.clone(),
        })
        .collect()
}
