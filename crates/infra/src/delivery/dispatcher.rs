//! Batch dispatcher - turns unsent queue entries into concurrent POSTs

use std::sync::Arc;

use lrsync_core::{Resolution, StatementQueue};
use lrsync_domain::constants::STATEMENTS_PATH;
use lrsync_domain::{Batch, BatchOutcome, HttpMethod, LrsError, RequestError, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::request::{RequestContext, RequestOutcome};

/// Completion handle for one flush.
///
/// Dropping the ticket does not stop the batches; they still resolve
/// against the queue.
#[derive(Debug, Default)]
pub struct FlushTicket {
    dispatched: usize,
    handles: Vec<JoinHandle<Result<Resolution>>>,
}

impl FlushTicket {
    /// Statements sent by this flush.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Requests started by this flush.
    pub fn batches(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every batch of this flush to resolve.
    ///
    /// All batches are awaited even when one fails; the first error is
    /// returned.
    pub async fn wait(self) -> Result<Vec<Resolution>> {
        let mut resolutions = Vec::with_capacity(self.handles.len());
        let mut first_error = None;

        for handle in self.handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => Err(LrsError::Internal(format!("batch task ended abnormally: {err}"))),
            };
            match result {
                Ok(resolution) => resolutions.push(resolution),
                Err(err) => {
                    warn!(error = %err, "Batch resolution failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(resolutions),
        }
    }
}

/// Sends the queue's unsent statements to the store.
pub struct BatchDispatcher {
    queue: Arc<StatementQueue>,
    context: RequestContext,
    batch_size: usize,
}

impl BatchDispatcher {
    pub fn new(queue: Arc<StatementQueue>, context: RequestContext, batch_size: usize) -> Self {
        Self { queue, context, batch_size: batch_size.max(1) }
    }

    pub fn queue(&self) -> &Arc<StatementQueue> {
        &self.queue
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Claim the unsent statements and start one request per batch.
    ///
    /// Returns once every request is spawned. Statements already in flight
    /// from an earlier flush are left to that flush.
    #[instrument(skip(self), fields(batch_size = self.batch_size))]
    pub fn flush(&self) -> FlushTicket {
        let batches = self.queue.claim_batches(self.batch_size);
        if batches.is_empty() {
            debug!("No unsent statements to flush");
            return FlushTicket::default();
        }

        let dispatched = batches.iter().map(Batch::len).sum();
        info!(statement_count = dispatched, batch_count = batches.len(), "Flushing statement queue");

        let handles = batches
            .into_iter()
            .map(|batch| {
                tokio::spawn(deliver(Arc::clone(&self.queue), self.context.clone(), batch))
            })
            .collect();

        FlushTicket { dispatched, handles }
    }

    /// Flush and block until every batch of this flush has resolved.
    #[instrument(skip(self))]
    pub async fn flush_and_wait(&self) -> Result<Vec<Resolution>> {
        self.flush().wait().await
    }
}

impl std::fmt::Debug for BatchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("batch_size", &self.batch_size)
            .field("queue_len", &self.queue.len())
            .finish()
    }
}

async fn deliver(
    queue: Arc<StatementQueue>,
    context: RequestContext,
    batch: Batch,
) -> Result<Resolution> {
    let outcome = match batch.to_body() {
        Ok(body) => {
            let request = Arc::new(context.request(HttpMethod::Post, STATEMENTS_PATH).with_body(body));
            request.run().await
        }
        Err(err) => RequestOutcome::Failed(RequestError::invalid_argument(format!(
            "cannot serialize statement batch: {err}"
        ))),
    };

    let result = match outcome {
        RequestOutcome::Finished(response) => Ok(response.statement_ids()),
        RequestOutcome::Failed(error) => Err(error),
        RequestOutcome::Cancelled => {
            let requeued = queue.clear_in_flight(&batch.ids());
            return Ok(Resolution::Requeued { requeued, dropped: 0 });
        }
    };

    queue.resolve(&batch, BatchOutcome::from_result(result))
}
