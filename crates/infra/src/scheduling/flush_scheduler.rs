//! Flush scheduler - periodic, non-reentrant queue flushing.
//!
//! A background task sleeps for the configured interval, then runs one
//! tick: skip when a tick is already running, skip when the connectivity
//! monitor reports offline, otherwise flush and wait for that flush's
//! batches. Ticks never accumulate; the next countdown starts once the
//! current tick is done.
//!
//! Stopping the scheduler cancels the countdown only. Batches already sent
//! keep running and resolve against the queue as usual.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use lrsync_infra::connectivity::StaticConnectivity;
//! use lrsync_infra::delivery::BatchDispatcher;
//! use lrsync_infra::scheduling::FlushScheduler;
//!
//! # async fn example(dispatcher: Arc<BatchDispatcher>) -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = FlushScheduler::new(
//!     dispatcher,
//!     Arc::new(StaticConnectivity::default()),
//!     Duration::from_secs(120),
//! );
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lrsync_core::ConnectivityMonitor;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::delivery::BatchDispatcher;
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was still running.
    Skipped,
    /// The connectivity monitor reported offline; nothing was claimed.
    Offline,
    /// A flush ran to completion.
    Flushed { statements: usize, batches: usize },
}

/// State shared between the scheduler and its background loop.
struct FlushWorker {
    dispatcher: Arc<BatchDispatcher>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    in_progress: AtomicBool,
    counting_down: AtomicBool,
}

/// Resets the in-progress flag when a tick ends or is dropped.
struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl FlushWorker {
    async fn tick(&self) -> TickOutcome {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Flush already in progress; skipping tick");
            return TickOutcome::Skipped;
        }
        let _guard = InProgressGuard(&self.in_progress);

        if !self.connectivity.is_online().await {
            debug!("Offline; skipping tick");
            return TickOutcome::Offline;
        }

        let ticket = self.dispatcher.flush();
        let (statements, batches) = (ticket.dispatched(), ticket.batches());
        if let Err(err) = ticket.wait().await {
            warn!(error = %err, "Scheduled flush finished with errors");
        }
        TickOutcome::Flushed { statements, batches }
    }
}

/// Runs the batch dispatcher on a repeating interval.
pub struct FlushScheduler {
    worker: Arc<FlushWorker>,
    interval: parking_lot::Mutex<Duration>,
    cancellation_token: parking_lot::Mutex<CancellationToken>,
    task_handle: TaskHandle,
}

impl FlushScheduler {
    /// Create a stopped scheduler. An interval of zero disables it.
    pub fn new(
        dispatcher: Arc<BatchDispatcher>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        interval: Duration,
    ) -> Self {
        Self {
            worker: Arc::new(FlushWorker {
                dispatcher,
                connectivity,
                in_progress: AtomicBool::new(false),
                counting_down: AtomicBool::new(false),
            }),
            interval: parking_lot::Mutex::new(interval),
            cancellation_token: parking_lot::Mutex::new(CancellationToken::new()),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    pub fn interval(&self) -> Duration {
        *self.interval.lock()
    }

    /// Start the background countdown.
    ///
    /// # Errors
    ///
    /// Returns error if the scheduler is already running or the interval
    /// is zero.
    #[instrument(skip(self))]
    pub async fn start(&self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        let interval = self.interval();
        if interval.is_zero() {
            return Err(SchedulerError::Disabled);
        }

        info!(interval_secs = interval.as_secs_f64(), "Starting flush scheduler");

        // Fresh token so the scheduler can restart after stop
        let cancel = CancellationToken::new();
        *self.cancellation_token.lock() = cancel.clone();

        let worker = Arc::clone(&self.worker);
        let handle = tokio::spawn(async move {
            Self::flush_loop(worker, interval, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Stop the countdown and wait for the loop to exit.
    ///
    /// # Errors
    ///
    /// Returns error if the scheduler is not running or the loop does not
    /// exit in time.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping flush scheduler");
        self.cancellation_token.lock().cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            tokio::time::timeout(STOP_TIMEOUT, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: STOP_TIMEOUT.as_secs() })?
                .map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }

        self.worker.counting_down.store(false, Ordering::SeqCst);
        info!("Flush scheduler stopped");
        Ok(())
    }

    /// Change the interval. A running scheduler restarts with the new
    /// value; zero stops it.
    #[instrument(skip(self))]
    pub async fn set_interval(&self, interval: Duration) -> SchedulerResult<()> {
        *self.interval.lock() = interval;

        if self.is_running() {
            self.stop().await?;
        }
        if interval.is_zero() {
            debug!("Automatic flushing disabled");
            return Ok(());
        }
        self.start().await
    }

    /// Check if the scheduler is running
    ///
    /// A scheduler is considered running if it has an active task handle that
    /// hasn't finished.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// True while the loop is waiting for its next tick.
    pub fn is_counting_down(&self) -> bool {
        self.worker.counting_down.load(Ordering::SeqCst)
    }

    /// True while a tick is flushing.
    pub fn is_flushing(&self) -> bool {
        self.worker.in_progress.load(Ordering::SeqCst)
    }

    /// Run one tick now, independent of the countdown.
    pub async fn tick(&self) -> TickOutcome {
        self.worker.tick().await
    }

    async fn flush_loop(worker: Arc<FlushWorker>, interval: Duration, cancel: CancellationToken) {
        loop {
            worker.counting_down.store(true, Ordering::SeqCst);
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Flush loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
            worker.counting_down.store(false, Ordering::SeqCst);

            // Batches are spawned tasks, so leaving mid-tick does not abort them
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Flush loop cancelled during tick");
                    break;
                }
                outcome = worker.tick() => {
                    debug!(?outcome, "Scheduled tick finished");
                }
            }
        }
        worker.counting_down.store(false, Ordering::SeqCst);
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.cancellation_token.lock().cancel();
    }
}

impl std::fmt::Debug for FlushScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushScheduler")
            .field("interval", &self.interval())
            .field("running", &self.is_running())
            .field("counting_down", &self.is_counting_down())
            .finish()
    }
}
