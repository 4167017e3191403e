//! Background sync queue.
//!
//! Requests go into a bounded channel. A dispatcher task takes them off in
//! order and runs each on the blocking thread pool, at most `workers` at a
//! time, with its own deadline. Submitting never waits: a full or closed
//! queue refuses the request immediately.
//!
//! Job failures are only logged; their outcome is visible through the
//! template status the synchronizer records.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::config::SyncConfig;
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::sync::{SyncRequest, Synchronizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    /// Jobs run concurrently.
    pub workers: usize,
    /// Requests buffered before `submit` refuses new ones.
    pub capacity: usize,
    /// Time budget of each job.
    pub timeout: Duration,
}

impl From<&SyncConfig> for QueueOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            workers: config.workers,
            capacity: config.queue_capacity,
            timeout: config.timeout,
        }
    }
}

/// Counts of finished jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl QueueSummary {
    fn record(&mut self, outcome: std::result::Result<bool, JoinError>) {
        match outcome {
            Ok(true) => self.succeeded += 1,
            Ok(false) => self.failed += 1,
            Err(e) => {
                error!("Sync job aborted: {}", e);
                self.failed += 1;
            }
        }
    }
}

/// Cloneable submission side of a [`SyncQueue`].
#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: mpsc::Sender<SyncRequest>,
    capacity: usize,
}

impl QueueSender {
    /// Enqueues `request` without waiting.
    pub fn submit(&self, request: SyncRequest) -> Result<()> {
        debug!("Queueing sync of {}", request);
        self.tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => Error::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => Error::QueueClosed,
        })
    }
}

/// A running sync queue. Must be started inside a tokio runtime.
pub struct SyncQueue {
    sender: QueueSender,
    stop: oneshot::Sender<()>,
    dispatcher: JoinHandle<QueueSummary>,
}

impl SyncQueue {
    pub fn start(synchronizer: Arc<Synchronizer>, options: QueueOptions) -> Self {
        let capacity = options.capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (stop, stop_rx) = oneshot::channel();

        info!(
            "Sync queue started: workers={}, capacity={}, timeout={:?}",
            options.workers, capacity, options.timeout
        );
        let dispatcher = tokio::spawn(dispatch(synchronizer, rx, stop_rx, options));

        Self {
            sender: QueueSender { tx, capacity },
            stop,
            dispatcher,
        }
    }

    pub fn sender(&self) -> QueueSender {
        self.sender.clone()
    }

    pub fn submit(&self, request: SyncRequest) -> Result<()> {
        self.sender.submit(request)
    }

    /// Stops accepting requests, runs everything already queued, and waits
    /// for all jobs to finish.
    pub async fn shutdown(self) -> QueueSummary {
        // The dispatcher also stops when the signal is dropped unsent
        let _ = self.stop.send(());
        drop(self.sender);

        match self.dispatcher.await {
            Ok(summary) => {
                info!(
                    "Sync queue drained: {} succeeded, {} failed",
                    summary.succeeded, summary.failed
                );
                summary
            }
            Err(e) => {
                error!("Sync queue dispatcher failed: {}", e);
                QueueSummary::default()
            }
        }
    }
}

async fn dispatch(
    synchronizer: Arc<Synchronizer>,
    mut rx: mpsc::Receiver<SyncRequest>,
    mut stop: oneshot::Receiver<()>,
    options: QueueOptions,
) -> QueueSummary {
    let permits = Arc::new(Semaphore::new(options.workers.max(1)));
    let mut jobs = JoinSet::new();
    let mut summary = QueueSummary::default();
    let mut stopping = false;

    loop {
        let request = tokio::select! {
            request = rx.recv() => request,
            _ = &mut stop, if !stopping => {
                // Buffered requests are still delivered after close
                stopping = true;
                rx.close();
                continue;
            }
        };
        let Some(request) = request else { break };

        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        while let Some(outcome) = jobs.try_join_next() {
            summary.record(outcome);
        }

        let synchronizer = Arc::clone(&synchronizer);
        let timeout = options.timeout;
        jobs.spawn_blocking(move || {
            let _permit = permit;
            match synchronizer.handle(&request, Deadline::after(timeout)) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Sync of {} failed: {}", request, e);
                    false
                }
            }
        });
    }

    while let Some(outcome) = jobs.join_next().await {
        summary.record(outcome);
    }
    summary
}
