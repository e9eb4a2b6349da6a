//! Bounded hand-off of batches from the producer to a sink worker.
//!
//! The producer thread only ever enqueues; sink I/O happens on a dedicated
//! worker thread that owns the sink. The queue is bounded, and what the
//! producer does when it is full is governed by [`OverflowPolicy`]:
//!
//! - `Block`: wait for room. Nothing is lost, but a stalled sink
//!   eventually stalls ingestion.
//! - `DropNewest`: drop the batch that did not fit, count it, and return
//!   immediately. Ingestion never waits on the sink.
//!
//! Batches reach the sink in submission order. Sink failures are counted
//! and logged; the worker keeps draining the queue.

use crate::sink::{BatchEnvelope, BatchSink};
use bc_config::OverflowPolicy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher closed")]
    Closed,

    #[error("failed to spawn dispatch worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("dispatch worker panicked")]
    WorkerPanicked,
}

impl From<DispatchError> for bc_common::Error {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Closed => bc_common::Error::DispatcherClosed,
            DispatchError::Spawn(e) => bc_common::Error::Io(e),
            DispatchError::WorkerPanicked => {
                bc_common::Error::Sink("dispatch worker panicked".to_string())
            }
        }
    }
}

/// What happened to a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    Dropped,
}

/// Delivery totals for one dispatcher lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sink: String,
    pub submitted: u64,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl DispatchReport {
    /// Every submitted batch reached the sink and the final flush succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.dropped == 0 && self.last_error.is_none()
    }
}

#[derive(Default)]
struct WorkerTally {
    delivered: u64,
    failed: u64,
    last_error: Option<String>,
}

/// Owns the queue and the sink worker thread.
pub struct BatchDispatcher {
    tx: Option<SyncSender<BatchEnvelope>>,
    worker: Option<JoinHandle<WorkerTally>>,
    policy: OverflowPolicy,
    sink_name: String,
    submitted: AtomicU64,
    dropped: AtomicU64,
}

impl BatchDispatcher {
    /// Start a worker draining into `sink`.
    pub fn spawn(
        mut sink: Box<dyn BatchSink>,
        queue_depth: usize,
        policy: OverflowPolicy,
    ) -> Result<Self, DispatchError> {
        let (tx, rx) = mpsc::sync_channel(queue_depth.max(1));
        let sink_name = sink.name().to_string();
        let worker = thread::Builder::new()
            .name(format!("bc-dispatch-{sink_name}"))
            .spawn(move || drain(sink.as_mut(), rx))
            .map_err(DispatchError::Spawn)?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            policy,
            sink_name,
            submitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Hand a batch to the worker.
    pub fn submit(&self, envelope: BatchEnvelope) -> Result<SubmitOutcome, DispatchError> {
        let tx = self.tx.as_ref().ok_or(DispatchError::Closed)?;
        self.submitted.fetch_add(1, Ordering::Relaxed);

        match self.policy {
            OverflowPolicy::Block => {
                tx.send(envelope).map_err(|_| DispatchError::Closed)?;
                Ok(SubmitOutcome::Queued)
            }
            OverflowPolicy::DropNewest => match tx.try_send(envelope) {
                Ok(()) => Ok(SubmitOutcome::Queued),
                Err(TrySendError::Full(envelope)) => {
                    let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        channel = %envelope.channel,
                        sequence = envelope.batch.sequence(),
                        dropped,
                        "dispatch queue full; batch dropped"
                    );
                    Ok(SubmitOutcome::Dropped)
                }
                Err(TrySendError::Disconnected(_)) => Err(DispatchError::Closed),
            },
        }
    }

    /// Close the queue, wait for the worker to drain it, and report.
    pub fn finish(mut self) -> Result<DispatchReport, DispatchError> {
        let tally = self.shutdown()?;
        Ok(DispatchReport {
            sink: self.sink_name.clone(),
            submitted: self.submitted.load(Ordering::Relaxed),
            delivered: tally.delivered,
            failed: tally.failed,
            dropped: self.dropped.load(Ordering::Relaxed),
            last_error: tally.last_error,
        })
    }

    fn shutdown(&mut self) -> Result<WorkerTally, DispatchError> {
        drop(self.tx.take());
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| DispatchError::WorkerPanicked),
            None => Ok(WorkerTally::default()),
        }
    }
}

impl Drop for BatchDispatcher {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(err) = self.shutdown() {
                warn!(error = %err, "dispatcher dropped without finish");
            }
        }
    }
}

fn drain(sink: &mut dyn BatchSink, rx: Receiver<BatchEnvelope>) -> WorkerTally {
    let mut tally = WorkerTally::default();

    for envelope in rx {
        match sink.accept(&envelope) {
            Ok(()) => {
                tally.delivered += 1;
                debug!(
                    sink = sink.name(),
                    channel = %envelope.channel,
                    sequence = envelope.batch.sequence(),
                    samples = envelope.batch.len(),
                    "batch delivered"
                );
            }
            Err(err) => {
                tally.failed += 1;
                warn!(
                    sink = sink.name(),
                    channel = %envelope.channel,
                    sequence = envelope.batch.sequence(),
                    error = %err,
                    "sink rejected batch"
                );
                tally.last_error = Some(err.to_string());
            }
        }
    }

    if let Err(err) = sink.flush() {
        warn!(sink = sink.name(), error = %err, "sink flush failed");
        tally.last_error = Some(err.to_string());
    }
    tally
}
