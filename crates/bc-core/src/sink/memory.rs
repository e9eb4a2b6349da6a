//! In-process sinks: shared memory collection and channel forwarding.

use super::{BatchEnvelope, BatchSink, SinkError};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

/// Collects envelopes in memory. Clones share the same storage, so a test
/// can keep a handle while the sink itself moves to the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    envelopes: Arc<Mutex<Vec<BatchEnvelope>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything accepted so far, in delivery order.
    pub fn envelopes(&self) -> Vec<BatchEnvelope> {
        self.envelopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.envelopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BatchSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn accept(&mut self, envelope: &BatchEnvelope) -> Result<(), SinkError> {
        self.envelopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope.clone());
        Ok(())
    }
}

/// Forwards envelopes to another component over an mpsc channel.
pub struct ForwardSink {
    tx: Sender<BatchEnvelope>,
}

impl ForwardSink {
    pub fn new(tx: Sender<BatchEnvelope>) -> Self {
        Self { tx }
    }
}

impl BatchSink for ForwardSink {
    fn name(&self) -> &str {
        "forward"
    }

    fn accept(&mut self, envelope: &BatchEnvelope) -> Result<(), SinkError> {
        self.tx
            .send(envelope.clone())
            .map_err(|_| SinkError::Disconnected)
    }
}
