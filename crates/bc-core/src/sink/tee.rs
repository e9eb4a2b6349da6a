//! Fan-out to several sinks.

use super::{BatchEnvelope, BatchSink, SinkError};
use tracing::warn;

/// Offers every batch to each inner sink in order.
///
/// A failing sink does not stop the others from receiving the batch; the
/// first error is returned once all sinks have been offered it.
pub struct TeeSink {
    sinks: Vec<Box<dyn BatchSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Box<dyn BatchSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Box<dyn BatchSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(
        &mut self,
        mut op: impl FnMut(&mut dyn BatchSink) -> Result<(), SinkError>,
    ) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in &mut self.sinks {
            if let Err(err) = op(sink.as_mut()) {
                warn!(sink = sink.name(), error = %err, "tee member failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl BatchSink for TeeSink {
    fn name(&self) -> &str {
        "tee"
    }

    fn accept(&mut self, envelope: &BatchEnvelope) -> Result<(), SinkError> {
        self.each(|sink| sink.accept(envelope))
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.each(|sink| sink.flush())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use bc_common::{Batch, Channel, SessionId};

    struct Broken;

    impl BatchSink for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn accept(&mut self, _envelope: &BatchEnvelope) -> Result<(), SinkError> {
            Err(SinkError::Rejected {
                sink: "broken".into(),
                message: "disk full".into(),
            })
        }
    }

    #[test]
    fn test_failure_does_not_starve_later_sinks() {
        let memory = MemorySink::new();
        let mut tee = TeeSink::new(vec![Box::new(Broken), Box::new(memory.clone())]);
        let envelope = BatchEnvelope {
            session_id: SessionId::new(),
            channel: Channel::Accelerometer,
            batch: Batch::new(0, 1, vec![1], vec![1.0]),
        };

        let err = tee.accept(&envelope).unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert_eq!(memory.len(), 1);
        assert!(tee.flush().is_ok());
    }
}
