//! Batch sinks: where full buffers end up.
//!
//! A sink accepts batches in delivery order for durable storage or
//! forwarding. Sinks run on the dispatcher's worker thread, never on the
//! producer thread, so they are free to block on I/O. A failed `accept` is
//! reported back through the dispatch report; it never affects the buffers
//! that produced the batch.

mod csv;
mod jsonl;
mod memory;
mod tee;

pub use self::csv::CsvSink;
pub use self::jsonl::{BatchRecord, JsonlSink, JSONL_FILE_NAME};
pub use self::memory::{ForwardSink, MemorySink};
pub use self::tee::TeeSink;

use bc_common::{Batch, Channel, SessionId};
use bc_config::SinkKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reported by sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("forwarding receiver disconnected")]
    Disconnected,

    #[error("{sink} rejected batch: {message}")]
    Rejected { sink: String, message: String },
}

impl From<SinkError> for bc_common::Error {
    fn from(err: SinkError) -> Self {
        bc_common::Error::Sink(err.to_string())
    }
}

/// A batch tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEnvelope {
    pub session_id: SessionId,
    pub channel: Channel,
    pub batch: Batch,
}

/// Consumer of emitted batches.
pub trait BatchSink: Send {
    /// Short name for logs and reports.
    fn name(&self) -> &str;

    /// Store or forward one batch.
    fn accept(&mut self, envelope: &BatchEnvelope) -> Result<(), SinkError>;

    /// Push buffered output to its destination.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Build the file sink selected by configuration.
pub fn open_sink(kind: SinkKind, root: &Path) -> Box<dyn BatchSink> {
    match kind {
        SinkKind::Csv => Box::new(CsvSink::new(root)),
        SinkKind::Jsonl => Box::new(JsonlSink::new(root)),
    }
}

/// Directory holding one session's files.
pub fn session_dir(root: &Path, session_id: &SessionId) -> PathBuf {
    root.join(session_id.as_str())
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SinkError + '_ {
    move |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    }
}
