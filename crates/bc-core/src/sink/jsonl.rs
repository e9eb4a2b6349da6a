//! One JSON object per batch, appended to a session JSONL file.

use super::{io_error, session_dir, BatchEnvelope, BatchSink, SinkError};
use bc_common::{Channel, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub const JSONL_FILE_NAME: &str = "batches.jsonl";

/// On-disk form of one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub schema_version: String,
    pub session_id: String,
    pub channel: Channel,
    pub sequence: u64,
    pub width: usize,
    pub timestamps: Vec<u64>,
    pub values: Vec<f32>,
}

impl From<&BatchEnvelope> for BatchRecord {
    fn from(envelope: &BatchEnvelope) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            session_id: envelope.session_id.to_string(),
            channel: envelope.channel,
            sequence: envelope.batch.sequence(),
            width: envelope.batch.width(),
            timestamps: envelope.batch.timestamps().to_vec(),
            values: envelope.batch.values().to_vec(),
        }
    }
}

/// Writes `<root>/<session_id>/batches.jsonl`.
pub struct JsonlSink {
    root: PathBuf,
    writer: Option<(PathBuf, BufWriter<File>)>,
}

impl JsonlSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writer: None,
        }
    }
}

impl BatchSink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn accept(&mut self, envelope: &BatchEnvelope) -> Result<(), SinkError> {
        // JSON has no NaN or infinity; serde_json would write them as null.
        if let Some(pos) = envelope.batch.values().iter().position(|v| !v.is_finite()) {
            return Err(SinkError::Rejected {
                sink: "jsonl".into(),
                message: format!(
                    "non-finite value at index {pos} in batch {}",
                    envelope.batch.sequence()
                ),
            });
        }

        if self.writer.is_none() {
            let dir = session_dir(&self.root, &envelope.session_id);
            fs::create_dir_all(&dir).map_err(io_error(&dir))?;
            let path = dir.join(JSONL_FILE_NAME);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(io_error(&path))?;
            self.writer = Some((path, BufWriter::new(file)));
        }

        let Some((path, writer)) = self.writer.as_mut() else {
            return Ok(());
        };
        let line = serde_json::to_string(&BatchRecord::from(envelope))?;
        writeln!(writer, "{line}").map_err(io_error(path))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if let Some((path, writer)) = self.writer.as_mut() {
            writer.flush().map_err(io_error(path))?;
        }
        Ok(())
    }
}
