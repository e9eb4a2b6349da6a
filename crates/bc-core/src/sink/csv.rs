//! Per-channel CSV files, one line per sample.

use super::{io_error, session_dir, BatchEnvelope, BatchSink, SinkError};
use bc_common::Channel;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes `<root>/<session_id>/<channel>.csv`.
///
/// Files are opened lazily on the first batch for a channel and appended to,
/// so a header is only written when the file starts out empty.
pub struct CsvSink {
    root: PathBuf,
    writers: HashMap<Channel, (PathBuf, BufWriter<File>)>,
}

impl CsvSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writers: HashMap::new(),
        }
    }

    /// Path of the file a channel's batches go to.
    pub fn channel_path(root: &Path, envelope: &BatchEnvelope) -> PathBuf {
        session_dir(root, &envelope.session_id).join(format!("{}.csv", envelope.channel))
    }

    fn writer_for(
        &mut self,
        envelope: &BatchEnvelope,
    ) -> Result<&mut (PathBuf, BufWriter<File>), SinkError> {
        let entry = match self.writers.entry(envelope.channel) {
            Entry::Occupied(entry) => return Ok(entry.into_mut()),
            Entry::Vacant(entry) => entry,
        };

        let path = Self::channel_path(&self.root, envelope);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error(&path))?;
        let empty = file.metadata().map_err(io_error(&path))?.len() == 0;
        let mut writer = BufWriter::new(file);
        if empty {
            writeln!(writer, "{}", header(envelope.batch.width())).map_err(io_error(&path))?;
        }
        Ok(entry.insert((path, writer)))
    }
}

fn header(width: usize) -> String {
    let mut header = String::from("timestamp");
    if width == 3 {
        header.push_str(",x,y,z");
    } else {
        for i in 0..width {
            header.push_str(&format!(",v{i}"));
        }
    }
    header
}

impl BatchSink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn accept(&mut self, envelope: &BatchEnvelope) -> Result<(), SinkError> {
        let (path, writer) = self.writer_for(envelope)?;
        for (timestamp, values) in envelope.batch.rows() {
            let mut line = timestamp.to_string();
            for v in values {
                line.push(',');
                line.push_str(&v.to_string());
            }
            writeln!(writer, "{line}").map_err(io_error(path))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        for (path, writer) in self.writers.values_mut() {
            writer.flush().map_err(io_error(path))?;
        }
        Ok(())
    }
}
