//! Capture session configuration.

use bc_common::{Channel, SampleRate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Samples collected per channel before a batch is handed to the sink.
pub const DEFAULT_BUFFER_CAPACITY: usize = 256;

/// Batches that may wait for the sink before the overflow policy applies.
pub const DEFAULT_QUEUE_DEPTH: usize = 32;

/// Where emitted batches are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// One CSV file per channel.
    #[default]
    Csv,
    /// One JSON object per batch in a single JSONL file.
    Jsonl,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Csv => write!(f, "csv"),
            SinkKind::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// What the producer does when the dispatch queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait for the sink to catch up.
    Block,
    /// Drop the batch that did not fit and count it.
    #[default]
    DropNewest,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "block"),
            OverflowPolicy::DropNewest => write!(f, "drop_newest"),
        }
    }
}

/// Full capture configuration as stored in `capture.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Config file schema version.
    pub schema_version: String,
    /// Samples per batch, per channel.
    pub buffer_capacity: usize,
    /// Source subscription period.
    pub sample_rate: SampleRate,
    /// Enabled channels; each gets its own buffer.
    pub channels: Vec<Channel>,
    /// Sink used by the CLI.
    pub sink: SinkKind,
    /// Bounded dispatch queue depth.
    pub queue_depth: usize,
    /// Behavior when the dispatch queue is full.
    pub overflow: OverflowPolicy,
    /// Output directory override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            sample_rate: SampleRate::Ms16,
            channels: Channel::ALL.to_vec(),
            sink: SinkKind::Csv,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            overflow: OverflowPolicy::DropNewest,
            output_dir: None,
        }
    }
}

impl CaptureConfig {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_channels(mut self, channels: impl Into<Vec<Channel>>) -> Self {
        self.channels = channels.into();
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_sample_rate(mut self, rate: SampleRate) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Whether `channel` is enabled.
    pub fn captures(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }
}
