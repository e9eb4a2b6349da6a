//! Sensor event sources.
//!
//! A source delivers [`MotionReading`]s to a handler at its own pace; the
//! capture session never polls. Device pairing and connection handshakes
//! live behind [`SensorSource::connect`], so a vendor SDK adapter only has to
//! forward its callbacks (e.g. through an mpsc channel wrapped in an
//! [`IterSource`]).

use bc_common::{MotionReading, ParseReadingError, SampleRate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::f32::consts::TAU;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::thread;
use thiserror::Error;
use tracing::debug;

/// Standard gravity, m/s².
const GRAVITY: f32 = 9.806_65;

/// Outcome of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    /// No device paired with this host.
    NotPaired,
    /// Paired, but the device did not come up.
    NotConnected,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: ParseReadingError,
    },

    #[error("source is not connected")]
    NotConnected,
}

impl From<SourceError> for bc_common::Error {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotConnected => {
                bc_common::Error::NotConnected("source is not connected".to_string())
            }
            other => bc_common::Error::Source(other.to_string()),
        }
    }
}

/// Callback a source pushes readings into. Returning `Break` asks the
/// source to stop streaming.
pub type ReadingHandler<'a> = dyn FnMut(MotionReading) -> ControlFlow<()> + 'a;

/// Producer of motion readings.
pub trait SensorSource {
    fn name(&self) -> &str;

    /// Establish the device connection.
    fn connect(&mut self) -> Result<ConnectionState, SourceError>;

    /// Deliver readings until exhausted or the handler breaks.
    ///
    /// Returns the number of readings delivered.
    fn stream(&mut self, handler: &mut ReadingHandler<'_>) -> Result<u64, SourceError>;

    /// Release the device. Errors during teardown are ignored.
    fn disconnect(&mut self) {}
}

// ── Synthetic ───────────────────────────────────────────────────────────

/// Deterministic wrist-motion generator.
///
/// Produces a slow arm swing on top of gravity plus seeded noise, one
/// reading per sample-rate period. Timestamps are milliseconds starting at
/// `start_ms`.
#[derive(Debug)]
pub struct SyntheticSource {
    rate: SampleRate,
    count: u64,
    start_ms: u64,
    realtime: bool,
    paired: bool,
    connected: bool,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(rate: SampleRate, count: u64, seed: u64) -> Self {
        Self {
            rate,
            count,
            start_ms: 0,
            realtime: false,
            paired: true,
            connected: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_start_ms(mut self, start_ms: u64) -> Self {
        self.start_ms = start_ms;
        self
    }

    /// Sleep one period between readings.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Simulate a host with no paired device.
    pub fn unpaired(mut self) -> Self {
        self.paired = false;
        self
    }

    fn reading(&mut self, i: u64) -> MotionReading {
        let period_ms = self.rate.period_ms();
        let timestamp = self.start_ms + i * period_ms;
        // Half-hertz swing.
        let phase = TAU * 0.5 * (i * period_ms) as f32 / 1000.0;
        let mut noise = || self.rng.random_range(-0.05f32..0.05);

        let acceleration = [
            0.8 * phase.sin() + noise(),
            0.3 * phase.cos() + noise(),
            GRAVITY + 0.2 * (2.0 * phase).sin() + noise(),
        ];
        let angular_velocity = [
            25.0 * phase.cos() + noise(),
            -10.0 * phase.sin() + noise(),
            5.0 * (2.0 * phase).cos() + noise(),
        ];
        MotionReading::new(timestamp, acceleration, angular_velocity)
    }
}

impl SensorSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn connect(&mut self) -> Result<ConnectionState, SourceError> {
        if !self.paired {
            return Ok(ConnectionState::NotPaired);
        }
        self.connected = true;
        Ok(ConnectionState::Connected)
    }

    fn stream(&mut self, handler: &mut ReadingHandler<'_>) -> Result<u64, SourceError> {
        if !self.connected {
            return Err(SourceError::NotConnected);
        }
        let mut delivered = 0;
        for i in 0..self.count {
            if self.realtime && i > 0 {
                thread::sleep(self.rate.period());
            }
            let reading = self.reading(i);
            delivered += 1;
            if handler(reading).is_break() {
                debug!(delivered, "synthetic stream stopped by handler");
                break;
            }
        }
        Ok(delivered)
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

// ── CSV replay ──────────────────────────────────────────────────────────

/// Replays a capture file of `timestamp,ax,ay,az,gx,gy,gz` lines.
///
/// Blank lines and `#` comments are skipped, as is a `timestamp,...`
/// header if it is the first line with content.
#[derive(Debug)]
pub struct CsvReplaySource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl CsvReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SensorSource for CsvReplaySource {
    fn name(&self) -> &str {
        "csv-replay"
    }

    fn connect(&mut self) -> Result<ConnectionState, SourceError> {
        let file = File::open(&self.path).map_err(|e| SourceError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        self.reader = Some(BufReader::new(file));
        Ok(ConnectionState::Connected)
    }

    fn stream(&mut self, handler: &mut ReadingHandler<'_>) -> Result<u64, SourceError> {
        let reader = self.reader.take().ok_or(SourceError::NotConnected)?;
        let mut delivered = 0;
        let mut header_allowed = true;

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|e| SourceError::Io {
                path: self.path.clone(),
                source: e,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if std::mem::take(&mut header_allowed) && trimmed.starts_with("timestamp") {
                continue;
            }

            let reading = MotionReading::parse_line(trimmed).map_err(|e| SourceError::Parse {
                path: self.path.clone(),
                line: line_no,
                source: e,
            })?;
            delivered += 1;
            if handler(reading).is_break() {
                break;
            }
        }
        Ok(delivered)
    }

    fn disconnect(&mut self) {
        self.reader = None;
    }
}

// ── Iterator adapter ────────────────────────────────────────────────────

/// Wraps any iterator of readings, e.g. `mpsc::Receiver::into_iter()` fed
/// by a device callback.
pub struct IterSource<I> {
    name: String,
    readings: Option<I>,
}

impl<I: Iterator<Item = MotionReading>> IterSource<I> {
    pub fn new(name: impl Into<String>, readings: I) -> Self {
        Self {
            name: name.into(),
            readings: Some(readings),
        }
    }
}

impl<I: Iterator<Item = MotionReading>> SensorSource for IterSource<I> {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&mut self) -> Result<ConnectionState, SourceError> {
        Ok(ConnectionState::Connected)
    }

    fn stream(&mut self, handler: &mut ReadingHandler<'_>) -> Result<u64, SourceError> {
        let readings = self.readings.take().ok_or(SourceError::NotConnected)?;
        let mut delivered = 0;
        for reading in readings {
            delivered += 1;
            if handler(reading).is_break() {
                break;
            }
        }
        Ok(delivered)
    }
}
