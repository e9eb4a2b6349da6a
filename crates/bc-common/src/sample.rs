//! Sample, batch, and motion reading types.
//!
//! A [`Sample`] is one timestamped reading of fixed channel width. A
//! [`Batch`] is the immutable snapshot a ring buffer hands off once it has
//! accumulated exactly `capacity` samples: timestamps and values are stored
//! in two parallel flat arrays, `values.len() == timestamps.len() * width`.
//!
//! [`MotionReading`] is the combined event a wearable source delivers
//! (acceleration plus angular velocity) and the unit of the line-oriented
//! capture file format `timestamp,ax,ay,az,gx,gy,gz`.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// ── Channels ────────────────────────────────────────────────────────────

/// A logical sensor stream. Each channel gets its own buffer instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// 3-axis linear acceleration.
    Accelerometer,
    /// 3-axis angular velocity.
    Gyroscope,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Accelerometer, Channel::Gyroscope];

    /// Number of values per sample on this channel.
    pub fn width(self) -> usize {
        match self {
            Channel::Accelerometer | Channel::Gyroscope => 3,
        }
    }

    /// Stable name used in file names, logs and JSON.
    pub fn name(self) -> &'static str {
        match self {
            Channel::Accelerometer => "accelerometer",
            Channel::Gyroscope => "gyroscope",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accelerometer" | "accel" => Ok(Channel::Accelerometer),
            "gyroscope" | "gyro" => Ok(Channel::Gyroscope),
            other => Err(format!("unknown channel '{other}'")),
        }
    }
}

// ── Sample rate ─────────────────────────────────────────────────────────

/// Nominal sampling period of a sensor subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRate {
    /// One reading every 16 ms (~62.5 Hz).
    #[default]
    Ms16,
    /// One reading every 32 ms.
    Ms32,
    /// One reading every 128 ms.
    Ms128,
}

impl SampleRate {
    pub fn period_ms(self) -> u64 {
        match self {
            SampleRate::Ms16 => 16,
            SampleRate::Ms32 => 32,
            SampleRate::Ms128 => 128,
        }
    }

    pub fn period(self) -> Duration {
        Duration::from_millis(self.period_ms())
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ms{}", self.period_ms())
    }
}

// ── Sample ──────────────────────────────────────────────────────────────

/// One timestamped reading of fixed channel width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample<T = f32> {
    timestamp: u64,
    values: Vec<T>,
}

impl<T> Sample<T> {
    pub fn new(timestamp: u64, values: impl Into<Vec<T>>) -> Self {
        Self {
            timestamp,
            values: values.into(),
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }
}

// ── Batch ───────────────────────────────────────────────────────────────

/// Immutable snapshot of exactly one full buffer cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch<T = f32> {
    sequence: u64,
    width: usize,
    timestamps: Vec<u64>,
    values: Vec<T>,
}

impl<T> Batch<T> {
    /// Assemble a batch from its parallel arrays.
    ///
    /// `values.len()` must equal `timestamps.len() * width`.
    pub fn new(sequence: u64, width: usize, timestamps: Vec<u64>, values: Vec<T>) -> Self {
        debug_assert_eq!(values.len(), timestamps.len() * width);
        Self {
            sequence,
            width,
            timestamps,
            values,
        }
    }

    /// Position of this batch in its buffer's emission order, starting at 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[u64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Timestamp and values of the `i`-th sample.
    pub fn row(&self, i: usize) -> Option<(u64, &[T])> {
        let ts = *self.timestamps.get(i)?;
        let start = i * self.width;
        Some((ts, &self.values[start..start + self.width]))
    }

    /// Iterate over `(timestamp, values)` rows in push order.
    pub fn rows(&self) -> impl Iterator<Item = (u64, &[T])> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.chunks_exact(self.width.max(1)))
    }

    pub fn into_parts(self) -> (Vec<u64>, Vec<T>) {
        (self.timestamps, self.values)
    }
}

// ── Motion reading ──────────────────────────────────────────────────────

/// Number of comma-separated fields in one capture line.
const LINE_FIELDS: usize = 7;

/// Errors from parsing a capture line.
#[derive(Debug, Error, PartialEq)]
pub enum ParseReadingError {
    #[error("expected {expected} fields, got {actual}")]
    FieldCount { expected: usize, actual: usize },

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("invalid value '{value}' in field {field}")]
    InvalidValue { field: usize, value: String },
}

/// Combined wearable motion event: acceleration and angular velocity
/// sampled at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionReading {
    pub timestamp: u64,
    pub acceleration: [f32; 3],
    pub angular_velocity: [f32; 3],
}

impl MotionReading {
    pub fn new(timestamp: u64, acceleration: [f32; 3], angular_velocity: [f32; 3]) -> Self {
        Self {
            timestamp,
            acceleration,
            angular_velocity,
        }
    }

    /// Values this reading contributes to `channel`.
    pub fn values(&self, channel: Channel) -> &[f32; 3] {
        match channel {
            Channel::Accelerometer => &self.acceleration,
            Channel::Gyroscope => &self.angular_velocity,
        }
    }

    /// Render as a capture line: `timestamp,ax,ay,az,gx,gy,gz`.
    pub fn to_line(&self) -> String {
        let [ax, ay, az] = self.acceleration;
        let [gx, gy, gz] = self.angular_velocity;
        format!(
            "{},{},{},{},{},{},{}",
            self.timestamp, ax, ay, az, gx, gy, gz
        )
    }

    /// Parse a capture line produced by [`MotionReading::to_line`].
    pub fn parse_line(line: &str) -> Result<Self, ParseReadingError> {
        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        if fields.len() != LINE_FIELDS {
            return Err(ParseReadingError::FieldCount {
                expected: LINE_FIELDS,
                actual: fields.len(),
            });
        }

        let timestamp = fields[0]
            .parse::<u64>()
            .map_err(|_| ParseReadingError::InvalidTimestamp(fields[0].to_string()))?;

        let mut axes = [0.0f32; 6];
        for (i, raw) in fields[1..].iter().enumerate() {
            axes[i] = raw
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ParseReadingError::InvalidValue {
                    field: i + 1,
                    value: raw.to_string(),
                })?;
        }

        Ok(Self {
            timestamp,
            acceleration: [axes[0], axes[1], axes[2]],
            angular_velocity: [axes[3], axes[4], axes[5]],
        })
    }
}

impl FromStr for MotionReading {
    type Err = ParseReadingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line(s)
    }
}
