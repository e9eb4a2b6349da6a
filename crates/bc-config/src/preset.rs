//! Configuration presets for common wearable capture setups.

use crate::capture::CaptureConfig;
use bc_common::{Channel, SampleRate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("unknown preset '{0}' (available: band-gyro-16ms, band-dual-128ms, accel-only)")]
    Unknown(String),
}

impl From<PresetError> for bc_common::Error {
    fn from(err: PresetError) -> Self {
        match err {
            PresetError::Unknown(name) => bc_common::Error::UnknownPreset(name),
        }
    }
}

/// Named presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PresetName {
    /// Combined motion stream at 16 ms, both channels, small batches.
    #[serde(rename = "band-gyro-16ms")]
    BandGyro16ms,
    /// Accelerometer and gyroscope at 128 ms with 256-sample batches.
    #[serde(rename = "band-dual-128ms")]
    BandDual128ms,
    /// Accelerometer only at 32 ms.
    #[serde(rename = "accel-only")]
    AccelOnly,
}

impl PresetName {
    pub const ALL: [PresetName; 3] = [
        PresetName::BandGyro16ms,
        PresetName::BandDual128ms,
        PresetName::AccelOnly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PresetName::BandGyro16ms => "band-gyro-16ms",
            PresetName::BandDual128ms => "band-dual-128ms",
            PresetName::AccelOnly => "accel-only",
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetName {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PresetName::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| PresetError::Unknown(s.to_string()))
    }
}

/// Listing entry for `config presets`.
#[derive(Debug, Clone, Serialize)]
pub struct PresetInfo {
    pub name: PresetName,
    pub description: &'static str,
    pub config: CaptureConfig,
}

/// Build the config for a preset.
pub fn get_preset(name: PresetName) -> CaptureConfig {
    match name {
        PresetName::BandGyro16ms => CaptureConfig::default()
            .with_sample_rate(SampleRate::Ms16)
            .with_capacity(64),
        PresetName::BandDual128ms => CaptureConfig::default()
            .with_sample_rate(SampleRate::Ms128)
            .with_capacity(256),
        PresetName::AccelOnly => CaptureConfig::default()
            .with_sample_rate(SampleRate::Ms32)
            .with_channels(vec![Channel::Accelerometer]),
    }
}

/// All presets with descriptions.
pub fn list_presets() -> Vec<PresetInfo> {
    PresetName::ALL
        .into_iter()
        .map(|name| PresetInfo {
            name,
            description: match name {
                PresetName::BandGyro16ms => "combined motion stream at 16 ms, 64-sample batches",
                PresetName::BandDual128ms => {
                    "separate accelerometer and gyroscope buffers at 128 ms, 256-sample batches"
                }
                PresetName::AccelOnly => "accelerometer only at 32 ms",
            },
            config: get_preset(name),
        })
        .collect()
}
