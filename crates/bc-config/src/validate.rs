//! Semantic validation for capture configuration.
//!
//! Validation collects every problem instead of stopping at the first, so a
//! `config validate` run reports the whole file at once.

use crate::capture::CaptureConfig;
use bc_common::schema::same_major;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Upper bound on samples per batch.
pub const MAX_BUFFER_CAPACITY: usize = 1 << 20;

/// Upper bound on queued batches.
pub const MAX_QUEUE_DEPTH: usize = 4096;

/// Batches that take longer than this to fill produce a warning.
const SLOW_FLUSH_WARN_SECS: u64 = 10 * 60;

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of validating a config.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Join all errors into one message, or `Ok(())` when valid.
    pub fn into_result(self) -> Result<(), String> {
        if self.is_ok() {
            return Ok(());
        }
        let joined: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        Err(joined.join("; "))
    }
}

/// Validate a capture configuration.
pub fn validate(config: &CaptureConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !same_major(&config.schema_version, crate::CONFIG_SCHEMA_VERSION) {
        result.errors.push(ValidationError::new(
            "schema_version",
            format!(
                "unsupported version {} (current {})",
                config.schema_version,
                crate::CONFIG_SCHEMA_VERSION
            ),
        ));
    }

    if config.buffer_capacity == 0 {
        result
            .errors
            .push(ValidationError::new("buffer_capacity", "must be at least 1"));
    } else if config.buffer_capacity > MAX_BUFFER_CAPACITY {
        result.errors.push(ValidationError::new(
            "buffer_capacity",
            format!("must be at most {MAX_BUFFER_CAPACITY}"),
        ));
    }

    if config.queue_depth == 0 {
        result
            .errors
            .push(ValidationError::new("queue_depth", "must be at least 1"));
    } else if config.queue_depth > MAX_QUEUE_DEPTH {
        result.errors.push(ValidationError::new(
            "queue_depth",
            format!("must be at most {MAX_QUEUE_DEPTH}"),
        ));
    }

    if config.channels.is_empty() {
        result
            .errors
            .push(ValidationError::new("channels", "at least one channel is required"));
    }
    let mut seen = HashSet::new();
    for channel in &config.channels {
        if !seen.insert(*channel) {
            result.errors.push(ValidationError::new(
                "channels",
                format!("{channel} listed more than once"),
            ));
        }
    }

    let fill_secs =
        (config.buffer_capacity as u64).saturating_mul(config.sample_rate.period_ms()) / 1000;
    if fill_secs > SLOW_FLUSH_WARN_SECS {
        result.warnings.push(format!(
            "a batch takes about {fill_secs}s to fill at {}; partial batches are lost on stop",
            config.sample_rate
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use bc_common::{Channel, SampleRate};

    #[test]
    fn test_default_is_valid() {
        let result = validate(&CaptureConfig::default());
        assert!(result.is_ok(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = CaptureConfig::default().with_capacity(0).with_channels(vec![
            Channel::Gyroscope,
            Channel::Gyroscope,
        ]);
        config.queue_depth = 0;
        config.schema_version = "2.0.0".to_string();

        let result = validate(&config);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["schema_version", "buffer_capacity", "queue_depth", "channels"]
        );
        assert!(result.into_result().unwrap_err().contains("gyroscope listed more than once"));
    }

    #[test]
    fn test_schema_version_checked_against_config_schema() {
        let mut config = CaptureConfig::default();
        config.schema_version = "1.7.3".to_string();
        assert!(validate(&config).is_ok());

        for bad in ["2.0.0", "0.1.0", "garbage", ""] {
            config.schema_version = bad.to_string();
            let result = validate(&config);
            assert_eq!(result.errors.len(), 1, "{bad}");
            assert_eq!(result.errors[0].field, "schema_version");
            assert!(result.errors[0]
                .message
                .contains(&format!("current {}", crate::CONFIG_SCHEMA_VERSION)));
        }
    }

    #[test]
    fn test_empty_channels() {
        let config = CaptureConfig::default().with_channels(Vec::new());
        assert!(!validate(&config).is_ok());
    }

    #[test]
    fn test_slow_flush_warning() {
        let config = CaptureConfig::default()
            .with_capacity(10_000)
            .with_sample_rate(SampleRate::Ms128);
        let result = validate(&config);
        assert!(result.is_ok());
        assert_eq!(result.warnings.len(), 1);
    }
}
