//! Band capture configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust struct for capture.json
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Configuration presets matching known wearable setups

pub mod capture;
pub mod preset;
pub mod resolve;
pub mod validate;

pub use capture::{CaptureConfig, OverflowPolicy, SinkKind};
pub use preset::{get_preset, list_presets, PresetError, PresetInfo, PresetName};
pub use resolve::{
    load_config_file, resolve_config, resolve_output_dir, ConfigError, ConfigPaths, ResolvedConfig,
};
pub use validate::{validate, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Configuration file name inside a config directory.
pub const CONFIG_FILE_NAME: &str = "capture.json";
