//! Config resolution: CLI → env → XDG → platform default → built-in defaults.

use crate::capture::CaptureConfig;
use crate::validate::validate;
use crate::CONFIG_FILE_NAME;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment override for the config directory.
pub const ENV_CONFIG_DIR: &str = "BAND_CAPTURE_CONFIG";

/// Environment override for the data (capture output) directory.
pub const ENV_DATA_DIR: &str = "BAND_CAPTURE_DATA";

const DIR_NAME: &str = "band_capture";
const CAPTURES_DIR: &str = "captures";

/// Errors from config resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to resolve data directory")]
    DataDirUnavailable,
}

impl From<ConfigError> for bc_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io { source, .. } => bc_common::Error::Io(source),
            other => bc_common::Error::Config(other.to_string()),
        }
    }
}

/// Where configuration was looked for.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigPaths {
    pub config_dir: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
}

impl ConfigPaths {
    /// Find the config directory, honoring an explicit CLI directory first.
    pub fn discover(cli_dir: Option<&Path>) -> Self {
        let config_dir = cli_dir
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(ENV_CONFIG_DIR).map(PathBuf::from))
            .or_else(|| std::env::var_os("XDG_CONFIG_HOME").map(|x| PathBuf::from(x).join(DIR_NAME)))
            .or_else(|| dirs::config_dir().map(|base| base.join(DIR_NAME)));
        let config_file = config_dir.as_ref().map(|dir| dir.join(CONFIG_FILE_NAME));
        Self {
            config_dir,
            config_file,
        }
    }
}

/// A config together with where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub config: CaptureConfig,
    /// File the config was read from; `None` when built-in defaults are used.
    pub source: Option<PathBuf>,
    pub using_defaults: bool,
    pub warnings: Vec<String>,
    pub resolved_at: String,
}

/// Read and parse a config file without validating it.
pub fn load_config_file(path: &Path) -> Result<CaptureConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    CaptureConfig::from_json(&content).map_err(|e| ConfigError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Resolve the effective capture config.
///
/// A missing config file falls back to defaults; an unreadable, malformed,
/// or semantically invalid file is an error.
pub fn resolve_config(cli_dir: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    let paths = ConfigPaths::discover(cli_dir);
    let resolved_at = chrono::Utc::now().to_rfc3339();

    let file = match paths.config_file {
        Some(file) if file.exists() => file,
        _ => {
            return Ok(ResolvedConfig {
                config: CaptureConfig::default(),
                source: None,
                using_defaults: true,
                warnings: Vec::new(),
                resolved_at,
            })
        }
    };

    let config = load_config_file(&file)?;
    let validation = validate(&config);
    let warnings = validation.warnings.clone();
    validation.into_result().map_err(ConfigError::Invalid)?;

    Ok(ResolvedConfig {
        config,
        source: Some(file),
        using_defaults: false,
        warnings,
        resolved_at,
    })
}

/// Resolve the directory capture files are written under.
pub fn resolve_output_dir(
    cli_dir: Option<&Path>,
    config: &CaptureConfig,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = cli_dir {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = &config.output_dir {
        return Ok(dir.clone());
    }
    if let Some(dir) = std::env::var_os(ENV_DATA_DIR) {
        return Ok(PathBuf::from(dir).join(CAPTURES_DIR));
    }
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg).join(DIR_NAME).join(CAPTURES_DIR));
    }
    dirs::data_dir()
        .map(|base| base.join(DIR_NAME).join(CAPTURES_DIR))
        .ok_or(ConfigError::DataDirUnavailable)
}
