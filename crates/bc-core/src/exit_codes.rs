//! Process exit codes for the bc-core CLI.
//!
//! Scripts can tell a clean capture from a lossy one without parsing output.

use bc_common::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every batch reached the sink.
    Clean = 0,

    /// Capture ran, but batches were dropped or rejected by the sink
    PartialFail = 3,

    /// Invalid configuration, preset or arguments
    ConfigError = 10,

    /// Sensor source failed or never connected
    SourceError = 11,

    IoError = 13,

    InternalError = 99,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    /// Anything at or above 10 needs attention before retrying.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Map a failure to the code the CLI exits with.
    pub fn for_error(err: &Error) -> Self {
        match err {
            Error::Config(_) | Error::UnknownPreset(_) | Error::InvalidBuffer(_) => {
                ExitCode::ConfigError
            }
            Error::Source(_) | Error::NotConnected(_) => ExitCode::SourceError,
            Error::Io(_) | Error::Sink(_) => ExitCode::IoError,
            Error::InvalidSampleShape { .. }
            | Error::UnknownChannel(_)
            | Error::DispatcherClosed
            | Error::Json(_) => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        ExitCode::for_error(err)
    }
}
