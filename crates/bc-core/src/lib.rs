//! Band capture core.
//!
//! Bounded per-channel sample buffers that flush a batch each time they
//! fill, a dispatcher that hands batches to a sink off the producer thread,
//! and the session that ties a sensor source to both.
//!
//! ```no_run
//! use bc_config::CaptureConfig;
//! use bc_core::session::CaptureSession;
//! use bc_core::sink::MemorySink;
//! use bc_core::source::SyntheticSource;
//! use bc_common::SampleRate;
//!
//! # fn main() -> bc_common::Result<()> {
//! let sink = MemorySink::new();
//! let mut session = CaptureSession::new(&CaptureConfig::default(), Box::new(sink.clone()))?;
//! session.run(&mut SyntheticSource::new(SampleRate::Ms16, 1024, 7))?;
//! let summary = session.finish()?;
//! assert_eq!(summary.dispatch.delivered as usize, sink.len());
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod dispatch;
pub mod exit_codes;
pub mod session;
pub mod sink;
pub mod source;
pub mod status;

pub use buffer::{BufferError, SampleRingBuffer};
pub use dispatch::{BatchDispatcher, DispatchError, DispatchReport, SubmitOutcome};
pub use exit_codes::ExitCode;
pub use session::{CaptureSession, ChannelSummary, SessionSummary, StopHandle};
pub use sink::{BatchEnvelope, BatchSink, SinkError};
pub use source::{
    ConnectionState, CsvReplaySource, IterSource, SensorSource, SourceError, SyntheticSource,
};
pub use status::{ClientId, SessionStatus, StatusHub, StatusUpdate};
