//! Band capture common types, IDs, and errors.
//!
//! This crate provides foundational types shared across bc-core modules:
//! - Samples, batches, and motion readings
//! - Channel and sample-rate descriptors
//! - Session identity and schema versioning
//! - Common error types
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;
pub mod sample;
pub mod schema;

pub use error::{Error, Result};
pub use id::SessionId;
pub use output::OutputFormat;
pub use sample::{Batch, Channel, MotionReading, ParseReadingError, Sample, SampleRate};
pub use schema::SCHEMA_VERSION;
