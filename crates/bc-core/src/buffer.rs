//! Fixed-capacity sample ring buffer with flush-on-full hand-off.
//!
//! One buffer accumulates samples for one channel stream. Storage is two
//! parallel flat arrays, `timestamps[N]` and `values[N * W]`, plus a write
//! cursor. When the cursor reaches `N`, the push that filled the last slot
//! copies both arrays into a [`Batch`], rewinds the cursor to 0, and returns
//! the batch to the caller, all under the buffer's lock. Delivery of the batch
//! happens outside the lock.
//!
//! # Invariants
//!
//! - `index` is the number of samples written since the last flush or reset,
//!   and always lies in `[0, N)` between calls.
//! - Slots `[0, index)` hold pending data; slots `[index, N)` are stale.
//! - The `k`-th batch (0-based) after construction or a reset holds exactly
//!   the pushes `[k * N, (k + 1) * N)` counted from that point.
//! - A rejected push leaves the buffer untouched.

use bc_common::{Batch, Sample};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors from buffer construction and ingestion.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("invalid sample shape: expected {expected} values, got {actual}")]
    InvalidSampleShape { expected: usize, actual: usize },

    #[error("buffer capacity must be at least 1")]
    ZeroCapacity,

    #[error("channel width must be at least 1")]
    ZeroWidth,
}

impl From<BufferError> for bc_common::Error {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::InvalidSampleShape { expected, actual } => {
                bc_common::Error::InvalidSampleShape { expected, actual }
            }
            other => bc_common::Error::InvalidBuffer(other.to_string()),
        }
    }
}

#[derive(Debug)]
struct RingState<T> {
    timestamps: Vec<u64>,
    values: Vec<T>,
    index: usize,
    next_sequence: u64,
}

/// Channel-agnostic bounded sample buffer.
///
/// `push` takes `&self`, so a buffer can be shared between the producer and
/// observers (e.g. a status reader calling [`pending`](Self::pending)).
#[derive(Debug)]
pub struct SampleRingBuffer<T = f32> {
    capacity: usize,
    width: usize,
    state: Mutex<RingState<T>>,
}

impl<T: Copy + Default> SampleRingBuffer<T> {
    /// Create a buffer holding `capacity` samples of `width` values each.
    pub fn new(capacity: usize, width: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        if width == 0 {
            return Err(BufferError::ZeroWidth);
        }
        Ok(Self {
            capacity,
            width,
            state: Mutex::new(RingState {
                timestamps: vec![0; capacity],
                values: vec![T::default(); capacity * width],
                index: 0,
                next_sequence: 0,
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Append a sample; returns the full batch when this push fills the buffer.
    pub fn push(&self, sample: &Sample<T>) -> Result<Option<Batch<T>>, BufferError> {
        self.push_slice(sample.timestamp(), sample.values())
    }

    /// Like [`push`](Self::push) without constructing a [`Sample`].
    pub fn push_slice(&self, timestamp: u64, values: &[T]) -> Result<Option<Batch<T>>, BufferError> {
        if values.len() != self.width {
            return Err(BufferError::InvalidSampleShape {
                expected: self.width,
                actual: values.len(),
            });
        }

        let mut state = self.lock();
        let slot = state.index;
        state.timestamps[slot] = timestamp;
        let start = slot * self.width;
        state.values[start..start + self.width].copy_from_slice(values);
        state.index += 1;

        if state.index < self.capacity {
            return Ok(None);
        }

        let batch = Batch::new(
            state.next_sequence,
            self.width,
            state.timestamps.clone(),
            state.values.clone(),
        );
        state.index = 0;
        state.next_sequence += 1;
        Ok(Some(batch))
    }

    /// Discard pending samples without emitting a batch.
    ///
    /// Returns how many samples were dropped. Batch sequence numbering
    /// continues across resets.
    pub fn reset(&self) -> usize {
        let mut state = self.lock();
        std::mem::replace(&mut state.index, 0)
    }

    /// Samples written since the last flush or reset.
    pub fn pending(&self) -> usize {
        self.lock().index
    }

    /// Batches emitted over the buffer's lifetime.
    pub fn batches_emitted(&self) -> u64 {
        self.lock().next_sequence
    }

    // Every critical section leaves the state consistent before it can
    // panic, so a poisoned lock is still safe to reuse.
    fn lock(&self) -> MutexGuard<'_, RingState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
