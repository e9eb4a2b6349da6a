//! Capture session: per-channel buffers feeding one dispatcher.
//!
//! A session owns one [`SampleRingBuffer`] per enabled channel, each behind
//! its own lock, so accelerometer and gyroscope ingestion never contend.
//! When a push fills a buffer, the resulting batch is submitted to the
//! dispatcher after the buffer's lock has been released.
//!
//! # Lifecycle
//!
//! ```text
//! new ──▶ run(source) ──▶ finish
//!            │  connecting → connected → streaming
//!            └─ not paired / not connected / error
//! ```
//!
//! `finish` resets every buffer, discarding partial batches, then drains the
//! dispatcher and reports. Only full batches ever reach a sink.

use crate::buffer::SampleRingBuffer;
use crate::dispatch::{BatchDispatcher, DispatchReport, SubmitOutcome};
use crate::sink::{BatchEnvelope, BatchSink};
use crate::source::{ConnectionState, SensorSource};
use crate::status::{SessionStatus, StatusHub};
use bc_common::{Batch, Channel, Error, MotionReading, Result, Sample, SampleRate, SessionId};
use bc_common::SCHEMA_VERSION;
use bc_config::{validate, CaptureConfig};
use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared flag that ends streaming before the next reading.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

struct Stream {
    channel: Channel,
    buffer: SampleRingBuffer,
    pushed: AtomicU64,
    dropped_batches: AtomicU64,
}

/// Per-channel totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
    pub channel: Channel,
    pub samples: u64,
    pub batches: u64,
    /// Batches the dispatcher dropped because its queue was full.
    pub dropped_batches: u64,
    /// Pending samples thrown away when the session finished.
    pub discarded: usize,
}

/// Final report of a capture session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub schema_version: String,
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub sample_rate: SampleRate,
    pub buffer_capacity: usize,
    pub started_at: String,
    pub finished_at: String,
    pub readings: u64,
    pub rejected_samples: u64,
    pub channels: Vec<ChannelSummary>,
    pub dispatch: DispatchReport,
}

impl SessionSummary {
    /// All emitted batches reached the sink.
    pub fn is_clean(&self) -> bool {
        self.dispatch.is_clean()
    }

    pub fn channel(&self, channel: Channel) -> Option<&ChannelSummary> {
        self.channels.iter().find(|c| c.channel == channel)
    }
}

/// One capture run.
pub struct CaptureSession {
    id: SessionId,
    sample_rate: SampleRate,
    buffer_capacity: usize,
    streams: Vec<Stream>,
    dispatcher: BatchDispatcher,
    status: Arc<StatusHub>,
    stop: StopHandle,
    source_name: Option<String>,
    started_at: String,
    readings: AtomicU64,
    rejected: AtomicU64,
}

impl CaptureSession {
    /// Create a session with a fresh ID.
    pub fn new(config: &CaptureConfig, sink: Box<dyn BatchSink>) -> Result<Self> {
        Self::with_id(SessionId::new(), config, sink)
    }

    pub fn with_id(id: SessionId, config: &CaptureConfig, sink: Box<dyn BatchSink>) -> Result<Self> {
        validate(config).into_result().map_err(Error::Config)?;

        let streams = config
            .channels
            .iter()
            .map(|&channel| -> Result<Stream> {
                Ok(Stream {
                    channel,
                    buffer: SampleRingBuffer::new(config.buffer_capacity, channel.width())?,
                    pushed: AtomicU64::new(0),
                    dropped_batches: AtomicU64::new(0),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let dispatcher = BatchDispatcher::spawn(sink, config.queue_depth, config.overflow)?;
        info!(
            session_id = %id,
            capacity = config.buffer_capacity,
            rate = %config.sample_rate,
            channels = ?config.channels,
            overflow = %config.overflow,
            "capture session created"
        );

        Ok(Self {
            status: Arc::new(StatusHub::new(id.clone())),
            id,
            sample_rate: config.sample_rate,
            buffer_capacity: config.buffer_capacity,
            streams,
            dispatcher,
            stop: StopHandle::default(),
            source_name: None,
            started_at: chrono::Utc::now().to_rfc3339(),
            readings: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn status_hub(&self) -> Arc<StatusHub> {
        Arc::clone(&self.status)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.streams.iter().map(|s| s.channel)
    }

    /// Pending sample count for a channel.
    pub fn pending(&self, channel: Channel) -> Option<usize> {
        self.stream(channel).map(|s| s.buffer.pending())
    }

    /// Push one sample into a channel's buffer.
    ///
    /// Returns what happened to the batch when this push completed one.
    pub fn push(&self, channel: Channel, sample: &Sample) -> Result<Option<SubmitOutcome>> {
        self.push_values(channel, sample.timestamp(), sample.values())
    }

    /// Split a combined reading across the enabled channels.
    pub fn on_reading(&self, reading: &MotionReading) -> Result<()> {
        self.readings.fetch_add(1, Ordering::Relaxed);
        for stream in &self.streams {
            self.push_values(stream.channel, reading.timestamp, reading.values(stream.channel))?;
        }
        Ok(())
    }

    fn push_values(
        &self,
        channel: Channel,
        timestamp: u64,
        values: &[f32],
    ) -> Result<Option<SubmitOutcome>> {
        let stream = self
            .stream(channel)
            .ok_or_else(|| Error::UnknownChannel(channel.to_string()))?;

        let batch = match stream.buffer.push_slice(timestamp, values) {
            Ok(batch) => batch,
            Err(err) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(err.into());
            }
        };
        stream.pushed.fetch_add(1, Ordering::Relaxed);

        match batch {
            Some(batch) => self.hand_off(stream, batch).map(Some),
            None => Ok(None),
        }
    }

    fn hand_off(&self, stream: &Stream, batch: Batch) -> Result<SubmitOutcome> {
        debug!(
            channel = %stream.channel,
            sequence = batch.sequence(),
            samples = batch.len(),
            "buffer full; handing off batch"
        );
        let outcome = self.dispatcher.submit(BatchEnvelope {
            session_id: self.id.clone(),
            channel: stream.channel,
            batch,
        })?;
        if outcome == SubmitOutcome::Dropped {
            stream.dropped_batches.fetch_add(1, Ordering::Relaxed);
        }
        Ok(outcome)
    }

    fn stream(&self, channel: Channel) -> Option<&Stream> {
        self.streams.iter().find(|s| s.channel == channel)
    }

    /// Discard pending samples on every channel, e.g. when a stream restarts.
    ///
    /// Returns the total number of samples discarded.
    pub fn reset_streams(&self) -> usize {
        self.streams.iter().map(|s| s.buffer.reset()).sum()
    }

    /// Connect to `source` and ingest until it is exhausted or stopped.
    ///
    /// Returns the number of readings the source delivered.
    pub fn run(&mut self, source: &mut dyn SensorSource) -> Result<u64> {
        self.source_name = Some(source.name().to_string());
        self.status.broadcast(SessionStatus::Connecting);

        let state = source.connect().map_err(|err| {
            self.status.broadcast(SessionStatus::Error(err.to_string()));
            Error::from(err)
        })?;
        match state {
            ConnectionState::Connected => {
                self.status.broadcast(SessionStatus::Connected);
            }
            ConnectionState::NotPaired => {
                self.status.broadcast(SessionStatus::NotPaired);
                return Err(Error::NotConnected(format!(
                    "{}: no paired device",
                    source.name()
                )));
            }
            ConnectionState::NotConnected => {
                self.status.broadcast(SessionStatus::NotConnected);
                return Err(Error::NotConnected(format!(
                    "{}: device did not connect",
                    source.name()
                )));
            }
        }

        self.status.broadcast(SessionStatus::Streaming);
        let mut failure = None;
        let streamed = {
            let this = &*self;
            source.stream(&mut |reading| {
                if this.stop.is_stopped() {
                    return ControlFlow::Break(());
                }
                match this.on_reading(&reading) {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(err) => {
                        failure = Some(err);
                        ControlFlow::Break(())
                    }
                }
            })
        };
        source.disconnect();

        let result = match (failure, streamed) {
            (Some(err), _) => Err(err),
            (None, Err(err)) => Err(Error::from(err)),
            (None, Ok(delivered)) => Ok(delivered),
        };
        if let Err(err) = &result {
            warn!(session_id = %self.id, error = %err, "capture stream ended with error");
            self.status.broadcast(SessionStatus::Error(err.to_string()));
        }
        result
    }

    /// Tear down: discard partial batches, drain the sink, report.
    pub fn finish(self) -> Result<SessionSummary> {
        let channels: Vec<ChannelSummary> = self
            .streams
            .iter()
            .map(|s| ChannelSummary {
                channel: s.channel,
                samples: s.pushed.load(Ordering::Relaxed),
                batches: s.buffer.batches_emitted(),
                dropped_batches: s.dropped_batches.load(Ordering::Relaxed),
                discarded: s.buffer.reset(),
            })
            .collect();

        let dispatch = self.dispatcher.finish()?;
        if let Some(err) = &dispatch.last_error {
            warn!(session_id = %self.id, failed = dispatch.failed, error = %err, "sink reported failures");
        }
        self.status.broadcast(SessionStatus::Stopped);

        let summary = SessionSummary {
            schema_version: SCHEMA_VERSION.to_string(),
            session_id: self.id,
            source: self.source_name,
            sample_rate: self.sample_rate,
            buffer_capacity: self.buffer_capacity,
            started_at: self.started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            readings: self.readings.load(Ordering::Relaxed),
            rejected_samples: self.rejected.load(Ordering::Relaxed),
            channels,
            dispatch,
        };
        info!(
            session_id = %summary.session_id,
            readings = summary.readings,
            delivered = summary.dispatch.delivered,
            dropped = summary.dispatch.dropped,
            "capture session finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, SinkError};
    use crate::source::{IterSource, SyntheticSource};
    use bc_config::OverflowPolicy;
    use std::sync::mpsc;
    use std::thread;

    fn config(capacity: usize) -> CaptureConfig {
        CaptureConfig::default()
            .with_capacity(capacity)
            .with_overflow(OverflowPolicy::Block)
    }

    fn reading(i: u64) -> MotionReading {
        let v = i as f32;
        MotionReading::new(i, [v, v + 0.5, v + 0.25], [-v, -v - 0.5, -v - 0.25])
    }

    #[test]
    fn test_readings_split_per_channel() {
        let memory = MemorySink::new();
        let session = CaptureSession::new(&config(2), Box::new(memory.clone())).unwrap();
        for i in 0..4 {
            session.on_reading(&reading(i)).unwrap();
        }
        let summary = session.finish().unwrap();

        let envelopes = memory.envelopes();
        assert_eq!(envelopes.len(), 4);
        let gyro: Vec<_> = envelopes
            .iter()
            .filter(|e| e.channel == Channel::Gyroscope)
            .collect();
        assert_eq!(gyro.len(), 2);
        // Gyroscope batches carry all three angular-velocity axes.
        assert_eq!(gyro[0].batch.values(), &[0.0, -0.5, -0.25, -1.0, -1.5, -1.25]);
        assert_eq!(gyro[1].batch.timestamps(), &[2, 3]);

        assert!(summary.is_clean());
        assert_eq!(summary.readings, 4);
        assert_eq!(summary.channel(Channel::Accelerometer).unwrap().batches, 2);
    }

    #[test]
    fn test_finish_discards_partial_batch() {
        let memory = MemorySink::new();
        let session = CaptureSession::new(&config(4), Box::new(memory.clone())).unwrap();
        for i in 0..6 {
            session.on_reading(&reading(i)).unwrap();
        }
        assert_eq!(session.pending(Channel::Gyroscope), Some(2));

        let summary = session.finish().unwrap();
        let accel = summary.channel(Channel::Accelerometer).unwrap();
        assert_eq!(accel.samples, 6);
        assert_eq!(accel.batches, 1);
        assert_eq!(accel.discarded, 2);
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn test_unknown_channel_and_bad_shape() {
        let cfg = config(4).with_channels(vec![Channel::Accelerometer]);
        let session = CaptureSession::new(&cfg, Box::new(MemorySink::new())).unwrap();

        let err = session
            .push(Channel::Gyroscope, &Sample::new(1, [0.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownChannel(_)));

        session
            .push(Channel::Accelerometer, &Sample::new(1, [0.0, 0.0, 0.0]))
            .unwrap();
        let err = session
            .push(Channel::Accelerometer, &Sample::new(2, [0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSampleShape {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(session.pending(Channel::Accelerometer), Some(1));

        let summary = session.finish().unwrap();
        assert_eq!(summary.rejected_samples, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = CaptureSession::new(&config(0), Box::new(MemorySink::new()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_run_synthetic_source_with_status() {
        let memory = MemorySink::new();
        let mut session = CaptureSession::new(&config(8), Box::new(memory.clone())).unwrap();
        let (_client, rx) = session.status_hub().register();

        let mut source = SyntheticSource::new(SampleRate::Ms16, 20, 42);
        assert_eq!(session.run(&mut source).unwrap(), 20);
        let summary = session.finish().unwrap();

        // 20 readings, capacity 8: two batches per channel, four left over.
        assert_eq!(memory.len(), 4);
        assert_eq!(summary.channel(Channel::Gyroscope).unwrap().discarded, 4);
        assert_eq!(summary.source.as_deref(), Some("synthetic"));

        let statuses: Vec<SessionStatus> = rx.try_iter().map(|u| u.status).collect();
        assert_eq!(
            statuses,
            vec![
                SessionStatus::Connecting,
                SessionStatus::Connected,
                SessionStatus::Streaming,
                SessionStatus::Stopped,
            ]
        );
    }

    #[test]
    fn test_run_unpaired_source() {
        let mut session = CaptureSession::new(&config(8), Box::new(MemorySink::new())).unwrap();
        let hub = session.status_hub();
        let mut source = SyntheticSource::new(SampleRate::Ms16, 20, 42).unpaired();

        let err = session.run(&mut source).unwrap_err();
        assert!(matches!(err, Error::NotConnected(_)));
        assert_eq!(hub.last_status(), Some(SessionStatus::NotPaired));
    }

    #[test]
    fn test_stop_handle_ends_stream() {
        // Capacity 1: every ingested reading becomes a batch per channel.
        let memory = MemorySink::new();
        let mut session = CaptureSession::new(&config(1), Box::new(memory.clone())).unwrap();
        let stop = session.stop_handle();
        let (tx, rx) = mpsc::channel();
        let mut source = IterSource::new("feed", rx.into_iter());

        let feeder = thread::spawn(move || {
            for i in 0..10 {
                tx.send(reading(i)).unwrap();
            }
            stop.stop();
            // One more reading so the source wakes up and sees the flag.
            tx.send(reading(10)).unwrap();
        });

        let delivered = session.run(&mut source).unwrap();
        feeder.join().unwrap();
        let summary = session.finish().unwrap();

        // The reading that observed the flag was delivered but not ingested.
        assert!(summary.readings <= 10);
        assert_eq!(delivered, summary.readings + 1);
        for channel in [Channel::Accelerometer, Channel::Gyroscope] {
            assert_eq!(summary.channel(channel).unwrap().samples, summary.readings);
        }

        let envelopes = memory.envelopes();
        assert_eq!(envelopes.len() as u64, summary.readings * 2);
        let mut accel_ts: Vec<u64> = envelopes
            .iter()
            .filter(|e| e.channel == Channel::Accelerometer)
            .flat_map(|e| e.batch.timestamps().to_vec())
            .collect();
        accel_ts.sort_unstable();
        let expected: Vec<u64> = (0..summary.readings).collect();
        assert_eq!(accel_ts, expected);
        assert!(!envelopes.iter().any(|e| e.batch.timestamps().contains(&10)));
    }

    #[test]
    fn test_reset_streams_discards_partial_epoch() {
        let memory = MemorySink::new();
        let session = CaptureSession::new(&config(4), Box::new(memory.clone())).unwrap();
        for i in 0..3 {
            session.on_reading(&reading(i)).unwrap();
        }

        assert_eq!(session.reset_streams(), 3 * 2);
        assert_eq!(session.pending(Channel::Accelerometer), Some(0));
        assert_eq!(session.pending(Channel::Gyroscope), Some(0));
        assert_eq!(session.reset_streams(), 0);

        for i in 100..104 {
            session.on_reading(&reading(i)).unwrap();
        }
        let summary = session.finish().unwrap();

        let envelopes = memory.envelopes();
        assert_eq!(envelopes.len(), 2);
        for envelope in &envelopes {
            assert_eq!(envelope.batch.timestamps(), &[100, 101, 102, 103]);
            assert_eq!(envelope.batch.sequence(), 0);
        }
        let accel = summary.channel(Channel::Accelerometer).unwrap();
        assert_eq!(accel.samples, 7);
        assert_eq!(accel.batches, 1);
        assert_eq!(accel.discarded, 0);
    }

    struct AlwaysFails;

    impl BatchSink for AlwaysFails {
        fn name(&self) -> &str {
            "always-fails"
        }

        fn accept(&mut self, _envelope: &BatchEnvelope) -> std::result::Result<(), SinkError> {
            Err(SinkError::Rejected {
                sink: "always-fails".into(),
                message: "unavailable".into(),
            })
        }
    }

    #[test]
    fn test_sink_failure_keeps_buffers_running() {
        let session = CaptureSession::new(&config(2), Box::new(AlwaysFails)).unwrap();
        for i in 0..10 {
            session.on_reading(&reading(i)).unwrap();
        }
        assert_eq!(session.pending(Channel::Accelerometer), Some(0));

        let summary = session.finish().unwrap();
        assert!(!summary.is_clean());
        assert_eq!(summary.dispatch.failed, 10);
        assert_eq!(summary.dispatch.delivered, 0);
        assert_eq!(summary.channel(Channel::Gyroscope).unwrap().batches, 5);
    }
}
