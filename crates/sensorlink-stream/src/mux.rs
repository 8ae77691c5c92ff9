use std::sync::atomic::{AtomicBool, Ordering};

use sensorlink_capture::{write_samples_le, FrameConsumer, RadarAdapter, RadarSensor, SAMPLE_WIDTH};
use sensorlink_frame::{EnvelopeWriter, HostCommand};
use sensorlink_transport::Transport;
use tracing::{debug, info, trace, warn};

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::indicator::{NullIndicator, StatusIndicator, StreamKind};
use crate::state::StreamState;
use crate::stats::StreamStats;

/// What happened to one payload in one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Enveloped and transmitted.
    Sent { sequence: u8 },
    /// Enveloped, but the host had not asked for streaming.
    NotStreaming { sequence: u8 },
    /// Enveloped; the transmit failed and streaming is now disabled.
    Failed { sequence: u8 },
    /// The payload never reached the framer.
    Dropped,
}

/// Summary of one [`StreamMultiplexer::poll_once`] iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub command: Option<HostCommand>,
    pub image: Option<Delivery>,
    pub radar: Option<Delivery>,
}

impl PollReport {
    /// Nothing arrived from the host or either sensor.
    pub fn is_idle(&self) -> bool {
        self.command.is_none() && self.image.is_none() && self.radar.is_none()
    }
}

/// The cooperative main loop.
///
/// Each iteration reads at most one host command byte, then forwards a
/// ready image frame, then a ready radar burst, in that order. Every buffer
/// is allocated in [`new`](Self::new).
pub struct StreamMultiplexer<T, R, I = NullIndicator> {
    transport: T,
    frames: FrameConsumer,
    radar: RadarAdapter<R>,
    indicator: I,
    writer: EnvelopeWriter,
    samples: Vec<u16>,
    radar_payload: Vec<u8>,
    state: StreamState,
    stats: StreamStats,
    config: StreamConfig,
}

impl<T: Transport, R: RadarSensor> StreamMultiplexer<T, R> {
    /// Build the loop. Fails if either sensor's payload exceeds
    /// `config.max_payload_size`.
    pub fn new(
        transport: T,
        frames: FrameConsumer,
        radar: RadarAdapter<R>,
        config: StreamConfig,
    ) -> Result<Self> {
        let radar_bytes = config.radar_samples_per_frame * SAMPLE_WIDTH;
        if frames.frame_size() > config.max_payload_size {
            return Err(StreamError::Configuration(format!(
                "image frame of {} bytes exceeds max payload {}",
                frames.frame_size(),
                config.max_payload_size
            )));
        }
        if radar_bytes > config.max_payload_size {
            return Err(StreamError::Configuration(format!(
                "radar burst of {radar_bytes} bytes exceeds max payload {}",
                config.max_payload_size
            )));
        }

        Ok(Self {
            transport,
            frames,
            radar,
            indicator: NullIndicator,
            writer: EnvelopeWriter::with_config(config.envelope_config()),
            samples: vec![0u16; config.radar_samples_per_frame],
            radar_payload: vec![0u8; radar_bytes],
            state: StreamState::new(),
            stats: StreamStats::default(),
            config,
        })
    }
}

impl<T: Transport, R: RadarSensor, I: StatusIndicator> StreamMultiplexer<T, R, I> {
    /// Replace the status indicator.
    pub fn with_indicator<J: StatusIndicator>(self, indicator: J) -> StreamMultiplexer<T, R, J> {
        StreamMultiplexer {
            transport: self.transport,
            frames: self.frames,
            radar: self.radar,
            indicator,
            writer: self.writer,
            samples: self.samples,
            radar_payload: self.radar_payload,
            state: self.state,
            stats: self.stats,
            config: self.config,
        }
    }

    /// Run one iteration.
    ///
    /// Only a failure to read from the host link is returned; everything
    /// else is logged and dropped inside the iteration.
    pub fn poll_once(&mut self) -> Result<PollReport> {
        self.stats.iterations += 1;
        let command = self.poll_command()?;
        let image = self.forward_image();
        let radar = self.forward_radar();
        Ok(PollReport {
            command,
            image,
            radar,
        })
    }

    /// Iterate until `running` is cleared or the host link fails.
    pub fn run(&mut self, running: &AtomicBool) -> Result<StreamStats> {
        info!(
            write_timeout = ?self.config.write_timeout,
            radar_samples = self.config.radar_samples_per_frame,
            "main loop started"
        );
        while running.load(Ordering::Relaxed) {
            let report = self.poll_once()?;
            if report.is_idle() && !self.config.idle_backoff.is_zero() {
                std::thread::sleep(self.config.idle_backoff);
            }
        }
        info!(iterations = self.stats.iterations, "main loop stopped");
        Ok(self.stats)
    }

    fn poll_command(&mut self) -> Result<Option<HostCommand>> {
        let mut byte = [0u8; 1];
        if self.transport.read_nonblocking(&mut byte)? == 0 {
            return Ok(None);
        }

        let command = HostCommand::from(byte[0]);
        self.state.apply(command);
        self.stats.commands += 1;
        info!(
            command = command.name(),
            byte = command.byte(),
            streaming = self.state.is_streaming(),
            "host command"
        );
        Ok(Some(command))
    }

    fn forward_image(&mut self) -> Option<Delivery> {
        let sequence = self.state.sequence();
        let built = {
            let frame = self.frames.take_ready()?;
            self.writer.prepare(sequence, &frame)
        };

        match built {
            Ok(_) => {
                self.state.advance();
                Some(self.deliver(StreamKind::Image, sequence))
            }
            Err(err) => {
                warn!(error = %err, "image frame could not be enveloped");
                Some(Delivery::Dropped)
            }
        }
    }

    fn forward_radar(&mut self) -> Option<Delivery> {
        if !self.radar.poll_available() {
            return None;
        }

        let count = self.config.radar_samples_per_frame;
        if let Err(err) = self.radar.drain(&mut self.samples, count) {
            self.stats.drain_failures += 1;
            warn!(error = %err, "radar burst dropped");
            return Some(Delivery::Dropped);
        }
        self.indicator.heartbeat();

        let len = write_samples_le(&self.samples, &mut self.radar_payload);
        let sequence = self.state.sequence();
        match self.writer.prepare(sequence, &self.radar_payload[..len]) {
            Ok(_) => {
                self.state.advance();
                Some(self.deliver(StreamKind::Radar, sequence))
            }
            Err(err) => {
                warn!(error = %err, "radar burst could not be enveloped");
                Some(Delivery::Dropped)
            }
        }
    }

    /// Transmit the prepared envelope if the host asked for streaming.
    fn deliver(&mut self, kind: StreamKind, sequence: u8) -> Delivery {
        if !self.state.is_streaming() {
            self.stats.not_streaming += 1;
            trace!(kind = kind.name(), sequence, "not streaming, envelope discarded");
            return Delivery::NotStreaming { sequence };
        }

        self.indicator.transmit_started(kind);
        let result = self.writer.transmit(&mut self.transport);
        self.indicator.transmit_finished(kind);

        match result {
            Ok(()) => {
                match kind {
                    StreamKind::Image => self.stats.images_sent += 1,
                    StreamKind::Radar => self.stats.radar_sent += 1,
                }
                debug!(kind = kind.name(), sequence, size = self.writer.pending().len(), "sent");
                Delivery::Sent { sequence }
            }
            Err(err) => {
                self.state.disable();
                self.stats.transmit_failures += 1;
                warn!(
                    kind = kind.name(),
                    sequence,
                    error = %err,
                    "transmit failed, streaming disabled until next start"
                );
                Delivery::Failed { sequence }
            }
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn radar(&self) -> &RadarAdapter<R> {
        &self.radar
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }
}
