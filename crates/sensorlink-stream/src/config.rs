use std::time::Duration;

use sensorlink_frame::{EnvelopeConfig, DEFAULT_MAX_PAYLOAD};

/// Main loop configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Bound on each blocking transmit. Default: 100 ms.
    pub write_timeout: Duration,
    /// Largest payload the envelope buffer is allocated for.
    pub max_payload_size: usize,
    /// Samples requested from the radar per drain. Default: 2048.
    pub radar_samples_per_frame: usize,
    /// Pause after an iteration that found nothing to do. Zero spins.
    pub idle_backoff: Duration,
}

impl StreamConfig {
    /// Envelope settings derived from this config.
    pub fn envelope_config(&self) -> EnvelopeConfig {
        EnvelopeConfig {
            max_payload_size: self.max_payload_size,
            write_timeout: self.write_timeout,
            read_timeout: None,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_millis(100),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            radar_samples_per_frame: 2048,
            idle_backoff: Duration::ZERO,
        }
    }
}
