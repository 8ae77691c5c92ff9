/// Per-loop counters kept by the main loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Iterations run.
    pub iterations: u64,
    /// Command bytes received.
    pub commands: u64,
    /// Image envelopes transmitted.
    pub images_sent: u64,
    /// Radar envelopes transmitted.
    pub radar_sent: u64,
    /// Envelopes built while the host had not asked for streaming.
    pub not_streaming: u64,
    /// Transmits that failed and disabled streaming.
    pub transmit_failures: u64,
    /// Radar drains that failed.
    pub drain_failures: u64,
}
