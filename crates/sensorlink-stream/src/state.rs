use sensorlink_frame::HostCommand;

/// Streaming gate and the sequence counter shared by both sensor streams.
///
/// Owned by the main loop; no other context touches it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    streaming: bool,
    sequence: u8,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a host command byte.
    ///
    /// Start enables streaming and restarts the sequence at zero. Every
    /// other byte disables streaming.
    pub fn apply(&mut self, command: HostCommand) {
        if command.enables_streaming() {
            self.streaming = true;
            self.sequence = 0;
        } else {
            self.streaming = false;
        }
    }

    /// Stop streaming until the host sends start again.
    pub fn disable(&mut self) {
        self.streaming = false;
    }

    /// Return the sequence for the envelope just built, and move past it.
    pub fn advance(&mut self) -> u8 {
        let current = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        current
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// The sequence number the next envelope will carry.
    pub fn sequence(&self) -> u8 {
        self.sequence
    }
}
