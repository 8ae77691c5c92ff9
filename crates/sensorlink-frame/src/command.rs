//! Single-byte commands sent by the host.
//!
//! Only [`START_STREAM`] enables streaming. Every other byte, including
//! [`STOP_STREAM`], disables it.

/// Start streaming (ASCII `'1'`).
pub const START_STREAM: u8 = 49;

/// Stop streaming (ASCII `'2'`). Hosts send this before flushing and
/// restarting after a decode error.
pub const STOP_STREAM: u8 = 50;

/// A decoded host command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Start,
    Stop,
    /// Any unrecognized byte; treated as stop.
    Other(u8),
}

impl HostCommand {
    /// The wire value of this command.
    pub fn byte(self) -> u8 {
        match self {
            HostCommand::Start => START_STREAM,
            HostCommand::Stop => STOP_STREAM,
            HostCommand::Other(byte) => byte,
        }
    }

    /// True only for the start command.
    pub fn enables_streaming(self) -> bool {
        matches!(self, HostCommand::Start)
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            HostCommand::Start => "START",
            HostCommand::Stop => "STOP",
            HostCommand::Other(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for HostCommand {
    fn from(byte: u8) -> Self {
        match byte {
            START_STREAM => HostCommand::Start,
            STOP_STREAM => HostCommand::Stop,
            other => HostCommand::Other(other),
        }
    }
}
