/// Errors that can occur while building or parsing envelopes.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header does not start with the sync marker.
    #[error("invalid sync marker (expected 0x55 0x55)")]
    InvalidSync,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload does not match the checksum carried in the header.
    #[error("checksum mismatch on sequence {sequence} (header {expected:#04x}, computed {actual:#04x})")]
    ChecksumMismatch {
        sequence: u8,
        expected: u8,
        actual: u8,
    },

    /// An I/O error occurred while reading envelopes.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete envelope was received.
    #[error("connection closed (incomplete envelope)")]
    ConnectionClosed,

    /// The host link rejected the write.
    #[error("transport error: {0}")]
    Transport(#[from] sensorlink_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
