/// Errors that can stop the main loop, or prevent it from starting.
///
/// Per-iteration failures (a failed transmit, a failed radar drain, a
/// malformed frame) are handled inside the loop and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sensorlink_transport::TransportError),

    /// Envelope-level error.
    #[error("frame error: {0}")]
    Frame(#[from] sensorlink_frame::FrameError),

    /// Acquisition error.
    #[error("capture error: {0}")]
    Capture(#[from] sensorlink_capture::CaptureError),

    /// The configuration cannot carry the configured sensors.
    #[error("invalid stream configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, StreamError>;
