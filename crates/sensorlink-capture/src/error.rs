/// Errors raised by the acquisition side.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The requested sample count differs from the sensor's per-frame count.
    #[error("sample count mismatch (expected {expected}, requested {actual})")]
    SizeMismatch { expected: usize, actual: usize },

    /// The underlying sensor transfer failed.
    #[error("sensor transfer failed: {0}")]
    HardwareFault(String),

    /// The configured geometry cannot describe a frame.
    #[error("invalid image geometry: {0}")]
    InvalidGeometry(String),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
