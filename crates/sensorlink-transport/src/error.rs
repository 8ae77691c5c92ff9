use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur on the host link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The link is not configured or is suspended.
    #[error("host link not ready")]
    NotReady,

    /// A blocking write did not complete within its deadline.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    /// The link accepted only part of the buffer.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    /// The host closed the link.
    #[error("host link closed")]
    Closed,

    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
