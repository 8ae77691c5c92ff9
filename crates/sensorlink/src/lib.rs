//! Dual-sensor acquisition and framed streaming to a single host link.
//!
//! A camera (interrupt-driven, line by line) and a radar (polled bursts)
//! are forwarded to one host over one byte channel. Every payload leaves
//! wrapped in a sequenced, checksummed envelope, and nothing is sent until
//! the host asks for it.
//!
//! # Crate Structure
//!
//! - [`transport`]: host link abstraction (Unix socket stand-in, in-memory link)
//! - [`frame`]: checksum, envelope framing and host-side verification
//! - [`capture`]: frame buffer pair, capture state machine, radar adapter
//! - [`stream`]: the main loop that merges both sensors onto the link

/// Re-export transport types.
pub mod transport {
    pub use sensorlink_transport::*;
}

/// Re-export envelope types.
pub mod frame {
    pub use sensorlink_frame::*;
}

/// Re-export acquisition types.
pub mod capture {
    pub use sensorlink_capture::*;
}

/// Re-export main loop types.
pub mod stream {
    pub use sensorlink_stream::*;
}
