//! The device main loop.
//!
//! [`StreamMultiplexer`] merges the camera and radar streams onto one host
//! link. It is a single-threaded, run-to-completion polling loop:
//!
//! 1. read at most one host command byte; start (`49`) enables streaming and
//!    resets the sequence, anything else disables it
//! 2. take a ready image frame, envelope it, transmit it if streaming
//! 3. drain a ready radar burst, envelope it, transmit it if streaming
//!
//! Both streams share one wrapping sequence counter, advanced for every
//! envelope built whether or not it is sent. A failed transmit disables
//! streaming until the host sends start again.

pub mod config;
pub mod error;
pub mod indicator;
pub mod mux;
pub mod state;
pub mod stats;

pub use config::StreamConfig;
pub use error::{Result, StreamError};
pub use indicator::{NullIndicator, StatusIndicator, StreamKind};
pub use mux::{Delivery, PollReport, StreamMultiplexer};
pub use state::StreamState;
pub use stats::StreamStats;
