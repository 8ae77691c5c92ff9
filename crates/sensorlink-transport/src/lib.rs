//! Byte-oriented host link abstraction.
//!
//! The device talks to exactly one host over a single serial-style channel.
//! Everything above this crate sees the link through the [`Transport`] trait:
//! - non-blocking receive of command bytes
//! - blocking send of envelopes, bounded by a timeout
//! - a readiness predicate (configured, not suspended, not disconnected)
//!
//! [`HostStream`] provides the link over a Unix domain socket, which stands in
//! for the USB CDC endpoint when running off-target. [`MemoryTransport`] is a
//! scripted in-process link for tests and simulations.

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use memory::{MemoryHandle, MemoryTransport, WriteFault};
pub use traits::{HostStream, Transport};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
