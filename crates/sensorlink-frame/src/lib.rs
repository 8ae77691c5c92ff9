//! Sequenced, checksummed envelope framing for sensor payloads.
//!
//! Every payload leaving the device is wrapped in an 8-byte header:
//! - A 2-byte sync marker (`0x55 0x55`) for stream synchronization
//! - A 1-byte wrapping sequence number, shared by all sensor streams
//! - A 4-byte little-endian payload length
//! - A 1-byte CRC-8 of the payload
//!
//! The device builds envelopes with [`EnvelopeWriter`]; the host parses and
//! verifies them with [`EnvelopeReader`] and detects loss with
//! [`SequenceTracker`].

pub mod checksum;
pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod sequence;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use checksum::{checksum, POLYNOMIAL, SEED};
pub use codec::{
    decode_envelope, encode_envelope, find_sync, frame, Envelope, EnvelopeConfig,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE, SYNC,
};
pub use command::{HostCommand, START_STREAM, STOP_STREAM};
pub use error::{FrameError, Result};
pub use reader::EnvelopeReader;
pub use sequence::SequenceTracker;
pub use writer::EnvelopeWriter;

#[cfg(feature = "async")]
pub use async_codec::EnvelopeCodec;
