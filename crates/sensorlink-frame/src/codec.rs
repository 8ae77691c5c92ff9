use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::checksum::checksum;
use crate::error::{FrameError, Result};

/// Envelope header: sync (2) + sequence (1) + length (4) + checksum (1) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Sync marker opening every envelope.
pub const SYNC: [u8; 2] = [0x55, 0x55];

/// Default maximum payload size: one 640x480 frame at 2 bytes per pixel.
pub const DEFAULT_MAX_PAYLOAD: usize = 640 * 480 * 2;

/// A sequenced payload as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Shared wrapping sequence number.
    pub sequence: u8,
    /// Checksum carried in the header.
    pub checksum: u8,
    /// The payload bytes.
    pub payload: Bytes,
}

impl Envelope {
    /// Create an envelope, computing the checksum over `payload`.
    pub fn new(sequence: u8, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            sequence,
            checksum: checksum(&payload),
            payload,
        }
    }

    /// The total wire size of this envelope (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode an envelope into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────────┬────────────┬──────────┬────────────────┐
/// │ Sync (2B)  │ Seq (1B) │ Length     │ CRC (1B) │ Payload        │
/// │ 0x55 0x55  │          │ (4B LE)    │          │ (Length bytes) │
/// └────────────┴──────────┴────────────┴──────────┴────────────────┘
/// ```
///
/// `dst` is appended to; callers reusing a buffer clear it first.
pub fn encode_envelope(sequence: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&SYNC);
    dst.put_u8(sequence);
    dst.put_u32_le(len);
    dst.put_u8(checksum(payload));
    dst.put_slice(payload);
    Ok(())
}

/// Build a standalone envelope for `payload`.
///
/// The caller owns the sequence counter and advances it after each call.
pub fn frame(payload: &[u8], sequence: u8) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_envelope(sequence, payload, &mut dst)?;
    Ok(dst.freeze())
}

/// Decode an envelope from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete envelope yet.
/// On success, consumes the envelope bytes from the buffer. A corrupt
/// payload is consumed as well and reported as `ChecksumMismatch`, so the
/// next call starts at the following envelope. A bad sync marker consumes
/// nothing; see [`find_sync`] for recovery.
pub fn decode_envelope(src: &mut BytesMut, max_payload: usize) -> Result<Option<Envelope>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != SYNC {
        return Err(FrameError::InvalidSync);
    }

    let sequence = src[2];
    let payload_len = u32::from_le_bytes([src[3], src[4], src[5], src[6]]) as usize;
    let expected = src[7];

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    let actual = checksum(&payload);
    if actual != expected {
        return Err(FrameError::ChecksumMismatch {
            sequence,
            expected,
            actual,
        });
    }

    Ok(Some(Envelope {
        sequence,
        checksum: expected,
        payload,
    }))
}

/// Offset of the first sync marker in `src`, if any.
pub fn find_sync(src: &[u8]) -> Option<usize> {
    src.windows(SYNC.len()).position(|w| w == SYNC)
}

/// Configuration for building and parsing envelopes.
#[derive(Debug, Clone)]
pub struct EnvelopeConfig {
    /// Maximum payload size in bytes. The writer pre-allocates for this.
    pub max_payload_size: usize,
    /// Bound on each blocking transmit. Default: 100 ms.
    pub write_timeout: Duration,
    /// Read timeout for host-side blocking reads.
    pub read_timeout: Option<Duration>,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            write_timeout: Duration::from_millis(100),
            read_timeout: None,
        }
    }
}
