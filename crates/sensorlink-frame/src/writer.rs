use bytes::BytesMut;
use sensorlink_transport::Transport;
use tracing::trace;

use crate::codec::{encode_envelope, EnvelopeConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Builds envelopes into a buffer allocated once, and transmits them.
///
/// The buffer is sized for the largest configured payload up front, so
/// building an envelope never allocates.
pub struct EnvelopeWriter {
    buf: BytesMut,
    config: EnvelopeConfig,
}

impl EnvelopeWriter {
    /// Create a writer with default configuration.
    pub fn new() -> Self {
        Self::with_config(EnvelopeConfig::default())
    }

    /// Create a writer with explicit configuration.
    pub fn with_config(config: EnvelopeConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(HEADER_SIZE + config.max_payload_size),
            config,
        }
    }

    /// Build the envelope for `payload`, replacing any previous one.
    ///
    /// Returns the wire size. The previous envelope is kept when the payload
    /// is rejected.
    pub fn prepare(&mut self, sequence: u8, payload: &[u8]) -> Result<usize> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_envelope(sequence, payload, &mut self.buf)?;
        Ok(self.buf.len())
    }

    /// The most recently prepared envelope.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Send the prepared envelope, blocking at most the configured timeout.
    pub fn transmit<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<()> {
        transport.write_blocking(&self.buf, self.config.write_timeout)?;
        trace!(size = self.buf.len(), "envelope transmitted");
        Ok(())
    }

    /// Prepare and transmit in one step.
    pub fn send<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        sequence: u8,
        payload: &[u8],
    ) -> Result<()> {
        self.prepare(sequence, payload)?;
        self.transmit(transport)
    }

    /// Current writer configuration.
    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }
}

impl Default for EnvelopeWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::BytesMut;
    use sensorlink_transport::{MemoryTransport, TransportError, WriteFault};

    use super::*;
    use crate::codec::{decode_envelope, DEFAULT_MAX_PAYLOAD};

    #[test]
    fn send_writes_one_decodable_envelope() {
        let (mut link, host) = MemoryTransport::new();
        let mut writer = EnvelopeWriter::new();

        writer.send(&mut link, 7, b"hello").unwrap();

        let mut wire = BytesMut::from(host.written().as_slice());
        let envelope = decode_envelope(&mut wire, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(envelope.sequence, 7);
        assert_eq!(envelope.payload.as_ref(), b"hello");
        assert_eq!(host.write_count(), 1);
    }

    #[test]
    fn prepare_replaces_previous_envelope() {
        let mut writer = EnvelopeWriter::new();
        writer.prepare(1, b"a much longer first payload").unwrap();
        let size = writer.prepare(2, b"short").unwrap();

        assert_eq!(size, HEADER_SIZE + 5);
        assert_eq!(writer.pending().len(), size);
        assert_eq!(writer.pending()[2], 2);
    }

    #[test]
    fn buffer_is_preallocated_for_max_payload() {
        let config = EnvelopeConfig {
            max_payload_size: 1024,
            ..EnvelopeConfig::default()
        };
        let mut writer = EnvelopeWriter::with_config(config);
        let capacity = writer.buf.capacity();
        assert!(capacity >= HEADER_SIZE + 1024);

        writer.prepare(0, &[0u8; 1024]).unwrap();
        assert_eq!(writer.buf.capacity(), capacity);
    }

    #[test]
    fn payload_too_large_rejected() {
        let config = EnvelopeConfig {
            max_payload_size: 4,
            ..EnvelopeConfig::default()
        };
        let mut writer = EnvelopeWriter::with_config(config);
        writer.prepare(0, b"ok").unwrap();

        let err = writer.prepare(1, b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert_eq!(writer.pending()[2], 0);
    }

    #[test]
    fn transmit_uses_configured_timeout() {
        let (mut link, host) = MemoryTransport::new();
        host.fail_next_write(WriteFault::Timeout);
        let config = EnvelopeConfig {
            write_timeout: Duration::from_millis(42),
            ..EnvelopeConfig::default()
        };
        let mut writer = EnvelopeWriter::with_config(config);

        let err = writer.send(&mut link, 0, b"x").unwrap_err();
        assert!(matches!(
            err,
            FrameError::Transport(TransportError::Timeout(d)) if d == Duration::from_millis(42)
        ));
        assert!(host.written().is_empty());
    }

    #[test]
    fn transmit_leaves_pending_envelope_intact() {
        let (mut link, host) = MemoryTransport::new();
        let mut writer = EnvelopeWriter::new();
        writer.prepare(3, b"again").unwrap();

        writer.transmit(&mut link).unwrap();
        writer.transmit(&mut link).unwrap();

        let wire = host.written();
        assert_eq!(wire.len(), 2 * (HEADER_SIZE + 5));
        assert_eq!(&wire[..HEADER_SIZE + 5], &wire[HEADER_SIZE + 5..]);
    }
}
