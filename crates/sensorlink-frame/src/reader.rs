use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use sensorlink_transport::HostStream;
use tracing::debug;

use crate::codec::{decode_envelope, find_sync, Envelope, EnvelopeConfig, SYNC};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Reads complete, verified envelopes from any `Read` stream (host side).
///
/// Handles partial reads internally. After `InvalidSync` the caller decides
/// whether to [`resync`](Self::resync) or give up; a `ChecksumMismatch` has
/// already skipped the corrupt envelope.
pub struct EnvelopeReader<T> {
    inner: T,
    buf: BytesMut,
    config: EnvelopeConfig,
}

impl<T: Read> EnvelopeReader<T> {
    /// Create a new envelope reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, EnvelopeConfig::default())
    }

    /// Create a new envelope reader with explicit configuration.
    pub fn with_config(inner: T, config: EnvelopeConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete envelope (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_envelope(&mut self) -> Result<Envelope> {
        loop {
            if let Some(envelope) = decode_envelope(&mut self.buf, self.config.max_payload_size)? {
                return Ok(envelope);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Drop buffered bytes up to the next sync marker candidate.
    ///
    /// Always discards at least one byte when anything is buffered. A trailing
    /// lone `0x55` is kept since it may be the first half of a marker.
    /// Returns the number of bytes discarded.
    pub fn resync(&mut self) -> usize {
        if self.buf.is_empty() {
            return 0;
        }

        let skip = match find_sync(&self.buf[1..]) {
            Some(offset) => offset + 1,
            None if self.buf.len() > 1 && self.buf[self.buf.len() - 1] == SYNC[0] => {
                self.buf.len() - 1
            }
            None => self.buf.len(),
        };

        self.buf.advance(skip);
        debug!(discarded = skip, "resynchronizing envelope stream");
        skip
    }

    /// Discard everything buffered but not yet decoded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.buf.len();
        self.buf.clear();
        dropped
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }
}

impl EnvelopeReader<HostStream> {
    /// Create a reader for a `HostStream` and apply the read timeout from config.
    pub fn with_config_host(inner: HostStream, config: EnvelopeConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }

    /// Discard everything the device already sent, buffered or still in the
    /// socket, until the link stays quiet for `idle`.
    ///
    /// Gives up after `limit` if the device keeps sending. Returns the
    /// number of bytes dropped. The configured read timeout is restored.
    pub fn drain_until_idle(&mut self, idle: Duration, limit: Duration) -> Result<usize> {
        let mut dropped = self.clear();
        let deadline = Instant::now() + limit;
        self.inner.set_read_timeout(Some(idle.max(Duration::from_millis(1))))?;

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let outcome = loop {
            if Instant::now() >= deadline {
                debug!(dropped, "link still busy when drain limit reached");
                break Ok(());
            }
            match self.inner.read(&mut chunk) {
                Ok(0) => break Err(FrameError::ConnectionClosed),
                Ok(n) => dropped += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    break Ok(())
                }
                Err(err) => break Err(FrameError::Io(err)),
            }
        };

        self.inner.set_read_timeout(self.config.read_timeout)?;
        outcome?;
        debug!(dropped, "drained pending link data");
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    #[cfg(unix)]
    use std::path::PathBuf;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::{encode_envelope, HEADER_SIZE};

    fn wire_of(envelopes: &[(u8, &[u8])]) -> Vec<u8> {
        let mut wire = BytesMut::new();
        for (sequence, payload) in envelopes {
            encode_envelope(*sequence, payload, &mut wire).unwrap();
        }
        wire.to_vec()
    }

    #[test]
    fn read_envelopes_in_order() {
        let wire = wire_of(&[(0, b"one"), (1, b"two"), (2, b"three")]);
        let mut reader = EnvelopeReader::new(Cursor::new(wire));

        let e0 = reader.read_envelope().unwrap();
        let e1 = reader.read_envelope().unwrap();
        let e2 = reader.read_envelope().unwrap();

        assert_eq!((e0.sequence, e0.payload.as_ref()), (0, b"one".as_ref()));
        assert_eq!((e1.sequence, e1.payload.as_ref()), (1, b"two".as_ref()));
        assert_eq!((e2.sequence, e2.payload.as_ref()), (2, b"three".as_ref()));
    }

    #[test]
    fn read_image_sized_payload() {
        let payload: Vec<u8> = (0..153_600u32).map(|i| (i % 251) as u8).collect();
        let wire = wire_of(&[(17, &payload)]);

        let mut reader = EnvelopeReader::new(Cursor::new(wire));
        let envelope = reader.read_envelope().unwrap();
        assert_eq!(envelope.sequence, 17);
        assert_eq!(envelope.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let wire = wire_of(&[(4, b"slow")]);
        let mut reader = EnvelopeReader::new(ByteByByteReader { bytes: wire, pos: 0 });

        let envelope = reader.read_envelope().unwrap();
        assert_eq!(envelope.sequence, 4);
        assert_eq!(envelope.payload.as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_mid_envelope() {
        let mut partial = BytesMut::new();
        partial.put_slice(&SYNC);
        partial.put_u8(0);
        partial.put_u32_le(16);
        partial.put_u8(0);
        partial.put_slice(b"only-part");

        let mut reader = EnvelopeReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_envelope().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn resync_after_line_noise() {
        let mut wire = vec![0x00, 0x13, 0x55, 0x37, 0xFE, 0x01, 0x02, 0x03];
        wire.extend(wire_of(&[(8, b"after-noise")]));
        let mut reader = EnvelopeReader::new(Cursor::new(wire));

        assert!(matches!(reader.read_envelope(), Err(FrameError::InvalidSync)));
        // The lone 0x55 inside the noise is not a marker.
        assert_eq!(reader.resync(), 8);

        let envelope = reader.read_envelope().unwrap();
        assert_eq!(envelope.sequence, 8);
        assert_eq!(envelope.payload.as_ref(), b"after-noise");
    }

    #[test]
    fn resync_skips_to_next_marker() {
        let mut wire = vec![0xAA, 0xBB, 0xCC];
        wire.extend(wire_of(&[(1, b"x")]));
        let mut reader = EnvelopeReader::new(Cursor::new(wire));

        assert!(matches!(reader.read_envelope(), Err(FrameError::InvalidSync)));
        assert_eq!(reader.resync(), 3);
        assert_eq!(reader.read_envelope().unwrap().payload.as_ref(), b"x");
    }

    #[test]
    fn resync_keeps_trailing_half_marker() {
        let mut reader = EnvelopeReader::new(Cursor::new(Vec::new()));
        reader.buf.extend_from_slice(&[0x01, 0x02, 0x03, 0x55]);

        assert_eq!(reader.resync(), 3);
        assert_eq!(&reader.buf[..], &[0x55u8]);
        assert_eq!(reader.resync(), 1);
        assert_eq!(reader.resync(), 0);
    }

    #[test]
    fn checksum_mismatch_then_next_envelope() {
        let mut wire = wire_of(&[(0, b"corrupt"), (1, b"intact")]);
        wire[HEADER_SIZE] ^= 0xFF;
        let mut reader = EnvelopeReader::new(Cursor::new(wire));

        let err = reader.read_envelope().unwrap_err();
        assert!(matches!(err, FrameError::ChecksumMismatch { sequence: 0, .. }));

        let next = reader.read_envelope().unwrap();
        assert_eq!(next.sequence, 1);
        assert_eq!(next.payload.as_ref(), b"intact");
    }

    #[test]
    fn clear_drops_buffered_bytes() {
        let wire = wire_of(&[(0, b"a"), (1, b"b")]);
        let mut reader = EnvelopeReader::new(Cursor::new(wire));
        reader.read_envelope().unwrap();

        assert_eq!(reader.clear(), HEADER_SIZE + 1);
        assert!(matches!(reader.read_envelope(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn interrupted_read_retries() {
        let wire = wire_of(&[(8, b"ok")]);
        let mut reader = EnvelopeReader::new(InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire),
        });

        let envelope = reader.read_envelope().unwrap();
        assert_eq!(envelope.sequence, 8);
        assert_eq!(envelope.payload.as_ref(), b"ok");
    }

    #[test]
    #[cfg(unix)]
    fn reads_from_host_stream() {
        let dir = std::env::temp_dir().join(format!("sensorlink-reader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("reader.sock");
        let endpoint = sensorlink_transport::UnixDomainSocket::bind(&sock_path).unwrap();

        let path_clone = sock_path.clone();
        let host = std::thread::spawn(move || {
            let stream = sensorlink_transport::UnixDomainSocket::connect(&path_clone).unwrap();
            let config = EnvelopeConfig {
                read_timeout: Some(std::time::Duration::from_secs(2)),
                ..EnvelopeConfig::default()
            };
            let mut reader = EnvelopeReader::with_config_host(stream, config).unwrap();
            reader.read_envelope().unwrap()
        });

        let mut device = endpoint.accept().unwrap();
        let mut writer = crate::writer::EnvelopeWriter::new();
        writer.send(&mut device, 11, b"uds").unwrap();

        let envelope = host.join().unwrap();
        assert_eq!(envelope.sequence, 11);
        assert_eq!(envelope.payload.as_ref(), b"uds");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    fn host_link(tag: &str) -> (PathBuf, EnvelopeReader<HostStream>, HostStream) {
        let dir = std::env::temp_dir().join(format!("sensorlink-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let endpoint = sensorlink_transport::UnixDomainSocket::bind(dir.join("link.sock")).unwrap();
        let host = sensorlink_transport::UnixDomainSocket::connect(endpoint.path()).unwrap();
        let device = endpoint.accept().unwrap();
        let config = EnvelopeConfig {
            read_timeout: Some(Duration::from_secs(2)),
            ..EnvelopeConfig::default()
        };
        (dir, EnvelopeReader::with_config_host(host, config).unwrap(), device)
    }

    #[test]
    #[cfg(unix)]
    fn drain_discards_envelopes_still_in_flight() {
        use std::io::Write;

        let (dir, mut reader, mut device) = host_link("drain");
        let stale = wire_of(&[(41, &[7u8; 600]), (42, &[8u8; 600]), (43, &[9u8; 600])]);
        let first_len = HEADER_SIZE + 600;
        // The last envelope is cut off mid-payload.
        let sent = stale.len() - 300;
        device.write_all(&stale[..sent]).unwrap();

        assert_eq!(reader.read_envelope().unwrap().sequence, 41);
        let dropped = reader
            .drain_until_idle(Duration::from_millis(50), Duration::from_secs(1))
            .unwrap();
        assert_eq!(dropped, sent - first_len);

        device.write_all(&wire_of(&[(0, b"fresh")])).unwrap();
        let envelope = reader.read_envelope().unwrap();
        assert_eq!((envelope.sequence, envelope.payload.as_ref()), (0, b"fresh".as_ref()));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    #[cfg(unix)]
    fn drain_reports_device_gone() {
        let (dir, mut reader, device) = host_link("drain-closed");
        drop(device);

        let err = reader
            .drain_until_idle(Duration::from_millis(50), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        let _ = std::fs::remove_dir_all(&dir);
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
