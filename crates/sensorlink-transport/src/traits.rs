use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, TransportError};

/// The device side of the host link.
///
/// One instance exists per process and is owned by the main loop; none of the
/// methods are expected to be called from interrupt context.
pub trait Transport {
    /// True when the link is configured, not suspended and still connected.
    fn is_ready(&self) -> bool;

    /// Read whatever is pending, up to `buf.len()` bytes, without blocking.
    ///
    /// Returns `Ok(0)` when nothing is pending and `Closed` once the host
    /// has gone away.
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write all of `buf`, blocking at most `timeout` in total.
    fn write_blocking(&mut self, buf: &[u8], timeout: Duration) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_nonblocking(buf)
    }

    fn write_blocking(&mut self, buf: &[u8], timeout: Duration) -> Result<()> {
        (**self).write_blocking(buf, timeout)
    }
}

/// A connected host link that also implements `Read + Write`.
///
/// On Unix this wraps a Unix domain socket stream, which plays the role of
/// the CDC serial endpoint off-target.
pub struct HostStream {
    inner: HostStreamInner,
    connected: bool,
    suspended: bool,
}

enum HostStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for HostStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            HostStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for HostStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            HostStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            HostStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl HostStream {
    /// Create a HostStream from a Unix domain socket stream.
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: HostStreamInner::Unix(stream),
            connected: true,
            suspended: false,
        }
    }

    /// Mark the link suspended (or resumed). Writes fail while suspended.
    pub fn set_suspended(&mut self, suspended: bool) {
        self.suspended = suspended;
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            HostStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            HostStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            HostStreamInner::Unix(stream) => stream.set_nonblocking(nonblocking).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            HostStreamInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_unix(cloned))
            }
        }
    }
}

impl Transport for HostStream {
    fn is_ready(&self) -> bool {
        self.connected && !self.suspended
    }

    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.connected {
            return Err(TransportError::Closed);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        self.set_nonblocking(true)?;
        let result = self.read(buf);
        self.set_nonblocking(false)?;

        match result {
            Ok(0) => {
                debug!("host closed the link");
                self.connected = false;
                Err(TransportError::Closed)
            }
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(0),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn write_blocking(&mut self, buf: &[u8], timeout: Duration) -> Result<()> {
        if !self.is_ready() {
            return Err(TransportError::NotReady);
        }

        // A zero timeout is rejected by the OS; treat it as the shortest wait.
        let timeout = timeout.max(Duration::from_millis(1));
        let deadline = Instant::now() + timeout;

        let mut offset = 0usize;
        while offset < buf.len() {
            // SO_SNDTIMEO restarts on every call, so each write only gets
            // what is left of the deadline.
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout(timeout));
            }
            self.set_write_timeout(Some(remaining.max(Duration::from_millis(1))))?;

            match self.write(&buf[offset..]) {
                Ok(0) => {
                    return Err(TransportError::ShortWrite {
                        written: offset,
                        expected: buf.len(),
                    })
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Err(TransportError::Timeout(timeout))
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset
                    ) =>
                {
                    self.connected = false;
                    return Err(TransportError::Closed);
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        self.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for HostStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            HostStreamInner::Unix(_) => f
                .debug_struct("HostStream")
                .field("type", &"unix")
                .field("connected", &self.connected)
                .field("suspended", &self.suspended)
                .finish(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;

    use super::*;

    fn pair() -> (HostStream, UnixStream) {
        let (device, host) = UnixStream::pair().unwrap();
        (HostStream::from_unix(device), host)
    }

    #[test]
    fn read_nonblocking_returns_zero_when_idle() {
        let (mut device, _host) = pair();
        let mut buf = [0u8; 1];
        assert_eq!(device.read_nonblocking(&mut buf).unwrap(), 0);
        assert!(device.is_ready());
    }

    #[test]
    fn read_nonblocking_returns_pending_command() {
        let (mut device, mut host) = pair();
        host.write_all(&[49]).unwrap();

        let mut buf = [0u8; 1];
        assert_eq!(device.read_nonblocking(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 49);
    }

    #[test]
    fn eof_marks_link_not_ready() {
        let (mut device, host) = pair();
        drop(host);

        let mut buf = [0u8; 1];
        let err = device.read_nonblocking(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        assert!(!device.is_ready());
    }

    #[test]
    fn read_after_failed_write_reports_closed() {
        let (mut device, host) = pair();
        drop(host);

        let err = device
            .write_blocking(b"envelope", Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));

        let mut buf = [0u8; 1];
        assert!(matches!(
            device.read_nonblocking(&mut buf),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn write_blocking_bounded_by_timeout_when_host_drains_slowly() {
        let (mut device, mut host) = pair();
        let reader = std::thread::spawn(move || {
            let mut chunk = vec![0u8; 128 * 1024];
            loop {
                std::thread::sleep(Duration::from_millis(80));
                match host.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        let payload = vec![0xA5u8; 2 * 1024 * 1024];
        let started = Instant::now();
        let result = device.write_blocking(&payload, Duration::from_millis(100));
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(TransportError::Timeout(_))));
        assert!(
            elapsed < Duration::from_millis(500),
            "write_blocking blocked {elapsed:?} with a 100ms timeout"
        );

        drop(device);
        reader.join().unwrap();
    }

    #[test]
    fn write_blocking_delivers_all_bytes() {
        let (mut device, mut host) = pair();
        device
            .write_blocking(b"envelope", Duration::from_millis(100))
            .unwrap();

        let mut buf = [0u8; 8];
        host.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"envelope");
    }

    #[test]
    fn write_blocking_rejected_while_suspended() {
        let (mut device, _host) = pair();
        device.set_suspended(true);

        let err = device
            .write_blocking(b"x", Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, TransportError::NotReady));

        device.set_suspended(false);
        assert!(device.is_ready());
    }

    #[test]
    fn write_blocking_times_out_when_host_stalls() {
        let (mut device, _host) = pair();
        // Nobody drains the host side, so the socket buffer eventually fills.
        let chunk = vec![0u8; 1024 * 1024];
        let mut result = Ok(());
        for _ in 0..64 {
            result = device.write_blocking(&chunk, Duration::from_millis(20));
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }
}
