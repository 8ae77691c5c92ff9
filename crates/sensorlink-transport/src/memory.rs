use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Failure to inject into the next `write_blocking` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFault {
    /// Report a timeout.
    Timeout,
    /// Report the link as closed.
    Closed,
}

#[derive(Debug, Default)]
struct Shared {
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    writes: usize,
    faults: VecDeque<WriteFault>,
    suspended: bool,
}

/// In-process host link.
///
/// The device side is the `MemoryTransport`; the test or simulator keeps a
/// [`MemoryHandle`] to script host commands and inspect what was sent.
#[derive(Debug)]
pub struct MemoryTransport {
    shared: Arc<Mutex<Shared>>,
}

/// Host-side view of a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryTransport {
    /// Create a connected, ready link and its host handle.
    pub fn new() -> (Self, MemoryHandle) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MemoryHandle { shared },
        )
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn is_ready(&self) -> bool {
        !self.lock().suspended
    }

    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut shared = self.lock();
        let n = buf.len().min(shared.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(shared.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_blocking(&mut self, buf: &[u8], timeout: Duration) -> Result<()> {
        let mut shared = self.lock();
        if shared.suspended {
            return Err(TransportError::NotReady);
        }
        match shared.faults.pop_front() {
            Some(WriteFault::Timeout) => Err(TransportError::Timeout(timeout)),
            Some(WriteFault::Closed) => Err(TransportError::Closed),
            None => {
                shared.written.extend_from_slice(buf);
                shared.writes += 1;
                Ok(())
            }
        }
    }
}

impl MemoryHandle {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue bytes as if the host had sent them.
    pub fn send(&self, bytes: &[u8]) {
        self.lock().incoming.extend(bytes.iter().copied());
    }

    /// Everything the device has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Drain and return everything the device has written so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().written)
    }

    /// Number of successful `write_blocking` calls.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Make the next `write_blocking` call fail.
    pub fn fail_next_write(&self, fault: WriteFault) {
        self.lock().faults.push_back(fault);
    }

    /// Suspend or resume the link.
    pub fn set_suspended(&self, suspended: bool) {
        self.lock().suspended = suspended;
    }
}
