use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::error::{CaptureError, Result};

/// Bytes per radar sample on the wire.
pub const SAMPLE_WIDTH: usize = 2;

/// The radar sensor collaborator.
pub trait RadarSensor {
    /// True once a burst has been captured and not yet acknowledged.
    fn is_available(&self) -> bool;

    /// Clear the data-available latch.
    fn acknowledge(&mut self);

    /// Fixed number of samples in one burst.
    fn samples_per_frame(&self) -> usize;

    /// Copy `count` samples of the latest burst into `buffer`.
    fn read(&mut self, buffer: &mut [u16], count: usize) -> Result<()>;
}

/// Single-shot "burst available" flag shared with the radar's own
/// completion context.
#[derive(Debug, Clone, Default)]
pub struct DataReadyLatch {
    flag: Arc<AtomicBool>,
}

impl DataReadyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Main-loop side of the radar path.
///
/// There is one sample buffer, owned by the caller, so a burst must be fully
/// consumed before the next [`drain`](Self::drain).
pub struct RadarAdapter<S> {
    sensor: S,
}

impl<S: RadarSensor> RadarAdapter<S> {
    pub fn new(sensor: S) -> Self {
        Self { sensor }
    }

    /// Whether a burst is waiting. Does not clear the latch.
    pub fn poll_available(&self) -> bool {
        self.sensor.is_available()
    }

    pub fn samples_per_frame(&self) -> usize {
        self.sensor.samples_per_frame()
    }

    /// Copy the waiting burst into `buffer`.
    ///
    /// The latch is cleared before anything else, so a burst that starts
    /// arriving during the copy raises it again, and a failed drain still
    /// consumes the signal.
    pub fn drain(&mut self, buffer: &mut [u16], expected_count: usize) -> Result<()> {
        self.sensor.acknowledge();

        let per_frame = self.sensor.samples_per_frame();
        if expected_count != per_frame {
            return Err(CaptureError::SizeMismatch {
                expected: per_frame,
                actual: expected_count,
            });
        }
        if buffer.len() < expected_count {
            return Err(CaptureError::SizeMismatch {
                expected: expected_count,
                actual: buffer.len(),
            });
        }

        self.sensor.read(&mut buffer[..expected_count], expected_count)?;
        trace!(samples = expected_count, "radar burst drained");
        Ok(())
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }
}

/// Serialize samples little-endian into `dst`, returning the bytes written.
///
/// Stops at whichever of the two runs out first.
pub fn write_samples_le(samples: &[u16], dst: &mut [u8]) -> usize {
    let mut written = 0;
    for (sample, out) in samples.iter().zip(dst.chunks_exact_mut(SAMPLE_WIDTH)) {
        out.copy_from_slice(&sample.to_le_bytes());
        written += SAMPLE_WIDTH;
    }
    written
}
