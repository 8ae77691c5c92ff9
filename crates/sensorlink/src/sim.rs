//! Simulated sensors for running the main loop off-target.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sensorlink_capture::{CaptureStateMachine, DataReadyLatch, RadarSensor, Result as CaptureResult};
use tracing::debug;

/// How the simulated camera paces and corrupts its frames.
#[derive(Debug, Clone, Copy)]
pub struct CameraConfig {
    pub frame_interval: Duration,
    /// Drop the last line of every Nth frame.
    pub malformed_every: Option<u64>,
}

/// Drive a capture state machine from its own thread, in place of the
/// camera's line and frame interrupts.
///
/// Returns the number of frames generated once `running` is cleared.
pub fn spawn_camera(
    mut machine: CaptureStateMachine,
    config: CameraConfig,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<u64>> {
    thread::Builder::new()
        .name("camera".to_string())
        .spawn(move || {
            let mut frames = 0u64;
            let mut line = vec![0u8; machine.line_size()];
            while running.load(Ordering::Relaxed) {
                frames += 1;
                let mut lines = machine.expected_lines();
                if config
                    .malformed_every
                    .is_some_and(|every| every > 0 && frames % every == 0)
                {
                    lines = lines.saturating_sub(1);
                }

                for index in 0..lines {
                    fill_line(&mut line, frames, index);
                    machine.capture_line(&line);
                }
                let outcome = machine.on_frame_complete();
                debug!(frame = frames, ?outcome, "simulated frame");
                thread::sleep(config.frame_interval);
            }
            frames
        })
}

/// Test pattern: a diagonal ramp that moves one step per frame.
pub fn fill_line(line: &mut [u8], frame: u64, index: usize) {
    let base = (frame as usize).wrapping_add(index);
    for (col, byte) in line.iter_mut().enumerate() {
        *byte = base.wrapping_add(col) as u8;
    }
}

/// Radar that synthesizes a 12-bit triangle wave on every read.
#[derive(Debug)]
pub struct SimulatedRadar {
    latch: DataReadyLatch,
    samples_per_frame: usize,
    bursts: u64,
}

const ADC_SPAN: usize = 4096;

impl SimulatedRadar {
    pub fn new(samples_per_frame: usize) -> Self {
        Self {
            latch: DataReadyLatch::new(),
            samples_per_frame,
            bursts: 0,
        }
    }

    /// Handle for the burst clock.
    pub fn latch(&self) -> DataReadyLatch {
        self.latch.clone()
    }
}

impl RadarSensor for SimulatedRadar {
    fn is_available(&self) -> bool {
        self.latch.is_set()
    }

    fn acknowledge(&mut self) {
        self.latch.clear();
    }

    fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    fn read(&mut self, buffer: &mut [u16], count: usize) -> CaptureResult<()> {
        let shift = (self.bursts as usize).wrapping_mul(64);
        for (i, sample) in buffer.iter_mut().take(count).enumerate() {
            let phase = i.wrapping_add(shift) % (2 * ADC_SPAN);
            let level = if phase < ADC_SPAN {
                phase
            } else {
                2 * ADC_SPAN - 1 - phase
            };
            *sample = level as u16;
        }
        self.bursts += 1;
        Ok(())
    }
}

/// Raise the radar latch every `interval`, as the ADC's burst-complete
/// interrupt would.
pub fn spawn_radar_clock(
    latch: DataReadyLatch,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("radar".to_string())
        .spawn(move || {
            while running.load(Ordering::Relaxed) {
                thread::sleep(interval);
                latch.signal();
            }
        })
}
