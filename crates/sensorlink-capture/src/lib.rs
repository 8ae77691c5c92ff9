//! Sensor acquisition for the camera and radar paths.
//!
//! The image path is interrupt driven. A [`CaptureStateMachine`] handles
//! line-complete and frame-complete events, relocating lines into the write
//! side of a [`FrameBufferPair`] and publishing whole frames with one atomic
//! swap. The main loop takes published frames through the [`FrameConsumer`]
//! half and never observes a frame that is still being written.
//!
//! The radar path is polled. A [`RadarAdapter`] drains a single-shot
//! availability latch into one flat sample buffer.

pub mod buffer_pair;
pub mod capture;
pub mod error;
pub mod geometry;
pub mod radar;
pub mod stats;

pub use buffer_pair::{FrameBufferPair, FrameConsumer, FrameProducer, ReadyFrame, SwapOutcome};
pub use capture::{CaptureState, CaptureStateMachine, FrameOutcome};
pub use error::{CaptureError, Result};
pub use geometry::ImageGeometry;
pub use radar::{write_samples_le, DataReadyLatch, RadarAdapter, RadarSensor, SAMPLE_WIDTH};
pub use stats::{CaptureSnapshot, CaptureStats};
