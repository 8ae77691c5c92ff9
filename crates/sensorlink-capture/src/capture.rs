use std::sync::Arc;

use tracing::{trace, warn};

use crate::buffer_pair::{FrameProducer, SwapOutcome};
use crate::error::{CaptureError, Result};
use crate::geometry::ImageGeometry;
use crate::stats::CaptureStats;

/// Where the state machine is within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No line has arrived since the last frame-complete event.
    Idle,
    /// At least one line of the current frame has been relocated.
    AccumulatingLines,
}

/// What a frame-complete event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was published to the consumer.
    Completed { overwrote_unread: bool },
    /// The line count was wrong. The frame was dropped without a swap.
    Malformed { lines: usize, expected: usize },
    /// The frame was complete but the consumer still held the other buffer,
    /// so it was dropped.
    Deferred,
}

/// Line/frame event handler for the image path.
///
/// Runs in the capture (interrupt) context and touches nothing but its own
/// line buffers and the producer half of the frame buffer pair. Events are
/// expected strictly interleaved per frame: N line-complete events, then one
/// frame-complete event.
pub struct CaptureStateMachine {
    producer: FrameProducer,
    line_buffers: [Box<[u8]>; 2],
    slot: usize,
    line_index: usize,
    line_size: usize,
    expected_lines: usize,
    state: CaptureState,
    stats: Arc<CaptureStats>,
}

impl CaptureStateMachine {
    /// Build the state machine around the producer half of a buffer pair.
    ///
    /// The pair must have been sized with `geometry.frame_size()`.
    pub fn new(producer: FrameProducer, geometry: ImageGeometry) -> Result<Self> {
        geometry.validate()?;
        if producer.frame_size() != geometry.frame_size() {
            return Err(CaptureError::InvalidGeometry(format!(
                "frame buffers hold {} bytes, geometry needs {}",
                producer.frame_size(),
                geometry.frame_size()
            )));
        }

        let line_size = geometry.line_size();
        Ok(Self {
            producer,
            line_buffers: [
                vec![0u8; line_size].into_boxed_slice(),
                vec![0u8; line_size].into_boxed_slice(),
            ],
            slot: 0,
            line_index: 0,
            line_size,
            expected_lines: geometry.lines_per_frame,
            state: CaptureState::Idle,
            stats: Arc::new(CaptureStats::default()),
        })
    }

    /// The line buffer the capture mechanism fills next.
    pub fn line_target(&mut self) -> &mut [u8] {
        &mut self.line_buffers[self.slot]
    }

    /// Handle a line-complete event.
    ///
    /// The next line is directed at the other line buffer before this one is
    /// relocated into the frame. Lines past the expected count are counted
    /// but not stored.
    pub fn on_line_complete(&mut self) {
        let filled = self.slot;
        self.slot ^= 1;

        if self.line_index < self.expected_lines {
            let offset = self.line_index * self.line_size;
            self.producer.write_handle()[offset..offset + self.line_size]
                .copy_from_slice(&self.line_buffers[filled]);
        }
        self.line_index += 1;
        self.state = CaptureState::AccumulatingLines;
    }

    /// Handle a frame-complete event.
    pub fn on_frame_complete(&mut self) -> FrameOutcome {
        let lines = self.line_index;
        self.line_index = 0;
        self.state = CaptureState::Idle;

        if lines != self.expected_lines {
            self.stats.record_malformed();
            warn!(lines, expected = self.expected_lines, "malformed frame dropped");
            return FrameOutcome::Malformed {
                lines,
                expected: self.expected_lines,
            };
        }

        match self.producer.swap_and_mark_ready() {
            SwapOutcome::Swapped { overwrote_unread } => {
                self.stats.record_completed(overwrote_unread);
                trace!(overwrote_unread, "frame published");
                FrameOutcome::Completed { overwrote_unread }
            }
            SwapOutcome::Deferred => {
                self.stats.record_deferred();
                trace!("frame dropped while consumer reads");
                FrameOutcome::Deferred
            }
        }
    }

    /// Deliver one line the way the capture mechanism would: fill the
    /// current line target, then raise line-complete.
    ///
    /// A short `line` leaves the tail of the target as it was; extra bytes
    /// are ignored.
    pub fn capture_line(&mut self, line: &[u8]) {
        let target = self.line_target();
        let n = target.len().min(line.len());
        target[..n].copy_from_slice(&line[..n]);
        self.on_line_complete();
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Lines seen so far in the current frame.
    pub fn line_index(&self) -> usize {
        self.line_index
    }

    pub fn line_size(&self) -> usize {
        self.line_size
    }

    pub fn expected_lines(&self) -> usize {
        self.expected_lines
    }

    /// Shared handle to the frame counters.
    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }
}
