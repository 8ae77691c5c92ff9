use std::cell::UnsafeCell;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

// Layout of the shared state word.
const WRITE_INDEX: u8 = 0b001;
const READY: u8 = 0b010;
const READING: u8 = 0b100;

/// Result of [`FrameProducer::swap_and_mark_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The finished buffer is now readable and the producer owns the other one.
    Swapped {
        /// A previously ready frame was never taken and is now being reused.
        overwrote_unread: bool,
    },
    /// The consumer still holds the other buffer. Nothing changed and the
    /// finished frame will be overwritten by the next one.
    Deferred,
}

struct Shared {
    buffers: [UnsafeCell<Box<[u8]>>; 2],
    state: AtomicU8,
}

// SAFETY: access to `buffers` is partitioned by `state`. The producer only
// touches `buffers[write_index]`. The consumer only touches the other buffer,
// and only between setting and clearing READING. The producer never flips
// `write_index` while READING is set, so the two sides never alias.
unsafe impl Sync for Shared {}

impl Shared {
    fn write_index(&self) -> usize {
        // Only the producer changes WRITE_INDEX.
        usize::from(self.state.load(Ordering::Relaxed) & WRITE_INDEX)
    }
}

/// Two preallocated frame buffers plus the state word that hands them off.
///
/// Both buffers are allocated here and never again. [`split`](Self::split)
/// yields the producer half, meant for the capture (interrupt) context, and
/// the consumer half for the main loop. Neither half is `Clone`, which keeps
/// the pair single-producer and single-consumer.
pub struct FrameBufferPair {
    shared: Arc<Shared>,
    frame_size: usize,
}

impl FrameBufferPair {
    pub fn new(frame_size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                buffers: [
                    UnsafeCell::new(vec![0u8; frame_size].into_boxed_slice()),
                    UnsafeCell::new(vec![0u8; frame_size].into_boxed_slice()),
                ],
                state: AtomicU8::new(0),
            }),
            frame_size,
        }
    }

    pub fn split(self) -> (FrameProducer, FrameConsumer) {
        (
            FrameProducer {
                shared: Arc::clone(&self.shared),
                frame_size: self.frame_size,
            },
            FrameConsumer {
                shared: self.shared,
                frame_size: self.frame_size,
            },
        )
    }
}

/// Producer half of a frame buffer pair.
pub struct FrameProducer {
    shared: Arc<Shared>,
    frame_size: usize,
}

impl FrameProducer {
    /// The buffer currently designated as write target.
    pub fn write_handle(&mut self) -> &mut [u8] {
        let index = self.shared.write_index();
        // SAFETY: `buffers[index]` is the write target. The consumer never
        // reads it, and `&mut self` rules out a second producer borrow.
        unsafe { &mut **self.shared.buffers[index].get() }
    }

    /// Publish the write target as the ready frame and switch to the other
    /// buffer, in a single update of the state word.
    ///
    /// An unread ready frame is silently replaced.
    pub fn swap_and_mark_ready(&mut self) -> SwapOutcome {
        let mut current = self.shared.state.load(Ordering::Acquire);
        loop {
            if current & READING != 0 {
                return SwapOutcome::Deferred;
            }
            let next = (current ^ WRITE_INDEX) | READY;
            match self.shared.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return SwapOutcome::Swapped {
                        overwrote_unread: current & READY != 0,
                    }
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}

/// Consumer half of a frame buffer pair.
pub struct FrameConsumer {
    shared: Arc<Shared>,
    frame_size: usize,
}

impl FrameConsumer {
    /// Take the ready frame, if any, clearing the ready flag.
    ///
    /// The producer cannot swap onto the returned buffer until the guard is
    /// dropped.
    pub fn take_ready(&mut self) -> Option<ReadyFrame<'_>> {
        let mut current = self.shared.state.load(Ordering::Acquire);
        loop {
            if current & READY == 0 {
                return None;
            }
            let next = (current & !READY) | READING;
            match self.shared.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let index = usize::from((current & WRITE_INDEX) ^ WRITE_INDEX);
                    return Some(ReadyFrame {
                        shared: &self.shared,
                        index,
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// True when a frame is waiting. Does not take it.
    pub fn is_ready(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) & READY != 0
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}

/// Read-only view of a completed frame, held by the consumer.
pub struct ReadyFrame<'a> {
    shared: &'a Shared,
    index: usize,
}

impl Deref for ReadyFrame<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: READING is set for as long as this guard lives, so the
        // producer keeps writing to the other buffer.
        unsafe { &**self.shared.buffers[self.index].get() }
    }
}

impl AsRef<[u8]> for ReadyFrame<'_> {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl Drop for ReadyFrame<'_> {
    fn drop(&mut self) {
        self.shared.state.fetch_and(!READING, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_buffer_pair(frame_size: usize) -> (FrameProducer, FrameConsumer) {
        FrameBufferPair::new(frame_size).split()
    }

    fn fill(producer: &mut FrameProducer, value: u8) {
        producer.write_handle().fill(value);
    }

    #[test]
    fn swap_then_take_yields_written_pattern() {
        let (mut producer, mut consumer) = frame_buffer_pair(256);
        for (i, byte) in producer.write_handle().iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(7) ^ 0xA5;
        }
        let expected = producer.write_handle().to_vec();

        assert_eq!(
            producer.swap_and_mark_ready(),
            SwapOutcome::Swapped {
                overwrote_unread: false
            }
        );
        let frame = consumer.take_ready().unwrap();
        assert_eq!(&frame[..], expected.as_slice());
    }

    #[test]
    fn second_take_without_swap_is_not_ready() {
        let (mut producer, mut consumer) = frame_buffer_pair(8);
        producer.swap_and_mark_ready();

        assert!(consumer.take_ready().is_some());
        assert!(consumer.take_ready().is_none());
        assert!(!consumer.is_ready());
    }

    #[test]
    fn nothing_ready_before_first_swap() {
        let (_producer, mut consumer) = frame_buffer_pair(8);
        assert!(!consumer.is_ready());
        assert!(consumer.take_ready().is_none());
    }

    #[test]
    fn producer_alternates_buffers() {
        let (mut producer, mut consumer) = frame_buffer_pair(4);
        fill(&mut producer, 1);
        producer.swap_and_mark_ready();
        fill(&mut producer, 2);

        assert_eq!(&consumer.take_ready().unwrap()[..], &[1u8; 4]);
        producer.swap_and_mark_ready();
        assert_eq!(&consumer.take_ready().unwrap()[..], &[2u8; 4]);
    }

    #[test]
    fn unread_frame_is_overwritten_by_newer_one() {
        let (mut producer, mut consumer) = frame_buffer_pair(4);
        fill(&mut producer, 1);
        producer.swap_and_mark_ready();
        fill(&mut producer, 2);

        assert_eq!(
            producer.swap_and_mark_ready(),
            SwapOutcome::Swapped {
                overwrote_unread: true
            }
        );
        assert_eq!(&consumer.take_ready().unwrap()[..], &[2u8; 4]);
        assert!(consumer.take_ready().is_none());
    }

    #[test]
    fn swap_is_deferred_while_consumer_reads() {
        let (mut producer, mut consumer) = frame_buffer_pair(4);
        fill(&mut producer, 1);
        producer.swap_and_mark_ready();

        let frame = consumer.take_ready().unwrap();
        fill(&mut producer, 2);
        assert_eq!(producer.swap_and_mark_ready(), SwapOutcome::Deferred);
        assert_eq!(&frame[..], &[1u8; 4]);
        drop(frame);

        assert!(!consumer.is_ready());
        fill(&mut producer, 3);
        assert_eq!(
            producer.swap_and_mark_ready(),
            SwapOutcome::Swapped {
                overwrote_unread: false
            }
        );
        assert_eq!(&consumer.take_ready().unwrap()[..], &[3u8; 4]);
    }

    #[test]
    fn concurrent_handoff_never_tears() {
        const FRAMES: u32 = 20_000;
        let (mut producer, mut consumer) = frame_buffer_pair(1024);

        let writer = std::thread::spawn(move || {
            for n in 0..FRAMES {
                fill(&mut producer, (n % 251) as u8);
                producer.swap_and_mark_ready();
            }
        });

        let mut seen = 0u32;
        while !writer.is_finished() || consumer.is_ready() {
            if let Some(frame) = consumer.take_ready() {
                let first = frame[0];
                assert!(frame.iter().all(|&b| b == first), "torn frame observed");
                seen += 1;
            }
        }
        writer.join().unwrap();
        assert!(seen > 0);
    }
}
