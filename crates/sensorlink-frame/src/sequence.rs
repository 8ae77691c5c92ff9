/// Tracks the shared sequence number on the host side.
///
/// The device increments one `u8` counter per envelope across all sensor
/// streams, wrapping 255 → 0. A jump larger than one means envelopes were
/// dropped somewhere between the capture path and the host.
#[derive(Debug, Default, Clone)]
pub struct SequenceTracker {
    last: Option<u8>,
    lost: u64,
    received: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an envelope and return how many were skipped before it.
    ///
    /// The first envelope after construction or [`reset`](Self::reset) never
    /// reports a gap. A repeated sequence number is treated as a wrap of 255
    /// lost envelopes, which is the only reading a modular counter allows.
    pub fn observe(&mut self, sequence: u8) -> u8 {
        let gap = match self.last {
            Some(last) => sequence.wrapping_sub(last).wrapping_sub(1),
            None => 0,
        };
        self.last = Some(sequence);
        self.received += 1;
        self.lost += u64::from(gap);
        gap
    }

    /// Forget the last sequence number, e.g. after sending a start command.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }

    /// Total envelopes inferred lost since construction.
    pub fn lost(&self) -> u64 {
        self.lost
    }

    /// Total envelopes observed since construction.
    pub fn received(&self) -> u64 {
        self.received
    }
}
