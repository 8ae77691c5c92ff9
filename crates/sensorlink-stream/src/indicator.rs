/// Which sensor stream a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Image,
    Radar,
}

impl StreamKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Radar => "radar",
        }
    }
}

/// Visible activity hooks, the board LEDs on target.
///
/// Called from the main loop only. All methods default to doing nothing.
pub trait StatusIndicator {
    /// A transmit of `kind` is about to block.
    fn transmit_started(&mut self, _kind: StreamKind) {}

    /// The transmit of `kind` returned, successfully or not.
    fn transmit_finished(&mut self, _kind: StreamKind) {}

    /// A radar burst was drained.
    fn heartbeat(&mut self) {}
}

/// Indicator that shows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullIndicator;

impl StatusIndicator for NullIndicator {}
