use std::sync::atomic::{AtomicU64, Ordering};

/// Frame counters written from the capture context and read anywhere.
#[derive(Debug, Default)]
pub struct CaptureStats {
    completed: AtomicU64,
    malformed: AtomicU64,
    overwritten: AtomicU64,
    deferred: AtomicU64,
}

/// Point-in-time copy of [`CaptureStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSnapshot {
    /// Frames published to the consumer.
    pub completed: u64,
    /// Frames dropped for a wrong line count.
    pub malformed: u64,
    /// Published frames replaced before the consumer took them.
    pub overwritten: u64,
    /// Complete frames dropped because the consumer was still reading.
    pub deferred: u64,
}

impl CaptureStats {
    pub(crate) fn record_completed(&self, overwrote_unread: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if overwrote_unread {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            overwritten: self.overwritten.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
        }
    }
}
