//! Service cadence of the link: decides, once per cycle, whether enough time
//! has passed since the previous `poll` to call it again.
//!
//! The cadence is checked independently of the frame-read timeout, so the link
//! timers fire on schedule whether or not frames are arriving.

/// Last service timestamp and minimum interval of one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollCadence {
    last_service_ms: Option<u64>,
    min_interval_ms: u32,
}

impl PollCadence {
    /// A fresh cadence is due immediately.
    pub const fn new(min_interval_ms: u32) -> Self {
        Self {
            last_service_ms: None,
            min_interval_ms,
        }
    }

    /// `true` once at least `min_interval_ms` elapsed since the last service.
    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_service_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.min_interval_ms as u64,
        }
    }

    /// Record a service call at `now_ms`.
    pub fn mark_serviced(&mut self, now_ms: u64) {
        self.last_service_ms = Some(now_ms);
    }

    /// Check and record in one step. Returns `true` when the caller must service now.
    pub fn try_service(&mut self, now_ms: u64) -> bool {
        if !self.is_due(now_ms) {
            return false;
        }
        self.mark_serviced(now_ms);
        true
    }

    pub fn last_service_ms(&self) -> Option<u64> {
        self.last_service_ms
    }

    pub fn min_interval_ms(&self) -> u32 {
        self.min_interval_ms
    }
}
