//! Recurring timer handles
//!
//! The engine never sleeps. Each recurring callback is an [`IntervalTimer`] that
//! remembers when it is next due; the host advances page time and the engine
//! fires whatever fell due. Starting restarts the phase, stopping only cancels
//! future ticks, and both are idempotent.

/// Milliseconds on the page's monotonic clock
pub type Millis = u64;

/// A recurring timer handle with a fixed period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTimer {
    period_ms: Millis,
    next_due: Option<Millis>,
}

impl IntervalTimer {
    /// Create a stopped timer. A zero period is clamped to 1 ms so a running
    /// timer always moves forward.
    pub fn new(period_ms: Millis) -> Self {
        Self {
            period_ms: period_ms.max(1),
            next_due: None,
        }
    }

    /// Start (or restart) the timer; the first tick is one period after `now`.
    /// A tick that would fall past the end of the clock never comes.
    pub fn start(&mut self, now: Millis) {
        self.next_due = now.checked_add(self.period_ms);
    }

    /// Cancel future ticks. Stopping a stopped timer is a no-op.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn period_ms(&self) -> Millis {
        self.period_ms
    }

    /// When the next tick is due, if the timer is running
    pub fn next_due(&self) -> Option<Millis> {
        self.next_due
    }

    /// Consume the pending tick if it is due at or before `now`.
    ///
    /// Returns the tick's own due time so callbacks observe the instant they
    /// were scheduled for, not the instant the host caught up.
    pub fn fire_if_due(&mut self, now: Millis) -> Option<Millis> {
        match self.next_due {
            Some(due) if due <= now => {
                self.next_due = due.checked_add(self.period_ms);
                Some(due)
            }
            _ => None,
        }
    }

    /// Drop every tick due at or before `now` without firing them.
    /// Returns how many were dropped.
    pub fn skip_through(&mut self, now: Millis) -> u64 {
        match self.next_due {
            Some(due) if due <= now => {
                let skipped = (now - due) / self.period_ms + 1;
                self.next_due = skipped
                    .checked_mul(self.period_ms)
                    .and_then(|offset| due.checked_add(offset));
                skipped
            }
            _ => 0,
        }
    }
}
