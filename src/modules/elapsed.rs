//! Elapsed-time tracking
//!
//! Reports how long the visitor has been engaged since the previous emission.
//! Inactivity pauses the counter; the next emission after an inactive spell
//! only counts time since the visitor came back.

use crate::modules::MeasurementModule;
use crate::record::OutgoingRecord;
use crate::timer::Millis;

/// Self-resetting engaged-time counter
#[derive(Debug, Clone, Default)]
pub struct ElapsedTimeTracker {
    origin: Option<Millis>,
}

impl ElapsedTimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start of the current counting span, if counting
    pub fn origin(&self) -> Option<Millis> {
        self.origin
    }
}

impl MeasurementModule for ElapsedTimeTracker {
    fn name(&self) -> &'static str {
        "elapsed_time"
    }

    fn start(&mut self, now: Millis) {
        self.origin = Some(now);
    }

    fn on_send_data(&mut self, record: &mut OutgoingRecord, now: Millis) {
        let Some(origin) = self.origin else {
            return;
        };
        record.ts = Some(now.saturating_sub(origin));
        self.origin = Some(now);
    }

    fn on_user_inactive(&mut self, _record: &mut OutgoingRecord, _now: Millis) {
        self.origin = None;
    }

    fn on_user_reactive(&mut self, _record: &mut OutgoingRecord, now: Millis) {
        self.origin = Some(now);
    }
}
