//! Activity / inactivity state machine
//!
//! The monitor owns the visitor's activity state. A recurring poll moves it to
//! `Inactive` once no qualifying interaction has happened for the inactivity
//! window; the next interaction moves it back. Each transition is broadcast to
//! every measurement module in order.

use crate::modules::{MeasurementModule, Module};
use crate::record::OutgoingRecord;
use crate::timer::{IntervalTimer, Millis};
use serde::{Deserialize, Serialize};

/// Visitor activity state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    #[default]
    Active,
    Inactive,
}

/// Qualifying DOM interactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    PointerMove,
    Scroll,
}

/// What an interaction did to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionOutcome {
    /// The visitor came back; this interaction must not emit
    Reactivated,
    /// Ordinary interaction while active; the caller may emit
    Interacted,
}

/// Owner of the activity state and the inactivity poll
#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    state: ActivityState,
    last_interacted_at: Millis,
    inactivity_window_ms: Millis,
    poll_timer: IntervalTimer,
}

impl ActivityMonitor {
    pub fn new(inactivity_window_ms: Millis, poll_interval_ms: Millis) -> Self {
        Self {
            state: ActivityState::Active,
            last_interacted_at: 0,
            inactivity_window_ms,
            poll_timer: IntervalTimer::new(poll_interval_ms),
        }
    }

    /// Begin polling. The visitor counts as having just interacted.
    pub fn start(&mut self, now: Millis) {
        self.state = ActivityState::Active;
        self.last_interacted_at = now;
        self.poll_timer.start(now);
    }

    pub fn shutdown(&mut self) {
        self.poll_timer.stop();
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ActivityState::Active
    }

    pub fn last_interacted_at(&self) -> Millis {
        self.last_interacted_at
    }

    pub fn next_poll(&self) -> Option<Millis> {
        self.poll_timer.next_due()
    }

    /// Run the inactivity poll if it is due at `now`. Returns whether it fired.
    pub fn fire_poll(
        &mut self,
        now: Millis,
        modules: &mut [Module],
        record: &mut OutgoingRecord,
    ) -> bool {
        match self.poll_timer.fire_if_due(now) {
            Some(due) => {
                self.check_inactivity(due, modules, record);
                true
            }
            None => false,
        }
    }

    /// Drop the polls due at or before `now` while the visitor is inactive.
    /// Those polls cannot change anything. Returns how many were dropped.
    pub fn skip_idle_polls(&mut self, now: Millis) -> u64 {
        if self.state == ActivityState::Active {
            return 0;
        }
        self.poll_timer.skip_through(now)
    }

    /// Move to `Inactive` if the visitor has been quiet for the inactivity
    /// window. Returns whether the transition happened; an already inactive
    /// visitor never transitions again.
    pub fn check_inactivity(
        &mut self,
        now: Millis,
        modules: &mut [Module],
        record: &mut OutgoingRecord,
    ) -> bool {
        if self.state == ActivityState::Inactive {
            return false;
        }
        if now.saturating_sub(self.last_interacted_at) < self.inactivity_window_ms {
            return false;
        }

        self.state = ActivityState::Inactive;
        self.last_interacted_at = now;
        log::debug!("visitor inactive at {now}");
        for module in modules.iter_mut() {
            module.on_user_inactive(record, now);
        }
        true
    }

    /// Register a qualifying interaction.
    ///
    /// Only an interaction while already active moves `last_interacted_at`;
    /// a reactivation keeps the stamp taken when the visitor went inactive.
    pub fn record_interaction(
        &mut self,
        interaction: Interaction,
        now: Millis,
        modules: &mut [Module],
        record: &mut OutgoingRecord,
    ) -> InteractionOutcome {
        if self.state == ActivityState::Inactive {
            self.state = ActivityState::Active;
            log::debug!("visitor reactivated by {interaction:?} at {now}");
            for module in modules.iter_mut() {
                module.on_user_reactive(record, now);
            }
            return InteractionOutcome::Reactivated;
        }

        self.last_interacted_at = now;
        log::trace!("{interaction:?} at {now}");
        InteractionOutcome::Interacted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn setup() -> (ActivityMonitor, Vec<Module>, OutgoingRecord) {
        let config = EngineConfig::default();
        let mut modules = Module::from_config(&config);
        for module in modules.iter_mut() {
            module.start(0);
        }
        let mut monitor = ActivityMonitor::new(2_000, 100);
        monitor.start(0);
        (monitor, modules, OutgoingRecord::default())
    }

    fn elapsed_origin(modules: &[Module]) -> Option<Millis> {
        modules[0].as_elapsed_time().and_then(|m| m.origin())
    }

    #[test]
    fn test_starts_active() {
        let (monitor, _, _) = setup();
        assert_eq!(monitor.state(), ActivityState::Active);
        assert_eq!(monitor.next_poll(), Some(100));
    }

    #[test]
    fn test_goes_inactive_after_window() {
        let (mut monitor, mut modules, mut record) = setup();

        assert!(!monitor.check_inactivity(1_999, &mut modules, &mut record));
        assert!(monitor.is_active());

        assert!(monitor.check_inactivity(2_000, &mut modules, &mut record));
        assert_eq!(monitor.state(), ActivityState::Inactive);
        assert_eq!(monitor.last_interacted_at(), 2_000);
        assert_eq!(elapsed_origin(&modules), None);
        assert!(!modules[1].as_section_dwell().unwrap().is_scanning());
    }

    #[test]
    fn test_inactivity_transition_is_idempotent() {
        let (mut monitor, mut modules, mut record) = setup();

        assert!(monitor.check_inactivity(2_500, &mut modules, &mut record));
        // Re-arm the elapsed tracker behind the monitor's back; a second
        // broadcast would clear it again.
        modules[0].on_user_reactive(&mut record, 2_600);
        assert!(!monitor.check_inactivity(9_000, &mut modules, &mut record));
        assert_eq!(elapsed_origin(&modules), Some(2_600));
    }

    #[test]
    fn test_interaction_postpones_inactivity() {
        let (mut monitor, mut modules, mut record) = setup();

        let outcome =
            monitor.record_interaction(Interaction::PointerMove, 1_500, &mut modules, &mut record);
        assert_eq!(outcome, InteractionOutcome::Interacted);
        assert!(!monitor.check_inactivity(3_000, &mut modules, &mut record));
        assert!(monitor.check_inactivity(3_500, &mut modules, &mut record));
    }

    #[test]
    fn test_reactivation() {
        let (mut monitor, mut modules, mut record) = setup();
        monitor.check_inactivity(2_000, &mut modules, &mut record);

        let outcome =
            monitor.record_interaction(Interaction::Scroll, 10_000, &mut modules, &mut record);
        assert_eq!(outcome, InteractionOutcome::Reactivated);
        assert!(monitor.is_active());
        assert_eq!(elapsed_origin(&modules), Some(10_000));
        assert!(modules[1].as_section_dwell().unwrap().is_scanning());

        assert_eq!(monitor.last_interacted_at(), 2_000);

        let outcome =
            monitor.record_interaction(Interaction::Scroll, 10_050, &mut modules, &mut record);
        assert_eq!(outcome, InteractionOutcome::Interacted);
        assert_eq!(monitor.last_interacted_at(), 10_050);
        assert!(!monitor.check_inactivity(10_100, &mut modules, &mut record));
    }

    #[test]
    fn test_reactivation_alone_does_not_hold_the_visitor() {
        let (mut monitor, mut modules, mut record) = setup();
        monitor.check_inactivity(2_000, &mut modules, &mut record);
        monitor.record_interaction(Interaction::PointerMove, 10_000, &mut modules, &mut record);
        assert!(monitor.is_active());

        // measured from the inactivity stamp, the window has long passed
        assert!(monitor.check_inactivity(10_100, &mut modules, &mut record));
        assert_eq!(monitor.last_interacted_at(), 10_100);
    }

    #[test]
    fn test_idle_polls_are_skipped_only_while_inactive() {
        let (mut monitor, mut modules, mut record) = setup();
        assert_eq!(monitor.skip_idle_polls(10_000), 0);
        assert_eq!(monitor.next_poll(), Some(100));

        monitor.check_inactivity(2_000, &mut modules, &mut record);
        assert_eq!(monitor.skip_idle_polls(10_000), 100);
        assert_eq!(monitor.next_poll(), Some(10_100));
    }

    #[test]
    fn test_poll_fires_on_schedule() {
        let (mut monitor, mut modules, mut record) = setup();

        assert!(!monitor.fire_poll(50, &mut modules, &mut record));
        let mut fired = 0;
        while monitor.fire_poll(2_000, &mut modules, &mut record) {
            fired += 1;
        }
        assert_eq!(fired, 20);
        assert_eq!(monitor.state(), ActivityState::Inactive);

        monitor.shutdown();
        assert_eq!(monitor.next_poll(), None);
    }
}
