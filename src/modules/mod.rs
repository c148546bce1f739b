//! Measurement modules
//!
//! A measurement module observes one aspect of engagement and contributes it
//! to the outgoing record when the engine emits. The engine knows nothing about
//! what a module measures: it only calls the lifecycle hooks below, always in
//! the configured module order.

pub mod elapsed;
pub mod sections;

pub use elapsed::ElapsedTimeTracker;
pub use sections::{SectionDwellEntry, SectionDwellTracker};

use crate::config::{EngineConfig, ModuleKind};
use crate::page::Page;
use crate::record::OutgoingRecord;
use crate::timer::Millis;

/// Lifecycle hooks shared by every measurement module.
///
/// All hooks default to no-ops so a module only implements what it needs.
pub trait MeasurementModule {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Called once when the engine starts
    fn start(&mut self, _now: Millis) {}

    /// Contribute this module's measurement to the record being emitted
    fn on_send_data(&mut self, _record: &mut OutgoingRecord, _now: Millis) {}

    /// The visitor has gone inactive
    fn on_user_inactive(&mut self, _record: &mut OutgoingRecord, _now: Millis) {}

    /// The visitor is active again after a period of inactivity
    fn on_user_reactive(&mut self, _record: &mut OutgoingRecord, _now: Millis) {}

    /// When this module's own recurring timer is next due
    fn next_tick(&self) -> Option<Millis> {
        None
    }

    /// Run the module's recurring timer callback if it is due at `now`.
    /// Returns whether a tick fired.
    fn fire_tick(&mut self, _page: &dyn Page, _now: Millis) -> bool {
        false
    }

    /// Stop any recurring timer (page unload)
    fn shutdown(&mut self) {}
}

/// The closed set of modules the engine runs
#[derive(Debug, Clone)]
pub enum Module {
    ElapsedTime(ElapsedTimeTracker),
    SectionDwell(SectionDwellTracker),
}

impl Module {
    pub fn from_kind(kind: ModuleKind, config: &EngineConfig) -> Self {
        match kind {
            ModuleKind::ElapsedTime => Module::ElapsedTime(ElapsedTimeTracker::new()),
            ModuleKind::SectionDwell => Module::SectionDwell(SectionDwellTracker::new(
                config.section_scan_ms,
                config.visibility_threshold_pct,
                config.dwell_on_inactive,
            )),
        }
    }

    /// Build the configured module list, in iteration order
    pub fn from_config(config: &EngineConfig) -> Vec<Module> {
        config
            .modules
            .iter()
            .map(|kind| Module::from_kind(*kind, config))
            .collect()
    }

    pub fn as_section_dwell(&self) -> Option<&SectionDwellTracker> {
        match self {
            Module::SectionDwell(tracker) => Some(tracker),
            _ => None,
        }
    }

    pub fn as_elapsed_time(&self) -> Option<&ElapsedTimeTracker> {
        match self {
            Module::ElapsedTime(tracker) => Some(tracker),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn MeasurementModule {
        match self {
            Module::ElapsedTime(m) => m,
            Module::SectionDwell(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn MeasurementModule {
        match self {
            Module::ElapsedTime(m) => m,
            Module::SectionDwell(m) => m,
        }
    }
}

impl MeasurementModule for Module {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn start(&mut self, now: Millis) {
        self.inner_mut().start(now)
    }

    fn on_send_data(&mut self, record: &mut OutgoingRecord, now: Millis) {
        self.inner_mut().on_send_data(record, now)
    }

    fn on_user_inactive(&mut self, record: &mut OutgoingRecord, now: Millis) {
        self.inner_mut().on_user_inactive(record, now)
    }

    fn on_user_reactive(&mut self, record: &mut OutgoingRecord, now: Millis) {
        self.inner_mut().on_user_reactive(record, now)
    }

    fn next_tick(&self) -> Option<Millis> {
        self.inner().next_tick()
    }

    fn fire_tick(&mut self, page: &dyn Page, now: Millis) -> bool {
        self.inner_mut().fire_tick(page, now)
    }

    fn shutdown(&mut self) {
        self.inner_mut().shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_preserves_order() {
        let config = EngineConfig {
            modules: vec![ModuleKind::SectionDwell, ModuleKind::ElapsedTime],
            ..Default::default()
        };

        let modules = Module::from_config(&config);
        let names: Vec<&str> = modules.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["section_dwell", "elapsed_time"]);
        assert!(modules[0].as_section_dwell().is_some());
        assert!(modules[1].as_elapsed_time().is_some());
    }

    #[test]
    fn test_only_section_dwell_has_a_timer() {
        let mut modules = Module::from_config(&EngineConfig::default());
        for module in modules.iter_mut() {
            module.start(0);
        }

        assert_eq!(modules[0].next_tick(), None);
        assert_eq!(modules[1].next_tick(), Some(100));
    }
}
