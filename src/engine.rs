//! Engine orchestration
//!
//! The engine wires the activity monitor, the emission scheduler and the
//! configured measurement modules around one outgoing record. The host feeds
//! it page events with explicit timestamps; before each event every timer tick
//! that fell due in between is replayed in order.

use crate::activity::{ActivityMonitor, ActivityState, Interaction, InteractionOutcome};
use crate::config::EngineConfig;
use crate::environment::EnvironmentProbe;
use crate::error::TelemetryError;
use crate::modules::{MeasurementModule, Module, SectionDwellTracker};
use crate::page::Page;
use crate::record::OutgoingRecord;
use crate::scheduler::EmissionScheduler;
use crate::timer::Millis;
use crate::transport::Transport;

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Running,
    Stopped,
}

/// Telemetry engine for a single page view
pub struct Engine<T: Transport> {
    config: EngineConfig,
    phase: EnginePhase,
    monitor: ActivityMonitor,
    scheduler: EmissionScheduler,
    modules: Vec<Module>,
    record: OutgoingRecord,
    transport: T,
}

impl<T: Transport> Engine<T> {
    /// Create an engine. The configuration is validated here; nothing runs
    /// until [`Engine::start`].
    pub fn new(
        config: EngineConfig,
        visitor_id: impl Into<String>,
        environment: Box<dyn EnvironmentProbe>,
        transport: T,
    ) -> Result<Self, TelemetryError> {
        config.validate()?;

        Ok(Self {
            monitor: ActivityMonitor::new(config.inactivity_window_ms, config.inactivity_poll_ms),
            scheduler: EmissionScheduler::new(visitor_id, config.min_emit_interval_ms, environment),
            modules: Module::from_config(&config),
            record: OutgoingRecord::default(),
            phase: EnginePhase::Idle,
            config,
            transport,
        })
    }

    /// Start every module and the inactivity poll. Calling it again is a no-op.
    pub fn start(&mut self, now: Millis) {
        if self.phase != EnginePhase::Idle {
            return;
        }
        self.phase = EnginePhase::Running;
        self.scheduler.start(now);
        for module in self.modules.iter_mut() {
            module.start(now);
        }
        self.monitor.start(now);
        log::debug!(
            "engine started at {now} with modules {:?}",
            self.modules.iter().map(|m| m.name()).collect::<Vec<_>>()
        );
    }

    /// Fire every timer tick due at or before `now`, earliest first.
    ///
    /// Module timers run before the inactivity poll when both fall due at the
    /// same instant. Once the visitor is inactive and no module tick is due,
    /// the remaining polls are skipped in one step. Returns the number of
    /// ticks covered, skipped ones included.
    pub fn advance_to(&mut self, now: Millis, page: &dyn Page) -> usize {
        if self.phase != EnginePhase::Running {
            return 0;
        }

        let mut fired: usize = 0;
        loop {
            let module_due = self
                .modules
                .iter()
                .enumerate()
                .filter_map(|(idx, m)| m.next_tick().map(|due| (due, idx)))
                .min();
            let poll_due = self.monitor.next_poll();

            match (module_due, poll_due) {
                (Some((due, idx)), poll) if due <= now && poll.map_or(true, |p| due <= p) => {
                    self.modules[idx].fire_tick(page, due);
                }
                (module, Some(due)) if due <= now => {
                    let module_idle = module.map_or(true, |(m, _)| m > now);
                    if module_idle && self.monitor.state() == ActivityState::Inactive {
                        let skipped = self.monitor.skip_idle_polls(now);
                        fired = fired.saturating_add(usize::try_from(skipped).unwrap_or(usize::MAX));
                        continue;
                    }
                    self.monitor
                        .fire_poll(due, &mut self.modules, &mut self.record);
                }
                _ => break,
            }
            fired = fired.saturating_add(1);
        }

        if fired > 0 {
            log::trace!("advanced to {now}: {fired} ticks");
        }
        fired
    }

    /// The transport is ready. Emits immediately, regardless of the throttle.
    pub fn on_transport_ready(&mut self, now: Millis, page: &dyn Page) -> Option<OutgoingRecord> {
        if self.phase != EnginePhase::Running {
            return None;
        }
        self.advance_to(now, page);
        self.scheduler.mark_ready();
        self.emit(now, page)
    }

    /// A qualifying interaction. Returns the record if one was emitted.
    pub fn on_interaction(
        &mut self,
        now: Millis,
        page: &dyn Page,
        interaction: Interaction,
    ) -> Option<OutgoingRecord> {
        if self.phase != EnginePhase::Running {
            log::trace!("ignoring {interaction:?} while {:?}", self.phase);
            return None;
        }
        self.advance_to(now, page);

        let outcome =
            self.monitor
                .record_interaction(interaction, now, &mut self.modules, &mut self.record);
        if outcome == InteractionOutcome::Interacted && self.scheduler.should_emit(now) {
            return self.emit(now, page);
        }
        None
    }

    /// Page unload: stop every recurring timer. Later events are ignored.
    pub fn shutdown(&mut self) {
        if self.phase == EnginePhase::Stopped {
            return;
        }
        self.monitor.shutdown();
        for module in self.modules.iter_mut() {
            module.shutdown();
        }
        self.phase = EnginePhase::Stopped;
        log::debug!("engine stopped after {} emissions", self.scheduler.emissions());
    }

    fn emit(&mut self, now: Millis, page: &dyn Page) -> Option<OutgoingRecord> {
        match self.scheduler.emit(
            now,
            &mut self.modules,
            &mut self.record,
            page,
            &mut self.transport,
        ) {
            Ok(sent) => Some(sent),
            Err(e) => {
                log::warn!("emission at {now} dropped: {e}");
                None
            }
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn state(&self) -> ActivityState {
        self.monitor.state()
    }

    pub fn visitor_id(&self) -> &str {
        self.scheduler.visitor_id()
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// The section dwell tracker, if configured
    pub fn section_tracker(&self) -> Option<&SectionDwellTracker> {
        self.modules.iter().find_map(Module::as_section_dwell)
    }

    /// Successful emissions so far
    pub fn emissions(&self) -> u64 {
        self.scheduler.emissions()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
