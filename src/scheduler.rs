//! Emission scheduling
//!
//! The scheduler decides when the accumulated measurements go out and builds
//! the outgoing record: every module contributes in order, then identity and
//! context fields are merged in. The first record of a page view that the
//! transport accepts also carries the environment snapshot.

use crate::environment::EnvironmentProbe;
use crate::error::TelemetryError;
use crate::modules::{MeasurementModule, Module};
use crate::page::Page;
use crate::record::OutgoingRecord;
use crate::timer::Millis;
use crate::transport::Transport;
use uuid::Uuid;

/// Throttle and record assembly for emissions
pub struct EmissionScheduler {
    visitor_id: String,
    min_interval_ms: Millis,
    last_sent_at: Millis,
    ready: bool,
    first_emission: bool,
    emissions: u64,
    environment: Box<dyn EnvironmentProbe>,
}

impl EmissionScheduler {
    pub fn new(
        visitor_id: impl Into<String>,
        min_interval_ms: Millis,
        environment: Box<dyn EnvironmentProbe>,
    ) -> Self {
        Self {
            visitor_id: visitor_id.into(),
            min_interval_ms,
            last_sent_at: 0,
            ready: false,
            first_emission: true,
            emissions: 0,
            environment,
        }
    }

    /// Begin the throttle window at engine start
    pub fn start(&mut self, now: Millis) {
        self.last_sent_at = now;
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn visitor_id(&self) -> &str {
        &self.visitor_id
    }

    pub fn last_sent_at(&self) -> Millis {
        self.last_sent_at
    }

    /// Number of records handed to the transport successfully
    pub fn emissions(&self) -> u64 {
        self.emissions
    }

    /// Whether an interaction at `now` may emit
    pub fn should_emit(&self, now: Millis) -> bool {
        self.ready && now.saturating_sub(self.last_sent_at) >= self.min_interval_ms
    }

    /// Collect every module's contribution and send the record.
    ///
    /// `record` is left empty for the next window. `last_sent_at` only moves
    /// when the transport accepted the payload.
    pub fn emit<T: Transport + ?Sized>(
        &mut self,
        now: Millis,
        modules: &mut [Module],
        record: &mut OutgoingRecord,
        page: &dyn Page,
        transport: &mut T,
    ) -> Result<OutgoingRecord, TelemetryError> {
        for module in modules.iter_mut() {
            module.on_send_data(record, now);
        }

        let mut outgoing = std::mem::take(record);
        outgoing.uuid = self.visitor_id.clone();
        outgoing.url = page.url().to_string();
        outgoing.request_uuid = Uuid::new_v4().to_string();

        // Enrichment stays pending until a record carrying it is delivered
        if self.first_emission {
            match self.environment.detect() {
                Some(env) => outgoing.apply_environment(env),
                None => log::debug!("no environment snapshot for first emission"),
            }
        }

        let payload = outgoing.to_json()?;
        transport.send(&payload)?;

        self.first_emission = false;
        self.last_sent_at = now;
        self.emissions += 1;
        log::info!(
            "emitted record {} at {now} ({} sections)",
            outgoing.request_uuid,
            outgoing.sections.as_ref().map_or(0, Vec::len)
        );
        Ok(outgoing)
    }
}

impl std::fmt::Debug for EmissionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmissionScheduler")
            .field("visitor_id", &self.visitor_id)
            .field("min_interval_ms", &self.min_interval_ms)
            .field("last_sent_at", &self.last_sent_at)
            .field("ready", &self.ready)
            .field("first_emission", &self.first_emission)
            .field("emissions", &self.emissions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::environment::StaticEnvironment;
    use crate::page::{PageSnapshot, SectionElement};
    use crate::record::EnvironmentSnapshot;
    use crate::transport::MemoryTransport;

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn send(&mut self, _payload: &str) -> Result<(), TelemetryError> {
            Err(TelemetryError::TransportError("socket closed".to_string()))
        }
    }

    fn environment() -> Box<dyn EnvironmentProbe> {
        Box::new(StaticEnvironment(Some(EnvironmentSnapshot {
            browser_name: "firefox".to_string(),
            os: Some("Linux".to_string()),
            browser_type: "browser".to_string(),
            browser_version: Some("121.0.0".to_string()),
            referrer: Some("https://search.example/".to_string()),
        })))
    }

    fn started_modules() -> Vec<Module> {
        let mut modules = Module::from_config(&EngineConfig::default());
        for module in modules.iter_mut() {
            module.start(0);
        }
        modules
    }

    fn page() -> PageSnapshot {
        PageSnapshot::new("https://example.com/article", 800.0)
            .with_sections(vec![SectionElement::new("intro", "Intro", 0.0, 600.0)])
    }

    #[test]
    fn test_not_ready_never_emits() {
        let mut scheduler = EmissionScheduler::new("v", 1_000, environment());
        scheduler.start(0);
        assert!(!scheduler.should_emit(60_000));

        scheduler.mark_ready();
        assert!(!scheduler.should_emit(999));
        assert!(scheduler.should_emit(1_000));
    }

    #[test]
    fn test_first_emission_is_enriched_once() {
        let mut scheduler = EmissionScheduler::new("visitor-1", 1_000, environment());
        let mut modules = started_modules();
        let mut record = OutgoingRecord::default();
        let mut transport = MemoryTransport::new();
        scheduler.start(0);
        scheduler.mark_ready();

        let first = scheduler
            .emit(0, &mut modules, &mut record, &page(), &mut transport)
            .unwrap();
        assert_eq!(first.uuid, "visitor-1");
        assert_eq!(first.url, "https://example.com/article");
        assert_eq!(first.ts, Some(0));
        assert_eq!(first.sections, Some(Vec::new()));
        assert_eq!(first.browser.as_deref(), Some("firefox"));
        assert_eq!(first.referrer.as_deref(), Some("https://search.example/"));

        let second = scheduler
            .emit(1_500, &mut modules, &mut record, &page(), &mut transport)
            .unwrap();
        assert!(!second.is_enriched());
        assert_eq!(second.ts, Some(1_500));
        assert_ne!(first.request_uuid, second.request_uuid);

        assert_eq!(transport.queued().len(), 2);
        assert_eq!(scheduler.emissions(), 2);
        assert_eq!(scheduler.last_sent_at(), 1_500);
        assert_eq!(record, OutgoingRecord::default());
    }

    #[test]
    fn test_missing_environment_is_not_an_error() {
        let mut scheduler = EmissionScheduler::new("v", 1_000, Box::new(StaticEnvironment(None)));
        let mut modules = started_modules();
        let mut record = OutgoingRecord::default();
        let mut transport = MemoryTransport::new();
        scheduler.mark_ready();

        let sent = scheduler
            .emit(10, &mut modules, &mut record, &page(), &mut transport)
            .unwrap();
        assert!(!sent.is_enriched());
    }

    #[test]
    fn test_failed_send_keeps_throttle_open() {
        let mut scheduler = EmissionScheduler::new("v", 1_000, environment());
        let mut modules = started_modules();
        let mut record = OutgoingRecord::default();
        scheduler.start(0);
        scheduler.mark_ready();

        let result = scheduler.emit(5_000, &mut modules, &mut record, &page(), &mut FailingTransport);
        assert!(matches!(result, Err(TelemetryError::TransportError(_))));
        assert_eq!(scheduler.last_sent_at(), 0);
        assert_eq!(scheduler.emissions(), 0);
        assert!(scheduler.should_emit(5_001));
    }

    #[test]
    fn test_enrichment_survives_failed_first_send() {
        struct FlakyTransport {
            failures_left: u32,
            inner: MemoryTransport,
        }

        impl Transport for FlakyTransport {
            fn send(&mut self, payload: &str) -> Result<(), TelemetryError> {
                if self.failures_left > 0 {
                    self.failures_left -= 1;
                    return Err(TelemetryError::TransportError("connecting".to_string()));
                }
                self.inner.send(payload)
            }
        }

        let mut scheduler = EmissionScheduler::new("v", 1_000, environment());
        let mut modules = started_modules();
        let mut record = OutgoingRecord::default();
        let mut transport = FlakyTransport {
            failures_left: 1,
            inner: MemoryTransport::new(),
        };
        scheduler.start(0);
        scheduler.mark_ready();

        assert!(scheduler
            .emit(0, &mut modules, &mut record, &page(), &mut transport)
            .is_err());

        let delivered = scheduler
            .emit(1_000, &mut modules, &mut record, &page(), &mut transport)
            .unwrap();
        assert!(delivered.is_enriched());
        assert_eq!(delivered.browser.as_deref(), Some("firefox"));

        let later = scheduler
            .emit(2_000, &mut modules, &mut record, &page(), &mut transport)
            .unwrap();
        assert!(!later.is_enriched());
        assert_eq!(transport.inner.queued().len(), 2);
    }

    #[test]
    fn test_payload_is_wire_json() {
        let mut scheduler = EmissionScheduler::new("v", 1_000, environment());
        let mut modules = started_modules();
        let mut record = OutgoingRecord::default();
        let mut transport = MemoryTransport::new();
        scheduler.mark_ready();

        scheduler
            .emit(250, &mut modules, &mut record, &page(), &mut transport)
            .unwrap();

        let payload: serde_json::Value = serde_json::from_str(&transport.queued()[0]).unwrap();
        assert_eq!(payload["uuid"], "v");
        assert_eq!(payload["ts"], 250);
        assert!(payload["request_uuid"].is_string());
        assert!(payload["sections"].as_array().unwrap().is_empty());
        assert_eq!(payload["os"], "Linux");
    }
}
