//! Per-section dwell time
//!
//! Every scan picks the single most visible section on the page. While that
//! section is more visible than the threshold it accumulates dwell time; any
//! other section that was accumulating stops. Entries live for one emission
//! window: reporting them empties the list.

use crate::config::DwellOnInactive;
use crate::geometry::percent_visible;
use crate::modules::MeasurementModule;
use crate::page::{Page, SectionElement};
use crate::record::{OutgoingRecord, SectionReport};
use crate::timer::{IntervalTimer, Millis};
use serde::Serialize;

/// Dwell bookkeeping for one section within the current emission window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionDwellEntry {
    pub id: String,
    pub name: String,
    /// Whether this entry is the one currently accumulating time
    pub tracking: bool,
    /// Start of the open tracking span
    pub time_start: Option<Millis>,
    /// Accumulated dwell time in milliseconds
    pub time_spent: Millis,
}

impl SectionDwellEntry {
    fn new(section: &SectionElement) -> Self {
        Self {
            id: section.id.clone(),
            name: section.name.clone(),
            tracking: false,
            time_start: None,
            time_spent: 0,
        }
    }

    /// Close the open span into `time_spent` and stop tracking
    fn stop(&mut self, now: Millis) {
        if let Some(start) = self.time_start.take() {
            self.time_spent += now.saturating_sub(start);
        }
        self.tracking = false;
    }

    /// Mark as tracking. An already-open span is folded into `time_spent` and
    /// reopened so the accumulated figure stays current.
    fn track(&mut self, now: Millis) {
        self.tracking = true;
        if let Some(start) = self.time_start {
            self.time_spent += now.saturating_sub(start);
        }
        self.time_start = Some(now);
    }

    fn discard(&mut self) {
        self.tracking = false;
        self.time_start = None;
        self.time_spent = 0;
    }
}

/// Tracks which section holds the visitor's attention
#[derive(Debug, Clone)]
pub struct SectionDwellTracker {
    entries: Vec<SectionDwellEntry>,
    scan_timer: IntervalTimer,
    threshold_pct: u8,
    on_inactive: DwellOnInactive,
}

impl SectionDwellTracker {
    pub fn new(scan_interval_ms: Millis, threshold_pct: u8, on_inactive: DwellOnInactive) -> Self {
        Self {
            entries: Vec::new(),
            scan_timer: IntervalTimer::new(scan_interval_ms),
            threshold_pct,
            on_inactive,
        }
    }

    /// Entries accumulated in the current emission window, in creation order
    pub fn entries(&self) -> &[SectionDwellEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &str) -> Option<&SectionDwellEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// The entry currently accumulating time, if any
    pub fn tracking_entry(&self) -> Option<&SectionDwellEntry> {
        self.entries.iter().find(|e| e.tracking)
    }

    pub fn is_scanning(&self) -> bool {
        self.scan_timer.is_running()
    }

    /// One visibility scan.
    ///
    /// Ties on visibility go to the section that comes first in document order.
    pub fn scan(&mut self, page: &dyn Page, now: Millis) {
        let viewport = page.viewport();
        let mut best: Option<(&SectionElement, u8)> = None;
        for section in page.sections() {
            let pct = percent_visible(section.bounds, viewport);
            if pct > best.map_or(0, |(_, max)| max) {
                best = Some((section, pct));
            }
        }

        let selected = best.filter(|(_, pct)| *pct > self.threshold_pct);
        let Some((section, pct)) = selected else {
            log::trace!("section scan at {now}: nothing above {}%", self.threshold_pct);
            self.stop_tracking(now);
            return;
        };

        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.tracking && e.id != section.id)
        {
            entry.stop(now);
        }

        let idx = match self.entries.iter().position(|e| e.id == section.id) {
            Some(idx) => idx,
            None => {
                log::debug!("section {} first seen at {now} ({pct}% visible)", section.id);
                self.entries.push(SectionDwellEntry::new(section));
                self.entries.len() - 1
            }
        };
        self.entries[idx].track(now);
    }

    /// Close every open span
    pub fn stop_tracking(&mut self, now: Millis) {
        for entry in self.entries.iter_mut().filter(|e| e.tracking) {
            entry.stop(now);
        }
    }
}

impl MeasurementModule for SectionDwellTracker {
    fn name(&self) -> &'static str {
        "section_dwell"
    }

    fn start(&mut self, now: Millis) {
        self.scan_timer.start(now);
    }

    fn on_send_data(&mut self, record: &mut OutgoingRecord, now: Millis) {
        self.stop_tracking(now);
        let reports = self
            .entries
            .drain(..)
            .map(|entry| SectionReport {
                nm: entry.name,
                ts: entry.time_spent,
            })
            .collect();
        record.sections = Some(reports);
    }

    fn on_user_inactive(&mut self, _record: &mut OutgoingRecord, now: Millis) {
        self.scan_timer.stop();
        for entry in self.entries.iter_mut().filter(|e| e.tracking) {
            match self.on_inactive {
                DwellOnInactive::Discard => entry.discard(),
                DwellOnInactive::Bank => entry.stop(now),
            }
        }
    }

    fn on_user_reactive(&mut self, _record: &mut OutgoingRecord, now: Millis) {
        self.scan_timer.start(now);
    }

    fn next_tick(&self) -> Option<Millis> {
        self.scan_timer.next_due()
    }

    fn fire_tick(&mut self, page: &dyn Page, now: Millis) -> bool {
        match self.scan_timer.fire_if_due(now) {
            Some(due) => {
                self.scan(page, due);
                true
            }
            None => false,
        }
    }

    fn shutdown(&mut self) {
        self.scan_timer.stop();
    }
}
