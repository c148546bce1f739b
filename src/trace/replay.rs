//! Driving an engine from a trace

use crate::activity::Interaction;
use crate::engine::Engine;
use crate::page::PageSnapshot;
use crate::record::OutgoingRecord;
use crate::trace::event::{TraceEvent, TraceEventKind};
use crate::transport::Transport;

/// Replays trace events against one engine and the page they describe.
///
/// The engine is started at the first event's time. Before each event is
/// applied, every timer tick that fell due since the previous event runs
/// against the page as it was.
pub struct TraceReplayer<T: Transport> {
    engine: Engine<T>,
    page: PageSnapshot,
    started: bool,
}

impl<T: Transport> TraceReplayer<T> {
    /// `page` is the layout in effect until the trace's first `layout` event
    pub fn new(engine: Engine<T>, page: PageSnapshot) -> Self {
        Self {
            engine,
            page,
            started: false,
        }
    }

    /// Apply one event. Returns the record emitted by it, if any.
    pub fn apply(&mut self, event: &TraceEvent) -> Option<OutgoingRecord> {
        let now = event.at_ms;
        if !self.started {
            self.started = true;
            self.engine.start(now);
        }
        self.engine.advance_to(now, &self.page);

        match &event.kind {
            TraceEventKind::Layout {
                url,
                viewport,
                sections,
            } => {
                if let Some(url) = url {
                    self.page.url = url.clone();
                }
                self.page.viewport = *viewport;
                self.page.sections = sections.clone();
                None
            }
            TraceEventKind::PointerMove => {
                self.engine
                    .on_interaction(now, &self.page, Interaction::PointerMove)
            }
            TraceEventKind::Scroll { scroll_y } => {
                self.page.scroll_to(*scroll_y);
                self.engine.on_interaction(now, &self.page, Interaction::Scroll)
            }
            TraceEventKind::TransportOpen => self.engine.on_transport_ready(now, &self.page),
            TraceEventKind::Tick => None,
            TraceEventKind::Unload => {
                self.engine.shutdown();
                None
            }
        }
    }

    /// Apply every event in order, collecting emitted records
    pub fn replay(&mut self, events: &[TraceEvent]) -> Vec<OutgoingRecord> {
        events.iter().filter_map(|event| self.apply(event)).collect()
    }

    pub fn engine(&self) -> &Engine<T> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<T> {
        &mut self.engine
    }

    pub fn page(&self) -> &PageSnapshot {
        &self.page
    }

    pub fn into_engine(self) -> Engine<T> {
        self.engine
    }
}
