//! Parsing and batch validation of interaction traces

use crate::error::TelemetryError;
use crate::timer::Millis;
use crate::trace::event::*;

/// Adapter for reading interact.trace.v1 input
pub struct TraceAdapter;

impl TraceAdapter {
    /// Parse a JSON string containing an array of TraceEvents
    pub fn parse_array(json: &str) -> Result<Vec<TraceEvent>, TelemetryError> {
        let events: Vec<TraceEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) containing TraceEvents
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<TraceEvent>, TelemetryError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            if let Some(event) = Self::parse_line(line, line_num + 1)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Parse one NDJSON line. Blank lines yield `None`.
    pub fn parse_line(line: &str, line_num: usize) -> Result<Option<TraceEvent>, TelemetryError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<TraceEvent>(trimmed)
            .map(Some)
            .map_err(|e| {
                TelemetryError::ParseError(format!("Failed to parse line {}: {}", line_num, e))
            })
    }

    /// Validate a batch of events.
    ///
    /// Each event is checked on its own, and event times must never decrease.
    /// Only failing events are returned.
    pub fn validate_events(events: &[TraceEvent]) -> Vec<ValidationResult> {
        let mut previous: Option<Millis> = None;
        let mut results = Vec::new();

        for (idx, event) in events.iter().enumerate() {
            let ordering = match previous {
                Some(prev) if event.at_ms < prev => Err(TraceValidationError::OutOfOrder {
                    at_ms: event.at_ms,
                    previous: prev,
                }),
                _ => Ok(()),
            };
            previous = Some(previous.map_or(event.at_ms, |p| p.max(event.at_ms)));

            if let Err(error) = event.validate().and(ordering) {
                results.push(ValidationResult {
                    index: idx,
                    at_ms: event.at_ms,
                    error,
                });
            }
        }

        results
    }

    /// Reject the batch on its first invalid event
    pub fn ensure_valid(events: &[TraceEvent]) -> Result<(), TelemetryError> {
        match Self::validate_events(events).into_iter().next() {
            Some(failure) => Err(TelemetryError::InvalidTrace(format!(
                "event {} (at {} ms): {}",
                failure.index, failure.at_ms, failure.error
            ))),
            None => Ok(()),
        }
    }
}

/// A failed event in a validated batch
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub at_ms: Millis,
    pub error: TraceValidationError,
}
