//! interact.trace.v1 event definition

use crate::geometry::Viewport;
use crate::page::SectionElement;
use crate::timer::Millis;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Current trace schema version
pub const SCHEMA_VERSION: &str = "interact.trace.v1";

/// One timestamped page event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Optional per-event schema tag; must match [`SCHEMA_VERSION`] when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Page clock time of the event
    pub at_ms: Millis,
    #[serde(flatten)]
    pub kind: TraceEventKind,
}

/// What happened at `at_ms`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEventKind {
    /// The page was laid out (again)
    Layout {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        viewport: Viewport,
        #[serde(default)]
        sections: Vec<SectionElement>,
    },
    PointerMove,
    /// The viewport scrolled to a new offset
    Scroll { scroll_y: f64 },
    /// The transport finished connecting
    TransportOpen,
    /// Time passes with nothing else happening
    Tick,
    /// The page is being unloaded
    Unload,
}

impl TraceEventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            TraceEventKind::Layout { .. } => "layout",
            TraceEventKind::PointerMove => "pointer_move",
            TraceEventKind::Scroll { .. } => "scroll",
            TraceEventKind::TransportOpen => "transport_open",
            TraceEventKind::Tick => "tick",
            TraceEventKind::Unload => "unload",
        }
    }
}

impl TraceEvent {
    pub fn new(at_ms: Millis, kind: TraceEventKind) -> Self {
        TraceEvent {
            schema_version: None,
            at_ms,
            kind,
        }
    }

    pub fn layout(at_ms: Millis, viewport: Viewport, sections: Vec<SectionElement>) -> Self {
        Self::new(
            at_ms,
            TraceEventKind::Layout {
                url: None,
                viewport,
                sections,
            },
        )
    }

    pub fn pointer_move(at_ms: Millis) -> Self {
        Self::new(at_ms, TraceEventKind::PointerMove)
    }

    pub fn scroll(at_ms: Millis, scroll_y: f64) -> Self {
        Self::new(at_ms, TraceEventKind::Scroll { scroll_y })
    }

    pub fn transport_open(at_ms: Millis) -> Self {
        Self::new(at_ms, TraceEventKind::TransportOpen)
    }

    pub fn tick(at_ms: Millis) -> Self {
        Self::new(at_ms, TraceEventKind::Tick)
    }

    pub fn unload(at_ms: Millis) -> Self {
        Self::new(at_ms, TraceEventKind::Unload)
    }

    /// Set the page URL on a layout event; other events are unchanged
    pub fn with_url(mut self, new_url: impl Into<String>) -> Self {
        if let TraceEventKind::Layout { url, .. } = &mut self.kind {
            *url = Some(new_url.into());
        }
        self
    }

    /// Validate a single event in isolation
    pub fn validate(&self) -> Result<(), TraceValidationError> {
        if let Some(version) = &self.schema_version {
            if version != SCHEMA_VERSION {
                return Err(TraceValidationError::InvalidSchemaVersion {
                    expected: SCHEMA_VERSION.to_string(),
                    actual: version.clone(),
                });
            }
        }

        match &self.kind {
            TraceEventKind::Layout {
                viewport, sections, ..
            } => {
                check_geometry("viewport.scroll_y", viewport.scroll_y)?;
                check_geometry("viewport.height", viewport.height)?;

                let mut seen = HashSet::new();
                for section in sections {
                    if section.id.trim().is_empty() {
                        return Err(TraceValidationError::EmptySectionId);
                    }
                    if !seen.insert(section.id.as_str()) {
                        return Err(TraceValidationError::DuplicateSectionId(section.id.clone()));
                    }
                    check_geometry("section.top", section.bounds.top)?;
                    check_geometry("section.height", section.bounds.height)?;
                }
                Ok(())
            }
            TraceEventKind::Scroll { scroll_y } => check_geometry("scroll_y", *scroll_y),
            _ => Ok(()),
        }
    }
}

fn check_geometry(field: &'static str, value: f64) -> Result<(), TraceValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(TraceValidationError::InvalidGeometry { field, value });
    }
    Ok(())
}

/// Validation errors for trace events
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TraceValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Invalid geometry: {field} must be finite and non-negative, got {value}")]
    InvalidGeometry { field: &'static str, value: f64 },

    #[error("Section id must not be empty")]
    EmptySectionId,

    #[error("Duplicate section id: {0}")]
    DuplicateSectionId(String),

    #[error("Event time went backwards: {at_ms} after {previous}")]
    OutOfOrder { at_ms: Millis, previous: Millis },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_every_kind() {
        let cases = [
            (
                r#"{"at_ms":0,"type":"layout","url":"https://example.com/","viewport":{"height":800},"sections":[{"id":"intro","name":"Intro","top":0,"height":600}]}"#,
                "layout",
            ),
            (r#"{"at_ms":5,"type":"pointer_move"}"#, "pointer_move"),
            (r#"{"at_ms":6,"type":"scroll","scroll_y":240.5}"#, "scroll"),
            (r#"{"at_ms":7,"type":"transport_open"}"#, "transport_open"),
            (r#"{"at_ms":8,"type":"tick"}"#, "tick"),
            (r#"{"at_ms":9,"type":"unload"}"#, "unload"),
        ];

        for (json, expected) in cases {
            let event: TraceEvent = serde_json::from_str(json).unwrap();
            assert_eq!(event.kind.type_name(), expected);
        }
    }

    #[test]
    fn test_layout_fields() {
        let event: TraceEvent = serde_json::from_str(
            r#"{"at_ms":12,"type":"layout","viewport":{"scroll_y":100,"height":800},"sections":[{"id":"a","name":"A","top":50,"height":400}]}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            TraceEvent::layout(
                12,
                Viewport::new(100.0, 800.0),
                vec![SectionElement::new("a", "A", 50.0, 400.0)]
            )
        );
    }

    #[test]
    fn test_serialize_uses_type_tag() {
        let json = serde_json::to_string(&TraceEvent::scroll(40, 300.0)).unwrap();
        assert!(json.contains(r#""type":"scroll""#));
        assert!(json.contains(r#""at_ms":40"#));
        assert!(!json.contains("schema_version"));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<TraceEvent>(r#"{"at_ms":1,"type":"resize"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_schema_version() {
        let mut event = TraceEvent::tick(0);
        event.schema_version = Some(SCHEMA_VERSION.to_string());
        assert!(event.validate().is_ok());

        event.schema_version = Some("interact.trace.v0".to_string());
        assert!(matches!(
            event.validate(),
            Err(TraceValidationError::InvalidSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_validate_geometry() {
        assert!(TraceEvent::scroll(0, -1.0).validate().is_err());
        assert!(TraceEvent::scroll(0, f64::NAN).validate().is_err());

        let bad_viewport = TraceEvent::layout(0, Viewport::new(0.0, f64::INFINITY), vec![]);
        assert_eq!(
            bad_viewport.validate(),
            Err(TraceValidationError::InvalidGeometry {
                field: "viewport.height",
                value: f64::INFINITY,
            })
        );
    }

    #[test]
    fn test_validate_section_ids() {
        let viewport = Viewport::new(0.0, 800.0);
        let duplicate = TraceEvent::layout(
            0,
            viewport,
            vec![
                SectionElement::new("a", "A", 0.0, 100.0),
                SectionElement::new("a", "Again", 100.0, 100.0),
            ],
        );
        assert_eq!(
            duplicate.validate(),
            Err(TraceValidationError::DuplicateSectionId("a".to_string()))
        );

        let empty = TraceEvent::layout(0, viewport, vec![SectionElement::new(" ", "A", 0.0, 1.0)]);
        assert_eq!(empty.validate(), Err(TraceValidationError::EmptySectionId));
    }
}
