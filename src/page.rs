//! Page abstraction
//!
//! The engine only needs three things from the host page: its URL, the current
//! viewport, and the trackable sections in document order. Hosts that bridge a
//! live DOM implement [`Page`]; everything else uses [`PageSnapshot`].

use crate::geometry::{ElementBounds, Viewport};
use serde::{Deserialize, Serialize};

/// A trackable page section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionElement {
    /// Stable DOM identifier
    pub id: String,
    /// Human-readable label reported on the wire
    pub name: String,
    /// Document-space vertical extent
    #[serde(flatten)]
    pub bounds: ElementBounds,
}

impl SectionElement {
    pub fn new(id: impl Into<String>, name: impl Into<String>, top: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            bounds: ElementBounds::new(top, height),
        }
    }
}

/// Read access to the page the engine is observing
pub trait Page {
    /// Current page URL
    fn url(&self) -> &str;

    /// Current viewport
    fn viewport(&self) -> Viewport;

    /// Candidate sections, in document order
    fn sections(&self) -> &[SectionElement];
}

/// An owned point-in-time view of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub viewport: Viewport,
    #[serde(default)]
    pub sections: Vec<SectionElement>,
}

impl PageSnapshot {
    /// An empty page at `url` with a viewport of the given height
    pub fn new(url: impl Into<String>, viewport_height: f64) -> Self {
        Self {
            url: url.into(),
            viewport: Viewport::new(0.0, viewport_height),
            sections: Vec::new(),
        }
    }

    pub fn with_sections(mut self, sections: Vec<SectionElement>) -> Self {
        self.sections = sections;
        self
    }

    pub fn scroll_to(&mut self, scroll_y: f64) {
        self.viewport.scroll_y = scroll_y;
    }
}

impl Page for PageSnapshot {
    fn url(&self) -> &str {
        &self.url
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn sections(&self) -> &[SectionElement] {
        &self.sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_deserializes_flattened_bounds() {
        let json = r#"{
            "url": "https://example.com/pricing",
            "viewport": { "scroll_y": 120.0, "height": 900.0 },
            "sections": [
                { "id": "intro", "name": "Intro", "top": 0.0, "height": 600.0 }
            ]
        }"#;

        let page: PageSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(page.url(), "https://example.com/pricing");
        assert_eq!(page.viewport().scroll_y, 120.0);
        assert_eq!(page.sections()[0].bounds, ElementBounds::new(0.0, 600.0));
    }

    #[test]
    fn test_scroll_to_moves_viewport_only() {
        let mut page = PageSnapshot::new("https://example.com", 800.0)
            .with_sections(vec![SectionElement::new("a", "A", 0.0, 400.0)]);
        page.scroll_to(350.0);

        assert_eq!(page.viewport(), Viewport::new(350.0, 800.0));
        assert_eq!(page.sections().len(), 1);
    }
}
