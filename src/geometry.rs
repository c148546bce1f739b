//! Viewport visibility
//!
//! All positions are vertical and in document space: an element's `top` is its
//! distance from the top of the document, and the viewport's `scroll_y` is the
//! document offset of its top edge.

use serde::{Deserialize, Serialize};

/// Vertical extent of an element in document coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementBounds {
    /// Document offset of the element's top edge, in CSS pixels
    pub top: f64,
    /// Element height in CSS pixels
    pub height: f64,
}

impl ElementBounds {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// The visible window onto the document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Document offset of the viewport's top edge
    #[serde(default)]
    pub scroll_y: f64,
    /// Viewport height in CSS pixels
    pub height: f64,
}

impl Viewport {
    pub fn new(scroll_y: f64, height: f64) -> Self {
        Self { scroll_y, height }
    }

    pub fn top(&self) -> f64 {
        self.scroll_y
    }

    pub fn bottom(&self) -> f64 {
        self.scroll_y + self.height
    }
}

/// Percentage of the viewport's height covered by the element, in `[0, 100]`.
///
/// Elements that sit entirely inside the viewport, or that cover it entirely,
/// count as 100 regardless of their size. Partially visible elements are
/// measured against the viewport height, not their own. Degenerate geometry
/// (zero, negative or non-finite heights) is reported as not visible.
pub fn percent_visible(element: ElementBounds, viewport: Viewport) -> u8 {
    if !is_measurable(element.height) || !is_measurable(viewport.height) {
        return 0;
    }
    if !element.top.is_finite() || !viewport.scroll_y.is_finite() {
        return 0;
    }

    let (el_top, el_bottom) = (element.top, element.bottom());
    let (vp_top, vp_bottom) = (viewport.top(), viewport.bottom());

    if vp_top > el_bottom || vp_bottom < el_top {
        return 0;
    }

    let inside = el_top >= vp_top && el_bottom <= vp_bottom;
    let covering = el_top <= vp_top && el_bottom >= vp_bottom;
    if inside || covering {
        return 100;
    }

    let clipped_above = (vp_top - el_top).max(0.0);
    let clipped_below = (el_bottom - vp_bottom).max(0.0);
    let visible = element.height - clipped_above - clipped_below;

    let pct = (visible / viewport.height * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

fn is_measurable(height: f64) -> bool {
    height.is_finite() && height > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_above_viewport() {
        let element = ElementBounds::new(0.0, 300.0);
        let viewport = Viewport::new(1000.0, 800.0);
        assert_eq!(percent_visible(element, viewport), 0);
    }

    #[test]
    fn test_element_below_viewport() {
        let element = ElementBounds::new(2000.0, 300.0);
        let viewport = Viewport::new(0.0, 800.0);
        assert_eq!(percent_visible(element, viewport), 0);
    }

    #[test]
    fn test_element_inside_viewport() {
        let element = ElementBounds::new(300.0, 200.0);
        let viewport = Viewport::new(0.0, 800.0);
        assert_eq!(percent_visible(element, viewport), 100);
    }

    #[test]
    fn test_element_flush_with_viewport_top_is_inside() {
        let element = ElementBounds::new(0.0, 200.0);
        let viewport = Viewport::new(0.0, 800.0);
        assert_eq!(percent_visible(element, viewport), 100);
    }

    #[test]
    fn test_element_covering_viewport() {
        let element = ElementBounds::new(-500.0, 3000.0);
        let viewport = Viewport::new(200.0, 800.0);
        assert_eq!(percent_visible(element, viewport), 100);
    }

    #[test]
    fn test_partial_is_relative_to_viewport_height() {
        // 400px of a 1000px element pokes into the bottom of a 1000px viewport
        let element = ElementBounds::new(600.0, 1000.0);
        let viewport = Viewport::new(0.0, 1000.0);
        assert_eq!(percent_visible(element, viewport), 40);

        // Clipped above: element 0..550, viewport 100..1100 -> 450px visible
        let element = ElementBounds::new(0.0, 550.0);
        let viewport = Viewport::new(100.0, 1000.0);
        assert_eq!(percent_visible(element, viewport), 45);
    }

    #[test]
    fn test_partial_rounds_to_nearest() {
        // 333px of 1000 -> 33.3 -> 33; 336px -> 33.6 -> 34
        let viewport = Viewport::new(0.0, 1000.0);
        assert_eq!(percent_visible(ElementBounds::new(667.0, 500.0), viewport), 33);
        assert_eq!(percent_visible(ElementBounds::new(664.0, 500.0), viewport), 34);
    }

    #[test]
    fn test_touching_edge_is_zero() {
        let element = ElementBounds::new(800.0, 100.0);
        let viewport = Viewport::new(0.0, 800.0);
        assert_eq!(percent_visible(element, viewport), 0);
    }

    #[test]
    fn test_degenerate_geometry_is_not_visible() {
        let viewport = Viewport::new(0.0, 800.0);
        assert_eq!(percent_visible(ElementBounds::new(100.0, 0.0), viewport), 0);
        assert_eq!(percent_visible(ElementBounds::new(100.0, -5.0), viewport), 0);
        assert_eq!(percent_visible(ElementBounds::new(100.0, f64::NAN), viewport), 0);

        let element = ElementBounds::new(0.0, 200.0);
        assert_eq!(percent_visible(element, Viewport::new(0.0, 0.0)), 0);
        assert_eq!(percent_visible(element, Viewport::new(f64::INFINITY, 800.0)), 0);
    }
}
