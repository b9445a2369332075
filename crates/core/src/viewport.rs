//! Screen <-> document coordinate transform
//!
//! `screen = document * zoom + pan`. Wheel and pinch zoom both go through
//! [`Viewport::zoom_at`], which keeps the document point under the anchor fixed.

use crate::geometry::Point;

/// Map a screen point into document space.
pub fn to_document(screen: Point, zoom: f64, pan: Point) -> Point {
    Point::new((screen.x - pan.x) / zoom, (screen.y - pan.y) / zoom)
}

/// Map a document point onto the screen.
pub fn to_screen(document: Point, zoom: f64, pan: Point) -> Point {
    Point::new(document.x * zoom + pan.x, document.y * zoom + pan.y)
}

/// Pan that keeps `anchor` over the same document point after zooming to `new_zoom`.
pub fn anchored_pan(anchor: Point, zoom: f64, pan: Point, new_zoom: f64) -> Point {
    let fixed = to_document(anchor, zoom, pan);
    Point::new(anchor.x - fixed.x * new_zoom, anchor.y - fixed.y * new_zoom)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    zoom: f64,
    pan: Point,
    min_zoom: f64,
    max_zoom: f64,
    width: f64,
    height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.1, 10.0)
    }
}

impl Viewport {
    pub fn new(min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            zoom: 1.0,
            pan: Point::default(),
            min_zoom,
            max_zoom,
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
    }

    pub fn set_pan(&mut self, pan: Point) {
        self.pan = pan;
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan = self.pan.offset(dx, dy);
    }

    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        if zoom.is_nan() {
            return self.zoom;
        }
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// Set zoom around the viewport origin.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = self.clamp_zoom(zoom);
    }

    pub fn to_document(&self, screen: Point) -> Point {
        to_document(screen, self.zoom, self.pan)
    }

    pub fn to_screen(&self, document: Point) -> Point {
        to_screen(document, self.zoom, self.pan)
    }

    /// Screen pixels expressed as a document-space length at the current zoom.
    pub fn px_to_document(&self, pixels: f64) -> f64 {
        pixels / self.zoom
    }

    /// Anchored zoom: the document point under `anchor` stays under `anchor`.
    pub fn zoom_at(&mut self, target_zoom: f64, anchor: Point) {
        let new_zoom = self.clamp_zoom(target_zoom);
        self.pan = anchored_pan(anchor, self.zoom, self.pan, new_zoom);
        self.zoom = new_zoom;
    }

    /// Wheel zoom: positive `delta_y` (scrolling down) zooms out.
    pub fn wheel_zoom(&mut self, delta_y: f64, anchor: Point, sensitivity: f64) {
        let factor = (-delta_y * sensitivity).exp();
        self.zoom_at(self.zoom * factor, anchor);
    }

    /// Fit a page into the viewport and center it.
    ///
    /// `zoom = min(w * margin / page_w, h * margin / page_h)`, optionally capped at 1.0.
    pub fn fit_page(&mut self, page_width: f64, page_height: f64, margin: f64, cap_at_native: bool) {
        if page_width <= 0.0 || page_height <= 0.0 || self.width <= 0.0 || self.height <= 0.0 {
            return;
        }

        let mut zoom = (self.width * margin / page_width).min(self.height * margin / page_height);
        if cap_at_native {
            zoom = zoom.min(1.0);
        }
        self.zoom = self.clamp_zoom(zoom);

        self.pan = Point::new(
            (self.width - page_width * self.zoom) / 2.0,
            (self.height - page_height * self.zoom) / 2.0,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_document_and_back() {
        let pan = Point::new(40.0, -12.0);
        let doc = to_document(Point::new(140.0, 88.0), 2.0, pan);
        assert_eq!(doc, Point::new(50.0, 50.0));
        assert_eq!(to_screen(doc, 2.0, pan), Point::new(140.0, 88.0));
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut viewport = Viewport::new(0.1, 10.0);
        viewport.zoom_at(100.0, Point::new(10.0, 10.0));
        assert_eq!(viewport.zoom(), 10.0);
        viewport.zoom_at(0.0001, Point::new(10.0, 10.0));
        assert_eq!(viewport.zoom(), 0.1);
    }

    #[test]
    fn test_wheel_down_zooms_out() {
        let mut viewport = Viewport::default();
        viewport.wheel_zoom(100.0, Point::new(0.0, 0.0), 0.0015);
        assert!(viewport.zoom() < 1.0);
        viewport.wheel_zoom(-400.0, Point::new(0.0, 0.0), 0.0015);
        assert!(viewport.zoom() > 1.0);
    }

    #[test]
    fn test_fit_page_centers_and_caps() {
        let mut viewport = Viewport::default();
        viewport.set_size(1000.0, 800.0);

        // Large page: zoom limited by height
        viewport.fit_page(2000.0, 4000.0, 0.95, true);
        assert!((viewport.zoom() - 0.19).abs() < 1e-9);
        let top_left = viewport.to_screen(Point::new(0.0, 0.0));
        let bottom_right = viewport.to_screen(Point::new(2000.0, 4000.0));
        assert!(((top_left.x + bottom_right.x) / 2.0 - 500.0).abs() < 1e-9);
        assert!(((top_left.y + bottom_right.y) / 2.0 - 400.0).abs() < 1e-9);

        // Small page: never zoom past native resolution
        viewport.fit_page(100.0, 100.0, 0.95, true);
        assert_eq!(viewport.zoom(), 1.0);
        viewport.fit_page(100.0, 100.0, 0.95, false);
        assert!((viewport.zoom() - 7.6).abs() < 1e-9);
    }

    #[test]
    fn test_fit_page_ignores_empty_viewport() {
        let mut viewport = Viewport::default();
        viewport.fit_page(500.0, 500.0, 0.95, true);
        assert_eq!(viewport.zoom(), 1.0);
        assert_eq!(viewport.pan(), Point::default());
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            x in -5000.0f64..5000.0,
            y in -5000.0f64..5000.0,
            zoom in 0.1f64..5.0,
            pan_x in -2000.0f64..2000.0,
            pan_y in -2000.0f64..2000.0,
        ) {
            let pan = Point::new(pan_x, pan_y);
            let back = to_screen(to_document(Point::new(x, y), zoom, pan), zoom, pan);
            prop_assert!((back.x - x).abs() < 1e-6);
            prop_assert!((back.y - y).abs() < 1e-6);
        }

        #[test]
        fn prop_anchored_zoom_keeps_anchor(
            ax in 0.0f64..2000.0,
            ay in 0.0f64..2000.0,
            zoom in 0.1f64..5.0,
            new_zoom in 0.1f64..5.0,
            pan_x in -2000.0f64..2000.0,
            pan_y in -2000.0f64..2000.0,
        ) {
            let mut viewport = Viewport::new(0.1, 10.0);
            viewport.set_zoom(zoom);
            viewport.set_pan(Point::new(pan_x, pan_y));
            let anchor = Point::new(ax, ay);

            let before = viewport.to_document(anchor);
            viewport.zoom_at(new_zoom, anchor);
            let after = viewport.to_document(anchor);

            prop_assert!((before.x - after.x).abs() < 1e-6);
            prop_assert!((before.y - after.y).abs() < 1e-6);
        }
    }
}
