//! Camera state: zoom scale + pan offset, and the screen ↔ world transform.
//!
//! `screen = world * zoom + pan`. The canvas is infinite, so pan is never
//! clamped; zoom is clamped to `[min_zoom, max_zoom]`.

use crate::config::LayoutConfig;
use kurbo::{Point, Rect, Size, Vec2};

/// Multiplicative step used by keyboard / button zoom.
pub const ZOOM_STEP: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f64,
    pub pan: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
        }
    }
}

pub fn screen_to_world(p: Point, pan: Vec2, zoom: f64) -> Point {
    ((p.to_vec2() - pan) / zoom).to_point()
}

pub fn world_to_screen(p: Point, pan: Vec2, zoom: f64) -> Point {
    (p.to_vec2() * zoom + pan).to_point()
}

impl Viewport {
    pub fn screen_to_world(&self, p: Point) -> Point {
        screen_to_world(p, self.pan, self.zoom)
    }

    pub fn world_to_screen(&self, p: Point) -> Point {
        world_to_screen(p, self.pan, self.zoom)
    }

    /// Zoom by `delta_factor` while keeping the world point under
    /// `screen_anchor` fixed on screen. Returns `false` when the clamped
    /// change is negligible and nothing moved.
    pub fn process_zoom(
        &mut self,
        delta_factor: f64,
        screen_anchor: Point,
        config: &LayoutConfig,
    ) -> bool {
        let new_zoom = (self.zoom * delta_factor).clamp(config.min_zoom, config.max_zoom);
        if (new_zoom - self.zoom).abs() < config.zoom_epsilon {
            return false;
        }
        // Solve with the old zoom, then re-anchor with the new one.
        let world_anchor = self.screen_to_world(screen_anchor);
        self.pan = screen_anchor.to_vec2() - world_anchor.to_vec2() * new_zoom;
        log::trace!(
            "zoom {:.4} -> {:.4} anchored at {:?}",
            self.zoom,
            new_zoom,
            screen_anchor
        );
        self.zoom = new_zoom;
        true
    }

    /// One keyboard-sized zoom step in or out around `screen_anchor`.
    pub fn zoom_by_step(
        &mut self,
        zoom_in: bool,
        screen_anchor: Point,
        config: &LayoutConfig,
    ) -> bool {
        let factor = if zoom_in { ZOOM_STEP } else { 1.0 / ZOOM_STEP };
        self.process_zoom(factor, screen_anchor, config)
    }

    /// Set an absolute zoom (clamped), anchored at the screen origin: the
    /// world point under `(0, 0)` stays there.
    pub fn set_zoom(&mut self, zoom: f64, config: &LayoutConfig) {
        let new_zoom = zoom.clamp(config.min_zoom, config.max_zoom);
        self.pan *= new_zoom / self.zoom;
        self.zoom = new_zoom;
    }

    /// Pan by a screen-space vector.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Pan by separate components (trackpad scroll sources).
    pub fn pan_xy(&mut self, dx: f64, dy: f64) {
        self.pan_by(Vec2::new(dx, dy));
    }

    /// Center `content` (world space) in a screen of `screen` size at the
    /// current zoom. Used to derive the session's initial camera.
    pub fn fit_content(&mut self, content: Rect, screen: Size) {
        let screen_center = Vec2::new(screen.width / 2.0, screen.height / 2.0);
        self.pan = screen_center - content.center().to_vec2() * self.zoom;
    }
}
