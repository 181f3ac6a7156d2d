//! View transform for the pannable, zoomable drawing surface.
//!
//! The surface is placed on screen by translating it to `offset` and then
//! scaling it by `scale`. Pointer input goes through the inverse of that
//! placement so a drawn point always lands under the cursor.

use kurbo::{Affine, Point, Size, Vec2};

use crate::normalize::SURFACE_SIZE;

/// Smallest allowed zoom scale.
pub const MIN_SCALE: f64 = 0.5;
/// Largest allowed zoom scale.
pub const MAX_SCALE: f64 = 3.0;
/// Scale change applied per wheel notch.
pub const WHEEL_STEP: f64 = 0.1;

/// Per-client pan/zoom parameters. Never transmitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// Zoom scale, always within [`MIN_SCALE`, `MAX_SCALE`].
    scale: f64,
    /// On-screen position of the surface's top-left corner.
    pub offset: Vec2,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Vec2::ZERO,
        }
    }
}

impl ViewState {
    /// Create a view at scale 1 with no offset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a view with the logical surface centered in `viewport`.
    pub fn centered(viewport: Size) -> Self {
        Self {
            scale: 1.0,
            offset: Vec2::new(
                (viewport.width - SURFACE_SIZE.width) / 2.0,
                (viewport.height - SURFACE_SIZE.height) / 2.0,
            ),
        }
    }

    /// Create a view with an explicit scale (clamped) and offset.
    pub fn with_scale(scale: f64, offset: Vec2) -> Self {
        Self {
            scale: clamp_scale(scale),
            offset,
        }
    }

    /// Current zoom scale.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Placement transform: surface coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.scale)
    }

    /// Input transform: screen coordinates to surface coordinates.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.scale) * Affine::translate(-self.offset)
    }

    /// Map a pointer position to logical surface coordinates.
    pub fn screen_to_surface(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.offset.x) / self.scale,
            (screen.y - self.offset.y) / self.scale,
        )
    }

    /// Map a surface point to its on-screen position (used for overlays such
    /// as the text prompt caret).
    pub fn surface_to_screen(&self, surface: Point) -> Point {
        Point::new(
            surface.x * self.scale + self.offset.x,
            surface.y * self.scale + self.offset.y,
        )
    }

    /// Move the surface so its top-left sits at `offset`.
    pub fn pan_to(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    /// Move the surface by a screen-space delta.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Set a new scale, keeping the surface point under `anchor` fixed on
    /// screen.
    pub fn zoom_at(&mut self, anchor: Point, new_scale: f64) {
        let new_scale = clamp_scale(new_scale);
        let ratio = new_scale / self.scale;
        self.offset = Vec2::new(
            anchor.x - (anchor.x - self.offset.x) * ratio,
            anchor.y - (anchor.y - self.offset.y) * ratio,
        );
        self.scale = new_scale;
    }

    /// Apply one wheel notch at `anchor`. Scrolling down (positive delta)
    /// zooms out.
    pub fn wheel(&mut self, anchor: Point, delta_y: f64) {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return;
        }
        let step = if delta_y > 0.0 { -WHEEL_STEP } else { WHEEL_STEP };
        self.zoom_at(anchor, self.scale + step);
    }

    /// Apply a pinch gesture with a multiplicative `factor` at `anchor`.
    pub fn pinch(&mut self, anchor: Point, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        self.zoom_at(anchor, self.scale * factor);
    }
}

fn clamp_scale(scale: f64) -> f64 {
    if scale.is_nan() {
        return 1.0;
    }
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point, b: Point) {
        assert!((a.x - b.x).abs() < 1e-9, "{a:?} != {b:?}");
        assert!((a.y - b.y).abs() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn test_default_view() {
        let view = ViewState::new();
        assert_eq!(view.offset, Vec2::ZERO);
        assert!((view.scale() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_centered_view() {
        let view = ViewState::centered(Size::new(1000.0, 800.0));
        assert!((view.offset.x - (-2000.0)).abs() < f64::EPSILON);
        assert!((view.offset.y - (-2100.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_surface_with_offset_and_scale() {
        let view = ViewState::with_scale(2.0, Vec2::new(50.0, 100.0));
        let surface = view.screen_to_surface(Point::new(250.0, 300.0));
        assert_close(surface, Point::new(100.0, 100.0));
    }

    #[test]
    fn test_matches_affine_transforms() {
        let view = ViewState::with_scale(1.7, Vec2::new(-320.0, 45.0));
        let screen = Point::new(412.0, 87.5);
        assert_close(view.screen_to_surface(screen), view.inverse_transform() * screen);
        let surface = Point::new(3000.0, 12.0);
        assert_close(view.surface_to_screen(surface), view.transform() * surface);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let view = ViewState::with_scale(1.5, Vec2::new(30.0, -20.0));
        let original = Point::new(123.0, 456.0);
        let back = view.surface_to_screen(view.screen_to_surface(original));
        assert_close(back, original);
    }

    #[test]
    fn test_zoom_keeps_cursor_point_fixed() {
        let mut view = ViewState::with_scale(1.0, Vec2::new(-2000.0, -2100.0));
        let cursor = Point::new(400.0, 300.0);
        let before = view.screen_to_surface(cursor);

        view.zoom_at(cursor, 2.3);
        assert_close(view.surface_to_screen(before), cursor);

        view.wheel(cursor, 120.0);
        assert_close(view.surface_to_screen(before), cursor);

        view.pinch(cursor, 0.8);
        assert_close(view.surface_to_screen(before), cursor);
    }

    #[test]
    fn test_scale_clamped() {
        let mut view = ViewState::new();
        for _ in 0..100 {
            view.wheel(Point::new(10.0, 10.0), -1.0);
        }
        assert!((view.scale() - MAX_SCALE).abs() < 1e-9);

        for _ in 0..100 {
            view.pinch(Point::ZERO, 0.5);
        }
        assert!((view.scale() - MIN_SCALE).abs() < 1e-9);

        view.zoom_at(Point::ZERO, f64::NAN);
        assert!(view.scale() >= MIN_SCALE && view.scale() <= MAX_SCALE);
    }

    #[test]
    fn test_wheel_direction() {
        let mut view = ViewState::new();
        view.wheel(Point::ZERO, -3.0);
        assert!((view.scale() - 1.1).abs() < 1e-9);
        view.wheel(Point::ZERO, 3.0);
        view.wheel(Point::ZERO, 3.0);
        assert!((view.scale() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_at_bound_leaves_offset() {
        let mut view = ViewState::with_scale(MAX_SCALE, Vec2::new(10.0, 20.0));
        view.wheel(Point::new(300.0, 300.0), -1.0);
        assert_eq!(view.offset, Vec2::new(10.0, 20.0));
    }

    #[test]
    fn test_pan() {
        let mut view = ViewState::new();
        view.pan_by(Vec2::new(10.0, 20.0));
        view.pan_by(Vec2::new(-4.0, 1.0));
        assert_eq!(view.offset, Vec2::new(6.0, 21.0));
        view.pan_to(Vec2::new(1.0, 2.0));
        assert_eq!(view.offset, Vec2::new(1.0, 2.0));
    }
}
