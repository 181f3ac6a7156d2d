//! Conversion between logical surface coordinates and normalized fractions.
//!
//! Every client divides by the same fixed surface size, so a fraction means
//! the same spot for everyone regardless of their viewport or zoom.

use kurbo::{Point, Size};

/// Fixed dimensions of the shared logical surface.
pub const SURFACE_SIZE: Size = Size::new(5000.0, 5000.0);

/// Convert a surface point to a resolution-independent fraction.
///
/// Points outside the surface produce fractions outside `[0, 1]`; they are
/// kept as is.
pub fn to_fraction(point: Point) -> Point {
    Point::new(point.x / SURFACE_SIZE.width, point.y / SURFACE_SIZE.height)
}

/// Convert a fraction back to surface coordinates.
pub fn from_fraction(fraction: Point) -> Point {
    Point::new(
        fraction.x * SURFACE_SIZE.width,
        fraction.y * SURFACE_SIZE.height,
    )
}

/// Whether a surface point lies on the logical surface.
pub fn contains(point: Point) -> bool {
    (0.0..=SURFACE_SIZE.width).contains(&point.x) && (0.0..=SURFACE_SIZE.height).contains(&point.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_within_surface() {
        for &(x, y) in &[(0.0, 0.0), (100.0, 100.0), (150.0, 120.0), (4999.9, 0.3), (1234.5678, 4321.1)] {
            let p = Point::new(x, y);
            let back = from_fraction(to_fraction(p));
            assert!((back.x - p.x).abs() < 1e-9);
            assert!((back.y - p.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_no_clamping() {
        let f = to_fraction(Point::new(-250.0, 7500.0));
        assert!((f.x - -0.05).abs() < 1e-12);
        assert!((f.y - 1.5).abs() < 1e-12);
        let p = from_fraction(Point::new(1.2, -0.1));
        assert!((p.x - 6000.0).abs() < 1e-9);
        assert!((p.y - -500.0).abs() < 1e-9);
    }

    #[test]
    fn test_contains() {
        assert!(contains(Point::new(0.0, 0.0)));
        assert!(contains(Point::new(5000.0, 2500.0)));
        assert!(!contains(Point::new(-0.1, 10.0)));
        assert!(!contains(Point::new(10.0, 5000.1)));
    }
}
