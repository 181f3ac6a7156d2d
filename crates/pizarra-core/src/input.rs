//! Unified pointer input for mouse and touch devices.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Mouse button identifiers. Touches report as `Left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Where a pointer interaction is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerPhase {
    Start,
    Move,
    End,
    /// The pointer left the drawing area.
    Leave,
}

/// A device-independent pointer sample in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub position: Point,
    pub phase: PointerPhase,
    pub button: MouseButton,
}

impl PointerEvent {
    pub fn new(position: Point, phase: PointerPhase) -> Self {
        Self {
            position,
            phase,
            button: MouseButton::Left,
        }
    }

    pub fn start(position: Point) -> Self {
        Self::new(position, PointerPhase::Start)
    }

    pub fn moved(position: Point) -> Self {
        Self::new(position, PointerPhase::Move)
    }

    pub fn end(position: Point) -> Self {
        Self::new(position, PointerPhase::End)
    }

    pub fn leave(position: Point) -> Self {
        Self::new(position, PointerPhase::Leave)
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }
}

/// Keys the text prompt reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextKey {
    Char(char),
    Backspace,
    /// Commit the prompt.
    Enter,
    /// Discard the prompt.
    Escape,
}

/// Something the touch tracker turned a raw touch list into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Pointer(PointerEvent),
    Pinch { anchor: Point, factor: f64 },
}

/// Turns raw touch lists into pointer events (one finger) and pinch zooms
/// (two fingers).
#[derive(Debug, Clone, Default)]
pub struct TouchTracker {
    /// Last single-finger position, while a one-finger interaction is live.
    last_single: Option<Point>,
    /// Distance between the first two fingers at the previous sample.
    last_span: Option<f64>,
    /// Set once two fingers are down; cleared only when every finger lifts.
    multi_touch: bool,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current list of active touches.
    pub fn update(&mut self, touches: &[Point]) -> Option<Gesture> {
        match touches {
            [] => {
                self.last_span = None;
                self.multi_touch = false;
                self.last_single
                    .take()
                    .map(|p| Gesture::Pointer(PointerEvent::end(p)))
            }
            [single] => {
                self.last_span = None;
                if self.multi_touch {
                    return None;
                }
                let event = if self.last_single.is_some() {
                    PointerEvent::moved(*single)
                } else {
                    PointerEvent::start(*single)
                };
                self.last_single = Some(*single);
                Some(Gesture::Pointer(event))
            }
            [a, b, ..] => {
                self.multi_touch = true;
                // A second finger ends any one-finger interaction first.
                if let Some(p) = self.last_single.take() {
                    self.last_span = Some(a.distance(*b));
                    return Some(Gesture::Pointer(PointerEvent::end(p)));
                }
                let span = a.distance(*b);
                let previous = self.last_span.replace(span);
                match previous {
                    Some(prev) if prev > 0.0 && span > 0.0 => Some(Gesture::Pinch {
                        anchor: a.midpoint(*b),
                        factor: span / prev,
                    }),
                    _ => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_builders() {
        let e = PointerEvent::start(Point::new(1.0, 2.0)).with_button(MouseButton::Middle);
        assert_eq!(e.phase, PointerPhase::Start);
        assert_eq!(e.button, MouseButton::Middle);
        assert_eq!(PointerEvent::moved(Point::ZERO).button, MouseButton::Left);
    }

    #[test]
    fn test_single_touch_maps_to_pointer() {
        let mut touch = TouchTracker::new();
        let start = touch.update(&[Point::new(10.0, 10.0)]);
        assert_eq!(start, Some(Gesture::Pointer(PointerEvent::start(Point::new(10.0, 10.0)))));

        let moved = touch.update(&[Point::new(12.0, 11.0)]);
        assert_eq!(moved, Some(Gesture::Pointer(PointerEvent::moved(Point::new(12.0, 11.0)))));

        let end = touch.update(&[]);
        assert_eq!(end, Some(Gesture::Pointer(PointerEvent::end(Point::new(12.0, 11.0)))));
        assert_eq!(touch.update(&[]), None);
    }

    #[test]
    fn test_two_fingers_pinch() {
        let mut touch = TouchTracker::new();
        assert_eq!(touch.update(&[Point::new(0.0, 0.0), Point::new(100.0, 0.0)]), None);

        match touch.update(&[Point::new(0.0, 0.0), Point::new(200.0, 0.0)]) {
            Some(Gesture::Pinch { anchor, factor }) => {
                assert_eq!(anchor, Point::new(100.0, 0.0));
                assert!((factor - 2.0).abs() < 1e-12);
            }
            other => panic!("expected pinch, got {other:?}"),
        }
    }

    #[test]
    fn test_lifting_one_finger_after_pinch_does_not_draw() {
        let mut touch = TouchTracker::new();
        touch.update(&[Point::new(0.0, 0.0), Point::new(100.0, 0.0)]);
        touch.update(&[Point::new(0.0, 0.0), Point::new(150.0, 0.0)]);

        assert_eq!(touch.update(&[Point::new(0.0, 0.0)]), None);
        assert_eq!(touch.update(&[Point::new(3.0, 1.0)]), None);
        assert_eq!(touch.update(&[]), None);

        let next = touch.update(&[Point::new(7.0, 7.0)]);
        assert_eq!(next, Some(Gesture::Pointer(PointerEvent::start(Point::new(7.0, 7.0)))));
    }

    #[test]
    fn test_second_finger_ends_stroke() {
        let mut touch = TouchTracker::new();
        touch.update(&[Point::new(5.0, 5.0)]);
        let g = touch.update(&[Point::new(5.0, 5.0), Point::new(50.0, 5.0)]);
        assert_eq!(g, Some(Gesture::Pointer(PointerEvent::end(Point::new(5.0, 5.0)))));

        match touch.update(&[Point::new(0.0, 5.0), Point::new(90.0, 5.0)]) {
            Some(Gesture::Pinch { factor, .. }) => assert!((factor - 2.0).abs() < 1e-12),
            other => panic!("expected pinch, got {other:?}"),
        }
    }
}
