//! Rendering surface abstraction.
//!
//! Everything here works in logical surface coordinates; the view transform
//! is applied when the surface is presented, not when it is drawn on.

use kurbo::{Point, Size};

use crate::records::Rgb;

/// A bitmap-like target for drawing primitives.
pub trait RenderSurface {
    /// Draw a round-capped straight line.
    fn draw_segment(&mut self, from: Point, to: Point, color: Rgb, width: f64);

    /// Draw a single-line glyph run whose baseline starts at `anchor`.
    fn draw_text(&mut self, anchor: Point, text: &str, font_size: f64, color: Rgb);

    /// Wipe the whole surface to blank.
    fn clear(&mut self);
}

/// One recorded drawing primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Segment {
        from: Point,
        to: Point,
        color: Rgb,
        width: f64,
    },
    Text {
        anchor: Point,
        text: String,
        font_size: f64,
        color: Rgb,
    },
}

/// Retained list of everything drawn since the last clear.
#[derive(Debug, Clone)]
pub struct DisplayList {
    size: Size,
    commands: Vec<DrawCommand>,
    clear_count: usize,
}

impl Default for DisplayList {
    fn default() -> Self {
        Self::new(crate::normalize::SURFACE_SIZE)
    }
}

impl DisplayList {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            commands: Vec::new(),
            clear_count: 0,
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// How many times the surface has been cleared.
    pub fn clear_count(&self) -> usize {
        self.clear_count
    }

    /// Replay the recorded primitives onto another surface.
    pub fn replay(&self, target: &mut impl RenderSurface) {
        for command in &self.commands {
            match command {
                DrawCommand::Segment { from, to, color, width } => {
                    target.draw_segment(*from, *to, *color, *width);
                }
                DrawCommand::Text { anchor, text, font_size, color } => {
                    target.draw_text(*anchor, text, *font_size, *color);
                }
            }
        }
    }

    fn is_zero_sized(&self) -> bool {
        self.size.width <= 0.0 || self.size.height <= 0.0
    }
}

impl RenderSurface for DisplayList {
    fn draw_segment(&mut self, from: Point, to: Point, color: Rgb, width: f64) {
        if self.is_zero_sized() {
            return;
        }
        self.commands.push(DrawCommand::Segment { from, to, color, width });
    }

    fn draw_text(&mut self, anchor: Point, text: &str, font_size: f64, color: Rgb) {
        if self.is_zero_sized() {
            return;
        }
        self.commands.push(DrawCommand::Text {
            anchor,
            text: text.to_string(),
            font_size,
            color,
        });
    }

    fn clear(&mut self) {
        if self.is_zero_sized() {
            return;
        }
        self.commands.clear();
        self.clear_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_clears() {
        let mut list = DisplayList::default();
        list.draw_segment(Point::new(1.0, 1.0), Point::new(2.0, 2.0), Rgb::BLACK, 3.0);
        list.draw_text(Point::new(5.0, 5.0), "hi", 12.0, Rgb::WHITE);
        assert_eq!(list.commands().len(), 2);

        list.clear();
        assert!(list.commands().is_empty());
        assert_eq!(list.clear_count(), 1);
    }

    #[test]
    fn test_zero_sized_is_noop() {
        let mut list = DisplayList::new(Size::ZERO);
        list.draw_segment(Point::ZERO, Point::new(1.0, 1.0), Rgb::BLACK, 1.0);
        list.clear();
        assert!(list.commands().is_empty());
        assert_eq!(list.clear_count(), 0);
    }

    #[test]
    fn test_replay() {
        let mut list = DisplayList::default();
        list.draw_segment(Point::ZERO, Point::new(10.0, 0.0), Rgb::BLACK, 2.0);
        list.draw_text(Point::new(3.0, 4.0), "x", 10.0, Rgb::BLACK);

        let mut copy = DisplayList::default();
        list.replay(&mut copy);
        assert_eq!(copy.commands(), list.commands());
    }
}
