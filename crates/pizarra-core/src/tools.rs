//! Drawing parameters driven by the toolbar controls.

use serde::{Deserialize, Serialize};

use crate::records::Rgb;

/// Color strokes take while the eraser is active.
pub const BACKGROUND_COLOR: Rgb = Rgb::WHITE;

/// Default brush width in surface units.
pub const DEFAULT_BRUSH_WIDTH: f64 = 5.0;
/// Default eraser width in surface units.
pub const DEFAULT_ERASER_WIDTH: f64 = 20.0;
/// Default text size in surface units.
pub const DEFAULT_FONT_SIZE: f64 = 20.0;

/// Smallest width or font size a control may set.
const MIN_SIZE: f64 = 1.0;

/// Current tool parameters.
///
/// The eraser is a flag layered on top of drawing, not a separate tool: it
/// only changes the color and width of emitted strokes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Color picked by the user.
    pub color: Rgb,
    /// Brush width.
    brush_width: f64,
    /// Whether the eraser overrides the brush.
    eraser: bool,
    /// Eraser width.
    eraser_width: f64,
    /// Whether the text tool is selected.
    text_tool: bool,
    /// Text size.
    font_size: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            color: Rgb::BLACK,
            brush_width: DEFAULT_BRUSH_WIDTH,
            eraser: false,
            eraser_width: DEFAULT_ERASER_WIDTH,
            text_tool: false,
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl ToolSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a drawing color. Picking a color switches back to the brush.
    pub fn set_color(&mut self, color: Rgb) {
        self.color = color;
        self.eraser = false;
    }

    pub fn set_brush_width(&mut self, width: f64) {
        self.brush_width = sanitize_size(width, self.brush_width);
    }

    pub fn set_eraser_width(&mut self, width: f64) {
        self.eraser_width = sanitize_size(width, self.eraser_width);
    }

    pub fn set_font_size(&mut self, size: f64) {
        self.font_size = sanitize_size(size, self.font_size);
    }

    /// Flip the eraser. Turning it on or off always leaves the text tool.
    pub fn toggle_eraser(&mut self) {
        self.eraser = !self.eraser;
        self.text_tool = false;
    }

    /// Flip the text tool. The eraser is always switched off.
    pub fn toggle_text_tool(&mut self) {
        self.text_tool = !self.text_tool;
        self.eraser = false;
    }

    pub fn brush_width(&self) -> f64 {
        self.brush_width
    }

    pub fn eraser_width(&self) -> f64 {
        self.eraser_width
    }

    pub fn font_size(&self) -> f64 {
        self.font_size
    }

    pub fn is_eraser(&self) -> bool {
        self.eraser
    }

    pub fn is_text_tool(&self) -> bool {
        self.text_tool
    }

    /// Color a stroke drawn right now takes.
    pub fn stroke_color(&self) -> Rgb {
        if self.eraser { BACKGROUND_COLOR } else { self.color }
    }

    /// Width a stroke drawn right now takes.
    pub fn stroke_width(&self) -> f64 {
        if self.eraser { self.eraser_width } else { self.brush_width }
    }
}

fn sanitize_size(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value.max(MIN_SIZE) } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tools = ToolSettings::new();
        assert_eq!(tools.stroke_color(), Rgb::BLACK);
        assert!((tools.stroke_width() - DEFAULT_BRUSH_WIDTH).abs() < f64::EPSILON);
        assert!(!tools.is_eraser());
        assert!(!tools.is_text_tool());
    }

    #[test]
    fn test_eraser_overrides_color_and_width() {
        let mut tools = ToolSettings::new();
        tools.set_color(Rgb::new(200, 10, 10));
        tools.set_eraser_width(30.0);
        tools.toggle_eraser();
        assert_eq!(tools.stroke_color(), BACKGROUND_COLOR);
        assert!((tools.stroke_width() - 30.0).abs() < f64::EPSILON);

        tools.set_color(Rgb::new(0, 0, 255));
        assert!(!tools.is_eraser());
        assert_eq!(tools.stroke_color(), Rgb::new(0, 0, 255));
    }

    #[test]
    fn test_eraser_and_text_tool_exclusive() {
        let mut tools = ToolSettings::new();
        tools.toggle_text_tool();
        assert!(tools.is_text_tool());
        tools.toggle_eraser();
        assert!(tools.is_eraser());
        assert!(!tools.is_text_tool());
        tools.toggle_text_tool();
        assert!(tools.is_text_tool());
        assert!(!tools.is_eraser());
    }

    #[test]
    fn test_sizes_sanitized() {
        let mut tools = ToolSettings::new();
        tools.set_brush_width(0.0);
        assert!((tools.brush_width() - 1.0).abs() < f64::EPSILON);
        tools.set_font_size(f64::NAN);
        assert!((tools.font_size() - DEFAULT_FONT_SIZE).abs() < f64::EPSILON);
    }
}
