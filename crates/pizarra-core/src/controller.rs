//! Interaction mode state machine.
//!
//! The controller turns pointer, wheel, pinch and key input into view changes
//! and [`LocalEdit`]s. It never touches the surface or the network itself;
//! the [`Whiteboard`](crate::whiteboard::Whiteboard) applies what it returns.

use kurbo::{Point, Vec2};

use crate::camera::ViewState;
use crate::input::{MouseButton, PointerEvent, PointerPhase, TextKey};
use crate::normalize;
use crate::records::Rgb;
use crate::tools::ToolSettings;

/// A single-line text prompt anchored on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPrompt {
    anchor: Point,
    buffer: String,
}

impl TextPrompt {
    fn new(anchor: Point) -> Self {
        Self {
            anchor,
            buffer: String::new(),
        }
    }

    /// Surface point the text will be placed at.
    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// On-screen position for the prompt's caret.
    pub fn screen_position(&self, view: &ViewState) -> Point {
        view.surface_to_screen(self.anchor)
    }

    pub fn set_text(&mut self, text: &str) {
        self.buffer.clear();
        self.buffer.extend(text.chars().filter(|c| *c != '\n' && *c != '\r'));
    }

    /// Append a character. Line breaks are dropped; the prompt is single-line.
    pub fn insert(&mut self, c: char) {
        if c != '\n' && c != '\r' {
            self.buffer.push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    fn is_blank(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}

/// Current interaction mode.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Mode {
    #[default]
    Idle,
    /// Freehand drawing; `last` is the previous sample in surface space.
    Drawing { last: Point },
    /// Dragging the surface; `grab` is the pointer position relative to the
    /// surface origin when the drag started.
    Panning { grab: Vec2 },
    /// Text tool selected, with an optional open prompt.
    TextEntry { prompt: Option<TextPrompt> },
}

/// Mode without its payload, for callers that only need to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Idle,
    Drawing,
    Panning,
    TextEntry,
}

/// A change made locally that must be drawn and published.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalEdit {
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

/// Owns the interaction mode and the tool settings.
#[derive(Debug, Clone, Default)]
pub struct ModeController {
    mode: Mode,
    tools: ToolSettings,
}

impl ModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn kind(&self) -> ModeKind {
        match self.mode {
            Mode::Idle => ModeKind::Idle,
            Mode::Drawing { .. } => ModeKind::Drawing,
            Mode::Panning { .. } => ModeKind::Panning,
            Mode::TextEntry { .. } => ModeKind::TextEntry,
        }
    }

    pub fn tools(&self) -> &ToolSettings {
        &self.tools
    }

    /// Mutable access for the color and size setters.
    pub fn tools_mut(&mut self) -> &mut ToolSettings {
        &mut self.tools
    }

    /// The open text prompt, if any.
    pub fn prompt(&self) -> Option<&TextPrompt> {
        match &self.mode {
            Mode::TextEntry { prompt } => prompt.as_ref(),
            _ => None,
        }
    }

    /// Handle a pointer sample. Returns the edit it produced, if any.
    pub fn handle_pointer(&mut self, event: PointerEvent, view: &mut ViewState) -> Option<LocalEdit> {
        let surface_point = view.screen_to_surface(event.position);
        match event.phase {
            PointerPhase::Start => self.pointer_start(event, surface_point, view),
            PointerPhase::Move => match self.mode {
                Mode::Drawing { last } => {
                    self.mode = Mode::Drawing { last: surface_point };
                    Some(LocalEdit::Segment {
                        from: last,
                        to: surface_point,
                        color: self.tools.stroke_color(),
                        width: self.tools.stroke_width(),
                    })
                }
                Mode::Panning { grab } => {
                    view.pan_to(event.position.to_vec2() - grab);
                    None
                }
                _ => None,
            },
            PointerPhase::End => {
                if matches!(self.mode, Mode::Drawing { .. } | Mode::Panning { .. }) {
                    self.mode = Mode::Idle;
                }
                None
            }
            PointerPhase::Leave => {
                if matches!(self.mode, Mode::Drawing { .. }) {
                    self.mode = Mode::Idle;
                }
                None
            }
        }
    }

    fn pointer_start(&mut self, event: PointerEvent, surface_point: Point, view: &ViewState) -> Option<LocalEdit> {
        let on_surface = normalize::contains(surface_point);
        if let Mode::TextEntry { prompt } = &mut self.mode {
            if event.button != MouseButton::Left {
                return None;
            }
            // Tapping elsewhere takes focus away from an open prompt.
            let committed = prompt.take().and_then(|p| self.commit_prompt(p));
            if on_surface {
                self.mode = Mode::TextEntry {
                    prompt: Some(TextPrompt::new(surface_point)),
                };
            }
            return committed;
        }

        if event.button == MouseButton::Left && on_surface {
            self.mode = Mode::Drawing { last: surface_point };
        } else {
            self.mode = Mode::Panning {
                grab: event.position.to_vec2() - view.offset,
            };
        }
        None
    }

    /// Apply a wheel notch. Zoom works in every mode.
    pub fn handle_wheel(&mut self, anchor: Point, delta_y: f64, view: &mut ViewState) {
        let before = view.offset;
        view.wheel(anchor, delta_y);
        self.shift_grab(before - view.offset);
    }

    /// Apply a pinch gesture. Zoom works in every mode.
    pub fn handle_pinch(&mut self, anchor: Point, factor: f64, view: &mut ViewState) {
        let before = view.offset;
        view.pinch(anchor, factor);
        self.shift_grab(before - view.offset);
    }

    // A zoom moves the surface origin; an ongoing pan keeps the surface
    // under the pointer where the zoom left it.
    fn shift_grab(&mut self, delta: Vec2) {
        if let Mode::Panning { grab } = &mut self.mode {
            *grab += delta;
        }
    }

    /// Flip the text tool. Entering cancels any draw or pan in progress;
    /// leaving discards an open prompt.
    pub fn toggle_text_tool(&mut self) {
        self.tools.toggle_text_tool();
        self.mode = if self.tools.is_text_tool() {
            Mode::TextEntry { prompt: None }
        } else {
            Mode::Idle
        };
    }

    /// Flip the eraser. This also leaves the text tool.
    pub fn toggle_eraser(&mut self) {
        self.tools.toggle_eraser();
        if matches!(self.mode, Mode::TextEntry { .. }) {
            self.mode = Mode::Idle;
        }
    }

    /// Feed a key to the open prompt.
    pub fn handle_key(&mut self, key: TextKey) -> Option<LocalEdit> {
        let Mode::TextEntry { prompt } = &mut self.mode else {
            return None;
        };
        let open = prompt.as_mut()?;
        match key {
            TextKey::Char(c) => {
                open.insert(c);
                None
            }
            TextKey::Backspace => {
                open.backspace();
                None
            }
            TextKey::Enter => {
                if open.is_blank() {
                    return None;
                }
                let open = prompt.take()?;
                self.commit_prompt(open)
            }
            TextKey::Escape => {
                *prompt = None;
                None
            }
        }
    }

    /// Replace the open prompt's text, as a host input field would.
    pub fn set_prompt_text(&mut self, text: &str) {
        if let Mode::TextEntry { prompt: Some(open) } = &mut self.mode {
            open.set_text(text);
        }
    }

    /// Close the open prompt without emitting anything.
    pub fn cancel_text(&mut self) {
        if let Mode::TextEntry { prompt } = &mut self.mode {
            *prompt = None;
        }
    }

    /// The prompt lost focus: commit non-blank content and close it.
    pub fn commit_text(&mut self) -> Option<LocalEdit> {
        let Mode::TextEntry { prompt } = &mut self.mode else {
            return None;
        };
        let open = prompt.take()?;
        self.commit_prompt(open)
    }

    fn commit_prompt(&self, prompt: TextPrompt) -> Option<LocalEdit> {
        if prompt.is_blank() {
            return None;
        }
        Some(LocalEdit::Text {
            anchor: prompt.anchor,
            text: prompt.buffer,
            font_size: self.tools.font_size(),
            color: self.tools.color,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::BACKGROUND_COLOR;

    fn setup() -> (ModeController, ViewState) {
        (ModeController::new(), ViewState::new())
    }

    #[test]
    fn test_draw_emits_segments_until_end() {
        let (mut ctl, mut view) = setup();
        assert_eq!(ctl.handle_pointer(PointerEvent::start(Point::new(100.0, 100.0)), &mut view), None);
        assert_eq!(ctl.kind(), ModeKind::Drawing);

        let edit = ctl.handle_pointer(PointerEvent::moved(Point::new(150.0, 120.0)), &mut view);
        assert_eq!(
            edit,
            Some(LocalEdit::Segment {
                from: Point::new(100.0, 100.0),
                to: Point::new(150.0, 120.0),
                color: Rgb::BLACK,
                width: 5.0,
            })
        );

        let edit = ctl.handle_pointer(PointerEvent::moved(Point::new(160.0, 130.0)), &mut view);
        assert!(matches!(edit, Some(LocalEdit::Segment { from, .. }) if from == Point::new(150.0, 120.0)));

        ctl.handle_pointer(PointerEvent::end(Point::new(160.0, 130.0)), &mut view);
        assert_eq!(ctl.kind(), ModeKind::Idle);
        assert_eq!(ctl.handle_pointer(PointerEvent::moved(Point::new(170.0, 140.0)), &mut view), None);
    }

    #[test]
    fn test_leave_ends_stroke() {
        let (mut ctl, mut view) = setup();
        ctl.handle_pointer(PointerEvent::start(Point::new(10.0, 10.0)), &mut view);
        ctl.handle_pointer(PointerEvent::leave(Point::new(10.0, 10.0)), &mut view);
        assert_eq!(ctl.kind(), ModeKind::Idle);
    }

    #[test]
    fn test_drawing_respects_zoom() {
        let (mut ctl, _) = setup();
        let mut view = ViewState::with_scale(2.0, Vec2::new(-100.0, -100.0));
        ctl.handle_pointer(PointerEvent::start(Point::new(100.0, 100.0)), &mut view);
        match ctl.handle_pointer(PointerEvent::moved(Point::new(300.0, 100.0)), &mut view) {
            Some(LocalEdit::Segment { from, to, .. }) => {
                assert_eq!(from, Point::new(100.0, 100.0));
                assert_eq!(to, Point::new(200.0, 100.0));
            }
            other => panic!("expected segment, got {other:?}"),
        }
    }

    #[test]
    fn test_eraser_strokes_use_background() {
        let (mut ctl, mut view) = setup();
        ctl.tools_mut().set_color(Rgb::new(255, 0, 0));
        ctl.toggle_eraser();
        ctl.handle_pointer(PointerEvent::start(Point::new(10.0, 10.0)), &mut view);
        match ctl.handle_pointer(PointerEvent::moved(Point::new(20.0, 10.0)), &mut view) {
            Some(LocalEdit::Segment { color, width, .. }) => {
                assert_eq!(color, BACKGROUND_COLOR);
                assert!((width - ctl.tools().eraser_width()).abs() < f64::EPSILON);
            }
            other => panic!("expected segment, got {other:?}"),
        }
    }

    #[test]
    fn test_background_press_pans() {
        let (mut ctl, _) = setup();
        let mut view = ViewState::with_scale(1.0, Vec2::new(200.0, 200.0));
        ctl.handle_pointer(PointerEvent::start(Point::new(50.0, 50.0)), &mut view);
        assert_eq!(ctl.kind(), ModeKind::Panning);

        ctl.handle_pointer(PointerEvent::moved(Point::new(80.0, 40.0)), &mut view);
        assert_eq!(view.offset, Vec2::new(230.0, 190.0));

        ctl.handle_pointer(PointerEvent::end(Point::new(80.0, 40.0)), &mut view);
        assert_eq!(ctl.kind(), ModeKind::Idle);
    }

    #[test]
    fn test_middle_button_pans_over_surface() {
        let (mut ctl, mut view) = setup();
        let start = PointerEvent::start(Point::new(10.0, 10.0)).with_button(MouseButton::Middle);
        ctl.handle_pointer(start, &mut view);
        assert_eq!(ctl.kind(), ModeKind::Panning);
        let edit = ctl.handle_pointer(PointerEvent::moved(Point::new(20.0, 30.0)), &mut view);
        assert_eq!(edit, None);
        assert_eq!(view.offset, Vec2::new(10.0, 20.0));
    }

    #[test]
    fn test_toggle_text_cancels_stroke() {
        let (mut ctl, mut view) = setup();
        ctl.handle_pointer(PointerEvent::start(Point::new(10.0, 10.0)), &mut view);
        assert_eq!(ctl.kind(), ModeKind::Drawing);

        ctl.toggle_text_tool();
        assert_eq!(ctl.kind(), ModeKind::TextEntry);
        assert_eq!(ctl.handle_pointer(PointerEvent::moved(Point::new(50.0, 50.0)), &mut view), None);

        ctl.toggle_text_tool();
        assert_eq!(ctl.kind(), ModeKind::Idle);
    }

    #[test]
    fn test_text_prompt_commit_on_enter() {
        let (mut ctl, mut view) = setup();
        ctl.toggle_text_tool();
        ctl.handle_pointer(PointerEvent::start(Point::new(40.0, 60.0)), &mut view);
        assert_eq!(ctl.prompt().map(TextPrompt::anchor), Some(Point::new(40.0, 60.0)));

        for c in "hola".chars() {
            ctl.handle_key(TextKey::Char(c));
        }
        ctl.handle_key(TextKey::Char('x'));
        ctl.handle_key(TextKey::Backspace);

        let edit = ctl.handle_key(TextKey::Enter);
        assert_eq!(
            edit,
            Some(LocalEdit::Text {
                anchor: Point::new(40.0, 60.0),
                text: "hola".to_string(),
                font_size: ctl.tools().font_size(),
                color: Rgb::BLACK,
            })
        );
        assert!(ctl.prompt().is_none());
        assert_eq!(ctl.kind(), ModeKind::TextEntry);
    }

    #[test]
    fn test_blank_text_discarded() {
        let (mut ctl, mut view) = setup();
        ctl.toggle_text_tool();
        ctl.handle_pointer(PointerEvent::start(Point::new(40.0, 60.0)), &mut view);
        ctl.set_prompt_text("   ");
        assert_eq!(ctl.handle_key(TextKey::Enter), None);
        assert!(ctl.prompt().is_some());

        assert_eq!(ctl.commit_text(), None);
        assert!(ctl.prompt().is_none());
    }

    #[test]
    fn test_new_tap_commits_previous_prompt() {
        let (mut ctl, mut view) = setup();
        ctl.toggle_text_tool();
        ctl.handle_pointer(PointerEvent::start(Point::new(40.0, 60.0)), &mut view);
        ctl.set_prompt_text("first");

        let edit = ctl.handle_pointer(PointerEvent::start(Point::new(400.0, 600.0)), &mut view);
        assert!(matches!(edit, Some(LocalEdit::Text { ref text, .. }) if text == "first"));
        assert_eq!(ctl.prompt().map(TextPrompt::anchor), Some(Point::new(400.0, 600.0)));
        assert_eq!(ctl.prompt().map(TextPrompt::text), Some(""));
    }

    #[test]
    fn test_toggle_off_discards_prompt() {
        let (mut ctl, mut view) = setup();
        ctl.toggle_text_tool();
        ctl.handle_pointer(PointerEvent::start(Point::new(40.0, 60.0)), &mut view);
        ctl.set_prompt_text("draft");
        ctl.toggle_text_tool();
        assert!(ctl.prompt().is_none());
        assert_eq!(ctl.commit_text(), None);
    }

    #[test]
    fn test_cancel_keeps_text_tool() {
        let (mut ctl, mut view) = setup();
        ctl.toggle_text_tool();
        ctl.handle_pointer(PointerEvent::start(Point::new(40.0, 60.0)), &mut view);
        ctl.handle_key(TextKey::Char('a'));
        ctl.handle_key(TextKey::Char('\n'));
        assert_eq!(ctl.prompt().map(TextPrompt::text), Some("a"));

        ctl.cancel_text();
        assert!(ctl.prompt().is_none());
        assert_eq!(ctl.kind(), ModeKind::TextEntry);
    }

    #[test]
    fn test_eraser_leaves_text_mode() {
        let (mut ctl, _) = setup();
        ctl.toggle_text_tool();
        ctl.toggle_eraser();
        assert_eq!(ctl.kind(), ModeKind::Idle);
        assert!(!ctl.tools().is_text_tool());
        assert!(ctl.tools().is_eraser());
    }

    #[test]
    fn test_zoom_in_any_mode() {
        let (mut ctl, mut view) = setup();
        ctl.toggle_text_tool();
        ctl.handle_wheel(Point::new(10.0, 10.0), -1.0, &mut view);
        assert!((view.scale() - 1.1).abs() < 1e-9);
        assert_eq!(ctl.kind(), ModeKind::TextEntry);

        ctl.handle_pinch(Point::new(10.0, 10.0), 2.0, &mut view);
        assert!((view.scale() - 2.2).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_during_pan_keeps_panning() {
        let (mut ctl, _) = setup();
        let mut view = ViewState::with_scale(1.0, Vec2::new(200.0, 200.0));
        ctl.handle_pointer(PointerEvent::start(Point::new(50.0, 50.0)), &mut view);
        ctl.handle_wheel(Point::new(50.0, 50.0), -1.0, &mut view);
        assert_eq!(ctl.kind(), ModeKind::Panning);

        let zoomed = view.offset;
        ctl.handle_pointer(PointerEvent::moved(Point::new(60.0, 50.0)), &mut view);
        assert!((view.offset.x - (zoomed.x + 10.0)).abs() < 1e-9);
        assert!((view.offset.y - zoomed.y).abs() < 1e-9);
    }

    #[test]
    fn test_prompt_screen_position_follows_view() {
        let (mut ctl, _) = setup();
        let mut view = ViewState::with_scale(2.0, Vec2::new(10.0, 20.0));
        ctl.toggle_text_tool();
        ctl.handle_pointer(PointerEvent::start(Point::new(110.0, 220.0)), &mut view);
        let prompt = ctl.prompt().unwrap();
        assert_eq!(prompt.anchor(), Point::new(50.0, 100.0));
        assert_eq!(prompt.screen_position(&view), Point::new(110.0, 220.0));
    }
}
