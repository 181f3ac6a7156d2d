//! A whiteboard session: one client's view, tools, surface and channel.
//!
//! Local edits are drawn immediately and then published. Remote records are
//! queued by the channel's subscription handlers and applied on
//! [`Whiteboard::pump`], so the surface is only ever touched from the host's
//! event loop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use kurbo::Point;

use crate::camera::ViewState;
use crate::controller::{LocalEdit, ModeController, ModeKind, TextPrompt};
use crate::input::{Gesture, PointerEvent, TextKey};
use crate::normalize::{from_fraction, to_fraction};
use crate::records::{now_millis, ClearSignal, ClientId, Record, Rgb, StrokeSegment, TextAnnotation};
use crate::replication::ReplicationChannel;
use crate::surface::RenderSurface;
use crate::tools::ToolSettings;

type Inbox = Rc<RefCell<VecDeque<Record>>>;

pub struct Whiteboard<C: ReplicationChannel, S: RenderSurface> {
    id: ClientId,
    view: ViewState,
    controller: ModeController,
    channel: C,
    surface: S,
    inbox: Inbox,
}

impl<C: ReplicationChannel, S: RenderSurface> Whiteboard<C, S> {
    /// Start a session and subscribe to the channel's three collections.
    pub fn new(mut channel: C, surface: S, view: ViewState) -> Self {
        let inbox: Inbox = Rc::new(RefCell::new(VecDeque::new()));

        let q = inbox.clone();
        channel.subscribe_strokes(Box::new(move |s| q.borrow_mut().push_back(Record::Stroke(s.clone()))));
        let q = inbox.clone();
        channel.subscribe_texts(Box::new(move |t| q.borrow_mut().push_back(Record::Text(t.clone()))));
        let q = inbox.clone();
        channel.subscribe_clears(Box::new(move |c| q.borrow_mut().push_back(Record::Clear(c.clone()))));

        Self {
            id: channel.local_id().clone(),
            view,
            controller: ModeController::new(),
            channel,
            surface,
            inbox,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.id
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn mode(&self) -> ModeKind {
        self.controller.kind()
    }

    pub fn controller(&self) -> &ModeController {
        &self.controller
    }

    pub fn tools(&self) -> &ToolSettings {
        self.controller.tools()
    }

    pub fn prompt(&self) -> Option<&TextPrompt> {
        self.controller.prompt()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        if let Some(edit) = self.controller.handle_pointer(event, &mut self.view) {
            self.apply_local(edit);
        }
    }

    pub fn handle_wheel(&mut self, anchor: Point, delta_y: f64) {
        self.controller.handle_wheel(anchor, delta_y, &mut self.view);
    }

    pub fn handle_pinch(&mut self, anchor: Point, factor: f64) {
        self.controller.handle_pinch(anchor, factor, &mut self.view);
    }

    pub fn handle_gesture(&mut self, gesture: Gesture) {
        match gesture {
            Gesture::Pointer(event) => self.handle_pointer(event),
            Gesture::Pinch { anchor, factor } => self.handle_pinch(anchor, factor),
        }
    }

    pub fn handle_key(&mut self, key: TextKey) {
        if let Some(edit) = self.controller.handle_key(key) {
            self.apply_local(edit);
        }
    }

    pub fn set_prompt_text(&mut self, text: &str) {
        self.controller.set_prompt_text(text);
    }

    /// The prompt lost focus.
    pub fn commit_text(&mut self) {
        if let Some(edit) = self.controller.commit_text() {
            self.apply_local(edit);
        }
    }

    pub fn cancel_text(&mut self) {
        self.controller.cancel_text();
    }

    pub fn toggle_text_tool(&mut self) {
        self.controller.toggle_text_tool();
    }

    pub fn toggle_eraser(&mut self) {
        self.controller.toggle_eraser();
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.controller.tools_mut().set_color(color);
    }

    pub fn set_brush_width(&mut self, width: f64) {
        self.controller.tools_mut().set_brush_width(width);
    }

    pub fn set_eraser_width(&mut self, width: f64) {
        self.controller.tools_mut().set_eraser_width(width);
    }

    pub fn set_font_size(&mut self, size: f64) {
        self.controller.tools_mut().set_font_size(size);
    }

    /// Wipe the local surface, then tell everyone else to do the same.
    pub fn clear(&mut self) {
        self.surface.clear();
        self.channel.publish_clear(ClearSignal {
            origin_id: self.id.clone(),
            timestamp: now_millis(),
        });
    }

    /// Poll the channel and apply every remote record received so far.
    /// Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        self.channel.poll();
        let pending: Vec<Record> = self.inbox.borrow_mut().drain(..).collect();
        let applied = pending.len();
        for record in pending {
            self.apply_remote(record);
        }
        applied
    }

    fn apply_local(&mut self, edit: LocalEdit) {
        match edit {
            LocalEdit::Segment { from, to, color, width } => {
                self.surface.draw_segment(from, to, color, width);
                let (a, b) = (to_fraction(from), to_fraction(to));
                self.channel.publish_stroke(StrokeSegment {
                    x0: a.x,
                    y0: a.y,
                    x1: b.x,
                    y1: b.y,
                    color,
                    width,
                    origin_id: self.id.clone(),
                    timestamp: now_millis(),
                });
            }
            LocalEdit::Text {
                anchor,
                text,
                font_size,
                color,
            } => {
                self.surface.draw_text(anchor, &text, font_size, color);
                let at = to_fraction(anchor);
                self.channel.publish_text(TextAnnotation {
                    x: at.x,
                    y: at.y,
                    text,
                    font_size,
                    color,
                    origin_id: self.id.clone(),
                    timestamp: now_millis(),
                });
            }
        }
    }

    fn apply_remote(&mut self, record: Record) {
        match record {
            Record::Stroke(s) => {
                self.surface
                    .draw_segment(from_fraction(s.start()), from_fraction(s.end()), s.color, s.width);
            }
            Record::Text(t) => {
                self.surface
                    .draw_text(from_fraction(t.anchor()), &t.text, t.font_size, t.color);
            }
            Record::Clear(c) => {
                log::debug!("Surface cleared by {}", c.origin_id);
                self.surface.clear();
            }
        }
    }
}
