//! Vello-based rendering surface.

use std::sync::Arc;

use crate::renderer::{FrameContext, RenderResult, Renderer, RendererError};
use kurbo::{Affine, Cap, Join, Line, Point, Rect, Size, Stroke};
use parley::layout::PositionedLayoutItem;
use parley::{FontContext, LayoutContext, StyleProperty};
use peniko::{Brush, Color, Fill};
use pizarra_core::camera::ViewState;
use pizarra_core::normalize::SURFACE_SIZE;
use pizarra_core::records::Rgb;
use pizarra_core::surface::RenderSurface;
use vello::Scene;

/// Family used until a font is registered under another name.
const DEFAULT_FONT_FAMILY: &str = "sans-serif";

/// A [`RenderSurface`] that records into a Vello scene.
///
/// Content is kept in logical surface coordinates. [`Renderer::build_frame`]
/// places it on screen through a client's view.
pub struct VelloSurface {
    size: Size,
    /// Everything drawn since the last clear.
    content: Scene,
    /// The last composed frame.
    frame: Scene,
    /// Font context for text rendering (cached to avoid re-registering fonts).
    font_cx: FontContext,
    /// Layout context for text rendering.
    layout_cx: LayoutContext<Brush>,
    font_family: String,
}

impl Default for VelloSurface {
    fn default() -> Self {
        Self::new(SURFACE_SIZE)
    }
}

impl VelloSurface {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            content: Scene::new(),
            frame: Scene::new(),
            font_cx: FontContext::new(),
            layout_cx: LayoutContext::new(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Register font data and use `family` (as named in the font's name
    /// table) for all text drawn from now on.
    pub fn register_font(&mut self, data: Vec<u8>, family: &str) -> RenderResult<()> {
        let registered = self
            .font_cx
            .collection
            .register_fonts(vello::peniko::Blob::new(Arc::new(data)), None);
        if registered.is_empty() {
            return Err(RendererError::Font(format!("no usable faces for {family:?}")));
        }
        self.font_family = family.to_string();
        Ok(())
    }

    /// Drawn content in surface coordinates.
    pub fn content(&self) -> &Scene {
        &self.content
    }

    /// The last frame built by [`Renderer::build_frame`].
    pub fn scene(&self) -> &Scene {
        &self.frame
    }

    /// Take ownership of the frame (resets internal frame).
    pub fn take_scene(&mut self) -> Scene {
        std::mem::take(&mut self.frame)
    }

    fn is_zero_sized(&self) -> bool {
        self.size.width <= 0.0 || self.size.height <= 0.0
    }

    /// Lay out `text` on one line with its baseline starting at `anchor`.
    fn render_text(&mut self, anchor: Point, text: &str, font_size: f64, color: Color) {
        let brush = Brush::Solid(color);

        let mut builder = self.layout_cx.ranged_builder(&mut self.font_cx, text, 1.0, false);
        builder.push_default(StyleProperty::FontSize(font_size as f32));
        builder.push_default(StyleProperty::Brush(brush.clone()));
        builder.push_default(StyleProperty::FontStack(parley::FontStack::Single(
            parley::FontFamily::Named(self.font_family.as_str().into()),
        )));
        let mut layout = builder.build(text);
        layout.break_all_lines(None);
        layout.align(None, parley::Alignment::Start, parley::AlignmentOptions::default());

        // Parley lays out from the top of the first line; shift it up so the
        // baseline sits on the anchor.
        let baseline = layout
            .lines()
            .next()
            .map(|line| line.metrics().baseline as f64)
            .unwrap_or(font_size * 0.8);
        let text_transform = Affine::translate((anchor.x, anchor.y - baseline));

        let mut glyph_count = 0;
        for line in layout.lines() {
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                    continue;
                };
                let mut x = glyph_run.offset();
                let y = glyph_run.baseline();
                let run = glyph_run.run();
                let font = run.font();
                let run_font_size = run.font_size();
                let synthesis = run.synthesis();
                let glyph_xform = synthesis
                    .skew()
                    .map(|angle| Affine::skew(angle.to_radians().tan() as f64, 0.0));

                let glyphs: Vec<vello::Glyph> = glyph_run
                    .glyphs()
                    .map(|glyph| {
                        let gx = x + glyph.x;
                        let gy = y - glyph.y;
                        x += glyph.advance;
                        glyph_count += 1;
                        vello::Glyph { id: glyph.id, x: gx, y: gy }
                    })
                    .collect();

                if !glyphs.is_empty() {
                    self.content
                        .draw_glyphs(font)
                        .brush(&brush)
                        .hint(true)
                        .transform(text_transform)
                        .glyph_transform(glyph_xform)
                        .font_size(run_font_size)
                        .normalized_coords(run.normalized_coords())
                        .draw(Fill::NonZero, glyphs.into_iter());
                }
            }
        }

        // No font available: mark where the text is.
        if glyph_count == 0 {
            let width = text.chars().count() as f64 * font_size * 0.6;
            let rect = Rect::new(anchor.x, anchor.y - font_size * 0.8, anchor.x + width, anchor.y + font_size * 0.2);
            self.content
                .fill(Fill::NonZero, Affine::IDENTITY, color.with_alpha(0.3), None, &rect);
        }
    }
}

impl RenderSurface for VelloSurface {
    fn draw_segment(&mut self, from: Point, to: Point, color: Rgb, width: f64) {
        if self.is_zero_sized() {
            return;
        }
        let stroke = Stroke::new(width).with_caps(Cap::Round).with_join(Join::Round);
        self.content
            .stroke(&stroke, Affine::IDENTITY, Color::from(color), None, &Line::new(from, to));
    }

    fn draw_text(&mut self, anchor: Point, text: &str, font_size: f64, color: Rgb) {
        if self.is_zero_sized() || text.is_empty() {
            return;
        }
        self.render_text(anchor, text, font_size, color.into());
    }

    fn clear(&mut self) {
        if self.is_zero_sized() {
            return;
        }
        self.content.reset();
    }
}

impl Renderer for VelloSurface {
    fn build_frame(&mut self, view: &ViewState, ctx: &FrameContext) {
        self.frame.reset();
        let screen = Affine::scale(ctx.scale_factor);

        let viewport = Rect::from_origin_size(Point::ZERO, ctx.viewport_size);
        self.frame
            .fill(Fill::NonZero, Affine::IDENTITY, ctx.background_color, None, &viewport);

        let placement = screen * view.transform();
        let page = Rect::from_origin_size(Point::ZERO, self.size);
        self.frame.fill(Fill::NonZero, placement, ctx.page_color, None, &page);
        self.frame.append(&self.content, Some(placement));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pizarra_core::surface::DisplayList;

    #[test]
    fn test_surface_creation() {
        let surface = VelloSurface::default();
        assert!(surface.content().encoding().is_empty());
        assert!(surface.scene().encoding().is_empty());
        assert_eq!(surface.size(), SURFACE_SIZE);
    }

    #[test]
    fn test_draw_and_clear() {
        let mut surface = VelloSurface::default();
        surface.draw_segment(Point::new(100.0, 100.0), Point::new(150.0, 120.0), Rgb::BLACK, 5.0);
        assert!(!surface.content().encoding().is_empty());

        surface.clear();
        assert!(surface.content().encoding().is_empty());
    }

    #[test]
    fn test_text_without_fonts_draws_marker() {
        let mut surface = VelloSurface::default();
        surface.draw_text(Point::new(10.0, 40.0), "hola", 20.0, Rgb::BLACK);
        assert!(!surface.content().encoding().is_empty());
    }

    #[test]
    fn test_zero_sized_surface_ignores_everything() {
        let mut surface = VelloSurface::new(Size::ZERO);
        surface.draw_segment(Point::ZERO, Point::new(1.0, 1.0), Rgb::BLACK, 1.0);
        surface.draw_text(Point::ZERO, "x", 12.0, Rgb::BLACK);
        surface.clear();
        assert!(surface.content().encoding().is_empty());
    }

    #[test]
    fn test_build_frame() {
        let mut surface = VelloSurface::default();
        let mut list = DisplayList::default();
        list.draw_segment(Point::new(1.0, 1.0), Point::new(2.0, 2.0), Rgb::new(255, 0, 0), 3.0);
        list.replay(&mut surface);

        let ctx = FrameContext::new(Size::new(800.0, 600.0));
        surface.build_frame(&ViewState::centered(ctx.viewport_size), &ctx);
        assert!(!surface.scene().encoding().is_empty());

        let frame = surface.take_scene();
        assert!(!frame.encoding().is_empty());
        assert!(surface.scene().encoding().is_empty());
    }

    #[test]
    fn test_register_garbage_font_fails() {
        let mut surface = VelloSurface::default();
        assert!(matches!(
            surface.register_font(vec![0u8; 16], "Nope"),
            Err(RendererError::Font(_))
        ));
    }
}
