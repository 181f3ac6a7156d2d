//! Renderer trait abstraction.

use kurbo::Size;
use peniko::Color;
use pizarra_core::camera::ViewState;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Font error: {0}")]
    Font(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Context for a single presented frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Viewport size in physical pixels.
    pub viewport_size: Size,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
    /// Color around the logical surface.
    pub background_color: Color,
    /// Color of the logical surface itself.
    pub page_color: Color,
}

impl FrameContext {
    pub fn new(viewport_size: Size) -> Self {
        Self {
            viewport_size,
            scale_factor: 1.0,
            background_color: Color::from_rgba8(232, 232, 232, 255),
            page_color: Color::WHITE,
        }
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }
}

/// Trait for presenting a drawn surface through a client's view.
pub trait Renderer {
    /// Build the frame for the given view. Called once per presented frame;
    /// drawing on the surface itself happens independently of this.
    fn build_frame(&mut self, view: &ViewState, ctx: &FrameContext);

    /// Get the background color (for clearing).
    fn background_color(&self, ctx: &FrameContext) -> Color {
        ctx.background_color
    }
}
