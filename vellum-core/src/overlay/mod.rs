//! Page overlays: user-placed annotations drawn on top of a page.
//!
//! ```text
//!   Idle ──place_start──► Placing ──place_end──► Placed ◄──► Editing
//!                                                 (text only)
//! ```
//!
//! All coordinates are page space.  Each overlay owns the GPU resources
//! it allocates and frees them in [`Overlay::free`]; after a context loss
//! they are abandoned through [`Overlay::gl_state_lost`].

mod ink;
mod text;

pub use ink::{stroke_vertices, InkOverlay};
pub use text::TextOverlay;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ViewerConfig;
use crate::geometry::{Point, Rect};
use crate::gpu::GpuBackend;
use crate::text::{EditorDelegate, TextEngine};
use crate::transform::Affine;

/// Stable identity of an overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayId(pub Uuid);

impl OverlayId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OverlayId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The placement tool currently selected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tool {
    #[default]
    None,
    Ink,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayState {
    Idle,
    Placing,
    Placed,
    Editing,
}

/// Per-frame inputs to [`Overlay::update_gl_state`].
#[derive(Clone, Copy)]
pub struct OverlayUpdate<'a> {
    pub fast: bool,
    /// Device pixels per page unit.
    pub scale: f32,
    /// Visible part of the page, page space.
    pub visible: Rect,
    /// `visible` grown by the render margin and clipped to the page.
    /// Renders never cover more than this.
    pub clip: Rect,
    /// Largest texture side the backend accepts.
    pub max_texture_dimension: u32,
    pub text_engine: Option<&'a dyn TextEngine>,
}

#[derive(Debug)]
pub enum Overlay {
    Ink(InkOverlay),
    Text(TextOverlay),
}

impl Overlay {
    /// A fresh overlay for `tool`, or `None` when no placement tool is
    /// selected.
    pub fn new(tool: Tool, config: &ViewerConfig) -> Option<Self> {
        match tool {
            Tool::None => None,
            Tool::Ink => Some(Overlay::Ink(InkOverlay::new(config))),
            Tool::Text => Some(Overlay::Text(TextOverlay::new(config))),
        }
    }

    pub fn id(&self) -> OverlayId {
        match self {
            Overlay::Ink(o) => o.id(),
            Overlay::Text(o) => o.id(),
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Overlay::Ink(o) => o.bounds(),
            Overlay::Text(o) => o.bounds(),
        }
    }

    pub fn state(&self) -> OverlayState {
        match self {
            Overlay::Ink(o) => o.state(),
            Overlay::Text(o) => o.state(),
        }
    }

    pub fn place_start(&mut self, point: Point) {
        match self {
            Overlay::Ink(o) => o.place_start(point),
            Overlay::Text(o) => o.place_start(point),
        }
    }

    pub fn place_move(&mut self, point: Point) {
        match self {
            Overlay::Ink(o) => o.place_move(point),
            Overlay::Text(o) => o.place_move(point),
        }
    }

    pub fn place_end(&mut self, point: Point) {
        match self {
            Overlay::Ink(o) => o.place_end(point),
            Overlay::Text(o) => o.place_end(point),
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, Overlay::Text(_))
    }

    pub fn is_editing(&self) -> bool {
        self.state() == OverlayState::Editing
    }

    /// Hand the overlay to the host editor, placed at `viewport_rect`.
    /// No-op for non-editable overlays.
    pub fn start_editing(&mut self, delegate: &mut dyn EditorDelegate, viewport_rect: Rect) {
        if let Overlay::Text(o) = self {
            o.start_editing(delegate, viewport_rect);
        }
    }

    pub fn stop_editing(&mut self, delegate: &mut dyn EditorDelegate) {
        if let Overlay::Text(o) = self {
            o.stop_editing(delegate);
        }
    }

    pub fn update_gl_state(&mut self, gpu: &mut dyn GpuBackend, update: &OverlayUpdate<'_>) {
        match self {
            Overlay::Ink(o) => o.update_gl_state(gpu, update.fast),
            Overlay::Text(o) => o.update_gl_state(gpu, update),
        }
    }

    pub fn draw_gl(&self, gpu: &mut dyn GpuBackend, transform: &Affine) {
        match self {
            Overlay::Ink(o) => o.draw_gl(gpu, transform),
            Overlay::Text(o) => o.draw_gl(gpu, transform),
        }
    }

    /// Forget every GPU handle without freeing (context lost).
    pub fn gl_state_lost(&mut self) {
        match self {
            Overlay::Ink(o) => o.gl_state_lost(),
            Overlay::Text(o) => o.gl_state_lost(),
        }
    }

    /// Free every GPU handle.
    pub fn free(&mut self, gpu: &mut dyn GpuBackend) {
        match self {
            Overlay::Ink(o) => o.free(gpu),
            Overlay::Text(o) => o.free(gpu),
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
