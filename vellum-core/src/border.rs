//! Page frames drawn behind the page textures.
//!
//! Each page in the cached range gets two quads: a dark frame slightly
//! larger than the page and a translucent fill covering the page.  They
//! stand in for pages whose texture is not rendered yet and for
//! fast frames in the middle of a gesture.

use log::warn;

use crate::geometry::Range;
use crate::gpu::{push_color_quad, BufferId, ColorVertex, GpuBackend};
use crate::layout::PageLayout;
use crate::transform::Affine;

const FRAME_COLOR: [u8; 4] = [64, 64, 64, 255];
const FILL_COLOR: [u8; 4] = [255, 255, 255, 160];

/// Vertices for the frames of `range` in document space.
pub fn border_vertices(layout: &PageLayout, range: &Range, frame_width: f32) -> Vec<ColorVertex> {
    let mut out = Vec::with_capacity(range.len() * 12);
    for page in range.iter() {
        let Some(rect) = layout.page_rect(page) else {
            break;
        };
        push_color_quad(&mut out, &rect.outset(frame_width), FRAME_COLOR);
        push_color_quad(&mut out, &rect, FILL_COLOR);
    }
    out
}

#[derive(Debug, Default)]
pub struct BorderGeometry {
    buffer: Option<BufferId>,
    range: Range,
    vertex_count: u32,
    stale: bool,
}

impl BorderGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page range the buffer currently holds.
    pub fn range(&self) -> Range {
        self.range
    }

    /// Rebuild the buffer if `range` differs from the cached one.
    pub fn update(
        &mut self,
        gpu: &mut dyn GpuBackend,
        layout: &PageLayout,
        range: Range,
        frame_width: f32,
    ) {
        if !self.stale && self.buffer.is_some() && range == self.range {
            return;
        }
        let vertices = border_vertices(layout, &range, frame_width);
        if vertices.is_empty() {
            self.free(gpu);
            self.range = range;
            self.stale = false;
            return;
        }
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let existing = self.buffer;
        let result = match existing {
            Some(buffer) => gpu.update_buffer(buffer, bytes),
            None => gpu
                .create_buffer("page_borders", bytes)
                .map(|buffer| self.buffer = Some(buffer)),
        };
        match result {
            Ok(()) => {
                self.range = range;
                self.vertex_count = vertices.len() as u32;
                self.stale = false;
            }
            Err(e) => warn!("page borders for {range}: {e}"),
        }
    }

    /// Force a rebuild on the next update (layout changed).
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn draw(&self, gpu: &mut dyn GpuBackend, document_to_clip: &Affine) {
        match self.buffer {
            Some(buffer) if self.vertex_count > 0 => {
                gpu.draw_colored(buffer, self.vertex_count, document_to_clip)
            }
            _ => {}
        }
    }

    pub fn gl_state_lost(&mut self) {
        self.buffer = None;
        self.range = Range::EMPTY;
        self.vertex_count = 0;
    }

    pub fn free(&mut self, gpu: &mut dyn GpuBackend) {
        if let Some(buffer) = self.buffer.take() {
            gpu.delete_buffer(buffer);
        }
        self.range = Range::EMPTY;
        self.vertex_count = 0;
    }
}

// ===================================================================
// Tests
// ===================================================================
