//! Freehand ink strokes.

use log::warn;

use crate::config::ViewerConfig;
use crate::geometry::{Point, Rect};
use crate::gpu::{BufferId, ColorVertex, GpuBackend};
use crate::transform::Affine;

use super::{OverlayId, OverlayState};

const INK_COLOR: [u8; 4] = [0, 0, 0, 255];

/// Two triangles per segment: a quad of `width` centred on the segment.
///
/// Zero-length segments contribute nothing.
pub fn stroke_vertices(points: &[Point], width: f32, color: [u8; 4]) -> Vec<ColorVertex> {
    let mut out = Vec::with_capacity(points.len().saturating_sub(1) * 6);
    for pair in points.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let dist = start.distance(&end);
        if dist <= 0.0 {
            continue;
        }
        let scale = (width / 2.0) / dist;
        let dx = (end.x - start.x) * scale;
        let dy = (end.y - start.y) * scale;
        let a = ColorVertex::new(start.x - dy, start.y + dx, color);
        let b = ColorVertex::new(start.x + dy, start.y - dx, color);
        let c = ColorVertex::new(end.x - dy, end.y + dx, color);
        let d = ColorVertex::new(end.x + dy, end.y - dx, color);
        out.extend_from_slice(&[a, b, c, b, c, d]);
    }
    out
}

#[derive(Debug)]
pub struct InkOverlay {
    id: OverlayId,
    state: OverlayState,
    bounds: Rect,
    points: Vec<Point>,
    width: f32,
    min_distance: f32,
    buffer: Option<BufferId>,
    /// Number of points the buffer was built from.
    points_in_buffer: usize,
    vertex_count: u32,
}

impl InkOverlay {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            id: OverlayId::new(),
            state: OverlayState::Idle,
            bounds: Rect::ZERO,
            points: Vec::new(),
            width: config.ink_width,
            min_distance: config.ink_min_distance,
            buffer: None,
            points_in_buffer: 0,
            vertex_count: 0,
        }
    }

    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn place_start(&mut self, point: Point) {
        self.bounds = Rect::from_origin_size(point, Default::default());
        self.points.clear();
        self.points.push(point);
        self.state = OverlayState::Placing;
    }

    pub fn place_move(&mut self, point: Point) {
        if let Some(last) = self.points.last() {
            if point.close_to(last, self.min_distance) {
                return;
            }
        }
        self.points.push(point);
        self.bounds.expand_to_include(&point);
    }

    pub fn place_end(&mut self, point: Point) {
        self.place_move(point);
        self.state = OverlayState::Placed;
    }

    /// Rebuild the vertex buffer when points were added since the last
    /// upload.  Ink is cheap, so this runs on fast frames too.
    pub fn update_gl_state(&mut self, gpu: &mut dyn GpuBackend, _fast: bool) {
        if self.points_in_buffer == self.points.len() || self.points.len() < 2 {
            return;
        }
        let vertices = stroke_vertices(&self.points, self.width, INK_COLOR);
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let existing = self.buffer;
        let result = match existing {
            Some(buffer) => gpu.update_buffer(buffer, bytes),
            None => gpu
                .create_buffer("ink_stroke", bytes)
                .map(|buffer| self.buffer = Some(buffer)),
        };
        if let Err(e) = result {
            warn!("ink overlay {}: {e}", self.id);
            return;
        }
        self.points_in_buffer = self.points.len();
        self.vertex_count = vertices.len() as u32;
    }

    pub fn draw_gl(&self, gpu: &mut dyn GpuBackend, transform: &Affine) {
        if self.points_in_buffer < 2 || self.vertex_count == 0 {
            return;
        }
        if let Some(buffer) = self.buffer {
            gpu.draw_colored(buffer, self.vertex_count, transform);
        }
    }

    pub fn gl_state_lost(&mut self) {
        self.buffer = None;
        self.points_in_buffer = 0;
        self.vertex_count = 0;
    }

    pub fn free(&mut self, gpu: &mut dyn GpuBackend) {
        if let Some(buffer) = self.buffer.take() {
            gpu.delete_buffer(buffer);
        }
        self.points_in_buffer = 0;
        self.vertex_count = 0;
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{DrawCall, HeadlessGpu};

    fn ink() -> InkOverlay {
        InkOverlay::new(&ViewerConfig::default())
    }

    #[test]
    fn test_stroke_vertices_horizontal_segment() {
        let verts = stroke_vertices(&[Point::new(0.0, 0.0), Point::new(10.0, 0.0)], 2.0, INK_COLOR);
        assert_eq!(verts.len(), 6);
        // Offset is perpendicular to the segment, half the width each side.
        assert_eq!(verts[0].position, [0.0, 1.0]);
        assert_eq!(verts[1].position, [0.0, -1.0]);
        assert_eq!(verts[5].position, [10.0, -1.0]);
    }

    #[test]
    fn test_stroke_skips_zero_length_segments() {
        let p = Point::new(3.0, 3.0);
        assert!(stroke_vertices(&[p, p], 1.0, INK_COLOR).is_empty());
    }

    #[test]
    fn test_close_points_are_dropped() {
        let mut overlay = ink();
        overlay.place_start(Point::new(0.0, 0.0));
        overlay.place_move(Point::new(0.1, 0.1));
        overlay.place_move(Point::new(5.0, 0.0));
        overlay.place_move(Point::new(5.2, 0.0));
        assert_eq!(overlay.points().len(), 2);
        assert_eq!(overlay.bounds(), Rect::new(0.0, 0.0, 5.0, 0.0));
    }

    #[test]
    fn test_buffer_created_then_updated() {
        let mut gpu = HeadlessGpu::new();
        let mut overlay = ink();
        overlay.place_start(Point::new(0.0, 0.0));
        overlay.update_gl_state(&mut gpu, false);
        assert_eq!(gpu.counters().buffers_created, 0);

        overlay.place_move(Point::new(10.0, 0.0));
        overlay.update_gl_state(&mut gpu, false);
        assert_eq!(gpu.counters().buffers_created, 1);

        // Nothing new: no upload.
        overlay.update_gl_state(&mut gpu, false);
        assert_eq!(gpu.counters().buffers_updated, 0);

        overlay.place_end(Point::new(10.0, 10.0));
        overlay.update_gl_state(&mut gpu, true);
        assert_eq!(gpu.counters().buffers_updated, 1);

        overlay.draw_gl(&mut gpu, &Affine::IDENTITY);
        assert!(matches!(gpu.draws()[0], DrawCall::Colored { vertex_count: 12, .. }));
    }

    #[test]
    fn test_context_loss_rebuilds() {
        let mut gpu = HeadlessGpu::new();
        let mut overlay = ink();
        overlay.place_start(Point::new(0.0, 0.0));
        overlay.place_end(Point::new(10.0, 0.0));
        overlay.update_gl_state(&mut gpu, false);

        gpu.lose_context();
        overlay.gl_state_lost();
        overlay.draw_gl(&mut gpu, &Affine::IDENTITY);
        assert!(gpu.draws().is_empty());

        overlay.update_gl_state(&mut gpu, false);
        assert_eq!(gpu.counters().buffers_created, 2);
        assert_eq!(gpu.counters().buffers_deleted, 0);
    }

    #[test]
    fn test_allocation_failure_retried() {
        let mut gpu = HeadlessGpu::new();
        let mut overlay = ink();
        overlay.place_start(Point::new(0.0, 0.0));
        overlay.place_end(Point::new(10.0, 0.0));
        gpu.fail_next_allocations(1);
        overlay.update_gl_state(&mut gpu, false);
        assert_eq!(gpu.live_buffers(), 0);
        overlay.update_gl_state(&mut gpu, false);
        assert_eq!(gpu.live_buffers(), 1);
    }

    #[test]
    fn test_free_releases_buffer() {
        let mut gpu = HeadlessGpu::new();
        let mut overlay = ink();
        overlay.place_start(Point::new(0.0, 0.0));
        overlay.place_end(Point::new(10.0, 0.0));
        overlay.update_gl_state(&mut gpu, false);
        overlay.free(&mut gpu);
        assert_eq!(gpu.live_buffers(), 0);
    }
}
