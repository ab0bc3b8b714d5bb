//! GPU boundary: the narrow surface the viewer core draws through.
//!
//! The core never touches a graphics API directly.  It allocates opaque
//! buffer/texture handles, uploads bytes, and issues two kinds of draw:
//!
//! - **colored** triangle lists ([`ColorVertex`]): borders, ink strokes;
//! - **textured** triangle lists ([`TexVertex`]): page and text rasters.
//!
//! Every draw carries an [`Affine`] mapping its vertex space to clip space.
//!
//! Two implementations exist:
//!
//! 1. [`HeadlessGpu`] (here): in-memory, records calls, tracks live
//!    handles.  Used for tests, benchmarks, and CI.
//! 2. `vellum_render::WgpuBackend`: the real `wgpu` renderer.

use bytemuck::{Pod, Zeroable};
use log::debug;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::transform::Affine;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpuError {
    #[error("Failed to allocate {what}: {reason}")]
    Allocation { what: &'static str, reason: String },
    #[error("Unknown buffer handle {0:?}")]
    UnknownBuffer(BufferId),
    #[error("Unknown texture handle {0:?}")]
    UnknownTexture(TextureId),
    #[error("Texture data is {actual} bytes, expected {expected}")]
    InvalidTextureData { expected: usize, actual: usize },
    #[error("GPU context lost")]
    ContextLost,
}

/// Opaque handle to a GPU vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Opaque handle to a GPU texture (plus whatever sampler state the
/// backend pairs with it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

// ───────────────────────────────────────────────────────────────────
// Vertex formats
// ───────────────────────────────────────────────────────────────────

/// Vertex of a flat-colored triangle.  12 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 2],
    /// RGBA, normalised to [0, 1] by the backend.
    pub color: [u8; 4],
}

impl ColorVertex {
    pub fn new(x: f32, y: f32, color: [u8; 4]) -> Self {
        Self {
            position: [x, y],
            color,
        }
    }
}

/// Vertex of a textured triangle.  16 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TexVertex {
    pub position: [f32; 2],
    pub texcoord: [f32; 2],
}

impl TexVertex {
    /// Two triangles covering `rect` with the full texture.
    pub fn quad(rect: &crate::geometry::Rect) -> [TexVertex; 6] {
        let (l, t, r, b) = (rect.left(), rect.top(), rect.right(), rect.bottom());
        [
            TexVertex { position: [l, t], texcoord: [0.0, 0.0] },
            TexVertex { position: [l, b], texcoord: [0.0, 1.0] },
            TexVertex { position: [r, t], texcoord: [1.0, 0.0] },
            TexVertex { position: [l, b], texcoord: [0.0, 1.0] },
            TexVertex { position: [r, t], texcoord: [1.0, 0.0] },
            TexVertex { position: [r, b], texcoord: [1.0, 1.0] },
        ]
    }
}

/// Push the two triangles covering `rect` in a single color.
pub fn push_color_quad(out: &mut Vec<ColorVertex>, rect: &crate::geometry::Rect, color: [u8; 4]) {
    let (l, t, r, b) = (rect.left(), rect.top(), rect.right(), rect.bottom());
    out.extend_from_slice(&[
        ColorVertex::new(l, t, color),
        ColorVertex::new(l, b, color),
        ColorVertex::new(r, t, color),
        ColorVertex::new(l, b, color),
        ColorVertex::new(r, t, color),
        ColorVertex::new(r, b, color),
    ]);
}

// ───────────────────────────────────────────────────────────────────
// Backend trait
// ───────────────────────────────────────────────────────────────────

/// Create/delete/upload/draw: everything the core needs from a GPU.
///
/// Handles are owned by whoever created them and must be deleted exactly
/// once.  After a context loss, handles are abandoned instead: the owner
/// forgets them without calling `delete_*`.
pub trait GpuBackend {
    /// Allocate a vertex buffer initialised with `contents`.
    fn create_buffer(&mut self, label: &'static str, contents: &[u8]) -> Result<BufferId, GpuError>;

    /// Replace the contents of `buffer`, growing it if necessary.
    fn update_buffer(&mut self, buffer: BufferId, contents: &[u8]) -> Result<(), GpuError>;

    fn delete_buffer(&mut self, buffer: BufferId);

    /// Allocate an RGBA8 texture (clamp-to-edge, linear filtering) and
    /// upload `rgba` (`width * height * 4` bytes, row-major).
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, GpuError>;

    fn delete_texture(&mut self, texture: TextureId);

    /// Largest width or height `create_texture` accepts.
    fn max_texture_dimension(&self) -> u32;

    /// Draw `vertex_count` [`ColorVertex`]es from `buffer` as a triangle list.
    fn draw_colored(&mut self, buffer: BufferId, vertex_count: u32, transform: &Affine);

    /// Draw `vertex_count` [`TexVertex`]es from `buffer`, sampling `texture`.
    fn draw_textured(
        &mut self,
        buffer: BufferId,
        vertex_count: u32,
        texture: TextureId,
        transform: &Affine,
    );
}

// ───────────────────────────────────────────────────────────────────
// HeadlessGpu
// ───────────────────────────────────────────────────────────────────

/// A recorded draw call.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCall {
    Colored {
        buffer: BufferId,
        vertex_count: u32,
        transform: Affine,
    },
    Textured {
        buffer: BufferId,
        vertex_count: u32,
        texture: TextureId,
        transform: Affine,
    },
}

/// Call counters kept by [`HeadlessGpu`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GpuCounters {
    pub buffers_created: u32,
    pub buffers_updated: u32,
    pub buffers_deleted: u32,
    pub textures_created: u32,
    pub textures_deleted: u32,
    pub draws: u32,
}

impl GpuCounters {
    /// Total number of resource calls (allocations, uploads, deletions).
    pub fn resource_calls(&self) -> u32 {
        self.buffers_created
            + self.buffers_updated
            + self.buffers_deleted
            + self.textures_created
            + self.textures_deleted
    }
}

/// In-memory GPU backend.
///
/// Allocates sequential handles, keeps the set of live handles so tests
/// can check for leaks and double frees, and records every draw.
#[derive(Debug, Default)]
pub struct HeadlessGpu {
    next_id: u32,
    live_buffers: FxHashSet<BufferId>,
    live_textures: FxHashSet<TextureId>,
    /// Most textures ever live at once.
    peak_textures: usize,
    counters: GpuCounters,
    draws: Vec<DrawCall>,
    fail_allocations: u32,
    max_texture_dimension: Option<u32>,
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject textures wider or taller than `dimension`, like a real
    /// device limit.
    pub fn with_max_texture_dimension(mut self, dimension: u32) -> Self {
        self.max_texture_dimension = Some(dimension);
        self
    }

    /// Make the next `count` buffer/texture allocations fail.
    pub fn fail_next_allocations(&mut self, count: u32) {
        self.fail_allocations = count;
    }

    pub fn counters(&self) -> GpuCounters {
        self.counters
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Forget recorded draws (start of a new frame).
    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures.len()
    }

    pub fn peak_textures(&self) -> usize {
        self.peak_textures
    }

    pub fn is_live_texture(&self, texture: TextureId) -> bool {
        self.live_textures.contains(&texture)
    }

    /// Simulate a context loss: every handle becomes invalid at once.
    /// Owners are expected to abandon theirs without deleting.
    pub fn lose_context(&mut self) {
        debug!(
            "headless context lost ({} buffers, {} textures abandoned)",
            self.live_buffers.len(),
            self.live_textures.len()
        );
        self.live_buffers.clear();
        self.live_textures.clear();
    }

    fn next_handle(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_allocation(&mut self, what: &'static str) -> Result<(), GpuError> {
        if self.fail_allocations > 0 {
            self.fail_allocations -= 1;
            return Err(GpuError::Allocation {
                what,
                reason: "injected failure".into(),
            });
        }
        Ok(())
    }
}

impl GpuBackend for HeadlessGpu {
    fn create_buffer(&mut self, label: &'static str, _contents: &[u8]) -> Result<BufferId, GpuError> {
        self.check_allocation(label)?;
        let id = BufferId(self.next_handle());
        self.live_buffers.insert(id);
        self.counters.buffers_created += 1;
        Ok(id)
    }

    fn update_buffer(&mut self, buffer: BufferId, _contents: &[u8]) -> Result<(), GpuError> {
        if !self.live_buffers.contains(&buffer) {
            return Err(GpuError::UnknownBuffer(buffer));
        }
        self.counters.buffers_updated += 1;
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.counters.buffers_deleted += 1;
        if !self.live_buffers.remove(&buffer) {
            log::error!("delete of unknown buffer {buffer:?}");
        }
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, GpuError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(GpuError::InvalidTextureData {
                expected,
                actual: rgba.len(),
            });
        }
        if let Some(max) = self.max_texture_dimension {
            if width > max || height > max {
                return Err(GpuError::Allocation {
                    what: "texture",
                    reason: format!("{width}x{height} exceeds {max}"),
                });
            }
        }
        self.check_allocation("texture")?;
        let id = TextureId(self.next_handle());
        self.live_textures.insert(id);
        self.peak_textures = self.peak_textures.max(self.live_textures.len());
        self.counters.textures_created += 1;
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.counters.textures_deleted += 1;
        if !self.live_textures.remove(&texture) {
            log::error!("delete of unknown texture {texture:?}");
        }
    }

    /// Unlimited unless set with
    /// [`with_max_texture_dimension`](HeadlessGpu::with_max_texture_dimension).
    fn max_texture_dimension(&self) -> u32 {
        self.max_texture_dimension.unwrap_or(u32::MAX)
    }

    fn draw_colored(&mut self, buffer: BufferId, vertex_count: u32, transform: &Affine) {
        self.counters.draws += 1;
        self.draws.push(DrawCall::Colored {
            buffer,
            vertex_count,
            transform: *transform,
        });
    }

    fn draw_textured(
        &mut self,
        buffer: BufferId,
        vertex_count: u32,
        texture: TextureId,
        transform: &Affine,
    ) {
        self.counters.draws += 1;
        self.draws.push(DrawCall::Textured {
            buffer,
            vertex_count,
            texture,
            transform: *transform,
        });
    }
}

// ===================================================================
// Tests
// ===================================================================
