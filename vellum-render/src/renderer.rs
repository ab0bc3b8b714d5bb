//! `wgpu` implementation of the core's [`GpuBackend`].
//!
//! Buffers and textures live in handle maps.  Draw calls are recorded as
//! commands during `DocView::draw_gl` and replayed into one render pass
//! by `render_frame()` / `render_to_texture()`.
//!
//! ```text
//!  draw_colored / draw_textured ──► commands + transforms
//!                                        │
//!  render_frame() ─ upload transforms ───┤ (one uniform buffer,
//!                                        │  dynamic offset per draw)
//!                   begin pass, replay ◄─┘
//! ```

use std::borrow::Cow;
use std::num::NonZeroU64;

use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use thiserror::Error;
use vellum_core::gpu::{BufferId, ColorVertex, GpuBackend, GpuError, TexVertex, TextureId};
use vellum_core::Affine;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindingResource, Buffer,
    BufferBinding, BufferDescriptor, BufferUsages, Color, CommandEncoderDescriptor, Extent3d,
    LoadOp, Operations, RenderPassColorAttachment, RenderPassDescriptor, StoreOp, Texture,
    TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
    TextureViewDescriptor,
};

use crate::context::GpuContext;
use crate::pipelines::{transform_bind_group_layout, ColorPipeline, TexturePipeline, TRANSFORM_SIZE};
use crate::vertex::TransformUniform;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("No surface configured (headless mode)")]
    NoSurface,
    #[error("GPU device lost")]
    ContextLost,
}

/// Frame statistics returned after each render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Draw calls issued to the pass.
    pub draw_calls: u32,
    pub colored: u32,
    pub textured: u32,
    /// Recorded draws dropped (stale handle or short buffer).
    pub skipped: u32,
}

struct GpuBuffer {
    buffer: Buffer,
    /// Allocated bytes.
    capacity: u64,
    /// Bytes of vertex data written.
    len: u64,
}

struct GpuTexture {
    texture: Texture,
    bind_group: BindGroup,
}

#[derive(Clone, Copy, Debug)]
enum DrawKind {
    Colored,
    Textured(TextureId),
}

#[derive(Clone, Copy, Debug)]
struct DrawCommand {
    kind: DrawKind,
    buffer: BufferId,
    vertex_count: u32,
    transform: usize,
}

/// Per-frame transforms: one uniform slot per draw.
struct TransformSlots {
    buffer: Buffer,
    bind_group: BindGroup,
    /// Slots allocated.
    capacity: u64,
    /// Bytes between slots (uniform offset alignment).
    stride: u64,
}

impl TransformSlots {
    fn new(device: &wgpu::Device, layout: &BindGroupLayout, capacity: u64, stride: u64) -> Self {
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("transform_ub"),
            size: capacity * stride,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("transform_bg"),
            layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(TRANSFORM_SIZE),
                }),
            }],
        });
        Self {
            buffer,
            bind_group,
            capacity,
            stride,
        }
    }
}

/// The real GPU backend.
///
/// # Usage
///
/// ```ignore
/// let mut backend = WgpuBackend::new(GpuContext::new_with_surface(window, w, h).await?);
/// view.on_animation_frame(&mut backend);
/// view.draw_gl(&mut backend);
/// let stats = backend.render_frame()?;
/// ```
pub struct WgpuBackend {
    gpu: GpuContext,
    color: ColorPipeline,
    texture: TexturePipeline,
    transform_bgl: BindGroupLayout,
    slots: TransformSlots,
    transforms: Vec<TransformUniform>,
    commands: Vec<DrawCommand>,
    buffers: FxHashMap<BufferId, GpuBuffer>,
    textures: FxHashMap<TextureId, GpuTexture>,
    next_handle: u32,
    clear_color: Color,
}

impl WgpuBackend {
    /// Build pipelines targeting `gpu.surface_format`.
    pub fn new(gpu: GpuContext) -> Self {
        let device = &gpu.device;
        let transform_bgl = transform_bind_group_layout(device);
        let color = ColorPipeline::new(device, gpu.surface_format, &transform_bgl);
        let texture = TexturePipeline::new(device, gpu.surface_format, &transform_bgl);
        let stride = u64::from(device.limits().min_uniform_buffer_offset_alignment).max(TRANSFORM_SIZE);
        let slots = TransformSlots::new(device, &transform_bgl, 64, stride);
        info!(
            "wgpu backend ready ({:?}, max texture {})",
            gpu.surface_format,
            gpu.max_texture_dimension()
        );

        Self {
            gpu,
            color,
            texture,
            transform_bgl,
            slots,
            transforms: Vec::new(),
            commands: Vec::new(),
            buffers: FxHashMap::default(),
            textures: FxHashMap::default(),
            next_handle: 0,
            clear_color: Color {
                r: 0.5,
                g: 0.5,
                b: 0.5,
                a: 1.0,
            },
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn context_mut(&mut self) -> &mut GpuContext {
        &mut self.gpu
    }

    /// Set the background behind the pages.
    pub fn set_clear_color(&mut self, r: f64, g: f64, b: f64, a: f64) {
        self.clear_color = Color { r, g, b, a };
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Draws recorded since the last frame.
    pub fn pending_draws(&self) -> usize {
        self.commands.len()
    }

    /// Replay the recorded draws onto the window surface and present.
    pub fn render_frame(&mut self) -> Result<FrameStats, RenderError> {
        if self.gpu.is_lost() {
            self.discard_frame();
            return Err(RenderError::ContextLost);
        }
        let surface = self.gpu.surface.as_ref().ok_or(RenderError::NoSurface)?;
        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(e) => {
                self.discard_frame();
                return Err(e.into());
            }
        };
        let view = output.texture.create_view(&TextureViewDescriptor::default());
        let stats = self.encode(&view);
        output.present();
        Ok(stats)
    }

    /// Replay the recorded draws into `target_view`, which must have
    /// the context's `surface_format`.
    pub fn render_to_texture(&mut self, target_view: &TextureView) -> FrameStats {
        self.encode(target_view)
    }

    /// Drop recorded draws without rendering.
    pub fn discard_frame(&mut self) {
        self.commands.clear();
        self.transforms.clear();
    }

    fn encode(&mut self, target: &TextureView) -> FrameStats {
        let commands = std::mem::take(&mut self.commands);
        let transforms = std::mem::take(&mut self.transforms);
        self.upload_transforms(&transforms);

        let mut encoder = self.gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("vellum_frame_encoder"),
        });
        let mut stats = FrameStats::default();
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("vellum_render_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(self.clear_color),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for cmd in &commands {
                let stride = match cmd.kind {
                    DrawKind::Colored => std::mem::size_of::<ColorVertex>(),
                    DrawKind::Textured(_) => std::mem::size_of::<TexVertex>(),
                } as u64;
                let Some(buffer) = self.buffers.get(&cmd.buffer) else {
                    stats.skipped += 1;
                    continue;
                };
                if u64::from(cmd.vertex_count) * stride > buffer.len {
                    warn!(
                        "draw of {} vertices exceeds buffer {:?} ({} bytes)",
                        cmd.vertex_count, cmd.buffer, buffer.len
                    );
                    stats.skipped += 1;
                    continue;
                }
                match cmd.kind {
                    DrawKind::Colored => {
                        pass.set_pipeline(self.color.pipeline());
                        stats.colored += 1;
                    }
                    DrawKind::Textured(texture) => {
                        let Some(texture) = self.textures.get(&texture) else {
                            stats.skipped += 1;
                            continue;
                        };
                        pass.set_pipeline(self.texture.pipeline());
                        pass.set_bind_group(1, &texture.bind_group, &[]);
                        stats.textured += 1;
                    }
                }
                let offset = (cmd.transform as u64 * self.slots.stride) as u32;
                pass.set_bind_group(0, &self.slots.bind_group, &[offset]);
                pass.set_vertex_buffer(0, buffer.buffer.slice(..));
                pass.draw(0..cmd.vertex_count, 0..1);
                stats.draw_calls += 1;
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        stats
    }

    fn upload_transforms(&mut self, transforms: &[TransformUniform]) {
        if transforms.is_empty() {
            return;
        }
        let needed = transforms.len() as u64;
        if needed > self.slots.capacity {
            let capacity = needed.next_power_of_two();
            debug!("growing transform slots to {capacity}");
            self.slots.buffer.destroy();
            self.slots = TransformSlots::new(&self.gpu.device, &self.transform_bgl, capacity, self.slots.stride);
        }
        let stride = self.slots.stride as usize;
        let mut bytes = vec![0u8; transforms.len() * stride];
        for (slot, transform) in bytes.chunks_exact_mut(stride).zip(transforms) {
            slot[..TRANSFORM_SIZE as usize].copy_from_slice(bytemuck::bytes_of(transform));
        }
        self.gpu.queue.write_buffer(&self.slots.buffer, 0, &bytes);
    }

    fn next_handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check_device(&self) -> Result<(), GpuError> {
        if self.gpu.is_lost() {
            return Err(GpuError::ContextLost);
        }
        Ok(())
    }

    fn allocate_vertex_buffer(&self, label: &'static str, capacity: u64) -> Buffer {
        self.gpu.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn record(&mut self, kind: DrawKind, buffer: BufferId, vertex_count: u32, transform: &Affine) {
        if vertex_count == 0 || self.gpu.is_lost() {
            return;
        }
        self.transforms.push(TransformUniform::from_affine(transform));
        self.commands.push(DrawCommand {
            kind,
            buffer,
            vertex_count,
            transform: self.transforms.len() - 1,
        });
    }
}

/// `queue.write_buffer` needs sizes in multiples of four.
fn padded(contents: &[u8]) -> Cow<'_, [u8]> {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    if contents.len() % align == 0 {
        return Cow::Borrowed(contents);
    }
    let mut owned = contents.to_vec();
    owned.resize(contents.len().next_multiple_of(align), 0);
    Cow::Owned(owned)
}

impl GpuBackend for WgpuBackend {
    fn create_buffer(&mut self, label: &'static str, contents: &[u8]) -> Result<BufferId, GpuError> {
        self.check_device()?;
        let data = padded(contents);
        let capacity = (data.len() as u64).max(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.allocate_vertex_buffer(label, capacity);
        if !data.is_empty() {
            self.gpu.queue.write_buffer(&buffer, 0, &data);
        }
        let id = BufferId(self.next_handle());
        self.buffers.insert(
            id,
            GpuBuffer {
                buffer,
                capacity,
                len: contents.len() as u64,
            },
        );
        Ok(id)
    }

    fn update_buffer(&mut self, buffer: BufferId, contents: &[u8]) -> Result<(), GpuError> {
        self.check_device()?;
        let data = padded(contents);
        let needed = data.len() as u64;
        let capacity = match self.buffers.get(&buffer) {
            Some(entry) => entry.capacity,
            None => return Err(GpuError::UnknownBuffer(buffer)),
        };
        if needed > capacity {
            let grown = self.allocate_vertex_buffer("vertex_buffer_grown", needed.next_power_of_two());
            if let Some(old) = self.buffers.insert(
                buffer,
                GpuBuffer {
                    buffer: grown,
                    capacity: needed.next_power_of_two(),
                    len: 0,
                },
            ) {
                old.buffer.destroy();
            }
        }
        if let Some(entry) = self.buffers.get_mut(&buffer) {
            if !data.is_empty() {
                self.gpu.queue.write_buffer(&entry.buffer, 0, &data);
            }
            entry.len = contents.len() as u64;
        }
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        match self.buffers.remove(&buffer) {
            Some(entry) => entry.buffer.destroy(),
            None => debug!("delete of unknown buffer {buffer:?}"),
        }
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, GpuError> {
        self.check_device()?;
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(GpuError::InvalidTextureData {
                expected,
                actual: rgba.len(),
            });
        }
        let max = self.gpu.max_texture_dimension();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(GpuError::Allocation {
                what: "texture",
                reason: format!("{width}x{height} outside 1..={max}"),
            });
        }

        let size = Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.gpu.device.create_texture(&TextureDescriptor {
            label: Some("page_texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4), // RGBA = 4 bytes per pixel
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&TextureViewDescriptor::default());
        let bind_group = self.texture.bind_texture(&self.gpu.device, &view);

        let id = TextureId(self.next_handle());
        self.textures.insert(id, GpuTexture { texture, bind_group });
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        match self.textures.remove(&texture) {
            Some(entry) => entry.texture.destroy(),
            None => debug!("delete of unknown texture {texture:?}"),
        }
    }

    fn max_texture_dimension(&self) -> u32 {
        self.gpu.max_texture_dimension()
    }

    fn draw_colored(&mut self, buffer: BufferId, vertex_count: u32, transform: &Affine) {
        self.record(DrawKind::Colored, buffer, vertex_count, transform);
    }

    fn draw_textured(
        &mut self,
        buffer: BufferId,
        vertex_count: u32,
        texture: TextureId,
        transform: &Affine,
    ) {
        self.record(DrawKind::Textured(texture), buffer, vertex_count, transform);
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::gpu::push_color_quad;
    use vellum_core::Rect;

    fn backend() -> Option<WgpuBackend> {
        // May fail in CI without GPU: skip gracefully.
        pollster::block_on(GpuContext::new_headless())
            .ok()
            .map(WgpuBackend::new)
    }

    fn quad_bytes() -> Vec<u8> {
        let mut verts = Vec::new();
        push_color_quad(&mut verts, &Rect::new(0.0, 0.0, 10.0, 10.0), [255, 0, 0, 255]);
        bytemuck::cast_slice(&verts).to_vec()
    }

    #[test]
    fn test_padded() {
        assert_eq!(padded(&[1, 2, 3, 4]).len(), 4);
        assert_eq!(padded(&[1, 2, 3, 4, 5]).as_ref(), &[1, 2, 3, 4, 5, 0, 0, 0]);
    }

    #[test]
    fn test_frame_stats_default() {
        let stats = FrameStats::default();
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.skipped, 0);
    }

    #[test]
    fn test_buffer_lifecycle() {
        let Some(mut gpu) = backend() else { return };
        let id = gpu.create_buffer("test", &quad_bytes()).unwrap();
        assert_eq!(gpu.live_buffers(), 1);
        // Growing past the first allocation keeps the handle.
        let mut bigger = quad_bytes();
        bigger.extend(quad_bytes());
        gpu.update_buffer(id, &bigger).unwrap();
        gpu.delete_buffer(id);
        assert_eq!(gpu.live_buffers(), 0);
        assert_eq!(gpu.update_buffer(id, &bigger), Err(GpuError::UnknownBuffer(id)));
    }

    #[test]
    fn test_texture_validation() {
        let Some(mut gpu) = backend() else { return };
        assert!(matches!(
            gpu.create_texture(2, 2, &[0; 15]),
            Err(GpuError::InvalidTextureData { expected: 16, actual: 15 })
        ));
        assert!(matches!(
            gpu.create_texture(0, 0, &[]),
            Err(GpuError::Allocation { .. })
        ));
        let id = gpu.create_texture(2, 2, &[255; 16]).unwrap();
        assert_eq!(gpu.live_textures(), 1);
        gpu.delete_texture(id);
        assert_eq!(gpu.live_textures(), 0);
    }

    #[test]
    fn test_render_to_texture_replays_draws() {
        let Some(mut gpu) = backend() else { return };
        let buffer = gpu.create_buffer("quad", &quad_bytes()).unwrap();
        let texture = gpu.create_texture(1, 1, &[255; 4]).unwrap();
        let tex_quad = vellum_core::gpu::TexVertex::quad(&Rect::new(0.0, 0.0, 1.0, 1.0));
        let tex_buffer = gpu.create_buffer("tex_quad", bytemuck::cast_slice(&tex_quad)).unwrap();

        gpu.draw_colored(buffer, 6, &Affine::IDENTITY);
        gpu.draw_textured(tex_buffer, 6, texture, &Affine::IDENTITY);
        // Too many vertices for the buffer.
        gpu.draw_colored(buffer, 60, &Affine::IDENTITY);
        assert_eq!(gpu.pending_draws(), 3);

        let target = gpu.context().device.create_texture(&TextureDescriptor {
            label: Some("offscreen"),
            size: Extent3d {
                width: 64,
                height: 64,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: gpu.context().surface_format,
            usage: TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = target.create_view(&TextureViewDescriptor::default());
        let stats = gpu.render_to_texture(&view);
        assert_eq!(stats.colored, 1);
        assert_eq!(stats.textured, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(gpu.pending_draws(), 0);
    }

    #[test]
    fn test_render_frame_headless_has_no_surface() {
        let Some(mut gpu) = backend() else { return };
        assert!(matches!(gpu.render_frame(), Err(RenderError::NoSurface)));
    }
}
