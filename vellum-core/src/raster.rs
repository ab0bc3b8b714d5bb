//! Per-page rasterization cache.
//!
//! Each page owns at most one [`RasterTexture`]: a GPU texture holding a
//! rendering of some page-space rectangle at some pixel resolution.
//! [`PageRaster::update_state`] decides, once per non-fast frame, whether
//! that texture still serves the region currently on screen or must be
//! regenerated.
//!
//! # Render-area growth
//!
//! When a re-render is needed the requested region is grown by a fixed
//! pixel margin on every side (converted to page units at the current
//! scale) and clipped to the page.  The texture therefore covers more
//! than is visible, and small pans keep hitting the cache.

use log::{debug, warn};

use crate::geometry::{Rect, Size};
use crate::gpu::{BufferId, GpuBackend, GpuError, TexVertex, TextureId};
use crate::source::{PixelBuffer, RasterError, RasterSource};
use crate::transform::Affine;

/// Allowed x/y scale mismatch before the rasterizer is warned about.
const SCALE_TOLERANCE: f32 = 0.001;

/// Sub-pixel slack when comparing covered vs requested pixel counts.
const PIXEL_SLACK: f32 = 0.01;

/// Why a page update did not produce a fresh texture.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

// ───────────────────────────────────────────────────────────────────
// RasterTexture
// ───────────────────────────────────────────────────────────────────

/// A GPU texture plus the quad that places it in page space.
#[derive(Debug)]
pub struct RasterTexture {
    texture: TextureId,
    quad: BufferId,
    /// Texture size in pixels.
    pixel_size: Size,
    /// Page-space rectangle the texture represents.
    page_rect: Rect,
}

impl RasterTexture {
    /// Upload `pixels` and build the quad covering `page_rect`.
    ///
    /// On failure nothing stays allocated.
    pub fn upload(
        gpu: &mut dyn GpuBackend,
        pixels: &PixelBuffer,
        page_rect: Rect,
    ) -> Result<Self, GpuError> {
        let pixel_size = pixels.size();
        let scale_x = pixel_size.width / page_rect.size.width;
        let scale_y = pixel_size.height / page_rect.size.height;
        if (scale_x - scale_y).abs() > SCALE_TOLERANCE * scale_x.max(scale_y) {
            warn!("non-uniform texture scale: {scale_x} x {scale_y} for {page_rect}");
        }

        let texture = gpu.create_texture(pixels.width(), pixels.height(), pixels.data())?;
        let quad = TexVertex::quad(&page_rect);
        let quad = match gpu.create_buffer("raster_quad", bytemuck::cast_slice(&quad)) {
            Ok(buffer) => buffer,
            Err(e) => {
                gpu.delete_texture(texture);
                return Err(e);
            }
        };

        Ok(Self {
            texture,
            quad,
            pixel_size,
            page_rect,
        })
    }

    pub fn page_rect(&self) -> Rect {
        self.page_rect
    }

    pub fn pixel_size(&self) -> Size {
        self.pixel_size
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// True iff `rect` (page space) is inside this texture and, when
    /// `wanted` is a real pixel size, the part of the texture covering
    /// `rect` has at least that many pixels along each axis.
    pub fn covers(&self, rect: &Rect, wanted: &Size) -> bool {
        if !self.page_rect.contains(rect) {
            return false;
        }
        if wanted.width < 1.0 || wanted.height < 1.0 {
            return true;
        }
        let covered_w = rect.size.width * self.pixel_size.width / self.page_rect.size.width;
        let covered_h = rect.size.height * self.pixel_size.height / self.page_rect.size.height;
        covered_w + PIXEL_SLACK >= wanted.width && covered_h + PIXEL_SLACK >= wanted.height
    }

    pub fn draw(&self, gpu: &mut dyn GpuBackend, transform: &Affine) {
        gpu.draw_textured(self.quad, 6, self.texture, transform);
    }

    /// Delete the GPU resources.
    pub fn free(self, gpu: &mut dyn GpuBackend) {
        gpu.delete_texture(self.texture);
        gpu.delete_buffer(self.quad);
    }
}

// ───────────────────────────────────────────────────────────────────
// Render-area growth
// ───────────────────────────────────────────────────────────────────

/// Grow `region` by `margin_px` device pixels on each side, clip it to
/// the page, and return it with the matching pixel size (rounded up).
pub fn expand_render_area(
    region: &Rect,
    pixel_size: &Size,
    page_size: &Size,
    margin_px: f32,
) -> (Rect, Size) {
    let scale = pixel_size.width / region.size.width;
    if (scale - pixel_size.height / region.size.height).abs() > SCALE_TOLERANCE {
        warn!("non-square scale factor for region {region} at {pixel_size}");
    }
    let mut grown = region.outset(margin_px / scale);
    grown.intersect_with_ltrb(0.0, 0.0, page_size.width, page_size.height);
    let pixels = Size::new(
        (grown.size.width * scale).ceil(),
        (grown.size.height * scale).ceil(),
    );
    (grown, pixels)
}

// ───────────────────────────────────────────────────────────────────
// PageRaster
// ───────────────────────────────────────────────────────────────────

/// The texture cache of a single page.
#[derive(Debug, Default)]
pub struct PageRaster {
    texture: Option<RasterTexture>,
}

impl PageRaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(&self) -> Option<&RasterTexture> {
        self.texture.as_ref()
    }

    /// Bring the cache up to date for `region` (page space) displayed at
    /// `pixel_size` device pixels.
    ///
    /// - `fast`: no-op, whatever is cached stays.
    /// - empty `pixel_size`: the page is off screen; the texture is freed.
    /// - cached texture covers the region densely enough: reused.
    /// - otherwise: the grown region is rendered and replaces the cache.
    ///   On failure the previous texture (if any) is kept and the error
    ///   returned so the caller can log it; the next update retries.
    ///
    /// The old texture is freed only after the new one is uploaded, so
    /// while a page re-renders it holds two textures: peak GPU memory is
    /// twice the size of one page raster.  Callers budgeting memory per
    /// visible page should count both.
    #[allow(clippy::too_many_arguments)]
    pub fn update_state<S: RasterSource + ?Sized>(
        &mut self,
        gpu: &mut dyn GpuBackend,
        source: &mut S,
        page: usize,
        region: &Rect,
        pixel_size: &Size,
        fast: bool,
        margin_px: f32,
    ) -> Result<(), UpdateError> {
        if fast {
            return Ok(());
        }
        if pixel_size.is_empty() || region.is_empty() {
            if let Some(old) = self.texture.take() {
                old.free(gpu);
                debug!("deleted texture for page {page}");
            }
            return Ok(());
        }
        if let Some(cached) = &self.texture {
            if cached.covers(region, pixel_size) {
                return Ok(());
            }
        }

        let page_size = source.page_size(page);
        let (render_rect, render_pixels) =
            expand_render_area(region, pixel_size, &page_size, margin_px);
        if render_rect.is_empty() || render_pixels.is_empty() {
            return Err(RasterError::EmptyRegion(render_rect).into());
        }

        let pixels = source.render(
            page,
            &render_rect,
            render_pixels.width as u32,
            render_pixels.height as u32,
        )?;
        let fresh = RasterTexture::upload(gpu, &pixels, render_rect)?;
        if let Some(old) = self.texture.replace(fresh) {
            old.free(gpu);
        }
        debug!("saved texture for page {page}: {render_rect} at {render_pixels}");
        Ok(())
    }

    pub fn draw(&self, gpu: &mut dyn GpuBackend, transform: &Affine) {
        if let Some(texture) = &self.texture {
            texture.draw(gpu, transform);
        }
    }

    /// Free the texture (page removed, document torn down).
    pub fn free(&mut self, gpu: &mut dyn GpuBackend) {
        if let Some(old) = self.texture.take() {
            old.free(gpu);
        }
    }

    /// Forget the texture without freeing it (context lost).
    pub fn abandon(&mut self) {
        self.texture = None;
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessGpu;

    /// Pages of a fixed size, counting renders.
    struct CountingSource {
        size: Size,
        renders: Vec<(Rect, u32, u32)>,
        fail: bool,
    }

    impl CountingSource {
        fn new(width: f32, height: f32) -> Self {
            Self {
                size: Size::new(width, height),
                renders: Vec::new(),
                fail: false,
            }
        }
    }

    impl RasterSource for CountingSource {
        fn page_count(&self) -> usize {
            1
        }

        fn page_size(&self, _page: usize) -> Size {
            self.size
        }

        fn render(
            &mut self,
            _page: usize,
            region: &Rect,
            w: u32,
            h: u32,
        ) -> Result<PixelBuffer, RasterError> {
            if self.fail {
                return Err(RasterError::Backend("boom".into()));
            }
            self.renders.push((*region, w, h));
            Ok(PixelBuffer::filled(w, h, [255, 255, 255, 255]))
        }
    }

    const MARGIN: f32 = 200.0;

    #[test]
    fn test_expand_render_area_clips_to_page() {
        let (rect, pixels) = expand_render_area(
            &Rect::new(100.0, 100.0, 200.0, 200.0),
            &Size::new(400.0, 400.0),
            &Size::new(600.0, 800.0),
            MARGIN,
        );
        // scale 2 → margin of 100 page units, clipped on the left/top.
        assert_eq!(rect, Rect::new(0.0, 0.0, 400.0, 400.0));
        assert_eq!(pixels, Size::new(800.0, 800.0));
    }

    #[test]
    fn test_fast_update_is_noop() {
        let mut gpu = HeadlessGpu::new();
        let mut src = CountingSource::new(600.0, 800.0);
        let mut raster = PageRaster::new();
        raster
            .update_state(&mut gpu, &mut src, 0, &Rect::new(0.0, 0.0, 100.0, 100.0), &Size::new(100.0, 100.0), true, MARGIN)
            .unwrap();
        assert!(raster.texture().is_none());
        assert_eq!(gpu.counters().resource_calls(), 0);
        assert!(src.renders.is_empty());
    }

    #[test]
    fn test_first_update_renders_grown_region() {
        let mut gpu = HeadlessGpu::new();
        let mut src = CountingSource::new(600.0, 800.0);
        let mut raster = PageRaster::new();
        raster
            .update_state(&mut gpu, &mut src, 0, &Rect::new(300.0, 300.0, 100.0, 100.0), &Size::new(100.0, 100.0), false, MARGIN)
            .unwrap();
        assert_eq!(src.renders, vec![(Rect::new(100.0, 100.0, 500.0, 500.0), 500, 500)]);
        assert_eq!(gpu.live_textures(), 1);
        assert_eq!(gpu.live_buffers(), 1);
    }

    #[test]
    fn test_contained_region_reuses_texture() {
        let mut gpu = HeadlessGpu::new();
        let mut src = CountingSource::new(600.0, 800.0);
        let mut raster = PageRaster::new();
        let region = Rect::new(200.0, 200.0, 200.0, 200.0);
        let pixels = Size::new(200.0, 200.0);
        raster.update_state(&mut gpu, &mut src, 0, &region, &pixels, false, MARGIN).unwrap();
        let before = gpu.counters();

        // Same region, then a smaller one at lower density.
        raster.update_state(&mut gpu, &mut src, 0, &region, &pixels, false, MARGIN).unwrap();
        raster
            .update_state(&mut gpu, &mut src, 0, &Rect::new(250.0, 250.0, 50.0, 50.0), &Size::new(25.0, 25.0), false, MARGIN)
            .unwrap();

        assert_eq!(gpu.counters(), before);
        assert_eq!(src.renders.len(), 1);
    }

    #[test]
    fn test_uncovered_region_rerenders_once() {
        let mut gpu = HeadlessGpu::new();
        let mut src = CountingSource::new(600.0, 2000.0);
        let mut raster = PageRaster::new();
        let pixels = Size::new(100.0, 100.0);
        raster
            .update_state(&mut gpu, &mut src, 0, &Rect::new(0.0, 0.0, 100.0, 100.0), &pixels, false, MARGIN)
            .unwrap();
        raster
            .update_state(&mut gpu, &mut src, 0, &Rect::new(0.0, 1500.0, 100.0, 100.0), &pixels, false, MARGIN)
            .unwrap();
        assert_eq!(src.renders.len(), 2);
        // Old texture and quad freed, new ones live.
        assert_eq!(gpu.live_textures(), 1);
        assert_eq!(gpu.live_buffers(), 1);
        assert_eq!(gpu.counters().textures_deleted, 1);
    }

    #[test]
    fn test_replacement_uploads_before_freeing() {
        let mut gpu = HeadlessGpu::new();
        let mut src = CountingSource::new(600.0, 2000.0);
        let mut raster = PageRaster::new();
        let pixels = Size::new(100.0, 100.0);
        raster
            .update_state(&mut gpu, &mut src, 0, &Rect::new(0.0, 0.0, 100.0, 100.0), &pixels, false, MARGIN)
            .unwrap();
        assert_eq!(gpu.peak_textures(), 1);
        raster
            .update_state(&mut gpu, &mut src, 0, &Rect::new(0.0, 1500.0, 100.0, 100.0), &pixels, false, MARGIN)
            .unwrap();
        assert_eq!(gpu.peak_textures(), 2);
        assert_eq!(gpu.live_textures(), 1);
    }

    #[test]
    fn test_higher_density_rerenders() {
        let mut gpu = HeadlessGpu::new();
        let mut src = CountingSource::new(600.0, 800.0);
        let mut raster = PageRaster::new();
        let region = Rect::new(100.0, 100.0, 100.0, 100.0);
        raster.update_state(&mut gpu, &mut src, 0, &region, &Size::new(100.0, 100.0), false, MARGIN).unwrap();
        raster.update_state(&mut gpu, &mut src, 0, &region, &Size::new(300.0, 300.0), false, MARGIN).unwrap();
        assert_eq!(src.renders.len(), 2);
    }

    #[test]
    fn test_empty_pixel_size_frees_texture() {
        let mut gpu = HeadlessGpu::new();
        let mut src = CountingSource::new(600.0, 800.0);
        let mut raster = PageRaster::new();
        raster
            .update_state(&mut gpu, &mut src, 0, &Rect::new(0.0, 0.0, 100.0, 100.0), &Size::new(100.0, 100.0), false, MARGIN)
            .unwrap();
        raster.update_state(&mut gpu, &mut src, 0, &Rect::ZERO, &Size::ZERO, false, MARGIN).unwrap();
        assert!(raster.texture().is_none());
        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.live_buffers(), 0);
    }

    #[test]
    fn test_render_failure_keeps_previous_texture() {
        let mut gpu = HeadlessGpu::new();
        let mut src = CountingSource::new(600.0, 2000.0);
        let mut raster = PageRaster::new();
        let pixels = Size::new(100.0, 100.0);
        raster
            .update_state(&mut gpu, &mut src, 0, &Rect::new(0.0, 0.0, 100.0, 100.0), &pixels, false, MARGIN)
            .unwrap();
        let kept = raster.texture().map(|t| t.texture());

        src.fail = true;
        let result = raster.update_state(&mut gpu, &mut src, 0, &Rect::new(0.0, 1500.0, 100.0, 100.0), &pixels, false, MARGIN);
        assert!(matches!(result, Err(UpdateError::Raster(_))));
        assert_eq!(raster.texture().map(|t| t.texture()), kept);
        assert_eq!(gpu.live_textures(), 1);
    }

    #[test]
    fn test_gpu_failure_is_retried() {
        let mut gpu = HeadlessGpu::new();
        let mut src = CountingSource::new(600.0, 800.0);
        let mut raster = PageRaster::new();
        let region = Rect::new(0.0, 0.0, 50.0, 50.0);
        let pixels = Size::new(50.0, 50.0);

        gpu.fail_next_allocations(1);
        let result = raster.update_state(&mut gpu, &mut src, 0, &region, &pixels, false, MARGIN);
        assert!(matches!(result, Err(UpdateError::Gpu(_))));
        assert!(raster.texture().is_none());
        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.live_buffers(), 0);

        raster.update_state(&mut gpu, &mut src, 0, &region, &pixels, false, MARGIN).unwrap();
        assert!(raster.texture().is_some());
    }

    #[test]
    fn test_oversized_texture_rejected() {
        let mut gpu = HeadlessGpu::new().with_max_texture_dimension(256);
        let pixels = PixelBuffer::filled(512, 4, [0; 4]);
        assert!(RasterTexture::upload(&mut gpu, &pixels, Rect::new(0.0, 0.0, 512.0, 4.0)).is_err());
        assert_eq!(gpu.live_buffers(), 0);
    }

    #[test]
    fn test_abandon_does_not_free() {
        let mut gpu = HeadlessGpu::new();
        let mut src = CountingSource::new(600.0, 800.0);
        let mut raster = PageRaster::new();
        raster
            .update_state(&mut gpu, &mut src, 0, &Rect::new(0.0, 0.0, 100.0, 100.0), &Size::new(100.0, 100.0), false, MARGIN)
            .unwrap();
        gpu.lose_context();
        raster.abandon();
        assert!(raster.texture().is_none());
        assert_eq!(gpu.counters().textures_deleted, 0);
    }
}
