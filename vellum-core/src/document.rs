//! The document model: pages from a [`RasterSource`], each with a
//! texture cache and an ordered overlay list.

use log::{debug, warn};

use crate::geometry::{Rect, Size};
use crate::gpu::GpuBackend;
use crate::overlay::{Overlay, OverlayId, OverlayUpdate};
use crate::raster::{expand_render_area, PageRaster};
use crate::source::RasterSource;
use crate::text::{EditorDelegate, TextEngine};
use crate::transform::Affine;

#[derive(Debug, Default)]
struct Page {
    raster: PageRaster,
    /// Insertion order is z-order.
    overlays: Vec<Overlay>,
}

/// What one page should show this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageUpdate {
    pub fast: bool,
    /// Visible part of the page, page space. Empty when off screen.
    pub region: Rect,
    /// `region` in device pixels. Empty when off screen.
    pub pixel_size: Size,
    /// Device pixels per page unit.
    pub scale: f32,
}

impl PageUpdate {
    /// The update for a page that scrolled out of view.
    pub fn offscreen(fast: bool, scale: f32) -> Self {
        Self {
            fast,
            region: Rect::ZERO,
            pixel_size: Size::ZERO,
            scale,
        }
    }
}

/// Where an overlay lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayRef {
    pub page: usize,
    pub index: usize,
}

pub struct Document<S> {
    source: S,
    pages: Vec<Page>,
    editing: Option<OverlayRef>,
    render_margin_px: f32,
}

impl<S: RasterSource> Document<S> {
    pub fn new(source: S, render_margin_px: f32) -> Self {
        let pages = (0..source.page_count()).map(|_| Page::default()).collect();
        Self {
            source,
            pages,
            editing: None,
            render_margin_px,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn page_count(&self) -> usize {
        self.source.page_count()
    }

    pub fn page_size(&self, page: usize) -> Size {
        self.source.page_size(page)
    }

    pub fn page_sizes(&self) -> Vec<Size> {
        (0..self.page_count()).map(|i| self.page_size(i)).collect()
    }

    /// Append `overlay` to `page`. Returns its position, or `None` when
    /// the page does not exist.
    pub fn add_overlay(&mut self, page: usize, overlay: Overlay) -> Option<OverlayRef> {
        let entry = self.pages.get_mut(page)?;
        entry.overlays.push(overlay);
        Some(OverlayRef {
            page,
            index: entry.overlays.len() - 1,
        })
    }

    pub fn overlays(&self, page: usize) -> &[Overlay] {
        self.pages.get(page).map(|p| p.overlays.as_slice()).unwrap_or(&[])
    }

    pub fn overlay(&self, at: OverlayRef) -> Option<&Overlay> {
        self.pages.get(at.page)?.overlays.get(at.index)
    }

    pub fn overlay_mut(&mut self, at: OverlayRef) -> Option<&mut Overlay> {
        self.pages.get_mut(at.page)?.overlays.get_mut(at.index)
    }

    pub fn find_overlay(&self, id: OverlayId) -> Option<OverlayRef> {
        self.pages.iter().enumerate().find_map(|(page, p)| {
            p.overlays
                .iter()
                .position(|o| o.id() == id)
                .map(|index| OverlayRef { page, index })
        })
    }

    pub fn page_raster(&self, page: usize) -> Option<&PageRaster> {
        self.pages.get(page).map(|p| &p.raster)
    }

    /// Update the page texture, then every overlay on the page.
    pub fn update_gl_state(
        &mut self,
        gpu: &mut dyn GpuBackend,
        page: usize,
        update: &PageUpdate,
        text_engine: Option<&dyn TextEngine>,
    ) {
        if page >= self.pages.len() {
            return;
        }
        let page_size = self.source.page_size(page);
        let entry = &mut self.pages[page];
        if let Err(e) = entry.raster.update_state(
            gpu,
            &mut self.source,
            page,
            &update.region,
            &update.pixel_size,
            update.fast,
            self.render_margin_px,
        ) {
            warn!("page {page} not rendered: {e}");
        }
        // Overlays off screen keep their GPU state; they are cheap.
        if update.pixel_size.is_empty() || update.region.is_empty() {
            return;
        }
        let (clip, _) = expand_render_area(
            &update.region,
            &update.pixel_size,
            &page_size,
            self.render_margin_px,
        );
        let overlay_update = OverlayUpdate {
            fast: update.fast,
            scale: update.scale,
            visible: update.region,
            clip,
            max_texture_dimension: gpu.max_texture_dimension(),
            text_engine,
        };
        for overlay in &mut entry.overlays {
            overlay.update_gl_state(gpu, &overlay_update);
        }
    }

    /// Draw the page texture then its overlays, all with
    /// `page_to_clip`.
    pub fn draw_gl(&self, gpu: &mut dyn GpuBackend, page: usize, page_to_clip: &Affine) {
        let Some(entry) = self.pages.get(page) else {
            return;
        };
        entry.raster.draw(gpu, page_to_clip);
        for overlay in &entry.overlays {
            overlay.draw_gl(gpu, page_to_clip);
        }
    }

    // ── editing ─────────────────────────────────────────────────────

    pub fn editing(&self) -> Option<OverlayRef> {
        self.editing
    }

    /// Start editing the overlay at `at`, stopping whichever overlay was
    /// being edited first.  Returns `false` if it is not editable.
    pub fn start_editing(
        &mut self,
        at: OverlayRef,
        delegate: &mut dyn EditorDelegate,
        viewport_rect: Rect,
    ) -> bool {
        match self.overlay(at) {
            Some(o) if o.is_editable() => {}
            _ => return false,
        }
        if self.editing == Some(at) {
            return true;
        }
        self.stop_editing(delegate);
        if let Some(overlay) = self.overlay_mut(at) {
            overlay.start_editing(delegate, viewport_rect);
            debug!("editing overlay {} on page {}", overlay.id(), at.page);
        }
        self.editing = Some(at);
        true
    }

    pub fn stop_editing(&mut self, delegate: &mut dyn EditorDelegate) {
        let Some(at) = self.editing.take() else {
            return;
        };
        if let Some(overlay) = self.overlay_mut(at) {
            overlay.stop_editing(delegate);
        }
    }

    // ── GPU lifecycle ───────────────────────────────────────────────

    /// Every handle became invalid at once: forget them without freeing.
    pub fn gl_state_lost(&mut self) {
        for page in &mut self.pages {
            page.raster.abandon();
            for overlay in &mut page.overlays {
                overlay.gl_state_lost();
            }
        }
    }

    /// Free every texture and overlay resource.
    pub fn release_gl(&mut self, gpu: &mut dyn GpuBackend) {
        for page in &mut self.pages {
            page.raster.free(gpu);
            for overlay in &mut page.overlays {
                overlay.free(gpu);
            }
        }
    }

    /// Swap in a new source, freeing everything owned by the old pages.
    /// Overlays belong to the old pages and are dropped with them.
    pub fn replace_source(
        &mut self,
        gpu: &mut dyn GpuBackend,
        source: S,
        delegate: Option<&mut dyn EditorDelegate>,
    ) -> S {
        if let Some(delegate) = delegate {
            self.stop_editing(delegate);
        }
        self.editing = None;
        self.release_gl(gpu);
        let old = std::mem::replace(&mut self.source, source);
        self.pages = (0..self.source.page_count()).map(|_| Page::default()).collect();
        old
    }
}

// ===================================================================
// Tests
// ===================================================================
