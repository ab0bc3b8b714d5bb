//! The document view: layout, viewport, redraw scheduling and gestures
//! wired around a [`Document`].
//!
//! ```text
//!  host events ──► DocView::handle_pointer / scroll_by / zoom_at
//!                        │  (state changes, redraw requested)
//!                        ▼
//!                 RedrawScheduler  ── host asks for a frame when this
//!                        │             returns true
//!  frame ──► DocView::on_animation_frame
//!                        │  gestures.on_frame → scroll/zoom
//!                        │  update_gl_state(fast)
//!                        ▼
//!            DocView::draw_gl ──► borders, page textures, overlays
//! ```

use log::{debug, info, warn};

use crate::border::BorderGeometry;
use crate::config::ViewerConfig;
use crate::document::{Document, OverlayRef, PageUpdate};
use crate::geometry::{Point, Range, Rect, Size};
use crate::gesture::{pivot_scroll, GestureOutput, GestureRecognizer, PointerEvent};
use crate::gpu::GpuBackend;
use crate::layout::PageLayout;
use crate::overlay::{Overlay, Tool};
use crate::redraw::RedrawScheduler;
use crate::source::RasterSource;
use crate::text::{EditorDelegate, TextEngine};
use crate::transform::TransformStack;
use crate::viewport::Viewport;

/// Counters for tests and periodic logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewStats {
    /// `update_gl_state` runs.
    pub updates: u64,
    /// `draw_gl` runs.
    pub draws: u64,
    /// Redraw requests, coalesced or not.
    pub renders_requested: u64,
}

pub struct DocView<S> {
    config: ViewerConfig,
    document: Document<S>,
    layout: PageLayout,
    viewport: Viewport,
    border: BorderGeometry,
    scheduler: RedrawScheduler,
    gestures: GestureRecognizer,
    tool: Tool,
    text_engine: Option<Box<dyn TextEngine>>,
    editor: Option<Box<dyn EditorDelegate>>,
    /// Pages updated by the last `update_gl_state`.
    visible_range: Range,
    /// Pages whose rasters may still hold textures. Fast passes never
    /// free, so this only shrinks on a full pass.
    live_range: Range,
    /// Overlay receiving placement events.
    placing: Option<OverlayRef>,
    stats: ViewStats,
}

impl<S: RasterSource> DocView<S> {
    /// An invalid `config` is used anyway, with zoom kept inside
    /// [`ViewerConfig::zoom_bounds`].
    pub fn new(source: S, config: ViewerConfig) -> Self {
        let (min_zoom, max_zoom) = config.zoom_bounds();
        if let Err(e) = config.validate() {
            warn!("{e}; zoom limited to {min_zoom}..{max_zoom}");
        }
        let document = Document::new(source, config.render_margin_px);
        let mut view = Self {
            viewport: Viewport::new(config.clamp_zoom(config.initial_zoom)),
            gestures: GestureRecognizer::new(min_zoom, max_zoom),
            config,
            document,
            layout: PageLayout::default(),
            border: BorderGeometry::new(),
            scheduler: RedrawScheduler::new(),
            tool: Tool::None,
            text_engine: None,
            editor: None,
            visible_range: Range::EMPTY,
            live_range: Range::EMPTY,
            placing: None,
            stats: ViewStats::default(),
        };
        view.pages_changed();
        view
    }

    pub fn with_text_engine(mut self, engine: Box<dyn TextEngine>) -> Self {
        self.text_engine = Some(engine);
        self
    }

    pub fn with_editor(mut self, editor: Box<dyn EditorDelegate>) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn document(&self) -> &Document<S> {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document<S> {
        &mut self.document
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn stats(&self) -> ViewStats {
        self.stats
    }

    pub fn visible_range(&self) -> Range {
        self.visible_range
    }

    pub fn editor(&self) -> Option<&dyn EditorDelegate> {
        self.editor.as_deref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut (dyn EditorDelegate + 'static)> {
        self.editor.as_deref_mut()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    // ───────────────────────────────────────────────────────────────
    // Layout, scroll, zoom
    // ───────────────────────────────────────────────────────────────

    /// Recompute the layout after the page list changed.
    pub fn pages_changed(&mut self) -> bool {
        self.layout = PageLayout::compute(&self.document.page_sizes(), self.config.page_border);
        self.viewport.set_content_size(self.layout.size());
        self.border.invalidate();
        debug!(
            "layout: {} pages, content {}",
            self.layout.page_count(),
            self.layout.size()
        );
        self.request_redraw(false)
    }

    /// Document size at the current zoom (for host scrollbars).
    pub fn content_size(&self) -> Size {
        self.viewport.scaled_content_size()
    }

    pub fn set_viewport_size(&mut self, size: Size, device_pixel_ratio: f32) -> bool {
        self.viewport.set_size(size, device_pixel_ratio);
        self.request_redraw(false)
    }

    pub fn scroll_to(&mut self, scroll: Point) -> bool {
        if self.viewport.set_scroll(scroll) {
            return self.request_redraw(false);
        }
        false
    }

    pub fn scroll_by(&mut self, dx: f32, dy: f32) -> bool {
        let scroll = self.viewport.scroll().offset(dx, dy);
        self.scroll_to(scroll)
    }

    /// Zoom by `factor` keeping the viewport point `pivot` fixed.
    pub fn zoom_at(&mut self, pivot: Point, factor: f32) -> bool {
        let zoom = self.viewport.zoom();
        let new_zoom = self.config.clamp_zoom(zoom * factor);
        let scroll = pivot_scroll(self.viewport.scroll(), new_zoom / zoom, pivot, pivot);
        if self.viewport.set_zoom_and_scroll(new_zoom, scroll) {
            return self.request_redraw(false);
        }
        false
    }

    /// Zoom around the viewport centre.
    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        let size = self.viewport.size();
        let centre = Point::new(size.width / 2.0, size.height / 2.0);
        self.zoom_at(centre, zoom / self.viewport.zoom())
    }

    // ───────────────────────────────────────────────────────────────
    // Coordinate conversion
    // ───────────────────────────────────────────────────────────────

    /// Page under a viewport point, with the point in page space.
    pub fn page_at(&self, point: Point) -> Option<(usize, Point)> {
        let doc = self.viewport.viewport_to_document(point);
        let page = self.layout.page_at(&doc)?;
        Some((page, self.viewport_to_page(page, point)))
    }

    pub fn viewport_to_page(&self, page: usize, point: Point) -> Point {
        let origin = self.page_origin(page);
        let doc = self.viewport.viewport_to_document(point);
        Point::new(doc.x - origin.x, doc.y - origin.y)
    }

    pub fn page_to_viewport(&self, page: usize, point: Point) -> Point {
        let origin = self.page_origin(page);
        self.viewport
            .document_to_viewport(Point::new(point.x + origin.x, point.y + origin.y))
    }

    pub fn page_rect_to_viewport(&self, page: usize, rect: &Rect) -> Rect {
        let origin = self.page_origin(page);
        self.viewport
            .document_rect_to_viewport(&rect.translated(origin.x, origin.y))
    }

    fn page_origin(&self, page: usize) -> Point {
        self.layout.page_rect(page).map(|r| r.origin).unwrap_or(Point::ZERO)
    }

    // ───────────────────────────────────────────────────────────────
    // Redraw
    // ───────────────────────────────────────────────────────────────

    /// Ask for a redraw. Returns `true` when the host must schedule a
    /// frame (no redraw was pending).
    pub fn request_redraw(&mut self, fast: bool) -> bool {
        self.stats.renders_requested += 1;
        self.scheduler.request(fast)
    }

    pub fn redraw_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Run the coalesced work for this frame. Returns whether an update
    /// ran (and the host should draw).
    pub fn on_animation_frame(&mut self, gpu: &mut dyn GpuBackend) -> bool {
        let outputs = self
            .gestures
            .on_frame(self.viewport.zoom(), self.viewport.scroll());
        for output in outputs {
            self.apply_gesture(output);
        }
        match self.scheduler.take() {
            Some(fast) => {
                self.update_gl_state(gpu, fast);
                true
            }
            None => false,
        }
    }

    /// Bring borders, page textures and overlays up to date with the
    /// visible rectangle.
    pub fn update_gl_state(&mut self, gpu: &mut dyn GpuBackend, fast: bool) {
        self.stats.updates += 1;
        let visible = self.viewport.visible_rect();
        let range = if self.viewport.size().is_empty() {
            Range::EMPTY
        } else {
            self.layout.range_intersecting(&visible)
        };
        self.border
            .update(gpu, &self.layout, range, self.config.frame_width);

        let scale = self.viewport.pixel_scale();
        // Pages that left the view since the last full pass are in the
        // live range only.
        for page in self.live_range.union(&range).iter() {
            let Some(page_rect) = self.layout.page_rect(page) else {
                continue;
            };
            let shown = page_rect.intersect(&visible);
            let update = if !range.contains(page) || shown.is_empty() {
                PageUpdate::offscreen(fast, scale)
            } else {
                PageUpdate {
                    fast,
                    region: shown.translated(-page_rect.origin.x, -page_rect.origin.y),
                    pixel_size: shown.size.scaled(scale),
                    scale,
                }
            };
            self.document
                .update_gl_state(gpu, page, &update, self.text_engine.as_deref());
        }
        self.live_range = if fast {
            self.live_range.union(&range)
        } else {
            range
        };
        self.visible_range = range;
    }

    /// Draw borders, then each visible page with its overlays.
    pub fn draw_gl(&mut self, gpu: &mut dyn GpuBackend) {
        if self.viewport.size().is_empty() {
            return;
        }
        self.stats.draws += 1;
        let document_to_clip = self.viewport.document_to_clip();
        self.border.draw(gpu, &document_to_clip);

        let mut transforms = TransformStack::new(document_to_clip);
        for page in self.visible_range.iter() {
            let Some(page_rect) = self.layout.page_rect(page) else {
                continue;
            };
            transforms.save();
            transforms.translate(page_rect.origin.x, page_rect.origin.y);
            self.document.draw_gl(gpu, page, &transforms.current());
            transforms.restore();
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Pointer input
    // ───────────────────────────────────────────────────────────────

    /// Feed one pointer event. Returns `true` when the host must
    /// schedule a frame.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> bool {
        let was_pending = self.scheduler.is_pending();
        let outputs = self.gestures.handle(
            event,
            self.tool != Tool::None,
            self.viewport.zoom(),
            self.viewport.scroll(),
        );
        for output in outputs {
            self.apply_gesture(output);
        }
        if self.gestures.has_pending_move() {
            self.request_redraw(true);
        }
        !was_pending && self.scheduler.is_pending()
    }

    fn apply_gesture(&mut self, output: GestureOutput) {
        match output {
            GestureOutput::PlaceStart(point) => self.place_start(point),
            GestureOutput::PlaceMove(point) => {
                if let Some(at) = self.placing {
                    let p = self.viewport_to_page(at.page, point);
                    if let Some(overlay) = self.document.overlay_mut(at) {
                        overlay.place_move(p);
                    }
                    self.request_redraw(true);
                }
            }
            GestureOutput::PlaceEnd(point) => self.place_end(point),
            GestureOutput::Pan(scroll) => {
                if self.viewport.set_scroll(scroll) {
                    self.request_redraw(true);
                }
            }
            GestureOutput::Zoom { zoom, scroll } => {
                if self.viewport.set_zoom_and_scroll(zoom, scroll) {
                    self.request_redraw(true);
                }
            }
            GestureOutput::Ended => {
                self.request_redraw(false);
            }
        }
    }

    fn place_start(&mut self, point: Point) {
        let Some((page, p)) = self.page_at(point) else {
            debug!("placement outside any page at {point}");
            return;
        };
        let Some(mut overlay) = Overlay::new(self.tool, &self.config) else {
            return;
        };
        overlay.place_start(p);
        self.placing = self.document.add_overlay(page, overlay);
        self.request_redraw(true);
    }

    fn place_end(&mut self, point: Point) {
        let Some(at) = self.placing.take() else {
            return;
        };
        let p = self.viewport_to_page(at.page, point);
        let editable = match self.document.overlay_mut(at) {
            Some(overlay) => {
                overlay.place_end(p);
                overlay.is_editable()
            }
            None => false,
        };
        if editable {
            self.start_editing(at);
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Editing
    // ───────────────────────────────────────────────────────────────

    pub fn editing(&self) -> Option<OverlayRef> {
        self.document.editing()
    }

    /// Open the host editor on an overlay. Needs an editor delegate.
    pub fn start_editing(&mut self, at: OverlayRef) -> bool {
        let Some(bounds) = self.document.overlay(at).map(|o| o.bounds()) else {
            return false;
        };
        let rect = self.page_rect_to_viewport(at.page, &bounds);
        let Some(editor) = self.editor.as_deref_mut() else {
            debug!("no editor delegate; overlay stays closed");
            return false;
        };
        let started = self.document.start_editing(at, editor, rect);
        self.request_redraw(false);
        started
    }

    pub fn stop_editing(&mut self) {
        if let Some(editor) = self.editor.as_deref_mut() {
            self.document.stop_editing(editor);
        }
        self.request_redraw(false);
    }

    // ───────────────────────────────────────────────────────────────
    // GPU lifecycle
    // ───────────────────────────────────────────────────────────────

    /// The GPU context was lost: abandon every handle and redraw.
    pub fn gl_state_lost(&mut self) -> bool {
        info!("GPU context lost; abandoning all textures and buffers");
        self.document.gl_state_lost();
        self.border.gl_state_lost();
        self.live_range = Range::EMPTY;
        self.request_redraw(false)
    }

    /// Free every GPU resource (teardown).
    pub fn release_gl(&mut self, gpu: &mut dyn GpuBackend) {
        self.document.release_gl(gpu);
        self.border.free(gpu);
        self.visible_range = Range::EMPTY;
        self.live_range = Range::EMPTY;
    }

    /// Swap the page source, freeing everything owned by the old pages.
    pub fn replace_source(&mut self, gpu: &mut dyn GpuBackend, source: S) -> S {
        let editor = self
            .editor
            .as_mut()
            .map(|e| &mut **e as &mut dyn EditorDelegate);
        let old = self.document.replace_source(gpu, source, editor);
        self.placing = None;
        self.visible_range = Range::EMPTY;
        self.live_range = Range::EMPTY;
        self.pages_changed();
        old
    }
}

// ===================================================================
// Tests
// ===================================================================
