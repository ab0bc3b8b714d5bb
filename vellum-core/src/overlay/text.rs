//! Rich-text boxes.
//!
//! The box is laid out and rasterized by a [`TextLayout`]; the resulting
//! pixels are cached in a [`RasterTexture`] keyed by wrap width, scale and
//! content.  While the box is being edited the host editor covers it and
//! nothing is drawn.

use log::{debug, warn};

use crate::config::ViewerConfig;
use crate::geometry::{Point, Rect};
use crate::gpu::GpuBackend;
use crate::raster::RasterTexture;
use crate::text::{EditorDelegate, EditorSession, TextLayout};
use crate::transform::Affine;

use super::{OverlayId, OverlayState, OverlayUpdate};

/// Page units a cached raster may fall short of the visible text before
/// it counts as not covering it (float rounding of the pixel size).
const COVER_SLACK: f32 = 1e-3;

pub struct TextOverlay {
    id: OverlayId,
    state: OverlayState,
    bounds: Rect,
    /// False when the box was placed with a click: it then grows with its
    /// content instead of wrapping at its width.
    fixed_width: bool,
    html: String,
    session: Option<EditorSession>,
    layout: Option<Box<dyn TextLayout>>,
    raster: Option<RasterTexture>,
    rendered_scale: f32,
    /// Scale and clip of the last render or upload that failed. The same
    /// request is not repeated until the view or the content changes.
    failed: Option<(f32, Rect)>,
    content_dirty: bool,
    min_width: f32,
    zoom_tolerance: f32,
}

impl std::fmt::Debug for TextOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextOverlay")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("bounds", &self.bounds)
            .field("fixed_width", &self.fixed_width)
            .field("html", &self.html)
            .finish_non_exhaustive()
    }
}

impl TextOverlay {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            id: OverlayId::new(),
            state: OverlayState::Idle,
            bounds: Rect::ZERO,
            fixed_width: false,
            html: String::new(),
            session: None,
            layout: None,
            raster: None,
            rendered_scale: 0.0,
            failed: None,
            content_dirty: true,
            min_width: config.min_text_box_width,
            zoom_tolerance: config.text_zoom_tolerance,
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

    pub fn is_fixed_width(&self) -> bool {
        self.fixed_width
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Replace the content outside of an editing session.
    pub fn set_html(&mut self, html: impl Into<String>) {
        self.html = html.into();
        self.content_dirty = true;
        self.failed = None;
    }

    pub fn place_start(&mut self, point: Point) {
        self.bounds = Rect::from_origin_size(point, Default::default());
        self.state = OverlayState::Placing;
    }

    pub fn place_move(&mut self, _point: Point) {}

    pub fn place_end(&mut self, point: Point) {
        self.bounds.expand_to_include(&point);
        self.fixed_width = self.bounds.size.width >= self.min_width;
        self.state = OverlayState::Placed;
        debug!(
            "text overlay {} placed at {} (fixed width: {})",
            self.id, self.bounds, self.fixed_width
        );
    }

    pub fn start_editing(&mut self, delegate: &mut dyn EditorDelegate, viewport_rect: Rect) {
        if self.session.is_some() {
            return;
        }
        let session = delegate.place_editor(self.id, &self.html, viewport_rect);
        debug!("editor {session:?} placed for {} at {viewport_rect}", self.id);
        self.session = Some(session);
        self.state = OverlayState::Editing;
    }

    pub fn stop_editing(&mut self, delegate: &mut dyn EditorDelegate) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.html = delegate.editor_html(session);
        delegate.remove_editor(session);
        self.content_dirty = true;
        self.failed = None;
        self.state = OverlayState::Placed;
        debug!("editor {session:?} removed from {}", self.id);
    }

    fn wrap_width(&self) -> f32 {
        if self.fixed_width {
            self.bounds.size.width
        } else {
            f32::INFINITY
        }
    }

    fn scale_changed(&self, scale: f32) -> bool {
        (scale - self.rendered_scale).abs() > self.zoom_tolerance * self.rendered_scale
    }

    pub fn update_gl_state(&mut self, gpu: &mut dyn GpuBackend, update: &OverlayUpdate<'_>) {
        if update.fast || self.state == OverlayState::Editing || self.state == OverlayState::Placing {
            return;
        }
        if self.layout.is_none() {
            let Some(engine) = update.text_engine.filter(|e| e.is_ready()) else {
                return;
            };
            match engine.create_layout() {
                Ok(layout) => {
                    self.layout = Some(layout);
                    self.content_dirty = true;
                }
                Err(e) => {
                    warn!("text overlay {}: {e}", self.id);
                    return;
                }
            }
        }

        let wrap_width = self.wrap_width();
        let scale_changed = self.scale_changed(update.scale);
        let Some(layout) = self.layout.as_mut() else {
            return;
        };
        if self.content_dirty {
            layout.set_html(&self.html);
        }
        let rewrapped = layout.wrap(wrap_width);
        if rewrapped {
            self.failed = None;
        }
        let wrapped = rewrapped || self.content_dirty;
        let text_size = layout.size();
        if self.fixed_width {
            self.bounds.size.height = self.bounds.size.height.max(text_size.height);
        } else {
            self.bounds.size = text_size;
        }

        // The cached raster only covers what was on screen (plus margin)
        // when it was made.
        let text_rect = Rect::from_origin_size(self.bounds.origin, text_size);
        let needed = text_rect.intersect(&update.visible);
        let uncovered = !needed.is_empty()
            && self
                .raster
                .as_ref()
                .is_some_and(|r| !r.page_rect().outset(COVER_SLACK).contains(&needed));
        let stale = self.raster.is_none() || wrapped || scale_changed || uncovered;
        if !stale {
            return;
        }

        if self.html.is_empty() {
            if let Some(old) = self.raster.take() {
                old.free(gpu);
            }
            self.content_dirty = false;
            return;
        }

        let clip = text_rect.intersect(&update.clip);
        if clip.is_empty() {
            return;
        }
        if self.failed == Some((update.scale, clip)) {
            return;
        }
        let longest = clip.size.width.max(clip.size.height);
        let limit = (update.max_texture_dimension as f32 - 1.0).max(1.0);
        let zoom = update.scale.min(limit / longest);
        if zoom < update.scale {
            debug!(
                "text overlay {}: {clip} at {} capped to zoom {zoom}",
                self.id, update.scale
            );
        }

        let rendered = match layout.render(self.bounds.origin, &clip, zoom) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!("text overlay {}: {e}", self.id);
                self.failed = Some((update.scale, clip));
                return;
            }
        };
        let fresh = match RasterTexture::upload(gpu, &rendered.pixels, rendered.rect) {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("text overlay {}: {e}", self.id);
                self.failed = Some((update.scale, clip));
                return;
            }
        };
        if let Some(old) = self.raster.replace(fresh) {
            old.free(gpu);
        }
        self.rendered_scale = update.scale;
        self.failed = None;
        self.content_dirty = false;
    }

    pub fn draw_gl(&self, gpu: &mut dyn GpuBackend, transform: &Affine) {
        if self.state == OverlayState::Editing {
            return;
        }
        if let Some(raster) = &self.raster {
            raster.draw(gpu, transform);
        }
    }

    pub fn gl_state_lost(&mut self) {
        self.raster = None;
        self.rendered_scale = 0.0;
        self.failed = None;
    }

    pub fn free(&mut self, gpu: &mut dyn GpuBackend) {
        if let Some(raster) = self.raster.take() {
            raster.free(gpu);
        }
        self.rendered_scale = 0.0;
    }
}

// ===================================================================
// Tests
// ===================================================================
