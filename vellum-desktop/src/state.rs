//! Application state: the document view and the GPU backend it draws
//! through.
//!
//! `AppState` works in logical pixels.  winit reports physical sizes and
//! cursor positions, so everything coming in is divided by the window's
//! scale factor first; the viewer multiplies it back when choosing raster
//! resolution.

use log::info;
use vellum_core::{
    DocView, Point, PointerEvent, PointerPhase, Size, Tool, ViewStats, ViewerConfig,
};
use vellum_render::{FrameStats, GpuContext, RenderError, WgpuBackend};
use vellum_text::{CosmicTextEngine, ParagraphStyle};

use crate::editor::InlineEditor;
use crate::pages::PageSource;

/// Zoom factor per wheel notch.
const WHEEL_ZOOM_STEP: f32 = 1.1;
/// Logical pixels scrolled per wheel line.
const WHEEL_LINE: f32 = 40.0;
/// Background behind the pages.
const CLEAR: (f64, f64, f64) = (0.32, 0.33, 0.36);

pub struct AppState {
    pub view: DocView<PageSource>,
    pub backend: WgpuBackend,
    pub editor: InlineEditor,
    scale_factor: f64,
    cursor: Point,
}

impl AppState {
    /// Build the view over `source` and size it to the window.
    pub fn new(
        gpu: GpuContext,
        source: PageSource,
        config: ViewerConfig,
        physical: (u32, u32),
        scale_factor: f64,
    ) -> Self {
        let editor = InlineEditor::new();
        let view = DocView::new(source, config)
            .with_text_engine(Box::new(CosmicTextEngine::new(ParagraphStyle::default())))
            .with_editor(Box::new(editor.clone()));
        let mut state = Self {
            view,
            backend: Self::backend_for(gpu),
            editor,
            scale_factor,
            cursor: Point::ZERO,
        };
        state.resize(physical.0, physical.1, scale_factor);
        state
    }

    fn backend_for(gpu: GpuContext) -> WgpuBackend {
        let mut backend = WgpuBackend::new(gpu);
        backend.set_clear_color(CLEAR.0, CLEAR.1, CLEAR.2, 1.0);
        backend
    }

    fn to_logical(&self, x: f64, y: f64) -> Point {
        Point::new((x / self.scale_factor) as f32, (y / self.scale_factor) as f32)
    }

    /// Window resized or moved to a monitor with another scale factor.
    /// Returns `true` when a frame must be scheduled.
    pub fn resize(&mut self, width: u32, height: u32, scale_factor: f64) -> bool {
        self.scale_factor = scale_factor;
        self.backend.context_mut().resize(width, height);
        let logical = Size::new(
            (width as f64 / scale_factor) as f32,
            (height as f64 / scale_factor) as f32,
        );
        self.view.set_viewport_size(logical, scale_factor as f32)
    }

    // ───────────────────────────────────────────────────────────────
    // Input
    // ───────────────────────────────────────────────────────────────

    /// A pointer (mouse button 0 or a touch) in physical pixels.
    pub fn pointer(&mut self, id: u64, x: f64, y: f64, phase: PointerPhase) -> bool {
        let position = self.to_logical(x, y);
        if id == 0 {
            self.cursor = position;
        }
        self.view
            .handle_pointer(&PointerEvent::new(id, position.x, position.y, phase))
    }

    pub fn cursor_moved(&mut self, x: f64, y: f64) {
        self.cursor = self.to_logical(x, y);
    }

    /// Wheel lines scroll; with `zoom` they zoom around the cursor.
    pub fn wheel(&mut self, dx: f32, dy: f32, zoom: bool) -> bool {
        if zoom {
            let factor = WHEEL_ZOOM_STEP.powf(dy);
            return self.view.zoom_at(self.cursor, factor);
        }
        self.view.scroll_by(-dx * WHEEL_LINE, -dy * WHEEL_LINE)
    }

    /// Trackpad pixel deltas, physical.
    pub fn wheel_pixels(&mut self, dx: f64, dy: f64) -> bool {
        let d = self.to_logical(dx, dy);
        self.view.scroll_by(-d.x, -d.y)
    }

    pub fn set_tool(&mut self, tool: Tool) {
        info!("tool: {tool:?}");
        self.view.set_tool(tool);
    }

    /// Reset zoom to the configured initial value.
    pub fn reset_zoom(&mut self) -> bool {
        let zoom = self.view.config().initial_zoom;
        self.view.set_zoom(zoom)
    }

    // ───────────────────────────────────────────────────────────────
    // Frames
    // ───────────────────────────────────────────────────────────────

    /// Run the pending update, record draws and present.
    pub fn render_frame(&mut self) -> Result<FrameStats, RenderError> {
        self.view.on_animation_frame(&mut self.backend);
        self.view.draw_gl(&mut self.backend);
        self.backend.render_frame()
    }

    /// Whether another frame is already wanted (coalesced gesture moves).
    pub fn needs_frame(&self) -> bool {
        self.view.redraw_pending()
    }

    /// Swap in a fresh context after device loss. The old handles are
    /// gone with the old device, so nothing is freed.
    pub fn replace_context(&mut self, gpu: GpuContext) -> bool {
        self.backend = Self::backend_for(gpu);
        self.view.gl_state_lost()
    }

    pub fn stats(&self) -> ViewStats {
        self.view.stats()
    }

    /// Free everything before the window goes away.
    pub fn shutdown(&mut self) {
        if self.editor.is_open() {
            self.view.stop_editing();
        }
        self.view.release_gl(&mut self.backend);
        info!(
            "released GPU state ({} buffers, {} textures left)",
            self.backend.live_buffers(),
            self.backend.live_textures()
        );
    }
}
