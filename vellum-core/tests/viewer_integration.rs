//! End-to-end tests driving a `DocView` against the headless backend.
//!
//! Each test feeds host-style input (pointer events, scroll, frames)
//! and checks what reached the GPU.

use std::cell::RefCell;
use std::rc::Rc;

use vellum_core::gpu::HeadlessGpu;
use vellum_core::{
    DocView, EditorDelegate, EditorSession, Overlay, OverlayId, PixelBuffer, Point, PointerEvent,
    PointerPhase, RasterError, RasterSource, Rect, Size, Tool, ViewerConfig,
};

/// Pages of a fixed size; counts renders.
struct Pages {
    sizes: Vec<Size>,
    renders: Rc<RefCell<usize>>,
}

impl Pages {
    fn uniform(count: usize) -> (Self, Rc<RefCell<usize>>) {
        let renders = Rc::new(RefCell::new(0));
        let pages = Pages {
            sizes: vec![Size::new(600.0, 800.0); count],
            renders: renders.clone(),
        };
        (pages, renders)
    }
}

impl RasterSource for Pages {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn page_size(&self, page: usize) -> Size {
        self.sizes[page]
    }

    fn render(&mut self, _page: usize, _region: &Rect, w: u32, h: u32) -> Result<PixelBuffer, RasterError> {
        *self.renders.borrow_mut() += 1;
        Ok(PixelBuffer::filled(w, h, [250, 250, 250, 255]))
    }
}

/// Editor that records what the view asked of it.
struct LogEditor {
    log: Rc<RefCell<Vec<String>>>,
    next: u64,
}

impl EditorDelegate for LogEditor {
    fn place_editor(&mut self, _overlay: OverlayId, _html: &str, _viewport_rect: Rect) -> EditorSession {
        self.next += 1;
        self.log.borrow_mut().push(format!("place {}", self.next));
        EditorSession(self.next)
    }

    fn editor_html(&self, session: EditorSession) -> String {
        format!("<p>note {}</p>", session.0)
    }

    fn remove_editor(&mut self, session: EditorSession) {
        self.log.borrow_mut().push(format!("remove {}", session.0));
    }
}

fn open(pages: usize) -> (DocView<Pages>, Rc<RefCell<usize>>) {
    let (source, renders) = Pages::uniform(pages);
    let mut view = DocView::new(source, ViewerConfig::default());
    view.set_viewport_size(Size::new(640.0, 480.0), 1.0);
    (view, renders)
}

fn tap(view: &mut DocView<Pages>, gpu: &mut HeadlessGpu, id: u64, at: Point) {
    view.handle_pointer(&PointerEvent::new(id, at.x, at.y, PointerPhase::Down));
    view.handle_pointer(&PointerEvent::new(id, at.x, at.y, PointerPhase::Up));
    view.on_animation_frame(gpu);
}

#[test]
fn test_two_page_layout() {
    let (view, _) = open(2);
    let layout = view.layout();
    assert_eq!(layout.page_rect(0), Some(Rect::new(20.0, 20.0, 600.0, 800.0)));
    assert_eq!(layout.page_rect(1), Some(Rect::new(20.0, 840.0, 600.0, 800.0)));
    assert_eq!(layout.size(), Size::new(640.0, 1680.0));
}

#[test]
fn test_small_scroll_reuses_texture() {
    let mut gpu = HeadlessGpu::new();
    let (mut view, renders) = open(3);
    view.on_animation_frame(&mut gpu);
    assert_eq!(*renders.borrow(), 1);

    let before = gpu.counters().resource_calls();
    assert!(view.scroll_by(0.0, 50.0));
    view.on_animation_frame(&mut gpu);
    assert_eq!(gpu.counters().resource_calls(), before);
    assert_eq!(*renders.borrow(), 1);
}

#[test]
fn test_pan_moves_coalesce_into_one_update() {
    let mut gpu = HeadlessGpu::new();
    let (mut view, _) = open(3);
    view.on_animation_frame(&mut gpu);
    let updates = view.stats().updates;

    view.handle_pointer(&PointerEvent::new(1, 300.0, 400.0, PointerPhase::Down));
    let frames_asked = (1..=20)
        .filter(|i| {
            let y = 400.0 - *i as f32 * 5.0;
            view.handle_pointer(&PointerEvent::new(1, 300.0, y, PointerPhase::Move))
        })
        .count();
    assert_eq!(frames_asked, 1);

    view.on_animation_frame(&mut gpu);
    assert_eq!(view.stats().updates, updates + 1);
    assert_eq!(view.viewport().scroll(), Point::new(0.0, 100.0));
}

#[test]
fn test_pinch_through_view() {
    let mut gpu = HeadlessGpu::new();
    let (mut view, renders) = open(3);
    view.on_animation_frame(&mut gpu);

    view.handle_pointer(&PointerEvent::new(1, 100.0, 100.0, PointerPhase::Down));
    view.handle_pointer(&PointerEvent::new(2, 200.0, 100.0, PointerPhase::Down));
    view.handle_pointer(&PointerEvent::new(1, 90.0, 100.0, PointerPhase::Move));
    view.handle_pointer(&PointerEvent::new(2, 210.0, 100.0, PointerPhase::Move));
    view.on_animation_frame(&mut gpu);

    assert!((view.viewport().zoom() - 1.2).abs() < 1e-5);
    let scroll = view.viewport().scroll();
    assert!((scroll.x - 30.0).abs() < 1e-3 && (scroll.y - 20.0).abs() < 1e-3);
    // Mid-gesture frames stretch the old texture.
    assert_eq!(*renders.borrow(), 1);

    view.handle_pointer(&PointerEvent::new(1, 90.0, 100.0, PointerPhase::Up));
    assert!(!view.redraw_pending());
    assert!(view.handle_pointer(&PointerEvent::new(2, 210.0, 100.0, PointerPhase::Up)));
    view.on_animation_frame(&mut gpu);
    assert_eq!(*renders.borrow(), 2);
}

#[test]
fn test_only_one_text_overlay_edits() {
    let mut gpu = HeadlessGpu::new();
    let (source, _) = Pages::uniform(1);
    let log = Rc::new(RefCell::new(Vec::new()));
    let editor = LogEditor {
        log: log.clone(),
        next: 0,
    };
    let mut view = DocView::new(source, ViewerConfig::default()).with_editor(Box::new(editor));
    view.set_viewport_size(Size::new(640.0, 480.0), 1.0);
    view.set_tool(Tool::Text);

    tap(&mut view, &mut gpu, 1, Point::new(100.0, 100.0));
    let first = view.editing().expect("first box editing");
    tap(&mut view, &mut gpu, 2, Point::new(200.0, 300.0));
    let second = view.editing().expect("second box editing");

    assert_ne!(first, second);
    assert_eq!(*log.borrow(), vec!["place 1", "remove 1", "place 2"]);
    let overlays = view.document().overlays(0);
    assert_eq!(overlays.len(), 2);
    assert!(!overlays[first.index].is_editing());
    assert!(overlays[second.index].is_editing());

    view.stop_editing();
    assert_eq!(view.editing(), None);
    assert_eq!(log.borrow().last().map(String::as_str), Some("remove 2"));
}

#[test]
fn test_context_loss_keeps_overlays_and_frees_nothing() {
    let mut gpu = HeadlessGpu::new();
    let (mut view, renders) = open(2);
    view.set_tool(Tool::Ink);
    view.handle_pointer(&PointerEvent::new(1, 100.0, 100.0, PointerPhase::Down));
    view.handle_pointer(&PointerEvent::new(1, 160.0, 140.0, PointerPhase::Move));
    view.on_animation_frame(&mut gpu);
    view.handle_pointer(&PointerEvent::new(1, 220.0, 180.0, PointerPhase::Up));
    view.on_animation_frame(&mut gpu);
    assert!(matches!(view.document().overlays(0), [Overlay::Ink(_)]));

    gpu.lose_context();
    view.gl_state_lost();
    view.on_animation_frame(&mut gpu);

    let counters = gpu.counters();
    assert_eq!(counters.textures_deleted, 0);
    assert_eq!(counters.buffers_deleted, 0);
    assert_eq!(*renders.borrow(), 2);
    // Page texture + its quad, border buffer, ink stroke.
    assert_eq!(gpu.live_textures(), 1);
    assert_eq!(gpu.live_buffers(), 3);
}

#[test]
fn test_replace_source_drops_old_pages() {
    let mut gpu = HeadlessGpu::new();
    let (mut view, _) = open(3);
    view.on_animation_frame(&mut gpu);

    let (fewer, _) = Pages::uniform(1);
    let old = view.replace_source(&mut gpu, fewer);
    assert_eq!(old.page_count(), 3);
    assert_eq!(gpu.live_textures(), 0);
    assert_eq!(view.layout().page_count(), 1);

    view.on_animation_frame(&mut gpu);
    assert_eq!(gpu.live_textures(), 1);
}

/// Editor that keeps the viewport rectangle of every placement.
struct RectEditor {
    rects: Rc<RefCell<Vec<Rect>>>,
}

impl EditorDelegate for RectEditor {
    fn place_editor(&mut self, _overlay: OverlayId, _html: &str, viewport_rect: Rect) -> EditorSession {
        let mut rects = self.rects.borrow_mut();
        rects.push(viewport_rect);
        EditorSession(rects.len() as u64)
    }

    fn editor_html(&self, _session: EditorSession) -> String {
        String::new()
    }

    fn remove_editor(&mut self, _session: EditorSession) {}
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn test_editor_placed_over_box_when_scrolled_and_zoomed() {
    let mut gpu = HeadlessGpu::new();
    let (source, _) = Pages::uniform(2);
    let rects = Rc::new(RefCell::new(Vec::new()));
    let editor = RectEditor { rects: rects.clone() };
    let mut view = DocView::new(source, ViewerConfig::default()).with_editor(Box::new(editor));
    view.set_viewport_size(Size::new(640.0, 480.0), 1.0);
    view.set_zoom(2.0);
    view.scroll_to(Point::new(50.0, 300.0));
    view.on_animation_frame(&mut gpu);
    assert_eq!(view.viewport().zoom(), 2.0);

    view.set_tool(Tool::Text);
    view.handle_pointer(&PointerEvent::new(1, 100.0, 100.0, PointerPhase::Down));
    view.handle_pointer(&PointerEvent::new(1, 300.0, 160.0, PointerPhase::Move));
    view.on_animation_frame(&mut gpu);
    view.handle_pointer(&PointerEvent::new(1, 300.0, 160.0, PointerPhase::Up));

    let at = view.editing().expect("box editing");
    let bounds = view.document().overlay(at).map(|o| o.bounds()).unwrap();
    // 200x60 viewport pixels at 2x are 100x30 page units.
    assert!(close(bounds.size.width, 100.0) && close(bounds.size.height, 30.0));

    let placed = rects.borrow()[0];
    assert_eq!(placed, view.page_rect_to_viewport(at.page, &bounds));
    assert!(close(placed.origin.x, 100.0) && close(placed.origin.y, 100.0));
    assert!(close(placed.size.width, 200.0) && close(placed.size.height, 60.0));
}

#[test]
fn test_editor_placed_over_box_on_centred_page() {
    let mut gpu = HeadlessGpu::new();
    let (source, _) = Pages::uniform(1);
    let rects = Rc::new(RefCell::new(Vec::new()));
    let editor = RectEditor { rects: rects.clone() };
    let mut view = DocView::new(source, ViewerConfig::default()).with_editor(Box::new(editor));
    view.set_viewport_size(Size::new(640.0, 480.0), 1.0);
    // 320x420 at half zoom: centred with 160 and 30 pixel margins.
    view.set_zoom(0.5);
    view.on_animation_frame(&mut gpu);
    assert_eq!(view.viewport().margin(), Point::new(160.0, 30.0));

    view.set_tool(Tool::Text);
    view.handle_pointer(&PointerEvent::new(1, 200.0, 100.0, PointerPhase::Down));
    view.handle_pointer(&PointerEvent::new(1, 300.0, 140.0, PointerPhase::Up));

    let at = view.editing().expect("box editing");
    let bounds = view.document().overlay(at).map(|o| o.bounds()).unwrap();
    assert!(close(bounds.origin.x, 60.0) && close(bounds.origin.y, 120.0));

    let placed = rects.borrow()[0];
    assert_eq!(placed, view.page_rect_to_viewport(at.page, &bounds));
    assert!(close(placed.origin.x, 200.0) && close(placed.origin.y, 100.0));
    assert!(close(placed.size.width, 100.0) && close(placed.size.height, 40.0));
}

#[test]
fn test_scroll_then_pan_in_one_frame_renders_full_quality() {
    let mut gpu = HeadlessGpu::new();
    let (mut view, renders) = open(3);
    view.on_animation_frame(&mut gpu);
    assert_eq!(*renders.borrow(), 1);
    let updates = view.stats().updates;

    // A full redraw request, then gesture moves asking for fast ones.
    assert!(view.scroll_to(Point::new(0.0, 900.0)));
    view.handle_pointer(&PointerEvent::new(1, 300.0, 300.0, PointerPhase::Down));
    assert!(!view.handle_pointer(&PointerEvent::new(1, 300.0, 280.0, PointerPhase::Move)));
    view.on_animation_frame(&mut gpu);

    assert_eq!(view.stats().updates, updates + 1);
    assert_eq!(view.viewport().scroll(), Point::new(0.0, 920.0));
    // The coalesced update was not fast: the newly visible page rendered
    // and the one scrolled away was freed.
    assert_eq!(*renders.borrow(), 2);
    assert!(view.document().page_raster(1).unwrap().texture().is_some());
    assert!(view.document().page_raster(0).unwrap().texture().is_none());
    assert_eq!(gpu.live_textures(), 1);
}
