//! Pointer streams → pan, pinch-zoom, or annotation placement.
//!
//! ```text
//!  pointers   handler      per frame
//!  ────────   ─────────    ───────────────────────────────────────────
//!  0 → 1      Placement    (a tool is active)  PlaceStart / PlaceMove
//!  0 → 1      PanZoom      (no tool)
//!  1          PanZoom      scroll -= finger delta
//!  2          PanZoom      zoom *= d1/d0, scroll keeps the centroid fixed
//!  → 0        -            Ended (final full-quality redraw)
//! ```
//!
//! Moves only record positions.  The accumulated motion is turned into
//! at most one output per animation frame in [`GestureRecognizer::on_frame`].
//!
//! # Pinch pivot
//!
//! With `c0`/`c1` the previous/current centroid (viewport space) and `dz`
//! the distance ratio, the new scroll is
//!
//! ```text
//! scroll' = dz · (c0 + scroll) − c1
//! ```
//!
//! so the document point that was under `c0` is now under `c1`.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Below this finger distance a pinch is treated as a pan.
const MIN_PINCH_DISTANCE: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointerId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// A raw pointer event in viewport coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub id: PointerId,
    pub position: Point,
    pub phase: PointerPhase,
}

impl PointerEvent {
    pub fn new(id: u64, x: f32, y: f32, phase: PointerPhase) -> Self {
        Self {
            id: PointerId(id),
            position: Point::new(x, y),
            phase,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureOutput {
    PlaceStart(Point),
    PlaceMove(Point),
    PlaceEnd(Point),
    /// New scroll offset.
    Pan(Point),
    Zoom { zoom: f32, scroll: Point },
    /// The last pointer lifted.
    Ended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Handler {
    PanZoom,
    Placement,
}

#[derive(Clone, Copy, Debug)]
struct Tracked {
    prev: Point,
    current: Point,
}

#[derive(Debug)]
pub struct GestureRecognizer {
    pointers: FxHashMap<PointerId, Tracked>,
    handler: Option<Handler>,
    pending_move: bool,
    min_zoom: f32,
    max_zoom: f32,
}

impl GestureRecognizer {
    pub fn new(min_zoom: f32, max_zoom: f32) -> Self {
        Self {
            pointers: FxHashMap::default(),
            handler: None,
            pending_move: false,
            min_zoom,
            max_zoom,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handler.is_some()
    }

    pub fn is_placing(&self) -> bool {
        self.handler == Some(Handler::Placement)
    }

    pub fn pointer_count(&self) -> usize {
        self.pointers.len()
    }

    pub fn has_pending_move(&self) -> bool {
        self.pending_move
    }

    /// `zoom` and `scroll` are the current view state, needed when a
    /// lift flushes motion no frame has consumed yet.
    pub fn handle(
        &mut self,
        event: &PointerEvent,
        tool_active: bool,
        zoom: f32,
        scroll: Point,
    ) -> Vec<GestureOutput> {
        match event.phase {
            PointerPhase::Down => self.pointer_down(event.id, event.position, tool_active),
            PointerPhase::Move => {
                self.pointer_move(event.id, event.position);
                Vec::new()
            }
            PointerPhase::Up => self.pointer_up(event.id, Some(event.position), zoom, scroll),
            PointerPhase::Cancel => self.pointer_up(event.id, None, zoom, scroll),
        }
    }

    pub fn pointer_down(&mut self, id: PointerId, position: Point, tool_active: bool) -> Vec<GestureOutput> {
        let tracked = Tracked {
            prev: position,
            current: position,
        };
        match self.handler {
            None => {
                let handler = if tool_active {
                    Handler::Placement
                } else {
                    Handler::PanZoom
                };
                self.handler = Some(handler);
                self.pointers.insert(id, tracked);
                if handler == Handler::Placement {
                    return vec![GestureOutput::PlaceStart(position)];
                }
            }
            // Placement follows a single pointer.
            Some(Handler::Placement) => {}
            Some(Handler::PanZoom) => {
                self.pointers.insert(id, tracked);
                self.reset_previous();
            }
        }
        Vec::new()
    }

    /// Record the new position; returns whether the pointer is tracked.
    pub fn pointer_move(&mut self, id: PointerId, position: Point) -> bool {
        match self.pointers.get_mut(&id) {
            Some(tracked) => {
                tracked.current = position;
                self.pending_move = true;
                true
            }
            None => false,
        }
    }

    /// `position` is `None` for a cancel.  When the last panning pointer
    /// lifts, motion since the last frame becomes a final `Pan` ahead of
    /// `Ended`.
    pub fn pointer_up(
        &mut self,
        id: PointerId,
        position: Option<Point>,
        zoom: f32,
        scroll: Point,
    ) -> Vec<GestureOutput> {
        if !self.pointers.contains_key(&id) {
            return Vec::new();
        }
        let last_pan = self.handler == Some(Handler::PanZoom) && self.pointers.len() == 1;
        let mut out = Vec::new();
        if last_pan {
            if let (Some(position), Some(tracked)) = (position, self.pointers.get_mut(&id)) {
                if tracked.current != position {
                    tracked.current = position;
                    self.pending_move = true;
                }
            }
            out = self.on_frame(zoom, scroll);
        }
        let Some(tracked) = self.pointers.remove(&id) else {
            return out;
        };
        if self.handler == Some(Handler::Placement) {
            out.push(GestureOutput::PlaceEnd(position.unwrap_or(tracked.current)));
        }
        if self.pointers.is_empty() {
            self.handler = None;
            self.pending_move = false;
            out.push(GestureOutput::Ended);
        } else {
            self.reset_previous();
        }
        out
    }

    /// Turn motion accumulated since the last frame into outputs.
    pub fn on_frame(&mut self, zoom: f32, scroll: Point) -> Vec<GestureOutput> {
        if !std::mem::take(&mut self.pending_move) {
            return Vec::new();
        }
        let output = match self.handler {
            Some(Handler::Placement) => self.placement_frame(),
            Some(Handler::PanZoom) => self.pan_zoom_frame(zoom, scroll),
            None => None,
        };
        self.reset_previous();
        output.into_iter().collect()
    }

    fn placement_frame(&self) -> Option<GestureOutput> {
        let tracked = self.pointers.values().next()?;
        (tracked.current != tracked.prev).then_some(GestureOutput::PlaceMove(tracked.current))
    }

    fn pan_zoom_frame(&self, zoom: f32, scroll: Point) -> Option<GestureOutput> {
        let mut ids: Vec<PointerId> = self.pointers.keys().copied().collect();
        ids.sort_unstable();
        match ids.as_slice() {
            [] => None,
            [one] => {
                let t = self.pointers[one];
                let pan = pan_scroll(scroll, t.prev, t.current);
                (pan != scroll).then_some(GestureOutput::Pan(pan))
            }
            [a, b, ..] => {
                let (a, b) = (self.pointers[a], self.pointers[b]);
                Some(self.pinch(zoom, scroll, (a.prev, b.prev), (a.current, b.current)))
            }
        }
    }

    fn pinch(
        &self,
        zoom: f32,
        scroll: Point,
        prev: (Point, Point),
        current: (Point, Point),
    ) -> GestureOutput {
        let c0 = prev.0.midpoint(&prev.1);
        let c1 = current.0.midpoint(&current.1);
        let d0 = prev.0.distance(&prev.1);
        let d1 = current.0.distance(&current.1);
        if d0 < MIN_PINCH_DISTANCE || d1 < MIN_PINCH_DISTANCE {
            return GestureOutput::Pan(pan_scroll(scroll, c0, c1));
        }
        let new_zoom = (zoom * d1 / d0).clamp(self.min_zoom, self.max_zoom);
        let dz = new_zoom / zoom;
        GestureOutput::Zoom {
            zoom: new_zoom,
            scroll: pivot_scroll(scroll, dz, c0, c1),
        }
    }

    fn reset_previous(&mut self) {
        for tracked in self.pointers.values_mut() {
            tracked.prev = tracked.current;
        }
    }
}

/// Content follows the finger: scroll moves opposite to it.
fn pan_scroll(scroll: Point, from: Point, to: Point) -> Point {
    Point::new(scroll.x - (to.x - from.x), scroll.y - (to.y - from.y))
}

/// `dz · (c0 + scroll) − c1`, per axis.
pub fn pivot_scroll(scroll: Point, dz: f32, c0: Point, c1: Point) -> Point {
    Point::new(dz * (c0.x + scroll.x) - c1.x, dz * (c0.y + scroll.y) - c1.y)
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn recognizer() -> GestureRecognizer {
        GestureRecognizer::new(0.1, 50.0)
    }

    fn approx(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3
    }

    #[test]
    fn test_single_pointer_pans() {
        let mut g = recognizer();
        g.pointer_down(PointerId(1), Point::new(100.0, 100.0), false);
        g.pointer_move(PointerId(1), Point::new(90.0, 80.0));
        let out = g.on_frame(1.0, Point::new(50.0, 50.0));
        assert_eq!(out, vec![GestureOutput::Pan(Point::new(60.0, 70.0))]);
    }

    #[test]
    fn test_moves_coalesce_per_frame() {
        let mut g = recognizer();
        g.pointer_down(PointerId(1), Point::new(0.0, 0.0), false);
        for i in 1..=10 {
            g.pointer_move(PointerId(1), Point::new(i as f32, 0.0));
        }
        let out = g.on_frame(1.0, Point::new(100.0, 0.0));
        assert_eq!(out, vec![GestureOutput::Pan(Point::new(90.0, 0.0))]);
        assert!(g.on_frame(1.0, Point::new(90.0, 0.0)).is_empty());
    }

    #[test]
    fn test_pinch_scenario() {
        let mut g = recognizer();
        g.pointer_down(PointerId(1), Point::new(100.0, 100.0), false);
        g.pointer_down(PointerId(2), Point::new(200.0, 100.0), false);
        g.pointer_move(PointerId(1), Point::new(90.0, 100.0));
        g.pointer_move(PointerId(2), Point::new(210.0, 100.0));
        let out = g.on_frame(1.0, Point::ZERO);
        match out.as_slice() {
            [GestureOutput::Zoom { zoom, scroll }] => {
                assert!((zoom - 1.2).abs() < 1e-5);
                assert!(approx(*scroll, Point::new(30.0, 20.0)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_pinch_keeps_centroid_fixed() {
        let mut g = recognizer();
        let (zoom, scroll) = (1.5, Point::new(40.0, 300.0));
        g.pointer_down(PointerId(7), Point::new(50.0, 60.0), false);
        g.pointer_down(PointerId(3), Point::new(150.0, 260.0), false);
        g.pointer_move(PointerId(7), Point::new(20.0, 30.0));
        g.pointer_move(PointerId(3), Point::new(200.0, 300.0));
        let c0 = Point::new(100.0, 160.0);
        let c1 = Point::new(110.0, 165.0);
        let &[GestureOutput::Zoom { zoom: z1, scroll: s1 }] = g.on_frame(zoom, scroll).as_slice() else {
            panic!("expected zoom");
        };
        // Document point under c0 before == under c1 after.
        let before = Point::new((c0.x + scroll.x) / zoom, (c0.y + scroll.y) / zoom);
        let after = Point::new((c1.x + s1.x) / z1, (c1.y + s1.y) / z1);
        assert!(approx(before, after));
    }

    #[test]
    fn test_zoom_clamp_keeps_pivot() {
        let mut g = GestureRecognizer::new(0.5, 2.0);
        g.pointer_down(PointerId(1), Point::new(100.0, 100.0), false);
        g.pointer_down(PointerId(2), Point::new(110.0, 100.0), false);
        g.pointer_move(PointerId(1), Point::new(0.0, 100.0));
        g.pointer_move(PointerId(2), Point::new(210.0, 100.0));
        let &[GestureOutput::Zoom { zoom, scroll }] = g.on_frame(1.0, Point::ZERO).as_slice() else {
            panic!("expected zoom");
        };
        assert_eq!(zoom, 2.0);
        assert!(approx(scroll, Point::new(2.0 * 105.0 - 105.0, 2.0 * 100.0 - 100.0)));
    }

    #[test]
    fn test_coincident_fingers_pan() {
        let mut g = recognizer();
        g.pointer_down(PointerId(1), Point::new(100.0, 100.0), false);
        g.pointer_down(PointerId(2), Point::new(100.0, 100.0), false);
        g.pointer_move(PointerId(1), Point::new(110.0, 100.0));
        g.pointer_move(PointerId(2), Point::new(110.0, 100.0));
        let out = g.on_frame(1.0, Point::new(50.0, 0.0));
        assert_eq!(out, vec![GestureOutput::Pan(Point::new(40.0, 0.0))]);
    }

    #[test]
    fn test_two_to_one_resumes_without_jump() {
        let mut g = recognizer();
        g.pointer_down(PointerId(1), Point::new(0.0, 0.0), false);
        g.pointer_down(PointerId(2), Point::new(100.0, 0.0), false);
        g.pointer_move(PointerId(2), Point::new(300.0, 0.0));
        let out = g.pointer_up(PointerId(1), Some(Point::new(0.0, 0.0)), 1.0, Point::ZERO);
        assert!(out.is_empty());
        // Motion before the lift is dropped; only new motion pans.
        g.pointer_move(PointerId(2), Point::new(305.0, 0.0));
        let out = g.on_frame(1.0, Point::new(100.0, 0.0));
        assert_eq!(out, vec![GestureOutput::Pan(Point::new(95.0, 0.0))]);
    }

    #[test]
    fn test_all_up_ends() {
        let mut g = recognizer();
        g.pointer_down(PointerId(1), Point::ZERO, false);
        assert!(g.is_active());
        assert_eq!(g.pointer_up(PointerId(1), Some(Point::ZERO), 1.0, Point::ZERO), vec![GestureOutput::Ended]);
        assert!(!g.is_active());
        // Unknown pointer: ignored.
        assert!(g.pointer_up(PointerId(9), None, 1.0, Point::ZERO).is_empty());
    }

    #[test]
    fn test_lift_flushes_unframed_pan() {
        let mut g = recognizer();
        g.pointer_down(PointerId(1), Point::new(100.0, 100.0), false);
        g.pointer_move(PointerId(1), Point::new(100.0, 60.0));
        // The lift lands 10 further up before any frame ran.
        let out = g.pointer_up(PointerId(1), Some(Point::new(100.0, 50.0)), 1.0, Point::new(0.0, 200.0));
        assert_eq!(out, vec![GestureOutput::Pan(Point::new(0.0, 250.0)), GestureOutput::Ended]);
        assert!(!g.has_pending_move());
        assert!(g.on_frame(1.0, Point::new(0.0, 250.0)).is_empty());
    }

    #[test]
    fn test_lift_after_frame_adds_no_pan() {
        let mut g = recognizer();
        g.pointer_down(PointerId(1), Point::new(0.0, 0.0), false);
        g.pointer_move(PointerId(1), Point::new(0.0, 30.0));
        g.on_frame(1.0, Point::new(0.0, 100.0));
        let out = g.pointer_up(PointerId(1), Some(Point::new(0.0, 30.0)), 1.0, Point::new(0.0, 70.0));
        assert_eq!(out, vec![GestureOutput::Ended]);
    }

    #[test]
    fn test_tool_takes_priority() {
        let mut g = recognizer();
        let out = g.pointer_down(PointerId(1), Point::new(5.0, 5.0), true);
        assert_eq!(out, vec![GestureOutput::PlaceStart(Point::new(5.0, 5.0))]);
        // A second finger is ignored while placing.
        g.pointer_down(PointerId(2), Point::new(50.0, 50.0), true);
        assert_eq!(g.pointer_count(), 1);

        g.pointer_move(PointerId(1), Point::new(6.0, 7.0));
        assert_eq!(g.on_frame(1.0, Point::ZERO), vec![GestureOutput::PlaceMove(Point::new(6.0, 7.0))]);

        let out = g.pointer_up(PointerId(1), Some(Point::new(8.0, 9.0)), 1.0, Point::ZERO);
        assert_eq!(out, vec![GestureOutput::PlaceEnd(Point::new(8.0, 9.0)), GestureOutput::Ended]);
    }

    #[test]
    fn test_cancel_ends_placement_at_last_position() {
        let mut g = recognizer();
        g.handle(&PointerEvent::new(4, 1.0, 1.0, PointerPhase::Down), true, 1.0, Point::ZERO);
        g.handle(&PointerEvent::new(4, 3.0, 3.0, PointerPhase::Move), true, 1.0, Point::ZERO);
        let out = g.handle(&PointerEvent::new(4, 0.0, 0.0, PointerPhase::Cancel), true, 1.0, Point::ZERO);
        assert_eq!(out[0], GestureOutput::PlaceEnd(Point::new(3.0, 3.0)));
    }

    #[test]
    fn test_pivot_scroll_formula() {
        let s = pivot_scroll(Point::ZERO, 1.2, Point::new(150.0, 100.0), Point::new(150.0, 100.0));
        assert!(approx(s, Point::new(30.0, 20.0)));
    }
}
