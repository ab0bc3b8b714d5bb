//! Geometry primitives shared by every layer of the viewer.
//!
//! All types are small `Copy` values with in-place mutation helpers, the
//! way the layout and render code expects to use them: build a rect, clip
//! it, grow it, hand it on.
//!
//! `Rect`s grow downward: `bottom() = top() + height`.

use serde::{Deserialize, Serialize};
use std::fmt;

// ───────────────────────────────────────────────────────────────────
// Size
// ───────────────────────────────────────────────────────────────────

/// Width and height, in pixels or page units depending on context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size { width: 0.0, height: 0.0 };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn set(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    pub fn reset(&mut self) {
        self.set(0.0, 0.0);
    }

    /// A size is empty iff either dimension is ≤ 0.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn scaled(&self, factor: f32) -> Size {
        Size::new(self.width * factor, self.height * factor)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Size({}, {})", self.width, self.height)
    }
}

// ───────────────────────────────────────────────────────────────────
// Point
// ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn set(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }

    /// Squared euclidean distance to `other`.
    pub fn dist_sq(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Point) -> f32 {
        self.dist_sq(other).sqrt()
    }

    /// True when `other` lies within `epsilon` of this point.
    pub fn close_to(&self, other: &Point, epsilon: f32) -> bool {
        self.dist_sq(other) <= epsilon * epsilon
    }

    /// Midpoint of `self` and `other`.
    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point({}, {})", self.x, self.y)
    }
}

// ───────────────────────────────────────────────────────────────────
// Rect
// ───────────────────────────────────────────────────────────────────

/// Axis-aligned rectangle stored as origin + size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        origin: Point::ZERO,
        size: Size::ZERO,
    };

    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Rect at (0, 0) with the given size.
    pub fn from_size(size: Size) -> Self {
        Self {
            origin: Point::ZERO,
            size,
        }
    }

    pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn set(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.origin.set(x, y);
        self.size.set(width, height);
    }

    pub fn reset(&mut self) {
        self.set(0.0, 0.0, 0.0, 0.0);
    }

    #[inline]
    pub fn left(&self) -> f32 {
        self.origin.x
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.origin.y
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.origin.x + self.size.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.origin.y + self.size.height
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    // ───────────────────── edge setters ─────────────────────
    //
    // Each setter moves one edge and keeps the opposite edge fixed.

    pub fn set_left(&mut self, left: f32) {
        let delta = self.origin.x - left;
        self.size.width += delta;
        self.origin.x = left;
    }

    pub fn set_top(&mut self, top: f32) {
        let delta = self.origin.y - top;
        self.size.height += delta;
        self.origin.y = top;
    }

    pub fn set_right(&mut self, right: f32) {
        self.size.width = right - self.origin.x;
    }

    pub fn set_bottom(&mut self, bottom: f32) {
        self.size.height = bottom - self.origin.y;
    }

    // ───────────────────── set operations ─────────────────────

    /// Overlap test. Rects that merely touch do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        let l = self.left().max(other.left());
        let r = self.right().min(other.right());
        if l >= r {
            return false;
        }
        let t = self.top().max(other.top());
        let b = self.bottom().min(other.bottom());
        t < b
    }

    /// Clip this rect in place to the given edges.
    pub fn intersect_with_ltrb(&mut self, l: f32, t: f32, r: f32, b: f32) {
        self.set_left(self.left().max(l));
        self.set_right(self.right().min(r));
        self.set_top(self.top().max(t));
        self.set_bottom(self.bottom().min(b));
    }

    pub fn intersect_with(&mut self, other: &Rect) {
        self.intersect_with_ltrb(other.left(), other.top(), other.right(), other.bottom());
    }

    /// Intersection of `self` and `other`. Empty (non-positive size) when
    /// they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let mut ret = *self;
        ret.intersect_with(other);
        ret
    }

    /// True iff `other` lies entirely inside `self` (edges inclusive).
    pub fn contains(&self, other: &Rect) -> bool {
        self.left() <= other.left()
            && self.top() <= other.top()
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    pub fn contains_point(&self, point: &Point) -> bool {
        point.x >= self.left()
            && point.x < self.right()
            && point.y >= self.top()
            && point.y < self.bottom()
    }

    /// Shrink by `delta` on every side.
    pub fn inset_by(&mut self, delta: f32) {
        self.origin.x += delta;
        self.origin.y += delta;
        self.size.width -= delta * 2.0;
        self.size.height -= delta * 2.0;
    }

    /// Grow by `delta` on every side.
    pub fn outset_by(&mut self, delta: f32) {
        self.inset_by(-delta);
    }

    pub fn outset(&self, delta: f32) -> Rect {
        let mut ret = *self;
        ret.outset_by(delta);
        ret
    }

    /// Grow (never shrink) so that `point` lies on or inside the edges.
    pub fn expand_to_include(&mut self, point: &Point) {
        if point.x < self.left() {
            self.set_left(point.x);
        } else if point.x > self.right() {
            self.set_right(point.x);
        }
        if point.y < self.top() {
            self.set_top(point.y);
        } else if point.y > self.bottom() {
            self.set_bottom(point.y);
        }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.origin.x += dx;
        self.origin.y += dy;
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Rect {
        let mut ret = *self;
        ret.translate(dx, dy);
        ret
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rect({}, {})", self.size, self.origin)
    }
}

// ───────────────────────────────────────────────────────────────────
// Range
// ───────────────────────────────────────────────────────────────────

/// Half-open range `[start, end)` of page indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub const EMPTY: Range = Range { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn set(&mut self, start: usize, end: usize) {
        self.start = start;
        self.end = end;
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, n: usize) -> bool {
        n >= self.start && n < self.end
    }

    /// Smallest range covering both. An empty side contributes nothing.
    pub fn union(&self, other: &Range) -> Range {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => Range::EMPTY,
            (true, false) => *other,
            (false, true) => *self,
            (false, false) => Range::new(self.start.min(other.start), self.end.max(other.end)),
        }
    }

    pub fn iter(&self) -> std::ops::Range<usize> {
        self.start..self.end.max(self.start)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_empty() {
        assert!(Size::new(0.0, 10.0).is_empty());
        assert!(Size::new(10.0, -1.0).is_empty());
        assert!(!Size::new(1.0, 1.0).is_empty());
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.dist_sq(&b), 25.0);
        assert_eq!(a.distance(&b), 5.0);
        assert!(a.close_to(&Point::new(0.1, 0.1), 0.5));
        assert!(!a.close_to(&b, 4.9));
    }

    #[test]
    fn test_rect_edges() {
        let r = Rect::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(r.left(), 10.0);
        assert_eq!(r.top(), 20.0);
        assert_eq!(r.right(), 110.0);
        assert_eq!(r.bottom(), 70.0);
    }

    #[test]
    fn test_set_edge_preserves_opposite() {
        let mut r = Rect::new(10.0, 20.0, 100.0, 50.0);
        r.set_left(0.0);
        assert_eq!(r.right(), 110.0);
        r.set_top(5.0);
        assert_eq!(r.bottom(), 70.0);
        r.set_right(200.0);
        assert_eq!(r.left(), 0.0);
        r.set_bottom(100.0);
        assert_eq!(r.top(), 5.0);
    }

    #[test]
    fn test_intersects_symmetric() {
        let cases = [
            (Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(5.0, 5.0, 10.0, 10.0)),
            (Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(10.0, 0.0, 10.0, 10.0)),
            (Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(20.0, 20.0, 1.0, 1.0)),
            (Rect::new(-5.0, -5.0, 30.0, 30.0), Rect::new(0.0, 0.0, 1.0, 1.0)),
        ];
        for (a, b) in cases {
            assert_eq!(a.intersects(&b), b.intersects(&a), "{a} vs {b}");
        }
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 5.0, 5.0);
        assert!(!a.intersects(&b));
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn test_intersect_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 2.0, 10.0, 4.0);
        assert_eq!(a.intersect(&b), Rect::new(5.0, 2.0, 5.0, 4.0));
    }

    #[test]
    fn test_contains() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(outer.contains(&Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&Rect::new(90.0, 90.0, 20.0, 5.0)));
    }

    #[test]
    fn test_inset_outset() {
        let mut r = Rect::new(10.0, 10.0, 100.0, 100.0);
        r.outset_by(5.0);
        assert_eq!(r, Rect::new(5.0, 5.0, 110.0, 110.0));
        r.inset_by(5.0);
        assert_eq!(r, Rect::new(10.0, 10.0, 100.0, 100.0));
    }

    #[test]
    fn test_expand_to_include() {
        let mut r = Rect::new(10.0, 10.0, 0.0, 0.0);
        r.expand_to_include(&Point::new(20.0, 5.0));
        assert_eq!(r, Rect::new(10.0, 5.0, 10.0, 5.0));
        r.expand_to_include(&Point::new(0.0, 30.0));
        assert_eq!(r, Rect::new(0.0, 5.0, 20.0, 25.0));
    }

    #[test]
    fn test_range_basics() {
        let r = Range::new(2, 5);
        assert_eq!(r.len(), 3);
        assert!(r.contains(2));
        assert!(!r.contains(5));
        assert!(Range::new(3, 3).is_empty());
        assert!(Range::new(4, 1).is_empty());
        assert_eq!(Range::new(4, 1).len(), 0);
        assert_eq!(r, Range::new(2, 5));
    }

    #[test]
    fn test_range_union() {
        assert_eq!(Range::new(2, 4).union(&Range::new(3, 7)), Range::new(2, 7));
        assert_eq!(Range::EMPTY.union(&Range::new(3, 7)), Range::new(3, 7));
        assert_eq!(Range::new(1, 2).union(&Range::EMPTY), Range::new(1, 2));
        assert!(Range::EMPTY.union(&Range::EMPTY).is_empty());
        assert_eq!(Range::new(6, 4).iter().count(), 0);
    }
}
