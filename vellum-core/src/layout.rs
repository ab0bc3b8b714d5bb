//! Page layout: pages stacked top to bottom in document space.
//!
//! ```text
//!   ┌──────────────── content width = max page width + 2·border ───┐
//!   │ border                                                       │
//!   │     ┌──────────── page 0 ────────────┐                       │
//!   │     └────────────────────────────────┘                       │
//!   │ border                                                       │
//!   │ ┌──────────────────── page 1 (widest) ───────────────────┐   │
//!   │ └────────────────────────────────────────────────────────┘   │
//!   │ border × 2                                                   │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every page is centred horizontally on the widest page.

use crate::geometry::{Point, Range, Rect, Size};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageLayout {
    pages: Vec<Rect>,
    size: Size,
    border: f32,
}

impl PageLayout {
    pub fn compute(sizes: &[Size], border: f32) -> Self {
        let max_width = sizes.iter().map(|s| s.width).fold(0.0f32, f32::max);
        let mut pages = Vec::with_capacity(sizes.len());
        let mut y = border;
        for size in sizes {
            let x = border + (max_width - size.width) / 2.0;
            pages.push(Rect::from_origin_size(Point::new(x, y), *size));
            y += size.height + border;
        }
        let size = if sizes.is_empty() {
            Size::ZERO
        } else {
            // The bottom margin is a double border.
            Size::new(max_width + 2.0 * border, y + border)
        };
        Self {
            pages,
            size,
            border,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Rect] {
        &self.pages
    }

    pub fn page_rect(&self, page: usize) -> Option<Rect> {
        self.pages.get(page).copied()
    }

    /// Document size including the outer border.
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn border(&self) -> f32 {
        self.border
    }

    /// Contiguous range of pages intersecting `rect` (document space).
    pub fn range_intersecting(&self, rect: &Rect) -> Range {
        if rect.is_empty() {
            return Range::EMPTY;
        }
        // Pages are sorted by top, so binary search both ends.
        let start = self.pages.partition_point(|p| p.bottom() <= rect.top());
        let end = self.pages.partition_point(|p| p.top() < rect.bottom());
        let mut range = Range::new(start, end.max(start));
        // Trim pages that only overlap vertically.
        while !range.is_empty() && !self.pages[range.start].intersects(rect) {
            range.start += 1;
        }
        while !range.is_empty() && !self.pages[range.end - 1].intersects(rect) {
            range.end -= 1;
        }
        range
    }

    /// Page containing `point` (document space), if any.
    pub fn page_at(&self, point: &Point) -> Option<usize> {
        let idx = self.pages.partition_point(|p| p.bottom() <= point.y);
        self.pages
            .get(idx)
            .filter(|p| p.contains_point(point))
            .map(|_| idx)
    }
}

// ===================================================================
// Tests
// ===================================================================
