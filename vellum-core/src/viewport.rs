//! Zoom, scroll and the visible part of the document.
//!
//! Three coordinate spaces meet here:
//!
//! - **viewport**: logical pixels of the window, origin top-left;
//! - **document**: the laid-out page stack ([`crate::layout::PageLayout`]);
//! - **device**: viewport × device pixel ratio, used for render sizes.
//!
//! `scroll` is measured in viewport pixels of the zoomed content.  When
//! the zoomed content is smaller than the viewport along an axis it is
//! centred, and scroll along that axis is pinned to zero.

use crate::geometry::{Point, Rect, Size};
use crate::transform::Affine;

#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    size: Size,
    device_pixel_ratio: f32,
    zoom: f32,
    scroll: Point,
    content: Size,
}

impl Viewport {
    pub fn new(zoom: f32) -> Self {
        Self {
            size: Size::ZERO,
            device_pixel_ratio: 1.0,
            zoom,
            scroll: Point::ZERO,
            content: Size::ZERO,
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn scroll(&self) -> Point {
        self.scroll
    }

    /// Device pixels per document unit.
    pub fn pixel_scale(&self) -> f32 {
        self.zoom * self.device_pixel_ratio
    }

    pub fn set_size(&mut self, size: Size, device_pixel_ratio: f32) {
        self.size = size;
        self.device_pixel_ratio = if device_pixel_ratio > 0.0 { device_pixel_ratio } else { 1.0 };
        self.clamp_scroll();
    }

    /// Unzoomed document size.
    pub fn set_content_size(&mut self, content: Size) {
        self.content = content;
        self.clamp_scroll();
    }

    /// Document size at the current zoom, in viewport pixels.
    pub fn scaled_content_size(&self) -> Size {
        self.content.scaled(self.zoom)
    }

    /// Centring offset along each axis (zero when the content overflows).
    pub fn margin(&self) -> Point {
        let content = self.scaled_content_size();
        Point::new(
            ((self.size.width - content.width) / 2.0).max(0.0),
            ((self.size.height - content.height) / 2.0).max(0.0),
        )
    }

    pub fn max_scroll(&self) -> Point {
        let content = self.scaled_content_size();
        Point::new(
            (content.width - self.size.width).max(0.0),
            (content.height - self.size.height).max(0.0),
        )
    }

    /// Set the scroll offset, clamped to the content. Returns whether it
    /// changed.
    pub fn set_scroll(&mut self, scroll: Point) -> bool {
        let before = self.scroll;
        self.scroll = scroll;
        self.clamp_scroll();
        self.scroll != before
    }

    /// Set zoom and scroll together (pinch, wheel zoom). The scroll is
    /// clamped against the new zoom. Returns whether anything changed.
    pub fn set_zoom_and_scroll(&mut self, zoom: f32, scroll: Point) -> bool {
        let before = (self.zoom, self.scroll);
        if zoom > 0.0 {
            self.zoom = zoom;
        }
        self.scroll = scroll;
        self.clamp_scroll();
        (self.zoom, self.scroll) != before
    }

    fn clamp_scroll(&mut self) {
        let max = self.max_scroll();
        self.scroll.x = self.scroll.x.clamp(0.0, max.x);
        self.scroll.y = self.scroll.y.clamp(0.0, max.y);
    }

    /// The visible document-space rectangle.
    pub fn visible_rect(&self) -> Rect {
        let margin = self.margin();
        Rect::new(
            (self.scroll.x - margin.x) / self.zoom,
            (self.scroll.y - margin.y) / self.zoom,
            self.size.width / self.zoom,
            self.size.height / self.zoom,
        )
    }

    pub fn viewport_to_document(&self, point: Point) -> Point {
        let margin = self.margin();
        Point::new(
            (point.x + self.scroll.x - margin.x) / self.zoom,
            (point.y + self.scroll.y - margin.y) / self.zoom,
        )
    }

    pub fn document_to_viewport(&self, point: Point) -> Point {
        let margin = self.margin();
        Point::new(
            point.x * self.zoom - self.scroll.x + margin.x,
            point.y * self.zoom - self.scroll.y + margin.y,
        )
    }

    pub fn document_rect_to_viewport(&self, rect: &Rect) -> Rect {
        Rect::from_origin_size(
            self.document_to_viewport(rect.origin),
            rect.size.scaled(self.zoom),
        )
    }

    /// Transform from document space to clip space.
    pub fn document_to_clip(&self) -> Affine {
        Affine::rect_to_clip(&self.visible_rect())
    }
}

// ===================================================================
// Tests
// ===================================================================
