//! `RichParagraph`: a block of styled text laid out by `cosmic-text`.
//!
//! Layout happens in page units; rendering re-shapes at `zoom` so glyphs
//! are rasterized at device resolution rather than scaled up.

use cosmic_text::{
    Attrs, Buffer, Color as CColor, Family, FontSystem, Metrics, Shaping, Style as CStyle,
    SwashCache, SwashContent, Weight,
};
use log::{debug, warn};
use vellum_core::{PixelBuffer, Point, Rect, RenderedText, Size, TextError, TextLayout};

use crate::fonts;
use crate::html::{self, Span};

/// Paragraph style, in page units.
#[derive(Clone, Debug, PartialEq)]
pub struct ParagraphStyle {
    pub font_size: f32,
    pub line_height: f32,
    /// RGBA8.
    pub color: [u8; 4],
}

impl Default for ParagraphStyle {
    fn default() -> Self {
        Self {
            font_size: 14.0,
            line_height: 18.0,
            color: [0, 0, 0, 255],
        }
    }
}

pub struct RichParagraph {
    style: ParagraphStyle,
    spans: Vec<Span>,
    wrap_width: f32,
    size: Size,
    /// Content changed since the last layout.
    dirty: bool,
}

impl RichParagraph {
    pub fn new(style: ParagraphStyle) -> Self {
        Self {
            style,
            spans: Vec::new(),
            wrap_width: f32::INFINITY,
            size: Size::ZERO,
            dirty: false,
        }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn wrap_width(&self) -> f32 {
        self.wrap_width
    }

    fn relayout(&mut self) {
        self.dirty = false;
        if self.spans.is_empty() {
            self.size = Size::ZERO;
            return;
        }
        match fonts::with_fonts(|ctx| {
            let buffer = self.shape(&mut ctx.font_system, 1.0);
            measure(&buffer, self.style.line_height)
        }) {
            Ok(size) => self.size = size,
            Err(e) => warn!("paragraph layout skipped: {e}"),
        }
    }

    /// Shape the spans at `scale` device pixels per page unit.
    fn shape(&self, font_system: &mut FontSystem, scale: f32) -> Buffer {
        let metrics = Metrics::new(self.style.font_size * scale, self.style.line_height * scale);
        let mut buffer = Buffer::new(font_system, metrics);
        let width = self.wrap_width.is_finite().then_some(self.wrap_width * scale);
        buffer.set_size(font_system, width, None);

        let [r, g, b, a] = self.style.color;
        let base = Attrs::new()
            .family(Family::SansSerif)
            .color(CColor::rgba(r, g, b, a));
        let spans = self.spans.iter().map(|span| {
            let mut attrs = base;
            if span.bold {
                attrs = attrs.weight(Weight::BOLD);
            }
            if span.italic {
                attrs = attrs.style(CStyle::Italic);
            }
            (span.text.as_str(), attrs)
        });
        buffer.set_rich_text(font_system, spans, base, Shaping::Advanced);
        buffer.shape_until_scroll(font_system, false);
        buffer
    }
}

/// Extent of the shaped lines.
fn measure(buffer: &Buffer, line_height: f32) -> Size {
    let mut width: f32 = 0.0;
    let mut height: f32 = 0.0;
    for run in buffer.layout_runs() {
        width = width.max(run.line_w);
        height = height.max(run.line_top + line_height);
    }
    Size::new(width, height)
}

/// Rasterize `buffer` into a `width × height` RGBA8 image whose top-left
/// is at `offset` in buffer pixels.
fn rasterize(
    buffer: &Buffer,
    font_system: &mut FontSystem,
    swash_cache: &mut SwashCache,
    offset: (i32, i32),
    width: u32,
    height: u32,
    default_color: [u8; 4],
) -> Vec<u8> {
    let mut data = vec![0u8; width as usize * height as usize * 4];
    for run in buffer.layout_runs() {
        for glyph in run.glyphs.iter() {
            let physical = glyph.physical((0.0, 0.0), 1.0);
            let color = glyph
                .color_opt
                .map(|c| [c.r(), c.g(), c.b(), c.a()])
                .unwrap_or(default_color);
            let Some(image) = swash_cache.get_image(font_system, physical.cache_key) else {
                continue; // whitespace or missing glyph
            };
            let left = physical.x + image.placement.left - offset.0;
            let top = run.line_y as i32 + physical.y - image.placement.top - offset.1;
            let (gw, gh) = (image.placement.width as i32, image.placement.height as i32);
            for gy in 0..gh {
                for gx in 0..gw {
                    let (x, y) = (left + gx, top + gy);
                    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                        continue;
                    }
                    let src = (gy * gw + gx) as usize;
                    let pixel = match image.content {
                        SwashContent::Mask => {
                            let coverage = image.data[src] as u32;
                            [
                                color[0],
                                color[1],
                                color[2],
                                (color[3] as u32 * coverage / 255) as u8,
                            ]
                        }
                        SwashContent::Color => {
                            let i = src * 4;
                            [image.data[i], image.data[i + 1], image.data[i + 2], image.data[i + 3]]
                        }
                        SwashContent::SubpixelMask => {
                            let i = src * 3;
                            let coverage = (image.data[i] as u32 + image.data[i + 1] as u32 + image.data[i + 2] as u32) / 3;
                            [
                                color[0],
                                color[1],
                                color[2],
                                (color[3] as u32 * coverage / 255) as u8,
                            ]
                        }
                    };
                    blend(&mut data, (y as usize * width as usize + x as usize) * 4, pixel);
                }
            }
        }
    }
    data
}

/// Source-over onto straight-alpha RGBA8.
fn blend(data: &mut [u8], at: usize, src: [u8; 4]) {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = data[at + 3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let s = src[c] as f32 * sa;
        let d = data[at + c] as f32 * da * (1.0 - sa);
        data[at + c] = ((s + d) / out_a).round().min(255.0) as u8;
    }
    data[at + 3] = (out_a * 255.0).round() as u8;
}

impl TextLayout for RichParagraph {
    fn set_html(&mut self, html: &str) {
        self.spans = html::parse(html);
        self.dirty = true;
        self.relayout();
    }

    fn wrap(&mut self, width: f32) -> bool {
        if width == self.wrap_width && !self.dirty {
            return false;
        }
        self.wrap_width = width;
        self.relayout();
        true
    }

    fn size(&self) -> Size {
        self.size
    }

    fn render(&mut self, origin: Point, clip: &Rect, zoom: f32) -> Result<RenderedText, TextError> {
        if zoom <= 0.0 {
            return Err(TextError::Render(format!("bad zoom {zoom}")));
        }
        let bounds = Rect::from_origin_size(origin, self.size);
        let visible = bounds.intersect(clip);
        if visible.is_empty() {
            return Err(TextError::Render(format!("text at {bounds} is outside {clip}")));
        }
        let width = (visible.size.width * zoom).ceil() as u32;
        let height = (visible.size.height * zoom).ceil() as u32;
        let offset = (
            ((visible.origin.x - origin.x) * zoom).floor() as i32,
            ((visible.origin.y - origin.y) * zoom).floor() as i32,
        );
        let color = self.style.color;
        let data = fonts::with_fonts(|ctx| {
            let buffer = self.shape(&mut ctx.font_system, zoom);
            rasterize(&buffer, &mut ctx.font_system, &mut ctx.swash_cache, offset, width, height, color)
        })?;
        let pixels = PixelBuffer::new(width, height, data).map_err(|e| TextError::Render(e.to_string()))?;
        debug!("rendered paragraph {width}x{height} at zoom {zoom}");
        Ok(RenderedText {
            pixels,
            rect: Rect::from_origin_size(
                visible.origin,
                Size::new(width as f32 / zoom, height as f32 / zoom),
            ),
        })
    }
}

// ===================================================================
// Tests
// ===================================================================
