//! Page rasterization collaborator.
//!
//! A [`RasterSource`] is the document decoder: it knows how many pages
//! there are, how large each page is in page units, and how to render an
//! arbitrary page-space region into an RGBA8 [`PixelBuffer`].

use thiserror::Error;

use crate::geometry::{Rect, Size};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RasterError {
    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },
    #[error("Refusing to render empty region {0}")]
    EmptyRegion(Rect),
    #[error("Pixel buffer is {actual} bytes, expected {expected}")]
    BadBuffer { expected: usize, actual: usize },
    #[error("Rasterizer failed: {0}")]
    Backend(String),
}

/// Row-major RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap `data`, checking it holds exactly `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(RasterError::BadBuffer {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// A buffer filled with one color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&rgba);
        }
        Self { width, height, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// The document decoder the viewer renders from.
pub trait RasterSource {
    fn page_count(&self) -> usize;

    /// Size of page `page` in page units.
    fn page_size(&self, page: usize) -> Size;

    /// Render `region` (page space) of `page` into a buffer of exactly
    /// `pixel_width × pixel_height` pixels.
    fn render(
        &mut self,
        page: usize,
        region: &Rect,
        pixel_width: u32,
        pixel_height: u32,
    ) -> Result<PixelBuffer, RasterError>;
}

// ===================================================================
// Tests
// ===================================================================
