//! Page sources the desktop viewer can open.
//!
//! Each image file is one page, one page unit per image pixel.  Without
//! images the viewer shows blank letter-sized pages with a ruled grid so
//! scrolling and zooming have something to look at.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::{debug, info};
use thiserror::Error;
use vellum_core::{PixelBuffer, RasterError, RasterSource, Rect, Size};

#[derive(Error, Debug)]
pub enum PagesError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("No pages to show")]
    Empty,
}

/// Letter size in points.
pub const LETTER: Size = Size {
    width: 612.0,
    height: 792.0,
};

const GRID_STEP: f32 = 36.0;
const PAPER: [u8; 4] = [255, 255, 255, 255];
const RULE: [u8; 4] = [214, 224, 240, 255];

fn check_page(page: usize, count: usize) -> Result<(), RasterError> {
    if page >= count {
        return Err(RasterError::PageOutOfRange { page, count });
    }
    Ok(())
}

fn check_request(region: &Rect, pixel_width: u32, pixel_height: u32) -> Result<(), RasterError> {
    if region.is_empty() || pixel_width == 0 || pixel_height == 0 {
        return Err(RasterError::EmptyRegion(*region));
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────────
// Image pages
// ───────────────────────────────────────────────────────────────────

pub struct ImagePages {
    pages: Vec<RgbaImage>,
}

impl ImagePages {
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self, PagesError> {
        if paths.is_empty() {
            return Err(PagesError::Empty);
        }
        let mut pages = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let page = image::open(path)
                .map_err(|source| PagesError::Open {
                    path: path.to_path_buf(),
                    source,
                })?
                .to_rgba8();
            info!("loaded {} ({}x{})", path.display(), page.width(), page.height());
            pages.push(page);
        }
        Ok(Self { pages })
    }
}

impl RasterSource for ImagePages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page: usize) -> Size {
        self.pages
            .get(page)
            .map(|img| Size::new(img.width() as f32, img.height() as f32))
            .unwrap_or(Size::ZERO)
    }

    fn render(
        &mut self,
        page: usize,
        region: &Rect,
        pixel_width: u32,
        pixel_height: u32,
    ) -> Result<PixelBuffer, RasterError> {
        check_page(page, self.pages.len())?;
        check_request(region, pixel_width, pixel_height)?;
        let img = &self.pages[page];

        // Whole source pixels covering the region.
        let x0 = region.origin.x.floor().clamp(0.0, img.width() as f32) as u32;
        let y0 = region.origin.y.floor().clamp(0.0, img.height() as f32) as u32;
        let x1 = region.right().ceil().clamp(0.0, img.width() as f32) as u32;
        let y1 = region.bottom().ceil().clamp(0.0, img.height() as f32) as u32;
        if x1 <= x0 || y1 <= y0 {
            return Err(RasterError::EmptyRegion(*region));
        }

        let cropped = imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image();
        let scaled = if cropped.dimensions() == (pixel_width, pixel_height) {
            cropped
        } else {
            imageops::resize(&cropped, pixel_width, pixel_height, FilterType::Triangle)
        };
        debug!("page {page}: {region} -> {pixel_width}x{pixel_height}");
        PixelBuffer::new(pixel_width, pixel_height, scaled.into_raw())
    }
}

// ───────────────────────────────────────────────────────────────────
// Blank pages
// ───────────────────────────────────────────────────────────────────

pub struct BlankPages {
    count: usize,
    size: Size,
}

impl BlankPages {
    pub fn new(count: usize, size: Size) -> Self {
        Self { count, size }
    }
}

impl RasterSource for BlankPages {
    fn page_count(&self) -> usize {
        self.count
    }

    fn page_size(&self, page: usize) -> Size {
        if page < self.count {
            self.size
        } else {
            Size::ZERO
        }
    }

    fn render(
        &mut self,
        page: usize,
        region: &Rect,
        pixel_width: u32,
        pixel_height: u32,
    ) -> Result<PixelBuffer, RasterError> {
        check_page(page, self.count)?;
        check_request(region, pixel_width, pixel_height)?;

        let sx = region.size.width / pixel_width as f32;
        let sy = region.size.height / pixel_height as f32;
        let mut data = Vec::with_capacity(pixel_width as usize * pixel_height as usize * 4);
        for py in 0..pixel_height {
            let y0 = region.origin.y + py as f32 * sy;
            let row_ruled = crosses_rule(y0, sy);
            for px in 0..pixel_width {
                let x0 = region.origin.x + px as f32 * sx;
                let ruled = row_ruled || crosses_rule(x0, sx);
                data.extend_from_slice(if ruled { &RULE } else { &PAPER });
            }
        }
        PixelBuffer::new(pixel_width, pixel_height, data)
    }
}

/// Does the pixel spanning `[start, start + extent)` contain a grid line?
fn crosses_rule(start: f32, extent: f32) -> bool {
    let next = (start / GRID_STEP).ceil() * GRID_STEP;
    next > 0.0 && next < start + extent.max(1e-3)
}

// ───────────────────────────────────────────────────────────────────
// Either
// ───────────────────────────────────────────────────────────────────

pub enum PageSource {
    Images(ImagePages),
    Blank(BlankPages),
}

impl PageSource {
    /// Images when any were given, otherwise `blank_pages` letter pages.
    pub fn from_args(images: &[PathBuf], blank_pages: usize) -> Result<Self, PagesError> {
        if !images.is_empty() {
            return Ok(Self::Images(ImagePages::open(images)?));
        }
        if blank_pages == 0 {
            return Err(PagesError::Empty);
        }
        Ok(Self::Blank(BlankPages::new(blank_pages, LETTER)))
    }
}

impl RasterSource for PageSource {
    fn page_count(&self) -> usize {
        match self {
            Self::Images(p) => p.page_count(),
            Self::Blank(p) => p.page_count(),
        }
    }

    fn page_size(&self, page: usize) -> Size {
        match self {
            Self::Images(p) => p.page_size(page),
            Self::Blank(p) => p.page_size(page),
        }
    }

    fn render(
        &mut self,
        page: usize,
        region: &Rect,
        pixel_width: u32,
        pixel_height: u32,
    ) -> Result<PixelBuffer, RasterError> {
        match self {
            Self::Images(p) => p.render(page, region, pixel_width, pixel_height),
            Self::Blank(p) => p.render(page, region, pixel_width, pixel_height),
        }
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        })
    }

    #[test]
    fn test_image_page_sizes() {
        let pages = ImagePages {
            pages: vec![checker(40, 30), checker(10, 20)],
        };
        assert_eq!(pages.page_count(), 2);
        assert_eq!(pages.page_size(0), Size::new(40.0, 30.0));
        assert_eq!(pages.page_size(1), Size::new(10.0, 20.0));
        assert_eq!(pages.page_size(2), Size::ZERO);
    }

    #[test]
    fn test_image_region_at_native_scale() {
        let mut pages = ImagePages {
            pages: vec![checker(8, 8)],
        };
        let buf = pages.render(0, &Rect::new(1.0, 0.0, 2.0, 2.0), 2, 2).unwrap();
        assert_eq!(buf.width(), 2);
        // (1,0) is blue, (2,0) is red.
        assert_eq!(&buf.data()[0..4], &[0, 0, 255, 255]);
        assert_eq!(&buf.data()[4..8], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_image_region_scaled() {
        let mut pages = ImagePages {
            pages: vec![checker(16, 16)],
        };
        let buf = pages.render(0, &Rect::new(0.0, 0.0, 8.0, 8.0), 32, 32).unwrap();
        assert_eq!(buf.data().len(), 32 * 32 * 4);
    }

    #[test]
    fn test_image_region_outside_page() {
        let mut pages = ImagePages {
            pages: vec![checker(8, 8)],
        };
        let err = pages.render(0, &Rect::new(20.0, 20.0, 4.0, 4.0), 4, 4);
        assert!(matches!(err, Err(RasterError::EmptyRegion(_))));
        let err = pages.render(3, &Rect::new(0.0, 0.0, 4.0, 4.0), 4, 4);
        assert_eq!(err, Err(RasterError::PageOutOfRange { page: 3, count: 1 }));
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        checker(12, 9).save(&path).unwrap();
        let pages = ImagePages::open(&[&path]).unwrap();
        assert_eq!(pages.page_size(0), Size::new(12.0, 9.0));

        let missing = dir.path().join("missing.png");
        assert!(matches!(ImagePages::open(&[missing]), Err(PagesError::Open { .. })));
    }

    #[test]
    fn test_blank_pages_rule_grid() {
        let mut pages = BlankPages::new(2, LETTER);
        assert_eq!(pages.page_size(1), LETTER);
        let buf = pages.render(1, &Rect::new(30.0, 30.0, 10.0, 10.0), 10, 10).unwrap();
        let px = |x: usize, y: usize| {
            let i = (y * 10 + x) * 4;
            [buf.data()[i], buf.data()[i + 1], buf.data()[i + 2], buf.data()[i + 3]]
        };
        // Grid line at 36 is pixel 6.
        assert_eq!(px(6, 0), RULE);
        assert_eq!(px(0, 6), RULE);
        assert_eq!(px(0, 0), PAPER);
    }

    #[test]
    fn test_source_from_args() {
        assert!(matches!(PageSource::from_args(&[], 0), Err(PagesError::Empty)));
        let source = PageSource::from_args(&[], 3).unwrap();
        assert_eq!(source.page_count(), 3);
        assert_eq!(source.page_size(0), LETTER);
    }
}
