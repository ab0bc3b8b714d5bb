//! `CosmicTextEngine`: the viewer's [`TextEngine`].
//!
//! Hands out [`RichParagraph`]s sharing the process-wide font state.
//! Until `fonts::init()` has run the engine reports not-ready and text
//! overlays stay unrendered.

use vellum_core::{TextEngine, TextError, TextLayout};

use crate::fonts;
use crate::paragraph::{ParagraphStyle, RichParagraph};

#[derive(Clone, Debug, Default)]
pub struct CosmicTextEngine {
    style: ParagraphStyle,
}

impl CosmicTextEngine {
    pub fn new(style: ParagraphStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &ParagraphStyle {
        &self.style
    }
}

impl TextEngine for CosmicTextEngine {
    fn is_ready(&self) -> bool {
        fonts::is_ready()
    }

    fn create_layout(&self) -> Result<Box<dyn TextLayout>, TextError> {
        if !fonts::is_ready() {
            return Err(TextError::NotReady);
        }
        Ok(Box::new(RichParagraph::new(self.style.clone())))
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::{Point, Rect};

    #[test]
    fn test_layout_after_init() {
        let has_fonts = fonts::init();
        let engine = CosmicTextEngine::default();
        assert!(engine.is_ready());
        let mut layout = engine.create_layout().unwrap();
        layout.set_html("<p>note</p>");
        layout.wrap(f32::INFINITY);
        if !has_fonts {
            return;
        }
        assert!(layout.size().width > 0.0);
        let rendered = layout
            .render(Point::ZERO, &Rect::new(0.0, 0.0, 500.0, 500.0), 1.0)
            .unwrap();
        assert!(rendered.pixels.width() > 0);
    }

    #[test]
    fn test_default_style() {
        let engine = CosmicTextEngine::default();
        assert_eq!(engine.style().font_size, 14.0);
        assert_eq!(engine.style().color, [0, 0, 0, 255]);
    }
}
