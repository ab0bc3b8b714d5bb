//! Text layout and inline-editor collaborators.
//!
//! Text overlays do not lay out or rasterize text themselves.  They hold a
//! [`TextLayout`] created by a [`TextEngine`] and ask it for pixels, and
//! hand editing over to an [`EditorDelegate`] owned by the host.

use thiserror::Error;

use crate::geometry::{Point, Rect, Size};
use crate::overlay::OverlayId;
use crate::source::PixelBuffer;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TextError {
    #[error("Text engine not initialised")]
    NotReady,
    #[error("Text render failed: {0}")]
    Render(String),
}

/// Output of [`TextLayout::render`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedText {
    pub pixels: PixelBuffer,
    /// Page-space rectangle actually covered by `pixels`, after the pixel
    /// size was rounded up.
    pub rect: Rect,
}

/// One block of rich text.
pub trait TextLayout {
    /// Replace the content with an HTML fragment.
    fn set_html(&mut self, html: &str);

    /// Wrap at `width` page units (`f32::INFINITY` for no wrapping).
    /// Returns `false` when the width is unchanged and no relayout happened.
    fn wrap(&mut self, width: f32) -> bool;

    /// Size of the laid-out text in page units.
    fn size(&self) -> Size;

    /// Rasterize the text at `zoom` with its top-left at `origin`, keeping
    /// only the part inside `clip` (both page space).
    fn render(&mut self, origin: Point, clip: &Rect, zoom: f32) -> Result<RenderedText, TextError>;
}

/// Factory for [`TextLayout`]s, backed by a process-wide font system.
pub trait TextEngine {
    fn is_ready(&self) -> bool;

    fn create_layout(&self) -> Result<Box<dyn TextLayout>, TextError>;
}

/// A live editor surface handed out by an [`EditorDelegate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EditorSession(pub u64);

/// Host-side inline editor.
pub trait EditorDelegate {
    /// Show an editor for `overlay` at `viewport_rect` preloaded with
    /// `html`.
    fn place_editor(&mut self, overlay: OverlayId, html: &str, viewport_rect: Rect) -> EditorSession;

    /// Current content of the editor.
    fn editor_html(&self, session: EditorSession) -> String;

    fn remove_editor(&mut self, session: EditorSession);
}
