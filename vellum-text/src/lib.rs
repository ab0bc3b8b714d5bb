//! # vellum-text
//!
//! Text engine for the Vellum viewer's text overlays, built on
//! `cosmic-text`.
//!
//! ## Architecture
//!
//! ```text
//! fonts::init()  (FontSystem + SwashCache, once per process)
//!     │
//!     ▼
//! CosmicTextEngine::create_layout() ──► RichParagraph
//!                                           │ set_html → html::parse → spans
//!                                           │ wrap(width) → size()
//!                                           ▼
//!                               render(origin, clip, zoom) ──► RGBA pixels
//! ```
//!
//! - **`fonts`**: process-wide font state and readiness.
//! - **`html`**: the HTML subset overlays store.
//! - **`paragraph`**: layout and rasterization of one paragraph.
//! - **`engine`**: the `TextEngine` handed to the viewer.

pub mod engine;
pub mod fonts;
pub mod html;
pub mod paragraph;

// Re-exports for ergonomic use.
pub use engine::CosmicTextEngine;
pub use html::Span;
pub use paragraph::{ParagraphStyle, RichParagraph};
