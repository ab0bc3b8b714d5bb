//! # vellum-core
//!
//! Backend-independent core of the Vellum paginated document viewer:
//! page layout, viewport math, the per-page raster cache, annotation
//! overlays and gesture recognition.
//!
//! ## Architecture
//!
//! ```text
//!  RasterSource (pages)          pointer events
//!       │                              │
//!       ▼                              ▼
//!  Document ── PageRaster        GestureRecognizer
//!       │   └─ Vec<Overlay>            │ pan / pinch / placement
//!       │                              ▼
//!       └──────────► DocView ◄── Viewport + PageLayout
//!                       │          RedrawScheduler
//!                       ▼
//!                 dyn GpuBackend  (wgpu in vellum-render,
//!                                  HeadlessGpu in tests)
//! ```
//!
//! ## Modules
//!
//! - [`geometry`]: `Size`, `Point`, `Rect`, `Range`
//! - [`transform`]: 2D affine transforms and a save/restore stack
//! - [`gpu`]: the `GpuBackend` seam and a recording headless backend
//! - [`source`]: page sources and pixel buffers
//! - [`raster`]: per-page texture cache with reuse and growth
//! - [`overlay`]: ink and text annotations
//! - [`text`]: text layout/engine and host editor seams
//! - [`layout`]: vertical page stacking
//! - [`viewport`]: scroll, zoom and coordinate conversion
//! - [`redraw`]: redraw coalescing
//! - [`border`]: page frame geometry
//! - [`document`]: pages, rasters and overlays together
//! - [`gesture`]: pointer gesture recognition
//! - [`view`]: the orchestrating `DocView`
//! - [`config`]: JSON viewer configuration

pub mod border;
pub mod config;
pub mod document;
pub mod geometry;
pub mod gesture;
pub mod gpu;
pub mod layout;
pub mod overlay;
pub mod raster;
pub mod redraw;
pub mod source;
pub mod text;
pub mod transform;
pub mod view;
pub mod viewport;

// Re-exports for ergonomic use.
pub use config::{ConfigError, ViewerConfig};
pub use document::{Document, OverlayRef, PageUpdate};
pub use geometry::{Point, Range, Rect, Size};
pub use gesture::{GestureOutput, GestureRecognizer, PointerEvent, PointerId, PointerPhase};
pub use gpu::{BufferId, GpuBackend, GpuError, HeadlessGpu, TextureId};
pub use layout::PageLayout;
pub use overlay::{Overlay, OverlayId, OverlayState, Tool};
pub use raster::{PageRaster, UpdateError};
pub use source::{PixelBuffer, RasterError, RasterSource};
pub use text::{EditorDelegate, EditorSession, RenderedText, TextEngine, TextError, TextLayout};
pub use transform::{Affine, TransformStack};
pub use view::{DocView, ViewStats};
pub use viewport::Viewport;
