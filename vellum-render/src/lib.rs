//! # vellum-render
//!
//! GPU backend for the Vellum viewer, built on `wgpu`.
//!
//! ## Architecture
//!
//! ```text
//!  DocView (vellum-core)
//!       │  create/update/delete buffers and textures
//!       │  draw_colored / draw_textured
//!       ▼
//!  WgpuBackend: impl GpuBackend     ◀─── handle maps + recorded draws
//!       │
//!       ▼
//!  WgpuBackend.render_frame()       ◀─── one render pass, one draw per
//!                                        recorded call
//! ```
//!
//! ## Crate modules
//!
//! - [`context`]: GPU device/queue/surface initialisation, device loss
//! - [`vertex`]: vertex layouts and the transform uniform
//! - [`pipelines`]: color and texture render pipelines
//! - [`renderer`]: the `GpuBackend` implementation

pub mod context;
pub mod pipelines;
pub mod renderer;
pub mod vertex;

// Re-exports for convenience
pub use context::{ContextError, GpuContext};
pub use renderer::{FrameStats, RenderError, WgpuBackend};
pub use vertex::TransformUniform;
