//! wgpu render pipelines.
//!
//! Both pipelines take their transform from bind group 0: one uniform
//! buffer holding every draw's [`TransformUniform`], addressed with a
//! dynamic offset per draw.
//!
//! - [`color`]: flat-colored triangle lists
//! - [`texture`]: textured triangle lists (group 1: texture + sampler)

pub mod color;
pub mod texture;

use std::num::NonZeroU64;

use wgpu::{
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    BufferBindingType, Device, FrontFace, PolygonMode, PrimitiveState, PrimitiveTopology,
    ShaderStages,
};

use crate::vertex::TransformUniform;

pub use color::ColorPipeline;
pub use texture::TexturePipeline;

pub(crate) const TRANSFORM_SIZE: u64 = std::mem::size_of::<TransformUniform>() as u64;

/// Group 0 layout: one transform uniform at a dynamic offset.
pub fn transform_bind_group_layout(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("transform_bgl"),
        entries: &[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::VERTEX,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(TRANSFORM_SIZE),
            },
            count: None,
        }],
    })
}

fn triangle_list() -> PrimitiveState {
    PrimitiveState {
        topology: PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: FrontFace::Ccw,
        cull_mode: None, // 2D, no backface culling
        polygon_mode: PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}
