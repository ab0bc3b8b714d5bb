//! Vertex buffer layouts for the core's vertex formats and the
//! per-draw transform uniform.
//!
//! The vertex structs themselves live in `vellum_core::gpu` so the core
//! can build geometry without depending on `wgpu`.

use bytemuck::{Pod, Zeroable};
use vellum_core::gpu::{ColorVertex, TexVertex};
use vellum_core::Affine;
use wgpu::{BufferAddress, VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

/// Layout of [`ColorVertex`]: position + normalised RGBA8.
pub fn color_vertex_layout() -> VertexBufferLayout<'static> {
    static ATTRS: &[VertexAttribute] = &[
        // location(0) = position
        VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: VertexFormat::Float32x2,
        },
        // location(1) = color
        VertexAttribute {
            offset: 8,
            shader_location: 1,
            format: VertexFormat::Unorm8x4,
        },
    ];
    VertexBufferLayout {
        array_stride: std::mem::size_of::<ColorVertex>() as BufferAddress,
        step_mode: VertexStepMode::Vertex,
        attributes: ATTRS,
    }
}

/// Layout of [`TexVertex`]: position + texcoord.
pub fn tex_vertex_layout() -> VertexBufferLayout<'static> {
    static ATTRS: &[VertexAttribute] = &[
        // location(0) = position
        VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: VertexFormat::Float32x2,
        },
        // location(1) = texcoord
        VertexAttribute {
            offset: 8,
            shader_location: 1,
            format: VertexFormat::Float32x2,
        },
    ];
    VertexBufferLayout {
        array_stride: std::mem::size_of::<TexVertex>() as BufferAddress,
        step_mode: VertexStepMode::Vertex,
        attributes: ATTRS,
    }
}

/// A 3×3 affine as WGSL `mat3x3<f32>`: three columns padded to 16
/// bytes each.  48 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TransformUniform {
    pub columns: [[f32; 4]; 3],
}

impl TransformUniform {
    pub fn from_affine(affine: &Affine) -> Self {
        let c = affine.columns();
        Self {
            columns: [
                [c[0][0], c[0][1], c[0][2], 0.0],
                [c[1][0], c[1][1], c[1][2], 0.0],
                [c[2][0], c[2][1], c[2][2], 0.0],
            ],
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
