//! Common types shared between the render pipeline and backends

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::scene::{LightUniformData, ObjectId};

/// Handle to a geometry buffer holding vertex positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to an offscreen render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetHandle(pub(crate) u64);

macro_rules! raw_handle {
    ($($name:ident),*) => {
        $(
            impl $name {
                /// Wrap a backend-specific raw id
                pub const fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                /// The backend-specific raw id
                pub const fn raw(self) -> u64 {
                    self.0
                }
            }
        )*
    };
}

raw_handle!(BufferHandle, TextureHandle, RenderTargetHandle);

bitflags! {
    /// Buffers cleared at the start of a camera pass
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearBuffers: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

impl Default for ClearBuffers {
    fn default() -> Self {
        Self::all()
    }
}

/// Fixed-function state the backend is switched into for a group of draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    /// Regular color + depth rendering
    #[default]
    Standard,
    /// Regular rendering that only passes where the stencil buffer is clear
    StandardWithShadowTest,
    /// Stencil-only rendering of shadow volumes, no color or depth writes
    ShadowVolumeRender,
    /// Depth writes only, no color output
    DepthOnly,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Face of a cube render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    /// All faces in the order they are rendered
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Rotation that turns a camera looking down -Z into one looking through this face
    pub fn view_rotation(self) -> Mat4 {
        use std::f32::consts::{FRAC_PI_2, PI};
        match self {
            CubeFace::PositiveX => Mat4::from_rotation_y(-FRAC_PI_2),
            CubeFace::NegativeX => Mat4::from_rotation_y(FRAC_PI_2),
            CubeFace::PositiveY => Mat4::from_rotation_x(FRAC_PI_2),
            CubeFace::NegativeY => Mat4::from_rotation_x(-FRAC_PI_2),
            CubeFace::PositiveZ => Mat4::from_rotation_y(PI),
            CubeFace::NegativeZ => Mat4::IDENTITY,
        }
    }
}

/// Render target descriptor
#[derive(Debug, Clone)]
pub struct RenderTargetDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub has_color: bool,
    pub has_depth: bool,
    pub cube: bool,
}

impl Default for RenderTargetDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            has_color: true,
            has_depth: true,
            cube: false,
        }
    }
}

/// A render target created by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub handle: RenderTargetHandle,
    /// Color attachment, sampleable by later passes
    pub color_texture: Option<TextureHandle>,
    pub width: u32,
    pub height: u32,
}

/// A single sub-mesh draw
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    /// Engine id of the sub-mesh renderer issuing the draw
    pub renderer: ObjectId,
    pub vertex_count: u32,
    pub index_count: u32,
    /// CPU-deformed positions (skinning output) replacing the uploaded ones
    pub deformed_positions: Option<&'a [Vec3]>,
}

/// Uniforms every material receives before a draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardUniforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub model_view: Mat4,
    pub model_view_projection: Mat4,
    /// Inverse transpose of the model-view matrix
    pub normal_matrix: Mat4,
    pub eye_position: Vec3,
    /// Light illuminating this draw, `None` for unlit passes
    pub light: Option<LightUniformData>,
    /// Engine id of the light in `light`
    pub light_id: Option<ObjectId>,
    pub clip_plane: Option<Vec4>,
}

impl StandardUniforms {
    /// Matrix block ready for upload
    pub fn transform_data(&self) -> TransformUniformData {
        TransformUniformData {
            model: self.model,
            model_view: self.model_view,
            model_view_projection: self.model_view_projection,
            normal_matrix: self.normal_matrix,
        }
    }
}

/// Per-draw transform uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TransformUniformData {
    pub model: Mat4,
    pub model_view: Mat4,
    pub model_view_projection: Mat4,
    pub normal_matrix: Mat4,
}
