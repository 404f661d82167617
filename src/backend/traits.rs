//! Backend abstraction trait
//!
//! The forward pipeline never talks to a GPU API directly. Everything it needs from the
//! graphics layer goes through [`RenderBackend`], which is injected into the render manager
//! at construction.

use crate::backend::types::*;
use crate::resources::{Material, UniformValue};
use glam::{Vec3, Vec4};
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create render target: {0}")]
    RenderTargetCreationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
    #[error("Internal backend error: {0}")]
    Internal(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Graphics backend consumed by the forward render manager
pub trait RenderBackend {
    /// Clear the buffers selected by `buffers` on the active render target
    fn clear_render_buffers(&mut self, buffers: ClearBuffers, color: Vec4);

    // Render targets

    /// Create an offscreen render target
    fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> BackendResult<RenderTarget>;

    /// Destroy an offscreen render target
    fn destroy_render_target(&mut self, target: RenderTargetHandle);

    /// Make `target` the destination of subsequent draws. `face` selects a cube face.
    fn activate_render_target(&mut self, target: RenderTargetHandle, face: Option<CubeFace>);

    /// Route subsequent draws back to the default (window) target
    fn restore_default_render_target(&mut self);

    // Fixed-function state

    /// Switch depth/stencil/color-write state for the next draws
    fn enter_render_mode(&mut self, mode: RenderMode);

    fn set_blending_enabled(&mut self, enabled: bool);

    fn set_blending_function(&mut self, src: BlendFactor, dst: BlendFactor);

    // Materials and uniforms

    /// Bind the material's shader. `reverse_culling` flips the cull face (mirrored views).
    fn activate_material(&mut self, material: &Material, reverse_culling: bool);

    /// Upload the standard per-draw uniforms for the active material
    fn set_standard_uniforms(&mut self, uniforms: &StandardUniforms);

    /// Upload a named material uniform
    fn set_custom_uniform(&mut self, name: &str, value: &UniformValue);

    /// Bind a texture to a named sampler of the active material
    fn set_texture(&mut self, name: &str, texture: TextureHandle);

    // Geometry

    /// Allocate a position buffer with room for `vertex_count` vertices
    fn create_geometry_buffer(&mut self, vertex_count: usize) -> BackendResult<BufferHandle>;

    /// Overwrite the contents of a position buffer
    fn write_geometry_buffer(&mut self, buffer: BufferHandle, positions: &[Vec3]);

    fn destroy_geometry_buffer(&mut self, buffer: BufferHandle);

    // Draws

    /// Draw a sub-mesh with the active material and uniforms
    fn draw_sub_mesh(&mut self, draw: &DrawCall<'_>);

    /// Draw a triangle list of shadow-volume positions
    fn draw_shadow_volume(&mut self, buffer: BufferHandle, vertex_count: u32);
}
