//! Recording backend for testing and headless runs.
//!
//! This backend doesn't perform any GPU work. It tracks the fixed-function state a real
//! backend would hold and appends every call to a command log, so the pipeline's output
//! can be inspected without GPU hardware.

use rustc_hash::{FxHashMap, FxHashSet};

use glam::{Mat4, Vec3, Vec4};

use crate::resources::{Material, UniformValue};
use crate::scene::ObjectId;

use super::traits::{BackendError, BackendResult, RenderBackend};
use super::types::*;

/// One backend call, in the order it was made
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    ClearRenderBuffers(ClearBuffers),
    CreateRenderTarget(RenderTargetHandle),
    DestroyRenderTarget(RenderTargetHandle),
    ActivateRenderTarget(RenderTargetHandle, Option<CubeFace>),
    RestoreDefaultRenderTarget,
    EnterRenderMode(RenderMode),
    SetBlendingEnabled(bool),
    SetBlendingFunction(BlendFactor, BlendFactor),
    ActivateMaterial { name: String, reverse_culling: bool },
    SetStandardUniforms,
    SetCustomUniform(String),
    SetTexture(String, TextureHandle),
    CreateGeometryBuffer(BufferHandle, usize),
    WriteGeometryBuffer(BufferHandle, usize),
    DestroyGeometryBuffer(BufferHandle),
    DrawSubMesh(ObjectId),
    DrawShadowVolume(BufferHandle, u32),
}

/// What a recorded draw rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    SubMesh(ObjectId),
    ShadowVolume(BufferHandle),
}

/// Snapshot of the backend state at the moment of a draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub kind: DrawKind,
    /// Name of the active material
    pub material: String,
    pub mode: RenderMode,
    /// Blend function when blending was enabled
    pub blending: Option<(BlendFactor, BlendFactor)>,
    /// Active offscreen target, `None` for the default target
    pub target: Option<(RenderTargetHandle, Option<CubeFace>)>,
    /// Light bound through the standard uniforms
    pub light: Option<ObjectId>,
    pub reverse_culling: bool,
    pub model_view_projection: Mat4,
    pub eye_position: Vec3,
    /// Number of CPU-deformed positions supplied with the draw
    pub deformed_vertices: Option<usize>,
}

impl DrawRecord {
    /// The sub-mesh renderer drawn, if this was a sub-mesh draw
    pub fn renderer(&self) -> Option<ObjectId> {
        match self.kind {
            DrawKind::SubMesh(id) => Some(id),
            DrawKind::ShadowVolume(_) => None,
        }
    }

    pub fn is_shadow_volume(&self) -> bool {
        matches!(self.kind, DrawKind::ShadowVolume(_))
    }
}

/// Headless backend that records every call
#[derive(Debug)]
pub struct RecordingBackend {
    commands: Vec<BackendCommand>,
    draws: Vec<DrawRecord>,
    next_handle: u64,
    mode: RenderMode,
    blending_enabled: bool,
    blend_function: (BlendFactor, BlendFactor),
    material: Option<(String, bool)>,
    uniforms: Option<StandardUniforms>,
    target: Option<(RenderTargetHandle, Option<CubeFace>)>,
    geometry_buffers: FxHashMap<BufferHandle, usize>,
    render_targets: FxHashSet<RenderTargetHandle>,
    fail_geometry_buffers: bool,
    fail_render_targets: bool,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    /// Create a new recording backend.
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            draws: Vec::new(),
            next_handle: 1,
            mode: RenderMode::Standard,
            blending_enabled: false,
            blend_function: (BlendFactor::One, BlendFactor::Zero),
            material: None,
            uniforms: None,
            target: None,
            geometry_buffers: FxHashMap::default(),
            render_targets: FxHashSet::default(),
            fail_geometry_buffers: false,
            fail_render_targets: false,
        }
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Recording Backend"
    }

    /// Every call made so far
    pub fn commands(&self) -> &[BackendCommand] {
        &self.commands
    }

    /// Every draw made so far, with the state it was made under
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Forget recorded commands and draws. Live resources and state are kept.
    pub fn clear_log(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    /// Geometry buffers created and not yet destroyed
    pub fn live_geometry_buffers(&self) -> usize {
        self.geometry_buffers.len()
    }

    /// Vertex capacity of a live geometry buffer
    pub fn geometry_buffer_len(&self, buffer: BufferHandle) -> Option<usize> {
        self.geometry_buffers.get(&buffer).copied()
    }

    /// Render targets created and not yet destroyed
    pub fn live_render_targets(&self) -> usize {
        self.render_targets.len()
    }

    /// Currently active offscreen target
    pub fn active_render_target(&self) -> Option<(RenderTargetHandle, Option<CubeFace>)> {
        self.target
    }

    pub fn render_mode(&self) -> RenderMode {
        self.mode
    }

    /// Make every subsequent geometry buffer allocation fail
    pub fn set_fail_geometry_buffers(&mut self, fail: bool) {
        self.fail_geometry_buffers = fail;
    }

    /// Make every subsequent render target allocation fail
    pub fn set_fail_render_targets(&mut self, fail: bool) {
        self.fail_render_targets = fail;
    }

    fn allocate_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn record_draw(&mut self, kind: DrawKind, deformed_vertices: Option<usize>) {
        let (material, reverse_culling) = self
            .material
            .clone()
            .unwrap_or_else(|| (String::new(), false));
        let uniforms = self.uniforms;

        self.draws.push(DrawRecord {
            kind,
            material,
            mode: self.mode,
            blending: self.blending_enabled.then_some(self.blend_function),
            target: self.target,
            light: uniforms.and_then(|u| u.light_id),
            reverse_culling,
            model_view_projection: uniforms
                .map(|u| u.model_view_projection)
                .unwrap_or(Mat4::IDENTITY),
            eye_position: uniforms.map(|u| u.eye_position).unwrap_or(Vec3::ZERO),
            deformed_vertices,
        });
    }
}

impl RenderBackend for RecordingBackend {
    fn clear_render_buffers(&mut self, buffers: ClearBuffers, _color: Vec4) {
        self.commands.push(BackendCommand::ClearRenderBuffers(buffers));
    }

    fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> BackendResult<RenderTarget> {
        if self.fail_render_targets {
            return Err(BackendError::RenderTargetCreationFailed(format!(
                "{:?} ({}x{})",
                desc.label, desc.width, desc.height
            )));
        }

        log::trace!(
            "RecordingBackend: creating render target {:?} ({}x{})",
            desc.label,
            desc.width,
            desc.height
        );

        let handle = RenderTargetHandle(self.allocate_handle());
        let color_texture = desc
            .has_color
            .then(|| TextureHandle(self.allocate_handle()));
        self.render_targets.insert(handle);
        self.commands.push(BackendCommand::CreateRenderTarget(handle));

        Ok(RenderTarget {
            handle,
            color_texture,
            width: desc.width,
            height: desc.height,
        })
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) {
        if !self.render_targets.remove(&target) {
            log::warn!("RecordingBackend: destroying unknown render target {:?}", target);
        }
        self.commands.push(BackendCommand::DestroyRenderTarget(target));
    }

    fn activate_render_target(&mut self, target: RenderTargetHandle, face: Option<CubeFace>) {
        self.target = Some((target, face));
        self.commands
            .push(BackendCommand::ActivateRenderTarget(target, face));
    }

    fn restore_default_render_target(&mut self) {
        self.target = None;
        self.commands.push(BackendCommand::RestoreDefaultRenderTarget);
    }

    fn enter_render_mode(&mut self, mode: RenderMode) {
        self.mode = mode;
        self.commands.push(BackendCommand::EnterRenderMode(mode));
    }

    fn set_blending_enabled(&mut self, enabled: bool) {
        self.blending_enabled = enabled;
        self.commands.push(BackendCommand::SetBlendingEnabled(enabled));
    }

    fn set_blending_function(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.blend_function = (src, dst);
        self.commands
            .push(BackendCommand::SetBlendingFunction(src, dst));
    }

    fn activate_material(&mut self, material: &Material, reverse_culling: bool) {
        self.material = Some((material.name().to_string(), reverse_culling));
        self.uniforms = None;
        self.commands.push(BackendCommand::ActivateMaterial {
            name: material.name().to_string(),
            reverse_culling,
        });
    }

    fn set_standard_uniforms(&mut self, uniforms: &StandardUniforms) {
        self.uniforms = Some(*uniforms);
        self.commands.push(BackendCommand::SetStandardUniforms);
    }

    fn set_custom_uniform(&mut self, name: &str, _value: &UniformValue) {
        self.commands
            .push(BackendCommand::SetCustomUniform(name.to_string()));
    }

    fn set_texture(&mut self, name: &str, texture: TextureHandle) {
        self.commands
            .push(BackendCommand::SetTexture(name.to_string(), texture));
    }

    fn create_geometry_buffer(&mut self, vertex_count: usize) -> BackendResult<BufferHandle> {
        if self.fail_geometry_buffers {
            return Err(BackendError::BufferCreationFailed(format!(
                "{vertex_count} vertices"
            )));
        }

        let buffer = BufferHandle(self.allocate_handle());
        self.geometry_buffers.insert(buffer, vertex_count);
        self.commands
            .push(BackendCommand::CreateGeometryBuffer(buffer, vertex_count));
        Ok(buffer)
    }

    fn write_geometry_buffer(&mut self, buffer: BufferHandle, positions: &[Vec3]) {
        match self.geometry_buffers.get(&buffer) {
            Some(&capacity) if capacity >= positions.len() => {}
            Some(&capacity) => log::warn!(
                "RecordingBackend: writing {} vertices into buffer {:?} of {}",
                positions.len(),
                buffer,
                capacity
            ),
            None => log::warn!("RecordingBackend: writing to unknown buffer {:?}", buffer),
        }
        self.commands
            .push(BackendCommand::WriteGeometryBuffer(buffer, positions.len()));
    }

    fn destroy_geometry_buffer(&mut self, buffer: BufferHandle) {
        if self.geometry_buffers.remove(&buffer).is_none() {
            log::warn!("RecordingBackend: destroying unknown buffer {:?}", buffer);
        }
        self.commands
            .push(BackendCommand::DestroyGeometryBuffer(buffer));
    }

    fn draw_sub_mesh(&mut self, draw: &DrawCall<'_>) {
        self.commands.push(BackendCommand::DrawSubMesh(draw.renderer));
        self.record_draw(
            DrawKind::SubMesh(draw.renderer),
            draw.deformed_positions.map(<[Vec3]>::len),
        );
    }

    fn draw_shadow_volume(&mut self, buffer: BufferHandle, vertex_count: u32) {
        self.commands
            .push(BackendCommand::DrawShadowVolume(buffer, vertex_count));
        self.record_draw(DrawKind::ShadowVolume(buffer), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_buffers_are_tracked() {
        let mut backend = RecordingBackend::new();
        let buffer = backend.create_geometry_buffer(36).unwrap();
        assert_eq!(backend.live_geometry_buffers(), 1);
        assert_eq!(backend.geometry_buffer_len(buffer), Some(36));

        backend.destroy_geometry_buffer(buffer);
        assert_eq!(backend.live_geometry_buffers(), 0);
    }

    #[test]
    fn failure_injection() {
        let mut backend = RecordingBackend::new();
        backend.set_fail_geometry_buffers(true);
        backend.set_fail_render_targets(true);

        assert!(matches!(
            backend.create_geometry_buffer(3),
            Err(BackendError::BufferCreationFailed(_))
        ));
        assert!(backend
            .create_render_target(&RenderTargetDescriptor::default())
            .is_err());
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn draws_snapshot_blending_state() {
        let mut backend = RecordingBackend::new();
        let material = Material::new("lit");
        backend.activate_material(&material, false);
        backend.set_blending_enabled(true);
        backend.set_blending_function(BlendFactor::One, BlendFactor::One);
        backend.draw_sub_mesh(&DrawCall {
            renderer: ObjectId(7),
            vertex_count: 3,
            index_count: 3,
            deformed_positions: None,
        });

        let draw = &backend.draws()[0];
        assert_eq!(draw.renderer(), Some(ObjectId(7)));
        assert_eq!(draw.material, "lit");
        assert_eq!(draw.blending, Some((BlendFactor::One, BlendFactor::One)));
    }
}
