//! Mesh renderer components
//!
//! A node draws when it has both a [`MeshFilter`] (what to draw) and a [`MeshRenderer`]
//! (how to draw it). The renderer holds one [`SubMeshRenderer`] per sub-mesh.

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::backend::{BufferHandle, DrawCall, RenderBackend};
use crate::scene::ObjectId;

use super::shadow_volume::{extrude_shadow_volume, ExtrusionParams};
use super::{Material, Mesh, SubMesh};

/// Mesh reference plus its shadow flags
#[derive(Debug, Clone)]
pub struct MeshFilter {
    pub mesh: Arc<Mesh>,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    /// Extrude shadow volumes from the faces pointing away from the light
    pub use_back_set_shadow_volume: bool,
}

impl MeshFilter {
    pub fn new(mesh: Arc<Mesh>) -> Self {
        Self {
            mesh,
            cast_shadows: false,
            receive_shadows: false,
            use_back_set_shadow_volume: false,
        }
    }

    pub fn with_shadows(mut self, cast: bool, receive: bool) -> Self {
        self.cast_shadows = cast;
        self.receive_shadows = receive;
        self
    }

    pub fn with_back_set_shadow_volume(mut self, enabled: bool) -> Self {
        self.use_back_set_shadow_volume = enabled;
        self
    }
}

/// Draws one sub-mesh of a mesh
#[derive(Debug, Clone, Default)]
pub struct SubMeshRenderer {
    /// Assigned by the scene when the renderer is attached
    pub id: ObjectId,
    deformed_positions: Option<Vec<Vec3>>,
}

impl SubMeshRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local-space positions produced by CPU skinning, if any
    pub fn deformed_positions(&self) -> Option<&[Vec3]> {
        self.deformed_positions.as_deref()
    }

    pub fn set_deformed_positions(&mut self, positions: Option<Vec<Vec3>>) {
        self.deformed_positions = positions;
    }

    /// Positions to draw and extrude: deformed when skinned, the sub-mesh's otherwise
    pub fn positions<'a>(&'a self, sub_mesh: &'a SubMesh) -> &'a [Vec3] {
        self.deformed_positions
            .as_deref()
            .unwrap_or(&sub_mesh.positions)
    }

    /// Issue the draw for the active material and uniforms
    pub fn render<B: RenderBackend + ?Sized>(&self, backend: &mut B, sub_mesh: &SubMesh) {
        backend.draw_sub_mesh(&DrawCall {
            renderer: self.id,
            vertex_count: sub_mesh.vertex_count() as u32,
            index_count: sub_mesh.index_count() as u32,
            deformed_positions: self.deformed_positions(),
        });
    }

    /// Draw a shadow volume previously built into `buffer`
    pub fn render_shadow_volume<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        buffer: BufferHandle,
        vertex_count: usize,
    ) {
        backend.draw_shadow_volume(buffer, vertex_count as u32);
    }

    /// Extrude this sub-mesh's shadow volume. The light is given in mesh-local space.
    pub fn build_shadow_volume(&self, sub_mesh: &SubMesh, params: &ExtrusionParams) -> Vec<Vec3> {
        extrude_shadow_volume(self.positions(sub_mesh), sub_mesh.triangles(), params)
    }
}

/// Renderer for rigid meshes
#[derive(Debug, Clone, Default)]
pub struct StaticMeshRenderer {
    pub materials: Vec<Arc<Material>>,
    pub sub_renderers: Vec<SubMeshRenderer>,
}

impl StaticMeshRenderer {
    pub fn new(materials: Vec<Arc<Material>>, sub_mesh_count: usize) -> Self {
        Self {
            materials,
            sub_renderers: vec![SubMeshRenderer::new(); sub_mesh_count],
        }
    }
}

/// Renderer for meshes deformed by bones on the CPU.
///
/// Every vertex follows exactly one bone. Bone transforms are world-space and come from
/// the animation system.
#[derive(Debug, Clone, Default)]
pub struct SkinnedMeshRenderer {
    pub materials: Vec<Arc<Material>>,
    pub sub_renderers: Vec<SubMeshRenderer>,
    pub bone_transforms: Vec<Mat4>,
}

impl SkinnedMeshRenderer {
    pub fn new(materials: Vec<Arc<Material>>, sub_mesh_count: usize, bone_count: usize) -> Self {
        Self {
            materials,
            sub_renderers: vec![SubMeshRenderer::new(); sub_mesh_count],
            bone_transforms: vec![Mat4::IDENTITY; bone_count],
        }
    }

    /// Move every vertex by its bone, then back into the node's local space
    fn skin(&mut self, model_inverse: Mat4, mesh: &Mesh) {
        for (sub_renderer, sub_mesh) in self.sub_renderers.iter_mut().zip(&mesh.sub_meshes) {
            let Some(bone_indices) = sub_mesh.bone_indices.as_ref() else {
                sub_renderer.set_deformed_positions(None);
                continue;
            };

            let deformed = sub_mesh
                .positions
                .iter()
                .enumerate()
                .map(|(i, &position)| {
                    let bone = bone_indices
                        .get(i)
                        .and_then(|&b| self.bone_transforms.get(b as usize));
                    match bone {
                        Some(bone) => (model_inverse * *bone).transform_point3(position),
                        None => position,
                    }
                })
                .collect();
            sub_renderer.set_deformed_positions(Some(deformed));
        }
    }
}

/// Renderer attached to a scene node
#[derive(Debug, Clone)]
pub enum MeshRenderer {
    Unskinned(StaticMeshRenderer),
    Skinned(SkinnedMeshRenderer),
}

impl MeshRenderer {
    pub fn unskinned(materials: Vec<Arc<Material>>, sub_mesh_count: usize) -> Self {
        MeshRenderer::Unskinned(StaticMeshRenderer::new(materials, sub_mesh_count))
    }

    pub fn skinned(
        materials: Vec<Arc<Material>>,
        sub_mesh_count: usize,
        bone_count: usize,
    ) -> Self {
        MeshRenderer::Skinned(SkinnedMeshRenderer::new(
            materials,
            sub_mesh_count,
            bone_count,
        ))
    }

    /// Renderer for `mesh` with one sub-renderer per sub-mesh
    pub fn for_mesh(mesh: &Mesh, materials: Vec<Arc<Material>>) -> Self {
        Self::unskinned(materials, mesh.sub_mesh_count())
    }

    /// Per-frame CPU hook, called with the node's world transform and its inverse
    pub fn pre_render(&mut self, _model: Mat4, model_inverse: Mat4, mesh: &Mesh) {
        match self {
            MeshRenderer::Unskinned(_) => {}
            MeshRenderer::Skinned(skinned) => skinned.skin(model_inverse, mesh),
        }
    }

    fn materials(&self) -> &[Arc<Material>] {
        match self {
            MeshRenderer::Unskinned(r) => &r.materials,
            MeshRenderer::Skinned(r) => &r.materials,
        }
    }

    pub fn sub_renderers(&self) -> &[SubMeshRenderer] {
        match self {
            MeshRenderer::Unskinned(r) => &r.sub_renderers,
            MeshRenderer::Skinned(r) => &r.sub_renderers,
        }
    }

    pub fn sub_renderers_mut(&mut self) -> &mut [SubMeshRenderer] {
        match self {
            MeshRenderer::Unskinned(r) => &mut r.sub_renderers,
            MeshRenderer::Skinned(r) => &mut r.sub_renderers,
        }
    }

    pub fn sub_renderer(&self, index: usize) -> Option<&SubMeshRenderer> {
        self.sub_renderers().get(index)
    }

    pub fn sub_renderer_count(&self) -> usize {
        self.sub_renderers().len()
    }

    pub fn material_count(&self) -> usize {
        self.materials().len()
    }

    /// Material for sub-mesh `index`, cycling when there are fewer materials than sub-meshes
    pub fn material(&self, index: usize) -> Option<&Arc<Material>> {
        let materials = self.materials();
        if materials.is_empty() {
            return None;
        }
        materials.get(index % materials.len())
    }

    /// Mutable access to skinning bones, `None` for unskinned renderers
    pub fn bone_transforms_mut(&mut self) -> Option<&mut Vec<Mat4>> {
        match self {
            MeshRenderer::Unskinned(_) => None,
            MeshRenderer::Skinned(r) => Some(&mut r.bone_transforms),
        }
    }
}

/// Background mesh drawn around the camera
#[derive(Debug, Clone)]
pub struct Skybox {
    /// Assigned by the scene when the owning camera is attached
    pub id: ObjectId,
    pub mesh: Arc<Mesh>,
    pub material: Arc<Material>,
}

impl Skybox {
    pub fn new(mesh: Arc<Mesh>, material: Arc<Material>) -> Self {
        Self {
            id: ObjectId::INVALID,
            mesh,
            material,
        }
    }

    /// Unit cube drawn with the built-in skybox material
    pub fn cube() -> Self {
        Self::new(Arc::new(Mesh::cube(2.0)), Arc::new(Material::skybox()))
    }
}
