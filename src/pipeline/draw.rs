//! Single-draw helpers shared by every pass

use glam::{Mat4, Vec3};

use crate::backend::{DrawCall, RenderBackend, StandardUniforms};
use crate::resources::{Material, Skybox, SubMeshRenderer};
use crate::scene::Scene;

use super::config::ForwardBlending;
use super::render_queue::RenderQueueEntry;
use super::shadow_cache::ShadowVolume;
use super::view::{LightingDescriptor, ViewDescriptor};

/// When a draw blends onto what is already in the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendingFilter {
    /// Blend only if the entry was already drawn in this render target pass
    #[default]
    OnlyIfRendered,
    Always,
    Never,
}

/// How [`render_mesh`] draws one entry
#[derive(Debug, Clone, Copy)]
pub struct MeshDrawParams<'a> {
    /// Replaces the entry's own material
    pub material_override: Option<&'a Material>,
    /// Mark the entry rendered after drawing
    pub flag_rendered: bool,
    /// Draw even if the entry was already rendered
    pub render_more_than_once: bool,
    pub blending_filter: BlendingFilter,
    pub blending: ForwardBlending,
}

impl Default for MeshDrawParams<'_> {
    fn default() -> Self {
        Self {
            material_override: None,
            flag_rendered: true,
            render_more_than_once: true,
            blending_filter: BlendingFilter::OnlyIfRendered,
            blending: ForwardBlending::Additive,
        }
    }
}

/// Model, model-view and model-view-projection for a world transform
fn object_matrices(model: Mat4, view: &ViewDescriptor) -> (Mat4, Mat4, Mat4) {
    let model = view.uniform_world.matrix() * model;
    let model_view = view.view_inverse * model;
    (model, model_view, view.projection * model_view)
}

fn standard_uniforms(
    model: Mat4,
    model_view: Mat4,
    model_view_projection: Mat4,
    view: &ViewDescriptor,
    lighting: &LightingDescriptor<'_>,
) -> StandardUniforms {
    StandardUniforms {
        model,
        view: view.view_inverse,
        projection: view.projection,
        model_view,
        model_view_projection,
        normal_matrix: model_view.inverse().transpose(),
        eye_position: view.position,
        light: lighting
            .light
            .map(|light| light.uniform_data(lighting.position, lighting.direction)),
        light_id: lighting.light.map(|light| light.id),
        clip_plane: view.clip_plane,
    }
}

fn upload_material_state<B: RenderBackend + ?Sized>(backend: &mut B, material: &Material) {
    for (name, value) in &material.uniforms {
        backend.set_custom_uniform(name, value);
    }
    for (name, texture) in &material.textures {
        backend.set_texture(name, *texture);
    }
}

fn find_sub_renderer<'s>(
    scene: &'s Scene,
    entry: &RenderQueueEntry,
) -> Option<&'s SubMeshRenderer> {
    scene
        .node(entry.node)?
        .renderer
        .as_ref()?
        .sub_renderer(entry.sub_mesh_index)
}

/// Whether the entry's sub-mesh and its renderer still exist
pub fn is_drawable(scene: &Scene, entry: &RenderQueueEntry) -> bool {
    entry.sub_mesh().is_some() && find_sub_renderer(scene, entry).is_some()
}

/// Draw one queue entry. Returns whether a draw was issued.
///
/// Skips entries whose material disagrees with `lighting.use_lighting`, and entries already
/// rendered in this pass unless `render_more_than_once` is set.
pub fn render_mesh<B: RenderBackend + ?Sized>(
    backend: &mut B,
    scene: &Scene,
    entry: &mut RenderQueueEntry,
    lighting: &LightingDescriptor<'_>,
    view: &ViewDescriptor,
    params: &MeshDrawParams<'_>,
) -> bool {
    let material = params.material_override.unwrap_or(entry.material.as_ref());
    if material.uses_lighting != lighting.use_lighting {
        return false;
    }
    if entry.rendered && !params.render_more_than_once {
        return false;
    }

    let (Some(sub_mesh), Some(sub_renderer)) = (entry.sub_mesh(), find_sub_renderer(scene, entry))
    else {
        log::warn!(
            "Skipping queue entry for node {:?}: sub-mesh {} is gone",
            entry.node,
            entry.sub_mesh_index
        );
        return false;
    };

    let (model, model_view, mvp) = object_matrices(entry.aggregate.matrix(), view);
    backend.activate_material(material, view.reverse_culling);
    backend.set_standard_uniforms(&standard_uniforms(model, model_view, mvp, view, lighting));
    upload_material_state(backend, material);

    let blend = match params.blending_filter {
        BlendingFilter::Always => true,
        BlendingFilter::Never => false,
        BlendingFilter::OnlyIfRendered => entry.rendered,
    };
    if blend {
        let (src, dst) = params.blending.factors();
        backend.set_blending_enabled(true);
        backend.set_blending_function(src, dst);
    } else {
        backend.set_blending_enabled(false);
    }

    sub_renderer.render(backend, sub_mesh);

    if params.flag_rendered {
        entry.rendered = true;
    }
    true
}

/// Draw a cached shadow volume with X/Y shrunk by `narrowing` in clip space
pub fn render_shadow_volume<B: RenderBackend + ?Sized>(
    backend: &mut B,
    scene: &Scene,
    entry: &RenderQueueEntry,
    volume: &ShadowVolume,
    material: &Material,
    lighting: &LightingDescriptor<'_>,
    view: &ViewDescriptor,
    narrowing: f32,
) -> bool {
    let Some(sub_renderer) = find_sub_renderer(scene, entry) else {
        log::warn!("Skipping shadow volume for node {:?}: renderer is gone", entry.node);
        return false;
    };

    let (model, model_view, mvp) = object_matrices(entry.aggregate.matrix(), view);
    let narrowed = Mat4::from_scale(Vec3::new(narrowing, narrowing, 1.0)) * mvp;

    backend.activate_material(material, view.reverse_culling);
    backend.set_standard_uniforms(&standard_uniforms(
        model, model_view, narrowed, view, lighting,
    ));
    backend.set_blending_enabled(false);
    sub_renderer.render_shadow_volume(backend, volume.buffer, volume.vertex_count());
    true
}

/// Draw the skybox centered on the eye, unlit and without blending
pub fn render_skybox<B: RenderBackend + ?Sized>(
    backend: &mut B,
    skybox: &Skybox,
    view: &ViewDescriptor,
) {
    let (model, model_view, mvp) =
        object_matrices(Mat4::from_translation(view.position), view);

    backend.activate_material(&skybox.material, view.reverse_culling);
    backend.set_standard_uniforms(&standard_uniforms(
        model,
        model_view,
        mvp,
        view,
        &LightingDescriptor::unlit(),
    ));
    upload_material_state(backend, &skybox.material);
    backend.set_blending_enabled(false);

    for sub_mesh in &skybox.mesh.sub_meshes {
        backend.draw_sub_mesh(&DrawCall {
            renderer: skybox.id,
            vertex_count: sub_mesh.vertex_count() as u32,
            index_count: sub_mesh.index_count() as u32,
            deformed_positions: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BlendFactor, RecordingBackend};
    use crate::resources::{Mesh, MeshFilter, MeshRenderer};
    use crate::scene::{Camera, Light, Transform};
    use std::sync::Arc;

    fn setup(material: Material) -> (Scene, RenderQueueEntry) {
        let mut scene = Scene::new();
        let node = scene.create_node("mesh");
        let mesh = Arc::new(Mesh::cube(1.0));
        let material = Arc::new(material);
        scene
            .set_mesh(
                node,
                MeshFilter::new(mesh.clone()),
                MeshRenderer::for_mesh(&mesh, vec![material.clone()]),
            )
            .unwrap();
        let renderer = scene.node(node).unwrap().renderer.as_ref().unwrap().sub_renderers()[0].id;

        let entry = RenderQueueEntry {
            node,
            mesh,
            sub_mesh_index: 0,
            renderer,
            material,
            cast_shadows: false,
            receive_shadows: false,
            use_back_set_shadow_volume: false,
            is_static: false,
            layer_mask: Default::default(),
            aggregate: Transform::IDENTITY,
            rendered: false,
        };
        (scene, entry)
    }

    fn view() -> ViewDescriptor {
        ViewDescriptor::from_camera(
            &Camera::default(),
            &Transform::from_position(Vec3::new(0.0, 0.0, 5.0)),
        )
    }

    #[test]
    fn lighting_mismatch_skips_draw() {
        let (scene, mut entry) = setup(Material::new("lit"));
        let mut backend = RecordingBackend::new();

        let drawn = render_mesh(
            &mut backend,
            &scene,
            &mut entry,
            &LightingDescriptor::unlit(),
            &view(),
            &MeshDrawParams::default(),
        );
        assert!(!drawn);
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn second_draw_blends_additively() {
        let (scene, mut entry) = setup(Material::new("lit"));
        let mut backend = RecordingBackend::new();
        let light = Light::point(Vec3::ONE, 1.0, 10.0);
        let lighting = LightingDescriptor::lit(&light, Vec3::Y, Vec3::ZERO);
        let view = view();

        assert!(!entry.rendered);
        render_mesh(&mut backend, &scene, &mut entry, &lighting, &view, &Default::default());
        assert!(entry.rendered);
        render_mesh(&mut backend, &scene, &mut entry, &lighting, &view, &Default::default());

        let draws = backend.draws();
        assert_eq!(draws[0].blending, None);
        assert_eq!(draws[1].blending, Some((BlendFactor::One, BlendFactor::One)));
    }

    #[test]
    fn render_once_entries_are_not_repeated() {
        let (scene, mut entry) = setup(Material::unlit("flat"));
        let mut backend = RecordingBackend::new();
        let params = MeshDrawParams {
            render_more_than_once: false,
            ..Default::default()
        };
        let unlit = LightingDescriptor::unlit();

        assert!(render_mesh(&mut backend, &scene, &mut entry, &unlit, &view(), &params));
        assert!(!render_mesh(&mut backend, &scene, &mut entry, &unlit, &view(), &params));
        assert_eq!(backend.draws().len(), 1);
    }

    #[test]
    fn always_filter_uses_requested_blending() {
        let (scene, mut entry) = setup(Material::new("lit"));
        let mut backend = RecordingBackend::new();
        let outline = Material::ssao_outline();
        let params = MeshDrawParams {
            material_override: Some(&outline),
            flag_rendered: false,
            blending_filter: BlendingFilter::Always,
            blending: ForwardBlending::Subtractive,
            ..Default::default()
        };

        render_mesh(
            &mut backend,
            &scene,
            &mut entry,
            &LightingDescriptor::unlit(),
            &view(),
            &params,
        );
        let draw = &backend.draws()[0];
        assert_eq!(draw.material, "builtin_ssao_outline");
        assert_eq!(draw.blending, Some((BlendFactor::Zero, BlendFactor::SrcAlpha)));
        assert!(!entry.rendered);
    }

    #[test]
    fn removed_node_is_skipped() {
        let (mut scene, mut entry) = setup(Material::new("lit"));
        scene.remove_node(entry.node).unwrap();
        let mut backend = RecordingBackend::new();
        let light = Light::default();

        let drawn = render_mesh(
            &mut backend,
            &scene,
            &mut entry,
            &LightingDescriptor::lit(&light, Vec3::ZERO, Vec3::NEG_Y),
            &view(),
            &MeshDrawParams::default(),
        );
        assert!(!drawn);
    }

    #[test]
    fn shadow_volume_transform_is_narrowed() {
        let (scene, entry) = setup(Material::new("lit"));
        let mut backend = RecordingBackend::new();
        let volume = ShadowVolume {
            buffer: backend.create_geometry_buffer(3).unwrap(),
            positions: vec![Vec3::ZERO; 3],
            generation: 1,
        };
        let view = view();

        render_shadow_volume(
            &mut backend,
            &scene,
            &entry,
            &volume,
            &Material::shadow_volume(),
            &LightingDescriptor::unlit(),
            &view,
            0.99,
        );

        let mvp = view.projection * view.view_inverse;
        let expected = Mat4::from_scale(Vec3::new(0.99, 0.99, 1.0)) * mvp;
        let draw = &backend.draws()[0];
        assert!(draw.is_shadow_volume());
        assert!(draw.model_view_projection.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn skybox_follows_the_eye() {
        let mut backend = RecordingBackend::new();
        let skybox = Skybox::cube();
        let view = view();
        render_skybox(&mut backend, &skybox, &view);

        let draw = &backend.draws()[0];
        assert_eq!(draw.blending, None);
        assert_eq!(draw.light, None);
        // The eye sits at the skybox origin, so the model-view has no translation
        let model_view = view.view_inverse * Mat4::from_translation(view.position);
        assert!(model_view.w_axis.truncate().length() < 1e-5);
    }
}
