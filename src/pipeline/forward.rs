//! Forward render manager.
//!
//! Drives the per-frame pipeline against a [`Scene`]:
//!
//! ```ignore
//! let mut manager = ForwardRenderManager::new(backend, EventQueue::new(), config);
//!
//! // Each frame:
//! manager.pre_render(&mut scene);   // Walk the scene, skin, build shadow volumes
//! manager.render_scene(&mut scene); // Draw every camera
//! ```
//!
//! Every camera renders its targets with the same pass order: ambient lights, optional
//! depth pre-pass, SSAO, one shadow-volume + lit pass per light, unlit materials and
//! finally the skybox.

use std::ops::{Deref, DerefMut};

use glam::{Vec3, Vec4};

use crate::backend::{
    ClearBuffers, CubeFace, RenderBackend, RenderMode, RenderTarget, RenderTargetDescriptor,
};
use crate::error::{RenderError, RenderResult};
use crate::resources::{ExtrusionParams, LightSource, Material};
use crate::scene::{
    CameraTarget, EventDispatcher, Light, NodeId, ProcessingDescriptor, Scene, SceneEvent,
    SceneNode, SsaoMode, Transform,
};

use super::config::{ForwardBlending, ForwardRenderConfig};
use super::culling::{mesh_world_sphere, should_cull_by_layer, should_cull_light};
use super::draw::{
    is_drawable, render_mesh, render_shadow_volume, render_skybox, BlendingFilter,
    MeshDrawParams,
};
use super::render_queue::{RenderQueueEntry, RenderQueueManager};
use super::render_target_stack::{RenderTargetStack, StackedTarget};
use super::shadow_cache::{CacheRefresh, ShadowVolumeCache, ShadowVolumeKey};
use super::view::{LightingDescriptor, ViewDescriptor};

/// Where the manager is in the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    /// Waiting for `pre_render`
    #[default]
    Idle,
    /// Scene walked, ready for `render_scene`
    PreRendered,
    Rendering,
}

/// Counters for the current frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub cameras: usize,
    pub lights: usize,
    pub ambient_lights: usize,
    pub queue_entries: usize,
    pub shadow_volumes_built: usize,
    pub shadow_volumes_reused: usize,
    pub shadow_volume_failures: usize,
    pub draw_calls: usize,
    pub shadow_volume_draws: usize,
}

/// Materials the passes draw with instead of the entries' own
#[derive(Debug, Clone)]
struct PassMaterials {
    shadow_volume: Material,
    depth_only: Material,
    ssao_depth: Material,
    ssao_outline: Material,
}

impl Default for PassMaterials {
    fn default() -> Self {
        Self {
            shadow_volume: Material::shadow_volume(),
            depth_only: Material::depth_only(),
            ssao_depth: Material::ssao_depth(),
            ssao_outline: Material::ssao_outline(),
        }
    }
}

/// World position and normalized world direction of a light node
fn light_world(node: &SceneNode, light: &Light) -> (Vec3, Vec3) {
    let aggregate = node.processing.aggregate;
    (
        aggregate.translation(),
        aggregate.transform_vector(light.direction).normalize_or_zero(),
    )
}

/// A shadow-casting light resolved to world space
#[derive(Clone, Copy)]
struct CasterLight<'a> {
    light: &'a Light,
    position: Vec3,
    direction: Vec3,
    is_static: bool,
}

/// Whether `light` cannot affect `entry`
fn culled_for_light(
    entry: &RenderQueueEntry,
    light: &Light,
    position: Vec3,
    direction: Vec3,
) -> bool {
    if should_cull_by_layer(light.culling_mask, entry.layer_mask) {
        return true;
    }
    let Some(sub_mesh) = entry.sub_mesh() else {
        return true;
    };
    let sphere = mesh_world_sphere(&sub_mesh.bounding_box, &entry.aggregate.matrix());
    should_cull_light(light, position, direction, &sphere)
}

/// Check a node's renderer against its mesh and queue one entry per sub-mesh
fn queue_renderable(
    queues: &mut RenderQueueManager,
    id: NodeId,
    node: &SceneNode,
) -> RenderResult<usize> {
    let (renderer, filter) = match (&node.renderer, &node.mesh_filter) {
        (Some(renderer), Some(filter)) => (renderer, filter),
        (Some(_), None) => return Err(RenderError::MissingRenderer(id)),
        _ => return Ok(0),
    };

    let sub_meshes = filter.mesh.sub_mesh_count();
    let sub_renderers = renderer.sub_renderer_count();
    if sub_meshes != sub_renderers {
        return Err(RenderError::SubMeshMismatch {
            node: id,
            sub_meshes,
            sub_renderers,
        });
    }
    if renderer.material_count() == 0 {
        return Err(RenderError::NoMaterials(id));
    }

    for (index, sub_renderer) in renderer.sub_renderers().iter().enumerate() {
        let Some(material) = renderer.material(index) else {
            continue;
        };
        queues.add(RenderQueueEntry {
            node: id,
            mesh: filter.mesh.clone(),
            sub_mesh_index: index,
            renderer: sub_renderer.id,
            material: material.clone(),
            cast_shadows: filter.cast_shadows,
            receive_shadows: filter.receive_shadows,
            use_back_set_shadow_volume: filter.use_back_set_shadow_volume,
            is_static: node.is_static,
            layer_mask: node.layer_mask,
            aggregate: node.processing.aggregate,
            rendered: false,
        });
    }
    Ok(sub_renderers)
}

/// Forward rendering pipeline over an injected backend and event dispatcher
pub struct ForwardRenderManager<B: RenderBackend, D: EventDispatcher> {
    backend: B,
    dispatcher: D,
    config: ForwardRenderConfig,
    queues: RenderQueueManager,
    /// Camera nodes with their render order, sorted ascending
    cameras: Vec<(NodeId, i32)>,
    lights: Vec<NodeId>,
    ambient_lights: Vec<NodeId>,
    /// Nodes whose renderer queued at least one entry
    renderables: Vec<NodeId>,
    shadow_cache: ShadowVolumeCache,
    target_stack: RenderTargetStack,
    ssao_target: Option<RenderTarget>,
    ssao_failed: bool,
    materials: PassMaterials,
    state: FrameState,
    stats: FrameStats,
}

impl<B: RenderBackend, D: EventDispatcher> ForwardRenderManager<B, D> {
    pub fn new(backend: B, dispatcher: D, config: ForwardRenderConfig) -> Self {
        Self {
            backend,
            dispatcher,
            config,
            queues: RenderQueueManager::new(),
            cameras: Vec::new(),
            lights: Vec::new(),
            ambient_lights: Vec::new(),
            renderables: Vec::new(),
            shadow_cache: ShadowVolumeCache::new(),
            target_stack: RenderTargetStack::new(),
            ssao_target: None,
            ssao_failed: false,
            materials: PassMaterials::default(),
            state: FrameState::Idle,
            stats: FrameStats::default(),
        }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    #[inline]
    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn config(&self) -> &ForwardRenderConfig {
        &self.config
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn render_queues(&self) -> &RenderQueueManager {
        &self.queues
    }

    pub fn shadow_cache(&self) -> &ShadowVolumeCache {
        &self.shadow_cache
    }

    /// Camera nodes found by the last walk, in render order
    pub fn cameras(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.cameras.iter().map(|&(node, _)| node)
    }

    pub fn lights(&self) -> &[NodeId] {
        &self.lights
    }

    pub fn ambient_lights(&self) -> &[NodeId] {
        &self.ambient_lights
    }

    pub fn ssao_target(&self) -> Option<&RenderTarget> {
        self.ssao_target.as_ref()
    }

    /// Number of render targets currently pushed
    pub fn render_target_depth(&self) -> usize {
        self.target_stack.depth()
    }

    /// Free every shadow volume buffer and the SSAO target
    pub fn clear_caches(&mut self) {
        self.shadow_cache.clear(&mut self.backend);
        if let Some(target) = self.ssao_target.take() {
            self.backend.destroy_render_target(target.handle);
        }
    }

    // Frame preparation

    /// Walk the scene, run CPU skinning and bring shadow volumes up to date
    pub fn pre_render(&mut self, scene: &mut Scene) {
        debug_assert!(
            self.state != FrameState::Rendering,
            "pre_render called while rendering"
        );

        self.queues.clear_all_render_queues();
        self.cameras.clear();
        self.lights.clear();
        self.ambient_lights.clear();
        self.renderables.clear();
        self.ssao_failed = false;
        self.stats = FrameStats::default();

        let root = scene.root();
        self.pre_process_scene(scene, root, 0);
        self.pre_render_scene(scene);
        self.build_scene_shadow_volumes(scene);

        self.stats.cameras = self.cameras.len();
        self.stats.lights = self.lights.len();
        self.stats.ambient_lights = self.ambient_lights.len();
        self.stats.queue_entries = self.queues.entry_count();
        self.state = FrameState::PreRendered;

        log::trace!(
            "Pre-rendered {} cameras, {} lights, {} queue entries",
            self.stats.cameras,
            self.stats.lights + self.stats.ambient_lights,
            self.stats.queue_entries
        );
    }

    /// Classify `node` and its active descendants.
    ///
    /// Nodes deeper than `max_recursion_depth` are not visited.
    pub fn pre_process_scene(&mut self, scene: &mut Scene, node_id: NodeId, depth: usize) {
        if depth > self.config.max_recursion_depth {
            return;
        }

        let parent_aggregate = scene
            .node(node_id)
            .and_then(|node| node.parent)
            .and_then(|parent| scene.node(parent))
            .map_or(Transform::IDENTITY, |parent| parent.processing.aggregate);

        let Some(node) = scene.node_mut(node_id) else {
            log::warn!("{}", RenderError::InvalidNode(node_id));
            return;
        };
        if !node.active {
            return;
        }

        node.processing = ProcessingDescriptor {
            aggregate: parent_aggregate.compose(&node.transform),
            will_render_dispatched: false,
        };

        if let Some(camera) = node.camera.as_ref() {
            self.insert_camera(node_id, camera.render_order);
        }

        if let Some(light) = node.light.as_mut() {
            if light.is_ambient() {
                if self.ambient_lights.len() < self.config.max_ambient_lights {
                    self.ambient_lights.push(node_id);
                }
            } else {
                light.direction = light.direction.normalize_or_zero();
                if self.lights.len() < self.config.max_lights {
                    self.lights.push(node_id);
                }
            }
        }

        match queue_renderable(&mut self.queues, node_id, node) {
            Ok(0) => {}
            Ok(_) => self.renderables.push(node_id),
            Err(err) => log::warn!("Skipping renderer: {}", err),
        }

        let children = node.children.clone();
        for child in children {
            if !scene.contains(child) {
                log::warn!("Skipping child of {:?}: {}", node_id, RenderError::InvalidNode(child));
                continue;
            }
            self.pre_process_scene(scene, child, depth + 1);
        }
    }

    /// Insert keeping ascending render order; equal orders keep discovery order
    fn insert_camera(&mut self, node: NodeId, render_order: i32) {
        if self.cameras.len() >= self.config.max_cameras {
            return;
        }
        let index = self
            .cameras
            .iter()
            .position(|&(_, order)| order > render_order)
            .unwrap_or(self.cameras.len());
        self.cameras.insert(index, (node, render_order));
    }

    /// Hand every renderable its world transform and inverse for CPU-side deformation
    pub fn pre_render_scene(&mut self, scene: &mut Scene) {
        for &id in &self.renderables {
            let Some(node) = scene.node_mut(id) else {
                continue;
            };
            let model = node.processing.aggregate.matrix();
            if let (Some(renderer), Some(filter)) =
                (node.renderer.as_mut(), node.mesh_filter.as_ref())
            {
                renderer.pre_render(model, model.inverse(), &filter.mesh);
            }
        }
    }

    /// Build or refresh shadow volumes for every shadow-casting light
    pub fn build_scene_shadow_volumes(&mut self, scene: &Scene) {
        for index in 0..self.lights.len() {
            let light_node = self.lights[index];
            self.build_shadow_volumes_for_light(scene, light_node);
        }
    }

    /// Build or refresh the shadow volumes of every caster `light_node` reaches
    pub fn build_shadow_volumes_for_light(&mut self, scene: &Scene, light_node: NodeId) {
        let Some(node) = scene.node(light_node) else {
            log::warn!("{}", RenderError::InvalidNode(light_node));
            return;
        };
        let Some(light) = node.light.as_ref() else {
            return;
        };
        if !node.active || !light.casts_shadows() {
            return;
        }

        let (position, direction) = light_world(node, light);
        let caster_light = CasterLight {
            light,
            position,
            direction,
            is_static: node.is_static,
        };
        let Self {
            backend,
            queues,
            shadow_cache,
            config,
            stats,
            ..
        } = self;

        for entry in queues.iter() {
            let refresh = Self::build_shadow_volumes_for_entry(
                backend,
                shadow_cache,
                config,
                scene,
                &caster_light,
                entry,
            );
            match refresh {
                Some(CacheRefresh::Reused) => stats.shadow_volumes_reused += 1,
                Some(CacheRefresh::Rebuilt { .. }) => stats.shadow_volumes_built += 1,
                Some(CacheRefresh::Failed(_)) => stats.shadow_volume_failures += 1,
                Some(CacheRefresh::Empty) | None => {}
            }
        }
    }

    /// Bring the volume of one (entry, light) pair up to date.
    ///
    /// Returns `None` when the entry does not cast into this light. A pair is rebuilt every
    /// frame unless both the caster and the light are static.
    fn build_shadow_volumes_for_entry(
        backend: &mut B,
        shadow_cache: &mut ShadowVolumeCache,
        config: &ForwardRenderConfig,
        scene: &Scene,
        caster_light: &CasterLight<'_>,
        entry: &RenderQueueEntry,
    ) -> Option<CacheRefresh> {
        let CasterLight {
            light,
            position,
            direction,
            is_static,
        } = *caster_light;
        if !entry.cast_shadows || culled_for_light(entry, light, position, direction) {
            return None;
        }

        let Some(sub_renderer) = scene
            .node(entry.node)
            .and_then(|n| n.renderer.as_ref())
            .and_then(|r| r.sub_renderer(entry.sub_mesh_index))
        else {
            log::warn!("No sub-renderer for shadow caster {:?}", entry.node);
            return None;
        };
        let sub_mesh = entry.sub_mesh().filter(|s| s.has_faces())?;

        let model_inverse = entry.aggregate.inverse().matrix();
        let params = ExtrusionParams {
            light: if light.extrudes_along_direction() {
                LightSource::Direction(model_inverse.transform_vector3(direction))
            } else {
                LightSource::Position(model_inverse.transform_point3(position))
            },
            back_set: entry.use_back_set_shadow_volume,
            length: config.shadow_volume_extrusion,
        };

        let key = ShadowVolumeKey::new(entry.renderer, light.id);
        let dynamic = !entry.is_static || !is_static;
        let refresh = shadow_cache.refresh(backend, key, dynamic, || {
            sub_renderer.build_shadow_volume(sub_mesh, &params)
        });
        if let CacheRefresh::Rebuilt { reused_buffer } = refresh {
            log::debug!("Rebuilt shadow volume {:?} (buffer reused: {})", key, reused_buffer);
        }
        Some(refresh)
    }

    // Rendering

    /// Render every camera found by the last `pre_render`, in ascending render order
    pub fn render_scene(&mut self, scene: &mut Scene) {
        debug_assert!(
            self.state == FrameState::PreRendered,
            "render_scene called without pre_render"
        );
        if self.state != FrameState::PreRendered {
            log::error!("render_scene called without pre_render, output will be stale");
        }
        self.state = FrameState::Rendering;

        for index in 0..self.cameras.len() {
            let (camera_node, _) = self.cameras[index];
            self.render_scene_for_camera(scene, camera_node);
        }

        debug_assert!(self.target_stack.is_empty(), "unbalanced render target stack");
        self.state = FrameState::Idle;

        log::trace!(
            "Rendered {} cameras: {} draws, {} shadow volume draws",
            self.stats.cameras,
            self.stats.draw_calls,
            self.stats.shadow_volume_draws
        );
    }

    /// Render one camera into its target, six times for a cube target
    pub fn render_scene_for_camera(&mut self, scene: &mut Scene, camera_node: NodeId) {
        let Some(node) = scene.node(camera_node) else {
            log::warn!("{}", RenderError::InvalidNode(camera_node));
            return;
        };
        let Some(camera) = node.camera.clone() else {
            return;
        };
        let world = node.processing.aggregate;

        match camera.render_target {
            CameraTarget::Default => {
                let view = ViewDescriptor::from_camera(&camera, &world);
                self.with_render_target(StackedTarget::Default, |this| {
                    this.render_scene_for_current_target(scene, &view)
                });
            }
            CameraTarget::Texture(handle) => {
                let view = ViewDescriptor::from_camera(&camera, &world);
                self.with_render_target(StackedTarget::Offscreen(handle, None), |this| {
                    this.render_scene_for_current_target(scene, &view)
                });
            }
            CameraTarget::Cube(handle) => {
                for face in CubeFace::ALL {
                    let view = ViewDescriptor::for_cube_face(&camera, &world, face);
                    self.with_render_target(StackedTarget::Offscreen(handle, Some(face)), |this| {
                        this.render_scene_for_current_target(scene, &view)
                    });
                }
            }
        }
    }

    /// Run `pass` with `target` active.
    ///
    /// The previous target is restored when the scope drops, including when `pass` unwinds.
    fn with_render_target<R>(
        &mut self,
        target: StackedTarget,
        pass: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.target_stack.push(&mut self.backend, target);
        let mut scope = TargetScope { manager: self };
        pass(&mut *scope)
    }

    /// All passes of one view into the active render target
    pub fn render_scene_for_current_target(&mut self, scene: &mut Scene, view: &ViewDescriptor) {
        self.queues.clear_rendered_flags();
        self.backend
            .clear_render_buffers(view.clear_buffers, view.clear_color);
        self.backend.enter_render_mode(RenderMode::Standard);

        let mut ambient_rendered = false;
        if view.ambient_pass {
            for index in 0..self.ambient_lights.len() {
                let light_node = self.ambient_lights[index];
                ambient_rendered |= self.render_scene_for_light(scene, view, light_node);
            }
        }

        if view.depth_pass {
            self.render_depth_pass(scene, view);
        }

        if view.ssao && view.ssao_mode == SsaoMode::Standard && ambient_rendered {
            self.render_ssao(scene, view);
        }

        for index in 0..self.lights.len() {
            let light_node = self.lights[index];
            self.render_scene_for_light(scene, view, light_node);
        }

        if view.ssao && view.ssao_mode == SsaoMode::Outline {
            self.render_ssao(scene, view);
        }

        self.render_unlit_pass(scene, view);

        if let Some(skybox) = view.skybox.as_ref() {
            self.backend.enter_render_mode(RenderMode::Standard);
            render_skybox(&mut self.backend, skybox, view);
            self.stats.draw_calls += 1;
        }
    }

    /// Shadow-volume and lit sub-passes for one light. Returns false if the light was skipped.
    pub fn render_scene_for_light(
        &mut self,
        scene: &mut Scene,
        view: &ViewDescriptor,
        light_node: NodeId,
    ) -> bool {
        let Some(node) = scene.node(light_node) else {
            log::warn!("{}", RenderError::InvalidNode(light_node));
            return false;
        };
        let Some(light) = node.light.clone() else {
            return false;
        };
        let (position, direction) = light_world(node, &light);
        let casts_shadows = light.casts_shadows();
        let lighting = LightingDescriptor::lit(&light, position, direction);
        let blending = self.config.forward_blending;

        let Self {
            backend,
            dispatcher,
            queues,
            shadow_cache,
            config,
            materials,
            stats,
            ..
        } = self;

        // Sub-pass A: stencil out the shadowed regions
        if casts_shadows {
            backend.enter_render_mode(RenderMode::ShadowVolumeRender);
            for entry in queues.iter() {
                if !entry.cast_shadows
                    || should_cull_by_layer(view.culling_mask, entry.layer_mask)
                    || culled_for_light(entry, &light, position, direction)
                {
                    continue;
                }
                let key = ShadowVolumeKey::new(entry.renderer, light.id);
                let Some(volume) = shadow_cache.get(&key) else {
                    continue;
                };
                let narrowing = config.shadow_volume_narrowing(entry.use_back_set_shadow_volume);
                if render_shadow_volume(
                    backend,
                    scene,
                    entry,
                    volume,
                    &materials.shadow_volume,
                    &lighting,
                    view,
                    narrowing,
                ) {
                    stats.shadow_volume_draws += 1;
                }
            }
        }

        // Sub-pass B: lit geometry, stencil-tested where it receives shadows
        let mut mode = RenderMode::Standard;
        backend.enter_render_mode(mode);
        let params = MeshDrawParams {
            material_override: None,
            flag_rendered: true,
            render_more_than_once: true,
            blending_filter: BlendingFilter::OnlyIfRendered,
            blending,
        };

        for entry in queues.iter_mut() {
            if !entry.material.uses_lighting
                || should_cull_by_layer(view.culling_mask, entry.layer_mask)
                || culled_for_light(entry, &light, position, direction)
            {
                continue;
            }
            if !is_drawable(scene, entry) {
                log::warn!(
                    "Skipping queue entry for node {:?}: sub-mesh {} is gone",
                    entry.node,
                    entry.sub_mesh_index
                );
                continue;
            }

            let wanted = if casts_shadows && entry.receive_shadows {
                RenderMode::StandardWithShadowTest
            } else {
                RenderMode::Standard
            };
            if wanted != mode {
                backend.enter_render_mode(wanted);
                mode = wanted;
            }

            if let Some(target) = scene.node_mut(entry.node) {
                if !target.processing.will_render_dispatched {
                    target.processing.will_render_dispatched = true;
                    dispatcher.dispatch(entry.node, SceneEvent::WillRender);
                }
            }

            if render_mesh(backend, scene, entry, &lighting, view, &params) {
                stats.draw_calls += 1;
            }
        }

        if mode != RenderMode::Standard {
            backend.enter_render_mode(RenderMode::Standard);
        }
        true
    }

    /// Fill the depth buffer without color output
    fn render_depth_pass(&mut self, scene: &Scene, view: &ViewDescriptor) {
        let Self {
            backend,
            queues,
            materials,
            stats,
            ..
        } = self;

        let params = MeshDrawParams {
            material_override: Some(&materials.depth_only),
            flag_rendered: false,
            render_more_than_once: true,
            blending_filter: BlendingFilter::Never,
            blending: ForwardBlending::Additive,
        };
        let unlit = LightingDescriptor::unlit();

        backend.enter_render_mode(RenderMode::DepthOnly);
        for entry in queues.iter_mut() {
            if should_cull_by_layer(view.culling_mask, entry.layer_mask) {
                continue;
            }
            if render_mesh(backend, scene, entry, &unlit, view, &params) {
                stats.draw_calls += 1;
            }
        }
        backend.enter_render_mode(RenderMode::Standard);
    }

    /// Materials that ignore scene lights, drawn once each
    fn render_unlit_pass(&mut self, scene: &Scene, view: &ViewDescriptor) {
        let Self {
            backend,
            queues,
            config,
            stats,
            ..
        } = self;

        let params = MeshDrawParams {
            material_override: None,
            flag_rendered: true,
            render_more_than_once: false,
            blending_filter: BlendingFilter::OnlyIfRendered,
            blending: config.forward_blending,
        };
        let unlit = LightingDescriptor::unlit();

        backend.enter_render_mode(RenderMode::Standard);
        for entry in queues.iter_mut() {
            if should_cull_by_layer(view.culling_mask, entry.layer_mask) {
                continue;
            }
            if render_mesh(backend, scene, entry, &unlit, view, &params) {
                stats.draw_calls += 1;
            }
        }
    }

    /// Create the SSAO target on first use. A failure disables SSAO until the next frame.
    fn ensure_ssao_target(&mut self) -> Option<RenderTarget> {
        if let Some(target) = self.ssao_target {
            return Some(target);
        }
        if self.ssao_failed {
            return None;
        }

        let (width, height) = self.config.ssao_target_size;
        let desc = RenderTargetDescriptor {
            label: Some("ssao".into()),
            width,
            height,
            has_color: true,
            has_depth: true,
            cube: false,
        };
        match self.backend.create_render_target(&desc) {
            Ok(target) => {
                log::debug!("Created {}x{} SSAO target", width, height);
                self.ssao_target = Some(target);
                Some(target)
            }
            Err(err) => {
                log::error!("SSAO disabled for this frame: {}", err);
                self.ssao_failed = true;
                None
            }
        }
    }

    /// Render static depth offscreen, then darken the view by sampling it
    fn render_ssao(&mut self, scene: &Scene, view: &ViewDescriptor) {
        let Some(target) = self.ensure_ssao_target() else {
            return;
        };

        self.with_render_target(StackedTarget::Offscreen(target.handle, None), |this| {
            let Self {
                backend,
                queues,
                materials,
                stats,
                ..
            } = this;

            backend.clear_render_buffers(ClearBuffers::COLOR | ClearBuffers::DEPTH, Vec4::ONE);
            backend.enter_render_mode(RenderMode::Standard);
            let params = MeshDrawParams {
                material_override: Some(&materials.ssao_depth),
                flag_rendered: false,
                render_more_than_once: true,
                blending_filter: BlendingFilter::Never,
                blending: ForwardBlending::Additive,
            };
            let unlit = LightingDescriptor::unlit();
            for entry in queues.iter_mut() {
                if !entry.is_static || should_cull_by_layer(view.culling_mask, entry.layer_mask) {
                    continue;
                }
                if render_mesh(backend, scene, entry, &unlit, view, &params) {
                    stats.draw_calls += 1;
                }
            }
        });

        if let Some(texture) = target.color_texture {
            self.materials.ssao_outline.set_texture("ssao_depth", texture);
        }

        let Self {
            backend,
            queues,
            materials,
            stats,
            ..
        } = self;
        let params = MeshDrawParams {
            material_override: Some(&materials.ssao_outline),
            flag_rendered: false,
            render_more_than_once: true,
            blending_filter: BlendingFilter::Always,
            blending: ForwardBlending::Subtractive,
        };
        let unlit = LightingDescriptor::unlit();

        backend.enter_render_mode(RenderMode::Standard);
        for entry in queues.iter_mut() {
            if should_cull_by_layer(view.culling_mask, entry.layer_mask) {
                continue;
            }
            if render_mesh(backend, scene, entry, &unlit, view, &params) {
                stats.draw_calls += 1;
            }
        }
    }
}

/// Pops the render target pushed by `with_render_target` when dropped
struct TargetScope<'a, B: RenderBackend, D: EventDispatcher> {
    manager: &'a mut ForwardRenderManager<B, D>,
}

impl<B: RenderBackend, D: EventDispatcher> Deref for TargetScope<'_, B, D> {
    type Target = ForwardRenderManager<B, D>;

    fn deref(&self) -> &Self::Target {
        self.manager
    }
}

impl<B: RenderBackend, D: EventDispatcher> DerefMut for TargetScope<'_, B, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.manager
    }
}

impl<B: RenderBackend, D: EventDispatcher> Drop for TargetScope<'_, B, D> {
    fn drop(&mut self) {
        let manager = &mut *self.manager;
        manager.target_stack.pop(&mut manager.backend);
    }
}

impl<B: RenderBackend, D: EventDispatcher> Drop for ForwardRenderManager<B, D> {
    fn drop(&mut self) {
        self.clear_caches();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::resources::{Mesh, MeshFilter, MeshRenderer};
    use crate::scene::{Camera, EventQueue};
    use std::sync::Arc;

    type Manager = ForwardRenderManager<RecordingBackend, EventQueue>;

    fn new_manager(config: ForwardRenderConfig) -> Manager {
        ForwardRenderManager::new(RecordingBackend::new(), EventQueue::new(), config)
    }

    fn add_mesh(scene: &mut Scene, parent: NodeId, name: &str) -> NodeId {
        let node = scene.create_child(parent, name).unwrap();
        let mesh = Arc::new(Mesh::cube(1.0));
        let material = Arc::new(Material::new("lit"));
        scene
            .set_mesh(
                node,
                MeshFilter::new(mesh.clone()),
                MeshRenderer::for_mesh(&mesh, vec![material]),
            )
            .unwrap();
        node
    }

    #[test]
    fn stale_child_is_skipped_and_siblings_still_visited() {
        let mut scene = Scene::new();
        let root = scene.root();
        let doomed = scene.create_node("doomed");
        scene.remove_node(doomed).unwrap();
        scene.node_mut(root).unwrap().children.push(doomed);
        add_mesh(&mut scene, root, "after");

        let mut manager = new_manager(ForwardRenderConfig::default());
        manager.pre_render(&mut scene);
        assert_eq!(manager.render_queues().entry_count(), 1);
    }

    #[test]
    fn deep_chains_stop_at_recursion_limit() {
        let mut scene = Scene::new();
        let mut parent = scene.root();
        for i in 0..500 {
            parent = add_mesh(&mut scene, parent, &format!("link {i}"));
        }

        let mut manager = new_manager(ForwardRenderConfig::default());
        manager.pre_render(&mut scene);
        assert_eq!(manager.render_queues().entry_count(), 128);

        let mut shallow = new_manager(ForwardRenderConfig::default().with_max_recursion_depth(10));
        shallow.pre_render(&mut scene);
        assert_eq!(shallow.render_queues().entry_count(), 10);
    }

    #[test]
    fn cameras_sorted_stable_and_capped() {
        let mut scene = Scene::new();
        let mut nodes = Vec::new();
        for (i, order) in [3, 1, 3, 0, 1].into_iter().enumerate() {
            let node = scene.create_node(format!("camera {i}"));
            scene
                .set_camera(node, Camera::default().with_render_order(order))
                .unwrap();
            nodes.push(node);
        }

        let mut manager = new_manager(ForwardRenderConfig::default().with_max_cameras(4));
        manager.pre_render(&mut scene);
        let cameras: Vec<NodeId> = manager.cameras().collect();
        // The fifth camera overflows the cap
        assert_eq!(cameras, vec![nodes[3], nodes[1], nodes[0], nodes[2]]);
    }

    #[test]
    fn lights_split_by_kind_and_directions_normalized() {
        let mut scene = Scene::new();
        let sun = scene.create_node("sun");
        scene
            .set_light(sun, Light::directional(Vec3::new(0.0, -4.0, 0.0), Vec3::ONE, 1.0))
            .unwrap();
        let sky = scene.create_node("sky");
        scene.set_light(sky, Light::ambient(Vec3::ONE, 0.3)).unwrap();

        let mut manager = new_manager(ForwardRenderConfig::default());
        manager.pre_render(&mut scene);
        assert_eq!(manager.lights(), &[sun]);
        assert_eq!(manager.ambient_lights(), &[sky]);
        let direction = scene.node(sun).unwrap().light.as_ref().unwrap().direction;
        assert_eq!(direction, Vec3::NEG_Y);
    }

    #[test]
    fn lights_capped_per_kind() {
        let mut scene = Scene::new();
        let mut directional = Vec::new();
        let mut ambient = Vec::new();
        for i in 0..2 {
            let sun = scene.create_node(format!("sun {i}"));
            let light = Light::directional(Vec3::new(0.0, -4.0, 0.0), Vec3::ONE, 1.0);
            scene.set_light(sun, light).unwrap();
            directional.push(sun);

            let sky = scene.create_node(format!("sky {i}"));
            scene.set_light(sky, Light::ambient(Vec3::ONE, 0.3)).unwrap();
            ambient.push(sky);
        }

        let config = ForwardRenderConfig::default()
            .with_max_lights(1)
            .with_max_ambient_lights(1);
        let mut manager = new_manager(config);
        manager.pre_render(&mut scene);
        assert_eq!(manager.lights(), &directional[..1]);
        assert_eq!(manager.ambient_lights(), &ambient[..1]);

        // Overflow lights are still normalized
        let overflow = scene.node(directional[1]).unwrap().light.as_ref().unwrap().direction;
        assert_eq!(overflow, Vec3::NEG_Y);
    }

    #[test]
    fn will_render_not_sent_for_skipped_draws() {
        let mut scene = Scene::new();
        let camera = scene.create_node("camera");
        scene.set_camera(camera, Camera::default()).unwrap();
        let light = scene.create_node("light");
        scene.set_light(light, Light::point(Vec3::ONE, 1.0, 100.0)).unwrap();
        let root = scene.root();
        let node = add_mesh(&mut scene, root, "mesh");

        let mut manager = new_manager(ForwardRenderConfig::default());
        manager.pre_render(&mut scene);
        manager.render_scene(&mut scene);
        assert_eq!(manager.dispatcher().count(node, SceneEvent::WillRender), 1);
        assert!(!manager.backend().draws().is_empty());
        manager.backend_mut().clear_log();

        // Renderer removed between queue build and draw
        manager.pre_render(&mut scene);
        scene.node_mut(node).unwrap().renderer = None;
        manager.render_scene(&mut scene);
        assert_eq!(manager.dispatcher().count(node, SceneEvent::WillRender), 1);
        assert!(manager.backend().draws().is_empty());
    }

    #[test]
    fn mismatched_renderer_is_skipped() {
        let mut scene = Scene::new();
        let node = scene.create_node("broken");
        let mesh = Arc::new(Mesh::cube(1.0));
        scene
            .set_mesh(
                node,
                MeshFilter::new(mesh),
                MeshRenderer::unskinned(vec![Arc::new(Material::new("lit"))], 2),
            )
            .unwrap();
        let empty = scene.create_node("no materials");
        let mesh = Arc::new(Mesh::cube(1.0));
        scene
            .set_mesh(
                empty,
                MeshFilter::new(mesh.clone()),
                MeshRenderer::for_mesh(&mesh, Vec::new()),
            )
            .unwrap();
        let root = scene.root();
        add_mesh(&mut scene, root, "fine");

        let mut manager = new_manager(ForwardRenderConfig::default());
        manager.pre_render(&mut scene);
        assert_eq!(manager.render_queues().entry_count(), 1);
    }

    #[test]
    fn aggregate_composes_parent_then_local() {
        let mut scene = Scene::new();
        let parent = scene.create_node("parent");
        scene.node_mut(parent).unwrap().transform = Transform::from_position(Vec3::X * 10.0);
        let child = scene.create_child(parent, "child").unwrap();
        scene.node_mut(child).unwrap().transform = Transform::from_scale(Vec3::splat(2.0));

        let mut manager = new_manager(ForwardRenderConfig::default());
        manager.pre_render(&mut scene);
        let aggregate = scene.node(child).unwrap().aggregate_transform();
        assert_eq!(aggregate.transform_point(Vec3::X), Vec3::new(12.0, 0.0, 0.0));
    }

    #[test]
    fn inactive_subtree_is_a_hard_cut() {
        let mut scene = Scene::new();
        let hidden = scene.create_node("hidden");
        add_mesh(&mut scene, hidden, "child");
        scene.node_mut(hidden).unwrap().active = false;

        let mut manager = new_manager(ForwardRenderConfig::default());
        manager.pre_render(&mut scene);
        assert_eq!(manager.render_queues().entry_count(), 0);
    }

    #[test]
    fn unlit_materials_draw_exactly_once() {
        let mut scene = Scene::new();
        let camera = scene.create_node("camera");
        scene.set_camera(camera, Camera::default()).unwrap();
        for name in ["a", "b"] {
            let light = scene.create_node(name);
            scene.set_light(light, Light::point(Vec3::ONE, 1.0, 100.0)).unwrap();
        }
        let node = scene.create_node("glow");
        let mesh = Arc::new(Mesh::cube(1.0));
        scene
            .set_mesh(
                node,
                MeshFilter::new(mesh.clone()),
                MeshRenderer::for_mesh(&mesh, vec![Arc::new(Material::emissive(Vec3::ONE))]),
            )
            .unwrap();

        let mut manager = new_manager(ForwardRenderConfig::default());
        manager.pre_render(&mut scene);
        manager.render_scene(&mut scene);

        let draws = manager.backend().draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].material, "emissive");
        assert_eq!(draws[0].light, None);
        assert!(manager.dispatcher().is_empty());
    }

    #[test]
    fn ssao_target_failure_disables_pass_for_frame() {
        let mut scene = Scene::new();
        let camera = scene.create_node("camera");
        scene
            .set_camera(camera, Camera::default().with_ssao(SsaoMode::Outline))
            .unwrap();
        let root = scene.root();
        add_mesh(&mut scene, root, "mesh");

        let mut manager = new_manager(ForwardRenderConfig::default());
        manager.backend_mut().set_fail_render_targets(true);
        manager.pre_render(&mut scene);
        manager.render_scene(&mut scene);
        assert!(manager.ssao_target().is_none());
        assert_eq!(manager.render_target_depth(), 0);

        manager.backend_mut().set_fail_render_targets(false);
        manager.pre_render(&mut scene);
        manager.render_scene(&mut scene);
        assert!(manager.ssao_target().is_some());

        manager.clear_caches();
        assert_eq!(manager.backend().live_render_targets(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "render_scene called without pre_render")]
    fn render_without_pre_render_asserts() {
        let mut scene = Scene::new();
        let mut manager = new_manager(ForwardRenderConfig::default());
        manager.render_scene(&mut scene);
    }
}
