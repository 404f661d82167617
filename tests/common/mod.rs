//! Scene builders shared by the pipeline integration tests.

use std::sync::Arc;

use forward_engine::backend::{BackendCommand, RecordingBackend};
use forward_engine::pipeline::{ForwardRenderConfig, ForwardRenderManager};
use forward_engine::resources::{Material, Mesh, MeshFilter, MeshRenderer};
use forward_engine::scene::{Camera, EventQueue, Light, NodeId, ObjectId, Scene, Transform};
use glam::Vec3;

pub type Manager = ForwardRenderManager<RecordingBackend, EventQueue>;

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn manager(config: ForwardRenderConfig) -> Manager {
    init_logging();
    ForwardRenderManager::new(RecordingBackend::new(), EventQueue::new(), config)
}

pub fn lit_material(name: &str) -> Arc<Material> {
    Arc::new(Material::new(name))
}

/// Camera at (0, 0, 10) looking down -Z
pub fn add_camera(scene: &mut Scene, camera: Camera) -> NodeId {
    let node = scene.create_node("camera");
    scene.node_mut(node).unwrap().transform = Transform::from_position(Vec3::new(0.0, 0.0, 10.0));
    scene.set_camera(node, camera).unwrap();
    node
}

pub fn add_light(scene: &mut Scene, light: Light, position: Vec3) -> (NodeId, ObjectId) {
    let node = scene.create_node("light");
    scene.node_mut(node).unwrap().transform = Transform::from_position(position);
    let id = scene.set_light(node, light).unwrap();
    (node, id)
}

/// Cube of edge `size` at `position` drawn with a single lit material
pub fn add_cube(
    scene: &mut Scene,
    name: &str,
    position: Vec3,
    size: f32,
    filter: impl FnOnce(MeshFilter) -> MeshFilter,
) -> NodeId {
    add_cube_with(scene, name, position, size, lit_material(name), filter)
}

pub fn add_cube_with(
    scene: &mut Scene,
    name: &str,
    position: Vec3,
    size: f32,
    material: Arc<Material>,
    filter: impl FnOnce(MeshFilter) -> MeshFilter,
) -> NodeId {
    let node = scene.create_node(name);
    scene.node_mut(node).unwrap().transform = Transform::from_position(position);
    let mesh = Arc::new(Mesh::cube(size));
    scene
        .set_mesh(
            node,
            filter(MeshFilter::new(mesh.clone())),
            MeshRenderer::for_mesh(&mesh, vec![material]),
        )
        .unwrap();
    node
}

/// Engine id of the first sub-renderer on `node`
pub fn renderer_id(scene: &Scene, node: NodeId) -> ObjectId {
    scene
        .node(node)
        .and_then(|n| n.renderer.as_ref())
        .and_then(|r| r.sub_renderer(0))
        .map(|s| s.id)
        .unwrap()
}

pub fn count_commands(
    backend: &RecordingBackend,
    predicate: impl Fn(&BackendCommand) -> bool,
) -> usize {
    backend.commands().iter().filter(|c| predicate(c)).count()
}

pub fn frame(manager: &mut Manager, scene: &mut Scene) {
    manager.pre_render(scene);
    manager.render_scene(scene);
}
