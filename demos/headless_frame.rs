//! Renders two frames of a small scene through the recording backend and prints what
//! the pipeline drew.
//!
//! Run with `RUST_LOG=debug` to see shadow volume rebuilds.

use std::sync::Arc;

use glam::Vec3;

use forward_engine::backend::RecordingBackend;
use forward_engine::pipeline::{ForwardRenderConfig, ForwardRenderManager};
use forward_engine::resources::{Material, Mesh, MeshFilter, MeshRenderer, Skybox};
use forward_engine::scene::{Camera, EventQueue, Light, Scene, SsaoMode, Transform};
use forward_engine::RenderResult;

fn build_scene() -> RenderResult<Scene> {
    let mut scene = Scene::new();

    let camera = scene.create_node("camera");
    if let Some(node) = scene.node_mut(camera) {
        node.transform = Transform::from_position(Vec3::new(0.0, 3.0, 8.0));
        node.transform.look_at(Vec3::ZERO, Vec3::Y);
    }
    scene.set_camera(
        camera,
        Camera::default()
            .with_ssao(SsaoMode::Standard)
            .with_skybox(Skybox::cube()),
    )?;

    let ambient = scene.create_node("ambient");
    scene.set_light(ambient, Light::ambient(Vec3::ONE, 0.3))?;

    let sun = scene.create_node("sun");
    if let Some(node) = scene.node_mut(sun) {
        node.is_static = true;
    }
    scene.set_light(
        sun,
        Light::directional(Vec3::new(-0.4, -1.0, -0.3), Vec3::ONE, 1.0).with_shadows(true),
    )?;

    let ground = scene.create_node("ground");
    let plane = Arc::new(Mesh::plane(20.0, 20.0, 4));
    scene.set_mesh(
        ground,
        MeshFilter::new(plane.clone()).with_shadows(false, true),
        MeshRenderer::for_mesh(&plane, vec![Arc::new(Material::new("ground"))]),
    )?;
    if let Some(node) = scene.node_mut(ground) {
        node.is_static = true;
    }

    let crate_node = scene.create_child(ground, "crate")?;
    let cube = Arc::new(Mesh::cube(1.0));
    scene.set_mesh(
        crate_node,
        MeshFilter::new(cube.clone()).with_shadows(true, true),
        MeshRenderer::for_mesh(&cube, vec![Arc::new(Material::new("crate"))]),
    )?;
    if let Some(node) = scene.node_mut(crate_node) {
        node.transform = Transform::from_position(Vec3::new(0.0, 0.5, 0.0));
    }

    Ok(scene)
}

fn main() -> RenderResult<()> {
    env_logger::init();

    let mut scene = build_scene()?;
    let mut manager = ForwardRenderManager::new(
        RecordingBackend::new(),
        EventQueue::new(),
        ForwardRenderConfig::default(),
    );

    for frame in 0..2 {
        manager.pre_render(&mut scene);
        manager.render_scene(&mut scene);

        let stats = manager.stats();
        println!(
            "frame {frame}: {} draws, {} shadow volume draws, {} volumes built, {} reused",
            stats.draw_calls,
            stats.shadow_volume_draws,
            stats.shadow_volumes_built,
            stats.shadow_volumes_reused
        );
        for draw in manager.backend().draws() {
            println!(
                "  {:<22} {:?} blend={:?}",
                draw.material, draw.mode, draw.blending
            );
        }

        manager.backend_mut().clear_log();
        manager.dispatcher_mut().drain().for_each(drop);
    }

    Ok(())
}
