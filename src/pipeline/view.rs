//! Per-camera and per-draw descriptors

use glam::{Mat4, Vec3, Vec4};

use crate::backend::{ClearBuffers, CubeFace};
use crate::resources::Skybox;
use crate::scene::{Camera, LayerMask, Light, SsaoMode, Transform};

/// Snapshot of a camera for one render target pass. Never kept across frames.
#[derive(Debug, Clone)]
pub struct ViewDescriptor {
    pub clear_buffers: ClearBuffers,
    pub clear_color: Vec4,
    pub culling_mask: LayerMask,
    pub view: Mat4,
    pub view_inverse: Mat4,
    pub projection: Mat4,
    pub projection_inverse: Mat4,
    /// Extra transform composed in front of every model transform
    pub uniform_world: Transform,
    /// World-space eye position
    pub position: Vec3,
    pub ambient_pass: bool,
    pub depth_pass: bool,
    pub ssao: bool,
    pub ssao_mode: SsaoMode,
    pub skybox: Option<Skybox>,
    pub clip_plane: Option<Vec4>,
    pub reverse_culling: bool,
}

impl ViewDescriptor {
    /// Describe `camera` seen through its node's world transform.
    ///
    /// `view` is the camera's world transform and `view_inverse` maps world space into
    /// camera space.
    pub fn from_camera(camera: &Camera, camera_world: &Transform) -> Self {
        Self::build(camera, camera_world.matrix(), camera.projection_matrix())
    }

    /// Describe one face of a cube target rendered from the camera's position
    pub fn for_cube_face(camera: &Camera, camera_world: &Transform, face: CubeFace) -> Self {
        let position = camera_world.translation();
        let view = Mat4::from_translation(position) * face.view_rotation();
        Self::build(camera, view, camera.projection.cube_face().matrix())
    }

    fn build(camera: &Camera, view: Mat4, projection: Mat4) -> Self {
        Self {
            clear_buffers: camera.clear_buffers,
            clear_color: camera.clear_color,
            culling_mask: camera.culling_mask,
            view,
            view_inverse: view.inverse(),
            projection,
            projection_inverse: projection.inverse(),
            uniform_world: camera.uniform_world,
            position: view.w_axis.truncate(),
            ambient_pass: camera.ambient_pass,
            depth_pass: camera.depth_pass,
            ssao: camera.ssao,
            ssao_mode: camera.ssao_mode,
            skybox: if camera.skybox_enabled {
                camera.skybox.clone()
            } else {
                None
            },
            clip_plane: camera.clip_plane,
            reverse_culling: camera.reverse_culling,
        }
    }

    /// World-to-clip transform
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_inverse
    }
}

/// Which light, if any, illuminates a draw
#[derive(Debug, Clone, Copy)]
pub struct LightingDescriptor<'a> {
    pub light: Option<&'a Light>,
    /// World position of the light
    pub position: Vec3,
    /// Normalized world direction of the light
    pub direction: Vec3,
    /// Must match the material's `uses_lighting` or the draw is skipped
    pub use_lighting: bool,
}

impl<'a> LightingDescriptor<'a> {
    /// Draw lit by `light`
    pub fn lit(light: &'a Light, position: Vec3, direction: Vec3) -> Self {
        Self {
            light: Some(light),
            position,
            direction,
            use_lighting: true,
        }
    }

    /// Draw for materials that do not use scene lights
    pub fn unlit() -> Self {
        Self {
            light: None,
            position: Vec3::ZERO,
            direction: Vec3::ZERO,
            use_lighting: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_inverse_maps_eye_to_origin() {
        let camera = Camera::default();
        let mut world = Transform::from_position(Vec3::new(1.0, 2.0, 10.0));
        world.look_at(Vec3::ZERO, Vec3::Y);

        let view = ViewDescriptor::from_camera(&camera, &world);
        assert!((view.position - Vec3::new(1.0, 2.0, 10.0)).length() < 1e-5);
        let eye = view.view_inverse.transform_point3(view.position);
        assert!(eye.length() < 1e-4);
    }

    #[test]
    fn cube_faces_share_position_but_not_orientation() {
        let camera = Camera::default();
        let world = Transform::from_position(Vec3::new(0.0, 3.0, 0.0));
        let faces: Vec<ViewDescriptor> = CubeFace::ALL
            .iter()
            .map(|&face| ViewDescriptor::for_cube_face(&camera, &world, face))
            .collect();

        for (i, a) in faces.iter().enumerate() {
            assert!((a.position - Vec3::new(0.0, 3.0, 0.0)).length() < 1e-5);
            for b in &faces[i + 1..] {
                assert_ne!(a.view, b.view);
            }
        }
    }

    #[test]
    fn skybox_omitted_when_disabled() {
        let mut camera = Camera::default().with_skybox(Skybox::cube());
        camera.skybox_enabled = false;
        let view = ViewDescriptor::from_camera(&camera, &Transform::IDENTITY);
        assert!(view.skybox.is_none());
    }

    #[test]
    fn unlit_descriptor_has_no_light() {
        let lighting = LightingDescriptor::unlit();
        assert!(lighting.light.is_none());
        assert!(!lighting.use_lighting);
    }
}
