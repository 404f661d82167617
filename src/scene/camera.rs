//! Camera component

use glam::{Mat4, Vec4};

use crate::backend::{ClearBuffers, RenderTargetHandle};
use crate::resources::Skybox;

use super::{LayerMask, ObjectId, Transform};

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: std::f32::consts::FRAC_PI_4, // 45 degrees
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Projection::Orthographic {
            left: -half_w,
            right: half_w,
            bottom: -half_h,
            top: half_h,
            near,
            far,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(left, right, bottom, top, near, far),
        }
    }

    /// Square 90 degree projection used for each face of a cube target
    pub fn cube_face(&self) -> Projection {
        Projection::Perspective {
            fov_y: std::f32::consts::FRAC_PI_2,
            aspect: 1.0,
            near: self.near(),
            far: self.far(),
        }
    }

    pub fn near(&self) -> f32 {
        match self {
            Projection::Perspective { near, .. } => *near,
            Projection::Orthographic { near, .. } => *near,
        }
    }

    pub fn far(&self) -> f32 {
        match self {
            Projection::Perspective { far, .. } => *far,
            Projection::Orthographic { far, .. } => *far,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: a, .. } = self {
            *a = aspect;
        }
    }
}

/// Where a camera renders to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraTarget {
    /// The backend's default (window) target
    #[default]
    Default,
    /// An offscreen 2D target
    Texture(RenderTargetHandle),
    /// An offscreen cube target, rendered once per face
    Cube(RenderTargetHandle),
}

/// When the screen-space ambient occlusion pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SsaoMode {
    /// Darken ambient lighting before the per-light passes
    #[default]
    Standard,
    /// Darken the final image after the per-light passes
    Outline,
}

/// Camera component.
///
/// The view transform is the inverse of the owning node's aggregate transform, so a camera
/// looks down its node's local -Z axis.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Assigned by the scene when the camera is attached
    pub id: ObjectId,
    /// Cameras render in ascending order
    pub render_order: i32,
    pub culling_mask: LayerMask,
    pub clear_buffers: ClearBuffers,
    pub clear_color: Vec4,
    pub projection: Projection,
    pub render_target: CameraTarget,
    pub ambient_pass: bool,
    pub depth_pass: bool,
    pub ssao: bool,
    pub ssao_mode: SsaoMode,
    pub skybox: Option<Skybox>,
    pub skybox_enabled: bool,
    /// World-space clip plane `(normal, distance)`
    pub clip_plane: Option<Vec4>,
    /// Flip the cull face, for mirrored views
    pub reverse_culling: bool,
    /// Extra transform applied in front of every model transform
    pub uniform_world: Transform,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            id: ObjectId::INVALID,
            render_order: 0,
            culling_mask: LayerMask::ALL,
            clear_buffers: ClearBuffers::all(),
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            projection: Projection::default(),
            render_target: CameraTarget::Default,
            ambient_pass: true,
            depth_pass: false,
            ssao: false,
            ssao_mode: SsaoMode::Standard,
            skybox: None,
            skybox_enabled: false,
            clip_plane: None,
            reverse_culling: false,
            uniform_world: Transform::IDENTITY,
        }
    }
}

impl Camera {
    pub fn new(projection: Projection) -> Self {
        Self {
            projection,
            ..Default::default()
        }
    }

    pub fn with_render_order(mut self, render_order: i32) -> Self {
        self.render_order = render_order;
        self
    }

    pub fn with_culling_mask(mut self, culling_mask: LayerMask) -> Self {
        self.culling_mask = culling_mask;
        self
    }

    pub fn with_render_target(mut self, render_target: CameraTarget) -> Self {
        self.render_target = render_target;
        self
    }

    pub fn with_depth_pass(mut self, enabled: bool) -> Self {
        self.depth_pass = enabled;
        self
    }

    pub fn with_ssao(mut self, mode: SsaoMode) -> Self {
        self.ssao = true;
        self.ssao_mode = mode;
        self
    }

    pub fn with_skybox(mut self, skybox: Skybox) -> Self {
        self.skybox = Some(skybox);
        self.skybox_enabled = true;
        self
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    /// Whether a skybox is both enabled and present
    pub fn renders_skybox(&self) -> bool {
        self.skybox_enabled && self.skybox.is_some()
    }
}
