//! Material definitions for forward rendering

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::backend::TextureHandle;

/// Bucket a material's draws are sorted into. Lower ids draw first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderQueueId(pub i32);

impl RenderQueueId {
    pub const BACKGROUND: Self = Self(1000);
    pub const GEOMETRY: Self = Self(2000);
    pub const TRANSPARENT: Self = Self(3000);
    pub const OVERLAY: Self = Self(4000);
}

impl Default for RenderQueueId {
    fn default() -> Self {
        Self::GEOMETRY
    }
}

/// Value of a named shader uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

/// Shader plus the state it is drawn with
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Name of the shader program the backend binds
    pub shader: String,
    pub render_queue_id: RenderQueueId,
    /// Lit materials draw once per light; unlit ones draw once per frame
    pub uses_lighting: bool,
    /// Lit by its own emission instead of scene lights. Such materials draw in the
    /// unlit pass and must have `uses_lighting` unset.
    pub self_lit: bool,
    pub uniforms: Vec<(String, UniformValue)>,
    pub textures: Vec<(String, TextureHandle)>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            shader: "standard".to_string(),
            render_queue_id: RenderQueueId::GEOMETRY,
            uses_lighting: true,
            self_lit: false,
            uniforms: Vec::new(),
            textures: Vec::new(),
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Material drawn once per frame without scene lights
    pub fn unlit(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shader: "unlit".to_string(),
            uses_lighting: false,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_shader(mut self, shader: &str) -> Self {
        self.shader = shader.to_string();
        self
    }

    pub fn with_render_queue(mut self, id: RenderQueueId) -> Self {
        self.render_queue_id = id;
        self
    }

    pub fn with_lighting(mut self, uses_lighting: bool) -> Self {
        self.uses_lighting = uses_lighting;
        self
    }

    pub fn with_self_lit(mut self, self_lit: bool) -> Self {
        self.self_lit = self_lit;
        self
    }

    pub fn with_color(self, color: Vec4) -> Self {
        self.with_uniform("color", UniformValue::Vec4(color))
    }

    pub fn with_uniform(mut self, name: &str, value: UniformValue) -> Self {
        self.set_uniform(name, value);
        self
    }

    pub fn with_texture(mut self, name: &str, texture: TextureHandle) -> Self {
        self.set_texture(name, texture);
        self
    }

    /// Set a named uniform, replacing any previous value
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        match self.uniforms.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.uniforms.push((name.to_string(), value)),
        }
    }

    /// Bind a texture to a named sampler, replacing any previous binding
    pub fn set_texture(&mut self, name: &str, texture: TextureHandle) {
        match self.textures.iter_mut().find(|(n, _)| n == name) {
            Some((_, t)) => *t = texture,
            None => self.textures.push((name.to_string(), texture)),
        }
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    pub fn texture(&self, name: &str) -> Option<TextureHandle> {
        self.textures
            .iter()
            .find_map(|(n, t)| (n == name).then_some(*t))
    }

    // Built-in pass materials. They are unlit so any entry can be drawn with them.

    /// Stencil-only material for shadow volumes
    pub fn shadow_volume() -> Self {
        Self::unlit("builtin_shadow_volume").with_shader("shadow_volume")
    }

    /// Depth-only material for the depth pre-pass
    pub fn depth_only() -> Self {
        Self::unlit("builtin_depth_only").with_shader("depth_only")
    }

    /// Writes linearized depth into the SSAO target
    pub fn ssao_depth() -> Self {
        Self::unlit("builtin_ssao_depth").with_shader("ssao_depth")
    }

    /// Samples the SSAO depth texture and darkens occluded pixels
    pub fn ssao_outline() -> Self {
        Self::unlit("builtin_ssao_outline").with_shader("ssao_outline")
    }

    pub fn skybox() -> Self {
        Self::unlit("builtin_skybox")
            .with_shader("skybox")
            .with_render_queue(RenderQueueId::BACKGROUND)
    }

    /// Unlit material that lights itself
    pub fn emissive(color: Vec3) -> Self {
        Self::unlit("emissive")
            .with_self_lit(true)
            .with_uniform("emissive", UniformValue::Vec3(color))
    }
}
