//! Forward render manager configuration

use crate::backend::BlendFactor;

/// How a draw is combined with what an earlier pass already wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ForwardBlending {
    /// `One, One`: accumulate light contributions
    #[default]
    Additive,
    /// `Zero, SrcAlpha`: darken by the source alpha
    Subtractive,
}

impl ForwardBlending {
    /// Source and destination factors for this mode
    pub fn factors(self) -> (BlendFactor, BlendFactor) {
        match self {
            ForwardBlending::Additive => (BlendFactor::One, BlendFactor::One),
            ForwardBlending::Subtractive => (BlendFactor::Zero, BlendFactor::SrcAlpha),
        }
    }
}

/// Configuration for the forward render manager
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardRenderConfig {
    /// Cameras past this count are dropped during the scene walk
    pub max_cameras: usize,
    /// Non-ambient lights past this count are dropped
    pub max_lights: usize,
    /// Ambient lights past this count are dropped
    pub max_ambient_lights: usize,
    /// Nodes deeper than this are not visited
    pub max_recursion_depth: usize,
    /// X/Y shrink applied to front-set shadow volumes
    pub shadow_volume_epsilon: f32,
    /// X/Y shrink applied to back-set shadow volumes
    pub back_set_shadow_volume_epsilon: f32,
    /// Distance shadow volume back caps are pushed away from the mesh
    pub shadow_volume_extrusion: f32,
    /// Size of the SSAO offscreen target
    pub ssao_target_size: (u32, u32),
    /// Blending used when a draw accumulates onto an earlier one
    pub forward_blending: ForwardBlending,
}

impl Default for ForwardRenderConfig {
    fn default() -> Self {
        Self {
            max_cameras: 8,
            max_lights: 16,
            max_ambient_lights: 16,
            max_recursion_depth: 128,
            shadow_volume_epsilon: 0.01,
            back_set_shadow_volume_epsilon: 0.00002,
            shadow_volume_extrusion: 1000.0,
            ssao_target_size: (1024, 1024),
            forward_blending: ForwardBlending::Additive,
        }
    }
}

impl ForwardRenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_cameras(mut self, max_cameras: usize) -> Self {
        self.max_cameras = max_cameras;
        self
    }

    pub fn with_max_lights(mut self, max_lights: usize) -> Self {
        self.max_lights = max_lights;
        self
    }

    pub fn with_max_ambient_lights(mut self, max_ambient_lights: usize) -> Self {
        self.max_ambient_lights = max_ambient_lights;
        self
    }

    pub fn with_max_recursion_depth(mut self, max_recursion_depth: usize) -> Self {
        self.max_recursion_depth = max_recursion_depth;
        self
    }

    pub fn with_shadow_volume_extrusion(mut self, extrusion: f32) -> Self {
        self.shadow_volume_extrusion = extrusion;
        self
    }

    pub fn with_ssao_target_size(mut self, width: u32, height: u32) -> Self {
        self.ssao_target_size = (width, height);
        self
    }

    pub fn with_forward_blending(mut self, blending: ForwardBlending) -> Self {
        self.forward_blending = blending;
        self
    }

    /// Shrink factor for shadow volume X/Y
    pub fn shadow_volume_narrowing(&self, back_set: bool) -> f32 {
        let epsilon = if back_set {
            self.back_set_shadow_volume_epsilon
        } else {
            self.shadow_volume_epsilon
        };
        1.0 - epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ForwardRenderConfig::default();
        assert_eq!(config.max_cameras, 8);
        assert_eq!(config.max_recursion_depth, 128);
        assert_eq!(config.forward_blending, ForwardBlending::Additive);
        assert!((config.shadow_volume_narrowing(false) - 0.99).abs() < 1e-6);
        assert!((config.shadow_volume_narrowing(true) - 0.99998).abs() < 1e-6);
    }

    #[test]
    fn blending_factors() {
        assert_eq!(
            ForwardBlending::Additive.factors(),
            (BlendFactor::One, BlendFactor::One)
        );
        assert_eq!(
            ForwardBlending::Subtractive.factors(),
            (BlendFactor::Zero, BlendFactor::SrcAlpha)
        );
    }
}
