//! Light types for the scene

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

use super::{LayerMask, ObjectId};

/// Kind of light source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightType {
    /// Infinitely distant light (like the sun), only `direction` matters
    #[default]
    Directional,
    /// Omnidirectional light positioned by its node
    Point,
    /// Cone light positioned by its node, pointing along `direction`
    Spot,
    /// Uniform light applied in the ambient pass, never casts shadows
    Ambient,
    /// Area light emitting from a plane whose normal is `direction`
    Planar,
}

impl LightType {
    /// Value written to `LightUniformData::direction_type.w`
    pub fn shader_index(self) -> f32 {
        match self {
            LightType::Point => 0.0,
            LightType::Spot => 1.0,
            LightType::Directional => 2.0,
            LightType::Ambient => 3.0,
            LightType::Planar => 4.0,
        }
    }
}

/// Light component. Position comes from the owning node's aggregate transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Assigned by the scene when the light is attached
    pub id: ObjectId,
    pub light_type: LightType,
    /// Direction in the node's local space, normalized during the scene walk
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Reach of point, spot and planar lights
    pub range: f32,
    /// Linear falloff coefficient
    pub attenuation: f32,
    pub shadows_enabled: bool,
    pub culling_mask: LayerMask,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            id: ObjectId::INVALID,
            light_type: LightType::Directional,
            direction: Vec3::new(-0.5, -1.0, -0.5).normalize(),
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            attenuation: 1.0,
            shadows_enabled: false,
            culling_mask: LayerMask::ALL,
        }
    }
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            light_type: LightType::Directional,
            direction,
            color,
            intensity,
            ..Default::default()
        }
    }

    pub fn point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            color,
            intensity,
            range,
            ..Default::default()
        }
    }

    pub fn spot(direction: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Spot,
            direction,
            color,
            intensity,
            range,
            ..Default::default()
        }
    }

    pub fn ambient(color: Vec3, intensity: f32) -> Self {
        Self {
            light_type: LightType::Ambient,
            color,
            intensity,
            ..Default::default()
        }
    }

    pub fn planar(normal: Vec3, color: Vec3, intensity: f32, range: f32, attenuation: f32) -> Self {
        Self {
            light_type: LightType::Planar,
            direction: normal,
            color,
            intensity,
            range,
            attenuation,
            ..Default::default()
        }
    }

    pub fn with_shadows(mut self, enabled: bool) -> Self {
        self.shadows_enabled = enabled;
        self
    }

    pub fn with_culling_mask(mut self, culling_mask: LayerMask) -> Self {
        self.culling_mask = culling_mask;
        self
    }

    pub fn is_ambient(&self) -> bool {
        self.light_type == LightType::Ambient
    }

    /// Directional and planar lights extrude shadow volumes along a fixed direction
    pub fn extrudes_along_direction(&self) -> bool {
        matches!(self.light_type, LightType::Directional | LightType::Planar)
    }

    /// Whether this light renders a shadow-volume sub-pass
    pub fn casts_shadows(&self) -> bool {
        self.shadows_enabled && !self.is_ambient()
    }

    /// Convert to GPU data format
    pub fn uniform_data(&self, position: Vec3, direction: Vec3) -> LightUniformData {
        LightUniformData {
            position: position.extend(self.range),
            color_intensity: self.color.extend(self.intensity),
            direction_type: direction.extend(self.light_type.shader_index()),
            params: Vec4::new(self.attenuation, 0.0, 0.0, 0.0),
        }
    }
}

/// GPU light data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUniformData {
    /// xyz = world position, w = range
    pub position: Vec4,
    /// xyz = color, w = intensity
    pub color_intensity: Vec4,
    /// xyz = world direction, w = light type
    pub direction_type: Vec4,
    /// x = attenuation
    pub params: Vec4,
}
