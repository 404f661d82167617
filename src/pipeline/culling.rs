//! Layer and bounding-volume culling

use glam::{Mat4, Vec3};

use crate::resources::BoundingBox;
use crate::scene::{LayerMask, Light, LightType};

/// Fraction of full intensity below which a planar light no longer contributes
const ATTENUATION_CUTOFF: f32 = 0.01;

/// True when `mask` and the node's layers share no layer
#[inline]
pub fn should_cull_by_layer(mask: LayerMask, node_layers: LayerMask) -> bool {
    !mask.intersects(&node_layers)
}

/// World-space sphere enclosing a mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Sphere through the farthest bounding-box corner, moved into world space by `model`
pub fn mesh_world_sphere(bounds: &BoundingBox, model: &Mat4) -> BoundingSphere {
    let center = model.transform_point3(bounds.center());
    let corner = model.transform_point3(bounds.farthest_corner());
    BoundingSphere {
        center,
        radius: center.distance(corner),
    }
}

/// Distance at which a light with linear falloff `attenuation` drops below the cutoff
pub fn attenuation_distance(attenuation: f32) -> f32 {
    if attenuation <= 0.0 {
        return f32::INFINITY;
    }
    (1.0 / ATTENUATION_CUTOFF - 1.0) / attenuation
}

/// True when the light cannot reach the mesh.
///
/// `light_position` and `light_direction` are in world space. Directional and ambient
/// lights reach everything.
pub fn should_cull_light(
    light: &Light,
    light_position: Vec3,
    light_direction: Vec3,
    sphere: &BoundingSphere,
) -> bool {
    let to_center = sphere.center - light_position;
    match light.light_type {
        LightType::Directional | LightType::Ambient => false,
        LightType::Point | LightType::Spot => to_center.length() > sphere.radius + light.range,
        LightType::Planar => {
            let normal = light_direction.normalize_or_zero();
            let along = to_center.dot(normal);
            let in_plane = to_center - normal * along;
            let in_plane_distance =
                (in_plane.x * in_plane.x + in_plane.y * in_plane.y + in_plane.z * in_plane.z)
                    .sqrt();

            along.abs() > attenuation_distance(light.attenuation) + sphere.radius
                || in_plane_distance > light.range + sphere.radius
        }
    }
}
