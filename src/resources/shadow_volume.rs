//! Shadow volume extrusion
//!
//! A shadow volume is a closed triangle soup bounding the space a mesh shadows from a
//! light. It is made of a front cap (the mesh faces on one side of the light), a back cap
//! (the same faces pushed away from the light) and side quads joining the two along the
//! silhouette edges. Everything here works in mesh-local space.

use glam::Vec3;
use rustc_hash::FxHashMap;

/// Where the light is, expressed in the mesh's local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightSource {
    /// Point-like light at a position
    Position(Vec3),
    /// Light travelling along a direction (directional and planar lights)
    Direction(Vec3),
}

impl LightSource {
    fn to_light(&self, point: Vec3) -> Vec3 {
        match *self {
            LightSource::Position(position) => position - point,
            LightSource::Direction(direction) => -direction,
        }
    }

    fn extrude(&self, point: Vec3, length: f32) -> Vec3 {
        let away = match *self {
            LightSource::Position(position) => (point - position).normalize_or_zero(),
            LightSource::Direction(direction) => direction.normalize_or_zero(),
        };
        point + away * length
    }
}

/// Parameters of one extrusion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrusionParams {
    pub light: LightSource,
    /// Build the volume from the faces pointing away from the light instead of those
    /// facing it
    pub back_set: bool,
    /// How far the back cap is pushed from the mesh
    pub length: f32,
}

struct Edge {
    from: Vec3,
    to: Vec3,
    uses: u32,
}

/// Welded vertex key. Adding zero folds `-0.0` into `0.0`.
fn weld_key(point: Vec3) -> [u32; 3] {
    (point + Vec3::ZERO).to_array().map(f32::to_bits)
}

/// Extrude a shadow volume from a triangle list.
///
/// `triangles` index into `positions` with counter-clockwise winding. Returns a flat
/// triangle list, three positions per triangle, wound so that every face points out of
/// the volume.
pub fn extrude_shadow_volume(
    positions: &[Vec3],
    triangles: impl IntoIterator<Item = [u32; 3]>,
    params: &ExtrusionParams,
) -> Vec<Vec3> {
    let mut welded: FxHashMap<[u32; 3], u32> = FxHashMap::default();
    let mut weld = |point: Vec3| {
        let next = welded.len() as u32;
        *welded.entry(weld_key(point)).or_insert(next)
    };

    let mut cap: Vec<[Vec3; 3]> = Vec::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut edge_lookup: FxHashMap<(u32, u32), usize> = FxHashMap::default();

    for [i0, i1, i2] in triangles {
        let (Some(&a), Some(&b), Some(&c)) = (
            positions.get(i0 as usize),
            positions.get(i1 as usize),
            positions.get(i2 as usize),
        ) else {
            continue;
        };

        let normal = (b - a).cross(c - a);
        if normal.length_squared() == 0.0 {
            continue;
        }
        let centroid = (a + b + c) / 3.0;
        let facing = normal.dot(params.light.to_light(centroid)) > 0.0;
        if facing == params.back_set {
            continue;
        }

        cap.push([a, b, c]);
        let ids = [weld(a), weld(b), weld(c)];
        for (from, to, k) in [(a, b, 0), (b, c, 1), (c, a, 2)] {
            let (x, y) = (ids[k], ids[(k + 1) % 3]);
            let key = (x.min(y), x.max(y));
            match edge_lookup.get(&key) {
                Some(&index) => edges[index].uses += 1,
                None => {
                    edge_lookup.insert(key, edges.len());
                    edges.push(Edge { from, to, uses: 1 });
                }
            }
        }
    }

    let silhouette: Vec<&Edge> = edges.iter().filter(|e| e.uses == 1).collect();
    let mut volume = Vec::with_capacity((cap.len() * 2 + silhouette.len() * 2) * 3);
    let extrude = |p: Vec3| params.light.extrude(p, params.length);

    for &[a, b, c] in &cap {
        volume.extend_from_slice(&[a, b, c]);
    }
    for &[a, b, c] in &cap {
        volume.extend_from_slice(&[extrude(a), extrude(c), extrude(b)]);
    }
    for edge in silhouette {
        let (a, b) = (edge.from, edge.to);
        let (a_ext, b_ext) = (extrude(a), extrude(b));
        volume.extend_from_slice(&[b, a, a_ext, b, a_ext, b_ext]);
    }

    // Back-set caps face away from the light, so the whole volume is inside out
    if params.back_set {
        for triangle in volume.chunks_exact_mut(3) {
            triangle.swap(1, 2);
        }
    }

    volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::SubMesh;
    use rustc_hash::FxHashMap;

    fn cube_volume(light: LightSource, back_set: bool) -> Vec<Vec3> {
        let cube = SubMesh::cube(1.0);
        extrude_shadow_volume(
            &cube.positions,
            cube.triangles(),
            &ExtrusionParams {
                light,
                back_set,
                length: 100.0,
            },
        )
    }

    /// Every directed edge must be matched by its reverse for a closed, consistently
    /// wound volume
    fn assert_closed(volume: &[Vec3]) {
        let mut directed: FxHashMap<([u32; 3], [u32; 3]), i32> = FxHashMap::default();
        for t in volume.chunks_exact(3) {
            for k in 0..3 {
                let (a, b) = (weld_key(t[k]), weld_key(t[(k + 1) % 3]));
                *directed.entry((a, b)).or_default() += 1;
                *directed.entry((b, a)).or_default() -= 1;
            }
        }
        assert!(directed.values().all(|&n| n == 0));
    }

    #[test]
    fn cube_under_directional_light() {
        let front = cube_volume(LightSource::Direction(Vec3::NEG_Y), false);
        // 2 front cap + 2 back cap + 4 silhouette edges * 2
        assert_eq!(front.len(), 36);
        assert_closed(&front);

        let back = cube_volume(LightSource::Direction(Vec3::NEG_Y), true);
        // 10 front cap + 10 back cap + 4 silhouette edges * 2
        assert_eq!(back.len(), 84);
        assert_closed(&back);
    }

    #[test]
    fn faces_point_out_of_the_volume() {
        let volume = cube_volume(LightSource::Direction(Vec3::NEG_Y), false);
        let center = volume.iter().copied().sum::<Vec3>() / volume.len() as f32;
        for t in volume.chunks_exact(3) {
            let normal = (t[1] - t[0]).cross(t[2] - t[0]);
            let centroid = (t[0] + t[1] + t[2]) / 3.0;
            assert!(normal.dot(centroid - center) > 0.0);
        }
    }

    #[test]
    fn point_light_extrudes_away_from_light() {
        let light = Vec3::new(0.0, 5.0, 0.0);
        let volume = cube_volume(LightSource::Position(light), false);
        assert_closed(&volume);
        // Back cap vertices sit farther from the light than any cube corner
        let farthest = volume
            .iter()
            .map(|p| p.distance(light))
            .fold(0.0_f32, f32::max);
        assert!(farthest > 100.0);
    }

    #[test]
    fn degenerate_triangles_are_skipped() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0];
        let volume = extrude_shadow_volume(
            &positions,
            [[0, 1, 2]],
            &ExtrusionParams {
                light: LightSource::Direction(Vec3::NEG_Y),
                back_set: false,
                length: 10.0,
            },
        );
        assert!(volume.is_empty());
    }
}
