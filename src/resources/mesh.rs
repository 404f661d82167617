//! Mesh data structures and generation

use glam::{Mat4, Vec3};

/// Axis-aligned bounding box in mesh-local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, or an empty box at the origin
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some(&first) = points.first() else {
            return Self::default();
        };
        points.iter().fold(Self::new(first, first), |bounds, &p| Self {
            min: bounds.min.min(p),
            max: bounds.max.max(p),
        })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min, self.max);
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    /// Corner farthest from the center
    pub fn farthest_corner(&self) -> Vec3 {
        let center = self.center();
        self.corners()
            .into_iter()
            .fold(center, |best, corner| {
                if corner.distance_squared(center) > best.distance_squared(center) {
                    corner
                } else {
                    best
                }
            })
    }
}

/// Triangle list with positions and normals
#[derive(Debug, Clone, Default)]
pub struct SubMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// Counter-clockwise triangle indices
    pub indices: Vec<u32>,
    /// Bone driving each vertex, for rigid skinning
    pub bone_indices: Option<Vec<u32>>,
    pub bounding_box: BoundingBox,
}

impl SubMesh {
    pub fn new(name: &str, positions: Vec<Vec3>, normals: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounding_box = BoundingBox::from_points(&positions);
        Self {
            name: name.to_string(),
            positions,
            normals,
            indices,
            bone_indices: None,
            bounding_box,
        }
    }

    pub fn with_bone_indices(mut self, bone_indices: Vec<u32>) -> Self {
        self.bone_indices = Some(bone_indices);
        self
    }

    /// Calculate vertex count
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Calculate index count
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Calculate triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether the sub-mesh has triangles to extrude shadow volumes from
    pub fn has_faces(&self) -> bool {
        self.triangle_count() > 0
    }

    /// Triangles as position index triples, skipping indices past the vertex list
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        let vertex_count = self.positions.len() as u32;
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .filter(move |t| t.iter().all(|&i| i < vertex_count))
    }

    /// Create a cube of edge length `size` centered at origin
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        let faces = [
            // Front face
            (Vec3::Z, [(-h, -h, h), (h, -h, h), (h, h, h), (-h, h, h)]),
            // Back face
            (-Vec3::Z, [(h, -h, -h), (-h, -h, -h), (-h, h, -h), (h, h, -h)]),
            // Right face
            (Vec3::X, [(h, -h, h), (h, -h, -h), (h, h, -h), (h, h, h)]),
            // Left face
            (-Vec3::X, [(-h, -h, -h), (-h, -h, h), (-h, h, h), (-h, h, -h)]),
            // Top face
            (Vec3::Y, [(-h, h, h), (h, h, h), (h, h, -h), (-h, h, -h)]),
            // Bottom face
            (-Vec3::Y, [(-h, -h, -h), (h, -h, -h), (h, -h, h), (-h, -h, h)]),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, corners) in faces {
            let base = positions.len() as u32;
            for (x, y, z) in corners {
                positions.push(Vec3::new(x, y, z));
                normals.push(normal);
            }
            // Two triangles per face
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new("cube", positions, normals, indices)
    }

    /// Create a plane on the XZ axis facing +Y
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let subdivisions = subdivisions.max(1);
        let half_width = width / 2.0;
        let half_depth = depth / 2.0;
        let step_x = width / subdivisions as f32;
        let step_z = depth / subdivisions as f32;

        let mut positions = Vec::new();
        for z in 0..=subdivisions {
            for x in 0..=subdivisions {
                positions.push(Vec3::new(
                    -half_width + x as f32 * step_x,
                    0.0,
                    -half_depth + z as f32 * step_z,
                ));
            }
        }
        let normals = vec![Vec3::Y; positions.len()];

        let mut indices = Vec::new();
        for z in 0..subdivisions {
            for x in 0..subdivisions {
                let current = z * (subdivisions + 1) + x;
                let next = current + subdivisions + 1;

                indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        Self::new("plane", positions, normals, indices)
    }

    /// Copy with every position transformed by `matrix`
    pub fn transformed(&self, matrix: Mat4) -> Self {
        let positions: Vec<Vec3> = self
            .positions
            .iter()
            .map(|&p| matrix.transform_point3(p))
            .collect();
        let normal_matrix = matrix.inverse().transpose();
        let normals = self
            .normals
            .iter()
            .map(|&n| normal_matrix.transform_vector3(n).normalize_or_zero())
            .collect();
        Self {
            bounding_box: BoundingBox::from_points(&positions),
            positions,
            normals,
            ..self.clone()
        }
    }
}

/// A mesh made of one or more sub-meshes
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub sub_meshes: Vec<SubMesh>,
}

impl Mesh {
    pub fn new(name: &str, sub_meshes: Vec<SubMesh>) -> Self {
        Self {
            name: name.to_string(),
            sub_meshes,
        }
    }

    /// Mesh made of a single sub-mesh
    pub fn single(sub_mesh: SubMesh) -> Self {
        Self {
            name: sub_mesh.name.clone(),
            sub_meshes: vec![sub_mesh],
        }
    }

    pub fn sub_mesh_count(&self) -> usize {
        self.sub_meshes.len()
    }

    pub fn sub_mesh(&self, index: usize) -> Option<&SubMesh> {
        self.sub_meshes.get(index)
    }

    pub fn cube(size: f32) -> Self {
        Self::single(SubMesh::cube(size))
    }

    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        Self::single(SubMesh::plane(width, depth, subdivisions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_outward_counter_clockwise_faces() {
        let cube = SubMesh::cube(1.0);
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);

        for [a, b, c] in cube.triangles() {
            let (a, b, c) = (
                cube.positions[a as usize],
                cube.positions[b as usize],
                cube.positions[c as usize],
            );
            let face_normal = (b - a).cross(c - a).normalize();
            let centroid = (a + b + c) / 3.0;
            assert!(face_normal.dot(centroid) > 0.0);
        }
    }

    #[test]
    fn bounding_box_corners() {
        let bounds = BoundingBox::new(Vec3::new(-3.0, -4.0, 0.0), Vec3::new(3.0, 4.0, 0.0));
        assert_eq!(bounds.center(), Vec3::ZERO);
        assert_eq!(bounds.corners().len(), 8);
        assert_eq!(bounds.farthest_corner().length(), 5.0);
    }

    #[test]
    fn plane_faces_up() {
        let plane = SubMesh::plane(2.0, 2.0, 2);
        assert_eq!(plane.vertex_count(), 9);
        assert_eq!(plane.triangle_count(), 8);
        assert_eq!(plane.bounding_box.min, Vec3::new(-1.0, 0.0, -1.0));
        for [a, b, c] in plane.triangles() {
            let (a, b, c) = (
                plane.positions[a as usize],
                plane.positions[b as usize],
                plane.positions[c as usize],
            );
            assert!((b - a).cross(c - a).y > 0.0);
        }
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let sub_mesh = SubMesh::new(
            "broken",
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec3::Z; 3],
            vec![0, 1, 2, 0, 1, 9],
        );
        assert_eq!(sub_mesh.triangles().count(), 1);
    }
}
