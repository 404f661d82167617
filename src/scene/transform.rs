//! Affine transform value type

use glam::{Mat3, Mat4, Quat, Vec3};

/// Affine 4x4 transform used for local and aggregate (world) node transforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Mat4> for Transform {
    fn from(matrix: Mat4) -> Self {
        Self { matrix }
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        matrix: Mat4::IDENTITY,
    };

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_matrix(matrix: Mat4) -> Self {
        Self { matrix }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::from_matrix(Mat4::from_translation(position))
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self::from_matrix(Mat4::from_quat(rotation))
    }

    pub fn from_scale(scale: Vec3) -> Self {
        Self::from_matrix(Mat4::from_scale(scale))
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self::from_matrix(Mat4::from_rotation_translation(rotation, position))
    }

    pub fn from_position_scale(position: Vec3, scale: Vec3) -> Self {
        Self::from_scale_rotation_translation(scale, Quat::IDENTITY, position)
    }

    pub fn from_scale_rotation_translation(scale: Vec3, rotation: Quat, position: Vec3) -> Self {
        Self::from_matrix(Mat4::from_scale_rotation_translation(
            scale, rotation, position,
        ))
    }

    /// Create transform from position, rotation (euler angles in radians), and scale
    pub fn from_components(position: Vec3, rotation_euler: Vec3, scale: Vec3) -> Self {
        let rotation = Quat::from_euler(
            glam::EulerRot::XYZ,
            rotation_euler.x,
            rotation_euler.y,
            rotation_euler.z,
        );
        Self::from_scale_rotation_translation(scale, rotation, position)
    }

    /// Get the 4x4 matrix for this transform
    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    /// Returns `self * other`: `other` is applied first, then `self`.
    ///
    /// A child's aggregate transform is `parent_aggregate.compose(&child_local)`.
    pub fn compose(&self, other: &Transform) -> Transform {
        Self::from_matrix(self.matrix * other.matrix)
    }

    /// Returns `other * self`: `self` is applied first, then `other`.
    pub fn pre_compose(&self, other: &Transform) -> Transform {
        other.compose(self)
    }

    pub fn inverse(&self) -> Transform {
        Self::from_matrix(self.matrix.inverse())
    }

    /// Split into `(scale, rotation, translation)`
    pub fn decompose(&self) -> (Vec3, Quat, Vec3) {
        self.matrix.to_scale_rotation_translation()
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.matrix.transform_point3(point)
    }

    /// Transform a direction, ignoring translation
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.matrix.transform_vector3(vector)
    }

    pub fn translation(&self) -> Vec3 {
        self.matrix.w_axis.truncate()
    }

    pub fn set_translation(&mut self, position: Vec3) {
        self.matrix.w_axis = position.extend(1.0);
    }

    /// Get the normal matrix (inverse transpose)
    pub fn normal_matrix(&self) -> Mat4 {
        self.matrix.inverse().transpose()
    }

    /// Get forward direction (local -Z in world space)
    pub fn forward(&self) -> Vec3 {
        self.transform_vector(-Vec3::Z).normalize_or_zero()
    }

    /// Get right direction (local +X in world space)
    pub fn right(&self) -> Vec3 {
        self.transform_vector(Vec3::X).normalize_or_zero()
    }

    /// Get up direction (local +Y in world space)
    pub fn up(&self) -> Vec3 {
        self.transform_vector(Vec3::Y).normalize_or_zero()
    }

    /// Translate by a parent-space offset
    pub fn translate(&mut self, offset: Vec3) {
        self.matrix = Mat4::from_translation(offset) * self.matrix;
    }

    /// Rotate around a local axis through the transform's origin
    pub fn rotate_axis(&mut self, axis: Vec3, angle: f32) {
        self.matrix *= Mat4::from_axis_angle(axis.normalize_or_zero(), angle);
    }

    /// Scale along the local axes
    pub fn scale(&mut self, scale: Vec3) {
        self.matrix *= Mat4::from_scale(scale);
    }

    /// Look at a target position, keeping translation and scale
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let (scale, _, position) = self.decompose();
        let forward = (target - position).normalize();
        let right = up.cross(forward).normalize();
        let up = forward.cross(right);

        let rotation = Quat::from_mat3(&Mat3::from_cols(-right, up, -forward));
        *self = Self::from_scale_rotation_translation(scale, rotation, position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-4, "{a:?} != {b:?}");
    }

    #[test]
    fn compose_applies_right_operand_first() {
        let parent = Transform::from_position(Vec3::new(10.0, 0.0, 0.0));
        let child = Transform::from_scale(Vec3::splat(2.0));

        let aggregate = parent.compose(&child);
        assert_vec_eq(aggregate.transform_point(Vec3::X), Vec3::new(12.0, 0.0, 0.0));
        assert_eq!(child.pre_compose(&parent), aggregate);
    }

    #[test]
    fn inverse_round_trips_points() {
        let transform = Transform::from_components(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.3, 0.2, 0.1),
            Vec3::new(2.0, 1.0, 0.5),
        );
        let point = Vec3::new(-4.0, 5.0, 6.0);
        let back = transform
            .inverse()
            .transform_point(transform.transform_point(point));
        assert_vec_eq(back, point);
    }

    #[test]
    fn decompose_recovers_components() {
        let rotation = Quat::from_rotation_y(0.7);
        let transform = Transform::from_scale_rotation_translation(
            Vec3::new(1.0, 2.0, 3.0),
            rotation,
            Vec3::new(4.0, 5.0, 6.0),
        );
        let (scale, decomposed_rotation, translation) = transform.decompose();
        assert_vec_eq(scale, Vec3::new(1.0, 2.0, 3.0));
        assert_vec_eq(translation, Vec3::new(4.0, 5.0, 6.0));
        assert!(decomposed_rotation.angle_between(rotation) < 1e-4);
    }

    #[test]
    fn vectors_ignore_translation() {
        let transform = Transform::from_position(Vec3::new(5.0, 5.0, 5.0));
        assert_vec_eq(transform.transform_vector(Vec3::Y), Vec3::Y);
        assert_vec_eq(transform.translation(), Vec3::splat(5.0));
    }

    #[test]
    fn look_at_points_forward_at_target() {
        let mut transform = Transform::from_position(Vec3::new(0.0, 0.0, 5.0));
        transform.look_at(Vec3::ZERO, Vec3::Y);
        assert_vec_eq(transform.forward(), -Vec3::Z);

        transform.look_at(Vec3::new(5.0, 0.0, 5.0), Vec3::Y);
        assert_vec_eq(transform.forward(), Vec3::X);
    }
}
