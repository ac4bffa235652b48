// Math utilities for 3D engine

use crate::matrix::Matrix4;
use crate::quaternion::Quaternion;
use crate::vector::Vector3;

/// Represents a 3D transformation
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub position: Vector3,
    pub rotation: Quaternion,
    pub scale: Vector3,
}

impl Transform {
    /// Create a new transform
    pub fn new(position: Vector3, rotation: Quaternion, scale: Vector3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Create an identity transform
    pub fn identity() -> Self {
        Self {
            position: Vector3::ZERO,
            rotation: Quaternion::IDENTITY,
            scale: Vector3::ONE,
        }
    }

    /// Generate transformation matrix: scale first, then rotation, then
    /// translation.
    pub fn matrix(&self) -> Matrix4 {
        let mut m = Matrix4::identity();
        m.translate(self.position)
            .rotate_quaternion(self.rotation)
            .scale(self.scale);
        m
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_identity_matrix() {
        assert_eq!(Transform::identity().matrix(), Matrix4::IDENTITY);
        assert_eq!(Transform::default(), Transform::identity());
    }

    #[test]
    fn test_matrix_matches_glam() {
        let t = Transform::new(
            Vector3::new(1.0, -2.0, 3.0),
            Quaternion::from_euler(Vector3::new(0.4, 0.1, -0.8)),
            Vector3::new(2.0, 0.5, 1.5),
        );
        let reference = Matrix4::from(glam::Mat4::from_scale_rotation_translation(
            t.scale.into(),
            t.rotation.into(),
            t.position.into(),
        ));

        let m = t.matrix();
        for i in 0..16 {
            assert_abs_diff_eq!(m.elements[i], reference.elements[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn test_point_is_scaled_rotated_then_moved() {
        let t = Transform::new(
            Vector3::new(10.0, 0.0, 0.0),
            Quaternion::from_axis_angle(Vector3::FORWARD, std::f32::consts::FRAC_PI_2).unwrap(),
            Vector3::new(2.0, 2.0, 2.0),
        );
        let p = t.matrix().transform_point(Vector3::RIGHT);
        assert_abs_diff_eq!(p.x, 10.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.y, 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.z, 0.0, epsilon = 1e-5);
    }
}
