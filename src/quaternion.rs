// Quaternion module for IntSar-3D math

use std::fmt;
use std::ops::{Mul, Neg};

use crate::error::{MathError, Result};
use crate::matrix::Matrix4;
use crate::vector::Vector3;
use crate::{EPSILON, SLERP_LINEAR_THRESHOLD};

/// A rotation stored as `(w, x, y, z)`.
///
/// Values produced by the factories and by [`Quaternion::set`] are unit
/// length. Raw construction through [`Quaternion::new`] is unchecked; call
/// [`Quaternion::normalize`] before relying on the invariant.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// No rotation.
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 0.0);

    /// Raw quaternion; not normalized.
    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `angle` radians about `axis`. The axis does not need to be
    /// unit length.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::ZeroLength`] for a zero axis.
    pub fn from_axis_angle(axis: Vector3, angle: f32) -> Result<Self> {
        let axis = axis.normalize()?;
        let (s, c) = (angle * 0.5).sin_cos();
        Ok(Self::new(c, axis.x * s, axis.y * s, axis.z * s))
    }

    /// Rotation from `(roll, pitch, yaw)` about `(x, y, z)`, applied in
    /// intrinsic X-Y-Z order. Agrees with [`Matrix4::from_euler`].
    pub fn from_euler(euler: Vector3) -> Self {
        let (sx, cx) = (euler.x * 0.5).sin_cos();
        let (sy, cy) = (euler.y * 0.5).sin_cos();
        let (sz, cz) = (euler.z * 0.5).sin_cos();

        Self::new(
            cx * cy * cz + sx * sy * sz,
            sx * cy * cz - cx * sy * sz,
            cx * sy * cz + sx * cy * sz,
            cx * cy * sz - sx * sy * cz,
        )
    }

    /// Extract the rotation from a row-major 3×3 rotation matrix and its
    /// trace.
    ///
    /// Picks whichever of `w`, `x`, `y`, `z` has the largest magnitude as the
    /// pivot, so precision holds for rotations near 180 degrees.
    pub fn from_rotation_matrix(m: &[f32; 9], trace: f32) -> Self {
        let (m00, m11, m22) = (m[0], m[4], m[8]);

        if trace > m00 && trace > m11 && trace > m22 {
            let s = 0.5 / (trace + 1.0).sqrt();
            Self::new(
                0.25 / s,
                (m[7] - m[5]) * s,
                (m[2] - m[6]) * s,
                (m[3] - m[1]) * s,
            )
        } else if m00 >= m11 && m00 >= m22 {
            let s = 2.0 * (1.0 + m00 - m11 - m22).sqrt();
            Self::new(
                (m[7] - m[5]) / s,
                0.25 * s,
                (m[1] + m[3]) / s,
                (m[2] + m[6]) / s,
            )
        } else if m11 >= m22 {
            let s = 2.0 * (1.0 + m11 - m00 - m22).sqrt();
            Self::new(
                (m[2] - m[6]) / s,
                (m[1] + m[3]) / s,
                0.25 * s,
                (m[5] + m[7]) / s,
            )
        } else {
            let s = 2.0 * (1.0 + m22 - m00 - m11).sqrt();
            Self::new(
                (m[3] - m[1]) / s,
                (m[2] + m[6]) / s,
                (m[5] + m[7]) / s,
                0.25 * s,
            )
        }
    }

    /// Read a quaternion from its packed `w, x, y, z` float bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bytemuck::try_pod_read_unaligned(bytes).map_err(|_| MathError::BufferLength {
            expected: std::mem::size_of::<Self>(),
            actual: bytes.len(),
        })
    }

    /// Packed `w, x, y, z` float bytes in native endianness.
    pub fn to_bytes(&self) -> [u8; 16] {
        bytemuck::cast(*self)
    }

    /// Assign all four components, then normalize.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::ZeroLength`] if all components are zero; `self`
    /// is left unchanged.
    pub fn set(&mut self, w: f32, x: f32, y: f32, z: f32) -> Result<&mut Self> {
        *self = Self::new(w, x, y, z).normalize()?;
        Ok(self)
    }

    /// Unit-length copy of this quaternion.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::ZeroLength`] for the zero quaternion.
    pub fn normalize(&self) -> Result<Self> {
        let (scaled, _) = self.scaled_down()?;
        Ok(scaled.divide(scaled.magnitude()))
    }

    /// Divide by the largest component magnitude so that squaring cannot
    /// overflow. Returns the scaled quaternion and the divisor.
    fn scaled_down(&self) -> Result<(Self, f32)> {
        let components = [self.w, self.x, self.y, self.z];
        let largest = components.iter().fold(0.0f32, |acc, c| acc.max(c.abs()));
        if largest == 0.0 || !components.iter().all(|c| c.is_finite()) {
            return Err(MathError::ZeroLength("quaternion"));
        }
        Ok((self.divide(largest), largest))
    }

    fn divide(&self, d: f32) -> Self {
        Self::new(self.w / d, self.x / d, self.y / d, self.z / d)
    }

    /// Negate the vector part. For a unit quaternion this is the inverse
    /// rotation.
    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Multiplicative inverse: the conjugate divided by the squared magnitude.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::ZeroLength`] for the zero quaternion.
    pub fn invert(&self) -> Result<Self> {
        // conj(q) / |q|^2 == conj(q / |q|) / |q|
        let (scaled, largest) = self.scaled_down()?;
        let scaled_length = scaled.magnitude();
        let unit = scaled.divide(scaled_length);
        Ok(unit.conjugate().divide(scaled_length * largest))
    }

    /// Hamilton product `self * other`. The result applies `other`'s rotation
    /// first, then `self`'s.
    pub fn multiply(&self, other: &Quaternion) -> Self {
        let (aw, ax, ay, az) = (self.w, self.x, self.y, self.z);
        let (bw, bx, by, bz) = (other.w, other.x, other.y, other.z);

        Self::new(
            aw * bw - ax * bx - ay * by - az * bz,
            aw * bx + ax * bw + ay * bz - az * by,
            aw * by - ax * bz + ay * bw + az * bx,
            aw * bz + ax * by - ay * bx + az * bw,
        )
    }

    /// Four-component dot product.
    pub fn dot(&self, other: &Quaternion) -> f32 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Euclidean 4-norm.
    pub fn magnitude(&self) -> f32 {
        self.magnitude_squared().sqrt()
    }

    pub fn magnitude_squared(&self) -> f32 {
        self.dot(self)
    }

    /// Rotate `v` by this quaternion, `q * v * q^-1` restricted to the vector
    /// part. Expects a unit quaternion.
    pub fn rotate_vector(&self, v: Vector3) -> Vector3 {
        let u = Vector3::new(self.x, self.y, self.z);
        let t = u.cross(&v) * 2.0;
        v + t * self.w + u.cross(&t)
    }

    /// Homogeneous rotation matrix for this (unit) quaternion.
    pub fn to_rotation_matrix(&self) -> Matrix4 {
        let (w, x, y, z) = (self.w, self.x, self.y, self.z);
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);

        #[rustfmt::skip]
        let elements = [
            1.0 - 2.0 * (yy + zz), 2.0 * (xy - wz),       2.0 * (xz + wy),       0.0,
            2.0 * (xy + wz),       1.0 - 2.0 * (xx + zz), 2.0 * (yz - wx),       0.0,
            2.0 * (xz - wy),       2.0 * (yz + wx),       1.0 - 2.0 * (xx + yy), 0.0,
            0.0,                   0.0,                   0.0,                   1.0,
        ];
        Matrix4::new(elements)
    }

    /// `(roll, pitch, yaw)` such that [`Quaternion::from_euler`] gives back
    /// the same rotation. Pitch is clamped to `[-pi/2, pi/2]`.
    pub fn to_euler(&self) -> Vector3 {
        let (w, x, y, z) = (self.w, self.x, self.y, self.z);

        let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
        let sin_pitch = 2.0 * (w * y - z * x);
        let pitch = if sin_pitch.abs() >= 1.0 {
            std::f32::consts::FRAC_PI_2.copysign(sin_pitch)
        } else {
            sin_pitch.asin()
        };
        let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));

        Vector3::new(roll, pitch, yaw)
    }

    /// Unit axis and angle in radians. A rotation of (nearly) zero reports
    /// [`Vector3::RIGHT`] as its axis.
    pub fn to_axis_angle(&self) -> (Vector3, f32) {
        let w = self.w.clamp(-1.0, 1.0);
        let angle = 2.0 * w.acos();
        let s = (1.0 - w * w).sqrt();
        if s < EPSILON {
            return (Vector3::RIGHT, angle);
        }
        (Vector3::new(self.x / s, self.y / s, self.z / s), angle)
    }

    /// Normalized linear blend towards `other` along the shorter arc. Cheaper
    /// than [`Quaternion::slerp`] but not constant velocity.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::ZeroLength`] if the blend collapses to zero.
    pub fn lerp(&self, other: &Quaternion, t: f32) -> Result<Self> {
        let end = if self.dot(other) < 0.0 { -*other } else { *other };
        Self::new(
            self.w + (end.w - self.w) * t,
            self.x + (end.x - self.x) * t,
            self.y + (end.y - self.y) * t,
            self.z + (end.z - self.z) * t,
        )
        .normalize()
    }

    /// Constant angular velocity interpolation towards `other` along the
    /// shorter great-circle arc.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::ZeroLength`] if either input is the zero
    /// quaternion.
    pub fn slerp(&self, other: &Quaternion, t: f32) -> Result<Self> {
        let start = self.normalize()?;
        let mut end = other.normalize()?;
        let mut cos = start.dot(&end);

        if cos < 0.0 {
            end = -end;
            cos = -cos;
        }

        if cos > SLERP_LINEAR_THRESHOLD {
            return start.lerp(&end, t);
        }

        let theta = cos.acos();
        let sin = theta.sin();
        let a = ((1.0 - t) * theta).sin() / sin;
        let b = (t * theta).sin() / sin;

        Ok(Self::new(
            a * start.w + b * end.w,
            a * start.x + b * end.x,
            a * start.y + b * end.y,
            a * start.z + b * end.z,
        ))
    }

    /// Component-wise comparison with the default [`EPSILON`].
    pub fn equals(&self, other: &Quaternion) -> bool {
        self.equals_within(other, EPSILON)
    }

    /// Component-wise comparison: every difference must be below `epsilon`.
    pub fn equals_within(&self, other: &Quaternion, epsilon: f32) -> bool {
        (self.w - other.w).abs() < epsilon
            && (self.x - other.x).abs() < epsilon
            && (self.y - other.y).abs() < epsilon
            && (self.z - other.z).abs() < epsilon
    }

    /// `q` and `-q` describe the same rotation.
    pub fn same_rotation(&self, other: &Quaternion, epsilon: f32) -> bool {
        self.equals_within(other, epsilon) || self.equals_within(&-*other, epsilon)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Quaternion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.w, self.x, self.y, self.z)
    }
}

impl Neg for Quaternion {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.w, -self.x, -self.y, -self.z)
    }
}

impl Mul for Quaternion {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.multiply(&rhs)
    }
}

impl Mul<Vector3> for Quaternion {
    type Output = Vector3;

    fn mul(self, rhs: Vector3) -> Vector3 {
        self.rotate_vector(rhs)
    }
}

impl From<glam::Quat> for Quaternion {
    fn from(q: glam::Quat) -> Self {
        Self::new(q.w, q.x, q.y, q.z)
    }
}

impl From<Quaternion> for glam::Quat {
    fn from(q: Quaternion) -> Self {
        glam::Quat::from_xyzw(q.x, q.y, q.z, q.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn assert_vec_eq(a: Vector3, b: Vector3) {
        assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-5);
        assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-5);
        assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn test_identity() {
        assert_eq!(Quaternion::IDENTITY, Quaternion::new(1.0, 0.0, 0.0, 0.0));
        assert_eq!(Quaternion::default(), Quaternion::IDENTITY);
        assert_vec_eq(Quaternion::IDENTITY * Vector3::new(1.0, 2.0, 3.0), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_axis_angle_normalizes_axis() {
        let q = Quaternion::from_axis_angle(Vector3::new(0.0, 0.0, 5.0), PI).unwrap();
        assert!(q.equals(&Quaternion::new(0.0, 0.0, 0.0, 1.0)));
        assert_abs_diff_eq!(q.magnitude(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_axis_angle_zero_axis_fails() {
        assert_eq!(
            Quaternion::from_axis_angle(Vector3::ZERO, 1.0),
            Err(MathError::ZeroLength("vector"))
        );
    }

    #[test]
    fn test_rotate_vector_about_z() {
        let q = Quaternion::from_axis_angle(Vector3::FORWARD, FRAC_PI_2).unwrap();
        assert_vec_eq(q.rotate_vector(Vector3::RIGHT), Vector3::UP);
    }

    #[test]
    fn test_multiply_applies_right_operand_first() {
        let about_z = Quaternion::from_axis_angle(Vector3::FORWARD, FRAC_PI_2).unwrap();
        let about_x = Quaternion::from_axis_angle(Vector3::RIGHT, FRAC_PI_2).unwrap();

        // x-axis: unchanged by about_x, then sent to +y by about_z.
        let v = (about_z * about_x).rotate_vector(Vector3::RIGHT);
        assert_vec_eq(v, Vector3::UP);

        // The other order sends x to +y, then +y to +z.
        let v = (about_x * about_z).rotate_vector(Vector3::RIGHT);
        assert_vec_eq(v, Vector3::FORWARD);
    }

    #[test]
    fn test_invert_and_conjugate() {
        let q = Quaternion::from_euler(Vector3::new(0.3, -0.7, 1.1));
        assert!(q.invert().unwrap().equals_within(&q.conjugate(), 1e-6));
        assert!((q * q.invert().unwrap()).equals_within(&Quaternion::IDENTITY, 1e-6));

        let scaled = Quaternion::new(2.0, 0.0, 0.0, 0.0);
        assert!(scaled.invert().unwrap().equals(&Quaternion::new(0.5, 0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_invert_zero_fails() {
        let zero = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(zero.invert(), Err(MathError::ZeroLength("quaternion")));
    }

    #[test]
    fn test_set_normalizes_and_keeps_state_on_error() {
        let mut q = Quaternion::IDENTITY;
        q.set(0.0, 0.0, 3.0, 0.0).unwrap();
        assert!(q.equals(&Quaternion::new(0.0, 0.0, 1.0, 0.0)));

        assert!(q.set(0.0, 0.0, 0.0, 0.0).is_err());
        assert!(q.equals(&Quaternion::new(0.0, 0.0, 1.0, 0.0)));
    }

    #[test]
    fn test_euler_round_trip() {
        let euler = Vector3::new(0.4, -0.9, 2.5);
        let back = Quaternion::from_euler(euler).to_euler();
        assert_vec_eq(back, euler);
    }

    #[test]
    fn test_euler_gimbal_pitch_is_clamped() {
        let q = Quaternion::from_euler(Vector3::new(0.0, FRAC_PI_2, 0.0));
        assert_abs_diff_eq!(q.to_euler().y, FRAC_PI_2, epsilon = 1e-3);
    }

    #[test]
    fn test_axis_angle_round_trip() {
        let axis = Vector3::new(1.0, 2.0, -2.0).normalize().unwrap();
        let (back_axis, angle) = Quaternion::from_axis_angle(axis, 1.2).unwrap().to_axis_angle();
        assert_vec_eq(back_axis, axis);
        assert_abs_diff_eq!(angle, 1.2, epsilon = 1e-5);

        let (axis, angle) = Quaternion::IDENTITY.to_axis_angle();
        assert_eq!(axis, Vector3::RIGHT);
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn test_from_rotation_matrix_near_half_turn() {
        // 180 degrees about y: trace is -1, the w-pivot would divide by ~0.
        let q = Quaternion::from_axis_angle(Vector3::UP, PI).unwrap();
        let m = q.to_rotation_matrix();
        let back = Quaternion::from_rotation_matrix(&m.rotation_block(), m.trace());
        assert!(back.same_rotation(&q, 1e-5));
    }

    #[test]
    fn test_slerp_endpoints_and_midpoint() {
        let a = Quaternion::IDENTITY;
        let b = Quaternion::from_axis_angle(Vector3::UP, FRAC_PI_2).unwrap();

        assert!(a.slerp(&b, 0.0).unwrap().equals_within(&a, 1e-6));
        assert!(a.slerp(&b, 1.0).unwrap().equals_within(&b, 1e-6));

        let mid = a.slerp(&b, 0.5).unwrap();
        let expected = Quaternion::from_axis_angle(Vector3::UP, FRAC_PI_2 / 2.0).unwrap();
        assert!(mid.equals_within(&expected, 1e-6));
    }

    #[test]
    fn test_slerp_takes_shorter_arc() {
        let a = Quaternion::IDENTITY;
        let b = -Quaternion::from_axis_angle(Vector3::UP, 0.5).unwrap();
        let mid = a.slerp(&b, 0.5).unwrap();
        let expected = Quaternion::from_axis_angle(Vector3::UP, 0.25).unwrap();
        assert!(mid.same_rotation(&expected, 1e-5));
        assert!(mid.w > 0.0);
    }

    #[test]
    fn test_lerp_takes_shorter_arc() {
        let a = Quaternion::IDENTITY;
        let b = -Quaternion::from_axis_angle(Vector3::UP, 0.5).unwrap();
        let q = a.lerp(&b, 0.5).unwrap();

        // Blending towards the negated operand would pass through w = 0.
        assert!(q.w > 0.9);
        assert!(q.y > 0.0);
        assert!(q.same_rotation(&Quaternion::from_axis_angle(Vector3::UP, 0.25).unwrap(), 1e-3));
        assert!(a.lerp(&b, 1.0).unwrap().same_rotation(&b, 1e-6));
    }

    #[test]
    fn test_normalize_and_invert_large_components() {
        let q = Quaternion::new(2e19, 0.0, 0.0, 0.0);
        assert_eq!(q.normalize(), Ok(Quaternion::IDENTITY));

        let q = Quaternion::new(0.0, 0.0, 3e30, 4e30);
        let n = q.normalize().unwrap();
        assert_abs_diff_eq!(n.y, 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(n.z, 0.8, epsilon = 1e-6);

        let inv = q.invert().unwrap();
        assert_abs_diff_eq!(inv.y * 5e30, -0.6, epsilon = 1e-5);
        assert_abs_diff_eq!(inv.z * 5e30, -0.8, epsilon = 1e-5);
    }

    #[test]
    fn test_normalize_non_finite_fails() {
        assert!(Quaternion::new(f32::NAN, 0.0, 0.0, 0.0).normalize().is_err());
    }

    #[test]
    fn test_lerp_is_normalized() {
        let a = Quaternion::IDENTITY;
        let b = Quaternion::from_axis_angle(Vector3::RIGHT, 2.0).unwrap();
        let q = a.lerp(&b, 0.3).unwrap();
        assert_abs_diff_eq!(q.magnitude(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_glam_conversion() {
        let q = Quaternion::from_euler(Vector3::new(0.1, 0.2, 0.3));
        let g: glam::Quat = q.into();
        assert_eq!(g.w, q.w);
        assert_eq!(Quaternion::from(g), q);
    }

    #[test]
    fn test_display() {
        assert_eq!(Quaternion::IDENTITY.to_string(), "(1, 0, 0, 0)");
    }
}
