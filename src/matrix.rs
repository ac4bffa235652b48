// Matrix module for IntSar-3D math

use std::fmt;
use std::ops::Mul;

use crate::error::{MathError, Result};
use crate::quaternion::Quaternion;
use crate::vector::Vector3;
use crate::EPSILON;

/// A 4×4 homogeneous transform stored row-major, index `row * 4 + col`.
///
/// Translation lives in elements 3, 7 and 11; element 15 is the homogeneous
/// scale. Points are column vectors on the right, so every in-place
/// transform method (`translate`, `rotate_euler`, `scale`, `multiply`, ...)
/// appends its operation in the matrix's local frame and returns `&mut Self`
/// for chaining.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Matrix4 {
    pub elements: [f32; 16],
}

impl Matrix4 {
    #[rustfmt::skip]
    pub const IDENTITY: Self = Self {
        elements: [
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// A fresh, independently owned copy of [`Matrix4::IDENTITY`].
    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// Wrap 16 row-major floats.
    pub fn new(elements: [f32; 16]) -> Self {
        Self { elements }
    }

    /// Copy a caller-owned buffer of 16 row-major floats.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::BufferLength`] unless `elements` has length 16.
    pub fn from_slice(elements: &[f32]) -> Result<Self> {
        let elements: [f32; 16] = elements.try_into().map_err(|_| MathError::BufferLength {
            expected: 16,
            actual: elements.len(),
        })?;
        Ok(Self { elements })
    }

    /// Read a matrix from its packed row-major float bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bytemuck::try_pod_read_unaligned(bytes).map_err(|_| MathError::BufferLength {
            expected: std::mem::size_of::<Self>(),
            actual: bytes.len(),
        })
    }

    /// Packed row-major float bytes in native endianness.
    pub fn to_bytes(&self) -> [u8; 64] {
        bytemuck::cast(*self)
    }

    /// Rotation about `(roll, pitch, yaw)` = `(x, y, z)` in intrinsic X-Y-Z
    /// order, i.e. the global product `Rz(yaw) * Ry(pitch) * Rx(roll)`.
    pub fn from_euler(euler: Vector3) -> Self {
        let (sr, cr) = euler.x.sin_cos();
        let (sp, cp) = euler.y.sin_cos();
        let (sy, cy) = euler.z.sin_cos();

        let mut e = [0.0; 16];
        e[0] = cy * cp;
        e[1] = cy * sp * sr - sy * cr;
        e[2] = cy * sp * cr + sy * sr;
        e[4] = sy * cp;
        e[5] = sy * sp * sr + cy * cr;
        e[6] = sy * sp * cr - cy * sr;
        e[8] = -sp;
        e[9] = cp * sr;
        e[10] = cp * cr;
        e[15] = 1.0;

        Self::new(e)
    }

    /// Overwrite all 16 elements from a row-major buffer.
    pub fn set_elements(&mut self, elements: &[f32; 16]) -> &mut Self {
        self.elements = *elements;
        self
    }

    /// Reset to the identity.
    pub fn set_identity(&mut self) -> &mut Self {
        self.set_elements(&Self::IDENTITY.elements)
    }

    /// Append a translation in the local frame: the rotation part of the
    /// matrix is applied to `v` before it is added to the translation column.
    pub fn translate(&mut self, v: Vector3) -> &mut Self {
        let e = &mut self.elements;
        e[3] += e[0] * v.x + e[1] * v.y + e[2] * v.z;
        e[7] += e[4] * v.x + e[5] * v.y + e[6] * v.z;
        e[11] += e[8] * v.x + e[9] * v.y + e[10] * v.z;
        e[15] += e[12] * v.x + e[13] * v.y + e[14] * v.z;
        self
    }

    /// Append an Euler rotation (see [`Matrix4::from_euler`]) in the local
    /// frame.
    pub fn rotate_euler(&mut self, euler: Vector3) -> &mut Self {
        self.multiply(&Self::from_euler(euler))
    }

    /// Append a quaternion rotation in the local frame.
    pub fn rotate_quaternion(&mut self, rotation: Quaternion) -> &mut Self {
        self.multiply(&rotation.to_rotation_matrix())
    }

    /// Append a per-axis scale in the local frame.
    pub fn scale(&mut self, v: Vector3) -> &mut Self {
        for row in 0..4 {
            self.elements[row * 4] *= v.x;
            self.elements[row * 4 + 1] *= v.y;
            self.elements[row * 4 + 2] *= v.z;
        }
        self
    }

    /// Replace `self` with `self * other`. Transforming a point by the result
    /// applies `other` first.
    pub fn multiply(&mut self, other: &Matrix4) -> &mut Self {
        let a = &self.elements;
        let b = &other.elements;
        let mut result = [0.0; 16];

        for row in 0..4 {
            for col in 0..4 {
                result[row * 4 + col] = a[row * 4] * b[col]
                    + a[row * 4 + 1] * b[col + 4]
                    + a[row * 4 + 2] * b[col + 8]
                    + a[row * 4 + 3] * b[col + 12];
            }
        }

        self.elements = result;
        self
    }

    /// Transpose in place; the diagonal is untouched.
    pub fn transpose(&mut self) -> &mut Self {
        let e = &mut self.elements;
        e.swap(1, 4);
        e.swap(2, 8);
        e.swap(3, 12);
        e.swap(6, 9);
        e.swap(7, 13);
        e.swap(11, 14);
        self
    }

    /// Replace `self` with a right-handed perspective projection. `fov` is
    /// the vertical field of view in radians; depth maps to `[-1, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::DegenerateProjection`] for a zero `fov` or
    /// `aspect`, or `near == far`; `self` is left unchanged.
    pub fn set_perspective(
        &mut self,
        fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Result<&mut Self> {
        self.elements = perspective(fov, aspect, near, far)?;
        log::debug!("perspective projection:\n{}", self);
        Ok(self)
    }

    /// Append the projection built by [`Matrix4::set_perspective`] via
    /// [`Matrix4::multiply`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`Matrix4::set_perspective`].
    pub fn apply_perspective(
        &mut self,
        fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Result<&mut Self> {
        let projection = Self::new(perspective(fov, aspect, near, far)?);
        Ok(self.multiply(&projection))
    }

    /// Replace `self` with an orthographic projection mapping the box
    /// `[left, right] × [bottom, top] × [-near, -far]` to the canonical cube.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::DegenerateProjection`] if the box is flat along
    /// any axis; `self` is left unchanged.
    pub fn set_orthographic(
        &mut self,
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Result<&mut Self> {
        let width = 1.0 / (right - left);
        let height = 1.0 / (top - bottom);
        let depth = 1.0 / (far - near);

        let mut e = [0.0; 16];
        e[0] = 2.0 * width;
        e[3] = -(right + left) * width;
        e[5] = 2.0 * height;
        e[7] = -(top + bottom) * height;
        e[10] = -2.0 * depth;
        e[11] = -(far + near) * depth;
        e[15] = 1.0;

        self.elements = finite_projection(e, "orthographic")?;
        Ok(self)
    }

    /// Replace `self` with a right-handed view matrix for a camera at `eye`
    /// looking at `target`.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::ZeroLength`] if `eye == target` or `up` is
    /// parallel to the view direction; `self` is left unchanged.
    pub fn set_look_at(&mut self, eye: Vector3, target: Vector3, up: Vector3) -> Result<&mut Self> {
        let forward = (target - eye).normalize()?;
        let side = forward.cross(&up).normalize()?;
        let up = side.cross(&forward);

        #[rustfmt::skip]
        let elements = [
            side.x,     side.y,     side.z,     -side.dot(&eye),
            up.x,       up.y,       up.z,       -up.dot(&eye),
            -forward.x, -forward.y, -forward.z, forward.dot(&eye),
            0.0,        0.0,        0.0,        1.0,
        ];

        self.elements = elements;
        Ok(self)
    }

    /// Cofactor expansion over complementary 2×2 minors of the top and
    /// bottom row pairs.
    pub fn determinant(&self) -> f32 {
        let m = Minors::new(&self.elements);
        m.determinant()
    }

    /// Replace `self` with its inverse.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::Singular`] when the determinant is below
    /// [`EPSILON`] relative to the product of the row lengths (the largest
    /// value it can take for rows of those lengths), so uniformly scaled
    /// matrices are judged the same at any scale. `self` is left unchanged.
    pub fn invert(&mut self) -> Result<&mut Self> {
        let a = &self.elements;
        let m = Minors::new(a);
        let det = m.determinant();

        let row_bound: f32 = (0..4)
            .map(|row| {
                let r = &a[row * 4..row * 4 + 4];
                (r[0] * r[0] + r[1] * r[1] + r[2] * r[2] + r[3] * r[3]).sqrt()
            })
            .product();

        if row_bound == 0.0 || !det.is_finite() || (det / row_bound).abs() < EPSILON {
            log::debug!("refusing to invert singular matrix (det {det}):\n{}", self);
            return Err(MathError::Singular(det));
        }

        let inv = 1.0 / det;
        let Minors { b00, b01, b02, b03, b04, b05, b06, b07, b08, b09, b10, b11 } = m;

        let out = [
            (a[5] * b11 - a[6] * b10 + a[7] * b09) * inv,
            (a[2] * b10 - a[1] * b11 - a[3] * b09) * inv,
            (a[13] * b05 - a[14] * b04 + a[15] * b03) * inv,
            (a[10] * b04 - a[9] * b05 - a[11] * b03) * inv,
            (a[6] * b08 - a[4] * b11 - a[7] * b07) * inv,
            (a[0] * b11 - a[2] * b08 + a[3] * b07) * inv,
            (a[14] * b02 - a[12] * b05 - a[15] * b01) * inv,
            (a[8] * b05 - a[10] * b02 + a[11] * b01) * inv,
            (a[4] * b10 - a[5] * b08 + a[7] * b06) * inv,
            (a[1] * b08 - a[0] * b10 - a[3] * b06) * inv,
            (a[12] * b04 - a[13] * b02 + a[15] * b00) * inv,
            (a[9] * b02 - a[8] * b04 - a[11] * b00) * inv,
            (a[5] * b07 - a[4] * b09 - a[6] * b06) * inv,
            (a[0] * b09 - a[1] * b07 + a[2] * b06) * inv,
            (a[13] * b01 - a[12] * b03 - a[14] * b00) * inv,
            (a[8] * b03 - a[9] * b01 + a[10] * b00) * inv,
        ];

        self.elements = out;
        Ok(self)
    }

    /// The upper-left 3×3 block, row-major.
    pub fn rotation_block(&self) -> [f32; 9] {
        let e = &self.elements;
        [e[0], e[1], e[2], e[4], e[5], e[6], e[8], e[9], e[10]]
    }

    /// Trace of the upper-left 3×3 block.
    pub fn trace(&self) -> f32 {
        self.elements[0] + self.elements[5] + self.elements[10]
    }

    /// Rebuild the 3×3 block as a clean orthonormal rotation, discarding
    /// accumulated drift (and any scale). Translation and the bottom row are
    /// kept.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::ZeroLength`] if no rotation can be recovered from
    /// the block.
    pub fn orthogonalize(&mut self) -> Result<&mut Self> {
        let rotation =
            Quaternion::from_rotation_matrix(&self.rotation_block(), self.trace()).normalize()?;
        log::trace!("orthogonalize: recovered rotation {rotation}");

        let clean = rotation.to_rotation_matrix().elements;
        for row in 0..3 {
            for col in 0..3 {
                self.elements[row * 4 + col] = clean[row * 4 + col];
            }
        }
        Ok(self)
    }

    /// Apply only the 3×3 part, ignoring translation.
    pub fn transform_vector(&self, v: Vector3) -> Vector3 {
        let e = &self.elements;
        Vector3::new(
            e[0] * v.x + e[1] * v.y + e[2] * v.z,
            e[4] * v.x + e[5] * v.y + e[6] * v.z,
            e[8] * v.x + e[9] * v.y + e[10] * v.z,
        )
    }

    /// Apply the full transform to the point `(x, y, z, 1)`, dividing by the
    /// resulting `w` unless it is within [`EPSILON`] of 1.
    pub fn transform_point(&self, v: Vector3) -> Vector3 {
        let e = &self.elements;
        let x = e[0] * v.x + e[1] * v.y + e[2] * v.z + e[3];
        let y = e[4] * v.x + e[5] * v.y + e[6] * v.z + e[7];
        let z = e[8] * v.x + e[9] * v.y + e[10] * v.z + e[11];
        let w = e[12] * v.x + e[13] * v.y + e[14] * v.z + e[15];

        if (w - 1.0).abs() > EPSILON {
            Vector3::new(x / w, y / w, z / w)
        } else {
            Vector3::new(x, y, z)
        }
    }
}

fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Result<[f32; 16]> {
    let tan_half_fov_inv = 1.0 / (fov / 2.0).tan();
    let range_inv = 1.0 / (near - far);

    let mut e = [0.0; 16];
    e[0] = tan_half_fov_inv / aspect;
    e[5] = tan_half_fov_inv;
    e[10] = (far + near) * range_inv;
    e[11] = 2.0 * far * near * range_inv;
    e[14] = -1.0;
    finite_projection(e, "perspective")
}

/// Zero-width volumes show up as infinities or NaN in the coefficients.
fn finite_projection(e: [f32; 16], kind: &'static str) -> Result<[f32; 16]> {
    if e.iter().all(|v| v.is_finite()) {
        Ok(e)
    } else {
        Err(MathError::DegenerateProjection(kind))
    }
}

/// 2×2 sub-determinants of rows 0-1 (`b00..b05`) and rows 2-3 (`b06..b11`).
struct Minors {
    b00: f32,
    b01: f32,
    b02: f32,
    b03: f32,
    b04: f32,
    b05: f32,
    b06: f32,
    b07: f32,
    b08: f32,
    b09: f32,
    b10: f32,
    b11: f32,
}

impl Minors {
    fn new(a: &[f32; 16]) -> Self {
        Self {
            b00: a[0] * a[5] - a[1] * a[4],
            b01: a[0] * a[6] - a[2] * a[4],
            b02: a[0] * a[7] - a[3] * a[4],
            b03: a[1] * a[6] - a[2] * a[5],
            b04: a[1] * a[7] - a[3] * a[5],
            b05: a[2] * a[7] - a[3] * a[6],
            b06: a[8] * a[13] - a[9] * a[12],
            b07: a[8] * a[14] - a[10] * a[12],
            b08: a[8] * a[15] - a[11] * a[12],
            b09: a[9] * a[14] - a[10] * a[13],
            b10: a[9] * a[15] - a[11] * a[13],
            b11: a[10] * a[15] - a[11] * a[14],
        }
    }

    fn determinant(&self) -> f32 {
        self.b00 * self.b11 - self.b01 * self.b10 + self.b02 * self.b09 + self.b03 * self.b08
            - self.b04 * self.b07
            + self.b05 * self.b06
    }
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Matrix4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `+ 0.0` folds -0.0 into 0.0 so the grid prints the same either way.
        let e = self.elements.map(|v| v + 0.0);
        for row in 0..4 {
            let open = if row == 0 { "[" } else { " " };
            let close = if row == 3 { "]" } else { "\n" };
            write!(
                f,
                "{open}{:.4} {:.4} {:.4} {:.4}{close}",
                e[row * 4],
                e[row * 4 + 1],
                e[row * 4 + 2],
                e[row * 4 + 3]
            )?;
        }
        Ok(())
    }
}

impl Mul for Matrix4 {
    type Output = Self;

    fn mul(mut self, rhs: Self) -> Self {
        self.multiply(&rhs);
        self
    }
}

/// `glam` matrices are column-major; conversion transposes.
impl From<glam::Mat4> for Matrix4 {
    fn from(m: glam::Mat4) -> Self {
        Self::new(m.transpose().to_cols_array())
    }
}

impl From<Matrix4> for glam::Mat4 {
    fn from(m: Matrix4) -> Self {
        glam::Mat4::from_cols_array(&m.elements).transpose()
    }
}
