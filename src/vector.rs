// Vector module for IntSar-3D math

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use crate::error::{MathError, Result};

/// A 3-component vector used for positions, directions, axes and Euler
/// triples.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);
    pub const DOWN: Self = Self::new(0.0, -1.0, 0.0);
    pub const LEFT: Self = Self::new(-1.0, 0.0, 0.0);
    pub const RIGHT: Self = Self::new(1.0, 0.0, 0.0);
    pub const FORWARD: Self = Self::new(0.0, 0.0, 1.0);
    pub const BACK: Self = Self::new(0.0, 0.0, -1.0);

    /// Create a new vector
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Convert an angle in degrees to radians.
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * std::f32::consts::PI / 180.0
    }

    /// Convert an angle in radians to degrees.
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * 180.0 / std::f32::consts::PI
    }

    /// Convert a triple of angles in degrees to radians.
    pub fn from_degrees(degrees: Vector3) -> Self {
        Self::new(
            Self::deg_to_rad(degrees.x),
            Self::deg_to_rad(degrees.y),
            Self::deg_to_rad(degrees.z),
        )
    }

    /// Read a vector from its packed `x, y, z` float bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bytemuck::try_pod_read_unaligned(bytes).map_err(|_| MathError::BufferLength {
            expected: std::mem::size_of::<Self>(),
            actual: bytes.len(),
        })
    }

    /// Packed `x, y, z` float bytes in native endianness.
    pub fn to_bytes(&self) -> [u8; 12] {
        bytemuck::cast(*self)
    }

    /// Convert this triple of angles in radians to degrees.
    pub fn as_degrees(&self) -> Self {
        Self::new(
            Self::rad_to_deg(self.x),
            Self::rad_to_deg(self.y),
            Self::rad_to_deg(self.z),
        )
    }

    /// Components as `[x, y, z]`.
    pub fn as_array(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Overwrite all three components in place.
    pub fn set(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.x = x;
        self.y = y;
        self.z = z;
        self
    }

    /// Squared Euclidean length.
    pub fn length_squared(&self) -> f32 {
        self.dot(self)
    }

    /// Euclidean length.
    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Dot product.
    pub fn dot(&self, other: &Vector3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Right-handed cross product `self × other`.
    pub fn cross(&self, other: &Vector3) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Return a unit-length copy of this vector.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::ZeroLength`] when the vector has zero length.
    pub fn normalize(&self) -> Result<Self> {
        // Divide by the largest component first so squaring cannot overflow.
        let largest = self.x.abs().max(self.y.abs()).max(self.z.abs());
        if largest == 0.0 || !self.as_array().iter().all(|c| c.is_finite()) {
            return Err(MathError::ZeroLength("vector"));
        }
        let scaled = Self::new(self.x / largest, self.y / largest, self.z / largest);
        let length = scaled.length();
        Ok(Self::new(scaled.x / length, scaled.y / length, scaled.z / length))
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vector3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<glam::Vec3> for Vector3 {
    fn from(v: glam::Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Vector3> for glam::Vec3 {
    fn from(v: Vector3) -> Self {
        glam::Vec3::new(v.x, v.y, v.z)
    }
}
