// IntSar-3D math: transform algebra for the renderer

//! Spatial transform kernel: [`Vector3`], [`Quaternion`] and the row-major
//! homogeneous [`Matrix4`].
//!
//! Conventions shared by every type:
//!
//! - Matrices are stored row-major, index `row * 4 + col`, with the
//!   translation in elements 3, 7 and 11.
//! - Points and vectors are column vectors on the right of the matrix, so
//!   `a.multiply(&b)` applies `b` first when the result transforms a point.
//! - Euler triples are `(roll, pitch, yaw)` about `(x, y, z)`, applied in
//!   intrinsic X-Y-Z order (the global product `Rz * Ry * Rx`).

pub mod error;
pub mod math;
pub mod matrix;
pub mod quaternion;
pub mod vector;

pub use error::{MathError, Result};
pub use math::Transform;
pub use matrix::Matrix4;
pub use quaternion::Quaternion;
pub use vector::Vector3;

/// Default tolerance for approximate comparisons, singular determinants and
/// the homogeneous divide in [`Matrix4::transform_point`].
pub const EPSILON: f32 = 1e-6;

/// Cosine between two rotations above which [`Quaternion::slerp`] falls back
/// to a normalized linear blend.
pub const SLERP_LINEAR_THRESHOLD: f32 = 0.9995;
