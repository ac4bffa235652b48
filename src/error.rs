// Error module for IntSar-3D math

//! Error types for the transform algebra.

/// Errors reported by fallible math operations.
///
/// [`MathError::ZeroLength`], [`MathError::Singular`] and
/// [`MathError::DegenerateProjection`] form the degenerate-input class; see
/// [`MathError::is_degenerate`].
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum MathError {
    /// Normalizing or inverting a value with zero length.
    #[error("cannot normalize a zero-length {0}")]
    ZeroLength(&'static str),

    /// Inverting a matrix whose determinant is negligible next to the
    /// product of its row lengths.
    #[error("matrix is singular (determinant {0})")]
    Singular(f32),

    /// Projection parameters that enclose no volume (`left == right`,
    /// `near == far`, zero field of view or aspect).
    #[error("degenerate {0} projection")]
    DegenerateProjection(&'static str),

    /// A float or byte buffer did not have the expected size.
    #[error("expected a buffer of {expected} elements, got {actual}")]
    BufferLength { expected: usize, actual: usize },
}

impl MathError {
    /// Whether the error was caused by degenerate numeric input.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            MathError::ZeroLength(_) | MathError::Singular(_) | MathError::DegenerateProjection(_)
        )
    }
}

/// Result alias used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, MathError>;
