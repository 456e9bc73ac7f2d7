//! Type definitions and aliases for geometry optimization.
//!
//! This module provides the scalar trait used throughout the workspace,
//! the vector and matrix aliases, and numerical constants.

use nalgebra::{Dyn, OMatrix, OVector, RealField, Scalar as NalgebraScalar};
use num_traits::{Float, FromPrimitive};
use std::fmt::{Debug, Display};

/// Trait for scalar types used in optimization (f32 or f64).
///
/// This trait combines all the necessary numeric traits required
/// by the optimizer, the line searches and the coordinate layer.
pub trait Scalar:
    NalgebraScalar
    + RealField
    + Float
    + FromPrimitive
    + Display
    + Debug
    + Default
    + Copy
    + Send
    + Sync
    + 'static
{
    /// Machine epsilon for this scalar type.
    const EPSILON: Self;

    /// Default tolerance for RMS gradient convergence.
    const DEFAULT_GRADIENT_TOLERANCE: Self;

    /// Curvature products `yᵀs` at or below this value are treated as degenerate.
    const CURVATURE_EPSILON: Self;

    /// Direction norms at or below this value cannot be normalized.
    const DIRECTION_EPSILON: Self;

    /// Maximum value for line search step size.
    const MAX_STEP_SIZE: Self;

    /// Minimum value for line search step size.
    const MIN_STEP_SIZE: Self;

    /// Convert from f64 (for constants).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails. Use `try_from_f64` for a non-panicking version.
    fn from_f64(v: f64) -> Self {
        <Self as FromPrimitive>::from_f64(v).expect("Failed to convert from f64")
    }

    /// Try to convert from f64.
    ///
    /// Returns None if the conversion fails.
    fn try_from_f64(v: f64) -> Option<Self> {
        <Self as FromPrimitive>::from_f64(v)
    }

    /// Convert to f64 (for logging/display).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails. Use `try_to_f64` for a non-panicking version.
    fn to_f64(self) -> f64 {
        num_traits::cast(self).expect("Failed to convert to f64")
    }

    /// Try to convert to f64.
    fn try_to_f64(self) -> Option<f64> {
        num_traits::cast(self)
    }

    /// Convert from usize (for coordinate counts).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails. Use `try_from_usize` for a non-panicking version.
    fn from_usize(v: usize) -> Self {
        <Self as FromPrimitive>::from_usize(v).expect("Failed to convert from usize")
    }

    /// Try to convert from usize.
    fn try_from_usize(v: usize) -> Option<Self> {
        <Self as FromPrimitive>::from_usize(v)
    }
}

impl Scalar for f32 {
    const EPSILON: Self = f32::EPSILON;
    const DEFAULT_GRADIENT_TOLERANCE: Self = 1e-4;
    const CURVATURE_EPSILON: Self = 1e-7;
    const DIRECTION_EPSILON: Self = 1e-10;
    const MAX_STEP_SIZE: Self = 1e20;
    const MIN_STEP_SIZE: Self = 1e-20;
}

impl Scalar for f64 {
    const EPSILON: Self = f64::EPSILON;
    const DEFAULT_GRADIENT_TOLERANCE: Self = 1e-4;
    const CURVATURE_EPSILON: Self = 1e-12;
    const DIRECTION_EPSILON: Self = 1e-14;
    const MAX_STEP_SIZE: Self = 1e20;
    const MIN_STEP_SIZE: Self = 1e-20;
}

/// Type alias for a dynamically-sized matrix.
pub type DMatrix<T> = OMatrix<T, Dyn, Dyn>;

/// Type alias for a dynamically-sized vector.
pub type DVector<T> = OVector<T, Dyn>;

/// Numerical constants for different precision levels.
pub mod constants {
    use super::Scalar;

    /// Get machine epsilon for the given scalar type.
    pub fn epsilon<T: Scalar>() -> T {
        T::EPSILON
    }

    /// Get default RMS gradient convergence tolerance.
    pub fn gradient_tolerance<T: Scalar>() -> T {
        T::DEFAULT_GRADIENT_TOLERANCE
    }

    /// Get the degenerate-curvature threshold.
    pub fn curvature_epsilon<T: Scalar>() -> T {
        T::CURVATURE_EPSILON
    }

    /// Get the degenerate-direction threshold.
    pub fn direction_epsilon<T: Scalar>() -> T {
        T::DIRECTION_EPSILON
    }

    /// Get maximum step size for line search.
    pub fn max_step_size<T: Scalar>() -> T {
        T::MAX_STEP_SIZE
    }

    /// Get minimum step size for line search.
    pub fn min_step_size<T: Scalar>() -> T {
        T::MIN_STEP_SIZE
    }
}
