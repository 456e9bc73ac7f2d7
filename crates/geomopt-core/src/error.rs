//! Error types for coordinate handling and optimization.
//!
//! This module defines the error types used throughout the workspace for
//! coordinate-system failures and run-level optimizer failures.
//!
//! A line search that reports a negative status is *not* an error: the
//! optimizer surfaces it as a distinct outcome so callers can tell an aborted
//! run apart from a run that produced a trajectory.

use thiserror::Error;

/// Errors that can occur inside the coordinate layer.
///
/// These are raised by [`CostAndCoordinateProvider`](crate::provider::CostAndCoordinateProvider)
/// implementations and by the coordinate utilities of this crate.
#[derive(Debug, Clone, Error)]
pub enum CoordinateError {
    /// Geometry could not be built or evaluated.
    ///
    /// This error occurs when a displacement produces an invalid structure
    /// or when the energy backend fails to evaluate a geometry.
    #[error("Invalid geometry: {reason}")]
    InvalidGeometry {
        /// Description of why the geometry is invalid
        reason: String,
    },

    /// Dimension mismatch between vectors or bases.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions
        expected: String,
        /// Actual dimensions
        actual: String,
    },

    /// Numerical instability detected.
    ///
    /// This error occurs when numerical operations become unstable,
    /// such as a non-finite energy or gradient.
    #[error("Numerical instability detected: {reason}")]
    NumericalError {
        /// Description of the numerical issue
        reason: String,
    },

    /// Operation not supported by this coordinate system.
    #[error("Feature not implemented: {feature}")]
    NotImplemented {
        /// Name of the unimplemented feature
        feature: String,
    },
}

impl CoordinateError {
    /// Create an InvalidGeometry error with a custom reason.
    pub fn invalid_geometry<S: Into<String>>(reason: S) -> Self {
        Self::InvalidGeometry {
            reason: reason.into(),
        }
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch<S1, S2>(expected: S1, actual: S2) -> Self
    where
        S1: std::fmt::Display,
        S2: std::fmt::Display,
    {
        Self::DimensionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a NumericalError with a custom reason.
    pub fn numerical_error<S: Into<String>>(reason: S) -> Self {
        Self::NumericalError {
            reason: reason.into(),
        }
    }

    /// Create a NotImplemented error for a specific feature.
    pub fn not_implemented<S: Into<String>>(feature: S) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }
}

/// Errors that abort an optimization run.
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// The search direction has (numerically) zero norm and cannot be normalized.
    ///
    /// No descent is possible from the current point; the run is aborted.
    #[error("Degenerate search direction: norm {norm:e} cannot be normalized")]
    DegenerateDirection {
        /// Norm of the offending direction in working coordinates
        norm: f64,
    },

    /// Invalid optimizer configuration or run settings.
    #[error("Invalid optimizer configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
        /// Name of the invalid parameter
        parameter: String,
        /// Value that was invalid
        value: String,
    },

    /// The constraint mode needs a path tangent and none was supplied.
    #[error("Constraint mode {mode} requires a tangent vector")]
    MissingTangent {
        /// Name of the constraint mode
        mode: String,
    },

    /// Propagated coordinate-layer error.
    #[error("Coordinate operation failed: {0}")]
    Coordinate(#[from] CoordinateError),
}

impl OptimizerError {
    /// Create a DegenerateDirection error.
    pub fn degenerate_direction(norm: f64) -> Self {
        Self::DegenerateDirection { norm }
    }

    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S1, S2, S3>(reason: S1, parameter: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidConfiguration {
            reason: reason.into(),
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    /// Create a MissingTangent error.
    pub fn missing_tangent<S: Into<String>>(mode: S) -> Self {
        Self::MissingTangent { mode: mode.into() }
    }
}

/// Result type alias for operations that can produce CoordinateError.
pub type Result<T> = std::result::Result<T, CoordinateError>;

/// Result type alias for optimizer operations.
pub type OptimizerResult<T> = std::result::Result<T, OptimizerError>;
