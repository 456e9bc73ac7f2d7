//! Core traits and types for constrained geometry optimization.
//!
//! This crate provides the foundations shared by the optimizers of the
//! workspace: the scalar abstraction, the error types, coordinate bases and
//! constraint handling, the interface to the energy/coordinate backend, line
//! searches and option types.
//!
//! # Key Concepts
//!
//! - **Working coordinates**: the (possibly delocalized) coordinates in which
//!   the gradient is expressed and steps are taken
//! - **Primitive coordinates**: the transformed coordinates in which
//!   quasi-Newton curvature information is accumulated
//! - **Constraints**: directions projected out of the gradient
//! - **Line search**: black box turning a direction and a step bound into an
//!   accepted point
//!
//! # Modules
//!
//! - [`config`]: Optimizer options and run settings
//! - [`coordinates`]: Coordinate bases, constraint modes and projections
//! - [`error`]: Error types
//! - [`line_search`]: Line search interface and implementations
//! - [`provider`]: Energy and coordinate backend interface
//! - [`types`]: Scalar trait, type aliases and numerical constants

pub mod config;
pub mod coordinates;
pub mod error;
pub mod line_search;
pub mod provider;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used items at the crate root
pub use error::{CoordinateError, OptimizerError, OptimizerResult, Result};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use geomopt_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{OptimizerOptions, RunSettings};
    pub use crate::coordinates::{
        project_out_constraints, rms_gradient, ConstraintMode, CoordinateBasis,
    };
    pub use crate::error::{CoordinateError, OptimizerError, OptimizerResult, Result};
    pub use crate::line_search::{
        Backtracking, LineSearch, LineSearchParams, LineSearchRequest, LineSearchResult,
        NoLineSearch, LINE_SEARCH_FAILURE, LINE_SEARCH_SUCCESS,
    };
    pub use crate::provider::CostAndCoordinateProvider;
    pub use crate::types::{constants, DMatrix, DVector, Scalar};
}
