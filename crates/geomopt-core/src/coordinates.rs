//! Coordinate representations and constraint handling.
//!
//! The optimizer works with three representations of the same geometry:
//!
//! - **Cartesian** positions (`xyz`), owned by the coordinate provider;
//! - **working** (reduced) coordinates `x`, in which the energy gradient and
//!   the line search operate;
//! - **primitive** (transformed) coordinates, in which the L-BFGS history is
//!   stored.
//!
//! The coordinate basis `B` (primitives × working) maps between the last two:
//!
//! ```text
//! g_prim = B g        (working → primitive)
//! d      = Bᵀ d_prim  (primitive → working)
//! ```
//!
//! For Cartesian optimizations the basis is the identity and both maps are
//! no-ops.

use crate::{
    error::{CoordinateError, OptimizerError, Result},
    types::{DMatrix, DVector, Scalar},
};
use num_traits::Float;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Basis relating working coordinates to primitive coordinates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoordinateBasis<T: Scalar> {
    /// Working coordinates are the primitives themselves (Cartesian case).
    Identity,
    /// Column-wise basis of shape (num primitives, num working coordinates).
    Matrix(DMatrix<T>),
}

impl<T: Scalar> CoordinateBasis<T> {
    /// Returns true when the basis is the identity marker.
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Dimension of the primitive space for a given number of working coordinates.
    pub fn num_primitives(&self, num_coordinates: usize) -> usize {
        match self {
            Self::Identity => num_coordinates,
            Self::Matrix(b) => b.nrows(),
        }
    }

    /// Maps a working-coordinate vector into primitive space (`B v`).
    pub fn to_primitive(&self, v: &DVector<T>) -> Result<DVector<T>> {
        match self {
            Self::Identity => Ok(v.clone()),
            Self::Matrix(b) => {
                if b.ncols() != v.len() {
                    return Err(CoordinateError::dimension_mismatch(b.ncols(), v.len()));
                }
                Ok(b * v)
            }
        }
    }

    /// Maps a primitive-space vector back into working coordinates (`Bᵀ v`).
    pub fn to_working(&self, v: &DVector<T>) -> Result<DVector<T>> {
        match self {
            Self::Identity => Ok(v.clone()),
            Self::Matrix(b) => {
                if b.nrows() != v.len() {
                    return Err(CoordinateError::dimension_mismatch(b.nrows(), v.len()));
                }
                Ok(b.tr_mul(v))
            }
        }
    }
}

/// Problem type deciding which directions are held fixed.
///
/// The constraint vectors themselves are derived by the coordinate provider;
/// the optimizer only needs the count and whether a path tangent is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "SCREAMING-KEBAB-CASE")
)]
pub enum ConstraintMode {
    /// Plain minimization.
    #[default]
    Unconstrained,
    /// Minimization orthogonal to a reaction-path tangent.
    Ictan,
    /// Climbing-image optimization along a tangent.
    Climb,
    /// Minimum-energy conical intersection search.
    Meci,
    /// Minimization on an intersection seam.
    Seam,
    /// Transition-state search on an intersection seam.
    TsSeam,
}

impl ConstraintMode {
    /// Number of directions projected out of the gradient.
    pub fn num_constraints(self) -> usize {
        match self {
            Self::Unconstrained => 0,
            Self::Ictan | Self::Climb => 1,
            Self::Meci => 2,
            Self::Seam | Self::TsSeam => 3,
        }
    }

    /// Whether the mode is defined relative to a path tangent.
    pub fn requires_tangent(self) -> bool {
        matches!(self, Self::Ictan | Self::Climb | Self::TsSeam)
    }

    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unconstrained => "UNCONSTRAINED",
            Self::Ictan => "ICTAN",
            Self::Climb => "CLIMB",
            Self::Meci => "MECI",
            Self::Seam => "SEAM",
            Self::TsSeam => "TS-SEAM",
        }
    }
}

impl fmt::Display for ConstraintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConstraintMode {
    type Err = OptimizerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('_', "-").as_str() {
            "UNCONSTRAINED" => Ok(Self::Unconstrained),
            "ICTAN" => Ok(Self::Ictan),
            "CLIMB" => Ok(Self::Climb),
            "MECI" => Ok(Self::Meci),
            "SEAM" => Ok(Self::Seam),
            "TS-SEAM" => Ok(Self::TsSeam),
            _ => Err(OptimizerError::invalid_configuration(
                "unknown constraint mode",
                "opt_type",
                s,
            )),
        }
    }
}

/// Removes the components of `g` along each constraint column.
///
/// Columns are expected to be orthonormal (or zero); for a single unit vector
/// `c` this is `g - (gᵀc) c`.
pub fn project_out_constraints<T: Scalar>(
    g: &DVector<T>,
    constraints: &DMatrix<T>,
) -> Result<DVector<T>> {
    if constraints.ncols() == 0 {
        return Ok(g.clone());
    }
    if constraints.nrows() != g.len() {
        return Err(CoordinateError::dimension_mismatch(g.len(), constraints.nrows()));
    }

    let mut projected = g.clone();
    for c in constraints.column_iter() {
        let overlap = projected.dot(&c);
        projected.axpy(-overlap, &c, T::one());
    }
    Ok(projected)
}

/// Root-mean-square gradient over the free coordinates: `sqrt(gᵀg / n_free)`.
pub fn rms_gradient<T: Scalar>(g: &DVector<T>, num_free: usize) -> T {
    if num_free == 0 {
        return T::zero();
    }
    <T as Float>::sqrt(g.dot(g) / <T as Scalar>::from_usize(num_free))
}
