//! Interface to the coordinate system and energy backend.
//!
//! A [`CostAndCoordinateProvider`] is the "molecule" of a geometry
//! optimization: it owns the Cartesian geometry, knows how to evaluate the
//! energy and gradient there, and knows how to translate between Cartesian,
//! working and primitive coordinates.
//!
//! # Geometry bookkeeping
//!
//! Providers keep a *committed* geometry. Trial evaluations performed by a
//! line search go through [`evaluate_displacement`](CostAndCoordinateProvider::evaluate_displacement),
//! which evaluates a displaced geometry without committing it. The optimizer
//! commits an accepted step with [`update_xyz`](CostAndCoordinateProvider::update_xyz).
//! After either call, [`energy`](CostAndCoordinateProvider::energy) and
//! [`gradient`](CostAndCoordinateProvider::gradient) report the most recent
//! evaluation.

use crate::{
    coordinates::{CoordinateBasis, ConstraintMode},
    error::Result,
    types::{DMatrix, DVector, Scalar},
};
use std::fmt::Debug;

/// Energy, gradient and coordinate services consumed by the optimizer.
pub trait CostAndCoordinateProvider<T: Scalar>: Debug {
    /// Geometry snapshot recorded in trajectories (e.g. atom labels and positions).
    type Geometry: Clone + Debug;

    /// Energy at the most recently evaluated geometry.
    fn energy(&self) -> T;

    /// Gradient in working coordinates at the most recently evaluated geometry.
    fn gradient(&self) -> DVector<T>;

    /// Snapshot of the committed geometry.
    fn geometry(&self) -> Self::Geometry;

    /// Committed Cartesian positions, flattened.
    fn xyz(&self) -> DVector<T>;

    /// Committed geometry in working coordinates.
    fn coordinates(&self) -> DVector<T>;

    /// Current working ↔ primitive basis.
    fn coord_basis(&self) -> &CoordinateBasis<T>;

    /// Primitive coordinate values of the committed geometry.
    fn primitive_values(&self) -> DVector<T>;

    /// Number of working coordinates.
    fn num_coordinates(&self) -> usize;

    /// Active constraint vectors as orthonormal columns in working coordinates.
    ///
    /// A matrix with zero columns, or with zero columns of values, means
    /// "no constraint".
    fn constraints(&self) -> &DMatrix<T>;

    /// Derives the constraint vectors for a problem type.
    ///
    /// `tangent` is the reaction-path tangent for modes that need one.
    fn constraint_vectors(
        &self,
        mode: ConstraintMode,
        tangent: Option<&DVector<T>>,
    ) -> Result<DMatrix<T>>;

    /// (Re)establishes the working basis given constraint vectors.
    ///
    /// Called once at the start of each run.
    fn update_coordinate_basis(&mut self, constraints: &DMatrix<T>) -> Result<()>;

    /// Primitive-coordinate displacement between two Cartesian geometries.
    fn calc_diff(&self, new_xyz: &DVector<T>, old_xyz: &DVector<T>) -> Result<DVector<T>>;

    /// Applies a working-coordinate displacement to the committed geometry,
    /// commits it and returns the new Cartesian positions.
    fn update_xyz(&mut self, dq: &DVector<T>) -> Result<DVector<T>>;

    /// Evaluates energy and working gradient at the committed geometry
    /// displaced by `dq`, without committing the displacement.
    fn evaluate_displacement(&mut self, dq: &DVector<T>) -> Result<(T, DVector<T>)>;

    /// Step contribution imposed by the constraints (e.g. climbing along a tangent).
    ///
    /// Defaults to no contribution.
    fn constraint_steps(&self, mode: ConstraintMode, gradient: &DVector<T>) -> Result<DVector<T>> {
        let _ = mode;
        Ok(DVector::zeros(gradient.len()))
    }

    /// Stores the RMS gradient computed by the optimizer for reporting.
    fn set_gradrms(&mut self, gradrms: T);

    /// Energy gap between electronic states, when the backend tracks one.
    fn difference_energy(&self) -> Option<T> {
        None
    }
}
