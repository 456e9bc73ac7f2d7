//! Mock coordinate providers and line searches for tests and benchmarks.

#![cfg(any(test, feature = "test-utils"))]

use crate::{
    coordinates::{ConstraintMode, CoordinateBasis},
    error::{CoordinateError, Result},
    line_search::{
        Backtracking, LineSearch, LineSearchParams, LineSearchRequest, LineSearchResult,
    },
    provider::CostAndCoordinateProvider,
    types::{DMatrix, DVector},
};

/// Quadratic energy surface `E(xyz) = ½ xyzᵀ H xyz` with an optional working basis.
///
/// Cartesian positions double as primitive coordinates, so `calc_diff` is a
/// plain difference. With a [`CoordinateBasis::Matrix`] basis `B`, working
/// coordinates are `Bᵀ xyz` and displacements map back as `B dq`.
#[derive(Debug, Clone)]
pub struct QuadraticSurface {
    hessian: DMatrix<f64>,
    xyz: DVector<f64>,
    basis: CoordinateBasis<f64>,
    constraints: DMatrix<f64>,
    energy: f64,
    gradient: DVector<f64>,
    /// Last RMS gradient written back by the optimizer
    pub gradrms: Option<f64>,
    /// Number of energy/gradient evaluations after construction
    pub evaluations: usize,
    /// Number of committed displacements
    pub commits: usize,
}

impl QuadraticSurface {
    /// Surface with Hessian `hessian` starting at `xyz`, Cartesian basis.
    pub fn new(hessian: DMatrix<f64>, xyz: DVector<f64>) -> Self {
        let n = xyz.len();
        let mut surface = Self {
            hessian,
            xyz,
            basis: CoordinateBasis::Identity,
            constraints: DMatrix::zeros(n, 0),
            energy: 0.0,
            gradient: DVector::zeros(n),
            gradrms: None,
            evaluations: 0,
            commits: 0,
        };
        let (energy, gradient) = surface.evaluate(&surface.xyz.clone());
        surface.energy = energy;
        surface.gradient = gradient;
        surface
    }

    /// `E = xyzᵀ xyz` (Hessian `2I`).
    pub fn isotropic(xyz: DVector<f64>) -> Self {
        let n = xyz.len();
        Self::new(DMatrix::identity(n, n) * 2.0, xyz)
    }

    /// Diagonal Hessian with the given curvatures.
    pub fn diagonal(curvatures: &[f64], xyz: DVector<f64>) -> Self {
        Self::new(
            DMatrix::from_diagonal(&DVector::from_column_slice(curvatures)),
            xyz,
        )
    }

    /// Replaces the working basis; `basis` must have orthonormal columns.
    pub fn with_basis(mut self, basis: DMatrix<f64>) -> Self {
        let n = basis.ncols();
        self.basis = CoordinateBasis::Matrix(basis);
        self.constraints = DMatrix::zeros(n, 0);
        let (energy, gradient) = self.evaluate(&self.xyz.clone());
        self.energy = energy;
        self.gradient = gradient;
        self
    }

    /// Committed point in working coordinates.
    pub fn x_current(&self) -> DVector<f64> {
        self.coordinates()
    }

    /// Energy of the most recent evaluation.
    pub fn energy_at_current(&self) -> f64 {
        self.energy
    }

    /// Working gradient of the most recent evaluation.
    pub fn gradient_at_current(&self) -> DVector<f64> {
        self.gradient.clone()
    }

    fn evaluate(&self, xyz: &DVector<f64>) -> (f64, DVector<f64>) {
        let hx = &self.hessian * xyz;
        let energy = 0.5 * xyz.dot(&hx);
        let gradient = match &self.basis {
            CoordinateBasis::Identity => hx,
            CoordinateBasis::Matrix(b) => b.tr_mul(&hx),
        };
        (energy, gradient)
    }

    fn displaced(&self, dq: &DVector<f64>) -> Result<DVector<f64>> {
        let delta = self.basis.to_primitive(dq)?;
        if delta.len() != self.xyz.len() {
            return Err(CoordinateError::dimension_mismatch(self.xyz.len(), delta.len()));
        }
        Ok(&self.xyz + delta)
    }
}

impl CostAndCoordinateProvider<f64> for QuadraticSurface {
    type Geometry = DVector<f64>;

    fn energy(&self) -> f64 {
        self.energy
    }

    fn gradient(&self) -> DVector<f64> {
        self.gradient.clone()
    }

    fn geometry(&self) -> DVector<f64> {
        self.xyz.clone()
    }

    fn xyz(&self) -> DVector<f64> {
        self.xyz.clone()
    }

    fn coordinates(&self) -> DVector<f64> {
        match &self.basis {
            CoordinateBasis::Identity => self.xyz.clone(),
            CoordinateBasis::Matrix(b) => b.tr_mul(&self.xyz),
        }
    }

    fn coord_basis(&self) -> &CoordinateBasis<f64> {
        &self.basis
    }

    fn primitive_values(&self) -> DVector<f64> {
        self.xyz.clone()
    }

    fn num_coordinates(&self) -> usize {
        match &self.basis {
            CoordinateBasis::Identity => self.xyz.len(),
            CoordinateBasis::Matrix(b) => b.ncols(),
        }
    }

    fn constraints(&self) -> &DMatrix<f64> {
        &self.constraints
    }

    fn constraint_vectors(
        &self,
        mode: ConstraintMode,
        tangent: Option<&DVector<f64>>,
    ) -> Result<DMatrix<f64>> {
        let n = self.num_coordinates();
        match (mode, tangent) {
            (ConstraintMode::Unconstrained, _) => Ok(DMatrix::zeros(n, 0)),
            (ConstraintMode::Ictan | ConstraintMode::Climb, Some(t)) => {
                if t.len() != n {
                    return Err(CoordinateError::dimension_mismatch(n, t.len()));
                }
                let norm = t.norm();
                if norm <= f64::EPSILON {
                    return Err(CoordinateError::numerical_error("tangent has zero norm"));
                }
                Ok(DMatrix::from_columns(&[t / norm]))
            }
            (mode, _) => Err(CoordinateError::not_implemented(format!(
                "{mode} constraints on a quadratic surface"
            ))),
        }
    }

    fn update_coordinate_basis(&mut self, constraints: &DMatrix<f64>) -> Result<()> {
        if constraints.ncols() > 0 && constraints.nrows() != self.num_coordinates() {
            return Err(CoordinateError::dimension_mismatch(
                self.num_coordinates(),
                constraints.nrows(),
            ));
        }
        self.constraints = constraints.clone();
        Ok(())
    }

    fn calc_diff(&self, new_xyz: &DVector<f64>, old_xyz: &DVector<f64>) -> Result<DVector<f64>> {
        if new_xyz.len() != old_xyz.len() {
            return Err(CoordinateError::dimension_mismatch(old_xyz.len(), new_xyz.len()));
        }
        Ok(new_xyz - old_xyz)
    }

    fn update_xyz(&mut self, dq: &DVector<f64>) -> Result<DVector<f64>> {
        let xyz = self.displaced(dq)?;
        let (energy, gradient) = self.evaluate(&xyz);
        self.xyz = xyz;
        self.energy = energy;
        self.gradient = gradient;
        self.commits += 1;
        Ok(self.xyz.clone())
    }

    fn evaluate_displacement(&mut self, dq: &DVector<f64>) -> Result<(f64, DVector<f64>)> {
        let xyz = self.displaced(dq)?;
        let (energy, gradient) = self.evaluate(&xyz);
        self.energy = energy;
        self.gradient = gradient.clone();
        self.evaluations += 1;
        Ok((energy, gradient))
    }

    fn set_gradrms(&mut self, gradrms: f64) {
        self.gradrms = Some(gradrms);
    }
}

/// Line search that counts its invocations and delegates to another one.
#[derive(Debug, Clone, Default)]
pub struct CountingLineSearch<L> {
    inner: L,
    /// Number of `search` calls so far
    pub calls: usize,
}

impl<L> CountingLineSearch<L> {
    /// Wraps `inner`.
    pub fn new(inner: L) -> Self {
        Self { inner, calls: 0 }
    }
}

impl<L: LineSearch<f64>> LineSearch<f64> for CountingLineSearch<L> {
    fn search<P>(
        &mut self,
        request: &LineSearchRequest<'_, f64>,
        params: &LineSearchParams<f64>,
        provider: &mut P,
    ) -> Result<LineSearchResult<f64>>
    where
        P: CostAndCoordinateProvider<f64>,
    {
        self.calls += 1;
        self.inner.search(request, params, provider)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Backtracking line search that reports `status` on its `fail_on_call`-th call (1-based).
///
/// The failing call still evaluates a trial point so that tests can check
/// the optimizer does not keep it.
#[derive(Debug, Clone)]
pub struct FailingLineSearch {
    /// Call on which failure is reported
    pub fail_on_call: usize,
    /// Status reported on failure
    pub status: i32,
    /// Number of `search` calls so far
    pub calls: usize,
}

impl FailingLineSearch {
    /// Fails with status `-1` on call `fail_on_call`.
    pub fn new(fail_on_call: usize) -> Self {
        Self {
            fail_on_call,
            status: -1,
            calls: 0,
        }
    }
}

impl LineSearch<f64> for FailingLineSearch {
    fn search<P>(
        &mut self,
        request: &LineSearchRequest<'_, f64>,
        params: &LineSearchParams<f64>,
        provider: &mut P,
    ) -> Result<LineSearchResult<f64>>
    where
        P: CostAndCoordinateProvider<f64>,
    {
        self.calls += 1;
        let mut result = Backtracking::new().search(request, params, provider)?;
        if self.calls == self.fail_on_call {
            result.status = self.status;
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Failing"
    }
}
