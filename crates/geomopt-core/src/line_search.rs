//! Line search algorithms for geometry optimization.
//!
//! A line search receives the current point, a unit search direction and a
//! proposed step length, and returns an accepted point together with its
//! energy and gradient. The optimizer treats it as a black box with a status
//! contract:
//!
//! - `status >= 0`: a point was accepted;
//! - `status < 0`: no acceptable point was found, the optimizer must fall
//!   back to the previous point and stop.
//!
//! # Trial points
//!
//! Trial points are generated in working coordinates as
//!
//! ```text
//! x(α) = x_prev + α d + c
//! ```
//!
//! where `d` is the unit direction and `c` the constraint step contribution.
//! They are evaluated through
//! [`CostAndCoordinateProvider::evaluate_displacement`], so the committed
//! geometry of the provider is never modified by a line search.
//!
//! # Algorithm Variants
//!
//! ## Backtracking
//! Tests sufficient decrease (Armijo) and the strong Wolfe curvature window,
//! shrinking the step when the energy rises or the curvature overshoots and
//! expanding it when the step is too timid. The trial budget is deliberately
//! small: geometry optimizations pay for every energy evaluation.
//!
//! ## No line search
//! Takes the proposed step as is. Useful when the step bound alone is trusted
//! to keep the optimization stable.

use crate::{
    error::{CoordinateError, Result},
    provider::CostAndCoordinateProvider,
    types::{DVector, Scalar},
};
use log::{debug, warn};
use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Status reported by a line search that accepted a point.
pub const LINE_SEARCH_SUCCESS: i32 = 0;

/// Status reported by a line search that could not accept a point.
pub const LINE_SEARCH_FAILURE: i32 = -1;

/// Result of a line search.
#[derive(Debug, Clone)]
pub struct LineSearchResult<T>
where
    T: Scalar,
{
    /// Negative on failure, non-negative on success
    pub status: i32,

    /// Accepted step length along the unit direction
    pub step: T,

    /// Accepted point in working coordinates
    pub x: DVector<T>,

    /// Energy at the accepted point
    pub fx: T,

    /// Working-coordinate gradient at the accepted point (not constraint-projected)
    pub gradient: DVector<T>,

    /// Number of energy/gradient evaluations performed
    pub function_evals: usize,
}

impl<T: Scalar> LineSearchResult<T> {
    /// True if the line search reported failure.
    pub fn is_failure(&self) -> bool {
        self.status < 0
    }

    /// A failed result that echoes the starting point back to the caller.
    fn failed(request: &LineSearchRequest<'_, T>, step: T, function_evals: usize) -> Self {
        Self {
            status: LINE_SEARCH_FAILURE,
            step,
            x: request.x.clone(),
            fx: request.fx,
            gradient: request.gradient.clone(),
            function_evals,
        }
    }
}

/// Parameters for line search algorithms.
///
/// # Parameter Guidelines
///
/// - **c1** (`ftol`): sufficient decrease constant, typically 10⁻⁴
/// - **c2** (`wolfe`): curvature constant, typically 0.9
/// - **rho**: shrink factor applied when a test fails, in (0, 1)
/// - **expansion**: growth factor applied when the step is too short, > 1
///
/// ```rust
/// # use geomopt_core::line_search::LineSearchParams;
/// let params = LineSearchParams::<f64>::default().with_max_iterations(5);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct LineSearchParams<T>
where
    T: Scalar,
{
    /// Minimum step size before declaring line search failure
    pub min_step_size: T,

    /// Maximum step size before declaring line search failure
    pub max_step_size: T,

    /// Maximum number of trial points
    pub max_iterations: usize,

    /// Armijo parameter c₁ ∈ (0,1) for the sufficient decrease condition
    /// f(x + αd) ≤ f(x) + c₁α⟨g, d⟩
    pub c1: T,

    /// Wolfe parameter c₂ ∈ (c₁,1) for the curvature condition
    /// |⟨g(x + αd), d⟩| ≤ c₂|⟨g, d⟩|
    pub c2: T,

    /// Reduction factor ρ ∈ (0,1)
    pub rho: T,

    /// Expansion factor (> 1) used when the curvature condition says the step is too short
    pub expansion: T,
}

impl<T> Default for LineSearchParams<T>
where
    T: Scalar,
{
    fn default() -> Self {
        Self {
            min_step_size: T::MIN_STEP_SIZE,
            max_step_size: T::MAX_STEP_SIZE,
            max_iterations: 3,
            c1: <T as Scalar>::from_f64(1e-4),
            c2: <T as Scalar>::from_f64(0.9),
            rho: <T as Scalar>::from_f64(0.5),
            expansion: <T as Scalar>::from_f64(2.1),
        }
    }
}

impl<T> LineSearchParams<T>
where
    T: Scalar,
{
    /// Sets the trial budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the Armijo and Wolfe constants.
    pub fn with_wolfe_constants(mut self, c1: T, c2: T) -> Self {
        self.c1 = c1;
        self.c2 = c2;
        self
    }

    /// Sets the admissible step window.
    pub fn with_step_bounds(mut self, min_step_size: T, max_step_size: T) -> Self {
        self.min_step_size = min_step_size;
        self.max_step_size = max_step_size;
        self
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns `CoordinateError::NumericalError` if:
    /// - step bounds are not positive and ordered
    /// - Wolfe constants don't satisfy 0 < c₁ < c₂ < 1
    /// - ρ ∉ (0, 1) or the expansion factor is not above one
    /// - the trial budget is zero
    pub fn validate(&self) -> Result<()> {
        if self.min_step_size <= T::zero() {
            return Err(CoordinateError::numerical_error(
                "Minimum step size must be positive",
            ));
        }

        if self.max_step_size <= self.min_step_size {
            return Err(CoordinateError::numerical_error(
                "Maximum step size must be greater than minimum step size",
            ));
        }

        if self.c1 <= T::zero() || self.c1 >= T::one() {
            return Err(CoordinateError::numerical_error(
                "Armijo constant c1 must be in (0, 1)",
            ));
        }

        if self.c2 <= self.c1 || self.c2 >= T::one() {
            return Err(CoordinateError::numerical_error(
                "Wolfe constant c2 must satisfy c1 < c2 < 1",
            ));
        }

        if self.rho <= T::zero() || self.rho >= T::one() {
            return Err(CoordinateError::numerical_error(
                "Reduction factor rho must be in (0, 1)",
            ));
        }

        if self.expansion <= T::one() {
            return Err(CoordinateError::numerical_error(
                "Expansion factor must be greater than 1",
            ));
        }

        if self.max_iterations == 0 {
            return Err(CoordinateError::numerical_error(
                "Maximum iterations must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Everything a line search needs to know about the current iterate.
#[derive(Debug, Clone)]
pub struct LineSearchRequest<'a, T>
where
    T: Scalar,
{
    /// Number of active constraints
    pub num_constraints: usize,
    /// Current point in working coordinates
    pub x: &'a DVector<T>,
    /// Current energy
    pub fx: T,
    /// Current constraint-projected gradient
    pub gradient: &'a DVector<T>,
    /// Unit search direction in working coordinates
    pub direction: &'a DVector<T>,
    /// Proposed (already capped) step length
    pub step: T,
    /// Previous accepted point
    pub prev_x: &'a DVector<T>,
    /// Previous constraint-projected gradient
    pub prev_gradient: &'a DVector<T>,
    /// Step contribution imposed by the constraints
    pub constraint_steps: &'a DVector<T>,
}

impl<T: Scalar> LineSearchRequest<'_, T> {
    /// Trial point `x_prev + step d + c`.
    pub fn trial_point(&self, step: T) -> DVector<T> {
        let mut x = self.prev_x + self.constraint_steps;
        x.axpy(step, self.direction, T::one());
        x
    }

    /// Directional derivative `⟨g, d⟩` at the current point.
    pub fn directional_derivative(&self) -> T {
        self.gradient.dot(self.direction)
    }
}

/// Interface for line search algorithms.
pub trait LineSearch<T>: Debug
where
    T: Scalar,
{
    /// Searches along `request.direction` for an acceptable point.
    ///
    /// Errors are reserved for provider failures; an unacceptable search is
    /// reported through a negative `status`.
    fn search<P>(
        &mut self,
        request: &LineSearchRequest<'_, T>,
        params: &LineSearchParams<T>,
        provider: &mut P,
    ) -> Result<LineSearchResult<T>>
    where
        P: CostAndCoordinateProvider<T>;

    /// Returns the name of this line search method.
    fn name(&self) -> &str;
}

/// Backtracking line search with an expanding strong Wolfe window.
///
/// Each trial `α` is classified as:
///
/// - energy above the Armijo line → shrink by `rho`;
/// - ⟨g(α), d⟩ < c₂⟨g, d⟩ (still steeply descending) → expand by `expansion`;
/// - ⟨g(α), d⟩ > -c₂⟨g, d⟩ (overshot the minimum) → shrink by `rho`;
/// - otherwise → accept.
///
/// When the trial budget runs out the last trial is accepted with a
/// non-negative status.
#[derive(Debug, Clone, Copy, Default)]
pub struct Backtracking;

impl Backtracking {
    /// Creates a new backtracking line search.
    pub fn new() -> Self {
        Self
    }
}

impl<T> LineSearch<T> for Backtracking
where
    T: Scalar,
{
    fn search<P>(
        &mut self,
        request: &LineSearchRequest<'_, T>,
        params: &LineSearchParams<T>,
        provider: &mut P,
    ) -> Result<LineSearchResult<T>>
    where
        P: CostAndCoordinateProvider<T>,
    {
        params.validate()?;

        let dginit = request.directional_derivative();
        if dginit > T::zero() {
            warn!("line search: direction is not a descent direction (g·d = {dginit})");
            return Ok(LineSearchResult::failed(request, request.step, 0));
        }

        let finit = request.fx;
        let dgtest = params.c1 * dginit;
        let mut step = request.step;
        let mut count = 0;

        loop {
            let x = request.trial_point(step);
            let dq = &x - request.x;
            let (fx, gradient) = provider.evaluate_displacement(&dq)?;
            count += 1;

            let width = if fx > finit + step * dgtest {
                params.rho
            } else {
                let dg = gradient.dot(request.direction);
                if dg < params.c2 * dginit {
                    params.expansion
                } else if dg > -params.c2 * dginit {
                    params.rho
                } else {
                    debug!("line search: accepted step {step} after {count} trial(s)");
                    return Ok(LineSearchResult {
                        status: LINE_SEARCH_SUCCESS,
                        step,
                        x,
                        fx,
                        gradient,
                        function_evals: count,
                    });
                }
            };

            if step < params.min_step_size {
                warn!("line search: step {step} fell below the minimum step size");
                return Ok(LineSearchResult::failed(request, step, count));
            }
            if step > params.max_step_size {
                warn!("line search: step {step} exceeded the maximum step size");
                return Ok(LineSearchResult::failed(request, step, count));
            }
            if count >= params.max_iterations {
                debug!("line search: trial budget exhausted, keeping step {step}");
                return Ok(LineSearchResult {
                    status: LINE_SEARCH_SUCCESS,
                    step,
                    x,
                    fx,
                    gradient,
                    function_evals: count,
                });
            }

            step *= width;
        }
    }

    fn name(&self) -> &str {
        "Backtracking"
    }
}

/// Takes the proposed step without any acceptance test.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLineSearch;

impl NoLineSearch {
    /// Creates a new pass-through line search.
    pub fn new() -> Self {
        Self
    }
}

impl<T> LineSearch<T> for NoLineSearch
where
    T: Scalar,
{
    fn search<P>(
        &mut self,
        request: &LineSearchRequest<'_, T>,
        _params: &LineSearchParams<T>,
        provider: &mut P,
    ) -> Result<LineSearchResult<T>>
    where
        P: CostAndCoordinateProvider<T>,
    {
        let x = request.trial_point(request.step);
        let dq = &x - request.x;
        let (fx, gradient) = provider.evaluate_displacement(&dq)?;

        Ok(LineSearchResult {
            status: LINE_SEARCH_SUCCESS,
            step: request.step,
            x,
            fx,
            gradient,
            function_evals: 1,
        })
    }

    fn name(&self) -> &str {
        "No line search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::QuadraticSurface;
    use approx::assert_relative_eq;

    fn request_for<'a>(
        x: &'a DVector<f64>,
        fx: f64,
        gradient: &'a DVector<f64>,
        direction: &'a DVector<f64>,
        step: f64,
        zeros: &'a DVector<f64>,
    ) -> LineSearchRequest<'a, f64> {
        LineSearchRequest {
            num_constraints: 0,
            x,
            fx,
            gradient,
            direction,
            step,
            prev_x: x,
            prev_gradient: gradient,
            constraint_steps: zeros,
        }
    }

    #[test]
    fn test_backtracking_accepts_exact_minimizer() {
        // f = x², start at 1, unit direction -1, step 1 lands on the minimum.
        let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![1.0]));
        let x = surface.x_current();
        let g = surface.gradient_at_current();
        let d = DVector::from_vec(vec![-1.0]);
        let zeros = DVector::zeros(1);
        let request = request_for(&x, surface.energy_at_current(), &g, &d, 1.0, &zeros);

        let result = Backtracking::new()
            .search(&request, &LineSearchParams::default(), &mut surface)
            .unwrap();

        assert!(!result.is_failure());
        assert_eq!(result.function_evals, 1);
        assert_relative_eq!(result.x[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(result.fx, 0.0, epsilon = 1e-12);
        // Trial evaluations never commit the geometry.
        assert_relative_eq!(surface.x_current()[0], 1.0);
    }

    #[test]
    fn test_backtracking_shrinks_overlong_step() {
        let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![1.0]));
        let x = surface.x_current();
        let g = surface.gradient_at_current();
        let d = DVector::from_vec(vec![-1.0]);
        let zeros = DVector::zeros(1);
        // Step 3 overshoots to -2 (f = 4 > 1), the halved step 1.5 lands at -0.5.
        let request = request_for(&x, surface.energy_at_current(), &g, &d, 3.0, &zeros);

        let result = Backtracking::new()
            .search(&request, &LineSearchParams::default(), &mut surface)
            .unwrap();

        assert!(!result.is_failure());
        assert_relative_eq!(result.step, 1.5);
        assert!(result.fx < 1.0);
    }

    #[test]
    fn test_backtracking_rejects_ascent_direction() {
        let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![1.0, 0.0]));
        let x = surface.x_current();
        let g = surface.gradient_at_current();
        let d = DVector::from_vec(vec![1.0, 0.0]);
        let zeros = DVector::zeros(2);
        let request = request_for(&x, surface.energy_at_current(), &g, &d, 0.1, &zeros);

        let result = Backtracking::new()
            .search(&request, &LineSearchParams::default(), &mut surface)
            .unwrap();

        assert_eq!(result.status, LINE_SEARCH_FAILURE);
        assert_eq!(result.function_evals, 0);
        assert_eq!(result.x, x);
    }

    #[test]
    fn test_backtracking_fails_below_minimum_step() {
        let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![1.0]));
        let x = surface.x_current();
        let g = surface.gradient_at_current();
        let d = DVector::from_vec(vec![-1.0]);
        let zeros = DVector::zeros(1);
        let request = request_for(&x, surface.energy_at_current(), &g, &d, 5.0, &zeros);
        let params = LineSearchParams::default().with_step_bounds(4.0, 100.0);

        let result = Backtracking::new()
            .search(&request, &params, &mut surface)
            .unwrap();

        // 5.0 overshoots, shrinking would leave the window at the next trial.
        assert!(result.is_failure());
    }

    #[test]
    fn test_backtracking_fails_above_maximum_step() {
        // Far from the minimum every trial still satisfies Armijo but keeps a
        // steep slope, so the step expands 0.1, 0.21, 0.441, 0.9261.
        let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![10.0]));
        let x = surface.x_current();
        let g = surface.gradient_at_current();
        let d = DVector::from_vec(vec![-1.0]);
        let zeros = DVector::zeros(1);
        let request = request_for(&x, surface.energy_at_current(), &g, &d, 0.1, &zeros);
        let params = LineSearchParams::default()
            .with_step_bounds(1e-20, 0.5)
            .with_max_iterations(10);

        let result = Backtracking::new()
            .search(&request, &params, &mut surface)
            .unwrap();

        assert_eq!(result.status, LINE_SEARCH_FAILURE);
        assert_eq!(result.function_evals, 4);
        assert_relative_eq!(result.step, 0.9261, epsilon = 1e-12);
        assert_eq!(result.x, x);
        assert_relative_eq!(result.fx, 100.0);
    }

    #[test]
    fn test_no_line_search_takes_full_step() {
        let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![2.0]));
        let x = surface.x_current();
        let g = surface.gradient_at_current();
        let d = DVector::from_vec(vec![-1.0]);
        let zeros = DVector::zeros(1);
        let request = request_for(&x, surface.energy_at_current(), &g, &d, 0.5, &zeros);

        let result = NoLineSearch::new()
            .search(&request, &LineSearchParams::default(), &mut surface)
            .unwrap();

        assert_eq!(result.status, LINE_SEARCH_SUCCESS);
        assert_relative_eq!(result.x[0], 1.5);
        assert_relative_eq!(result.fx, 2.25);
    }

    #[test]
    fn test_line_search_params() {
        let params = LineSearchParams::<f64>::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.max_iterations, 3);

        let bad = LineSearchParams::<f64>::default().with_wolfe_constants(0.9, 0.5);
        assert!(bad.validate().is_err());

        let bad = LineSearchParams::<f64>::default().with_max_iterations(0);
        assert!(bad.validate().is_err());

        let bad = LineSearchParams::<f64> {
            expansion: 0.8,
            ..LineSearchParams::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_trial_point_includes_constraint_step() {
        let x = DVector::from_vec(vec![0.0, 0.0]);
        let g = DVector::from_vec(vec![1.0, 0.0]);
        let d = DVector::from_vec(vec![-1.0, 0.0]);
        let c = DVector::from_vec(vec![0.0, 0.25]);
        let request = request_for(&x, 0.0, &g, &d, 0.5, &c);
        assert_eq!(request.trial_point(0.5), DVector::from_vec(vec![-0.5, 0.25]));
        assert_relative_eq!(request.directional_derivative(), -1.0);
    }
}
