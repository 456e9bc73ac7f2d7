//! Bounded steps along a search direction.
//!
//! The step controller turns a raw primitive-space direction into a request
//! for the line search:
//!
//! 1. map the direction back to working coordinates (`d = Bᵀ d_prim`);
//! 2. normalize it, refusing numerically zero directions;
//! 3. propose the full direction norm as step length, capped at `DMAX`;
//! 4. fetch the constraint step contribution from the provider;
//! 5. hand everything to the line search and report its status.

use geomopt_core::{
    coordinates::{ConstraintMode, CoordinateBasis},
    error::{CoordinateError, OptimizerError, OptimizerResult, Result},
    line_search::{LineSearch, LineSearchParams, LineSearchRequest, LineSearchResult},
    provider::CostAndCoordinateProvider,
    types::{DVector, Scalar},
};
use log::{debug, error};

/// Normalized direction and proposed step length.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedStep<T: Scalar> {
    /// Unit direction in working coordinates
    pub unit_direction: DVector<T>,
    /// Norm of the unnormalized working-coordinate direction
    pub actual_step: T,
    /// Step length handed to the line search
    pub step: T,
    /// True when `actual_step` exceeded `DMAX`
    pub capped: bool,
}

/// Caps steps at `DMAX` and drives the line search.
#[derive(Debug, Clone, Copy)]
pub struct StepController<T: Scalar> {
    dmax: T,
    direction_epsilon: T,
}

impl<T: Scalar> StepController<T> {
    /// Creates a controller with maximum step `dmax`.
    pub fn new(dmax: T) -> Self {
        Self {
            dmax,
            direction_epsilon: T::DIRECTION_EPSILON,
        }
    }

    /// Sets the norm at or below which a direction is considered degenerate.
    pub fn with_direction_epsilon(mut self, epsilon: T) -> Self {
        self.direction_epsilon = epsilon;
        self
    }

    /// Maximum step length.
    pub fn dmax(&self) -> T {
        self.dmax
    }

    /// Maps `d_prim` to working coordinates, normalizes it and caps the step.
    pub fn propose(
        &self,
        d_prim: &DVector<T>,
        basis: &CoordinateBasis<T>,
    ) -> OptimizerResult<ProposedStep<T>> {
        let d = basis.to_working(d_prim)?;
        let actual_step = d.norm();
        debug!(" actual_step= {actual_step:.2}");

        // Written as a negated comparison so that NaN norms are refused too.
        if !(actual_step > self.direction_epsilon) {
            error!("search direction has norm {actual_step}, no descent is possible");
            return Err(OptimizerError::degenerate_direction(
                <T as Scalar>::try_to_f64(actual_step).unwrap_or(f64::NAN),
            ));
        }

        let unit_direction = d / actual_step;
        let capped = actual_step > self.dmax;
        let step = if capped { self.dmax } else { actual_step };

        Ok(ProposedStep {
            unit_direction,
            actual_step,
            step,
            capped,
        })
    }

    /// Step contribution imposed by the constraints of `mode`.
    pub fn constraint_steps<P>(
        &self,
        provider: &P,
        mode: ConstraintMode,
        gradient: &DVector<T>,
    ) -> Result<DVector<T>>
    where
        P: CostAndCoordinateProvider<T>,
    {
        let steps = provider.constraint_steps(mode, gradient)?;
        if steps.len() != gradient.len() {
            return Err(CoordinateError::dimension_mismatch(gradient.len(), steps.len()));
        }
        Ok(steps)
    }

    /// Runs the line search for `request`.
    ///
    /// A negative status is returned as is; deciding what to do with it is
    /// up to the caller.
    pub fn search<L, P>(
        &self,
        line_search: &mut L,
        request: &LineSearchRequest<'_, T>,
        params: &LineSearchParams<T>,
        provider: &mut P,
    ) -> Result<LineSearchResult<T>>
    where
        L: LineSearch<T>,
        P: CostAndCoordinateProvider<T>,
    {
        let result = line_search.search(request, params, provider)?;
        if result.is_failure() {
            error!(
                "{} line search failed with status {}",
                line_search.name(),
                result.status
            );
        } else {
            debug!(
                "{} line search accepted step {} after {} evaluation(s)",
                line_search.name(),
                result.step,
                result.function_evals
            );
        }
        Ok(result)
    }
}
