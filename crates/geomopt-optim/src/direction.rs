//! Search direction from the L-BFGS two-loop recursion.
//!
//! Given the primitive gradient `g` and the curvature pairs `(sᵢ, yᵢ)` of the
//! history, the direction is `d = -H g` where `H` is the limited-memory
//! inverse Hessian approximation built on `H₀ = I`:
//!
//! ```text
//! q = -g
//! for i = newest … oldest:
//!     αᵢ = ρᵢ ⟨sᵢ, q⟩
//!     q  = q - αᵢ yᵢ
//! r = H₀ q
//! for i = oldest … newest:
//!     β = ρᵢ ⟨yᵢ, r⟩
//!     r = r + (αᵢ - β) sᵢ
//! d = r
//! ```
//!
//! with `ρᵢ = 1 / ⟨yᵢ, sᵢ⟩`. Pairs whose curvature `⟨yᵢ, sᵢ⟩` is not safely
//! positive would make `H` indefinite; they are skipped individually and the
//! remaining pairs still contribute.

use crate::history::HistoryBuffer;
use geomopt_core::{
    error::{CoordinateError, Result},
    types::{DVector, Scalar},
};
use log::debug;

/// Direction produced by the [`DirectionComputer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Direction<T: Scalar> {
    /// Direction in primitive coordinates
    pub d_prim: DVector<T>,
    /// Number of curvature pairs that contributed
    pub used_pairs: usize,
    /// Number of pairs skipped for degenerate curvature
    pub skipped_pairs: usize,
}

impl<T: Scalar> Direction<T> {
    /// True when no pair contributed, i.e. the direction is `-g`.
    pub fn is_steepest_descent(&self) -> bool {
        self.used_pairs == 0
    }
}

/// Two-loop L-BFGS recursion over a [`HistoryBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct DirectionComputer<T: Scalar> {
    curvature_epsilon: T,
}

impl<T: Scalar> Default for DirectionComputer<T> {
    fn default() -> Self {
        Self {
            curvature_epsilon: T::CURVATURE_EPSILON,
        }
    }
}

impl<T: Scalar> DirectionComputer<T> {
    /// Creates a direction computer with the default curvature threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the threshold at or below which `⟨y, s⟩` counts as degenerate.
    pub fn with_curvature_epsilon(mut self, epsilon: T) -> Self {
        self.curvature_epsilon = epsilon;
        self
    }

    /// Curvature threshold in use.
    pub fn curvature_epsilon(&self) -> T {
        self.curvature_epsilon
    }

    /// Computes the search direction for the primitive gradient `g_prim`.
    ///
    /// With an empty history the result is exactly `-g_prim`. The `alpha`
    /// fields of the history records are used as scratch space.
    pub fn compute(
        &self,
        g_prim: &DVector<T>,
        history: &mut HistoryBuffer<T>,
    ) -> Result<Direction<T>> {
        if history.is_empty() {
            return Ok(Direction {
                d_prim: -g_prim,
                used_pairs: 0,
                skipped_pairs: 0,
            });
        }
        if g_prim.len() != history.dim() {
            return Err(CoordinateError::dimension_mismatch(history.dim(), g_prim.len()));
        }

        let bound = history.bound();
        let mut records = history.chronological_mut(bound);
        let rho: Vec<Option<T>> = records
            .iter()
            .map(|r| {
                let ys = r.grad_diff.dot(&r.step);
                (ys > self.curvature_epsilon).then(|| T::one() / ys)
            })
            .collect();

        let skipped_pairs = rho.iter().filter(|r| r.is_none()).count();
        if skipped_pairs > 0 {
            debug!("L-BFGS: skipping {skipped_pairs} of {bound} pair(s) with non-positive curvature");
        }

        let mut q = -g_prim;

        for (record, rho) in records.iter_mut().zip(&rho).rev() {
            record.alpha = match rho {
                Some(rho) => {
                    let alpha = *rho * record.step.dot(&q);
                    q.axpy(-alpha, &record.grad_diff, T::one());
                    alpha
                }
                None => T::zero(),
            };
        }

        for (record, rho) in records.iter().zip(&rho) {
            if let Some(rho) = rho {
                let beta = *rho * record.grad_diff.dot(&q);
                q.axpy(record.alpha - beta, &record.step, T::one());
            }
        }

        Ok(Direction {
            d_prim: q,
            used_pairs: bound - skipped_pairs,
            skipped_pairs,
        })
    }
}
