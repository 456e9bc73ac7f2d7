//! Geometry optimization with limited-memory BFGS.
//!
//! This crate provides the L-BFGS optimizer of the workspace together with
//! the pieces it is assembled from, each usable on its own:
//!
//! - **History**: a fixed-capacity ring of curvature pairs
//! - **Direction**: the two-loop recursion over that ring
//! - **Step control**: mapping to working coordinates and capping at `DMAX`
//! - **Convergence**: RMS gradient monitoring over unconstrained coordinates
//! - **Trajectory**: geometry frames and per-step reports
//!
//! # Examples
//!
//! ```rust
//! use geomopt_core::prelude::*;
//! use geomopt_optim::{Lbfgs, HistoryBuffer, DirectionComputer};
//!
//! // Optimizer with a 0.2 step bound and the default backtracking search
//! let optimizer = Lbfgs::with_default_line_search(
//!     OptimizerOptions::<f64>::new().with_dmax(0.2),
//! );
//! assert_eq!(optimizer.name(), "L-BFGS");
//!
//! // Direction from an empty history is steepest descent
//! let mut history = HistoryBuffer::<f64>::new(10, 3);
//! let g = DVector::from_vec(vec![1.0, 0.0, -2.0]);
//! let direction = DirectionComputer::new().compute(&g, &mut history)?;
//! assert_eq!(direction.d_prim, -g);
//! # Ok::<(), CoordinateError>(())
//! ```

pub mod convergence;
pub mod direction;
pub mod history;
pub mod lbfgs;
pub mod step;
pub mod trajectory;

// Re-export main types for convenience
pub use convergence::{ConvergenceMonitor, RunPhase, StepCheck};
pub use direction::{Direction, DirectionComputer};
pub use history::{HistoryBuffer, IterationRecord};
pub use lbfgs::{Lbfgs, LineSearchFailure, OptimizationOutcome, RunSummary};
pub use step::{ProposedStep, StepController};
pub use trajectory::{StepReport, Trajectory, TrajectoryFrame};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exports() {
        let _history = HistoryBuffer::<f64>::new(3, 2);
        let _controller = StepController::new(0.1_f64);
        let _trajectory = Trajectory::<(), f64>::new(4);
        assert!(RunPhase::Converged.is_terminal());
    }
}
