//! # geomopt
//!
//! Limited-memory BFGS geometry optimization in transformed coordinates.
//!
//! The optimizer steps in the working coordinates of a geometry backend
//! (Cartesian or delocalized internal coordinates), accumulates curvature in
//! primitive coordinates and projects constraint directions out of every
//! gradient. The backend is anything implementing
//! [`CostAndCoordinateProvider`](geomopt_core::provider::CostAndCoordinateProvider).
//!
//! ## Crates
//!
//! - [`geomopt_core`]: scalar trait, errors, coordinate bases, constraints,
//!   the provider interface, line searches and options
//! - [`geomopt_optim`]: the L-BFGS optimizer and its building blocks
//!
//! ## Example
//!
//! ```rust,no_run
//! use geomopt::prelude::*;
//!
//! # fn run<P: CostAndCoordinateProvider<f64>>(provider: &mut P) -> OptimizerResult<()> {
//! let mut optimizer = Lbfgs::with_default_line_search(
//!     OptimizerOptions::new().with_dmax(0.1).with_conv_grms(5e-4),
//! );
//! let settings = RunSettings::new()
//!     .with_max_steps(100)
//!     .with_history_capacity(10)
//!     .with_frame_rate(4);
//!
//! let outcome = optimizer.optimize(provider, &settings)?;
//! if let Some((geometries, energies)) = outcome.into_trajectory() {
//!     println!("{} frames, final energy {:?}", geometries.len(), energies.last());
//! }
//! # Ok(())
//! # }
//! ```

pub use geomopt_core;
pub use geomopt_optim;

// Re-export key dependencies
pub use nalgebra;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use geomopt_core::prelude::*;
    pub use geomopt_optim::{
        ConvergenceMonitor, Direction, DirectionComputer, HistoryBuffer, Lbfgs,
        LineSearchFailure, OptimizationOutcome, RunPhase, RunSummary, StepController,
        StepReport, Trajectory, TrajectoryFrame,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use approx::assert_relative_eq;
    use geomopt_core::test_utils::QuadraticSurface;

    #[test]
    fn test_prelude_runs_an_optimization() {
        let mut surface = QuadraticSurface::diagonal(&[1.0, 2.0], DVector::from_vec(vec![0.3, -0.2]));
        let mut optimizer = Lbfgs::with_default_line_search(OptimizerOptions::new());
        let outcome = optimizer
            .optimize(&mut surface, &RunSettings::new().with_max_steps(100))
            .unwrap();

        assert!(outcome.is_converged());
        let (geometries, energies) = outcome.into_trajectory().unwrap();
        assert_eq!(geometries.len(), energies.len());
        assert_relative_eq!(energies.last().copied().unwrap(), 0.0, epsilon = 1e-7);
    }
}
