//! Convergence monitoring and run phases.
//!
//! A run moves through the phases
//!
//! ```text
//! Initializing ──► Iterating ──► Converged
//!        │             ├──────► Exhausted
//!        │             └──────► Failed
//!        └──────────────────────► Converged   (already below threshold)
//! ```
//!
//! Convergence is checked on the RMS of the constraint-projected gradient,
//! normalized by the number of unconstrained coordinates.

use geomopt_core::{
    coordinates::rms_gradient,
    types::{DVector, Scalar},
};
use std::fmt;

/// Phase of an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunPhase {
    /// Constraints and the initial gradient are being set up
    Initializing,
    /// Steps are being taken
    Iterating,
    /// RMS gradient fell below the threshold
    Converged,
    /// The line search reported failure
    Failed,
    /// The step budget ran out
    Exhausted,
}

impl RunPhase {
    /// True for phases a run ends in.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Converged | Self::Failed | Self::Exhausted)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Iterating => "iterating",
            Self::Converged => "converged",
            Self::Failed => "failed",
            Self::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// Outcome of the checks after an accepted step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepCheck<T: Scalar> {
    /// RMS of the projected gradient at the new point
    pub gradrms: T,
    /// `fx - fxp`
    pub energy_change: T,
    /// Phase after the step
    pub phase: RunPhase,
}

/// Tracks the RMS gradient and the step budget of a run.
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor<T: Scalar> {
    conv_grms: T,
    max_steps: usize,
    num_free: usize,
    phase: RunPhase,
    gradrms: Option<T>,
}

impl<T: Scalar> ConvergenceMonitor<T> {
    /// Monitor with RMS threshold `conv_grms`, `max_steps` steps and
    /// `num_free` unconstrained coordinates.
    pub fn new(conv_grms: T, max_steps: usize, num_free: usize) -> Self {
        Self {
            conv_grms,
            max_steps,
            num_free,
            phase: RunPhase::Initializing,
            gradrms: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Last RMS gradient seen, if any.
    pub fn gradrms(&self) -> Option<T> {
        self.gradrms
    }

    /// Number of unconstrained coordinates.
    pub fn num_free(&self) -> usize {
        self.num_free
    }

    /// RMS gradient threshold.
    pub fn conv_grms(&self) -> T {
        self.conv_grms
    }

    /// RMS of `gc` over the unconstrained coordinates.
    pub fn rms(&self, gc: &DVector<T>) -> T {
        rms_gradient(gc, self.num_free)
    }

    /// Checks the starting point, moving to `Converged` or `Iterating`.
    pub fn check_initial(&mut self, gc: &DVector<T>) -> T {
        let gradrms = self.rms(gc);
        self.gradrms = Some(gradrms);
        self.phase = if gradrms < self.conv_grms {
            RunPhase::Converged
        } else {
            RunPhase::Iterating
        };
        gradrms
    }

    /// Checks the point accepted at 1-based step `step_number`.
    ///
    /// Convergence takes precedence over exhaustion of the step budget.
    pub fn after_step(&mut self, step_number: usize, gc: &DVector<T>, fx: T, fxp: T) -> StepCheck<T> {
        let gradrms = self.rms(gc);
        self.gradrms = Some(gradrms);
        self.phase = if gradrms < self.conv_grms {
            RunPhase::Converged
        } else if step_number >= self.max_steps {
            RunPhase::Exhausted
        } else {
            RunPhase::Iterating
        };
        StepCheck {
            gradrms,
            energy_change: fx - fxp,
            phase: self.phase,
        }
    }

    /// Marks the run as failed.
    pub fn mark_failed(&mut self) {
        self.phase = RunPhase::Failed;
    }

    /// Marks the run as exhausted without a step having been taken.
    pub fn mark_exhausted(&mut self) {
        self.phase = RunPhase::Exhausted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_initial_check_below_threshold_converges() {
        let mut monitor = ConvergenceMonitor::new(1e-4, 10, 2);
        let gradrms = monitor.check_initial(&DVector::from_vec(vec![1e-6, 0.0]));
        assert!(gradrms < 1e-4);
        assert_eq!(monitor.phase(), RunPhase::Converged);
        assert!(monitor.phase().is_terminal());
    }

    #[test]
    fn test_initial_check_above_threshold_iterates() {
        let mut monitor = ConvergenceMonitor::new(1e-4, 10, 2);
        monitor.check_initial(&DVector::from_vec(vec![1.0, 0.0]));
        assert_eq!(monitor.phase(), RunPhase::Iterating);
        assert!(!monitor.phase().is_terminal());
    }

    #[test]
    fn test_rms_uses_free_coordinates() {
        // Three coordinates, one constrained: sqrt(8 / 2) = 2.
        let monitor = ConvergenceMonitor::new(1e-4, 10, 2);
        let gradrms = monitor.rms(&DVector::from_vec(vec![2.0, 2.0, 0.0]));
        assert_relative_eq!(gradrms, 2.0);
    }

    #[test]
    fn test_convergence_beats_exhaustion() {
        let mut monitor = ConvergenceMonitor::new(1e-4, 3, 1);
        let check = monitor.after_step(3, &DVector::from_vec(vec![0.0]), -1.0, -0.5);
        assert_eq!(check.phase, RunPhase::Converged);
        assert_relative_eq!(check.energy_change, -0.5);
    }

    #[test]
    fn test_budget_exhaustion() {
        let mut monitor = ConvergenceMonitor::new(1e-4, 3, 1);
        let g = DVector::from_vec(vec![1.0]);
        assert_eq!(monitor.after_step(2, &g, 0.0, 0.0).phase, RunPhase::Iterating);
        assert_eq!(monitor.after_step(3, &g, 0.0, 0.0).phase, RunPhase::Exhausted);
    }

    #[test]
    fn test_failure() {
        let mut monitor = ConvergenceMonitor::<f64>::new(1e-4, 3, 1);
        monitor.mark_failed();
        assert_eq!(monitor.phase(), RunPhase::Failed);
        assert_eq!(monitor.phase().to_string(), "failed");
    }
}
