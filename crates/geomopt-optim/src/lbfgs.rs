//! Limited-memory BFGS geometry optimizer.
//!
//! The optimizer minimizes the energy of a geometry exposed through a
//! [`CostAndCoordinateProvider`]. Steps are taken in the provider's working
//! coordinates, while curvature information is accumulated in primitive
//! coordinates, where a quasi-Newton model is better behaved:
//!
//! - gradients are mapped to primitives with `g_prim = B gc`;
//! - steps are taken from successive Cartesian geometries with `calc_diff`;
//! - directions come back to working coordinates with `d = Bᵀ d_prim`.
//!
//! Constraint directions are projected out of every gradient before use, so
//! the optimizer never moves along them except through the provider's
//! constraint step.
//!
//! # Example
//!
//! ```rust,no_run
//! use geomopt_core::prelude::*;
//! use geomopt_optim::{Lbfgs, OptimizationOutcome};
//!
//! # fn run<P: CostAndCoordinateProvider<f64>>(provider: &mut P) -> OptimizerResult<()> {
//! let mut optimizer = Lbfgs::new(
//!     OptimizerOptions::new().with_dmax(0.1).with_conv_grms(1e-4),
//!     Backtracking::new(),
//! );
//! let settings = RunSettings::new().with_max_steps(50);
//!
//! match optimizer.optimize(provider, &settings)? {
//!     OptimizationOutcome::Converged(summary) => {
//!         println!("converged after {} steps", summary.steps.len());
//!     }
//!     other => println!("stopped: {}", other.phase()),
//! }
//! # Ok(())
//! # }
//! ```

use crate::{
    convergence::{ConvergenceMonitor, RunPhase},
    direction::DirectionComputer,
    history::HistoryBuffer,
    step::StepController,
    trajectory::{log_summary, StepReport, Trajectory},
};
use geomopt_core::{
    config::{OptimizerOptions, RunSettings},
    coordinates::{project_out_constraints, CoordinateBasis},
    error::{CoordinateError, OptimizerError, OptimizerResult, Result},
    line_search::{Backtracking, LineSearch, LineSearchRequest},
    provider::CostAndCoordinateProvider,
    types::{DVector, Scalar},
};
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

/// Result of a run that ended at an accepted point.
#[derive(Debug, Clone)]
pub struct RunSummary<G, T: Scalar> {
    /// Sampled geometries and relative energies
    pub trajectory: Trajectory<G, T>,
    /// One report per accepted step
    pub steps: Vec<StepReport<T>>,
    /// RMS projected gradient at the final point
    pub final_gradrms: T,
    /// Number of line searches run
    pub line_searches: usize,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

/// Details of a run stopped by a failed line search.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSearchFailure<T: Scalar> {
    /// Negative status reported by the line search
    pub status: i32,
    /// Last accepted point, in working coordinates
    pub point: DVector<T>,
    /// Projected gradient at that point
    pub gradient: DVector<T>,
    /// Steps accepted before the failure
    pub steps_taken: usize,
    /// Number of line searches run, the failing one included
    pub line_searches: usize,
}

/// How an optimization run ended.
#[derive(Debug, Clone)]
pub enum OptimizationOutcome<G, T: Scalar> {
    /// The RMS gradient fell below the threshold
    Converged(RunSummary<G, T>),
    /// The step budget ran out first
    Exhausted(RunSummary<G, T>),
    /// The line search failed; no trajectory is returned
    LineSearchFailed(LineSearchFailure<T>),
}

impl<G, T: Scalar> OptimizationOutcome<G, T> {
    /// Terminal phase of the run.
    pub fn phase(&self) -> RunPhase {
        match self {
            Self::Converged(_) => RunPhase::Converged,
            Self::Exhausted(_) => RunPhase::Exhausted,
            Self::LineSearchFailed(_) => RunPhase::Failed,
        }
    }

    /// True when the RMS gradient reached the threshold.
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged(_))
    }

    /// Summary of a run that ended at an accepted point.
    pub fn summary(&self) -> Option<&RunSummary<G, T>> {
        match self {
            Self::Converged(summary) | Self::Exhausted(summary) => Some(summary),
            Self::LineSearchFailed(_) => None,
        }
    }

    /// Sampled trajectory, absent after a line search failure.
    pub fn trajectory(&self) -> Option<&Trajectory<G, T>> {
        self.summary().map(|s| &s.trajectory)
    }

    /// Consumes the outcome into parallel geometry and energy lists.
    pub fn into_trajectory(self) -> Option<(Vec<G>, Vec<T>)> {
        match self {
            Self::Converged(summary) | Self::Exhausted(summary) => {
                Some(summary.trajectory.into_parts())
            }
            Self::LineSearchFailed(_) => None,
        }
    }

    /// Status of the failed line search, if any.
    pub fn failure_status(&self) -> Option<i32> {
        match self {
            Self::LineSearchFailed(failure) => Some(failure.status),
            _ => None,
        }
    }

    /// Number of line searches run.
    pub fn line_searches(&self) -> usize {
        match self {
            Self::Converged(summary) | Self::Exhausted(summary) => summary.line_searches,
            Self::LineSearchFailed(failure) => failure.line_searches,
        }
    }
}

/// Point the optimizer currently sits at, owned by a single run.
#[derive(Debug, Clone)]
struct RunState<T: Scalar> {
    /// Working coordinates
    x: DVector<T>,
    /// Committed Cartesian geometry
    xyz: DVector<T>,
    fx: T,
    /// Raw working gradient
    g: DVector<T>,
    /// Gradient with constraint directions projected out
    gc: DVector<T>,
    /// `gc` in primitive coordinates
    g_prim: DVector<T>,
}

impl<T: Scalar> RunState<T> {
    fn from_provider<P>(provider: &P, basis: &CoordinateBasis<T>) -> Result<Self>
    where
        P: CostAndCoordinateProvider<T>,
    {
        let g = provider.gradient();
        let mut state = Self {
            x: provider.coordinates(),
            xyz: provider.xyz(),
            fx: provider.energy(),
            gc: g.clone(),
            g_prim: g.clone(),
            g,
        };
        state.project(provider, basis)?;
        Ok(state)
    }

    /// Recomputes `gc` and `g_prim` from `g`.
    fn project<P>(&mut self, provider: &P, basis: &CoordinateBasis<T>) -> Result<()>
    where
        P: CostAndCoordinateProvider<T>,
    {
        self.gc = project_out_constraints(&self.g, provider.constraints())?;
        self.g_prim = basis.to_primitive(&self.gc)?;
        Ok(())
    }
}

/// Limited-memory BFGS optimizer over a coordinate provider.
///
/// The optimizer keeps no state between runs: the curvature history is
/// allocated at the start of [`Lbfgs::optimize`] and dropped at its end.
#[derive(Debug)]
pub struct Lbfgs<T: Scalar, L: LineSearch<T> = Backtracking> {
    options: OptimizerOptions<T>,
    line_search: L,
    direction: DirectionComputer<T>,
}

impl<T: Scalar> Lbfgs<T, Backtracking> {
    /// Optimizer with the given options and a backtracking line search.
    pub fn with_default_line_search(options: OptimizerOptions<T>) -> Self {
        Self::new(options, Backtracking::new())
    }
}

impl<T: Scalar> Default for Lbfgs<T, Backtracking> {
    fn default() -> Self {
        Self::with_default_line_search(OptimizerOptions::default())
    }
}

impl<T: Scalar, L: LineSearch<T>> Lbfgs<T, L> {
    /// Creates an optimizer from options and a line search.
    pub fn new(options: OptimizerOptions<T>, line_search: L) -> Self {
        Self {
            options,
            line_search,
            direction: DirectionComputer::new(),
        }
    }

    /// Replaces the two-loop recursion settings.
    pub fn with_direction_computer(mut self, direction: DirectionComputer<T>) -> Self {
        self.direction = direction;
        self
    }

    /// Returns the optimizer options.
    pub fn options(&self) -> &OptimizerOptions<T> {
        &self.options
    }

    /// Returns the line search.
    pub fn line_search(&self) -> &L {
        &self.line_search
    }

    /// Returns the line search mutably, e.g. to reset its counters.
    pub fn line_search_mut(&mut self) -> &mut L {
        &mut self.line_search
    }

    /// Returns the optimizer name.
    pub fn name(&self) -> &str {
        "L-BFGS"
    }

    fn log_step(&self, line: impl std::fmt::Display) {
        if self.options.print_level > 0 {
            info!("{line}");
        } else {
            debug!("{line}");
        }
    }

    /// Minimizes the energy of `provider`'s geometry.
    ///
    /// On return the provider's committed geometry is the last accepted
    /// point. A failed line search is reported as
    /// [`OptimizationOutcome::LineSearchFailed`] rather than an error; errors
    /// are reserved for invalid settings, provider failures and search
    /// directions that cannot be normalized.
    pub fn optimize<P>(
        &mut self,
        provider: &mut P,
        settings: &RunSettings<T>,
    ) -> OptimizerResult<OptimizationOutcome<P::Geometry, T>>
    where
        P: CostAndCoordinateProvider<T>,
    {
        let start_time = Instant::now();
        self.options.validate()?;
        settings.validate()?;

        let mode = settings.constraint_mode;
        let num_constraints = mode.num_constraints();
        let ref_energy = settings.ref_energy;

        let mut trajectory = Trajectory::new(settings.frame_rate);
        trajectory.push(0, provider.geometry(), provider.energy() - ref_energy);
        self.log_step(format!(" initial E {:.4}", provider.energy() - ref_energy));

        // Constraints
        let constraints = provider.constraint_vectors(mode, settings.tangent.as_ref())?;
        provider.update_coordinate_basis(&constraints)?;

        let num_coordinates = provider.num_coordinates();
        if num_coordinates <= num_constraints {
            return Err(OptimizerError::invalid_configuration(
                format!("{mode} needs more than {num_constraints} coordinate(s)"),
                "num_coordinates",
                num_coordinates.to_string(),
            ));
        }

        let basis = provider.coord_basis().clone();
        let mut state = RunState::from_provider(provider, &basis)?;

        let mut monitor = ConvergenceMonitor::new(
            self.options.conv_grms,
            settings.max_steps,
            num_coordinates - num_constraints,
        );
        let mut gradrms = monitor.check_initial(&state.gc);
        provider.set_gradrms(gradrms);

        if monitor.phase() == RunPhase::Converged {
            self.log_step(format!(" already at min, gradrms: {gradrms:.5}"));
            return Ok(OptimizationOutcome::Converged(RunSummary {
                trajectory,
                steps: Vec::new(),
                final_gradrms: gradrms,
                line_searches: 0,
                duration: start_time.elapsed(),
            }));
        }

        let controller = StepController::new(self.options.dmax);
        let mut history = HistoryBuffer::new(settings.history_capacity, state.g_prim.len());
        let mut reports = Vec::with_capacity(settings.max_steps);
        let mut line_searches = 0;
        let mut previous: Option<RunState<T>> = None;

        for ostep in 0..settings.max_steps {
            let step_number = ostep + 1;

            if let Some(prev) = &previous {
                let s = provider.calc_diff(&state.xyz, &prev.xyz)?;
                if s.len() != history.dim() {
                    return Err(CoordinateError::dimension_mismatch(history.dim(), s.len()).into());
                }
                let y = &state.g_prim - &prev.g_prim;
                history.record(s, y);
            }

            let direction = self.direction.compute(&state.g_prim, &mut history)?;
            let proposal = controller.propose(&direction.d_prim, &basis)?;
            if proposal.capped {
                warn!(
                    " step {} capped from {:.3} to DMAX {:.3}",
                    step_number, proposal.actual_step, proposal.step
                );
            }

            let prev = state.clone();
            let constraint_steps = controller.constraint_steps(provider, mode, &state.g)?;
            let request = LineSearchRequest {
                num_constraints,
                x: &state.x,
                fx: state.fx,
                gradient: &state.gc,
                direction: &proposal.unit_direction,
                step: proposal.step,
                prev_x: &prev.x,
                prev_gradient: &prev.gc,
                constraint_steps: &constraint_steps,
            };
            let result = controller.search(
                &mut self.line_search,
                &request,
                &self.options.line_search,
                provider,
            )?;
            line_searches += 1;

            if result.is_failure() {
                monitor.mark_failed();
                error!(
                    " line search failed with status {} at step {}, restoring previous point",
                    result.status, step_number
                );
                log_summary(&reports, self.options.print_level);
                // Trial evaluations left the provider's energy and gradient at
                // the rejected point.
                provider.evaluate_displacement(&DVector::zeros(prev.x.len()))?;
                return Ok(OptimizationOutcome::LineSearchFailed(LineSearchFailure {
                    status: result.status,
                    point: prev.x,
                    gradient: prev.gc,
                    steps_taken: ostep,
                    line_searches,
                }));
            }

            state.x = result.x;
            state.fx = result.fx;
            state.g = result.gradient;
            state.project(provider, &basis)?;

            let check = monitor.after_step(step_number, &state.gc, state.fx, prev.fx);
            gradrms = check.gradrms;
            provider.set_gradrms(gradrms);
            if let Some(difference) = provider.difference_energy() {
                self.log_step(format!(" difference energy is {difference:.4}"));
            }

            state.xyz = provider.update_xyz(&(&state.x - &prev.x))?;

            let report = StepReport {
                step: step_number,
                energy: state.fx - ref_energy,
                gradrms,
                step_size: result.step,
                dmax: self.options.dmax,
                energy_change: check.energy_change,
            };
            self.log_step(&report);
            debug!(
                " dE {:.5} after {} evaluation(s), {} curvature pair(s) used",
                check.energy_change, result.function_evals, direction.used_pairs
            );
            reports.push(report);
            previous = Some(prev);

            let finished = check.phase.is_terminal();
            let final_frame = finished && trajectory.last_step() != Some(step_number);
            if trajectory.is_due(step_number) || final_frame {
                trajectory.push(step_number, provider.geometry(), provider.energy() - ref_energy);
            }

            if finished {
                break;
            }
        }

        if monitor.phase() == RunPhase::Iterating {
            // Only reachable with a zero step budget.
            monitor.mark_exhausted();
        }

        log_summary(&reports, self.options.print_level);
        let summary = RunSummary {
            trajectory,
            steps: reports,
            final_gradrms: gradrms,
            line_searches,
            duration: start_time.elapsed(),
        };

        match monitor.phase() {
            RunPhase::Converged => {
                self.log_step(format!(" converged, gradrms: {gradrms:.5}"));
                Ok(OptimizationOutcome::Converged(summary))
            }
            _ => {
                self.log_step(format!(
                    " step budget of {} exhausted, gradrms: {gradrms:.5}",
                    settings.max_steps
                ));
                Ok(OptimizationOutcome::Exhausted(summary))
            }
        }
    }
}
