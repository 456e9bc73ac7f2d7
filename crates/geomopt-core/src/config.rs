//! Optimizer options and per-run settings.
//!
//! [`OptimizerOptions`] holds the resolved option values an optimizer is built
//! with (`DMAX`, `print_level`, the RMS gradient threshold and the line search
//! parameters). [`RunSettings`] holds the arguments of a single `optimize`
//! call.
//!
//! # Example
//!
//! ```rust
//! use geomopt_core::config::{OptimizerOptions, RunSettings};
//! use geomopt_core::coordinates::ConstraintMode;
//!
//! let options = OptimizerOptions::<f64>::new()
//!     .with_dmax(0.25)
//!     .with_conv_grms(5e-4);
//! let settings = RunSettings::<f64>::new()
//!     .with_max_steps(50)
//!     .with_constraint_mode(ConstraintMode::Unconstrained);
//!
//! assert!(options.validate().is_ok());
//! assert!(settings.validate().is_ok());
//! ```

use crate::{
    coordinates::ConstraintMode,
    error::{OptimizerError, OptimizerResult},
    line_search::LineSearchParams,
    types::{DVector, Scalar},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Resolved optimizer options.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct OptimizerOptions<T: Scalar> {
    /// Maximum step length (`DMAX`) in working coordinates
    pub dmax: T,
    /// Verbosity; per-step lines are logged at `info` when positive
    pub print_level: u32,
    /// RMS gradient convergence threshold
    pub conv_grms: T,
    /// Parameters handed to the line search
    pub line_search: LineSearchParams<T>,
}

impl<T: Scalar> Default for OptimizerOptions<T> {
    fn default() -> Self {
        Self {
            dmax: <T as Scalar>::from_f64(0.1),
            print_level: 1,
            conv_grms: T::DEFAULT_GRADIENT_TOLERANCE,
            line_search: LineSearchParams::default(),
        }
    }
}

impl<T: Scalar> OptimizerOptions<T> {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum step length.
    pub fn with_dmax(mut self, dmax: T) -> Self {
        self.dmax = dmax;
        self
    }

    /// Sets the verbosity.
    pub fn with_print_level(mut self, print_level: u32) -> Self {
        self.print_level = print_level;
        self
    }

    /// Sets the RMS gradient convergence threshold.
    pub fn with_conv_grms(mut self, conv_grms: T) -> Self {
        self.conv_grms = conv_grms;
        self
    }

    /// Sets the line search parameters.
    pub fn with_line_search(mut self, params: LineSearchParams<T>) -> Self {
        self.line_search = params;
        self
    }

    /// Validates the options.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.dmax <= T::zero() {
            return Err(OptimizerError::invalid_configuration(
                "maximum step must be positive",
                "DMAX",
                self.dmax.to_string(),
            ));
        }
        if self.conv_grms <= T::zero() {
            return Err(OptimizerError::invalid_configuration(
                "convergence threshold must be positive",
                "conv_grms",
                self.conv_grms.to_string(),
            ));
        }
        self.line_search.validate()?;
        Ok(())
    }
}

/// Arguments of a single optimization run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RunSettings<T: Scalar> {
    /// Energy subtracted from every reported energy
    pub ref_energy: T,
    /// Problem type used to derive constraint vectors
    pub constraint_mode: ConstraintMode,
    /// Maximum number of accepted steps
    pub max_steps: usize,
    /// Number of curvature pairs kept in the history (`maxcor`)
    pub history_capacity: usize,
    /// Reaction-path tangent for tangent-constrained modes
    pub tangent: Option<DVector<T>>,
    /// A trajectory frame is recorded every `frame_rate` accepted steps
    pub frame_rate: usize,
}

impl<T: Scalar> Default for RunSettings<T> {
    fn default() -> Self {
        Self {
            ref_energy: T::zero(),
            constraint_mode: ConstraintMode::Unconstrained,
            max_steps: 20,
            history_capacity: 10,
            tangent: None,
            frame_rate: 4,
        }
    }
}

impl<T: Scalar> RunSettings<T> {
    /// Creates settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reference energy.
    pub fn with_ref_energy(mut self, ref_energy: T) -> Self {
        self.ref_energy = ref_energy;
        self
    }

    /// Sets the constraint mode.
    pub fn with_constraint_mode(mut self, mode: ConstraintMode) -> Self {
        self.constraint_mode = mode;
        self
    }

    /// Sets the step budget.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the history capacity.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Sets the path tangent.
    pub fn with_tangent(mut self, tangent: DVector<T>) -> Self {
        self.tangent = Some(tangent);
        self
    }

    /// Sets the trajectory cadence.
    pub fn with_frame_rate(mut self, frame_rate: usize) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Validates the settings, including the tangent requirement of the mode.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.history_capacity == 0 {
            return Err(OptimizerError::invalid_configuration(
                "history must hold at least one pair",
                "maxcor",
                "0",
            ));
        }
        if self.frame_rate == 0 {
            return Err(OptimizerError::invalid_configuration(
                "frame rate must be at least 1",
                "xyzframerate",
                "0",
            ));
        }
        if self.constraint_mode.requires_tangent() && self.tangent.is_none() {
            return Err(OptimizerError::missing_tangent(self.constraint_mode.as_str()));
        }
        Ok(())
    }
}
