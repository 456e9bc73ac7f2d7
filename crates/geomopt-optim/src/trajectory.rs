//! Trajectory frames and per-step reports.

use geomopt_core::types::Scalar;
use log::{debug, info};
use std::fmt;

/// Geometry sampled at a given step, with its energy relative to the reference.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrajectoryFrame<G, T> {
    /// Number of accepted steps when the frame was taken
    pub step: usize,
    /// Sampled geometry
    pub geometry: G,
    /// Energy minus the reference energy
    pub energy: T,
}

/// Frames sampled every `frame_rate` accepted steps.
///
/// Step 0 is a multiple of every rate, so the starting point is always
/// sampled.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trajectory<G, T> {
    frames: Vec<TrajectoryFrame<G, T>>,
    frame_rate: usize,
}

impl<G, T> Trajectory<G, T> {
    /// Empty trajectory sampled every `frame_rate` steps (at least 1).
    pub fn new(frame_rate: usize) -> Self {
        Self {
            frames: Vec::new(),
            frame_rate: frame_rate.max(1),
        }
    }

    /// Sampling period in accepted steps.
    pub fn frame_rate(&self) -> usize {
        self.frame_rate
    }

    /// True when step `step` falls on the sampling cadence.
    pub fn is_due(&self, step: usize) -> bool {
        step % self.frame_rate == 0
    }

    /// Appends a frame.
    pub fn push(&mut self, step: usize, geometry: G, energy: T) {
        self.frames.push(TrajectoryFrame {
            step,
            geometry,
            energy,
        });
    }

    /// Step of the most recent frame.
    pub fn last_step(&self) -> Option<usize> {
        self.frames.last().map(|f| f.step)
    }

    /// All frames, oldest first.
    pub fn frames(&self) -> &[TrajectoryFrame<G, T>] {
        &self.frames
    }

    /// Steps at which frames were taken.
    pub fn steps(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.step).collect()
    }

    /// Sampled geometries.
    pub fn geometries(&self) -> impl Iterator<Item = &G> + '_ {
        self.frames.iter().map(|f| &f.geometry)
    }

    /// Number of sampled frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when no frame was sampled.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Splits the trajectory into parallel geometry and energy lists.
    pub fn into_parts(self) -> (Vec<G>, Vec<T>) {
        self.frames
            .into_iter()
            .map(|f| (f.geometry, f.energy))
            .unzip()
    }
}

impl<G, T: Copy> Trajectory<G, T> {
    /// Sampled energies.
    pub fn energies(&self) -> Vec<T> {
        self.frames.iter().map(|f| f.energy).collect()
    }
}

/// Summary of one accepted step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepReport<T> {
    /// 1-based step number
    pub step: usize,
    /// Energy minus the reference energy
    pub energy: T,
    /// RMS of the projected gradient
    pub gradrms: T,
    /// Step length accepted by the line search
    pub step_size: T,
    /// Step bound in effect
    pub dmax: T,
    /// Energy change over the step
    pub energy_change: T,
}

impl<T: Scalar> fmt::Display for StepReport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " Opt step: {} E: {:.4} gradrms: {:.5} ss: {:.3} DMAX: {:.3}",
            self.step, self.energy, self.gradrms, self.step_size, self.dmax
        )
    }
}

/// Logs the per-step lines of a run under an `opt-summary` header.
pub fn log_summary<T: Scalar>(reports: &[StepReport<T>], print_level: u32) {
    if print_level > 0 {
        info!("opt-summary");
        for report in reports {
            info!("{report}");
        }
    } else {
        debug!("opt-summary");
        for report in reports {
            debug!("{report}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cadence() {
        let trajectory = Trajectory::<(), f64>::new(4);
        let due: Vec<usize> = (0..10).filter(|&s| trajectory.is_due(s)).collect();
        assert_eq!(due, vec![0, 4, 8]);
    }

    #[test]
    fn test_zero_frame_rate_samples_every_step() {
        let trajectory = Trajectory::<(), f64>::new(0);
        assert_eq!(trajectory.frame_rate(), 1);
        assert!(trajectory.is_due(3));
    }

    #[test]
    fn test_into_parts() {
        let mut trajectory = Trajectory::new(2);
        trajectory.push(0, "a", 1.0);
        trajectory.push(2, "b", 0.5);

        assert_eq!(trajectory.last_step(), Some(2));
        assert_eq!(trajectory.steps(), vec![0, 2]);
        assert_eq!(trajectory.energies(), vec![1.0, 0.5]);
        let (geometries, energies) = trajectory.into_parts();
        assert_eq!(geometries, vec!["a", "b"]);
        assert_eq!(energies, vec![1.0, 0.5]);
    }

    #[test]
    fn test_step_report_line() {
        let report = StepReport {
            step: 3,
            energy: -1.5,
            gradrms: 0.012346,
            step_size: 0.1,
            dmax: 0.1,
            energy_change: -0.2,
        };
        assert_eq!(
            report.to_string(),
            " Opt step: 3 E: -1.5000 gradrms: 0.01235 ss: 0.100 DMAX: 0.100"
        );
    }
}
