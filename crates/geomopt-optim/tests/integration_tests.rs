//! Integration tests for geomopt-optim
//!
//! These tests run the L-BFGS optimizer end to end against quadratic
//! surfaces exposed through the coordinate provider interface.

use approx::assert_relative_eq;
use geomopt_core::{
    prelude::*,
    test_utils::{CountingLineSearch, FailingLineSearch, QuadraticSurface},
};
use geomopt_optim::{Lbfgs, OptimizationOutcome, RunPhase};
use nalgebra::{DMatrix, DVector};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

fn default_optimizer() -> Lbfgs<f64> {
    Lbfgs::with_default_line_search(OptimizerOptions::new())
}

/// Orthonormal 3x3 rotation used as a delocalized basis.
fn rotation() -> DMatrix<f64> {
    let (s, c) = (0.6, 0.8);
    DMatrix::from_row_slice(3, 3, &[c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0])
}

/// Random symmetric positive definite matrix `AᵀA + n I`.
fn random_spd(n: usize, rng: &mut StdRng) -> DMatrix<f64> {
    let a = DMatrix::from_fn(n, n, |_, _| {
        let v: f64 = StandardNormal.sample(&mut *rng);
        0.5 * v
    });
    a.transpose() * &a + DMatrix::identity(n, n) * n as f64
}

#[test]
fn test_already_converged_takes_no_step() {
    let start = DVector::from_vec(vec![1e-6, 0.0]);
    let mut surface = QuadraticSurface::isotropic(start.clone());
    let mut optimizer = Lbfgs::new(
        OptimizerOptions::new(),
        CountingLineSearch::new(Backtracking::new()),
    );
    let settings = RunSettings::new().with_ref_energy(0.5);

    let outcome = optimizer.optimize(&mut surface, &settings).unwrap();

    assert!(outcome.is_converged());
    assert_eq!(optimizer.line_search().calls, 0);
    assert_eq!(surface.commits, 0);
    assert_eq!(surface.evaluations, 0);

    let trajectory = outcome.trajectory().unwrap();
    assert_eq!(trajectory.len(), 1);
    assert_eq!(trajectory.frames()[0].geometry, start);
    assert_relative_eq!(trajectory.frames()[0].energy, 1e-12 - 0.5);
    assert!(surface.gradrms.unwrap() < 1e-4);
}

#[test]
fn test_isotropic_quadratic_converges_to_origin() {
    let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![1.0, -2.0, 0.5]));
    let settings = RunSettings::new().with_max_steps(200);

    let outcome = default_optimizer().optimize(&mut surface, &settings).unwrap();

    assert!(outcome.is_converged(), "ended in phase {}", outcome.phase());
    let summary = outcome.summary().unwrap();
    assert!(summary.final_gradrms < 1e-4);
    assert_eq!(surface.gradrms, Some(summary.final_gradrms));
    assert_relative_eq!(surface.xyz(), DVector::zeros(3), epsilon = 1e-4);
    assert_eq!(summary.line_searches, summary.steps.len());
}

#[test]
fn test_anisotropic_quadratic_converges() {
    let start = DVector::from_vec(vec![1.0, 1.0, 1.0]);
    let mut surface = QuadraticSurface::diagonal(&[2.0, 4.0, 6.0], start);
    let initial_energy = surface.energy();
    let options = OptimizerOptions::new()
        .with_line_search(LineSearchParams::default().with_max_iterations(20));
    let mut optimizer = Lbfgs::with_default_line_search(options);

    let outcome = optimizer
        .optimize(&mut surface, &RunSettings::new().with_max_steps(300))
        .unwrap();

    assert!(outcome.is_converged(), "ended in phase {}", outcome.phase());
    assert!(surface.energy() < initial_energy);
    assert_relative_eq!(surface.xyz(), DVector::zeros(3), epsilon = 1e-4);
}

#[test]
fn test_delocalized_basis_gradrms_never_increases() {
    let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![1.0, -0.5, 0.25]))
        .with_basis(rotation());
    let settings = RunSettings::new().with_max_steps(200);

    let outcome = default_optimizer().optimize(&mut surface, &settings).unwrap();

    assert!(outcome.is_converged(), "ended in phase {}", outcome.phase());
    let steps = &outcome.summary().unwrap().steps;
    for pair in steps.windows(2) {
        assert!(
            pair[1].gradrms <= pair[0].gradrms + 1e-12,
            "gradrms rose from {} to {} at step {}",
            pair[0].gradrms,
            pair[1].gradrms,
            pair[1].step
        );
    }
    assert_relative_eq!(surface.xyz(), DVector::zeros(3), epsilon = 1e-4);
}

#[test]
fn test_runs_are_deterministic() {
    let mut rng = StdRng::seed_from_u64(42);
    let hessian = random_spd(5, &mut rng);
    let start = DVector::from_fn(5, |_, _| {
        let v: f64 = StandardNormal.sample(&mut rng);
        v
    });
    let settings = RunSettings::new().with_max_steps(30).with_frame_rate(2);

    let run = || {
        let mut surface = QuadraticSurface::new(hessian.clone(), start.clone());
        let outcome = default_optimizer().optimize(&mut surface, &settings).unwrap();
        (outcome, surface.xyz())
    };
    let (first, first_xyz) = run();
    let (second, second_xyz) = run();

    assert_eq!(first.phase(), second.phase());
    assert_eq!(first.trajectory(), second.trajectory());
    assert_eq!(
        first.summary().map(|s| s.steps.clone()),
        second.summary().map(|s| s.steps.clone())
    );
    assert_eq!(first_xyz, second_xyz);
}

#[test]
fn test_frames_follow_cadence_and_final_step() {
    // E = x², taking steps of 0.1 until the full step fits under DMAX:
    // 0.65 → 0.55 → … → 0.05 → 0 converges on step 7.
    let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![0.65]));
    let mut optimizer = Lbfgs::new(OptimizerOptions::new(), NoLineSearch::new());
    let settings = RunSettings::new()
        .with_max_steps(10)
        .with_frame_rate(4)
        .with_ref_energy(0.01);

    let outcome = optimizer.optimize(&mut surface, &settings).unwrap();

    assert!(outcome.is_converged(), "ended in phase {}", outcome.phase());
    let trajectory = outcome.trajectory().unwrap();
    assert_eq!(trajectory.steps(), vec![0, 4, 7]);

    let energies = trajectory.energies();
    assert_relative_eq!(energies[0], 0.65 * 0.65 - 0.01, epsilon = 1e-12);
    assert_relative_eq!(energies[1], 0.25 * 0.25 - 0.01, epsilon = 1e-12);
    assert_relative_eq!(energies[2], -0.01, epsilon = 1e-12);
    assert_relative_eq!(trajectory.frames()[1].geometry[0], 0.25, epsilon = 1e-12);
}

#[test]
fn test_exhausted_run_records_final_frame() {
    let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![5.0, 5.0, 5.0]));
    let mut optimizer = Lbfgs::new(OptimizerOptions::new(), NoLineSearch::new());
    let settings = RunSettings::new().with_max_steps(6).with_frame_rate(4);

    let outcome = optimizer.optimize(&mut surface, &settings).unwrap();

    assert_eq!(outcome.phase(), RunPhase::Exhausted);
    assert_eq!(outcome.line_searches(), 6);
    let summary = outcome.summary().unwrap();
    assert_eq!(summary.trajectory.steps(), vec![0, 4, 6]);
    assert_eq!(summary.steps.len(), 6);
    assert!(summary.steps.iter().all(|r| (r.step_size - 0.1).abs() < 1e-12));
    assert_eq!(surface.commits, 6);
}

#[test]
fn test_line_search_failure_restores_last_accepted_point() {
    let start = DVector::from_vec(vec![1.0, -2.0, 0.5]);

    // Two clean steps give the point the failing run must fall back to.
    let mut reference = QuadraticSurface::isotropic(start.clone());
    default_optimizer()
        .optimize(&mut reference, &RunSettings::new().with_max_steps(2))
        .unwrap();

    let mut surface = QuadraticSurface::isotropic(start);
    let mut failing = FailingLineSearch::new(3);
    failing.status = -7;
    let mut optimizer = Lbfgs::new(OptimizerOptions::new(), failing);

    let outcome = optimizer
        .optimize(&mut surface, &RunSettings::new().with_max_steps(10))
        .unwrap();

    assert_eq!(outcome.phase(), RunPhase::Failed);
    assert_eq!(outcome.failure_status(), Some(-7));
    assert!(outcome.trajectory().is_none());

    let OptimizationOutcome::LineSearchFailed(failure) = outcome else {
        panic!("expected a line search failure");
    };
    assert_eq!(failure.steps_taken, 2);
    assert_eq!(failure.line_searches, 3);
    assert_relative_eq!(failure.point, reference.coordinates(), epsilon = 1e-12);
    assert_relative_eq!(failure.gradient, reference.gradient(), epsilon = 1e-12);

    // The trial point of the failing search was evaluated but never committed.
    assert_eq!(surface.commits, 2);
    assert_eq!(surface.xyz(), reference.xyz());
    // Energy and gradient describe the committed point, not the rejected trial.
    assert_relative_eq!(surface.energy(), reference.energy(), epsilon = 1e-12);
    assert_relative_eq!(surface.gradient(), reference.gradient(), epsilon = 1e-12);
    assert_eq!(optimizer.line_search().calls, 3);
}

#[test]
fn test_tangent_constraint_freezes_its_direction() {
    let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![1.0, 0.6, -0.8]));
    let settings = RunSettings::new()
        .with_constraint_mode(ConstraintMode::Ictan)
        .with_tangent(DVector::from_vec(vec![2.0, 0.0, 0.0]))
        .with_max_steps(200);

    let outcome = default_optimizer().optimize(&mut surface, &settings).unwrap();

    assert!(outcome.is_converged(), "ended in phase {}", outcome.phase());
    let xyz = surface.xyz();
    assert_eq!(xyz[0], 1.0);
    assert_relative_eq!(xyz[1], 0.0, epsilon = 1e-4);
    assert_relative_eq!(xyz[2], 0.0, epsilon = 1e-4);

    // The full gradient keeps its component along the tangent.
    assert_relative_eq!(surface.gradient()[0], 2.0, epsilon = 1e-12);
    let summary = outcome.summary().unwrap();
    assert!(summary.final_gradrms < 1e-4);
}

#[test]
fn test_missing_tangent_is_rejected() {
    let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![1.0, 1.0]));
    let settings = RunSettings::new().with_constraint_mode(ConstraintMode::Climb);

    let err = default_optimizer()
        .optimize(&mut surface, &settings)
        .unwrap_err();

    assert!(matches!(err, OptimizerError::MissingTangent { .. }));
    assert_eq!(surface.commits, 0);
    assert_eq!(surface.evaluations, 0);
}

#[test]
fn test_provider_errors_propagate() {
    let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![1.0, 1.0, 1.0, 1.0]));
    let settings = RunSettings::new().with_constraint_mode(ConstraintMode::Meci);

    let err = default_optimizer()
        .optimize(&mut surface, &settings)
        .unwrap_err();

    assert!(matches!(
        err,
        OptimizerError::Coordinate(CoordinateError::NotImplemented { .. })
    ));
}

#[test]
fn test_step_reports_are_relative_to_reference_energy() {
    let mut surface = QuadraticSurface::isotropic(DVector::from_vec(vec![2.0, 0.0]));
    let mut optimizer = Lbfgs::new(OptimizerOptions::new(), NoLineSearch::new());
    let settings = RunSettings::new().with_max_steps(1).with_ref_energy(1.0);

    let outcome = optimizer.optimize(&mut surface, &settings).unwrap();

    let report = outcome.summary().unwrap().steps[0];
    // One capped step from x = 2 to x = 1.9.
    assert_relative_eq!(report.energy, 1.9 * 1.9 - 1.0, epsilon = 1e-12);
    assert_relative_eq!(report.energy_change, 1.9 * 1.9 - 4.0, epsilon = 1e-12);
    assert_relative_eq!(report.dmax, 0.1);
    assert_relative_eq!(report.gradrms, 3.8 / 2.0_f64.sqrt(), epsilon = 1e-12);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_isotropic_runs_converge_downhill(
        coords in prop::collection::vec(-2.0f64..2.0, 3),
    ) {
        let start = DVector::from_vec(coords);
        let mut surface = QuadraticSurface::isotropic(start);
        let initial_energy = surface.energy();

        let outcome = default_optimizer()
            .optimize(&mut surface, &RunSettings::new().with_max_steps(200))
            .unwrap();

        prop_assert!(outcome.is_converged());
        prop_assert!(surface.energy() <= initial_energy);
    }
}
