extern crate nalgebra as na;

use na::{DMatrix, DVector};

use glacier_velocity::numerics::optimizer::{LeastSquaresProblem, OptimisationMethod, OptimizerParameters, Termination, optimize};
use glacier_velocity::Float;

const METHODS: [OptimisationMethod; 2] = [OptimisationMethod::LevenbergMarquardt, OptimisationMethod::TrustRegion];

/// Residuals of (x - 1, 2y + 3, x + y), a consistent linear system up to the last row.
struct Linear;

impl LeastSquaresProblem for Linear {
    fn residuals(&self, p: &DVector<Float>) -> DVector<Float> {
        DVector::<Float>::from_vec(vec![p[0] - 1.0, 2.0*p[1] + 3.0, p[0] + p[1] + 0.5])
    }
}

/// Finite residuals with a Jacobian that has gone non-finite.
struct BrokenJacobian;

impl LeastSquaresProblem for BrokenJacobian {
    fn residuals(&self, p: &DVector<Float>) -> DVector<Float> {
        p.map(|v| v - 1.0)
    }

    fn jacobian(&self, p: &DVector<Float>) -> DMatrix<Float> {
        DMatrix::<Float>::from_element(p.nrows(), p.nrows(), Float::NAN)
    }
}

#[test]
fn linear_problem_converges_to_the_exact_solution() {
    for method in METHODS {
        let result = optimize(&Linear, &DVector::<Float>::from_vec(vec![10.0, -7.0]), method, &OptimizerParameters::default());
        assert!(result.converged(), "{:?} stopped with {:?}", method, result.termination);
        assert!((result.parameters[0] - 1.0).abs() < 1e-6);
        assert!((result.parameters[1] + 1.5).abs() < 1e-6);
        assert!(result.cost < 1e-12);
    }
}

#[test]
fn non_finite_jacobian_is_divergence_not_convergence() {
    for method in METHODS {
        let result = optimize(&BrokenJacobian, &DVector::<Float>::from_vec(vec![3.0, 4.0]), method, &OptimizerParameters::default());
        assert_eq!(result.termination, Termination::Diverged, "{:?}", method);
        assert!(!result.converged());
        assert_eq!(result.parameters, DVector::<Float>::from_vec(vec![3.0, 4.0]));
    }
}

#[test]
fn only_tolerance_stops_count_as_converged() {
    assert!(Termination::StepTolerance.converged());
    assert!(Termination::GradientTolerance.converged());
    assert!(!Termination::MaxIterations.converged());
    assert!(!Termination::Diverged.converged());
}
