extern crate nalgebra as na;

use std::fmt;
use na::{DMatrix, DVector};
use serde::{Serialize, Deserialize};

use crate::numerics::numerical_jacobian;
use crate::Float;

pub mod levenberg_marquardt;
pub mod trust_region;

/// A nonlinear least-squares problem over a flat parameter vector.
pub trait LeastSquaresProblem {
    fn residuals(&self, parameters: &DVector<Float>) -> DVector<Float>;

    /// Parameter vectors outside the valid domain are never accepted as steps.
    fn is_admissible(&self, _parameters: &DVector<Float>) -> bool {
        true
    }

    fn jacobian(&self, parameters: &DVector<Float>) -> DMatrix<Float> {
        numerical_jacobian(|p| self.residuals(p), parameters)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimisationMethod {
    #[serde(alias = "lm")]
    LevenbergMarquardt,
    #[serde(alias = "trf")]
    TrustRegion
}

impl fmt::Display for OptimisationMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OptimisationMethod::LevenbergMarquardt => write!(f, "lm"),
            OptimisationMethod::TrustRegion => write!(f, "trf")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ResidualTolerance,
    FunctionTolerance,
    StepTolerance,
    GradientTolerance,
    MaxIterations,
    /// Damping blew up, no step could be solved or the gradient is not finite
    Diverged
}

impl Termination {
    pub fn converged(&self) -> bool {
        !matches!(self, Termination::MaxIterations | Termination::Diverged)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerParameters {
    pub max_iterations: usize,
    pub function_tolerance: Float,
    pub step_tolerance: Float,
    pub gradient_tolerance: Float,
    pub residual_tolerance: Float,
    pub tau: Float,
    pub initial_radius: Float
}

impl Default for OptimizerParameters {
    fn default() -> Self {
        OptimizerParameters {
            max_iterations: 200,
            function_tolerance: 1e-10,
            step_tolerance: 1e-10,
            gradient_tolerance: 1e-10,
            residual_tolerance: 1e-9,
            tau: 1e-3,
            initial_radius: 1.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizerResult {
    pub parameters: DVector<Float>,
    pub residuals: DVector<Float>,
    pub cost: Float,
    pub iterations: usize,
    pub termination: Termination
}

impl OptimizerResult {
    pub fn converged(&self) -> bool {
        self.termination.converged()
    }
}

pub fn optimize<P: LeastSquaresProblem>(problem: &P, initial: &DVector<Float>, method: OptimisationMethod, parameters: &OptimizerParameters) -> OptimizerResult {
    match method {
        OptimisationMethod::LevenbergMarquardt => levenberg_marquardt::optimize(problem, initial, parameters),
        OptimisationMethod::TrustRegion => trust_region::optimize(problem, initial, parameters)
    }
}

fn rms_of(residuals: &DVector<Float>) -> Float {
    match residuals.nrows() {
        0 => 0.0,
        n => (residuals.norm_squared()/n as Float).sqrt()
    }
}
