extern crate nalgebra as na;

use na::DVector;
use tracing::debug;

use crate::numerics::{max_norm, least_squares::{compute_cost, dogleg_step, predicted_reduction, update_scaling}};
use crate::numerics::optimizer::{LeastSquaresProblem, OptimizerParameters, OptimizerResult, Termination, rms_of};
use crate::Float;

/**
 * Dogleg trust region on variables scaled by the running maximum of sqrt(diag(JᵀJ)).
 * The radius starts at initial_radius*|D x| (or initial_radius when x is 0).
 */
pub fn optimize<P: LeastSquaresProblem>(problem: &P, initial: &DVector<Float>, runtime_parameters: &OptimizerParameters) -> OptimizerResult {
    let mut state = initial.clone();
    let mut residuals = problem.residuals(&state);
    let mut jacobian = problem.jacobian(&state);
    let mut scaling = DVector::<Float>::zeros(state.nrows());
    update_scaling(&mut scaling, &(jacobian.transpose()*(&jacobian)));

    let scaled_norm = |x: &DVector<Float>, s: &DVector<Float>| x.component_mul(&s.map(|v| v.sqrt())).norm();

    let mut cost = compute_cost(&residuals);
    let mut radius = match scaled_norm(&state, &scaling) {
        n if n > 0.0 => runtime_parameters.initial_radius*n,
        _ => runtime_parameters.initial_radius
    };
    let mut iteration_count = 0;

    let termination = loop {
        if rms_of(&residuals) <= runtime_parameters.residual_tolerance {
            break Termination::ResidualTolerance;
        }
        match max_norm(&(jacobian.transpose()*(&residuals))) {
            g if !g.is_finite() => break Termination::Diverged,
            g if g <= runtime_parameters.gradient_tolerance => break Termination::GradientTolerance,
            _ => ()
        }
        if iteration_count >= runtime_parameters.max_iterations {
            break Termination::MaxIterations;
        }
        iteration_count += 1;

        let (delta, scaled_delta_norm) = match dogleg_step(&residuals, &jacobian, &scaling, radius) {
            Some(step) => step,
            None => break Termination::Diverged
        };

        let state_norm = scaled_norm(&state, &scaling);
        if scaled_delta_norm <= runtime_parameters.step_tolerance*(state_norm + runtime_parameters.step_tolerance) {
            break Termination::StepTolerance;
        }

        let predicted = predicted_reduction(&residuals, &jacobian, &delta);
        let new_state = &state + &delta;
        let (new_residuals, new_cost) = match problem.is_admissible(&new_state) {
            true => {
                let r = problem.residuals(&new_state);
                let c = compute_cost(&r);
                (Some(r), c)
            },
            false => (None, Float::INFINITY)
        };

        let actual = cost - new_cost;
        let rho = match predicted {
            p if p > 0.0 => actual/p,
            _ => Float::NAN
        };
        debug!("trf it: {}, cost: {:.6e}, new cost: {:.6e}, radius: {:.3e}, rho: {:.3}", iteration_count, cost, new_cost, radius, rho);

        radius = match rho {
            r if r.is_nan() || r < 0.25 => 0.25*scaled_delta_norm.min(radius),
            r if r > 0.75 => radius.max(3.0*scaled_delta_norm),
            _ => radius
        };

        match new_residuals {
            Some(r) if !rho.is_nan() && rho > 1e-4 && actual > 0.0 => {
                let relative_reduction = actual/cost.max(Float::MIN_POSITIVE);
                state = new_state;
                residuals = r;
                cost = new_cost;
                jacobian = problem.jacobian(&state);
                update_scaling(&mut scaling, &(jacobian.transpose()*(&jacobian)));

                if relative_reduction < runtime_parameters.function_tolerance {
                    break Termination::FunctionTolerance;
                }
            },
            _ => ()
        }

        if radius <= runtime_parameters.step_tolerance*(scaled_norm(&state, &scaling) + runtime_parameters.step_tolerance) {
            break Termination::StepTolerance;
        }
    };

    debug!("trf finished after {} iterations: {:?}, rms {:.6}", iteration_count, termination, rms_of(&residuals));
    OptimizerResult { parameters: state, residuals, cost, iterations: iteration_count, termination }
}
