extern crate nalgebra as na;

use na::DVector;
use tracing::debug;

use crate::numerics::{max_norm, least_squares::{compute_cost, levenberg_marquardt_step, update_scaling}};
use crate::numerics::optimizer::{LeastSquaresProblem, OptimizerParameters, OptimizerResult, Termination, rms_of};
use crate::Float;

pub fn optimize<P: LeastSquaresProblem>(problem: &P, initial: &DVector<Float>, runtime_parameters: &OptimizerParameters) -> OptimizerResult {
    let mut state = initial.clone();
    let mut residuals = problem.residuals(&state);
    let mut jacobian = problem.jacobian(&state);
    let mut normal = jacobian.transpose()*(&jacobian);
    let mut scaling = DVector::<Float>::zeros(state.nrows());
    update_scaling(&mut scaling, &normal);

    let mut cost = compute_cost(&residuals);
    let mut mu = runtime_parameters.tau*normal.diagonal().max().max(1e-12);
    let mut nu: Float = 2.0;
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

        let (delta, _, gain_ratio_denom) = match levenberg_marquardt_step(&residuals, &jacobian, &scaling, mu) {
            Some(step) => step,
            None => {
                mu *= nu;
                nu *= 2.0;
                match mu.is_infinite() || nu.is_infinite() {
                    true => break Termination::Diverged,
                    false => continue
                }
            }
        };

        let scaled_state_norm = state.component_mul(&scaling.map(|v| v.sqrt())).norm();
        let scaled_delta_norm = delta.component_mul(&scaling.map(|v| v.sqrt())).norm();
        if scaled_delta_norm <= runtime_parameters.step_tolerance*(scaled_state_norm + runtime_parameters.step_tolerance) {
            break Termination::StepTolerance;
        }

        let new_state = &state + &delta;
        let (new_residuals, new_cost) = match problem.is_admissible(&new_state) {
            true => {
                let r = problem.residuals(&new_state);
                let c = compute_cost(&r);
                (Some(r), c)
            },
            false => (None, Float::INFINITY)
        };

        let cost_diff = cost - new_cost;
        let gain_ratio = match gain_ratio_denom {
            v if v > 0.0 => cost_diff/v,
            _ => Float::NAN
        };
        debug!("lm it: {}, cost: {:.6e}, new cost: {:.6e}, mu: {:.3e}, gain: {:.3}", iteration_count, cost, new_cost, mu, gain_ratio);

        match new_residuals {
            Some(r) if !gain_ratio.is_nan() && gain_ratio > 0.0 && cost_diff > 0.0 => {
                let relative_reduction = cost_diff/cost.max(Float::MIN_POSITIVE);
                state = new_state;
                residuals = r;
                cost = new_cost;
                jacobian = problem.jacobian(&state);
                normal = jacobian.transpose()*(&jacobian);
                update_scaling(&mut scaling, &normal);

                mu *= (1.0/3.0 as Float).max(1.0 - (2.0*gain_ratio - 1.0).powi(3));
                nu = 2.0;

                if relative_reduction < runtime_parameters.function_tolerance {
                    break Termination::FunctionTolerance;
                }
            },
            _ => {
                mu *= nu;
                nu *= 2.0;
            }
        }

        if mu.is_infinite() || nu.is_infinite() {
            break Termination::Diverged;
        }
    };

    debug!("lm finished after {} iterations: {:?}, rms {:.6}", iteration_count, termination, rms_of(&residuals));
    OptimizerResult { parameters: state, residuals, cost, iterations: iteration_count, termination }
}
