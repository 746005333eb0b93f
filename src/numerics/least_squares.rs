extern crate nalgebra as na;

use na::{DMatrix, DVector};

use crate::Float;

pub fn compute_cost(residuals: &DVector<Float>) -> Float {
    0.5*residuals.norm_squared()
}

/// Keeps the running maximum of the normal matrix diagonal, as MINPACK does for its
/// variable scaling. Never lets an entry collapse to zero.
pub fn update_scaling(scaling: &mut DVector<Float>, normal_matrix: &DMatrix<Float>) -> () {
    for i in 0..scaling.nrows() {
        scaling[i] = scaling[i].max(normal_matrix[(i,i)]).max(1e-12);
    }
}

fn solve_symmetric(matrix: DMatrix<Float>, rhs: &DVector<Float>) -> Option<DVector<Float>> {
    match matrix.clone().cholesky() {
        Some(cholesky) => Some(cholesky.solve(rhs)),
        None => matrix.qr().solve(rhs)
    }
}

/**
 * Marquardt damped Gauss-Newton step: (JᵀJ + mu·D) h = -Jᵀr
 * Returns the step, the gradient Jᵀr and the predicted cost reduction.
 */
#[allow(non_snake_case)]
pub fn levenberg_marquardt_step(
    residuals: &DVector<Float>,
    jacobian: &DMatrix<Float>,
    scaling: &DVector<Float>,
    mu: Float) -> Option<(DVector<Float>, DVector<Float>, Float)> {
    let A = jacobian.transpose()*jacobian;
    let g = jacobian.transpose()*residuals;
    let damping = DMatrix::<Float>::from_diagonal(&(scaling*mu));
    let h = solve_symmetric(A + damping, &(-&g))?;
    let gain_ratio_denom = 0.5*(h.dot(&(scaling.component_mul(&h)*mu)) - h.dot(&g));
    Some((h, g, gain_ratio_denom))
}

/**
 * Powell dogleg step inside a trust region of the given radius, measured in the
 * variables scaled by `scaling` (sqrt of the normal matrix diagonal).
 * Returns the step in unscaled variables and the norm of the scaled step.
 */
#[allow(non_snake_case)]
pub fn dogleg_step(
    residuals: &DVector<Float>,
    jacobian: &DMatrix<Float>,
    scaling: &DVector<Float>,
    radius: Float) -> Option<(DVector<Float>, Float)> {
    let d = scaling.map(|v| v.sqrt());
    let d_inv = d.map(|v| 1.0/v);
    let J_s = jacobian*DMatrix::<Float>::from_diagonal(&d_inv);
    let g_s = J_s.transpose()*residuals;
    let g_norm = g_s.norm();
    if !g_norm.is_finite() {
        return None;
    }
    if g_norm == 0.0 {
        return Some((DVector::<Float>::zeros(scaling.nrows()), 0.0));
    }

    let A = J_s.transpose()*(&J_s);
    let gauss_newton = match solve_symmetric(A, &(-&g_s)) {
        Some(h) if h.iter().all(|v| v.is_finite()) => h,
        _ => J_s.clone().svd(true, true).solve(&(-residuals), 1e-12).ok()?
    };

    let h_s = match gauss_newton.norm() {
        n if n <= radius => gauss_newton,
        _ => {
            let j_g = &J_s*(&g_s);
            let alpha = g_norm.powi(2)/j_g.norm_squared().max(Float::MIN_POSITIVE);
            let cauchy = -&g_s*alpha;
            match cauchy.norm() {
                n if n >= radius => -&g_s*(radius/g_norm),
                _ => {
                    let diff = &gauss_newton - &cauchy;
                    let a = diff.norm_squared();
                    let b = 2.0*cauchy.dot(&diff);
                    let c = cauchy.norm_squared() - radius.powi(2);
                    let beta = (-b + (b.powi(2) - 4.0*a*c).max(0.0).sqrt())/(2.0*a);
                    cauchy + diff*beta.clamp(0.0, 1.0)
                }
            }
        }
    };

    let scaled_norm = h_s.norm();
    Some((h_s.component_mul(&d_inv), scaled_norm))
}

/// Cost reduction predicted by the linear model: -(gᵀh + ½|Jh|²).
pub fn predicted_reduction(residuals: &DVector<Float>, jacobian: &DMatrix<Float>, step: &DVector<Float>) -> Float {
    let g = jacobian.transpose()*residuals;
    -(g.dot(step) + 0.5*(jacobian*step).norm_squared())
}
