extern crate nalgebra as na;

use na::{Vector, Dim, storage::Storage, DVector, DMatrix};
use crate::{Float, float};

pub mod least_squares;
pub mod optimizer;

const FINITE_DIFFERENCE_STEP: Float = 1e-6;

/// Median of the data. Returns `None` for an empty slice. Values that are NaN sort last.
pub fn median(data: &[Float]) -> Option<Float> {
    if data.is_empty() {
        return None;
    }
    let mut sorted = data.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let middle = sorted.len()/2;
    match sorted.len() % 2 {
        0 => Some(0.5*(sorted[middle-1] + sorted[middle])),
        _ => Some(sorted[middle])
    }
}

pub fn mean(data: &[Float]) -> Option<Float> {
    match data.len() {
        0 => None,
        n => Some(data.iter().sum::<Float>() / n as Float)
    }
}

pub fn rms(data: &[Float]) -> Option<Float> {
    match data.len() {
        0 => None,
        n => Some((data.iter().map(|v| v.powi(2)).sum::<Float>() / n as Float).sqrt())
    }
}

/// Wraps an angle in degrees into (-180, 180].
pub fn normalize_angle_degrees(angle: Float) -> Float {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    match wrapped {
        v if v <= -180.0 => v + 360.0,
        v => v
    }
}

/// Offset of the vertex of the parabola through (-1,f_minus), (0,f_center), (1,f_plus).
/// Clamped to [-0.5, 0.5]; a flat or inverted neighbourhood yields 0.
pub fn parabola_vertex_offset(f_minus: Float, f_center: Float, f_plus: Float) -> Float {
    let denominator = f_minus - 2.0*f_center + f_plus;
    match denominator {
        d if d < -float::EPSILON => (0.5*(f_minus - f_plus)/d).clamp(-0.5, 0.5),
        _ => 0.0
    }
}

/// Infinity norm. A NaN entry makes the result NaN.
pub fn max_norm<D,S>(vector: &Vector<Float,D,S>) -> Float where D: Dim, S: Storage<Float,D> {

    vector.iter().fold(0.0,|max,v|
        match v.abs() {
            v_abs if v_abs.is_nan() || max.is_nan() => Float::NAN,
            v_abs if v_abs > max => v_abs,
            _ => max
        }
    )

}

/**
 * Central finite differences of a vector valued function.
 * The step for parameter j is FINITE_DIFFERENCE_STEP*max(|x_j|,1).
 */
pub fn numerical_jacobian<Func>(function: Func, parameters: &DVector<Float>) -> DMatrix<Float> where Func: Fn(&DVector<Float>) -> DVector<Float> {
    let n = parameters.nrows();
    if n == 0 {
        return DMatrix::<Float>::zeros(function(parameters).nrows(), 0);
    }
    let mut columns = Vec::<DVector<Float>>::with_capacity(n);
    let mut forward = parameters.clone();
    let mut backward = parameters.clone();

    for j in 0..n {
        let step = FINITE_DIFFERENCE_STEP*parameters[j].abs().max(1.0);
        forward[j] = parameters[j] + step;
        backward[j] = parameters[j] - step;
        let diff = (function(&forward) - function(&backward))/(2.0*step);
        columns.push(diff);
        forward[j] = parameters[j];
        backward[j] = parameters[j];
    }

    DMatrix::<Float>::from_columns(&columns)
}
