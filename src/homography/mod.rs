extern crate nalgebra as na;

use na::{DMatrix, Matrix3, Vector2, Vector3};
use rand::{rngs::StdRng, SeedableRng, seq::index::sample};
use tracing::debug;

use crate::numerics::{mean, median, rms};
use crate::{Float, PipelineError, Result};
use self::homography_parameters::{HomographyMethod, HomographyParameters};

pub mod homography_parameters;

const MIN_SAMPLE: usize = 4;
const LEAST_MEDIAN_CONFIDENCE_OUTLIER_RATIO: Float = 0.5;

/// Planar transform mapping pixels of the first image onto the second.
#[derive(Debug,Clone,PartialEq)]
pub struct HomographyResult {
    pub matrix: Matrix3<Float>,
    pub inliers: Vec<bool>,
    /// Forward transfer error per input point in pixels
    pub errors: Vec<Float>,
    pub mean_error: Float,
    pub rms_error: Float,
    pub converged: bool
}

impl HomographyResult {
    /// The "no correction available" outcome.
    pub fn identity(point_count: usize) -> HomographyResult {
        HomographyResult {
            matrix: Matrix3::<Float>::identity(),
            inliers: vec![false; point_count],
            errors: vec![Float::NAN; point_count],
            mean_error: 0.0,
            rms_error: 0.0,
            converged: false
        }
    }

    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&v| v).count()
    }

    pub fn apply(&self, point: &Vector2<Float>) -> Vector2<Float> {
        match self.converged {
            true => transform(&self.matrix, point).unwrap_or(*point),
            false => *point
        }
    }

    pub fn apply_inverse(&self, point: &Vector2<Float>) -> Vector2<Float> {
        match (self.converged, self.matrix.try_inverse()) {
            (true, Some(inverse)) => transform(&inverse, point).unwrap_or(*point),
            _ => *point
        }
    }
}

pub fn transform(matrix: &Matrix3<Float>, point: &Vector2<Float>) -> Option<Vector2<Float>> {
    let p = matrix*Vector3::<Float>::new(point.x, point.y, 1.0);
    match p.z {
        w if w.abs() > Float::EPSILON => Some(Vector2::<Float>::new(p.x/w, p.y/w)),
        _ => None
    }
}

/// Forward transfer error |H·src - dst|; infinite when the point maps to infinity.
pub fn transfer_error(matrix: &Matrix3<Float>, src: &Vector2<Float>, dst: &Vector2<Float>) -> Float {
    match transform(matrix, src) {
        Some(p) => (p - dst).norm(),
        None => Float::INFINITY
    }
}

/// Hartley normalisation: zero mean and mean distance sqrt(2).
fn normalization(points: &[Vector2<Float>]) -> Option<Matrix3<Float>> {
    let n = points.len() as Float;
    let centroid = points.iter().fold(Vector2::<Float>::zeros(), |acc, p| acc + p)/n;
    let mean_distance = points.iter().map(|p| (p - centroid).norm()).sum::<Float>()/n;
    match mean_distance {
        d if d > Float::EPSILON => {
            let s = (2.0 as Float).sqrt()/d;
            Some(Matrix3::<Float>::new(
                s, 0.0, -s*centroid.x,
                0.0, s, -s*centroid.y,
                0.0, 0.0, 1.0))
        },
        _ => None
    }
}

/**
 * Normalised direct linear transform (Hartley & Zisserman, Alg. 4.2).
 * Returns H with H[2,2] = 1, or `None` for degenerate configurations.
 */
#[allow(non_snake_case)]
pub fn normalized_dlt(src: &[Vector2<Float>], dst: &[Vector2<Float>]) -> Option<Matrix3<Float>> {
    let n = src.len();
    if n < MIN_SAMPLE || dst.len() != n {
        return None;
    }
    let T_src = normalization(src)?;
    let T_dst = normalization(dst)?;

    let rows = (2*n).max(9);
    let mut A = DMatrix::<Float>::zeros(rows, 9);
    for (i, (p, q)) in src.iter().zip(dst.iter()).enumerate() {
        let p_n = T_src*Vector3::<Float>::new(p.x, p.y, 1.0);
        let q_n = T_dst*Vector3::<Float>::new(q.x, q.y, 1.0);
        let (x, y) = (p_n.x, p_n.y);
        let (u, v) = (q_n.x, q_n.y);

        A[(2*i,0)] = -x;
        A[(2*i,1)] = -y;
        A[(2*i,2)] = -1.0;
        A[(2*i,6)] = u*x;
        A[(2*i,7)] = u*y;
        A[(2*i,8)] = u;

        A[(2*i+1,3)] = -x;
        A[(2*i+1,4)] = -y;
        A[(2*i+1,5)] = -1.0;
        A[(2*i+1,6)] = v*x;
        A[(2*i+1,7)] = v*y;
        A[(2*i+1,8)] = v;
    }

    let svd = A.svd(false, true);
    let v_t = svd.v_t?;
    let (min_index, _) = svd.singular_values.argmin();
    let h = v_t.row(min_index);
    let H_n = Matrix3::<Float>::new(
        h[0], h[1], h[2],
        h[3], h[4], h[5],
        h[6], h[7], h[8]);

    let H = T_dst.try_inverse()?*H_n*T_src;
    match H[(2,2)] {
        s if s.abs() > Float::EPSILON && H.iter().all(|v| v.is_finite()) => Some(H/s),
        _ => None
    }
}

fn is_degenerate_sample(points: &[Vector2<Float>]) -> bool {
    for i in 0..points.len() {
        for j in i+1..points.len() {
            for k in j+1..points.len() {
                let area = (points[j] - points[i]).perp(&(points[k] - points[i]));
                if area.abs() < 1e-6 {
                    return true;
                }
            }
        }
    }
    false
}

fn adaptive_iterations(inlier_ratio: Float, confidence: Float, max_iterations: usize) -> usize {
    let w_s = inlier_ratio.powi(MIN_SAMPLE as i32);
    match w_s {
        w if w >= 1.0 - Float::EPSILON => 1,
        w if w <= Float::EPSILON => max_iterations,
        w => (((1.0 - confidence).ln()/(1.0 - w).ln()).ceil() as usize).clamp(1, max_iterations)
    }
}

pub struct HomographyEstimator {
    pub parameters: HomographyParameters
}

impl HomographyEstimator {
    pub fn new(parameters: HomographyParameters) -> HomographyEstimator {
        HomographyEstimator { parameters }
    }

    pub fn estimate_from_correspondences(&self, src: &[Vector2<Float>], dst: &[Vector2<Float>]) -> Result<HomographyResult> {
        if src.len() != dst.len() {
            return Err(PipelineError::InvalidArgument(format!("{} source points but {} destination points", src.len(), dst.len())));
        }
        let required = self.parameters.min_features.max(MIN_SAMPLE);
        if src.len() < required {
            return Err(PipelineError::InsufficientPoints { available: src.len(), required });
        }

        let fitted = match self.parameters.method {
            HomographyMethod::LeastSquares => normalized_dlt(src, dst).map(|h| (h, Float::INFINITY)),
            HomographyMethod::Ransac => self.ransac(src, dst),
            HomographyMethod::LeastMedian => self.least_median(src, dst)
        };

        let result = match fitted {
            Some((matrix, threshold)) => self.refine(src, dst, matrix, threshold),
            None => None
        };

        match result {
            Some(r) => {
                debug!("homography {:?}: {} of {} inliers, rms {:.4} px", self.parameters.method, r.inlier_count(), src.len(), r.rms_error);
                Ok(r)
            },
            None => {
                debug!("homography {:?} degenerate on {} points, falling back to identity", self.parameters.method, src.len());
                Ok(HomographyResult::identity(src.len()))
            }
        }
    }

    fn ransac(&self, src: &[Vector2<Float>], dst: &[Vector2<Float>]) -> Option<(Matrix3<Float>, Float)> {
        let n = src.len();
        let threshold = self.parameters.max_reprojection_error;
        let mut rng = StdRng::seed_from_u64(self.parameters.seed);
        let mut best: Option<(Matrix3<Float>, usize)> = None;
        let mut iteration_limit = self.parameters.max_iterations.max(1);
        let mut iteration = 0;

        while iteration < iteration_limit {
            iteration += 1;
            let indices = sample(&mut rng, n, MIN_SAMPLE).into_vec();
            let sample_src: Vec<Vector2<Float>> = indices.iter().map(|&i| src[i]).collect();
            let sample_dst: Vec<Vector2<Float>> = indices.iter().map(|&i| dst[i]).collect();
            if is_degenerate_sample(&sample_src) || is_degenerate_sample(&sample_dst) {
                continue;
            }
            let matrix = match normalized_dlt(&sample_src, &sample_dst) {
                Some(m) => m,
                None => continue
            };
            let inlier_count = src.iter().zip(dst.iter()).filter(|(p, q)| transfer_error(&matrix, p, q) <= threshold).count();
            best = match best {
                Some((_, count)) if count >= inlier_count => best,
                _ => {
                    iteration_limit = adaptive_iterations(inlier_count as Float/n as Float, self.parameters.confidence, self.parameters.max_iterations.max(1));
                    Some((matrix, inlier_count))
                }
            };
        }

        match best {
            Some((matrix, count)) if count >= MIN_SAMPLE => Some((matrix, threshold)),
            _ => None
        }
    }

    fn least_median(&self, src: &[Vector2<Float>], dst: &[Vector2<Float>]) -> Option<(Matrix3<Float>, Float)> {
        let n = src.len();
        let mut rng = StdRng::seed_from_u64(self.parameters.seed);
        let iterations = adaptive_iterations(1.0 - LEAST_MEDIAN_CONFIDENCE_OUTLIER_RATIO, self.parameters.confidence, self.parameters.max_iterations.max(1));
        let mut best: Option<(Matrix3<Float>, Float)> = None;

        for _ in 0..iterations {
            let indices = sample(&mut rng, n, MIN_SAMPLE).into_vec();
            let sample_src: Vec<Vector2<Float>> = indices.iter().map(|&i| src[i]).collect();
            let sample_dst: Vec<Vector2<Float>> = indices.iter().map(|&i| dst[i]).collect();
            if is_degenerate_sample(&sample_src) || is_degenerate_sample(&sample_dst) {
                continue;
            }
            let matrix = match normalized_dlt(&sample_src, &sample_dst) {
                Some(m) => m,
                None => continue
            };
            let squared: Vec<Float> = src.iter().zip(dst.iter()).map(|(p, q)| transfer_error(&matrix, p, q).powi(2)).collect();
            let median_sq = match median(&squared) {
                Some(m) if m.is_finite() => m,
                _ => continue
            };
            best = match best {
                Some((_, m)) if m <= median_sq => best,
                _ => Some((matrix, median_sq))
            };
        }

        // Rousseeuw & Leroy robust standard deviation
        best.map(|(matrix, median_sq)| {
            let sigma = 1.4826*(1.0 + 5.0/((n as Float - 4.0).max(1.0)))*median_sq.sqrt();
            (matrix, (2.5*sigma).max(Float::EPSILON))
        })
    }

    /// Refits on the inliers of `matrix` and classifies every point against the refit.
    fn refine(&self, src: &[Vector2<Float>], dst: &[Vector2<Float>], matrix: Matrix3<Float>, threshold: Float) -> Option<HomographyResult> {
        let classify = |m: &Matrix3<Float>| -> Vec<bool> {
            src.iter().zip(dst.iter()).map(|(p, q)| transfer_error(m, p, q) <= threshold).collect()
        };
        let initial_inliers = classify(&matrix);
        let (inlier_src, inlier_dst): (Vec<Vector2<Float>>, Vec<Vector2<Float>>) = src.iter().zip(dst.iter())
            .zip(initial_inliers.iter())
            .filter(|(_, inlier)| **inlier)
            .map(|((p, q), _)| (*p, *q))
            .unzip();

        let refit = match self.parameters.method {
            HomographyMethod::LeastSquares => Some(matrix),
            _ => normalized_dlt(&inlier_src, &inlier_dst)
        };
        let final_matrix = match refit {
            Some(m) if classify(&m).iter().filter(|&&v| v).count() >= inlier_src.len() => m,
            _ => matrix
        };

        let errors: Vec<Float> = src.iter().zip(dst.iter()).map(|(p, q)| transfer_error(&final_matrix, p, q)).collect();
        let inliers = classify(&final_matrix);
        let inlier_errors: Vec<Float> = errors.iter().zip(inliers.iter()).filter(|(_, i)| **i).map(|(e, _)| *e).collect();
        if inlier_errors.len() < MIN_SAMPLE {
            return None;
        }

        Some(HomographyResult {
            matrix: final_matrix,
            mean_error: mean(&inlier_errors).unwrap_or(0.0),
            rms_error: rms(&inlier_errors).unwrap_or(0.0),
            inliers,
            errors,
            converged: true
        })
    }
}
