extern crate nalgebra as na;

use na::{Matrix2, Vector2};
use tracing::debug;

use crate::image::{Image, mask::Mask, pyramid::ImagePyramid};
use crate::tracking::{FeatureTracker, corners::shi_tomasi_corners, tracked_points::{TrackedPoint, TrackedPointSet}, tracking_parameters::SparseParameters};
use crate::{Float, PipelineError, Result};

const MIN_EIGENVALUE: Float = 1e-4;

/// Corner seeding plus pyramidal Lucas-Kanade with forward-backward checking.
#[derive(Debug,Clone)]
pub struct SparseTracker {
    pub parameters: SparseParameters
}

impl SparseTracker {
    pub fn new(parameters: SparseParameters) -> SparseTracker {
        SparseTracker { parameters }
    }

    fn build_pyramid(&self, image: &Image) -> ImagePyramid {
        ImagePyramid::build(image, self.parameters.levels, self.parameters.window)
    }

    /// Tracks the given points from `a` into `b` and back. Failed points are invalid with infinite back error.
    pub fn track_points(&self, a: &Image, b: &Image, points: &[Vector2<Float>]) -> Vec<TrackedPoint> {
        let pyramid_a = self.build_pyramid(a);
        let pyramid_b = self.build_pyramid(b);
        let half_window = (self.parameters.window/2).max(1) as isize;

        points.iter().map(|start| {
            let forward = lucas_kanade(&pyramid_a, &pyramid_b, start, start, half_window, &self.parameters);
            let backward = forward.and_then(|end| lucas_kanade(&pyramid_b, &pyramid_a, &end, &end, half_window, &self.parameters).map(|back| (end, back)));
            match backward {
                Some((end, back)) => TrackedPoint {
                    start: *start,
                    end,
                    back_error: (back - start).norm(),
                    confidence: window_correlation(a, b, start, &end, half_window),
                    valid: true
                },
                None => TrackedPoint::failed(*start)
            }
        }).collect()
    }
}

impl FeatureTracker for SparseTracker {
    fn track(&self, a: &Image, b: &Image, mask: &Mask) -> Result<TrackedPointSet> {
        let seeds = shi_tomasi_corners(a, mask, &self.parameters.corners);
        let seeded = seeds.len();
        let mut tracked = TrackedPointSet::new(self.track_points(a, b, &seeds), seeded);
        let rejected = tracked.reject_by_back_error(self.parameters.back_threshold);
        let surviving = tracked.valid_count();
        debug!("sparse tracking: {} seeded, {} tracked, {} rejected by back error, {} surviving", seeded, tracked.tracked_count(), rejected, surviving);

        match surviving {
            s if s < self.parameters.min_features => Err(PipelineError::TrackingFailure { seeded, tracked: tracked.tracked_count(), surviving: s, required: self.parameters.min_features }),
            _ => Ok(tracked)
        }
    }
}

/**
 * Coarse to fine Lucas-Kanade (Bouguet 2000). The spatial gradients of the
 * template are taken from `from` so the 2x2 system matrix is fixed per level.
 * Returns `None` when the window is textureless or the point leaves the image.
 */
pub fn lucas_kanade(from: &ImagePyramid, to: &ImagePyramid, point: &Vector2<Float>, initial_guess: &Vector2<Float>, half_window: isize, parameters: &SparseParameters) -> Option<Vector2<Float>> {
    let top = from.depth().min(to.depth());
    if top == 0 {
        return None;
    }
    let window_pixels = ((2*half_window+1)*(2*half_window+1)) as Float;
    let mut guess = (initial_guess - point)/((1 << (top-1)) as Float);

    for level in (0..top).rev() {
        let scale = (1 << level) as Float;
        let p = point/scale;
        let level_from = &from.levels[level];
        let level_to = &to.levels[level].image;

        let mut template = Vec::<(Float, Float, Float, Float, Float)>::with_capacity(window_pixels as usize);
        let mut g = Matrix2::<Float>::zeros();
        for dy in -half_window..=half_window {
            for dx in -half_window..=half_window {
                let x = p.x + dx as Float;
                let y = p.y + dy as Float;
                let ix = level_from.gradient_x.sample_clamped(x, y);
                let iy = level_from.gradient_y.sample_clamped(x, y);
                g[(0,0)] += ix*ix;
                g[(0,1)] += ix*iy;
                g[(1,1)] += iy*iy;
                template.push((dx as Float, dy as Float, level_from.image.sample_clamped(x, y), ix, iy));
            }
        }
        g[(1,0)] = g[(0,1)];

        let min_eigenvalue = 0.5*(g[(0,0)] + g[(1,1)]) - (0.25*(g[(0,0)] - g[(1,1)]).powi(2) + g[(0,1)].powi(2)).sqrt();
        if min_eigenvalue/window_pixels < MIN_EIGENVALUE {
            return None;
        }
        let g_inv = g.try_inverse()?;

        let mut v = Vector2::<Float>::zeros();
        for _ in 0..parameters.max_iterations {
            let mut mismatch = Vector2::<Float>::zeros();
            for &(dx, dy, value, ix, iy) in template.iter() {
                let target = level_to.sample_clamped(p.x + guess.x + v.x + dx, p.y + guess.y + v.y + dy);
                let diff = value - target;
                mismatch.x += diff*ix;
                mismatch.y += diff*iy;
            }
            let eta = g_inv*mismatch;
            v += eta;
            if !v.x.is_finite() || !v.y.is_finite() {
                return None;
            }
            if eta.norm() < parameters.epsilon {
                break;
            }
        }

        guess = match level {
            0 => guess + v,
            _ => (guess + v)*2.0
        };
    }

    let end = point + guess;
    let inside = end.x >= 0.0 && end.y >= 0.0 && end.x <= (to.levels[0].image.width() - 1) as Float && end.y <= (to.levels[0].image.height() - 1) as Float;
    match inside {
        true => Some(end),
        false => None
    }
}

/// Zero mean normalised cross correlation of the windows around `p` in `a` and `q` in `b`.
pub fn window_correlation(a: &Image, b: &Image, p: &Vector2<Float>, q: &Vector2<Float>, half_window: isize) -> Float {
    let mut samples_a = Vec::<Float>::new();
    let mut samples_b = Vec::<Float>::new();
    for dy in -half_window..=half_window {
        for dx in -half_window..=half_window {
            samples_a.push(a.sample_clamped(p.x + dx as Float, p.y + dy as Float));
            samples_b.push(b.sample_clamped(q.x + dx as Float, q.y + dy as Float));
        }
    }
    let n = samples_a.len() as Float;
    let mean_a = samples_a.iter().sum::<Float>()/n;
    let mean_b = samples_b.iter().sum::<Float>()/n;
    let (mut cross, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (va, vb) in samples_a.iter().zip(samples_b.iter()) {
        cross += (va - mean_a)*(vb - mean_b);
        var_a += (va - mean_a).powi(2);
        var_b += (vb - mean_b).powi(2);
    }
    match (var_a*var_b).sqrt() {
        d if d > Float::EPSILON => cross/d,
        _ => 0.0
    }
}
