extern crate nalgebra as na;

use na::{DMatrix, Vector2};
use tracing::debug;

use crate::image::{Image, mask::Mask};
use crate::numerics::parabola_vertex_offset;
use crate::tracking::{FeatureTracker, tracked_points::{TrackedPoint, TrackedPointSet}, tracking_parameters::{DenseParameters, MatchingMethod}};
use crate::{Float, PipelineError, Result};

/// Result of matching one template inside a search window.
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct TemplateMatch {
    pub position: Vector2<Float>,
    pub score: Float
}

/// Regular grid template matching.
#[derive(Debug,Clone)]
pub struct DenseTracker {
    pub parameters: DenseParameters
}

impl DenseTracker {
    pub fn new(parameters: DenseParameters) -> DenseTracker {
        DenseTracker { parameters }
    }

    /// Grid nodes inside the mask whose template fits into the image.
    pub fn grid_points(&self, image: &Image, mask: &Mask) -> Vec<Vector2<Float>> {
        let t = self.parameters.template;
        let spacing = self.parameters.grid_spacing.max(1);
        if image.width() <= 2*t || image.height() <= 2*t {
            return Vec::new();
        }
        let mut points = Vec::<Vector2<Float>>::new();
        for v in (t..image.height()-t).step_by(spacing) {
            for u in (t..image.width()-t).step_by(spacing) {
                if mask.contains(u as Float, v as Float) {
                    points.push(Vector2::<Float>::new(u as Float, v as Float));
                }
            }
        }
        points
    }

    /**
     * Matches the template centred on the integer pixel `center` of `source`
     * inside `target`, searching +-search pixels around the same location.
     * The peak is refined with a parabola through its direct neighbours.
     */
    pub fn match_template(&self, source: &Image, target: &Image, center: (usize, usize)) -> Option<TemplateMatch> {
        let t = self.parameters.template;
        let s = self.parameters.search as isize;
        let (u, v) = center;
        if u < t || v < t || u + t >= source.width() || v + t >= source.height() {
            return None;
        }
        let side = 2*t + 1;
        let template = source.buffer.view((v - t, u - t), (side, side)).clone_owned();

        let offset_count = (2*s + 1) as usize;
        let mut scores = DMatrix::<Float>::from_element(offset_count, offset_count, Float::NAN);
        let mut best: Option<(Float, usize, usize)> = None;
        for (row, dy) in (-s..=s).enumerate() {
            for (col, dx) in (-s..=s).enumerate() {
                let tu = u as isize + dx;
                let tv = v as isize + dy;
                if tu < t as isize || tv < t as isize || tu as usize + t >= target.width() || tv as usize + t >= target.height() {
                    continue;
                }
                let window = target.buffer.view((tv as usize - t, tu as usize - t), (side, side)).clone_owned();
                let score = match_score(&template, &window, self.parameters.method);
                scores[(row,col)] = score;
                best = match best {
                    Some((b, _, _)) if b >= score => best,
                    _ => Some((score, row, col))
                };
            }
        }

        let (score, row, col) = best?;
        let neighbour = |r: isize, c: isize| -> Option<Float> {
            match (r, c) {
                (r, c) if r < 0 || c < 0 || r >= offset_count as isize || c >= offset_count as isize => None,
                (r, c) => Some(scores[(r as usize, c as usize)]).filter(|v| v.is_finite())
            }
        };
        let offset_x = match (neighbour(row as isize, col as isize - 1), neighbour(row as isize, col as isize + 1)) {
            (Some(left), Some(right)) => parabola_vertex_offset(left, score, right),
            _ => 0.0
        };
        let offset_y = match (neighbour(row as isize - 1, col as isize), neighbour(row as isize + 1, col as isize)) {
            (Some(up), Some(down)) => parabola_vertex_offset(up, score, down),
            _ => 0.0
        };

        Some(TemplateMatch {
            position: Vector2::<Float>::new(
                u as Float + (col as isize - s) as Float + offset_x,
                v as Float + (row as isize - s) as Float + offset_y),
            score
        })
    }

    fn track_point(&self, a: &Image, b: &Image, start: &Vector2<Float>) -> TrackedPoint {
        let center = (start.x as usize, start.y as usize);
        let forward = match self.match_template(a, b, center) {
            Some(m) => m,
            None => return TrackedPoint::failed(*start)
        };

        let back_error = match self.parameters.back_threshold {
            Some(_) => {
                let end_pixel = (forward.position.x.round().max(0.0) as usize, forward.position.y.round().max(0.0) as usize);
                match self.match_template(b, a, end_pixel) {
                    Some(back) => {
                        let back_position = back.position + (forward.position - Vector2::<Float>::new(end_pixel.0 as Float, end_pixel.1 as Float));
                        (back_position - start).norm()
                    },
                    None => Float::INFINITY
                }
            },
            None => 0.0
        };

        TrackedPoint {
            start: *start,
            end: forward.position,
            back_error,
            confidence: forward.score,
            valid: forward.score >= self.parameters.correlation_threshold
        }
    }
}

impl FeatureTracker for DenseTracker {
    fn track(&self, a: &Image, b: &Image, mask: &Mask) -> Result<TrackedPointSet> {
        let seeds = self.grid_points(a, mask);
        let seeded = seeds.len();
        let points = seeds.iter().map(|p| self.track_point(a, b, p)).collect();
        let mut tracked = TrackedPointSet::new(points, seeded);
        let below_threshold = seeded - tracked.valid_count();
        let rejected = match self.parameters.back_threshold {
            Some(threshold) => tracked.reject_by_back_error(threshold),
            None => 0
        };
        let surviving = tracked.valid_count();
        debug!("dense tracking: {} grid nodes, {} below correlation threshold, {} rejected by back error, {} surviving", seeded, below_threshold, rejected, surviving);

        match surviving {
            s if s < self.parameters.min_features => Err(PipelineError::TrackingFailure { seeded, tracked: tracked.tracked_count(), surviving: s, required: self.parameters.min_features }),
            _ => Ok(tracked)
        }
    }
}

/// OpenCV TM_CCORR_NORMED and TM_CCOEFF_NORMED scores.
pub fn match_score(template: &DMatrix<Float>, window: &DMatrix<Float>, method: MatchingMethod) -> Float {
    let (t, w) = match method {
        MatchingMethod::CrossCorrelationNormed => (template.clone(), window.clone()),
        MatchingMethod::CoefficientNormed => (template.add_scalar(-template.mean()), window.add_scalar(-window.mean()))
    };
    let denominator = (t.norm_squared()*w.norm_squared()).sqrt();
    match denominator {
        d if d > Float::EPSILON => t.dot(&w)/d,
        _ => 0.0
    }
}
