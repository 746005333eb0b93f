extern crate nalgebra as na;

use na::Vector2;
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::homography::{HomographyEstimator, HomographyResult, homography_parameters::HomographyParameters};
use crate::image::{Image, mask::Mask};
use crate::sensors::camera::camera_model::CameraModel;
use crate::terrain::TerrainModel;
use crate::tracking::{FeatureTracker, sparse::SparseTracker, tracked_points::TrackedPointSet, tracking_parameters::SparseParameters};
use crate::{Float, PipelineError, Result};
use self::{frame_source::FrameSource, velocity_result::{PairDiagnostics, VelocityPoint, VelocityResult}};

pub mod frame_source;
pub mod velocity_result;

/// Camera motion correction applied to every pair. Matrices act on undistorted pixels.
#[derive(Debug,Clone)]
pub enum HomographySource {
    None,
    /// One result per consecutive pair
    Precomputed(Vec<HomographyResult>),
    /// Sparse tracking on a stable terrain mask followed by estimation, per pair
    Estimate {
        mask: Mask,
        tracking: SparseParameters,
        parameters: HomographyParameters
    }
}

pub struct VelocityEngine<'a, T: FeatureTracker + Sync> {
    pub camera: &'a CameraModel,
    pub terrain: &'a TerrainModel,
    pub mask: &'a Mask,
    pub tracker: T,
    pub homography: HomographySource
}

impl<'a, T: FeatureTracker + Sync> VelocityEngine<'a, T> {
    pub fn new(camera: &'a CameraModel, terrain: &'a TerrainModel, mask: &'a Mask, tracker: T, homography: HomographySource) -> VelocityEngine<'a, T> {
        VelocityEngine { camera, terrain, mask, tracker, homography }
    }

    /// One result per consecutive pair, in sequence order. Pairs are independent and run in parallel.
    pub fn run(&self, frames: &dyn FrameSource) -> Vec<VelocityResult> {
        let pair_count = frames.len().saturating_sub(1);
        info!("computing velocities for {} image pairs", pair_count);

        let mut results = (0..pair_count).into_par_iter()
            .map(|i| self.process_pair(frames, i))
            .collect::<Vec<VelocityResult>>();
        results.sort_by_key(|r| r.pair_index);
        results
    }

    pub fn process_pair(&self, frames: &dyn FrameSource, pair_index: usize) -> VelocityResult {
        let image_a = frames.name(pair_index);
        let image_b = frames.name(pair_index + 1);
        let loaded = frames.load(pair_index).and_then(|a| frames.load(pair_index + 1).map(|b| (a, b)));

        let result = match loaded {
            Ok((a, b)) => self.process_images(&a, &b, pair_index, image_a, image_b),
            Err(e) => VelocityResult {
                pair_index,
                image_a,
                image_b,
                points: Vec::new(),
                diagnostics: PairDiagnostics { failure: Some(e.to_string()), ..PairDiagnostics::default() },
                homography: None
            }
        };
        log_pair(&result);
        result
    }

    pub fn process_images(&self, a: &Image, b: &Image, pair_index: usize, image_a: String, image_b: String) -> VelocityResult {
        let homography = self.homography_for_pair(a, b, pair_index);
        let mut diagnostics = PairDiagnostics {
            homography_rms_error: homography.as_ref().filter(|h| h.converged).map(|h| h.rms_error),
            ..PairDiagnostics::default()
        };

        let tracked = match self.tracker.track(a, b, self.mask) {
            Ok(tracked) => tracked,
            Err(PipelineError::TrackingFailure { seeded, tracked, surviving, required }) => {
                diagnostics.seeded = seeded;
                diagnostics.tracked = tracked;
                diagnostics.failure = Some(format!("tracking failed with {} surviving points, {} required", surviving, required));
                TrackedPointSet::empty(seeded)
            },
            Err(e) => {
                diagnostics.failure = Some(e.to_string());
                TrackedPointSet::empty(0)
            }
        };
        if diagnostics.failure.is_none() {
            diagnostics.seeded = tracked.seeded;
            diagnostics.tracked = tracked.tracked_count();
            diagnostics.mean_back_error = tracked.mean_back_error();
        }

        let valid = tracked.into_valid();
        let mut points = Vec::<VelocityPoint>::with_capacity(valid.len());
        for tracked_point in valid.points.iter() {
            let start = self.camera.undistort_point(&tracked_point.start);
            let end_undistorted = self.camera.undistort_point(&tracked_point.end);
            let end = match &homography {
                Some(h) => h.apply_inverse(&end_undistorted),
                None => end_undistorted
            };

            let unprojected = self.camera.unproject_undistorted(&start, self.terrain)
                .and_then(|world_start| self.camera.unproject_undistorted(&end, self.terrain).map(|world_end| (world_start, world_end)));
            let (world_start, world_end) = match unprojected {
                Ok(pair) => pair,
                Err(_) => {
                    diagnostics.unprojection_dropped += 1;
                    continue;
                }
            };

            let pixel_displacement = end - start;
            let world_displacement = world_end - world_start;
            let back_error = match tracked_point.back_error {
                e if e.is_finite() => e,
                _ => 0.0
            };
            let pixel_error = back_error + diagnostics.homography_rms_error.unwrap_or(0.0);
            let gsd = self.ground_sampling_distance(&start, &world_start)
                .unwrap_or_else(|| match pixel_displacement.norm() {
                    d if d > Float::EPSILON => world_displacement.norm()/d,
                    _ => 0.0
                });

            points.push(VelocityPoint {
                pixel_start: tracked_point.start,
                pixel_end: tracked_point.end,
                pixel_end_corrected: end,
                pixel_displacement,
                pixel_error,
                world_start,
                world_end,
                world_displacement,
                world_error: pixel_error*gsd
            });
        }
        diagnostics.surviving = points.len();

        VelocityResult { pair_index, image_a, image_b, points, diagnostics, homography }
    }

    /// World distance covered by a one pixel step to the right of an ideal pixel.
    fn ground_sampling_distance(&self, ideal_pixel: &Vector2<Float>, world: &na::Vector3<Float>) -> Option<Float> {
        let neighbour = ideal_pixel + Vector2::<Float>::new(1.0, 0.0);
        self.camera.unproject_undistorted(&neighbour, self.terrain).ok().map(|p| (p - world).norm())
    }

    fn homography_for_pair(&self, a: &Image, b: &Image, pair_index: usize) -> Option<HomographyResult> {
        match &self.homography {
            HomographySource::None => None,
            HomographySource::Precomputed(results) => {
                let result = results.get(pair_index).cloned();
                if result.is_none() {
                    warn!("pair {}: no precomputed homography, continuing without correction", pair_index);
                }
                result
            },
            HomographySource::Estimate { mask, tracking, parameters } => {
                match estimate_homography(self.camera, a, b, mask, tracking, parameters) {
                    Ok(h) => Some(h),
                    Err(e) if e.is_recoverable() => {
                        warn!("pair {}: homography unavailable ({}), continuing without correction", pair_index, e);
                        None
                    },
                    Err(e) => {
                        error!("pair {}: homography estimation failed ({}), continuing without correction", pair_index, e);
                        None
                    }
                }
            }
        }
    }
}

/// Tracks the stable mask and fits a homography between the undistorted correspondences.
pub fn estimate_homography(camera: &CameraModel, a: &Image, b: &Image, mask: &Mask, tracking: &SparseParameters, parameters: &HomographyParameters) -> Result<HomographyResult> {
    let tracked = SparseTracker::new(tracking.clone()).track(a, b, mask)?.into_valid();
    let (src, dst): (Vec<Vector2<Float>>, Vec<Vector2<Float>>) = tracked.points.iter()
        .map(|p| (camera.undistort_point(&p.start), camera.undistort_point(&p.end)))
        .unzip();
    HomographyEstimator::new(parameters.clone()).estimate_from_correspondences(&src, &dst)
}

fn log_pair(result: &VelocityResult) -> () {
    let d = &result.diagnostics;
    info!("pair {} ({} -> {}): seeded {}, tracked {}, dropped {}, surviving {}, mean back error {}, homography rms {}",
        result.pair_index, result.image_a, result.image_b, d.seeded, d.tracked, d.unprojection_dropped, d.surviving,
        d.mean_back_error.map_or("n/a".to_string(), |v| format!("{:.3}", v)),
        d.homography_rms_error.map_or("n/a".to_string(), |v| format!("{:.3}", v)));
    if let Some(reason) = &d.failure {
        warn!("pair {} degraded: {}", result.pair_index, reason);
    }
}
