extern crate nalgebra as na;

use na::{DVector, Vector2, Vector3};
use tracing::{info, warn};

use crate::numerics::{rms, optimizer::{optimize, LeastSquaresProblem}};
use crate::sensors::camera::{camera_model::{CameraModel, Pose}, distortion::Distortion, pinhole::Pinhole};
use crate::terrain::TerrainModel;
use crate::{Float, PipelineError, Result};
use self::calibration_parameters::*;

pub mod calibration_parameters;

/// Pixel penalty per component for a control point that does not project.
pub const PROJECTION_PENALTY: Float = 1e4;

/// Surveyed world coordinates paired with their observed pixels.
#[derive(Debug,Clone,PartialEq)]
pub struct GroundControlPoints {
    pub world: Vec<Vector3<Float>>,
    pub pixels: Vec<Vector2<Float>>
}

impl GroundControlPoints {
    pub fn new(world: Vec<Vector3<Float>>, pixels: Vec<Vector2<Float>>) -> Result<GroundControlPoints> {
        match world.len() == pixels.len() {
            true => Ok(GroundControlPoints { world, pixels }),
            false => Err(PipelineError::InvalidArgument(format!("{} world coordinates but {} pixel coordinates", world.len(), pixels.len())))
        }
    }

    pub fn len(&self) -> usize {
        self.world.len()
    }

    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }
}

#[derive(Debug)]
pub struct CalibrationResult {
    pub camera: CameraModel,
    /// Euclidean reprojection error per control point in pixels
    pub residuals: Vec<Float>,
    pub initial_rms: Float,
    pub rms: Float,
    pub iterations: usize,
    /// Set when the iteration budget ran out; `camera` still holds the best parameters.
    pub convergence_error: Option<PipelineError>
}

impl CalibrationResult {
    pub fn converged(&self) -> bool {
        self.convergence_error.is_none()
    }
}

#[derive(Debug)]
pub struct TwoPassResult {
    pub pose: CalibrationResult,
    pub intrinsics: CalibrationResult
}

pub fn camera_to_parameters(camera: &CameraModel) -> DVector<Float> {
    let mut parameters = DVector::<Float>::zeros(CAMERA_PARAMETER_COUNT);
    parameters.fixed_rows_mut::<3>(LOCATION_OFFSET).copy_from(&camera.location);
    parameters[POSE_OFFSET] = camera.pose.yaw;
    parameters[POSE_OFFSET+1] = camera.pose.pitch;
    parameters[POSE_OFFSET+2] = camera.pose.roll;
    parameters[INTRINSICS_OFFSET] = camera.intrinsics.fx;
    parameters[INTRINSICS_OFFSET+1] = camera.intrinsics.fy;
    parameters[INTRINSICS_OFFSET+2] = camera.intrinsics.cx;
    parameters[INTRINSICS_OFFSET+3] = camera.intrinsics.cy;
    for i in 0..3 {
        parameters[RADIAL_OFFSET+i] = camera.distortion.radial[i];
    }
    for i in 0..2 {
        parameters[TANGENTIAL_OFFSET+i] = camera.distortion.tangential[i];
    }
    parameters
}

/// Builds a camera without validation; pose angles are normalised.
pub fn parameters_to_camera(parameters: &DVector<Float>, image_dimensions: (usize, usize)) -> CameraModel {
    let p = |i: usize| parameters[i];
    CameraModel {
        location: Vector3::<Float>::new(p(LOCATION_OFFSET), p(LOCATION_OFFSET+1), p(LOCATION_OFFSET+2)),
        pose: Pose::new(p(POSE_OFFSET), p(POSE_OFFSET+1), p(POSE_OFFSET+2)),
        intrinsics: Pinhole::new(p(INTRINSICS_OFFSET), p(INTRINSICS_OFFSET+1), p(INTRINSICS_OFFSET+2), p(INTRINSICS_OFFSET+3)),
        distortion: Distortion::new([p(RADIAL_OFFSET), p(RADIAL_OFFSET+1), p(RADIAL_OFFSET+2)], [p(TANGENTIAL_OFFSET), p(TANGENTIAL_OFFSET+1)]),
        image_dimensions
    }
}

/// (u_proj - u_gcp, v_proj - v_gcp) per control point.
fn stacked_residuals(camera: &CameraModel, gcps: &GroundControlPoints) -> DVector<Float> {
    let mut residuals = DVector::<Float>::zeros(2*gcps.len());
    for (i, (world, pixel)) in gcps.world.iter().zip(gcps.pixels.iter()).enumerate() {
        let (du, dv) = match camera.project(world) {
            Ok(projected) => (projected.x - pixel.x, projected.y - pixel.y),
            Err(_) => (PROJECTION_PENALTY, PROJECTION_PENALTY)
        };
        residuals[2*i] = du;
        residuals[2*i+1] = dv;
    }
    residuals
}

/// Euclidean pixel reprojection error per control point.
pub fn reprojection_residuals(camera: &CameraModel, gcps: &GroundControlPoints) -> Vec<Float> {
    let stacked = stacked_residuals(camera, gcps);
    (0..gcps.len()).map(|i| (stacked[2*i].powi(2) + stacked[2*i+1].powi(2)).sqrt()).collect()
}

/// 3D distance between each surveyed coordinate and the terrain point seen at its pixel.
pub fn world_residuals(camera: &CameraModel, terrain: &TerrainModel, gcps: &GroundControlPoints) -> Vec<Option<Float>> {
    gcps.world.iter().zip(gcps.pixels.iter())
        .map(|(world, pixel)| camera.unproject(pixel, terrain).ok().map(|p| (p - world).norm()))
        .collect()
}

struct CalibrationProblem<'a> {
    base: DVector<Float>,
    subset: ParameterSubset,
    image_dimensions: (usize, usize),
    gcps: &'a GroundControlPoints
}

impl<'a> CalibrationProblem<'a> {
    fn full_parameters(&self, free: &DVector<Float>) -> DVector<Float> {
        let mut full = self.base.clone();
        for (k, i) in self.subset.indices().enumerate() {
            full[i] = free[k];
        }
        full
    }
}

impl<'a> LeastSquaresProblem for CalibrationProblem<'a> {
    fn residuals(&self, parameters: &DVector<Float>) -> DVector<Float> {
        let camera = parameters_to_camera(&self.full_parameters(parameters), self.image_dimensions);
        stacked_residuals(&camera, self.gcps)
    }

    fn is_admissible(&self, parameters: &DVector<Float>) -> bool {
        let full = self.full_parameters(parameters);
        (INTRINSICS_OFFSET..INTRINSICS_OFFSET+4).all(|i| full[i] > 0.0) && full.iter().all(|v| v.is_finite())
    }
}

pub struct CalibrationOptimiser {
    pub parameters: CalibrationParameters
}

impl CalibrationOptimiser {
    pub fn new(parameters: CalibrationParameters) -> CalibrationOptimiser {
        CalibrationOptimiser { parameters }
    }

    pub fn optimise(&self, camera: &CameraModel, gcps: &GroundControlPoints) -> Result<CalibrationResult> {
        self.optimise_subset(camera, gcps, self.parameters.subset)
    }

    /// Minimises the pixel reprojection error over the selected parameters only.
    pub fn optimise_subset(&self, camera: &CameraModel, gcps: &GroundControlPoints, subset: ParameterSubset) -> Result<CalibrationResult> {
        if gcps.world.len() != gcps.pixels.len() {
            return Err(PipelineError::InvalidArgument(format!("{} world coordinates but {} pixel coordinates", gcps.world.len(), gcps.pixels.len())));
        }
        if 2*gcps.len() < subset.len() {
            return Err(PipelineError::InsufficientPoints { available: gcps.len(), required: (subset.len() + 1)/2 });
        }

        let base = camera_to_parameters(camera);
        let initial = DVector::<Float>::from_iterator(subset.len(), subset.indices().map(|i| base[i]));
        let problem = CalibrationProblem { base, subset, image_dimensions: camera.image_dimensions, gcps };

        let initial_residuals = reprojection_residuals(camera, gcps);
        let initial_rms = rms(&initial_residuals).unwrap_or(0.0);
        info!("optimising {} with {} on {} control points, initial rms {:.4} px", subset, self.parameters.method, gcps.len(), initial_rms);

        let result = optimize(&problem, &initial, self.parameters.method, &self.parameters.optimizer);
        let optimised_camera = parameters_to_camera(&problem.full_parameters(&result.parameters), camera.image_dimensions);
        let residuals = reprojection_residuals(&optimised_camera, gcps);
        let final_rms = rms(&residuals).unwrap_or(0.0);

        let convergence_error = match result.converged() {
            true => None,
            false => {
                warn!("{} optimisation stopped after {} iterations without converging, rms {:.4} px", subset, result.iterations, final_rms);
                Some(PipelineError::Convergence { iterations: result.iterations, rms: final_rms })
            }
        };
        info!("{} optimisation finished: {:?} after {} iterations, rms {:.4} px", subset, result.termination, result.iterations, final_rms);

        Ok(CalibrationResult {
            camera: optimised_camera,
            residuals,
            initial_rms,
            rms: final_rms,
            iterations: result.iterations,
            convergence_error
        })
    }

    /// Pose first, then intrinsics starting from the refined pose.
    pub fn optimise_two_pass(&self, camera: &CameraModel, gcps: &GroundControlPoints) -> Result<TwoPassResult> {
        let pose = self.optimise_subset(camera, gcps, ParameterSubset::Pose)?;
        let intrinsics = self.optimise_subset(&pose.camera, gcps, ParameterSubset::Intrinsics)?;
        Ok(TwoPassResult { pose, intrinsics })
    }
}
