extern crate nalgebra as na;

mod common;

use na::{Vector2, Vector3};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

use glacier_velocity::calibration::{CalibrationOptimiser, GroundControlPoints, calibration_parameters::{CalibrationParameters, ParameterSubset}, reprojection_residuals, world_residuals};
use glacier_velocity::numerics::optimizer::OptimisationMethod;
use glacier_velocity::sensors::camera::camera_model::{CameraModel, Pose};
use glacier_velocity::{Float, PipelineError};

fn synthetic_gcps(camera: &CameraModel, noise_sigma: Float, seed: u64) -> GroundControlPoints {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, noise_sigma).unwrap();
    let mut world = Vec::new();
    let mut pixels = Vec::new();
    for &x in [-40.0, -20.0, 0.0, 20.0, 40.0].iter() {
        for &y in [60.0, 100.0, 140.0, 180.0].iter() {
            let z = 0.05*x + 0.02*y;
            let point = Vector3::<Float>::new(x, y, z);
            let pixel = camera.project(&point).unwrap();
            world.push(point);
            pixels.push(pixel + Vector2::<Float>::new(noise.sample(&mut rng), noise.sample(&mut rng)));
        }
    }
    GroundControlPoints::new(world, pixels).unwrap()
}

fn perturbed(camera: &CameraModel) -> CameraModel {
    camera.with_pose(Pose::new(camera.pose.yaw + 3.0, camera.pose.pitch - 2.0, camera.pose.roll + 1.5))
}

fn assert_pose_recovered(recovered: &Pose, truth: &Pose, tolerance: Float) {
    assert!((recovered.yaw - truth.yaw).abs() < tolerance, "yaw {} vs {}", recovered.yaw, truth.yaw);
    assert!((recovered.pitch - truth.pitch).abs() < tolerance, "pitch {} vs {}", recovered.pitch, truth.pitch);
    assert!((recovered.roll - truth.roll).abs() < tolerance, "roll {} vs {}", recovered.roll, truth.roll);
}

fn pose_parameters(method: OptimisationMethod) -> CalibrationParameters {
    CalibrationParameters { subset: ParameterSubset::Pose, method, ..CalibrationParameters::default() }
}

#[test]
fn levenberg_marquardt_recovers_pose() {
    common::init_tracing();
    let truth = common::camera();
    let gcps = synthetic_gcps(&truth, 0.3, 1);
    let result = CalibrationOptimiser::new(pose_parameters(OptimisationMethod::LevenbergMarquardt)).optimise(&perturbed(&truth), &gcps).unwrap();
    assert_pose_recovered(&result.camera.pose, &truth.pose, 0.2);
    assert!(result.rms < result.initial_rms);
    assert!(result.rms < 1.0);
    assert_eq!(result.residuals.len(), gcps.len());
}

#[test]
fn trust_region_recovers_pose() {
    common::init_tracing();
    let truth = common::camera();
    let gcps = synthetic_gcps(&truth, 0.3, 2);
    let result = CalibrationOptimiser::new(pose_parameters(OptimisationMethod::TrustRegion)).optimise(&perturbed(&truth), &gcps).unwrap();
    assert_pose_recovered(&result.camera.pose, &truth.pose, 0.2);
    assert!(result.rms < 1.0);
}

#[test]
fn noise_free_calibration_is_exact() {
    let truth = common::camera();
    let gcps = synthetic_gcps(&truth, 1e-12, 3);
    let result = CalibrationOptimiser::new(CalibrationParameters::default()).optimise(&perturbed(&truth), &gcps).unwrap();
    assert!(result.converged());
    assert_pose_recovered(&result.camera.pose, &truth.pose, 1e-4);
}

#[test]
fn two_pass_refines_intrinsics_after_pose() {
    let truth = common::camera();
    let gcps = synthetic_gcps(&truth, 0.2, 4);
    let mut start = perturbed(&truth);
    start.intrinsics.fx *= 1.03;
    start.intrinsics.fy *= 1.03;

    let result = CalibrationOptimiser::new(pose_parameters(OptimisationMethod::LevenbergMarquardt)).optimise_two_pass(&start, &gcps).unwrap();
    assert!(result.pose.rms < result.pose.initial_rms);
    assert!(result.intrinsics.rms <= result.pose.rms + 1e-9);
    assert_pose_recovered(&result.intrinsics.camera.pose, &result.pose.camera.pose, 1e-9);
    assert!(result.intrinsics.camera.intrinsics.is_valid());
}

#[test]
fn too_few_points_is_an_error() {
    let truth = common::camera();
    let full = synthetic_gcps(&truth, 1e-12, 5);
    let gcps = GroundControlPoints::new(full.world[..1].to_vec(), full.pixels[..1].to_vec()).unwrap();
    let result = CalibrationOptimiser::new(CalibrationParameters::default()).optimise(&truth, &gcps);
    assert!(matches!(result, Err(PipelineError::InsufficientPoints { available: 1, .. })));
}

#[test]
fn mismatched_gcp_lengths_are_rejected() {
    let result = GroundControlPoints::new(vec![Vector3::<Float>::zeros(); 3], vec![Vector2::<Float>::zeros(); 2]);
    assert!(matches!(result, Err(PipelineError::InvalidArgument(_))));
}

#[test]
fn exhausted_iterations_report_convergence_error() {
    let truth = common::camera();
    let gcps = synthetic_gcps(&truth, 0.5, 6);
    let mut parameters = pose_parameters(OptimisationMethod::LevenbergMarquardt);
    parameters.optimizer.max_iterations = 1;
    let result = CalibrationOptimiser::new(parameters).optimise(&perturbed(&truth), &gcps).unwrap();
    assert!(!result.converged());
    assert!(matches!(result.convergence_error, Some(PipelineError::Convergence { iterations: 1, .. })));
}

#[test]
fn world_residuals_vanish_for_exact_control_points() {
    let truth = common::camera();
    let terrain = common::flat_terrain();
    let world = vec![Vector3::<Float>::new(0.0, 100.0, 0.0), Vector3::<Float>::new(25.0, 80.0, 0.0)];
    let pixels = world.iter().map(|p| truth.project(p).unwrap()).collect::<Vec<_>>();
    let gcps = GroundControlPoints::new(world, pixels).unwrap();

    let residuals = world_residuals(&truth, &terrain, &gcps);
    assert_eq!(residuals.len(), 2);
    assert!(residuals.iter().all(|r| r.map_or(false, |v| v < 1e-6)));
    assert!(reprojection_residuals(&truth, &gcps).iter().all(|r| *r < 1e-9));
}
