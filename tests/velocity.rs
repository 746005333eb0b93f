extern crate nalgebra as na;

mod common;

use na::{DMatrix, Matrix3, Vector2};

use glacier_velocity::homography::{HomographyResult, homography_parameters::HomographyParameters};
use glacier_velocity::image::{Image, image_encoding::ImageEncoding, mask::Mask};
use glacier_velocity::numerics::median;
use glacier_velocity::tracking::{TrackingMethod, tracking_parameters::SparseParameters};
use glacier_velocity::velocity::{HomographySource, VelocityEngine, frame_source::{FrameSource, ImageFiles, InMemoryFrames}, velocity_result::VelocityPoint};
use glacier_velocity::io::Band;
use glacier_velocity::Float;

const REGION: (usize, usize, usize, usize) = (50, 150, 40, 110);

fn moving_interior() -> Mask {
    Mask::from_rectangle(common::WIDTH, common::HEIGHT, (66, 56), (134, 94))
}

fn stable_strip() -> Mask {
    Mask::from_rectangle(common::WIDTH, common::HEIGHT, (15, 125), (185, 140))
}

fn union(a: &Mask, b: &Mask) -> Mask {
    Mask::new(DMatrix::<bool>::from_fn(a.height(), a.width(), |r, c| a.buffer[(r,c)] || b.buffer[(r,c)]))
}

/// Region moving right by `region_step` px per frame, whole scene by `camera_step` px per frame.
fn sequence(frame_count: usize, region_step: Float, camera_step: Float) -> InMemoryFrames {
    let (u_min, u_max, v_min, v_max) = REGION;
    let frames = (0..frame_count).map(|index| {
        let k = index as Float;
        let image = common::image_from_fn(common::WIDTH, common::HEIGHT, |u, v| {
            let u_scene = u - camera_step*k;
            let inside = u_scene >= u_min as Float && u_scene < u_max as Float && v >= v_min as Float && v < v_max as Float;
            match inside {
                true => common::texture(u_scene - region_step*k, v),
                false => common::texture(u_scene, v)
            }
        });
        (format!("frame_{}.png", index), image)
    }).collect();
    InMemoryFrames::new(frames)
}

fn median_displacement(points: &[&VelocityPoint]) -> Vector2<Float> {
    let xs = points.iter().map(|p| p.pixel_displacement.x).collect::<Vec<_>>();
    let ys = points.iter().map(|p| p.pixel_displacement.y).collect::<Vec<_>>();
    Vector2::<Float>::new(median(&xs).unwrap(), median(&ys).unwrap())
}

fn split<'a>(points: &'a [VelocityPoint]) -> (Vec<&'a VelocityPoint>, Vec<&'a VelocityPoint>) {
    let moving = moving_interior();
    points.iter().partition(|p| moving.contains(p.pixel_start.x, p.pixel_start.y))
}

#[test]
fn three_frames_give_two_pair_results() {
    common::init_tracing();
    let camera = common::camera();
    let terrain = common::flat_terrain();
    let mask = union(&moving_interior(), &stable_strip());
    let frames = sequence(3, 2.0, 0.0);

    let engine = VelocityEngine::new(&camera, &terrain, &mask, TrackingMethod::Sparse(SparseParameters::default()), HomographySource::None);
    let results = engine.run(&frames);

    assert_eq!(results.len(), 2);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.pair_index, i);
        assert_eq!(result.image_a, format!("frame_{}.png", i));
        assert!(result.diagnostics.failure.is_none());
        assert_eq!(result.diagnostics.surviving, result.points.len());
        assert_eq!(result.diagnostics.unprojection_dropped, 0);

        let (moving, stable) = split(&result.points);
        assert!(moving.len() >= 3, "pair {}: {} moving points", i, moving.len());
        assert!(stable.len() >= 3, "pair {}: {} stable points", i, stable.len());

        let dominant = median_displacement(&moving);
        assert!((dominant - Vector2::<Float>::new(2.0, 0.0)).norm() < 0.1, "pair {}: dominant displacement {:?}", i, dominant);
        assert!(moving.iter().all(|p| p.world_displacement.x > 0.0 && p.world_error >= 0.0));
        assert!(stable.iter().all(|p| p.pixel_displacement.norm() < 0.1 && p.speed() < 0.5), "pair {}: stable points moved", i);
    }
}

#[test]
fn tracking_failure_keeps_tracked_and_surviving_apart() {
    let camera = common::camera();
    let terrain = common::flat_terrain();
    let mask = union(&moving_interior(), &stable_strip());
    let parameters = SparseParameters { min_features: 10_000, ..SparseParameters::default() };
    let engine = VelocityEngine::new(&camera, &terrain, &mask, TrackingMethod::Sparse(parameters), HomographySource::None);
    let results = engine.run(&sequence(2, 2.0, 0.0));

    assert_eq!(results.len(), 1);
    let diagnostics = &results[0].diagnostics;
    assert!(results[0].is_empty());
    assert!(diagnostics.seeded > 0);
    assert!(diagnostics.tracked > 0 && diagnostics.tracked <= diagnostics.seeded, "{:?}", diagnostics);
    assert_eq!(diagnostics.surviving, 0);
    assert!(diagnostics.failure.as_deref().is_some_and(|f| f.contains("10000 required")), "{:?}", diagnostics.failure);
}

#[test]
fn empty_mask_yields_empty_results() {
    let camera = common::camera();
    let terrain = common::flat_terrain();
    let mask = Mask::empty(common::WIDTH, common::HEIGHT);
    let engine = VelocityEngine::new(&camera, &terrain, &mask, TrackingMethod::default(), HomographySource::None);
    let results = engine.run(&sequence(3, 2.0, 0.0));

    assert_eq!(results.len(), 2);
    for result in results.iter() {
        assert!(result.is_empty());
        assert_eq!(result.diagnostics.seeded, 0);
        assert_eq!(result.diagnostics.surviving, 0);
        assert!(result.diagnostics.failure.is_some());
    }
}

#[test]
fn precomputed_homography_is_removed_from_end_points() {
    let camera = common::camera();
    let terrain = common::flat_terrain();
    let mask = stable_strip();
    let translation = HomographyResult {
        matrix: Matrix3::<Float>::new(1.0, 0.0, 2.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0),
        inliers: Vec::new(),
        errors: Vec::new(),
        mean_error: 0.25,
        rms_error: 0.5,
        converged: true
    };
    let engine = VelocityEngine::new(&camera, &terrain, &mask, TrackingMethod::default(), HomographySource::Precomputed(vec![translation]));
    let results = engine.run(&sequence(2, 2.0, 0.0));

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(!result.is_empty());
    assert_eq!(result.diagnostics.homography_rms_error, Some(0.5));
    for p in result.points.iter() {
        assert!((p.pixel_displacement - Vector2::<Float>::new(-2.0, 0.0)).norm() < 0.1);
        assert!((p.pixel_end - p.pixel_start).norm() < 0.1);
        assert!(p.pixel_error >= 0.5);
    }
}

#[test]
fn estimated_homography_removes_camera_motion() {
    common::init_tracing();
    let camera = common::camera();
    let terrain = common::flat_terrain();
    let stable = Mask::new(DMatrix::<bool>::from_fn(common::HEIGHT, common::WIDTH, |r, c| {
        let inside_border = r >= 13 && r < 137 && c >= 13 && c < 187;
        inside_border && (r >= 126 || c < 34 || c >= 166)
    }));
    let homography = HomographySource::Estimate {
        mask: stable,
        tracking: SparseParameters::homography_default(),
        parameters: HomographyParameters::default()
    };
    let tracking_mask = Mask::from_rectangle(common::WIDTH, common::HEIGHT, (68, 56), (134, 94));
    let engine = VelocityEngine::new(&camera, &terrain, &tracking_mask, TrackingMethod::default(), homography);
    let results = engine.run(&sequence(2, 2.0, 1.0));

    let result = &results[0];
    let h = result.homography.as_ref().expect("homography estimated");
    assert!(h.converged);
    assert!((h.apply(&Vector2::<Float>::new(100.0, 75.0)) - Vector2::<Float>::new(101.0, 75.0)).norm() < 0.2);

    let all = result.points.iter().collect::<Vec<_>>();
    assert!(all.len() >= 3);
    let dominant = median_displacement(&all);
    assert!((dominant - Vector2::<Float>::new(2.0, 0.0)).norm() < 0.2, "dominant displacement {:?}", dominant);
}

#[test]
fn missing_frames_degrade_only_their_pair() {
    let camera = common::camera();
    let terrain = common::flat_terrain();
    let mask = moving_interior();
    let files = ImageFiles::new(vec!["/nonexistent/a.png".into(), "/nonexistent/b.png".into()], Band::Luminance, false);
    assert_eq!(files.len(), 2);
    assert_eq!(files.name(1), "b.png");

    let engine = VelocityEngine::new(&camera, &terrain, &mask, TrackingMethod::default(), HomographySource::None);
    let results = engine.run(&files);
    assert_eq!(results.len(), 1);
    assert!(results[0].is_empty());
    assert!(results[0].diagnostics.failure.is_some());
}

#[test]
fn single_frame_has_no_pairs() {
    let camera = common::camera();
    let terrain = common::flat_terrain();
    let mask = moving_interior();
    let frames = InMemoryFrames::new(vec![("only.png".to_string(), Image::empty(common::WIDTH, common::HEIGHT, ImageEncoding::U8))]);
    let engine = VelocityEngine::new(&camera, &terrain, &mask, TrackingMethod::default(), HomographySource::None);
    assert!(engine.run(&frames).is_empty());
}
