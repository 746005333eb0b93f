extern crate nalgebra as na;
extern crate image as image_rs;

mod common;

use std::fs;
use std::path::PathBuf;
use na::{Matrix3, Vector2, Vector3};

use glacier_velocity::config::PipelineConfig;
use glacier_velocity::homography::HomographyResult;
use glacier_velocity::image::{Image, equalize_histogram};
use glacier_velocity::io::{Band, load_image, read_calibration, read_gcps, read_mask, read_terrain_mask, write_calibration, export, terrain_loader::load_ascii_grid};
use glacier_velocity::sensors::camera::distortion::Distortion;
use glacier_velocity::tracking::TrackingMethod;
use glacier_velocity::velocity::velocity_result::{PairDiagnostics, VelocityPoint, VelocityResult};
use glacier_velocity::visualize::{InterpolationMethod, interpolate_velocity_grid, plot};
use glacier_velocity::{Float, PipelineError};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("glacier_velocity_{}_{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn velocity_point(x: Float, y: Float, dx: Float) -> VelocityPoint {
    let start = Vector3::<Float>::new(x, y, 0.0);
    let displacement = Vector3::<Float>::new(dx, 0.0, 0.0);
    VelocityPoint {
        pixel_start: Vector2::<Float>::new(10.0, 20.0),
        pixel_end: Vector2::<Float>::new(12.0, 20.0),
        pixel_end_corrected: Vector2::<Float>::new(12.0, 20.0),
        pixel_displacement: Vector2::<Float>::new(2.0, 0.0),
        pixel_error: 0.3,
        world_start: start,
        world_end: start + displacement,
        world_displacement: displacement,
        world_error: 0.6
    }
}

fn result_with(points: Vec<VelocityPoint>) -> VelocityResult {
    VelocityResult {
        pair_index: 0,
        image_a: "IMG_0001.JPG".to_string(),
        image_b: "IMG_0002.JPG".to_string(),
        diagnostics: PairDiagnostics { surviving: points.len(), ..PairDiagnostics::default() },
        points,
        homography: None
    }
}

#[test]
fn gcp_file_round_trip() {
    let dir = scratch_dir("gcps");
    let path = dir.join("gcps.txt");
    fs::write(&path, "# surveyed points\nx y z u v\n1011000.5 6545000.25 2400.0 120.5 300.0\n1011100.0 6545100.0 2410.5 400.0 310.25\n\n").unwrap();

    let gcps = read_gcps(&path).unwrap();
    assert_eq!(gcps.len(), 2);
    assert_eq!(gcps.world[1], Vector3::<Float>::new(1011100.0, 6545100.0, 2410.5));
    assert_eq!(gcps.pixels[0], Vector2::<Float>::new(120.5, 300.0));
}

#[test]
fn malformed_gcp_rows_are_rejected() {
    let dir = scratch_dir("bad_gcps");
    let path = dir.join("gcps.txt");
    fs::write(&path, "1 2 3 4\n").unwrap();
    assert!(matches!(read_gcps(&path), Err(PipelineError::MalformedInput { .. })));
    assert!(matches!(read_gcps(&dir.join("missing.txt")), Err(PipelineError::Io(_))));
}

#[test]
fn calibration_file_round_trip() {
    let dir = scratch_dir("calibration");
    let path = dir.join("calibration.txt");
    let pinhole = common::pinhole();
    let distortion = Distortion::new([-0.12, 0.031, -0.002], [0.0004, -0.0007]);
    write_calibration(&path, &pinhole, &distortion).unwrap();

    let (read_pinhole, read_distortion) = read_calibration(&path).unwrap();
    assert!((read_pinhole.fx - pinhole.fx).abs() < 1e-9);
    assert!((read_pinhole.cx - pinhole.cx).abs() < 1e-9);
    assert!((read_pinhole.cy - pinhole.cy).abs() < 1e-9);
    for i in 0..3 {
        assert!((read_distortion.radial[i] - distortion.radial[i]).abs() < 1e-9);
    }
    for i in 0..2 {
        assert!((read_distortion.tangential[i] - distortion.tangential[i]).abs() < 1e-9);
    }
}

#[test]
fn calibration_matrix_is_stored_transposed() {
    let dir = scratch_dir("calibration_layout");
    let path = dir.join("calibration.txt");
    fs::write(&path, "RadialDistortion\n-0.1 0.01\nTangentialDistortion\n0 0\nIntrinsicMatrix\n1500 0 0\n0 1510 0\n960 640 1\n").unwrap();
    let (pinhole, distortion) = read_calibration(&path).unwrap();
    assert_eq!((pinhole.fx, pinhole.fy, pinhole.cx, pinhole.cy), (1500.0, 1510.0, 960.0, 640.0));
    assert_eq!(distortion.radial, [-0.1, 0.01, 0.0]);
}

#[test]
fn equalisation_spans_full_range() {
    let low_contrast = image_rs::GrayImage::from_fn(64, 32, |x, y| image_rs::Luma([100 + ((x + y) % 20) as u8]));
    let equalised = equalize_histogram(&low_contrast);
    let values = equalised.pixels().map(|p| p.0[0]).collect::<Vec<u8>>();
    assert_eq!(values.iter().min(), Some(&0));
    assert_eq!(values.iter().max(), Some(&255));

    let constant = image_rs::GrayImage::from_pixel(8, 8, image_rs::Luma([42]));
    assert_eq!(equalize_histogram(&constant), constant);
}

#[test]
fn band_extraction_and_mask_reading() {
    let dir = scratch_dir("bands");
    let path = dir.join("rgb.png");
    image_rs::RgbImage::from_fn(20, 10, |x, _| image_rs::Rgb([x as u8*10, 7, 200])).save(&path).unwrap();
    let red = load_image(&path, Band::Red, false).unwrap();
    let blue = load_image(&path, Band::Blue, false).unwrap();
    assert_eq!((red.width(), red.height()), (20, 10));
    assert_eq!(red.buffer[(3,5)], 50.0);
    assert_eq!(blue.buffer[(0,0)], 200.0);

    let mask_path = dir.join("mask.png");
    image_rs::GrayImage::from_fn(20, 10, |x, _| image_rs::Luma([if x < 5 { 255 } else { 0 }])).save(&mask_path).unwrap();
    let mask = read_mask(Some(&red), &mask_path).unwrap();
    assert_eq!(mask.count(), 50);
    assert!(mask.contains(4.9, 9.5));
    assert!(!mask.contains(5.0, 0.0));

    let other = Image::from_gray_image(&image_rs::GrayImage::new(8, 8));
    assert!(matches!(read_mask(Some(&other), &mask_path), Err(PipelineError::MalformedInput { .. })));
}

#[test]
fn ascii_grid_is_flipped_to_south_first_rows() {
    let dir = scratch_dir("grid");
    let path = dir.join("dem.asc");
    fs::write(&path, "ncols 3\nnrows 2\nxllcorner 1000\nyllcorner 2000\ncellsize 10\nNODATA_value -9999\n1 2 3\n4 -9999 6\n").unwrap();
    let terrain = load_ascii_grid(&path).unwrap();
    assert_eq!((terrain.rows(), terrain.cols()), (2, 3));
    assert_eq!(terrain.node(0, 0), (1005.0, 2005.0, 4.0));
    assert_eq!(terrain.node(1, 2), (1025.0, 2015.0, 3.0));
    assert!(terrain.elevations()[(0,1)].is_nan());

    let mask_path = dir.join("dem_mask.png");
    image_rs::GrayImage::from_fn(3, 2, |_, y| image_rs::Luma([if y == 0 { 255 } else { 0 }])).save(&mask_path).unwrap();
    let terrain_mask = read_terrain_mask(&terrain, &mask_path).unwrap();
    assert!(terrain_mask.buffer[(1,0)]);
    assert!(!terrain_mask.buffer[(0,0)]);
}

#[test]
fn truncated_ascii_grid_is_malformed() {
    let dir = scratch_dir("bad_grid");
    let path = dir.join("dem.asc");
    fs::write(&path, "ncols 3\nnrows 2\nxllcenter 0\nyllcenter 0\ncellsize 1\n1 2 3\n").unwrap();
    assert!(matches!(load_ascii_grid(&path), Err(PipelineError::MalformedInput { .. })));
}

#[test]
fn point_export_requires_epsg() {
    let dir = scratch_dir("points");
    let results = vec![result_with(vec![velocity_point(100.0, 200.0, 1.5)])];
    assert!(matches!(export::write_velocity_points(&results, &dir, 0), Err(PipelineError::InvalidArgument(_))));

    let written = export::write_velocity_points(&results, &dir, 2154).unwrap();
    assert_eq!(written.len(), 1);
    let contents = fs::read_to_string(&written[0]).unwrap();
    assert!(contents.starts_with("# EPSG:2154"));
    assert!(contents.contains("POINT Z (100.0000 200.0000 0.0000)"));
}

#[test]
fn csv_exports_write_one_row_per_point() {
    let dir = scratch_dir("csv");
    let results = vec![result_with(vec![velocity_point(0.0, 0.0, 1.0), velocity_point(10.0, 0.0, 2.0)])];
    export::write_velocity_csv(&results, &dir.join("velocities.csv")).unwrap();
    export::write_homography_csv(&results, &dir.join("homographies.csv")).unwrap();
    assert_eq!(fs::read_to_string(dir.join("velocities.csv")).unwrap().lines().count(), 3);
    assert_eq!(fs::read_to_string(dir.join("homographies.csv")).unwrap().lines().count(), 2);
}

#[test]
fn csv_fields_with_commas_keep_their_column() {
    let dir = scratch_dir("csv_quoting");
    let mut result = result_with(vec![velocity_point(5.0, 6.0, 1.0)]);
    result.image_a = "IMG_2024,06,27.JPG".to_string();
    result.homography = Some(HomographyResult {
        matrix: Matrix3::<Float>::new(1.0, 0.0, 2.5, 0.0, 1.0, -1.0, 0.0, 0.0, 1.0),
        inliers: vec![true, false, true],
        errors: vec![0.1, 4.0, 0.2],
        mean_error: 1.4,
        rms_error: 2.3,
        converged: true
    });
    let results = vec![result, result_with(Vec::new())];

    let velocities = dir.join("velocities.csv");
    export::write_velocity_csv(&results, &velocities).unwrap();
    let mut reader = csv::Reader::from_path(&velocities).unwrap();
    let header = reader.headers().unwrap().clone();
    let rows = reader.records().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(header.len(), 23);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), header.len());
    assert_eq!(&rows[0][1], "IMG_2024,06,27.JPG");
    assert_eq!(rows[0][3].parse::<Float>().unwrap(), 5.0);

    let homographies = dir.join("homographies.csv");
    export::write_homography_csv(&results, &homographies).unwrap();
    let mut reader = csv::Reader::from_path(&homographies).unwrap();
    let header = reader.headers().unwrap().clone();
    let rows = reader.records().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.len() == header.len()));
    let column = |name: &str| header.iter().position(|h| h == name).unwrap();
    assert_eq!(rows[0][column("h02")].parse::<Float>().unwrap(), 2.5);
    assert_eq!(rows[0][column("h12")].parse::<Float>().unwrap(), -1.0);
    assert_eq!(&rows[0][column("inliers")], "2");
    assert_eq!(&rows[1][column("h00")], "");
}

#[test]
fn velocity_grid_interpolation() {
    let result = result_with(vec![velocity_point(0.0, 0.0, 1.0), velocity_point(100.0, 0.0, 3.0)]);
    let nearest = interpolate_velocity_grid(&result, 10.0, InterpolationMethod::Nearest, Some(20.0)).unwrap();
    assert_eq!((nearest.rows(), nearest.cols()), (1, 11));
    assert_eq!(nearest.speeds[(0,0)], 1.0);
    assert_eq!(nearest.speeds[(0,10)], 3.0);
    assert!(nearest.speeds[(0,5)].is_nan());

    let idw = interpolate_velocity_grid(&result, 10.0, InterpolationMethod::InverseDistance, None).unwrap();
    let middle = idw.speeds[(0,5)];
    assert!(middle > 1.0 && middle < 3.0);
    assert!(interpolate_velocity_grid(&result_with(Vec::new()), 10.0, InterpolationMethod::Nearest, None).is_err());
}

#[test]
fn linear_interpolation_reproduces_a_plane() {
    let plane = |x: Float, y: Float| 1.0 + 0.01*x + 0.02*y;
    let mut points = Vec::new();
    for i in 0..5 {
        for j in 0..5 {
            let (x, y) = (25.0*i as Float, 25.0*j as Float);
            points.push(velocity_point(x, y, plane(x, y)));
        }
    }
    points.push(velocity_point(37.0, 61.0, plane(37.0, 61.0)));
    let grid = interpolate_velocity_grid(&result_with(points), 10.0, InterpolationMethod::Linear, None).unwrap();
    assert_eq!((grid.rows(), grid.cols()), (11, 11));

    let mut filled = 0;
    for r in 0..grid.rows() {
        for c in 0..grid.cols() {
            let (x, y) = grid.cell_center(r, c);
            let speed = grid.speeds[(r,c)];
            match x <= 100.0 && y <= 100.0 {
                true => {
                    assert!((speed - plane(x, y)).abs() < 1e-9, "cell ({}, {}): {} against {}", r, c, speed, plane(x, y));
                    filled += 1;
                },
                false => assert!(speed.is_nan(), "cell ({}, {}) outside the hull is {}", r, c, speed)
            }
        }
    }
    assert_eq!(filled, 100);

    let collinear = result_with(vec![velocity_point(0.0, 0.0, 1.0), velocity_point(50.0, 0.0, 2.0), velocity_point(100.0, 0.0, 3.0)]);
    let degenerate = interpolate_velocity_grid(&collinear, 10.0, InterpolationMethod::Linear, None).unwrap();
    assert!(degenerate.speeds.iter().all(|v| v.is_nan()));
}

#[test]
fn plots_are_written() {
    let dir = scratch_dir("plots");
    let background = common::image_from_fn(common::WIDTH, common::HEIGHT, common::texture);
    let result = result_with(vec![velocity_point(0.0, 100.0, 1.0), velocity_point(20.0, 120.0, 2.0)]);

    plot::draw_pixel_velocities(&background, &result, 5.0, &dir.join("pixels.png")).unwrap();
    plot::draw_world_velocities(&common::flat_terrain(), &result, 5.0, (200, 200), &dir.join("world.png")).unwrap();
    let grid = interpolate_velocity_grid(&result, 5.0, InterpolationMethod::Nearest, None).unwrap();
    plot::draw_velocity_grid(&grid, 3, &dir.join("grid.png")).unwrap();

    let written = image_rs::open(dir.join("pixels.png")).unwrap();
    assert_eq!((written.width(), written.height()), (common::WIDTH as u32, common::HEIGHT as u32));
    assert!(dir.join("world.png").exists() && dir.join("grid.png").exists());
}

#[test]
fn config_defaults_follow_the_field_scripts() {
    let config = PipelineConfig::from_yaml_str("band: R\ncalibration:\n  method: lm\n").unwrap();
    assert_eq!(config.band, Band::Red);
    assert_eq!(config.output.epsg, 2154);
    assert_eq!(config.terrain_densify, 1);
    assert_eq!(config.camera.pose, [-56.0, 3.0, 5.0]);
    assert!(matches!(config.tracking, TrackingMethod::Sparse(ref p) if p.window == 25 && p.back_threshold == 1.0));
    assert_eq!(config.homography.tracking.corners.max_points, 50000);

    let bundled = PipelineConfig::from_yaml_file(&PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/argentiere.yaml")).unwrap();
    assert_eq!(bundled.homography.estimation.max_reprojection_error, 5.0);
    assert!(bundled.input.images.is_absolute());

    let yaml = config.to_yaml().unwrap();
    assert_eq!(PipelineConfig::from_yaml_str(&yaml).unwrap().band, Band::Red);
}

#[test]
fn input_errors_are_fatal_and_geometry_errors_recoverable() {
    assert!(PipelineError::NoIntersection { u: 1.0, v: 2.0 }.is_recoverable());
    assert!(PipelineError::TrackingFailure { seeded: 10, tracked: 4, surviving: 0, required: 1 }.is_recoverable());
    assert!(!PipelineError::malformed("dem.asc", "missing ncols").is_recoverable());
    assert!(!PipelineError::InvalidArgument("epsg".to_string()).is_recoverable());
}
