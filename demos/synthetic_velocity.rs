extern crate nalgebra as na;
extern crate glacier_velocity;

use std::fs;
use color_eyre::eyre::Result;
use na::{DMatrix, Vector3};
use tracing::info;
use tracing_subscriber::EnvFilter;

use glacier_velocity::image::{Image, image_encoding::ImageEncoding, mask::Mask};
use glacier_velocity::io::export;
use glacier_velocity::numerics::median;
use glacier_velocity::sensors::camera::{camera_model::{CameraModel, Pose}, distortion::Distortion, pinhole::Pinhole};
use glacier_velocity::terrain::TerrainModel;
use glacier_velocity::tracking::TrackingMethod;
use glacier_velocity::velocity::{HomographySource, VelocityEngine, frame_source::InMemoryFrames};
use glacier_velocity::visualize::{InterpolationMethod, interpolate_velocity_grid, plot};
use glacier_velocity::Float;

const WIDTH: usize = 320;
const HEIGHT: usize = 240;
const FRAMES: usize = 4;
const ICE_STEP: Float = 1.5;

fn texture(u: Float, v: Float) -> Float {
    128.0 + 50.0*(u/5.0).sin()*(v/7.0).cos() + 30.0*((u + v)/11.0).sin()
}

/// A tongue of ice in the centre of the frame sliding right by `ICE_STEP` px per frame.
fn frame(index: usize) -> Image {
    let shift = ICE_STEP*index as Float;
    let buffer = DMatrix::<Float>::from_fn(HEIGHT, WIDTH, |r, c| {
        let (u, v) = (c as Float, r as Float);
        match u >= 80.0 && u < 240.0 && v >= 60.0 && v < 180.0 {
            true => texture(u - shift, v),
            false => texture(u, v)
        }
    });
    Image::from_matrix(&buffer, ImageEncoding::U8, false)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let camera = CameraModel::new(
        Vector3::<Float>::new(0.0, 0.0, 300.0),
        Pose::new(0.0, -40.0, 0.0),
        Pinhole::new(400.0, 400.0, WIDTH as Float/2.0, HEIGHT as Float/2.0),
        Distortion::none(),
        (WIDTH, HEIGHT))?;
    let terrain = TerrainModel::flat(-1000.0, 1000.0, 0.0, 2000.0, 0.0, 20.0)?.densify(2)?;
    let mask = Mask::from_rectangle(WIDTH, HEIGHT, (96, 76), (224, 164));

    let frames = InMemoryFrames::new((0..FRAMES).map(|i| (format!("synthetic_{:02}", i), frame(i))).collect());
    let engine = VelocityEngine::new(&camera, &terrain, &mask, TrackingMethod::default(), HomographySource::None);
    let results = engine.run(&frames);

    for result in results.iter() {
        let speeds = result.speeds();
        let pixel_shifts = result.points.iter().map(|p| p.pixel_displacement.x).collect::<Vec<Float>>();
        info!("{} -> {}: {} points, median shift {:.2} px, median speed {:.2} m",
            result.image_a, result.image_b, result.len(),
            median(&pixel_shifts).unwrap_or(Float::NAN), median(&speeds).unwrap_or(Float::NAN));
    }

    let out = std::env::temp_dir().join("glacier_velocity_synthetic");
    fs::create_dir_all(&out)?;
    export::write_velocity_csv(&results, &out.join("velocities.csv"))?;
    if let Some(first) = results.iter().find(|r| !r.is_empty()) {
        plot::draw_pixel_velocities(&frame(first.pair_index), first, 10.0, &out.join("pixels.png"))?;
        let grid = interpolate_velocity_grid(first, 10.0, InterpolationMethod::InverseDistance, Some(30.0))?;
        plot::draw_velocity_grid(&grid, 6, &out.join("grid.png"))?;
    }
    info!("results written to {:?}", out);
    Ok(())
}
