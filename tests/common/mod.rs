#![allow(dead_code)]

extern crate nalgebra as na;

use na::{DMatrix, Vector3};

use glacier_velocity::image::{Image, image_encoding::ImageEncoding};
use glacier_velocity::sensors::camera::{camera_model::{CameraModel, Pose}, distortion::Distortion, pinhole::Pinhole};
use glacier_velocity::terrain::TerrainModel;
use glacier_velocity::Float;

pub const WIDTH: usize = 200;
pub const HEIGHT: usize = 150;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Smooth texture with enough structure for corner seeding in every window.
pub fn texture(u: Float, v: Float) -> Float {
    128.0 + 50.0*(u/5.0).sin()*(v/7.0).cos() + 30.0*((u + v)/11.0).sin()
}

pub fn image_from_fn<F: Fn(Float, Float) -> Float>(width: usize, height: usize, f: F) -> Image {
    let buffer = DMatrix::<Float>::from_fn(height, width, |r, c| f(c as Float, r as Float));
    Image::from_matrix(&buffer, ImageEncoding::U8, false)
}

/// Texture whose region [u_min,u_max) x [v_min,v_max) is shifted right by `shift` pixels.
pub fn shifted_region_frame(region: (usize, usize, usize, usize), shift: Float) -> Image {
    let (u_min, u_max, v_min, v_max) = region;
    image_from_fn(WIDTH, HEIGHT, |u, v| {
        let inside = u >= u_min as Float && u < u_max as Float && v >= v_min as Float && v < v_max as Float;
        match inside {
            true => texture(u - shift, v),
            false => texture(u, v)
        }
    })
}

pub fn pinhole() -> Pinhole {
    Pinhole::new(200.0, 200.0, 100.0, 75.0)
}

/// 100 m above the origin, looking north and 45 degrees down.
pub fn camera() -> CameraModel {
    CameraModel::new(Vector3::<Float>::new(0.0, 0.0, 100.0), Pose::new(0.0, -45.0, 0.0), pinhole(), Distortion::none(), (WIDTH, HEIGHT))
        .expect("valid test camera")
}

pub fn flat_terrain() -> TerrainModel {
    TerrainModel::flat(-200.0, 200.0, 0.0, 400.0, 0.0, 5.0).expect("valid test terrain")
}
