extern crate nalgebra as na;

use na::Matrix3;
use crate::Float;

pub mod pinhole;
pub mod distortion;
pub mod camera_model;

pub trait Camera {
    fn get_projection(&self) -> Matrix3<Float>;
    fn get_inverse_projection(&self) -> Matrix3<Float>;
}
