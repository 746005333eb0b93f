extern crate nalgebra as na;

pub mod error;
pub mod config;
pub mod numerics;
pub mod image;
pub mod sensors;
pub mod terrain;
pub mod calibration;
pub mod tracking;
pub mod homography;
pub mod velocity;
pub mod io;
pub mod visualize;

pub use error::PipelineError;

macro_rules! define_float {
    ($f:tt) => {
        pub use std::$f as float;
        pub type Float = $f;
    }
}

define_float!(f64);

pub type Result<T> = std::result::Result<T, PipelineError>;
