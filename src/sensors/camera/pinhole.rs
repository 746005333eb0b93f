extern crate nalgebra as na;

use na::{Matrix3, Vector2, Vector3};
use serde::{Serialize, Deserialize};
use crate::sensors::camera::Camera;
use crate::Float;

#[derive(Debug,Copy,Clone,PartialEq,Serialize,Deserialize)]
pub struct Pinhole {
    pub fx: Float,
    pub fy: Float,
    pub cx: Float,
    pub cy: Float
}

impl Pinhole {
    pub fn new(fx: Float, fy: Float, cx: Float, cy: Float) -> Pinhole {
        Pinhole { fx, fy, cx, cy }
    }

    pub fn from_matrix(mat: &Matrix3<Float>) -> Pinhole {
        Pinhole::new(mat[(0,0)],mat[(1,1)],mat[(0,2)],mat[(1,2)])
    }

    pub fn is_valid(&self) -> bool {
        self.fx > 0.0 && self.fy > 0.0 && self.cx > 0.0 && self.cy > 0.0
    }

    /// Pixel to normalised image coordinates.
    pub fn normalize(&self, pixel: &Vector2<Float>) -> Vector2<Float> {
        let normalized = self.get_inverse_projection()*Vector3::<Float>::new(pixel.x, pixel.y, 1.0);
        Vector2::<Float>::new(normalized.x, normalized.y)
    }

    /// Normalised image coordinates to pixel.
    pub fn denormalize(&self, normalized: &Vector2<Float>) -> Vector2<Float> {
        Vector2::<Float>::new(self.fx*normalized.x + self.cx, self.fy*normalized.y + self.cy)
    }
}

impl Camera for Pinhole {
    fn get_projection(&self) -> Matrix3<Float> {
        Matrix3::<Float>::new(
            self.fx, 0.0, self.cx,
            0.0, self.fy, self.cy,
            0.0, 0.0, 1.0)
    }

    fn get_inverse_projection(&self) -> Matrix3<Float> {
        Matrix3::<Float>::new(
            1.0/self.fx, 0.0, -self.cx/self.fx,
            0.0, 1.0/self.fy, -self.cy/self.fy,
            0.0, 0.0, 1.0)
    }
}
