extern crate nalgebra as na;

use na::Vector2;
use serde::{Serialize, Deserialize};
use crate::Float;

const UNDISTORT_ITERATIONS: usize = 20;

/**
 * Brown-Conrady lens distortion on normalised image coordinates.
 * radial: k1, k2, k3  tangential: p1, p2
 * x_d = x(1 + k1 r² + k2 r⁴ + k3 r⁶) + 2 p1 x y + p2 (r² + 2x²)
 * y_d = y(1 + k1 r² + k2 r⁴ + k3 r⁶) + p1 (r² + 2y²) + 2 p2 x y
 */
#[derive(Debug,Copy,Clone,PartialEq,Default,Serialize,Deserialize)]
pub struct Distortion {
    pub radial: [Float; 3],
    pub tangential: [Float; 2]
}

impl Distortion {
    pub fn new(radial: [Float; 3], tangential: [Float; 2]) -> Distortion {
        Distortion { radial, tangential }
    }

    pub fn none() -> Distortion {
        Distortion::default()
    }

    pub fn is_identity(&self) -> bool {
        self.radial.iter().chain(self.tangential.iter()).all(|&v| v == 0.0)
    }

    pub fn distort(&self, normalized: &Vector2<Float>) -> Vector2<Float> {
        let [k1, k2, k3] = self.radial;
        let [p1, p2] = self.tangential;
        let x = normalized.x;
        let y = normalized.y;
        let r2 = x*x + y*y;
        let radial = 1.0 + k1*r2 + k2*r2.powi(2) + k3*r2.powi(3);

        Vector2::<Float>::new(
            x*radial + 2.0*p1*x*y + p2*(r2 + 2.0*x*x),
            y*radial + p1*(r2 + 2.0*y*y) + 2.0*p2*x*y)
    }

    /// Fixed point inversion of `distort`, as OpenCV's undistortPoints does.
    pub fn undistort(&self, distorted: &Vector2<Float>) -> Vector2<Float> {
        if self.is_identity() {
            return *distorted;
        }
        let [k1, k2, k3] = self.radial;
        let [p1, p2] = self.tangential;
        let mut x = distorted.x;
        let mut y = distorted.y;

        for _ in 0..UNDISTORT_ITERATIONS {
            let r2 = x*x + y*y;
            let radial = 1.0 + k1*r2 + k2*r2.powi(2) + k3*r2.powi(3);
            let delta_x = 2.0*p1*x*y + p2*(r2 + 2.0*x*x);
            let delta_y = p1*(r2 + 2.0*y*y) + 2.0*p2*x*y;
            match radial {
                r if r.abs() > Float::EPSILON => {
                    x = (distorted.x - delta_x)/r;
                    y = (distorted.y - delta_y)/r;
                },
                _ => break
            }
        }

        Vector2::<Float>::new(x, y)
    }
}
