extern crate nalgebra as na;

use na::{Vector2, Vector3};

use crate::homography::HomographyResult;
use crate::Float;

/// One tracked point of an image pair in pixel and world space.
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct VelocityPoint {
    pub pixel_start: Vector2<Float>,
    /// Tracked end point before any correction
    pub pixel_end: Vector2<Float>,
    /// Undistorted end point with the camera motion removed
    pub pixel_end_corrected: Vector2<Float>,
    /// Corrected end minus undistorted start
    pub pixel_displacement: Vector2<Float>,
    pub pixel_error: Float,
    pub world_start: Vector3<Float>,
    pub world_end: Vector3<Float>,
    pub world_displacement: Vector3<Float>,
    pub world_error: Float
}

impl VelocityPoint {
    pub fn speed(&self) -> Float {
        self.world_displacement.norm()
    }
}

#[derive(Debug,Clone,Default,PartialEq)]
pub struct PairDiagnostics {
    pub seeded: usize,
    pub tracked: usize,
    pub unprojection_dropped: usize,
    pub surviving: usize,
    pub mean_back_error: Option<Float>,
    pub homography_rms_error: Option<Float>,
    /// Why the pair degraded, if it did
    pub failure: Option<String>
}

#[derive(Debug,Clone,PartialEq)]
pub struct VelocityResult {
    pub pair_index: usize,
    pub image_a: String,
    pub image_b: String,
    pub points: Vec<VelocityPoint>,
    pub diagnostics: PairDiagnostics,
    pub homography: Option<HomographyResult>
}

impl VelocityResult {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn speeds(&self) -> Vec<Float> {
        self.points.iter().map(|p| p.speed()).collect()
    }
}
