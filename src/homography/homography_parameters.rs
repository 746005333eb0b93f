use std::fmt;
use serde::{Serialize, Deserialize};

use crate::Float;

#[derive(Debug,Copy,Clone,PartialEq,Eq,Serialize,Deserialize)]
pub enum HomographyMethod {
    #[serde(alias = "cv2.RANSAC")]
    Ransac,
    #[serde(alias = "cv2.LMEDS")]
    LeastMedian,
    LeastSquares
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(default)]
pub struct HomographyParameters {
    pub method: HomographyMethod,
    /// Forward transfer error in pixels below which a point is an inlier
    pub max_reprojection_error: Float,
    pub max_iterations: usize,
    pub confidence: Float,
    pub min_features: usize,
    pub seed: u64
}

impl Default for HomographyParameters {
    fn default() -> Self {
        HomographyParameters {
            method: HomographyMethod::Ransac,
            max_reprojection_error: 5.0,
            max_iterations: 2000,
            confidence: 0.995,
            min_features: 4,
            seed: 0
        }
    }
}

impl fmt::Display for HomographyParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "method_{:?}_max_reprojection_error_{}_max_iterations_{}_confidence_{}_min_features_{}",
            self.method, self.max_reprojection_error, self.max_iterations, self.confidence, self.min_features)
    }
}
