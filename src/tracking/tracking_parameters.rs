use std::fmt;
use serde::{Serialize, Deserialize};

use crate::Float;

/// Shi-Tomasi seeding. A `max_points` of 0 seeds every accepted corner.
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(default)]
pub struct CornerParameters {
    pub max_points: usize,
    pub quality: Float,
    pub min_distance: Float
}

impl Default for CornerParameters {
    fn default() -> Self {
        CornerParameters { max_points: 5000, quality: 0.1, min_distance: 10.0 }
    }
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(default)]
pub struct SparseParameters {
    pub corners: CornerParameters,
    /// Odd side length of the square tracking window
    pub window: usize,
    pub levels: usize,
    pub max_iterations: usize,
    pub epsilon: Float,
    pub back_threshold: Float,
    pub min_features: usize
}

impl Default for SparseParameters {
    fn default() -> Self {
        SparseParameters {
            corners: CornerParameters::default(),
            window: 25,
            levels: 3,
            max_iterations: 30,
            epsilon: 0.01,
            back_threshold: 1.0,
            min_features: 1
        }
    }
}

impl SparseParameters {
    /// Stable terrain tracking used for homography estimation.
    pub fn homography_default() -> SparseParameters {
        SparseParameters {
            corners: CornerParameters { max_points: 50000, quality: 0.1, min_distance: 5.0 },
            back_threshold: 0.5,
            min_features: 4,
            ..SparseParameters::default()
        }
    }
}

impl fmt::Display for SparseParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "window_{}_levels_{}_max_points_{}_quality_{}_min_distance_{}_back_threshold_{}_min_features_{}",
            self.window, self.levels, self.corners.max_points, self.corners.quality, self.corners.min_distance, self.back_threshold, self.min_features)
    }
}

#[derive(Debug,Copy,Clone,PartialEq,Eq,Serialize,Deserialize)]
pub enum MatchingMethod {
    #[serde(alias = "cv2.TM_CCORR_NORMED")]
    CrossCorrelationNormed,
    #[serde(alias = "cv2.TM_CCOEFF_NORMED")]
    CoefficientNormed
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(default)]
pub struct DenseParameters {
    pub grid_spacing: usize,
    /// Template half size in pixels
    pub template: usize,
    /// Search half size in pixels
    pub search: usize,
    pub method: MatchingMethod,
    pub correlation_threshold: Float,
    pub back_threshold: Option<Float>,
    pub min_features: usize
}

impl Default for DenseParameters {
    fn default() -> Self {
        DenseParameters {
            grid_spacing: 50,
            template: 10,
            search: 50,
            method: MatchingMethod::CrossCorrelationNormed,
            correlation_threshold: 0.8,
            back_threshold: None,
            min_features: 1
        }
    }
}

impl fmt::Display for DenseParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "grid_{}_template_{}_search_{}_method_{:?}_threshold_{}", self.grid_spacing, self.template, self.search, self.method, self.correlation_threshold)
    }
}
