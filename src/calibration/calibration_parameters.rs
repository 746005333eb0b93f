use std::fmt;
use serde::{Serialize, Deserialize};

use crate::numerics::optimizer::{OptimisationMethod, OptimizerParameters};

/// Full parameter layout: x y z | yaw pitch roll | fx fy cx cy | k1 k2 k3 | p1 p2
pub const CAMERA_PARAMETER_COUNT: usize = 15;
pub const LOCATION_OFFSET: usize = 0;
pub const POSE_OFFSET: usize = 3;
pub const INTRINSICS_OFFSET: usize = 6;
pub const RADIAL_OFFSET: usize = 10;
pub const TANGENTIAL_OFFSET: usize = 13;

#[derive(Debug,Copy,Clone,PartialEq,Eq,Serialize,Deserialize)]
pub enum ParameterSubset {
    #[serde(alias = "YPR")]
    Pose,
    #[serde(alias = "EXT")]
    Extrinsics,
    #[serde(alias = "INT")]
    Intrinsics,
    #[serde(alias = "ALL")]
    All
}

impl ParameterSubset {
    /// Indices into the full camera parameter vector that are free in this subset.
    pub fn indices(&self) -> std::ops::Range<usize> {
        match self {
            ParameterSubset::Pose => POSE_OFFSET..INTRINSICS_OFFSET,
            ParameterSubset::Extrinsics => LOCATION_OFFSET..INTRINSICS_OFFSET,
            ParameterSubset::Intrinsics => INTRINSICS_OFFSET..CAMERA_PARAMETER_COUNT,
            ParameterSubset::All => LOCATION_OFFSET..CAMERA_PARAMETER_COUNT
        }
    }

    pub fn len(&self) -> usize {
        self.indices().len()
    }
}

impl fmt::Display for ParameterSubset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParameterSubset::Pose => write!(f, "YPR"),
            ParameterSubset::Extrinsics => write!(f, "EXT"),
            ParameterSubset::Intrinsics => write!(f, "INT"),
            ParameterSubset::All => write!(f, "ALL")
        }
    }
}

#[derive(Debug,Clone,Serialize,Deserialize)]
#[serde(default)]
pub struct CalibrationParameters {
    pub subset: ParameterSubset,
    pub method: OptimisationMethod,
    pub optimizer: OptimizerParameters
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        CalibrationParameters {
            subset: ParameterSubset::Pose,
            method: OptimisationMethod::TrustRegion,
            optimizer: OptimizerParameters::default()
        }
    }
}

impl fmt::Display for CalibrationParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "subset_{}_method_{}_max_iterations_{}", self.subset, self.method, self.optimizer.max_iterations)
    }
}
