use serde::{Serialize, Deserialize};

use crate::image::{Image, mask::Mask};
use crate::Result;
use self::{dense::DenseTracker, sparse::SparseTracker, tracked_points::TrackedPointSet, tracking_parameters::{DenseParameters, SparseParameters}};

pub mod tracking_parameters;
pub mod tracked_points;
pub mod corners;
pub mod sparse;
pub mod dense;

/// Finds correspondences of `a` in `b`, seeding only inside `mask`.
/// Too few surviving points is a `TrackingFailure`.
pub trait FeatureTracker {
    fn track(&self, a: &Image, b: &Image, mask: &Mask) -> Result<TrackedPointSet>;
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub enum TrackingMethod {
    Sparse(SparseParameters),
    Dense(DenseParameters)
}

impl Default for TrackingMethod {
    fn default() -> Self {
        TrackingMethod::Sparse(SparseParameters::default())
    }
}

impl FeatureTracker for TrackingMethod {
    fn track(&self, a: &Image, b: &Image, mask: &Mask) -> Result<TrackedPointSet> {
        match self {
            TrackingMethod::Sparse(parameters) => SparseTracker::new(parameters.clone()).track(a, b, mask),
            TrackingMethod::Dense(parameters) => DenseTracker::new(parameters.clone()).track(a, b, mask)
        }
    }
}
