extern crate image as image_rs;

use std::path::PathBuf;
use thiserror::Error;

use crate::Float;

/// Failure taxonomy of the velocity pipeline.
///
/// `Projection`, `NoIntersection`, `InsufficientPoints` and `TrackingFailure` are
/// recoverable per image pair. `Convergence` is reported on a calibration result and
/// never aborts a run. Input errors (`Io`, `Image`, `Yaml`, `MalformedInput`) are fatal
/// when they concern required start-up inputs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("point lies behind the camera plane (depth {depth})")]
    Projection { depth: Float },

    #[error("ray through pixel ({u:.2}, {v:.2}) does not intersect the terrain")]
    NoIntersection { u: Float, v: Float },

    #[error("optimiser did not converge within {iterations} iterations (rms residual {rms:.4} px)")]
    Convergence { iterations: usize, rms: Float },

    #[error("{available} valid points available, at least {required} required")]
    InsufficientPoints { available: usize, required: usize },

    #[error("tracking failed: {surviving} of {seeded} seeded points survived ({tracked} tracked), {required} required")]
    TrackingFailure { seeded: usize, tracked: usize, surviving: usize, required: usize },

    #[error("malformed input {path:?}: {reason}")]
    MalformedInput { path: PathBuf, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("plotting failed: {0}")]
    Plot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image_rs::ImageError),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub fn malformed<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> PipelineError {
        PipelineError::MalformedInput { path: path.into(), reason: reason.into() }
    }

    /// True for failures that only degrade the current image pair.
    pub fn is_recoverable(&self) -> bool {
        matches!(self,
            PipelineError::Projection { .. }
            | PipelineError::NoIntersection { .. }
            | PipelineError::Convergence { .. }
            | PipelineError::InsufficientPoints { .. }
            | PipelineError::TrackingFailure { .. })
    }
}
