use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};

use crate::calibration::calibration_parameters::CalibrationParameters;
use crate::homography::homography_parameters::HomographyParameters;
use crate::io::Band;
use crate::sensors::camera::{distortion::Distortion, pinhole::Pinhole};
use crate::tracking::{TrackingMethod, tracking_parameters::SparseParameters};
use crate::visualize::InterpolationMethod;
use crate::{Float, Result};

/// Initial camera placement. A calibration file overrides the default intrinsics.
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// World coordinates of the optical centre
    pub location: [Float; 3],
    /// Yaw, pitch, roll in degrees
    pub pose: [Float; 3],
    /// Calibration file with intrinsics and distortion, read in place of the fields below
    pub calibration: Option<PathBuf>,
    pub intrinsics: Option<Pinhole>,
    pub distortion: Distortion
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            location: [1011242.816, 6545738.756, 2850.0],
            pose: [-56.0, 3.0, 5.0],
            calibration: None,
            intrinsics: None,
            distortion: Distortion::none()
        }
    }
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(default)]
pub struct HomographyConfig {
    pub enabled: bool,
    pub tracking: SparseParameters,
    pub estimation: HomographyParameters
}

impl Default for HomographyConfig {
    fn default() -> Self {
        HomographyConfig {
            enabled: true,
            tracking: SparseParameters::homography_default(),
            estimation: HomographyParameters::default()
        }
    }
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// Spatial reference of the exported points
    pub epsg: u32,
    pub grid_cell_size: Float,
    pub interpolation: InterpolationMethod,
    pub plots: bool
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: PathBuf::from("output"),
            epsg: 2154,
            grid_cell_size: 50.0,
            interpolation: InterpolationMethod::Linear,
            plots: true
        }
    }
}

/// Input locations. Relative paths resolve against the config file's directory.
#[derive(Debug,Clone,Default,PartialEq,Serialize,Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub images: PathBuf,
    pub image_extension: String,
    pub terrain: PathBuf,
    pub gcps: Option<PathBuf>,
    /// Image mask of the moving region
    pub tracking_mask: Option<PathBuf>,
    /// North up mask on the terrain grid, projected into the image when no tracking mask is given
    pub terrain_mask: Option<PathBuf>,
    /// Image mask of stable terrain for homography estimation
    pub stable_mask: Option<PathBuf>
}

/// Immutable run configuration. Each stage is built from its own section.
#[derive(Debug,Clone,Serialize,Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub camera: CameraConfig,
    pub calibration: CalibrationParameters,
    /// Run pose then intrinsics calibration when GCPs are available
    pub two_pass_calibration: bool,
    pub terrain_densify: usize,
    pub band: Band,
    pub equalise: bool,
    pub tracking: TrackingMethod,
    pub homography: HomographyConfig,
    pub output: OutputConfig
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            input: InputConfig { image_extension: "jpg".to_string(), ..InputConfig::default() },
            camera: CameraConfig::default(),
            calibration: CalibrationParameters::default(),
            two_pass_calibration: true,
            terrain_densify: 1,
            band: Band::Luminance,
            equalise: true,
            tracking: TrackingMethod::default(),
            homography: HomographyConfig::default(),
            output: OutputConfig::default()
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<PipelineConfig> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(file_path: &Path) -> Result<PipelineConfig> {
        let contents = fs::read_to_string(file_path)?;
        let mut config = PipelineConfig::from_yaml_str(&contents)?;
        if let Some(base) = file_path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn resolve_paths(&mut self, base: &Path) -> () {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() && !path.as_os_str().is_empty() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.input.images);
        resolve(&mut self.input.terrain);
        resolve(&mut self.output.directory);
        for optional in [&mut self.input.gcps, &mut self.input.tracking_mask, &mut self.input.terrain_mask, &mut self.input.stable_mask, &mut self.camera.calibration] {
            if let Some(path) = optional.as_mut() {
                resolve(path);
            }
        }
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tracking = match &self.tracking {
            TrackingMethod::Sparse(p) => format!("sparse_{}", p),
            TrackingMethod::Dense(p) => format!("dense_{}", p)
        };
        write!(f, "calibration_{}_tracking_{}_homography_{}_band_{:?}_epsg_{}", self.calibration, tracking, self.homography.estimation, self.band, self.output.epsg)
    }
}
