extern crate nalgebra as na;
extern crate glacier_velocity;

use std::fs;
use std::path::PathBuf;
use color_eyre::eyre::{eyre, Result};
use na::Vector3;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use glacier_velocity::calibration::{CalibrationOptimiser, world_residuals};
use glacier_velocity::config::PipelineConfig;
use glacier_velocity::image::mask::Mask;
use glacier_velocity::io::{read_calibration, read_gcps, read_mask, read_terrain_mask, write_calibration, export, terrain_loader::load_ascii_grid};
use glacier_velocity::sensors::camera::camera_model::{CameraModel, Pose};
use glacier_velocity::velocity::{HomographySource, VelocityEngine, frame_source::{FrameSource, ImageFiles}};
use glacier_velocity::visualize::{interpolate_velocity_grid, plot};

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("demos/argentiere.yaml"));
    let config = PipelineConfig::from_yaml_file(&config_path)?;
    info!("configuration: {}", config);

    let frames = ImageFiles::from_directory(&config.input.images, &config.input.image_extension, config.band, config.equalise)?;
    if frames.len() < 2 {
        return Err(eyre!("need at least two images in {:?}, found {}", config.input.images, frames.len()));
    }
    let reference = frames.load(0)?;
    let dimensions = (reference.width(), reference.height());

    let (intrinsics, distortion) = match (&config.camera.calibration, config.camera.intrinsics) {
        (Some(path), _) => read_calibration(path)?,
        (None, Some(pinhole)) => (pinhole, config.camera.distortion),
        (None, None) => return Err(eyre!("camera intrinsics need a calibration file or an intrinsics section"))
    };
    let [x, y, z] = config.camera.location;
    let [yaw, pitch, roll] = config.camera.pose;
    let mut camera = CameraModel::new(Vector3::new(x, y, z), Pose::new(yaw, pitch, roll), intrinsics, distortion, dimensions)?;

    let terrain = load_ascii_grid(&config.input.terrain)?.densify(config.terrain_densify)?;

    fs::create_dir_all(&config.output.directory)?;
    if let Some(gcp_path) = &config.input.gcps {
        let gcps = read_gcps(gcp_path)?;
        let optimiser = CalibrationOptimiser::new(config.calibration.clone());
        let calibrated = match config.two_pass_calibration {
            true => optimiser.optimise_two_pass(&camera, &gcps)?.intrinsics,
            false => optimiser.optimise(&camera, &gcps)?
        };
        if let Some(error) = &calibrated.convergence_error {
            warn!("continuing with best effort calibration: {}", error);
        }
        info!("calibration rms {:.3} px -> {:.3} px", calibrated.initial_rms, calibrated.rms);
        camera = calibrated.camera;

        let misses = world_residuals(&camera, &terrain, &gcps).iter().filter(|r| r.is_none()).count();
        info!("{} of {} control points miss the terrain after calibration", misses, gcps.len());
        write_calibration(&config.output.directory.join("calibration.txt"), &camera.intrinsics, &camera.distortion)?;
        if config.output.plots {
            plot::draw_gcps(&reference, &camera, &gcps, &config.output.directory.join("gcps.png"))?;
        }
    }

    let tracking_mask = match (&config.input.tracking_mask, &config.input.terrain_mask) {
        (Some(path), _) => read_mask(Some(&reference), path)?,
        (None, Some(path)) => Mask::from_terrain_mask(&terrain, &read_terrain_mask(&terrain, path)?, &camera, dimensions.0, dimensions.1)?,
        (None, None) => Mask::full(dimensions.0, dimensions.1)
    };
    info!("tracking inside {} of {} pixels", tracking_mask.count(), dimensions.0*dimensions.1);
    let homography = match (&config.input.stable_mask, config.homography.enabled) {
        (Some(path), true) => HomographySource::Estimate {
            mask: read_mask(Some(&reference), path)?,
            tracking: config.homography.tracking.clone(),
            parameters: config.homography.estimation.clone()
        },
        _ => HomographySource::None
    };

    let engine = VelocityEngine::new(&camera, &terrain, &tracking_mask, config.tracking.clone(), homography);
    let results = engine.run(&frames);

    let out = &config.output.directory;
    export::write_velocity_csv(&results, &out.join("velocities.csv"))?;
    export::write_homography_csv(&results, &out.join("homographies.csv"))?;
    export::write_velocity_points(&results, &out.join("points"), config.output.epsg)?;

    if config.output.plots {
        for result in results.iter().filter(|r| !r.is_empty()) {
            let name = format!("pair_{:03}", result.pair_index);
            plot::draw_pixel_velocities(&frames.load(result.pair_index)?, result, 5.0, &out.join(format!("{}_pixels.png", name)))?;
            plot::draw_world_velocities(&terrain, result, 5.0, (800, 800), &out.join(format!("{}_world.png", name)))?;
            let grid = interpolate_velocity_grid(result, config.output.grid_cell_size, config.output.interpolation, Some(2.0*config.output.grid_cell_size))?;
            plot::draw_velocity_grid(&grid, 4, &out.join(format!("{}_grid.png", name)))?;
        }
    }

    let surviving: usize = results.iter().map(|r| r.len()).sum();
    info!("finished {} pairs with {} velocity points", results.len(), surviving);
    Ok(())
}
