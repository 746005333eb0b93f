use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::info;

use crate::homography::HomographyResult;
use crate::velocity::velocity_result::{VelocityPoint, VelocityResult};
use crate::{Float, PipelineError, Result};

#[derive(Debug,Serialize)]
struct VelocityRow<'a> {
    pair: usize,
    image_a: &'a str,
    image_b: &'a str,
    x_start: Float,
    y_start: Float,
    z_start: Float,
    x_end: Float,
    y_end: Float,
    z_end: Float,
    dx: Float,
    dy: Float,
    dz: Float,
    speed: Float,
    world_error: Float,
    u_start: Float,
    v_start: Float,
    u_end: Float,
    v_end: Float,
    u_end_corrected: Float,
    v_end_corrected: Float,
    du: Float,
    dv: Float,
    pixel_error: Float
}

impl<'a> VelocityRow<'a> {
    fn new(result: &'a VelocityResult, p: &VelocityPoint) -> VelocityRow<'a> {
        VelocityRow {
            pair: result.pair_index,
            image_a: &result.image_a,
            image_b: &result.image_b,
            x_start: p.world_start.x,
            y_start: p.world_start.y,
            z_start: p.world_start.z,
            x_end: p.world_end.x,
            y_end: p.world_end.y,
            z_end: p.world_end.z,
            dx: p.world_displacement.x,
            dy: p.world_displacement.y,
            dz: p.world_displacement.z,
            speed: p.speed(),
            world_error: p.world_error,
            u_start: p.pixel_start.x,
            v_start: p.pixel_start.y,
            u_end: p.pixel_end.x,
            v_end: p.pixel_end.y,
            u_end_corrected: p.pixel_end_corrected.x,
            v_end_corrected: p.pixel_end_corrected.y,
            du: p.pixel_displacement.x,
            dv: p.pixel_displacement.y,
            pixel_error: p.pixel_error
        }
    }
}

/// Row major homography. Every field is empty for pairs without one.
#[derive(Debug,Default,Serialize)]
struct HomographyRow<'a> {
    pair: usize,
    image_a: &'a str,
    image_b: &'a str,
    h00: Option<Float>,
    h01: Option<Float>,
    h02: Option<Float>,
    h10: Option<Float>,
    h11: Option<Float>,
    h12: Option<Float>,
    h20: Option<Float>,
    h21: Option<Float>,
    h22: Option<Float>,
    inliers: Option<usize>,
    points: Option<usize>,
    mean_error: Option<Float>,
    rms_error: Option<Float>,
    converged: Option<bool>
}

impl<'a> HomographyRow<'a> {
    fn new(result: &'a VelocityResult) -> HomographyRow<'a> {
        let row = HomographyRow { pair: result.pair_index, image_a: &result.image_a, image_b: &result.image_b, ..HomographyRow::default() };
        match &result.homography {
            Some(h) => HomographyRow::with_homography(row, h),
            None => row
        }
    }

    fn with_homography(row: HomographyRow<'a>, h: &HomographyResult) -> HomographyRow<'a> {
        let m = &h.matrix;
        HomographyRow {
            h00: Some(m[(0,0)]), h01: Some(m[(0,1)]), h02: Some(m[(0,2)]),
            h10: Some(m[(1,0)]), h11: Some(m[(1,1)]), h12: Some(m[(1,2)]),
            h20: Some(m[(2,0)]), h21: Some(m[(2,1)]), h22: Some(m[(2,2)]),
            inliers: Some(h.inlier_count()),
            points: Some(h.inliers.len()),
            mean_error: Some(h.mean_error),
            rms_error: Some(h.rms_error),
            converged: Some(h.converged),
            ..row
        }
    }
}

#[derive(Debug,Serialize)]
struct PointRow {
    wkt: String,
    speed: Float,
    error: Float,
    dx: Float,
    dy: Float,
    dz: Float
}

impl PointRow {
    fn new(p: &VelocityPoint) -> PointRow {
        PointRow {
            wkt: format!("POINT Z ({:.4} {:.4} {:.4})", p.world_start.x, p.world_start.y, p.world_start.z),
            speed: p.speed(),
            error: p.world_error,
            dx: p.world_displacement.x,
            dy: p.world_displacement.y,
            dz: p.world_displacement.z
        }
    }
}

/// One row per tracked point of every pair.
pub fn write_velocity_csv(results: &[VelocityResult], destination: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(destination)?;
    let mut rows = 0;
    for result in results {
        for p in result.points.iter() {
            writer.serialize(VelocityRow::new(result, p))?;
            rows += 1;
        }
    }
    writer.flush()?;
    info!("wrote {} velocity rows to {:?}", rows, destination);
    Ok(())
}

/// Matrix, inlier count and error statistics per pair. Missing homographies are left blank.
pub fn write_homography_csv(results: &[VelocityResult], destination: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(destination)?;
    for result in results {
        writer.serialize(HomographyRow::new(result))?;
    }
    writer.flush()?;
    info!("wrote {} homographies to {:?}", results.len(), destination);
    Ok(())
}

/**
 * Point tables standing in for shapefiles: one `<image_a>_<image_b>.csv` per pair
 * inside `destination`, with a `# EPSG:<code>` header and WKT `POINT Z` geometry
 * at the start coordinate carrying speed and error attributes.
 */
pub fn write_velocity_points(results: &[VelocityResult], destination: &Path, epsg: u32) -> Result<Vec<PathBuf>> {
    if epsg == 0 {
        return Err(PipelineError::InvalidArgument("a spatial reference (EPSG code) is required for point export".to_string()));
    }
    fs::create_dir_all(destination)?;

    let mut written = Vec::with_capacity(results.len());
    for result in results {
        let path = destination.join(format!("{}_{}.csv", stem(&result.image_a), stem(&result.image_b)));
        let mut file = File::create(&path)?;
        writeln!(file, "# EPSG:{}", epsg)?;
        let mut writer = csv::Writer::from_writer(file);
        for p in result.points.iter() {
            writer.serialize(PointRow::new(p))?;
        }
        writer.flush()?;
        written.push(path);
    }
    info!("wrote {} point tables to {:?}", written.len(), destination);
    Ok(written)
}

fn stem(name: &str) -> String {
    Path::new(name).file_stem().map_or_else(|| name.to_string(), |s| s.to_string_lossy().to_string())
}
