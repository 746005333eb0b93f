extern crate nalgebra as na;
extern crate image as image_rs;

use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::Path;
use na::{DMatrix, Matrix3, Vector2, Vector3};
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::calibration::GroundControlPoints;
use crate::image::{Image, equalize_histogram, mask::Mask};
use crate::sensors::camera::{Camera, pinhole::Pinhole, distortion::Distortion};
use crate::terrain::TerrainModel;
use crate::{Float, PipelineError, Result};

pub mod terrain_loader;
pub mod export;

const MASK_THRESHOLD: u8 = 127;

/// Image band used for tracking. Config letters R, G, B and L.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub enum Band {
    #[serde(rename = "R", alias = "Red")]
    Red,
    #[serde(rename = "G", alias = "Green")]
    Green,
    #[serde(rename = "B", alias = "Blue")]
    Blue,
    #[serde(rename = "L", alias = "Luminance")]
    Luminance
}

impl Default for Band {
    fn default() -> Self {
        Band::Luminance
    }
}

pub fn load_image(file_path: &Path, band: Band, equalise: bool) -> Result<Image> {
    let dynamic = image_rs::open(file_path)?;
    let gray = match band {
        Band::Luminance => dynamic.to_luma8(),
        Band::Red | Band::Green | Band::Blue => {
            let channel = match band {
                Band::Red => 0,
                Band::Green => 1,
                _ => 2
            };
            let rgb = dynamic.to_rgb8();
            image_rs::GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| image_rs::Luma([rgb.get_pixel(x, y).0[channel]]))
        }
    };
    let gray = match equalise {
        true => equalize_histogram(&gray),
        false => gray
    };
    Ok(Image::from_gray_image(&gray))
}

fn numeric_fields(line: &str) -> Option<Vec<Float>> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Float>().ok())
        .collect()
}

/// Whitespace table of `x y z u v` rows. `#` comments and one header line are skipped.
pub fn read_gcps(file_path: &Path) -> Result<GroundControlPoints> {
    let contents = fs::read_to_string(file_path)?;
    let mut world = Vec::<Vector3<Float>>::new();
    let mut pixels = Vec::<Vector2<Float>>::new();
    let mut header_skipped = false;

    for (line_number, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match numeric_fields(trimmed) {
            Some(values) if values.len() >= 5 => {
                world.push(Vector3::<Float>::new(values[0], values[1], values[2]));
                pixels.push(Vector2::<Float>::new(values[3], values[4]));
            },
            Some(values) => return Err(PipelineError::malformed(file_path, format!("line {}: expected 5 columns, found {}", line_number + 1, values.len()))),
            None if !header_skipped && world.is_empty() => header_skipped = true,
            None => return Err(PipelineError::malformed(file_path, format!("line {}: non numeric value", line_number + 1)))
        }
    }

    if world.is_empty() {
        return Err(PipelineError::malformed(file_path, "no ground control points"));
    }
    info!("read {} ground control points from {:?}", world.len(), file_path);
    GroundControlPoints::new(world, pixels)
}

/**
 * Sectioned calibration text file:
 *   RadialDistortion       k1 k2 k3
 *   TangentialDistortion   p1 p2
 *   IntrinsicMatrix        3x3, stored transposed (fx 0 0 / s fy 0 / cx cy 1)
 * Section names sit on their own line followed by the values.
 */
pub fn read_calibration(file_path: &Path) -> Result<(Pinhole, Distortion)> {
    let contents = fs::read_to_string(file_path)?;
    let mut radial: Option<Vec<Float>> = None;
    let mut tangential: Option<Vec<Float>> = None;
    let mut intrinsic: Option<Vec<Float>> = None;
    let mut section: Option<String> = None;
    let mut values = Vec::<Float>::new();

    let mut close_section = |section: &Option<String>, values: &mut Vec<Float>| -> Result<()> {
        let taken = std::mem::take(values);
        match section.as_deref() {
            None => Ok(()),
            Some("RadialDistortion") => { radial = Some(taken); Ok(()) },
            Some("TangentialDistortion") => { tangential = Some(taken); Ok(()) },
            Some("IntrinsicMatrix") => { intrinsic = Some(taken); Ok(()) },
            Some(other) => Err(PipelineError::malformed(file_path, format!("unknown section {}", other)))
        }
    };

    for line in contents.lines().map(|l| l.trim()).filter(|l| !l.is_empty() && !l.starts_with('#')) {
        match numeric_fields(line) {
            Some(numbers) => values.extend(numbers),
            None => {
                close_section(&section, &mut values)?;
                section = Some(line.trim_end_matches(':').to_string());
            }
        }
    }
    close_section(&section, &mut values)?;

    let radial = radial.ok_or_else(|| PipelineError::malformed(file_path, "missing RadialDistortion"))?;
    let tangential = tangential.unwrap_or_else(|| vec![0.0, 0.0]);
    let intrinsic = intrinsic.ok_or_else(|| PipelineError::malformed(file_path, "missing IntrinsicMatrix"))?;
    if intrinsic.len() != 9 {
        return Err(PipelineError::malformed(file_path, format!("IntrinsicMatrix needs 9 values, found {}", intrinsic.len())));
    }
    if radial.is_empty() || radial.len() > 3 || tangential.len() != 2 {
        return Err(PipelineError::malformed(file_path, "expected up to 3 radial and 2 tangential coefficients"));
    }

    // Row major read of the transposed matrix, so transpose back.
    let stored = Matrix3::<Float>::from_row_slice(&intrinsic);
    let pinhole = Pinhole::from_matrix(&stored.transpose());
    if !pinhole.is_valid() {
        return Err(PipelineError::malformed(file_path, "focal lengths and principal point must be positive"));
    }
    let mut radial_coefficients = [0.0; 3];
    radial_coefficients[..radial.len()].copy_from_slice(&radial);
    Ok((pinhole, Distortion::new(radial_coefficients, [tangential[0], tangential[1]])))
}

pub fn write_calibration(file_path: &Path, pinhole: &Pinhole, distortion: &Distortion) -> Result<()> {
    let stored = pinhole.get_projection().transpose();
    let mut out = String::new();
    let join = |values: &[Float]| values.iter().map(|v| format!("{:.10}", v)).collect::<Vec<String>>().join(" ");

    // Writing into a String cannot fail.
    let _ = writeln!(out, "RadialDistortion");
    let _ = writeln!(out, "{}", join(&distortion.radial));
    let _ = writeln!(out, "TangentialDistortion");
    let _ = writeln!(out, "{}", join(&distortion.tangential));
    let _ = writeln!(out, "IntrinsicMatrix");
    for r in 0..3 {
        let row = [stored[(r,0)], stored[(r,1)], stored[(r,2)]];
        let _ = writeln!(out, "{}", join(&row));
    }
    fs::write(file_path, out)?;
    Ok(())
}

fn read_mask_raster(file_path: &Path) -> Result<DMatrix<bool>> {
    let gray = image_rs::open(file_path)?.to_luma8();
    let (width, height) = gray.dimensions();
    Ok(DMatrix::<bool>::from_fn(height as usize, width as usize, |r, c| gray.get_pixel(c as u32, r as u32).0[0] > MASK_THRESHOLD))
}

/// Mask image with luma > 127 as true. With a reference the dimensions must match.
pub fn read_mask(reference: Option<&Image>, file_path: &Path) -> Result<Mask> {
    let mask = Mask::new(read_mask_raster(file_path)?);
    match reference {
        Some(image) if image.width() != mask.width() || image.height() != mask.height() =>
            Err(PipelineError::malformed(file_path, format!("mask is {}x{} but the image is {}x{}", mask.width(), mask.height(), image.width(), image.height()))),
        _ => Ok(mask)
    }
}

/// North up mask image over the terrain grid, flipped onto the terrain's south first rows.
pub fn read_terrain_mask(terrain: &TerrainModel, file_path: &Path) -> Result<Mask> {
    let raster = read_mask_raster(file_path)?;
    if raster.nrows() != terrain.rows() || raster.ncols() != terrain.cols() {
        return Err(PipelineError::malformed(file_path, format!("terrain mask is {}x{} but the terrain grid is {}x{}", raster.nrows(), raster.ncols(), terrain.rows(), terrain.cols())));
    }
    let rows = raster.nrows();
    Ok(Mask::new(DMatrix::<bool>::from_fn(rows, raster.ncols(), |r, c| raster[(rows - 1 - r, c)])))
}
