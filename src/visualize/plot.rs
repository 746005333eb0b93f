extern crate plotters;
extern crate image as image_rs;

use std::path::Path;
use plotters::prelude::*;
use plotters::coord::Shift;

use crate::calibration::GroundControlPoints;
use crate::image::Image;
use crate::sensors::camera::camera_model::CameraModel;
use crate::terrain::TerrainModel;
use crate::velocity::velocity_result::VelocityResult;
use crate::visualize::VelocityGrid;
use crate::{Float, PipelineError, Result};

type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn plot_error<E: std::fmt::Display>(error: E) -> PipelineError {
    PipelineError::Plot(error.to_string())
}

/// Blue (slow) to red (fast).
fn speed_color(speed: Float, min: Float, max: Float) -> HSLColor {
    let t = match max - min {
        range if range > 1e-12 => ((speed - min)/range).clamp(0.0, 1.0),
        _ => 0.0
    };
    HSLColor(0.66*(1.0 - t), 1.0, 0.5)
}

fn speed_bounds(speeds: impl Iterator<Item = Float>) -> (Float, Float) {
    speeds.filter(|v| v.is_finite()).fold((Float::INFINITY, Float::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn gray_background(image: &Image) -> Vec<u8> {
    image.to_image().pixels().flat_map(|p| [p.0[0]; 3]).collect()
}

/// Draws into an RGB buffer of the given size and writes it as an image file.
fn render<F>(mut buffer: Vec<u8>, (width, height): (u32, u32), file_path: &Path, draw: F) -> Result<()>
    where F: for<'b> FnOnce(&Canvas<'b>) -> Result<()> {
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw(&root)?;
        root.present().map_err(plot_error)?;
    }
    let rgb = image_rs::RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| PipelineError::Plot("render buffer does not match the image size".to_string()))?;
    rgb.save(file_path)?;
    Ok(())
}

fn arrow(root: &Canvas, from: (Float, Float), to: (Float, Float), color: &HSLColor) -> Result<()> {
    let start = (from.0.round() as i32, from.1.round() as i32);
    let end = (to.0.round() as i32, to.1.round() as i32);
    root.draw(&PathElement::new(vec![start, end], color.stroke_width(1))).map_err(plot_error)?;
    root.draw(&Circle::new(start, 1, color.filled())).map_err(plot_error)?;
    Ok(())
}

/// Corrected pixel displacements over the first image, scaled by `scale`.
pub fn draw_pixel_velocities(background: &Image, result: &VelocityResult, scale: Float, file_path: &Path) -> Result<()> {
    let size = (background.width() as u32, background.height() as u32);
    let (min, max) = speed_bounds(result.points.iter().map(|p| p.speed()));
    render(gray_background(background), size, file_path, |root| {
        for p in result.points.iter() {
            let from = (p.pixel_start.x, p.pixel_start.y);
            let to = (p.pixel_start.x + scale*p.pixel_displacement.x, p.pixel_start.y + scale*p.pixel_displacement.y);
            arrow(root, from, to, &speed_color(p.speed(), min, max))?;
        }
        Ok(())
    })
}

/// Top down map of world displacements over the shaded terrain extent.
pub fn draw_world_velocities(terrain: &TerrainModel, result: &VelocityResult, scale: Float, (width, height): (u32, u32), file_path: &Path) -> Result<()> {
    let extent = terrain.extent();
    let sx = width as Float/(extent.x_max - extent.x_min);
    let sy = height as Float/(extent.y_max - extent.y_min);
    let to_canvas = |x: Float, y: Float| ((x - extent.x_min)*sx, (extent.y_max - y)*sy);

    let z_range = (extent.z_max - extent.z_min).max(1e-9);
    let mut background = Vec::<u8>::with_capacity((width*height*3) as usize);
    for row in 0..height {
        for col in 0..width {
            let x = extent.x_min + (col as Float + 0.5)/sx;
            let y = extent.y_max - (row as Float + 0.5)/sy;
            let shade = match terrain.elevation(x, y) {
                Some(z) => (64.0 + 160.0*(z - extent.z_min)/z_range) as u8,
                None => 255
            };
            background.extend_from_slice(&[shade, shade, shade]);
        }
    }

    let (min, max) = speed_bounds(result.points.iter().map(|p| p.speed()));
    render(background, (width, height), file_path, |root| {
        for p in result.points.iter() {
            let from = to_canvas(p.world_start.x, p.world_start.y);
            let to = to_canvas(p.world_start.x + scale*p.world_displacement.x, p.world_start.y + scale*p.world_displacement.y);
            arrow(root, from, to, &speed_color(p.speed(), min, max))?;
        }
        Ok(())
    })
}

/// One square of `pixels_per_cell` per grid cell, north up. Empty cells are white.
pub fn draw_velocity_grid(grid: &VelocityGrid, pixels_per_cell: u32, file_path: &Path) -> Result<()> {
    let side = pixels_per_cell.max(1);
    let width = grid.cols() as u32*side;
    let height = grid.rows() as u32*side;
    let (min, max) = grid.speed_range().unwrap_or((0.0, 0.0));
    render(vec![255; (width*height*3) as usize], (width, height), file_path, |root| {
        for r in 0..grid.rows() {
            for c in 0..grid.cols() {
                let speed = grid.speeds[(r,c)];
                if !speed.is_finite() {
                    continue;
                }
                let top = ((grid.rows() - 1 - r) as u32*side) as i32;
                let left = (c as u32*side) as i32;
                root.draw(&Rectangle::new([(left, top), (left + side as i32, top + side as i32)], speed_color(speed, min, max).filled()))
                    .map_err(plot_error)?;
            }
        }
        Ok(())
    })
}

/// Surveyed GCP pixels in green, their projections through `camera` in red.
pub fn draw_gcps(background: &Image, camera: &CameraModel, gcps: &GroundControlPoints, file_path: &Path) -> Result<()> {
    let size = (background.width() as u32, background.height() as u32);
    render(gray_background(background), size, file_path, |root| {
        for (world, pixel) in gcps.world.iter().zip(gcps.pixels.iter()) {
            let surveyed = (pixel.x.round() as i32, pixel.y.round() as i32);
            root.draw(&Circle::new(surveyed, 4, GREEN.stroke_width(2))).map_err(plot_error)?;
            if let Ok(projected) = camera.project(world) {
                let projected = (projected.x.round() as i32, projected.y.round() as i32);
                root.draw(&PathElement::new(vec![surveyed, projected], RED.stroke_width(1))).map_err(plot_error)?;
                root.draw(&Circle::new(projected, 3, RED.filled())).map_err(plot_error)?;
            }
        }
        Ok(())
    })
}
