extern crate nalgebra as na;

use na::DMatrix;
use delaunator::{Point, triangulate};
use serde::{Serialize, Deserialize};

use crate::velocity::velocity_result::VelocityResult;
use crate::{Float, PipelineError, Result};

pub mod plot;

const IDW_POWER: i32 = 2;
const BARYCENTRIC_TOLERANCE: Float = 1e-9;

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub enum InterpolationMethod {
    Nearest,
    /// Barycentric over the Delaunay triangulation of the samples, NaN outside the hull
    Linear,
    InverseDistance
}

/// Regular speed grid in world units. Row 0 is the southern-most row, NaN marks empty cells.
#[derive(Debug,Clone)]
pub struct VelocityGrid {
    pub x_min: Float,
    pub y_min: Float,
    pub cell_size: Float,
    pub speeds: DMatrix<Float>
}

impl VelocityGrid {
    pub fn rows(&self) -> usize {
        self.speeds.nrows()
    }

    pub fn cols(&self) -> usize {
        self.speeds.ncols()
    }

    pub fn cell_center(&self, row: usize, col: usize) -> (Float, Float) {
        (self.x_min + (col as Float + 0.5)*self.cell_size, self.y_min + (row as Float + 0.5)*self.cell_size)
    }

    /// Speed range over the filled cells.
    pub fn speed_range(&self) -> Option<(Float, Float)> {
        self.speeds.iter().filter(|v| v.is_finite()).fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v)))
        })
    }
}

/**
 * Grids the speeds of a pair over the extent of its start points.
 * Cells whose centre is further than `max_distance` from every sample stay NaN.
 * Inverse distance weighting uses power 2 over all samples.
 * Linear interpolation needs three non collinear samples, otherwise every cell stays NaN.
 */
pub fn interpolate_velocity_grid(result: &VelocityResult, cell_size: Float, method: InterpolationMethod, max_distance: Option<Float>) -> Result<VelocityGrid> {
    if !(cell_size > 0.0) {
        return Err(PipelineError::InvalidArgument(format!("grid cell size must be positive, got {}", cell_size)));
    }
    if result.is_empty() {
        return Err(PipelineError::InsufficientPoints { available: 0, required: 1 });
    }

    let samples = result.points.iter()
        .map(|p| (p.world_start.x, p.world_start.y, p.speed()))
        .collect::<Vec<(Float, Float, Float)>>();
    let (x_min, x_max, y_min, y_max) = samples.iter().fold(
        (Float::INFINITY, Float::NEG_INFINITY, Float::INFINITY, Float::NEG_INFINITY),
        |(x0, x1, y0, y1), &(x, y, _)| (x0.min(x), x1.max(x), y0.min(y), y1.max(y)));
    let cols = ((x_max - x_min)/cell_size).floor() as usize + 1;
    let rows = ((y_max - y_min)/cell_size).floor() as usize + 1;

    let mut grid = VelocityGrid { x_min, y_min, cell_size, speeds: DMatrix::<Float>::from_element(rows, cols, Float::NAN) };
    let linear = match method {
        InterpolationMethod::Linear => Some(linear_surface(&samples, &grid)),
        _ => None
    };
    for r in 0..rows {
        for c in 0..cols {
            let (cx, cy) = grid.cell_center(r, c);
            let distances = samples.iter().map(|&(x, y, _)| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt()).collect::<Vec<Float>>();
            let (nearest, nearest_distance) = distances.iter().enumerate()
                .fold((0, Float::INFINITY), |(bi, bd), (i, &d)| match d < bd {
                    true => (i, d),
                    false => (bi, bd)
                });
            if let Some(limit) = max_distance {
                if nearest_distance > limit {
                    continue;
                }
            }

            grid.speeds[(r,c)] = match method {
                InterpolationMethod::Nearest => samples[nearest].2,
                InterpolationMethod::Linear => linear.as_ref().map_or(Float::NAN, |surface| surface[(r,c)]),
                InterpolationMethod::InverseDistance if nearest_distance < 1e-9 => samples[nearest].2,
                InterpolationMethod::InverseDistance => {
                    let (weighted, total) = distances.iter().zip(samples.iter())
                        .fold((0.0, 0.0), |(sum, weight_sum), (d, &(_, _, speed))| {
                            let w = 1.0/d.powi(IDW_POWER);
                            (sum + w*speed, weight_sum + w)
                        });
                    weighted/total
                }
            };
        }
    }
    Ok(grid)
}

/// Rasterises every Delaunay triangle onto the cell centres of `grid`.
fn linear_surface(samples: &[(Float, Float, Float)], grid: &VelocityGrid) -> DMatrix<Float> {
    let mut surface = DMatrix::<Float>::from_element(grid.rows(), grid.cols(), Float::NAN);
    let points = samples.iter().map(|&(x, y, _)| Point { x, y }).collect::<Vec<Point>>();
    let triangulation = triangulate(&points);
    let to_index = |value: Float, origin: Float, count: usize| (((value - origin)/grid.cell_size - 0.5).max(0.0) as usize).min(count.saturating_sub(1));

    for triangle in triangulation.triangles.chunks_exact(3) {
        let [a, b, c] = [samples[triangle[0]], samples[triangle[1]], samples[triangle[2]]];
        let det = (b.1 - c.1)*(a.0 - c.0) + (c.0 - b.0)*(a.1 - c.1);
        if det.abs() < 1e-12 {
            continue;
        }
        let (x_lo, x_hi) = (a.0.min(b.0).min(c.0), a.0.max(b.0).max(c.0));
        let (y_lo, y_hi) = (a.1.min(b.1).min(c.1), a.1.max(b.1).max(c.1));
        for row in to_index(y_lo, grid.y_min, grid.rows())..=to_index(y_hi, grid.y_min, grid.rows()) {
            for col in to_index(x_lo, grid.x_min, grid.cols())..=to_index(x_hi, grid.x_min, grid.cols()) {
                let (px, py) = grid.cell_center(row, col);
                let wa = ((b.1 - c.1)*(px - c.0) + (c.0 - b.0)*(py - c.1))/det;
                let wb = ((c.1 - a.1)*(px - c.0) + (a.0 - c.0)*(py - c.1))/det;
                let wc = 1.0 - wa - wb;
                if wa >= -BARYCENTRIC_TOLERANCE && wb >= -BARYCENTRIC_TOLERANCE && wc >= -BARYCENTRIC_TOLERANCE {
                    surface[(row,col)] = wa*a.2 + wb*b.2 + wc*c.2;
                }
            }
        }
    }
    surface
}
