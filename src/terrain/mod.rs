extern crate nalgebra as na;

use na::DMatrix;
use tracing::debug;

use crate::{Float, PipelineError, Result};

/// Horizontal and vertical bounds of a terrain grid.
#[derive(Debug,Copy,Clone,PartialEq)]
pub struct Extent {
    pub x_min: Float,
    pub x_max: Float,
    pub y_min: Float,
    pub y_max: Float,
    pub z_min: Float,
    pub z_max: Float
}

impl Extent {
    pub fn diagonal(&self) -> Float {
        ((self.x_max - self.x_min).powi(2) + (self.y_max - self.y_min).powi(2) + (self.z_max - self.z_min).powi(2)).sqrt()
    }

    /// Euclidean distance from a point to the bounding box.
    pub fn distance_to(&self, x: Float, y: Float, z: Float) -> Float {
        let dx = (self.x_min - x).max(0.0).max(x - self.x_max);
        let dy = (self.y_min - y).max(0.0).max(y - self.y_max);
        let dz = (self.z_min - z).max(0.0).max(z - self.z_max);
        (dx*dx + dy*dy + dz*dz).sqrt()
    }
}

/**
 * Node registered elevation grid. Node (row j, col i) sits at
 * (x_min + i*dx, y_min + j*dy); row 0 is the southern-most row.
 * NODATA nodes are stored as NaN.
 */
#[derive(Debug,Clone)]
pub struct TerrainModel {
    elevations: DMatrix<Float>,
    x_min: Float,
    y_min: Float,
    dx: Float,
    dy: Float
}

impl TerrainModel {
    pub fn new(elevations: DMatrix<Float>, x_min: Float, y_min: Float, dx: Float, dy: Float) -> Result<TerrainModel> {
        match (elevations.nrows(), elevations.ncols()) {
            (r, c) if r < 2 || c < 2 => return Err(PipelineError::InvalidArgument(format!("terrain grid needs at least 2x2 nodes, got {}x{}", r, c))),
            _ => ()
        };
        if !(dx > 0.0 && dy > 0.0) {
            return Err(PipelineError::InvalidArgument(format!("terrain spacing must be positive, got ({}, {})", dx, dy)));
        }
        Ok(TerrainModel { elevations, x_min, y_min, dx, dy })
    }

    /// Constant elevation over the given extent.
    pub fn flat(x_min: Float, x_max: Float, y_min: Float, y_max: Float, elevation: Float, spacing: Float) -> Result<TerrainModel> {
        if !(spacing > 0.0) || !(x_max > x_min) || !(y_max > y_min) {
            return Err(PipelineError::InvalidArgument("flat terrain needs a positive spacing and a non empty extent".to_string()));
        }
        let cols = ((x_max - x_min)/spacing).round() as usize + 1;
        let rows = ((y_max - y_min)/spacing).round() as usize + 1;
        let dx = (x_max - x_min)/((cols - 1).max(1) as Float);
        let dy = (y_max - y_min)/((rows - 1).max(1) as Float);
        TerrainModel::new(DMatrix::<Float>::from_element(rows.max(2), cols.max(2), elevation), x_min, y_min, dx, dy)
    }

    pub fn rows(&self) -> usize {
        self.elevations.nrows()
    }

    pub fn cols(&self) -> usize {
        self.elevations.ncols()
    }

    pub fn spacing(&self) -> (Float, Float) {
        (self.dx, self.dy)
    }

    pub fn cell_size(&self) -> Float {
        self.dx.min(self.dy)
    }

    pub fn elevations(&self) -> &DMatrix<Float> {
        &self.elevations
    }

    pub fn node(&self, row: usize, col: usize) -> (Float, Float, Float) {
        (self.x_min + col as Float*self.dx, self.y_min + row as Float*self.dy, self.elevations[(row,col)])
    }

    pub fn extent(&self) -> Extent {
        let (z_min, z_max) = self.elevations.iter()
            .filter(|v| v.is_finite())
            .fold((Float::INFINITY, Float::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let (z_min, z_max) = match z_min <= z_max {
            true => (z_min, z_max),
            false => (0.0, 0.0)
        };
        Extent {
            x_min: self.x_min,
            x_max: self.x_min + (self.cols() - 1) as Float*self.dx,
            y_min: self.y_min,
            y_max: self.y_min + (self.rows() - 1) as Float*self.dy,
            z_min,
            z_max
        }
    }

    /// Bilinear elevation. `None` outside the grid or next to a NODATA node.
    pub fn elevation(&self, x: Float, y: Float) -> Option<Float> {
        let col_f = (x - self.x_min)/self.dx;
        let row_f = (y - self.y_min)/self.dy;
        let max_col = (self.cols() - 1) as Float;
        let max_row = (self.rows() - 1) as Float;
        if !(col_f >= 0.0 && row_f >= 0.0 && col_f <= max_col && row_f <= max_row) {
            return None;
        }

        let c0 = (col_f.floor() as usize).min(self.cols() - 2);
        let r0 = (row_f.floor() as usize).min(self.rows() - 2);
        let fc = col_f - c0 as Float;
        let fr = row_f - r0 as Float;

        let z00 = self.elevations[(r0,c0)];
        let z01 = self.elevations[(r0,c0+1)];
        let z10 = self.elevations[(r0+1,c0)];
        let z11 = self.elevations[(r0+1,c0+1)];
        let z = (1.0 - fr)*((1.0 - fc)*z00 + fc*z01) + fr*((1.0 - fc)*z10 + fc*z11);
        match z.is_finite() {
            true => Some(z),
            false => None
        }
    }

    /// Resamples to (n-1)*factor+1 nodes per axis. Existing nodes keep their values.
    pub fn densify(&self, factor: usize) -> Result<TerrainModel> {
        match factor {
            0 => Err(PipelineError::InvalidArgument("terrain densify factor must be at least 1".to_string())),
            1 => Ok(self.clone()),
            f => {
                let rows = (self.rows() - 1)*f + 1;
                let cols = (self.cols() - 1)*f + 1;
                let dx = self.dx/f as Float;
                let dy = self.dy/f as Float;
                let extent = self.extent();
                let elevations = DMatrix::<Float>::from_fn(rows, cols, |r, c| {
                    match (r % f, c % f) {
                        (0, 0) => self.elevations[(r/f, c/f)],
                        _ => {
                            let x = (self.x_min + c as Float*dx).min(extent.x_max);
                            let y = (self.y_min + r as Float*dy).min(extent.y_max);
                            self.elevation(x, y).unwrap_or(Float::NAN)
                        }
                    }
                });
                debug!("densified terrain from {}x{} to {}x{}", self.rows(), self.cols(), rows, cols);
                TerrainModel::new(elevations, self.x_min, self.y_min, dx, dy)
            }
        }
    }
}
