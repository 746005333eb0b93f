extern crate nalgebra as na;

use na::{DMatrix, Vector2};

use crate::sensors::camera::camera_model::CameraModel;
use crate::terrain::TerrainModel;
use crate::{Float, PipelineError, Result};

/// Boolean raster aligned with an image (row = v) or with a terrain grid (row 0 = south).
#[derive(Debug,Clone,PartialEq)]
pub struct Mask {
    pub buffer: DMatrix<bool>
}

impl Mask {
    pub fn new(buffer: DMatrix<bool>) -> Mask {
        Mask { buffer }
    }

    pub fn full(width: usize, height: usize) -> Mask {
        Mask { buffer: DMatrix::<bool>::from_element(height, width, true) }
    }

    pub fn empty(width: usize, height: usize) -> Mask {
        Mask { buffer: DMatrix::<bool>::from_element(height, width, false) }
    }

    /// Axis aligned rectangle [u_min,u_max) x [v_min,v_max) set to true.
    pub fn from_rectangle(width: usize, height: usize, (u_min, v_min): (usize, usize), (u_max, v_max): (usize, usize)) -> Mask {
        Mask { buffer: DMatrix::<bool>::from_fn(height, width, |r, c| c >= u_min && c < u_max && r >= v_min && r < v_max) }
    }

    pub fn width(&self) -> usize {
        self.buffer.ncols()
    }

    pub fn height(&self) -> usize {
        self.buffer.nrows()
    }

    pub fn count(&self) -> usize {
        self.buffer.iter().filter(|&&v| v).count()
    }

    /// Tests the pixel containing the continuous coordinate. False outside the raster.
    pub fn contains(&self, x: Float, y: Float) -> bool {
        if !(x >= 0.0 && y >= 0.0) {
            return false;
        }
        let c = x.floor() as usize;
        let r = y.floor() as usize;
        r < self.height() && c < self.width() && self.buffer[(r,c)]
    }

    /**
     * Image mask of the visible footprint of a terrain region.
     * Every terrain cell whose four nodes are inside `terrain_mask` is projected
     * into the image and its two triangles are rasterised. Occlusion is ignored.
     */
    pub fn from_terrain_mask(terrain: &TerrainModel, terrain_mask: &Mask, camera: &CameraModel, width: usize, height: usize) -> Result<Mask> {
        if terrain_mask.height() != terrain.rows() || terrain_mask.width() != terrain.cols() {
            return Err(PipelineError::InvalidArgument(format!(
                "terrain mask is {}x{} but the terrain grid is {}x{}",
                terrain_mask.height(), terrain_mask.width(), terrain.rows(), terrain.cols())));
        }

        let mut mask = Mask::empty(width, height);
        let project_node = |r: usize, c: usize| -> Option<Vector2<Float>> {
            let (x, y, z) = terrain.node(r, c);
            match z.is_finite() {
                true => camera.project(&na::Vector3::<Float>::new(x, y, z)).ok(),
                false => None
            }
        };

        for r in 0..terrain.rows()-1 {
            for c in 0..terrain.cols()-1 {
                let inside = terrain_mask.buffer[(r,c)] && terrain_mask.buffer[(r,c+1)] && terrain_mask.buffer[(r+1,c)] && terrain_mask.buffer[(r+1,c+1)];
                if !inside {
                    continue;
                }
                match (project_node(r,c), project_node(r,c+1), project_node(r+1,c), project_node(r+1,c+1)) {
                    (Some(p00), Some(p01), Some(p10), Some(p11)) => {
                        mask.fill_triangle(&p00, &p01, &p11);
                        mask.fill_triangle(&p00, &p11, &p10);
                    },
                    _ => ()
                }
            }
        }

        Ok(mask)
    }

    /// Sets every pixel whose centre lies inside (or on) the triangle.
    fn fill_triangle(&mut self, a: &Vector2<Float>, b: &Vector2<Float>, c: &Vector2<Float>) -> () {
        let edge = |p: &Vector2<Float>, q: &Vector2<Float>, x: Float, y: Float| (q.x - p.x)*(y - p.y) - (q.y - p.y)*(x - p.x);
        let area = edge(a, b, c.x, c.y);
        if area.abs() < Float::EPSILON {
            return;
        }

        let u_min = a.x.min(b.x).min(c.x).floor().max(0.0);
        let v_min = a.y.min(b.y).min(c.y).floor().max(0.0);
        let u_max = a.x.max(b.x).max(c.x).ceil().min(self.width() as Float - 1.0);
        let v_max = a.y.max(b.y).max(c.y).ceil().min(self.height() as Float - 1.0);
        if u_max < u_min || v_max < v_min {
            return;
        }

        for v in (v_min as usize)..=(v_max as usize) {
            for u in (u_min as usize)..=(u_max as usize) {
                let x = u as Float + 0.5;
                let y = v as Float + 0.5;
                let w0 = edge(b, c, x, y)*area.signum();
                let w1 = edge(c, a, x, y)*area.signum();
                let w2 = edge(a, b, x, y)*area.signum();
                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    self.buffer[(v,u)] = true;
                }
            }
        }
    }
}
