extern crate nalgebra as na;

use na::{Matrix3, Vector2, Vector3};
use serde::{Serialize, Deserialize};

use crate::image::Image;
use crate::numerics::normalize_angle_degrees;
use crate::sensors::camera::{pinhole::Pinhole, distortion::Distortion};
use crate::terrain::TerrainModel;
use crate::{Float, PipelineError, Result};

const MIN_DEPTH: Float = 1e-9;
const BISECTION_ITERATIONS: usize = 60;

/// Camera orientation in degrees. Zero looks due north with image right pointing east.
#[derive(Debug,Copy,Clone,PartialEq,Default,Serialize,Deserialize)]
pub struct Pose {
    pub yaw: Float,
    pub pitch: Float,
    pub roll: Float
}

impl Pose {
    pub fn new(yaw: Float, pitch: Float, roll: Float) -> Pose {
        Pose {
            yaw: normalize_angle_degrees(yaw),
            pitch: normalize_angle_degrees(pitch),
            roll: normalize_angle_degrees(roll)
        }
    }

    /**
     * Camera to world rotation C = Rz(-yaw)·Rx(pitch)·C0·Rz(roll)
     * C0 maps the camera axes (right, down, forward) onto (east, -up, north).
     */
    pub fn camera_to_world(&self) -> Matrix3<Float> {
        let rz = |angle: Float| {
            let (s, c) = angle.to_radians().sin_cos();
            Matrix3::<Float>::new(
                c, -s, 0.0,
                s, c, 0.0,
                0.0, 0.0, 1.0)
        };
        let (s_p, c_p) = self.pitch.to_radians().sin_cos();
        let rx = Matrix3::<Float>::new(
            1.0, 0.0, 0.0,
            0.0, c_p, -s_p,
            0.0, s_p, c_p);
        let c0 = Matrix3::<Float>::new(
            1.0, 0.0, 0.0,
            0.0, 0.0, 1.0,
            0.0, -1.0, 0.0);
        rz(-self.yaw)*rx*c0*rz(self.roll)
    }
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct CameraModel {
    pub location: Vector3<Float>,
    pub pose: Pose,
    pub intrinsics: Pinhole,
    pub distortion: Distortion,
    /// (width, height) of the reference image in pixels
    pub image_dimensions: (usize, usize)
}

impl CameraModel {
    pub fn new(location: Vector3<Float>, pose: Pose, intrinsics: Pinhole, distortion: Distortion, image_dimensions: (usize, usize)) -> Result<CameraModel> {
        if !intrinsics.is_valid() {
            return Err(PipelineError::InvalidArgument(format!("focal length and principal point must be positive, got {:?}", intrinsics)));
        }
        let pose = Pose::new(pose.yaw, pose.pitch, pose.roll);
        Ok(CameraModel { location, pose, intrinsics, distortion, image_dimensions })
    }

    pub fn with_pose(&self, pose: Pose) -> CameraModel {
        CameraModel { pose: Pose::new(pose.yaw, pose.pitch, pose.roll), ..self.clone() }
    }

    pub fn camera_to_world(&self) -> Matrix3<Float> {
        self.pose.camera_to_world()
    }

    pub fn world_to_camera(&self) -> Matrix3<Float> {
        self.camera_to_world().transpose()
    }

    pub fn to_camera_frame(&self, world_point: &Vector3<Float>) -> Vector3<Float> {
        self.world_to_camera()*(world_point - self.location)
    }

    /// World point to distorted pixel. Fails for points on or behind the camera plane.
    pub fn project(&self, world_point: &Vector3<Float>) -> Result<Vector2<Float>> {
        let position = self.to_camera_frame(world_point);
        match position.z {
            z if z > MIN_DEPTH => {
                let normalized = Vector2::<Float>::new(position.x/z, position.y/z);
                Ok(self.intrinsics.denormalize(&self.distortion.distort(&normalized)))
            },
            depth => Err(PipelineError::Projection { depth })
        }
    }

    /// Raw pixel to the ideal pinhole pixel with the same intrinsic matrix.
    pub fn undistort_point(&self, pixel: &Vector2<Float>) -> Vector2<Float> {
        let normalized = self.intrinsics.normalize(pixel);
        self.intrinsics.denormalize(&self.distortion.undistort(&normalized))
    }

    /// Unit world space direction of the ray through an ideal pixel.
    pub fn ray_direction(&self, ideal_pixel: &Vector2<Float>) -> Vector3<Float> {
        let normalized = self.intrinsics.normalize(ideal_pixel);
        (self.camera_to_world()*Vector3::<Float>::new(normalized.x, normalized.y, 1.0)).normalize()
    }

    pub fn unproject(&self, pixel: &Vector2<Float>, terrain: &TerrainModel) -> Result<Vector3<Float>> {
        self.unproject_undistorted(&self.undistort_point(pixel), terrain)
            .map_err(|_| PipelineError::NoIntersection { u: pixel.x, v: pixel.y })
    }

    /**
     * Intersects the ray through an ideal pixel with the terrain.
     * The ray is marched at half a grid cell per step inside the horizontal extent
     * until it first drops below the surface; the crossing is refined by bisection.
     */
    pub fn unproject_undistorted(&self, ideal_pixel: &Vector2<Float>, terrain: &TerrainModel) -> Result<Vector3<Float>> {
        let no_intersection = PipelineError::NoIntersection { u: ideal_pixel.x, v: ideal_pixel.y };
        let direction = self.ray_direction(ideal_pixel);
        let origin = self.location;
        let extent = terrain.extent();
        let max_range = extent.diagonal() + extent.distance_to(origin.x, origin.y, origin.z);

        let (t_enter, t_exit) = slab_interval(origin.x, direction.x, extent.x_min, extent.x_max)
            .and_then(|(a0, a1)| slab_interval(origin.y, direction.y, extent.y_min, extent.y_max).map(|(b0, b1)| (a0.max(b0), a1.min(b1))))
            .ok_or(no_intersection)?;
        let t_start = t_enter.max(0.0);
        let t_end = t_exit.min(max_range);
        if !(t_end >= t_start) {
            return Err(PipelineError::NoIntersection { u: ideal_pixel.x, v: ideal_pixel.y });
        }

        let height_above = |t: Float| {
            let p = origin + direction*t;
            terrain.elevation(p.x, p.y).map(|z| p.z - z)
        };

        let step = 0.5*terrain.cell_size();
        let step_count = ((t_end - t_start)/step).ceil() as usize;
        let mut previous_above: Option<Float> = None;

        for k in 0..=step_count {
            let t = (t_start + k as Float*step).min(t_end);
            match height_above(t) {
                Some(h) if h > 0.0 => previous_above = Some(t),
                Some(_) => match previous_above {
                    Some(t_above) => {
                        let t_hit = bisect(t_above, t, &height_above);
                        return Ok(origin + direction*t_hit);
                    },
                    None => ()
                },
                None => previous_above = None
            }
        }

        Err(PipelineError::NoIntersection { u: ideal_pixel.x, v: ideal_pixel.y })
    }

    /// Removes lens distortion by resampling; pixels mapping outside the source are 0.
    pub fn undistort(&self, image: &Image) -> Image {
        let mut output = Image::empty(image.width(), image.height(), image.original_encoding);
        if self.distortion.is_identity() {
            output.buffer.copy_from(&image.buffer);
            return output;
        }
        for v in 0..image.height() {
            for u in 0..image.width() {
                let normalized = self.intrinsics.normalize(&Vector2::<Float>::new(u as Float, v as Float));
                let source = self.intrinsics.denormalize(&self.distortion.distort(&normalized));
                output.buffer[(v,u)] = image.sample(source.x, source.y).unwrap_or(0.0);
            }
        }
        output
    }
}

/// Parameter interval along a ray that stays within [min, max] on one axis.
fn slab_interval(origin: Float, direction: Float, min: Float, max: Float) -> Option<(Float, Float)> {
    match direction {
        d if d.abs() < Float::EPSILON => match origin >= min && origin <= max {
            true => Some((Float::NEG_INFINITY, Float::INFINITY)),
            false => None
        },
        d => {
            let t0 = (min - origin)/d;
            let t1 = (max - origin)/d;
            Some((t0.min(t1), t0.max(t1)))
        }
    }
}

fn bisect<F>(mut t_above: Float, mut t_below: Float, height_above: &F) -> Float where F: Fn(Float) -> Option<Float> {
    for _ in 0..BISECTION_ITERATIONS {
        let t_mid = 0.5*(t_above + t_below);
        match height_above(t_mid) {
            Some(h) if h > 0.0 => t_above = t_mid,
            _ => t_below = t_mid
        }
    }
    0.5*(t_above + t_below)
}
