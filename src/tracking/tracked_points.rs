extern crate nalgebra as na;

use na::Vector2;
use crate::Float;

#[derive(Debug,Clone,Copy,PartialEq)]
pub struct TrackedPoint {
    pub start: Vector2<Float>,
    pub end: Vector2<Float>,
    /// Round trip distance |B->A(A->B(start)) - start| in pixels; infinite when tracking failed
    pub back_error: Float,
    pub confidence: Float,
    pub valid: bool
}

impl TrackedPoint {
    pub fn failed(start: Vector2<Float>) -> TrackedPoint {
        TrackedPoint { start, end: start, back_error: Float::INFINITY, confidence: 0.0, valid: false }
    }

    pub fn displacement(&self) -> Vector2<Float> {
        self.end - self.start
    }
}

/// Correspondences of one image pair plus the number of seeds they came from.
#[derive(Debug,Clone,Default,PartialEq)]
pub struct TrackedPointSet {
    pub points: Vec<TrackedPoint>,
    pub seeded: usize
}

impl TrackedPointSet {
    pub fn new(points: Vec<TrackedPoint>, seeded: usize) -> TrackedPointSet {
        TrackedPointSet { points, seeded }
    }

    pub fn empty(seeded: usize) -> TrackedPointSet {
        TrackedPointSet { points: Vec::new(), seeded }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.points.iter().filter(|p| p.valid).count()
    }

    /// Points that produced a finite round trip.
    pub fn tracked_count(&self) -> usize {
        self.points.iter().filter(|p| p.back_error.is_finite()).count()
    }

    /// Invalidates points whose back error exceeds the threshold or is not finite.
    /// Returns the number of newly rejected points.
    pub fn reject_by_back_error(&mut self, threshold: Float) -> usize {
        let mut rejected = 0;
        for point in self.points.iter_mut().filter(|p| p.valid) {
            if !(point.back_error <= threshold) {
                point.valid = false;
                rejected += 1;
            }
        }
        rejected
    }

    pub fn into_valid(self) -> TrackedPointSet {
        TrackedPointSet {
            points: self.points.into_iter().filter(|p| p.valid).collect(),
            seeded: self.seeded
        }
    }

    pub fn mean_back_error(&self) -> Option<Float> {
        let errors: Vec<Float> = self.points.iter().filter(|p| p.valid).map(|p| p.back_error).collect();
        crate::numerics::mean(&errors)
    }
}
