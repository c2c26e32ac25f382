//! Positions, extents and axis-aligned boxes in warehouse coordinates.
//!
//! `x` runs along the warehouse length, `y` along its width and `z` up from
//! the floor. All values are meters.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tolerance for containment, clearance and score comparisons.
pub const EPSILON_GENERAL: f64 = 1e-9;

/// A point or an extent in warehouse coordinates.
///
/// # Examples
/// ```
/// use warehouse_optimizer::types::Vec3;
///
/// let corner = Vec3::new(1.0, 2.0, 3.0);
/// let extent = Vec3::new(10.0, 20.0, 30.0);
/// assert_eq!(corner + extent * 0.5, Vec3::new(6.0, 12.0, 18.0));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The warehouse origin corner.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Components in axis order, for per-axis loops.
    #[inline]
    pub const fn axes(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    pub fn from_axes([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }

    #[inline]
    fn zip_with(self, other: Self, f: impl Fn(f64, f64) -> f64) -> Self {
        let (a, b) = (self.axes(), other.axes());
        Self::from_axes([f(a[0], b[0]), f(a[1], b[1]), f(a[2], b[2])])
    }

    /// Volume of an extent in cubic meters.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.axes().iter().product()
    }

    /// Length of the vector.
    #[inline]
    pub fn norm(&self) -> f64 {
        self.axes().iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Straight-line distance between two points.
    #[inline]
    pub fn distance_to(&self, other: &Self) -> f64 {
        (*self - *other).norm()
    }

    /// Whether this extent fits into `outer` on every axis, up to `tolerance`.
    #[inline]
    pub fn fits_within(&self, outer: &Self, tolerance: f64) -> bool {
        self.axes()
            .iter()
            .zip(outer.axes())
            .all(|(inner, outer)| *inner <= outer + tolerance)
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, factor: f64) -> Self {
        Self::from_axes(self.axes().map(|v| v * factor))
    }
}

/// Anything with a fixed length, width and height.
///
/// Item specifications, instances, placed items and the envelope all expose
/// their extent through this trait so sorting and fit checks share one path.
pub trait Dimensional {
    fn dimensions(&self) -> Vec3;

    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }

    /// Whether the object fits an envelope with the given extent.
    fn fits_in(&self, envelope: &Vec3, tolerance: f64) -> bool {
        self.dimensions().fits_within(envelope, tolerance)
    }
}

/// Axis-aligned box `[min, max)` occupied by an item.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// Box of an item whose minimum corner sits at `position`.
    #[inline]
    pub fn from_position_and_dims(position: Vec3, dims: Vec3) -> Self {
        Self {
            min: position,
            max: position + dims,
        }
    }

    /// Whether the interiors overlap. Boxes sharing a face do not intersect.
    pub fn intersects(&self, other: &Self) -> bool {
        let (a_min, a_max) = (self.min.axes(), self.max.axes());
        let (b_min, b_max) = (other.min.axes(), other.max.axes());
        (0..3).all(|axis| a_min[axis] < b_max[axis] && b_min[axis] < a_max[axis])
    }

    /// Per-axis gap between the boxes, zero where their projections overlap.
    pub fn gaps(&self, other: &Self) -> Vec3 {
        let (a_min, a_max) = (self.min.axes(), self.max.axes());
        let (b_min, b_max) = (other.min.axes(), other.max.axes());
        Vec3::from_axes(std::array::from_fn(|axis| {
            axis_gap(a_min[axis], a_max[axis], b_min[axis], b_max[axis])
        }))
    }

    /// Shortest distance between any two points of the boxes.
    ///
    /// Zero for touching or overlapping boxes.
    pub fn distance_to(&self, other: &Self) -> f64 {
        self.gaps(other).norm()
    }

    /// Whether the box lies inside `[0, bounds]` on every axis.
    pub fn is_within(&self, bounds: &Vec3, tolerance: f64) -> bool {
        self.min.axes().iter().all(|v| *v >= -tolerance) && self.max.fits_within(bounds, tolerance)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

fn axis_gap(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> f64 {
    (a_min - b_max).max(b_min - a_max).max(0.0)
}

/// Running volume-weighted mean of item centers.
#[derive(Clone, Debug, Default)]
pub struct CentroidAccumulator {
    weighted: Vec3,
    total_volume: f64,
}

impl CentroidAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, center: Vec3, volume: f64) {
        self.weighted = self.weighted + center * volume;
        self.total_volume += volume;
    }

    /// The centroid, or `None` before any volume was added.
    pub fn compute(&self) -> Option<Vec3> {
        (self.total_volume > 0.0).then(|| self.weighted * self.total_volume.recip())
    }
}
