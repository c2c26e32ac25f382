//! Discretized 3D occupancy of the warehouse volume.
//!
//! The envelope is split into cubic cells of edge `resolution`. A cell is occupied
//! iff it intersects the interior of at least one committed item. Overlap tests
//! and volume accounting are resolution-bound: an item that covers part of a cell
//! claims the whole cell.

use std::ops::Range;

use thiserror::Error;

use crate::model::{ValidationError, WarehouseEnvelope};
use crate::types::{BoundingBox, Dimensional, EPSILON_GENERAL, Vec3};

/// Tolerance in cell units when mapping coordinates onto cell indices.
const CELL_EPSILON: f64 = 1e-9;

/// Internal invariant violations raised by [`OccupancyGrid::commit`].
///
/// These never result from valid external input; they indicate that a caller
/// skipped the admissibility checks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("commit of box {min:?}..{max:?} hits occupied cell {cell:?}")]
    CellOccupied {
        cell: [usize; 3],
        min: Vec3,
        max: Vec3,
    },
    #[error("commit of box {min:?}..{max:?} leaves the envelope {envelope:?}")]
    OutOfBounds { min: Vec3, max: Vec3, envelope: Vec3 },
}

/// Number of cells a grid over `envelope` at `resolution` would allocate.
///
/// Lets callers reject oversized grids before allocating anything.
pub fn planned_cell_count(envelope: &WarehouseEnvelope, resolution: f64) -> u64 {
    let per_axis = |len: f64| (len / resolution - CELL_EPSILON).ceil().max(1.0) as u64;
    per_axis(envelope.length)
        .saturating_mul(per_axis(envelope.width))
        .saturating_mul(per_axis(envelope.height))
}

/// Boolean occupancy grid owned by exactly one optimization run.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    bounds: Vec3,
    resolution: f64,
    cells: [usize; 3],
    occupied: Vec<bool>,
    occupied_count: usize,
    used_volume: f64,
}

impl OccupancyGrid {
    /// Creates an empty grid covering `envelope`.
    ///
    /// Dimensions in cells are `ceil(side / resolution)` per axis.
    pub fn new(envelope: &WarehouseEnvelope, resolution: f64) -> Result<Self, ValidationError> {
        if resolution <= 0.0 || !resolution.is_finite() {
            return Err(ValidationError::InvalidResolution(resolution));
        }
        envelope.validate()?;

        let per_axis = |len: f64| (len / resolution - CELL_EPSILON).ceil().max(1.0) as usize;
        let cells = [
            per_axis(envelope.length),
            per_axis(envelope.width),
            per_axis(envelope.height),
        ];
        let total = cells[0] * cells[1] * cells[2];

        Ok(Self {
            bounds: envelope.dimensions(),
            resolution,
            cells,
            occupied: vec![false; total],
            occupied_count: 0,
            used_volume: 0.0,
        })
    }

    /// Cell edge length in meters.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Grid size in cells along x, y and z.
    pub fn dims_in_cells(&self) -> [usize; 3] {
        self.cells
    }

    /// Envelope dimensions covered by the grid.
    pub fn bounds(&self) -> Vec3 {
        self.bounds
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.occupied_count
    }

    /// Checks whether the given cell is occupied.
    pub fn is_occupied(&self, cell: [usize; 3]) -> bool {
        self.occupied[self.index(cell)]
    }

    /// Checks whether `bbox` lies inside the envelope and touches no occupied cell.
    pub fn is_free(&self, bbox: &BoundingBox) -> bool {
        if !bbox.is_within(&self.bounds, EPSILON_GENERAL) {
            return false;
        }
        self.first_occupied(bbox).is_none()
    }

    /// Marks every cell intersected by `bbox` as occupied.
    ///
    /// The whole range is checked before anything is written, so a rejected
    /// commit leaves the grid untouched.
    pub fn commit(&mut self, bbox: &BoundingBox) -> Result<(), GridError> {
        if !bbox.is_within(&self.bounds, EPSILON_GENERAL) {
            return Err(GridError::OutOfBounds {
                min: bbox.min,
                max: bbox.max,
                envelope: self.bounds,
            });
        }
        if let Some(cell) = self.first_occupied(bbox) {
            return Err(GridError::CellOccupied {
                cell,
                min: bbox.min,
                max: bbox.max,
            });
        }

        let [xs, ys, zs] = self.cell_ranges(bbox);
        let mut added = 0;
        for x in xs.clone() {
            for y in ys.clone() {
                for z in zs.clone() {
                    let idx = self.index([x, y, z]);
                    self.occupied[idx] = true;
                    added += 1;
                }
            }
        }
        self.occupied_count += added;
        self.used_volume += self.clipped_extent(0, &xs)
            * self.clipped_extent(1, &ys)
            * self.clipped_extent(2, &zs);
        Ok(())
    }

    /// Occupied volume in cubic meters, resolution-bound.
    ///
    /// Sum of the occupied cells' volumes, each clipped to the envelope. Equals
    /// `occupied_cells() × resolution³` when the envelope is a multiple of the
    /// resolution.
    pub fn used_volume(&self) -> f64 {
        self.used_volume
    }

    fn first_occupied(&self, bbox: &BoundingBox) -> Option<[usize; 3]> {
        let [xs, ys, zs] = self.cell_ranges(bbox);
        for x in xs {
            for y in ys.clone() {
                for z in zs.clone() {
                    if self.occupied[self.index([x, y, z])] {
                        return Some([x, y, z]);
                    }
                }
            }
        }
        None
    }

    fn cell_ranges(&self, bbox: &BoundingBox) -> [Range<usize>; 3] {
        [
            self.axis_range(bbox.min.x, bbox.max.x, self.cells[0]),
            self.axis_range(bbox.min.y, bbox.max.y, self.cells[1]),
            self.axis_range(bbox.min.z, bbox.max.z, self.cells[2]),
        ]
    }

    /// Cells whose interior overlaps `[min, max)`, clipped to the grid.
    fn axis_range(&self, min: f64, max: f64, limit: usize) -> Range<usize> {
        let start = (min / self.resolution + CELL_EPSILON).floor().max(0.0) as usize;
        let end = (max / self.resolution - CELL_EPSILON).ceil().max(0.0) as usize;
        start.min(limit)..end.min(limit)
    }

    /// Summed length of the cells in `range` along `axis`, clipped to the envelope.
    fn clipped_extent(&self, axis: usize, range: &Range<usize>) -> f64 {
        let side = match axis {
            0 => self.bounds.x,
            1 => self.bounds.y,
            _ => self.bounds.z,
        };
        let lo = range.start as f64 * self.resolution;
        let hi = (range.end as f64 * self.resolution).min(side);
        (hi - lo).max(0.0)
    }

    #[inline]
    fn index(&self, [x, y, z]: [usize; 3]) -> usize {
        (x * self.cells[1] + y) * self.cells[2] + z
    }
}
