//! Geometric helpers for placed items.
//!
//! Overlap, containment and clearance distance between committed placements,
//! expressed on their axis-aligned boxes.

use crate::model::{PlacedItem, WarehouseEnvelope};
use crate::types::{BoundingBox, Dimensional, EPSILON_GENERAL};

/// Checks whether two placed items overlap in space.
///
/// Uses Axis-Aligned Bounding Box (AABB) collision detection. Items that share
/// a face do not overlap.
///
/// # Parameters
/// * `a` - First placed item
/// * `b` - Second placed item
pub fn intersects(a: &PlacedItem, b: &PlacedItem) -> bool {
    a.bounding_box().intersects(&b.bounding_box())
}

/// Shortest distance between the boxes of two placed items.
///
/// Per axis the gap between the two intervals (zero where they overlap),
/// combined as the Euclidean norm. Overlapping boxes have distance 0.
pub fn box_distance(a: &BoundingBox, b: &BoundingBox) -> f64 {
    a.distance_to(b)
}

/// Checks whether a placed item lies inside `[0, length] × [0, width] × [0, height]`.
pub fn is_contained(item: &PlacedItem, envelope: &WarehouseEnvelope) -> bool {
    item.bounding_box()
        .is_within(&envelope.dimensions(), EPSILON_GENERAL)
}
