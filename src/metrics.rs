//! Utilization statistics of a finished placement plan.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::grid::OccupancyGrid;
use crate::model::WarehouseEnvelope;

/// Summary of a run, all percentages in `[0, 100]`.
///
/// Volumes follow the grid's resolution-bound accounting, not exact item
/// geometry, so two runs at the same resolution compare exactly.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "utilization": 9.22, "items_placed": 10, "items_total": 10,
    "efficiency": 100.0, "volume_used": 46.08, "volume_total": 500.0
}))]
pub struct Metrics {
    /// Used volume relative to the envelope, in percent
    pub utilization: f64,
    pub items_placed: usize,
    /// Sum of all requested quantities
    pub items_total: usize,
    /// Placed instances relative to requested instances, in percent
    pub efficiency: f64,
    /// Occupied volume in cubic meters
    pub volume_used: f64,
    /// Envelope volume in cubic meters
    pub volume_total: f64,
}

impl Metrics {
    /// Derives the metrics of a plan from its grid.
    ///
    /// # Parameters
    /// * `grid` - Grid after the last commit of the run
    /// * `envelope` - The warehouse envelope of the run
    /// * `items_placed` - Length of the placement plan
    /// * `items_total` - Number of requested instances
    pub fn from_grid(
        grid: &OccupancyGrid,
        envelope: &WarehouseEnvelope,
        items_placed: usize,
        items_total: usize,
    ) -> Self {
        let volume_total = envelope.volume();
        let volume_used = grid.used_volume().min(volume_total);

        let utilization = if volume_total > 0.0 {
            (volume_used / volume_total * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let efficiency = if items_total > 0 {
            items_placed as f64 / items_total as f64 * 100.0
        } else {
            0.0
        };

        Self {
            utilization: round2(utilization),
            items_placed,
            items_total,
            efficiency: round2(efficiency),
            volume_used: round2(volume_used),
            volume_total: round2(volume_total),
        }
    }
}

/// Rounds to the two decimals used for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use crate::types::Vec3;
    use approx::assert_relative_eq;

    fn envelope(l: f64, w: f64, h: f64) -> WarehouseEnvelope {
        WarehouseEnvelope::new(l, w, h).unwrap()
    }

    #[test]
    fn empty_grid_has_zero_utilization() {
        let env = envelope(10.0, 10.0, 5.0);
        let grid = OccupancyGrid::new(&env, 0.5).unwrap();
        let metrics = Metrics::from_grid(&grid, &env, 0, 3);
        assert_eq!(metrics.utilization, 0.0);
        assert_eq!(metrics.volume_used, 0.0);
        assert_eq!(metrics.efficiency, 0.0);
        assert_eq!(metrics.volume_total, 500.0);
    }

    #[test]
    fn metrics_use_grid_volume_and_round() {
        let env = envelope(3.0, 3.0, 3.0);
        let mut grid = OccupancyGrid::new(&env, 0.5).unwrap();
        // 0.7 m cube covers two cells per axis at 0.5 m resolution: 1 m³
        grid.commit(&BoundingBox::from_position_and_dims(
            Vec3::zero(),
            Vec3::new(0.7, 0.7, 0.7),
        ))
        .unwrap();

        let metrics = Metrics::from_grid(&grid, &env, 1, 3);
        assert_relative_eq!(metrics.volume_used, 1.0);
        assert_relative_eq!(metrics.utilization, 3.7);
        assert_relative_eq!(metrics.efficiency, 33.33);
    }

    #[test]
    fn no_requested_items_means_zero_efficiency() {
        let env = envelope(1.0, 1.0, 1.0);
        let grid = OccupancyGrid::new(&env, 0.5).unwrap();
        let metrics = Metrics::from_grid(&grid, &env, 0, 0);
        assert_eq!(metrics.efficiency, 0.0);
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(12.345_6), 12.35);
        assert_eq!(round2(0.004), 0.0);
        assert_eq!(round2(100.0), 100.0);
    }
}
