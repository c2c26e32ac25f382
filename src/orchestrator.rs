//! Entry point of the placement engine.
//!
//! Validates a request, runs the chosen strategy on a fresh grid and assembles
//! the result with metrics and a constraint audit.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::classifier::Category;
use crate::constraints::{ConstraintViolation, audit_plan};
use crate::grid::{GridError, OccupancyGrid, planned_cell_count};
use crate::metrics::Metrics;
use crate::model::{ItemSpec, PlacedItem, ValidationError, WarehouseEnvelope, expand_instances};
use crate::optimizer::{
    self, EngineConfig, HybridTrial, PlacementEvent, StrategyOutcome, UnplacedItem,
};
use crate::recommender::AlgorithmRecommender;
use crate::types::Vec3;

pub use crate::optimizer::Algorithm;

/// Identifier that asks the recommender to choose the algorithm.
pub const AUTO_ALGORITHM: &str = "auto";

/// Errors that abort a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("internal invariant violated: {0}")]
    InvariantViolation(#[from] GridError),
}

/// A validated-on-demand optimization request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub warehouse: WarehouseEnvelope,
    pub items: Vec<ItemSpec>,
    pub algorithm: Algorithm,
    /// Overrides the configured grid resolution for this run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,
}

impl OptimizationRequest {
    pub fn new(warehouse: WarehouseEnvelope, items: Vec<ItemSpec>, algorithm: Algorithm) -> Self {
        Self {
            warehouse,
            items,
            algorithm,
            resolution: None,
        }
    }

    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Checks the whole request and returns the resolution the run will use.
    ///
    /// Nothing is allocated before this succeeds; an oversized grid is rejected
    /// here as well.
    pub fn validate(&self, config: &EngineConfig) -> Result<f64, ValidationError> {
        self.warehouse.validate()?;
        for (index, item) in self.items.iter().enumerate() {
            item.validate(index)?;
        }

        let instances = self.instance_count();
        if instances > config.max_instances {
            return Err(ValidationError::TooManyInstances {
                instances,
                limit: config.max_instances,
            });
        }

        let resolution = self.resolution.unwrap_or(config.resolution);
        if resolution <= 0.0 || !resolution.is_finite() {
            return Err(ValidationError::InvalidResolution(resolution));
        }

        let cells = planned_cell_count(&self.warehouse, resolution);
        if cells > config.max_grid_cells {
            return Err(ValidationError::GridTooLarge {
                cells,
                limit: config.max_grid_cells,
            });
        }

        Ok(resolution)
    }

    /// Total number of requested instances.
    pub fn instance_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}

/// Edge lengths of a placed item.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl From<Vec3> for Dimensions {
    fn from(v: Vec3) -> Self {
        Self {
            length: v.x,
            width: v.y,
            height: v.z,
        }
    }
}

/// A placed item as reported to callers.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct PlacedItemReport {
    pub id: String,
    pub name: String,
    /// Minimum corner in meters
    pub position: Vec3,
    pub dimensions: Dimensions,
    pub category: Category,
    pub weight: f64,
}

impl From<&PlacedItem> for PlacedItemReport {
    fn from(item: &PlacedItem) -> Self {
        Self {
            id: item.instance.id.clone(),
            name: item.instance.name.clone(),
            position: item.position,
            dimensions: item.instance.dims.into(),
            category: item.category(),
            weight: item.weight(),
        }
    }
}

/// Why one instance stayed out of the plan.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct UnplacedItemReport {
    pub id: String,
    pub name: String,
    pub reason_code: String,
    pub reason: String,
}

impl From<&UnplacedItem> for UnplacedItemReport {
    fn from(item: &UnplacedItem) -> Self {
        Self {
            id: item.instance.id.clone(),
            name: item.instance.name.clone(),
            reason_code: item.reason.code().to_string(),
            reason: item.reason.to_string(),
        }
    }
}

/// Outcome of one run. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "algorithm": "bin_packing",
    "placed_items": [{
        "id": "Pallet Box_1", "name": "Pallet Box",
        "position": {"x": 0.0, "y": 0.0, "z": 0.0},
        "dimensions": {"length": 1.2, "width": 0.8, "height": 1.5},
        "category": "pallet", "weight": 500.0
    }],
    "unplaced_items": [],
    "metrics": {
        "utilization": 0.6, "items_placed": 1, "items_total": 1,
        "efficiency": 100.0, "volume_used": 3.0, "volume_total": 500.0
    },
    "violations": [],
    "warehouse_dimensions": {"length": 10.0, "width": 10.0, "height": 5.0},
    "resolution": 0.5
}))]
pub struct OptimizationResult {
    pub algorithm: Algorithm,
    /// Winning trial when the algorithm is `hybrid`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hybrid_trial: Option<HybridTrial>,
    pub placed_items: Vec<PlacedItemReport>,
    /// Names of the instances without a position, one entry per instance
    pub unplaced_items: Vec<String>,
    pub unplaced_details: Vec<UnplacedItemReport>,
    pub metrics: Metrics,
    pub violations: Vec<ConstraintViolation>,
    pub warehouse_dimensions: WarehouseEnvelope,
    pub resolution: f64,
}

/// Chooses the algorithm of a run.
///
/// An explicit identifier always wins. `None` or `"auto"` asks the recommender;
/// without a recommender, or when it fails, `fallback` is used.
///
/// # Errors
/// Returns [`ValidationError::UnknownAlgorithm`] for identifiers that name no strategy.
pub fn resolve_algorithm(
    requested: Option<&str>,
    recommender: Option<&dyn AlgorithmRecommender>,
    envelope: &WarehouseEnvelope,
    items: &[ItemSpec],
    fallback: Algorithm,
) -> Result<Algorithm, ValidationError> {
    match requested.map(str::trim) {
        Some(id) if !id.is_empty() && id != AUTO_ALGORITHM => id.parse(),
        _ => {
            let Some(recommender) = recommender else {
                return Ok(fallback);
            };
            match recommender.recommend(envelope, items) {
                Ok(rec) => {
                    debug!(algorithm = %rec.algorithm, reason = %rec.reason, "Using recommended algorithm");
                    Ok(rec.algorithm)
                }
                Err(err) => {
                    warn!(error = %err, fallback = %fallback, "Recommender unavailable, using fallback algorithm");
                    Ok(fallback)
                }
            }
        }
    }
}

/// Runs a request without progress reporting.
pub fn optimize(
    request: &OptimizationRequest,
    config: &EngineConfig,
) -> Result<OptimizationResult, EngineError> {
    optimize_with_progress(request, config, |_| {})
}

/// Runs a request and reports every placement decision to `on_event`.
///
/// # Parameters
/// * `request` - Warehouse, items and algorithm
/// * `config` - Engine configuration; `request.resolution` overrides its resolution
/// * `on_event` - Receives the run's [`PlacementEvent`]s in order
///
/// # Errors
/// [`EngineError::Validation`] before anything is allocated, or
/// [`EngineError::InvariantViolation`] when a commit would corrupt the grid.
pub fn optimize_with_progress(
    request: &OptimizationRequest,
    config: &EngineConfig,
    mut on_event: impl FnMut(&PlacementEvent),
) -> Result<OptimizationResult, EngineError> {
    let resolution = request.validate(config)?;
    let algorithm = request.algorithm;
    let grid = OccupancyGrid::new(&request.warehouse, resolution)?;

    let mut instances = expand_instances(&request.items);
    optimizer::sort_instances(&mut instances);
    let items_total = instances.len();

    info!(
        algorithm = %algorithm,
        instances = items_total,
        resolution,
        cells = ?grid.dims_in_cells(),
        "Starting optimization run"
    );
    on_event(&PlacementEvent::RunStarted {
        algorithm,
        instances: items_total,
    });

    let deadline = config.deadline_from_now();
    let run = match algorithm {
        Algorithm::BinPacking => optimizer::bin_packing,
        Algorithm::SpaceFilling => optimizer::space_filling,
        Algorithm::Hybrid => optimizer::hybrid,
    };
    let outcome = run(instances, grid, config, deadline, &mut on_event).map_err(|err| {
        error!(algorithm = %algorithm, error = %err, "Placement run aborted");
        EngineError::InvariantViolation(err)
    })?;

    let result = assemble_result(request, config, algorithm, resolution, outcome, items_total);

    on_event(&PlacementEvent::Finished {
        placed: result.metrics.items_placed,
        unplaced: result.unplaced_items.len(),
        utilization: result.metrics.utilization,
    });
    info!(
        algorithm = %algorithm,
        placed = result.metrics.items_placed,
        unplaced = result.unplaced_items.len(),
        utilization = result.metrics.utilization,
        volume_used = result.metrics.volume_used,
        "Optimization run finished"
    );

    Ok(result)
}

fn assemble_result(
    request: &OptimizationRequest,
    config: &EngineConfig,
    algorithm: Algorithm,
    resolution: f64,
    outcome: StrategyOutcome,
    items_total: usize,
) -> OptimizationResult {
    let metrics = Metrics::from_grid(
        &outcome.grid,
        &request.warehouse,
        outcome.placed.len(),
        items_total,
    );

    let violations = audit_plan(
        &outcome.placed,
        &request.warehouse,
        &config.distance_constraint(),
    );
    if !violations.is_empty() {
        warn!(count = violations.len(), "Placement plan violates constraints");
    }

    OptimizationResult {
        algorithm,
        hybrid_trial: outcome.selected_trial,
        placed_items: outcome.placed.iter().map(PlacedItemReport::from).collect(),
        unplaced_items: outcome
            .unplaced
            .iter()
            .map(|u| u.instance.name.clone())
            .collect(),
        unplaced_details: outcome.unplaced.iter().map(UnplacedItemReport::from).collect(),
        metrics,
        violations,
        warehouse_dimensions: request.warehouse,
        resolution,
    }
}
