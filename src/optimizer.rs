//! Placement strategies for the warehouse layout.
//!
//! All strategies share one candidate scan over the resolution grid (bottom-up:
//! increasing z, then y, then x). A position is admissible when its cells are
//! free and it keeps the clearance to every item of another category. The
//! strategies differ only in how they pick among admissible positions:
//! - Bin Packing: first admissible position (first-fit decreasing)
//! - Space Filling: admissible position closest to the placed volume's centroid
//! - Hybrid: best of Bin Packing, Space Filling and a two-phase retry

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::classifier::Category;
use crate::constraints::DistanceConstraint;
use crate::grid::{GridError, OccupancyGrid};
use crate::model::{ItemInstance, PlacedItem, ValidationError};
use crate::types::{BoundingBox, CentroidAccumulator, Dimensional, EPSILON_GENERAL, Vec3};

/// Configuration for the placement engine.
///
/// Holds the grid resolution, the clearance rule and the search budgets.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Cell edge of the occupancy grid and step of the candidate scan, in meters
    pub resolution: f64,
    /// Minimum distance between items of different categories, in meters
    pub clearance: f64,
    /// Space Filling: probes without improvement before the best position is accepted
    pub scan_patience: usize,
    /// Optional wall-clock budget for one run
    pub time_budget: Option<Duration>,
    /// Upper bound on the cells a single run may allocate
    pub max_grid_cells: u64,
    /// Upper bound on the instances a single run may expand
    pub max_instances: u64,
}

impl EngineConfig {
    pub const DEFAULT_RESOLUTION: f64 = 0.5;
    pub const DEFAULT_CLEARANCE: f64 = DistanceConstraint::DEFAULT_CLEARANCE;
    pub const DEFAULT_SCAN_PATIENCE: usize = 10_000;
    pub const DEFAULT_MAX_GRID_CELLS: u64 = 50_000_000;
    pub const DEFAULT_MAX_INSTANCES: u64 = 100_000;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// The clearance rule configured for this engine.
    pub fn distance_constraint(&self) -> DistanceConstraint {
        DistanceConstraint::new(self.clearance)
    }

    /// Deadline for a run started now, if a time budget is configured.
    pub fn deadline_from_now(&self) -> Option<Instant> {
        self.time_budget.map(|budget| Instant::now() + budget)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolution: Self::DEFAULT_RESOLUTION,
            clearance: Self::DEFAULT_CLEARANCE,
            scan_patience: Self::DEFAULT_SCAN_PATIENCE,
            time_budget: None,
            max_grid_cells: Self::DEFAULT_MAX_GRID_CELLS,
            max_instances: Self::DEFAULT_MAX_INSTANCES,
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Clone, Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Sets the grid resolution.
    pub fn resolution(mut self, resolution: f64) -> Self {
        self.config.resolution = resolution;
        self
    }

    /// Sets the clearance between different categories.
    pub fn clearance(mut self, clearance: f64) -> Self {
        self.config.clearance = clearance;
        self
    }

    /// Sets the Space Filling patience.
    pub fn scan_patience(mut self, patience: usize) -> Self {
        self.config.scan_patience = patience;
        self
    }

    /// Sets the per-run time budget.
    pub fn time_budget(mut self, budget: Option<Duration>) -> Self {
        self.config.time_budget = budget;
        self
    }

    /// Sets the grid size limit.
    pub fn max_grid_cells(mut self, cells: u64) -> Self {
        self.config.max_grid_cells = cells;
        self
    }

    /// Sets the limit on expanded instances per run.
    pub fn max_instances(mut self, instances: u64) -> Self {
        self.config.max_instances = instances;
        self
    }

    /// Creates the final configuration.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// The placement strategies a caller can choose from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    BinPacking,
    SpaceFilling,
    Hybrid,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [
        Algorithm::BinPacking,
        Algorithm::SpaceFilling,
        Algorithm::Hybrid,
    ];

    /// Wire identifier.
    pub fn code(&self) -> &'static str {
        match self {
            Algorithm::BinPacking => "bin_packing",
            Algorithm::SpaceFilling => "space_filling",
            Algorithm::Hybrid => "hybrid",
        }
    }

    /// Human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Algorithm::BinPacking => "Bin Packing (First Fit Decreasing)",
            Algorithm::SpaceFilling => "Space Filling (Nearest Centroid)",
            Algorithm::Hybrid => "Hybrid",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Algorithm::BinPacking => {
                "Places the largest items first at the first admissible position"
            }
            Algorithm::SpaceFilling => {
                "Places each item next to the centroid of the volume already in use"
            }
            Algorithm::Hybrid => {
                "Runs both strategies plus a retry pass and keeps the densest layout"
            }
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Algorithm {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|alg| alg.code() == s.trim())
            .ok_or_else(|| ValidationError::UnknownAlgorithm(s.to_string()))
    }
}

/// The runs Hybrid compares, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HybridTrial {
    BinPacking,
    SpaceFilling,
    TwoPhase,
}

impl HybridTrial {
    pub const ORDER: [HybridTrial; 3] = [
        HybridTrial::BinPacking,
        HybridTrial::SpaceFilling,
        HybridTrial::TwoPhase,
    ];
}

/// How the candidate scan picks among admissible positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanPolicy {
    /// Accept the first admissible position in scan order.
    FirstFit,
    /// Keep the admissible position whose center is closest to the centroid of
    /// the placed volume; stop after `patience` probes without improvement.
    NearestCentroid { patience: usize },
}

/// Reasons why an instance could not be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnplacedReason {
    DimensionsExceedEnvelope,
    NoAdmissiblePosition,
    TimeBudgetExceeded,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::DimensionsExceedEnvelope => "dimensions_exceed_envelope",
            UnplacedReason::NoAdmissiblePosition => "no_admissible_position",
            UnplacedReason::TimeBudgetExceeded => "time_budget_exceeded",
        }
    }
}

impl fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnplacedReason::DimensionsExceedEnvelope => {
                write!(f, "Item exceeds the warehouse in at least one dimension")
            }
            UnplacedReason::NoAdmissiblePosition => write!(
                f,
                "No free position keeps the required clearance to other item types"
            ),
            UnplacedReason::TimeBudgetExceeded => {
                write!(f, "Time budget exhausted before the item was scanned")
            }
        }
    }
}

/// An instance left out of the plan.
#[derive(Clone, Debug, PartialEq)]
pub struct UnplacedItem {
    pub instance: ItemInstance,
    pub reason: UnplacedReason,
}

/// Events emitted during a run to allow live visualization.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum PlacementEvent {
    /// A run begins.
    RunStarted {
        algorithm: Algorithm,
        instances: usize,
    },
    /// An instance was committed.
    ItemPlaced {
        id: String,
        name: String,
        position: Vec3,
        dimensions: Vec3,
        category: Category,
        volume_used: f64,
    },
    /// An instance could not be placed.
    ItemRejected {
        id: String,
        name: String,
        reason_code: String,
        reason_text: String,
    },
    /// One Hybrid trial completed.
    TrialFinished {
        trial: HybridTrial,
        volume_used: f64,
        unplaced: usize,
    },
    /// The run is complete.
    Finished {
        placed: usize,
        unplaced: usize,
        utilization: f64,
    },
}

/// Result of running one strategy.
#[derive(Clone, Debug)]
pub struct StrategyOutcome {
    pub placed: Vec<PlacedItem>,
    pub unplaced: Vec<UnplacedItem>,
    pub grid: OccupancyGrid,
    /// Winning trial when the outcome comes from Hybrid
    pub selected_trial: Option<HybridTrial>,
}

impl StrategyOutcome {
    /// Resolution-bound volume of the plan.
    pub fn volume_used(&self) -> f64 {
        self.grid.used_volume()
    }
}

fn placed_event(item: &PlacedItem, volume_used: f64) -> PlacementEvent {
    PlacementEvent::ItemPlaced {
        id: item.instance.id.clone(),
        name: item.instance.name.clone(),
        position: item.position,
        dimensions: item.instance.dims,
        category: item.category(),
        volume_used,
    }
}

fn rejected_event(item: &UnplacedItem) -> PlacementEvent {
    PlacementEvent::ItemRejected {
        id: item.instance.id.clone(),
        name: item.instance.name.clone(),
        reason_code: item.reason.code().to_string(),
        reason_text: item.reason.to_string(),
    }
}

/// Sorts instances by descending volume, then descending weight.
///
/// The sort is stable, so ties keep request order.
pub fn sort_instances(instances: &mut [ItemInstance]) {
    instances.sort_by(|a, b| {
        b.volume()
            .partial_cmp(&a.volume())
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal))
    });
}

/// Outcome of scanning for one instance.
#[derive(Clone, Copy, Debug, PartialEq)]
enum ScanOutcome {
    Found(Vec3),
    Exhausted,
    DeadlineExceeded,
}

/// Mutable state of one run: grid, committed items and the placed centroid.
struct PlanState {
    grid: OccupancyGrid,
    placed: Vec<PlacedItem>,
    centroid: CentroidAccumulator,
    constraint: DistanceConstraint,
    deadline: Option<Instant>,
    deadline_hit: bool,
}

impl PlanState {
    fn new(grid: OccupancyGrid, config: &EngineConfig, deadline: Option<Instant>) -> Self {
        Self {
            grid,
            placed: Vec::new(),
            centroid: CentroidAccumulator::new(),
            constraint: config.distance_constraint(),
            deadline,
            deadline_hit: false,
        }
    }

    fn deadline_passed(&mut self) -> bool {
        if !self.deadline_hit {
            if let Some(deadline) = self.deadline {
                self.deadline_hit = Instant::now() >= deadline;
            }
        }
        self.deadline_hit
    }

    /// Places `instance` under `policy` or explains why it could not be placed.
    fn place(
        &mut self,
        instance: ItemInstance,
        policy: ScanPolicy,
    ) -> Result<Result<usize, UnplacedItem>, GridError> {
        if !instance.fits_in(&self.grid.bounds(), EPSILON_GENERAL) {
            return Ok(Err(UnplacedItem {
                instance,
                reason: UnplacedReason::DimensionsExceedEnvelope,
            }));
        }

        match self.scan(&instance, policy) {
            ScanOutcome::Found(position) => {
                self.commit(instance, position)?;
                Ok(Ok(self.placed.len() - 1))
            }
            ScanOutcome::Exhausted => Ok(Err(UnplacedItem {
                instance,
                reason: UnplacedReason::NoAdmissiblePosition,
            })),
            ScanOutcome::DeadlineExceeded => Ok(Err(UnplacedItem {
                instance,
                reason: UnplacedReason::TimeBudgetExceeded,
            })),
        }
    }

    /// Probes the resolution grid bottom-up: z, then y, then x.
    fn scan(&mut self, instance: &ItemInstance, policy: ScanPolicy) -> ScanOutcome {
        let bounds = self.grid.bounds();
        let step = self.grid.resolution();
        let dims = instance.dims;

        let xs = axis_positions(bounds.x, dims.x, step);
        let ys = axis_positions(bounds.y, dims.y, step);
        let zs = axis_positions(bounds.z, dims.z, step);

        let target = self.centroid.compute().unwrap_or_else(Vec3::zero);
        let mut best: Option<(Vec3, f64)> = None;
        let mut since_improvement = 0usize;
        let mut probes = 0usize;

        for &z in &zs {
            for &y in &ys {
                for &x in &xs {
                    probes += 1;
                    if probes % 64 == 0 && self.deadline_passed() {
                        return ScanOutcome::DeadlineExceeded;
                    }

                    let position = Vec3::new(x, y, z);
                    let candidate = BoundingBox::from_position_and_dims(position, dims);
                    let admissible = self.grid.is_free(&candidate)
                        && self
                            .constraint
                            .admissible(&candidate, instance.category, &self.placed);

                    match policy {
                        ScanPolicy::FirstFit => {
                            if admissible {
                                return ScanOutcome::Found(position);
                            }
                        }
                        ScanPolicy::NearestCentroid { patience } => {
                            let improved = admissible && {
                                let score = candidate.center().distance_to(&target);
                                let better = match best {
                                    None => true,
                                    Some((_, best_score)) => score + EPSILON_GENERAL < best_score,
                                };
                                if better {
                                    best = Some((position, score));
                                }
                                better
                            };

                            if improved {
                                since_improvement = 0;
                            } else if best.is_some() {
                                since_improvement += 1;
                                if since_improvement >= patience {
                                    debug!(
                                        id = %instance.id,
                                        probes,
                                        "Scan patience exhausted, accepting best position"
                                    );
                                    return best
                                        .map(|(pos, _)| ScanOutcome::Found(pos))
                                        .unwrap_or(ScanOutcome::Exhausted);
                                }
                            }
                        }
                    }
                }
            }
        }

        if self.deadline_passed() {
            return ScanOutcome::DeadlineExceeded;
        }

        best.map(|(pos, _)| ScanOutcome::Found(pos))
            .unwrap_or(ScanOutcome::Exhausted)
    }

    fn commit(&mut self, instance: ItemInstance, position: Vec3) -> Result<(), GridError> {
        let item = PlacedItem::new(instance, position);
        let bbox = item.bounding_box();
        self.grid.commit(&bbox)?;
        self.centroid.add(bbox.center(), item.volume());
        self.placed.push(item);
        Ok(())
    }

    fn into_outcome(self, unplaced: Vec<UnplacedItem>) -> StrategyOutcome {
        StrategyOutcome {
            placed: self.placed,
            unplaced,
            grid: self.grid,
            selected_trial: None,
        }
    }
}

/// Candidate offsets `k · step` along one axis that keep the item inside.
///
/// # Parameters
/// * `envelope_len` - Length of the envelope in this dimension
/// * `item_len` - Length of the item in this dimension
/// * `step` - Grid resolution
fn axis_positions(envelope_len: f64, item_len: f64, step: f64) -> Vec<f64> {
    let max_pos = envelope_len - item_len;
    if max_pos < -EPSILON_GENERAL {
        return Vec::new();
    }
    let count = ((max_pos + EPSILON_GENERAL) / step).floor() as usize + 1;
    (0..count).map(|k| k as f64 * step).collect()
}

/// Places every instance in order under one scan policy.
fn run_pass(
    state: &mut PlanState,
    instances: Vec<ItemInstance>,
    policy: ScanPolicy,
    on_event: &mut dyn FnMut(&PlacementEvent),
) -> Result<Vec<UnplacedItem>, GridError> {
    let mut unplaced = Vec::new();

    for instance in instances {
        if state.deadline_passed() {
            let item = UnplacedItem {
                instance,
                reason: UnplacedReason::TimeBudgetExceeded,
            };
            on_event(&rejected_event(&item));
            unplaced.push(item);
            continue;
        }

        match state.place(instance, policy)? {
            Ok(index) => {
                let item = &state.placed[index];
                on_event(&placed_event(item, state.grid.used_volume()));
            }
            Err(item) => {
                on_event(&rejected_event(&item));
                unplaced.push(item);
            }
        }
    }

    Ok(unplaced)
}

/// First-fit decreasing: each instance goes to the first admissible position.
///
/// # Parameters
/// * `instances` - Instances in placement order (see [`sort_instances`])
/// * `grid` - Empty grid owned by this run
/// * `config` - Engine configuration
/// * `deadline` - Optional deadline of the run
/// * `on_event` - Receives a placement or rejection event per instance
pub fn bin_packing(
    instances: Vec<ItemInstance>,
    grid: OccupancyGrid,
    config: &EngineConfig,
    deadline: Option<Instant>,
    on_event: &mut dyn FnMut(&PlacementEvent),
) -> Result<StrategyOutcome, GridError> {
    let mut state = PlanState::new(grid, config, deadline);
    let unplaced = run_pass(&mut state, instances, ScanPolicy::FirstFit, on_event)?;
    Ok(state.into_outcome(unplaced))
}

/// Nearest-centroid placement: each instance goes to the admissible position
/// closest to the centroid of the volume already placed.
pub fn space_filling(
    instances: Vec<ItemInstance>,
    grid: OccupancyGrid,
    config: &EngineConfig,
    deadline: Option<Instant>,
    on_event: &mut dyn FnMut(&PlacementEvent),
) -> Result<StrategyOutcome, GridError> {
    let mut state = PlanState::new(grid, config, deadline);
    let policy = ScanPolicy::NearestCentroid {
        patience: config.scan_patience,
    };
    let unplaced = run_pass(&mut state, instances, policy, on_event)?;
    Ok(state.into_outcome(unplaced))
}

/// Bin Packing followed by a Space Filling retry of whatever it left out.
///
/// Only the final rejections are reported; instances placed by the retry
/// produce their placement event when the retry commits them.
pub fn two_phase(
    instances: Vec<ItemInstance>,
    grid: OccupancyGrid,
    config: &EngineConfig,
    deadline: Option<Instant>,
    on_event: &mut dyn FnMut(&PlacementEvent),
) -> Result<StrategyOutcome, GridError> {
    let mut state = PlanState::new(grid, config, deadline);
    let mut forward_placed = |evt: &PlacementEvent| {
        if matches!(evt, PlacementEvent::ItemPlaced { .. }) {
            on_event(evt);
        }
    };
    let leftovers = run_pass(&mut state, instances, ScanPolicy::FirstFit, &mut forward_placed)?;

    let policy = ScanPolicy::NearestCentroid {
        patience: config.scan_patience,
    };
    let retry: Vec<ItemInstance> = leftovers.into_iter().map(|u| u.instance).collect();
    let unplaced = run_pass(&mut state, retry, policy, on_event)?;
    Ok(state.into_outcome(unplaced))
}

/// Runs one Hybrid trial on its own grid and buffers its events.
fn run_trial(
    trial: HybridTrial,
    instances: &[ItemInstance],
    grid: &OccupancyGrid,
    config: &EngineConfig,
    deadline: Option<Instant>,
) -> Result<(StrategyOutcome, Vec<PlacementEvent>), GridError> {
    let mut events = Vec::new();
    let mut record = |evt: &PlacementEvent| events.push(evt.clone());
    let instances = instances.to_vec();
    let grid = grid.clone();

    let mut outcome = match trial {
        HybridTrial::BinPacking => bin_packing(instances, grid, config, deadline, &mut record)?,
        HybridTrial::SpaceFilling => space_filling(instances, grid, config, deadline, &mut record)?,
        HybridTrial::TwoPhase => two_phase(instances, grid, config, deadline, &mut record)?,
    };
    outcome.selected_trial = Some(trial);

    debug!(
        trial = ?trial,
        volume_used = outcome.volume_used(),
        unplaced = outcome.unplaced.len(),
        "Hybrid trial finished"
    );
    Ok((outcome, events))
}

/// Runs Bin Packing, Space Filling and the two-phase retry on separate grids
/// and keeps the one with the largest placed volume.
///
/// Ties go to fewer unplaced instances, then to the earlier trial. Each trial
/// reports a [`PlacementEvent::TrialFinished`]; the placement events of the
/// winning trial follow once all trials are done.
pub fn hybrid(
    instances: Vec<ItemInstance>,
    grid: OccupancyGrid,
    config: &EngineConfig,
    deadline: Option<Instant>,
    on_event: &mut dyn FnMut(&PlacementEvent),
) -> Result<StrategyOutcome, GridError> {
    let mut best: Option<(StrategyOutcome, Vec<PlacementEvent>)> = None;

    for trial in HybridTrial::ORDER {
        let (outcome, events) = run_trial(trial, &instances, &grid, config, deadline)?;
        on_event(&PlacementEvent::TrialFinished {
            trial,
            volume_used: outcome.volume_used(),
            unplaced: outcome.unplaced.len(),
        });

        let replace = match &best {
            None => true,
            Some((current, _)) => is_better_outcome(&outcome, current),
        };
        if replace {
            best = Some((outcome, events));
        }
    }

    match best {
        Some((outcome, events)) => {
            events.iter().for_each(|evt| on_event(evt));
            Ok(outcome)
        }
        None => Ok(PlanState::new(grid, config, deadline).into_outcome(Vec::new())),
    }
}

/// Priority: larger placed volume, then fewer unplaced instances.
fn is_better_outcome(new: &StrategyOutcome, current: &StrategyOutcome) -> bool {
    match compare_with_epsilon(new.volume_used(), current.volume_used(), EPSILON_GENERAL) {
        Ordering::Greater => return true,
        Ordering::Less => return false,
        Ordering::Equal => {}
    }
    new.unplaced.len() < current.unplaced.len()
}

/// Compares two values with tolerance.
fn compare_with_epsilon(a: f64, b: f64, eps: f64) -> Ordering {
    if (a - b).abs() <= eps {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{box_distance, intersects};
    use crate::model::{ItemSpec, WarehouseEnvelope, expand_instances};
    use approx::assert_abs_diff_eq;

    fn spec(name: &str, dims: (f64, f64, f64), quantity: u32, weight: f64) -> ItemSpec {
        ItemSpec {
            name: name.to_string(),
            length: dims.0,
            width: dims.1,
            height: dims.2,
            quantity,
            weight,
        }
    }

    fn grid(l: f64, w: f64, h: f64) -> OccupancyGrid {
        OccupancyGrid::new(&WarehouseEnvelope::new(l, w, h).unwrap(), 0.5).unwrap()
    }

    fn sorted(specs: &[ItemSpec]) -> Vec<ItemInstance> {
        let mut instances = expand_instances(specs);
        sort_instances(&mut instances);
        instances
    }

    fn assert_valid_plan(outcome: &StrategyOutcome, clearance: f64) {
        for (i, a) in outcome.placed.iter().enumerate() {
            for b in &outcome.placed[i + 1..] {
                assert!(!intersects(a, b), "{} overlaps {}", a.instance.id, b.instance.id);
                if a.category() != b.category() {
                    let d = box_distance(&a.bounding_box(), &b.bounding_box());
                    assert!(
                        d >= clearance - 1e-9,
                        "{} and {} are only {} m apart",
                        a.instance.id,
                        b.instance.id,
                        d
                    );
                }
            }
        }
    }

    #[test]
    fn axis_positions_follow_resolution_grid() {
        assert_eq!(axis_positions(2.0, 1.2, 0.5), vec![0.0, 0.5]);
        assert_eq!(axis_positions(2.0, 2.0, 0.5), vec![0.0]);
        assert_eq!(axis_positions(2.0, 0.5, 0.5), vec![0.0, 0.5, 1.0, 1.5]);
        assert!(axis_positions(0.5, 2.0, 0.5).is_empty());
    }

    #[test]
    fn instances_sort_by_volume_then_weight() {
        let instances = sorted(&[
            spec("small", (1.0, 1.0, 1.0), 1, 100.0),
            spec("light", (2.0, 1.0, 1.0), 1, 1.0),
            spec("heavy", (1.0, 2.0, 1.0), 1, 9.0),
        ]);
        let names: Vec<_> = instances.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["heavy", "light", "small"]);
    }

    #[test]
    fn algorithm_parses_known_identifiers_only() {
        assert_eq!("bin_packing".parse::<Algorithm>().unwrap(), Algorithm::BinPacking);
        assert_eq!("space_filling".parse::<Algorithm>().unwrap(), Algorithm::SpaceFilling);
        assert_eq!("hybrid".parse::<Algorithm>().unwrap(), Algorithm::Hybrid);
        assert!(matches!(
            "ml_enhanced".parse::<Algorithm>(),
            Err(ValidationError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn bin_packing_places_first_item_at_origin() {
        let config = EngineConfig::default();
        let outcome = bin_packing(
            sorted(&[spec("Crate", (1.0, 1.0, 1.0), 2, 5.0)]),
            grid(4.0, 4.0, 4.0),
            &config,
            None,
            &mut |_| {},
        )
        .unwrap();
        assert_eq!(outcome.placed.len(), 2);
        assert_eq!(outcome.placed[0].position, Vec3::zero());
        // bottom-up scan stacks nothing while floor space remains: next is along x
        assert_eq!(outcome.placed[1].position, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn bin_packing_keeps_clearance_between_categories() {
        let config = EngineConfig::default();
        let outcome = bin_packing(
            sorted(&[
                spec("Box A", (1.0, 1.0, 1.0), 3, 10.0),
                spec("Drum B", (1.0, 1.0, 1.0), 3, 10.0),
            ]),
            grid(5.0, 5.0, 5.0),
            &config,
            None,
            &mut |_| {},
        )
        .unwrap();
        assert_eq!(outcome.placed.len(), 6);
        assert_valid_plan(&outcome, config.clearance);
    }

    #[test]
    fn oversized_items_are_reported_not_scanned() {
        let config = EngineConfig::default();
        let outcome = bin_packing(
            sorted(&[spec("Machine", (2.0, 2.0, 2.0), 2, 10.0)]),
            grid(0.5, 0.5, 0.5),
            &config,
            None,
            &mut |_| {},
        )
        .unwrap();
        assert!(outcome.placed.is_empty());
        assert_eq!(outcome.unplaced.len(), 2);
        assert!(
            outcome
                .unplaced
                .iter()
                .all(|u| u.reason == UnplacedReason::DimensionsExceedEnvelope)
        );
        assert_eq!(outcome.volume_used(), 0.0);
    }

    #[test]
    fn full_grid_leaves_remaining_instances_unplaced() {
        let config = EngineConfig::default();
        let outcome = bin_packing(
            sorted(&[spec("Box", (1.0, 1.0, 1.0), 3, 1.0)]),
            grid(2.0, 1.0, 1.0),
            &config,
            None,
            &mut |_| {},
        )
        .unwrap();
        assert_eq!(outcome.placed.len(), 2);
        assert_eq!(outcome.unplaced.len(), 1);
        assert_eq!(outcome.unplaced[0].reason, UnplacedReason::NoAdmissiblePosition);
        assert_eq!(outcome.unplaced[0].instance.id, "Box_3");
    }

    #[test]
    fn space_filling_clusters_around_centroid() {
        let config = EngineConfig::default();
        let outcome = space_filling(
            sorted(&[spec("Box", (1.0, 1.0, 1.0), 3, 1.0)]),
            grid(6.0, 6.0, 2.0),
            &config,
            None,
            &mut |_| {},
        )
        .unwrap();
        assert_eq!(outcome.placed.len(), 3);
        assert_eq!(outcome.placed[0].position, Vec3::zero());
        // every later item touches the cluster
        for item in &outcome.placed[1..] {
            let touches = outcome.placed.iter().any(|other| {
                other.instance.id != item.instance.id
                    && box_distance(&other.bounding_box(), &item.bounding_box()) < 1e-9
            });
            assert!(touches, "{} is detached from the cluster", item.instance.id);
        }
    }

    #[test]
    fn space_filling_breaks_ties_by_scan_order() {
        let config = EngineConfig::default();
        let outcome = space_filling(
            sorted(&[spec("Box", (1.0, 1.0, 1.0), 2, 1.0)]),
            grid(4.0, 4.0, 4.0),
            &config,
            None,
            &mut |_| {},
        )
        .unwrap();
        // (1,0,0), (0,1,0) and (0,0,1) are equally close to the first item;
        // the bottom-up scan reaches (1,0,0) first.
        assert_eq!(outcome.placed[1].position, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn tiny_patience_still_places_items() {
        let config = EngineConfig::builder().scan_patience(1).build();
        let outcome = space_filling(
            sorted(&[spec("Box", (1.0, 1.0, 1.0), 4, 1.0)]),
            grid(4.0, 4.0, 2.0),
            &config,
            None,
            &mut |_| {},
        )
        .unwrap();
        assert_eq!(outcome.placed.len(), 4);
        assert_valid_plan(&outcome, config.clearance);
    }

    #[test]
    fn expired_deadline_leaves_everything_unplaced() {
        let config = EngineConfig::default();
        let past = Instant::now() - Duration::from_secs(1);
        let outcome = bin_packing(
            sorted(&[spec("Box", (1.0, 1.0, 1.0), 3, 1.0)]),
            grid(4.0, 4.0, 4.0),
            &config,
            Some(past),
            &mut |_| {},
        )
        .unwrap();
        assert!(outcome.placed.is_empty());
        assert!(
            outcome
                .unplaced
                .iter()
                .all(|u| u.reason == UnplacedReason::TimeBudgetExceeded)
        );
    }

    #[test]
    fn expired_deadline_stops_a_scan_that_already_has_a_best() {
        let config = EngineConfig::default();
        let past = Instant::now() - Duration::from_secs(1);
        let instance = sorted(&[spec("Box", (0.5, 0.5, 0.5), 1, 1.0)]).remove(0);
        let policy = ScanPolicy::NearestCentroid {
            patience: usize::MAX,
        };

        // 16 x 16 x 2 candidates; the origin is admissible but the deadline
        // check after 64 candidates ends the scan
        let mut state = PlanState::new(grid(8.0, 8.0, 1.0), &config, Some(past));
        assert_eq!(state.scan(&instance, policy), ScanOutcome::DeadlineExceeded);

        // a single candidate is caught by the check after the loop
        let mut state = PlanState::new(grid(0.5, 0.5, 0.5), &config, Some(past));
        assert_eq!(state.scan(&instance, policy), ScanOutcome::DeadlineExceeded);
        assert!(state.placed.is_empty());

        let mut state = PlanState::new(grid(0.5, 0.5, 0.5), &config, None);
        assert_eq!(state.scan(&instance, policy), ScanOutcome::Found(Vec3::zero()));
    }

    #[test]
    fn hybrid_is_at_least_as_dense_as_each_trial() {
        let config = EngineConfig::default();
        let specs = [
            spec("Box A", (1.5, 1.0, 1.0), 4, 10.0),
            spec("Drum B", (1.0, 1.0, 1.5), 4, 50.0),
            spec("Rack C", (2.0, 0.5, 2.0), 2, 80.0),
        ];
        let g = grid(6.0, 5.0, 3.0);

        let bp = bin_packing(sorted(&specs), g.clone(), &config, None, &mut |_| {}).unwrap();
        let sf = space_filling(sorted(&specs), g.clone(), &config, None, &mut |_| {}).unwrap();
        let hy = hybrid(sorted(&specs), g, &config, None, &mut |_| {}).unwrap();

        assert!(hy.volume_used() + 1e-9 >= bp.volume_used());
        assert!(hy.volume_used() + 1e-9 >= sf.volume_used());
        assert!(hy.selected_trial.is_some());
        assert_valid_plan(&hy, config.clearance);
    }

    #[test]
    fn hybrid_prefers_earlier_trial_on_ties() {
        let config = EngineConfig::default();
        let outcome = hybrid(
            sorted(&[spec("Box", (1.0, 1.0, 1.0), 1, 1.0)]),
            grid(2.0, 2.0, 2.0),
            &config,
            None,
            &mut |_| {},
        )
        .unwrap();
        assert_eq!(outcome.selected_trial, Some(HybridTrial::BinPacking));
    }

    #[test]
    fn hybrid_reports_every_trial_then_replays_winner() {
        let config = EngineConfig::default();
        let mut events = Vec::new();
        hybrid(
            sorted(&[spec("Box", (1.0, 1.0, 1.0), 2, 1.0)]),
            grid(2.0, 2.0, 2.0),
            &config,
            None,
            &mut |evt| events.push(evt.clone()),
        )
        .unwrap();

        let trials = events
            .iter()
            .filter(|e| matches!(e, PlacementEvent::TrialFinished { .. }))
            .count();
        let placed = events
            .iter()
            .filter(|e| matches!(e, PlacementEvent::ItemPlaced { .. }))
            .count();
        assert_eq!(trials, 3);
        assert_eq!(placed, 2);
        assert!(matches!(events[3], PlacementEvent::ItemPlaced { .. }));
    }

    #[test]
    fn placement_events_track_grid_volume() {
        let config = EngineConfig::default();
        let mut volumes = Vec::new();
        bin_packing(
            sorted(&[spec("Box", (1.0, 1.0, 1.0), 2, 1.0)]),
            grid(4.0, 4.0, 4.0),
            &config,
            None,
            &mut |evt| {
                if let PlacementEvent::ItemPlaced { volume_used, .. } = evt {
                    volumes.push(*volume_used);
                }
            },
        )
        .unwrap();
        assert_eq!(volumes.len(), 2);
        assert_abs_diff_eq!(volumes[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(volumes[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn runs_are_deterministic() {
        let config = EngineConfig::default();
        let specs = [
            spec("Box A", (1.0, 1.0, 1.0), 3, 10.0),
            spec("Drum B", (1.0, 1.0, 1.0), 3, 10.0),
        ];
        let run = || {
            space_filling(sorted(&specs), grid(5.0, 5.0, 5.0), &config, None, &mut |_| {})
                .unwrap()
                .placed
        };
        assert_eq!(run(), run());
    }
}
