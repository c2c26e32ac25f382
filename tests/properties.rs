use approx::assert_abs_diff_eq;

use warehouse_optimizer::classifier::Category;
use warehouse_optimizer::model::{ItemSpec, ValidationError, WarehouseEnvelope};
use warehouse_optimizer::optimizer::EngineConfig;
use warehouse_optimizer::orchestrator::{
    Algorithm, EngineError, OptimizationRequest, OptimizationResult, PlacedItemReport, optimize,
};

const CLEARANCE: f64 = 1.0;
const TOLERANCE: f64 = 1e-9;

fn item(name: &str, dims: (f64, f64, f64), quantity: u32, weight: f64) -> ItemSpec {
    ItemSpec {
        name: name.to_string(),
        length: dims.0,
        width: dims.1,
        height: dims.2,
        quantity,
        weight,
    }
}

fn envelope(l: f64, w: f64, h: f64) -> WarehouseEnvelope {
    WarehouseEnvelope::new(l, w, h).unwrap()
}

fn mixed_catalogue() -> Vec<ItemSpec> {
    vec![
        item("Euro Pallet", (1.2, 0.8, 1.0), 6, 300.0),
        item("Oil Drum", (0.6, 0.6, 0.9), 5, 180.0),
        item("Shipping Box", (0.5, 0.5, 0.5), 12, 8.0),
        item("Shelf Rack", (2.0, 0.5, 2.0), 2, 90.0),
        item("Acid Container", (0.8, 0.8, 0.8), 2, 120.0),
        item("Widget", (0.3, 0.4, 0.2), 8, 1.5),
    ]
}

fn run(algorithm: Algorithm, env: WarehouseEnvelope, items: Vec<ItemSpec>) -> OptimizationResult {
    let request = OptimizationRequest::new(env, items, algorithm);
    optimize(&request, &EngineConfig::default()).expect("valid request must succeed")
}

fn bounds(item: &PlacedItemReport) -> ([f64; 3], [f64; 3]) {
    let min = [item.position.x, item.position.y, item.position.z];
    let max = [
        item.position.x + item.dimensions.length,
        item.position.y + item.dimensions.width,
        item.position.z + item.dimensions.height,
    ];
    (min, max)
}

fn overlaps(a: &PlacedItemReport, b: &PlacedItemReport) -> bool {
    let (a_min, a_max) = bounds(a);
    let (b_min, b_max) = bounds(b);
    (0..3).all(|axis| a_min[axis] < b_max[axis] && b_min[axis] < a_max[axis])
}

fn distance(a: &PlacedItemReport, b: &PlacedItemReport) -> f64 {
    let (a_min, a_max) = bounds(a);
    let (b_min, b_max) = bounds(b);
    (0..3)
        .map(|axis| {
            let gap = (a_min[axis] - b_max[axis])
                .max(b_min[axis] - a_max[axis])
                .max(0.0);
            gap * gap
        })
        .sum::<f64>()
        .sqrt()
}

#[test]
fn plans_never_overlap() {
    for algorithm in Algorithm::ALL {
        let result = run(algorithm, envelope(8.0, 6.0, 3.0), mixed_catalogue());
        let placed = &result.placed_items;
        for (i, a) in placed.iter().enumerate() {
            for b in &placed[i + 1..] {
                assert!(
                    !overlaps(a, b),
                    "{algorithm}: {} overlaps {}",
                    a.id,
                    b.id
                );
            }
        }
        assert!(result.violations.is_empty(), "{algorithm}: {:?}", result.violations);
    }
}

#[test]
fn different_categories_keep_clearance() {
    for algorithm in Algorithm::ALL {
        let result = run(algorithm, envelope(8.0, 6.0, 3.0), mixed_catalogue());
        let placed = &result.placed_items;
        for (i, a) in placed.iter().enumerate() {
            for b in &placed[i + 1..] {
                if a.category != b.category {
                    let d = distance(a, b);
                    assert!(
                        d >= CLEARANCE - TOLERANCE,
                        "{algorithm}: {} and {} only {d} m apart",
                        a.id,
                        b.id
                    );
                }
            }
        }
    }
}

#[test]
fn placed_items_stay_inside_the_warehouse() {
    let env = envelope(7.5, 4.5, 2.5);
    for algorithm in Algorithm::ALL {
        let result = run(algorithm, env, mixed_catalogue());
        for placed in &result.placed_items {
            let (min, max) = bounds(placed);
            assert!(min.iter().all(|&v| v >= -TOLERANCE), "{}", placed.id);
            assert!(max[0] <= env.length + TOLERANCE, "{}", placed.id);
            assert!(max[1] <= env.width + TOLERANCE, "{}", placed.id);
            assert!(max[2] <= env.height + TOLERANCE, "{}", placed.id);
        }
    }
}

#[test]
fn identical_input_gives_identical_results() {
    for algorithm in Algorithm::ALL {
        let first = run(algorithm, envelope(8.0, 6.0, 3.0), mixed_catalogue());
        let second = run(algorithm, envelope(8.0, 6.0, 3.0), mixed_catalogue());
        assert_eq!(first, second, "{algorithm} is not deterministic");
    }
}

#[test]
fn every_instance_is_either_placed_or_unplaced() {
    for algorithm in Algorithm::ALL {
        let result = run(algorithm, envelope(4.0, 3.0, 2.0), mixed_catalogue());
        let metrics = result.metrics;
        assert_eq!(metrics.items_total, 35);
        assert_eq!(metrics.items_placed, result.placed_items.len());
        assert_eq!(
            metrics.items_placed + result.unplaced_items.len(),
            metrics.items_total
        );
    }
}

#[test]
fn utilization_stays_within_bounds() {
    // 2.3 is not a multiple of the resolution, so edge cells are clipped
    let env = envelope(2.3, 2.3, 2.3);
    for algorithm in Algorithm::ALL {
        let result = run(algorithm, env, vec![item("Crate", (0.7, 0.7, 0.7), 40, 5.0)]);
        let metrics = result.metrics;
        assert!((0.0..=100.0).contains(&metrics.utilization));
        assert!(metrics.volume_used <= env.volume() + 0.01);
        assert_abs_diff_eq!(
            metrics.utilization,
            (metrics.volume_used / env.volume() * 100.0 * 100.0).round() / 100.0,
            epsilon = 0.1
        );
    }
}

#[test]
fn pallet_boxes_fill_without_violations() {
    let result = run(
        Algorithm::BinPacking,
        envelope(10.0, 10.0, 5.0),
        vec![item("Pallet Box", (1.2, 0.8, 1.5), 10, 500.0)],
    );
    assert_eq!(result.metrics.items_placed, 10);
    assert!(result.unplaced_items.is_empty());
    assert!(result.violations.is_empty());
    assert!(result.metrics.utilization > 0.0);
    assert_eq!(result.metrics.efficiency, 100.0);
}

#[test]
fn boxes_and_drums_respect_clearance_while_boxes_touch() {
    let result = run(
        Algorithm::BinPacking,
        envelope(5.0, 5.0, 5.0),
        vec![
            item("Box A", (1.0, 1.0, 1.0), 3, 10.0),
            item("Drum B", (1.0, 1.0, 1.0), 3, 10.0),
        ],
    );
    let boxes: Vec<_> = result
        .placed_items
        .iter()
        .filter(|p| p.category == Category::Box)
        .collect();
    let drums: Vec<_> = result
        .placed_items
        .iter()
        .filter(|p| p.category == Category::Drum)
        .collect();
    assert_eq!(boxes.len(), 3);
    assert_eq!(drums.len(), 3);

    for b in &boxes {
        for d in &drums {
            assert!(distance(b, d) >= CLEARANCE - TOLERANCE);
        }
    }
    // first-fit puts same-type boxes side by side
    assert_abs_diff_eq!(distance(boxes[0], boxes[1]), 0.0);
}

#[test]
fn too_small_warehouse_places_nothing() {
    for algorithm in Algorithm::ALL {
        let result = run(
            algorithm,
            envelope(0.5, 0.5, 0.5),
            vec![item("Machine", (2.0, 2.0, 2.0), 2, 50.0)],
        );
        assert_eq!(result.metrics.items_placed, 0);
        assert_eq!(result.unplaced_items, ["Machine", "Machine"]);
    }
}

#[test]
fn hybrid_is_never_worse_than_either_strategy() {
    let catalogues = [
        (envelope(8.0, 6.0, 3.0), mixed_catalogue()),
        (envelope(4.0, 3.0, 2.0), mixed_catalogue()),
        (
            envelope(6.0, 4.0, 2.0),
            vec![
                item("Box", (1.5, 1.0, 1.0), 8, 5.0),
                item("Drum", (1.0, 1.0, 1.0), 6, 50.0),
            ],
        ),
    ];
    for (env, items) in catalogues {
        let bp = run(Algorithm::BinPacking, env, items.clone());
        let sf = run(Algorithm::SpaceFilling, env, items.clone());
        let hy = run(Algorithm::Hybrid, env, items);
        let best = bp.metrics.volume_used.max(sf.metrics.volume_used);
        assert!(
            hy.metrics.volume_used + 1e-9 >= best,
            "hybrid {} < best {}",
            hy.metrics.volume_used,
            best
        );
        assert!(hy.hybrid_trial.is_some());
    }
}

#[test]
fn zero_quantity_fails_validation() {
    let request = OptimizationRequest::new(
        envelope(10.0, 10.0, 5.0),
        vec![
            item("Box", (1.0, 1.0, 1.0), 2, 1.0),
            item("Drum", (1.0, 1.0, 1.0), 0, 1.0),
        ],
        Algorithm::Hybrid,
    );
    let err = optimize(&request, &EngineConfig::default()).unwrap_err();
    match err {
        EngineError::Validation(ValidationError::InvalidQuantity { field, value }) => {
            assert_eq!(field, "items[1].quantity");
            assert_eq!(value, 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
