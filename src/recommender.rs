//! Algorithm recommendation ahead of a run.
//!
//! A recommender only proposes a default for the `algorithm` field; the
//! orchestrator is free to ignore it and falls back to a configured algorithm
//! when the recommender fails.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::{ItemSpec, WarehouseEnvelope};
use crate::optimizer::Algorithm;
use crate::types::Dimensional;

/// Requested volume above this share of the envelope counts as dense.
pub const HIGH_DENSITY_RATIO: f64 = 0.8;
/// More distinct item names than this count as a varied catalogue.
pub const VARIETY_THRESHOLD: usize = 10;
/// Instances smaller than `envelope / SMALL_ITEM_DIVISOR` count as small.
pub const SMALL_ITEM_DIVISOR: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecommenderError {
    #[error("Not enough data to recommend an algorithm: {0}")]
    InsufficientData(String),
}

/// A proposed algorithm together with the catalogue figures it is based on.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Recommendation {
    pub algorithm: Algorithm,
    /// Requested volume relative to the envelope volume
    pub volume_ratio: f64,
    /// Number of distinct item names
    pub item_variety: usize,
    /// Mean volume of one instance in cubic meters
    pub mean_instance_volume: f64,
    pub reason: String,
    /// Item names in suggested placement order
    pub priority: Vec<String>,
}

/// Proposes an algorithm for a catalogue.
pub trait AlgorithmRecommender: Send + Sync {
    fn recommend(
        &self,
        envelope: &WarehouseEnvelope,
        items: &[ItemSpec],
    ) -> Result<Recommendation, RecommenderError>;
}

/// Rule-based recommender working from the catalogue alone.
///
/// - dense catalogues (requested volume > 80 % of the envelope) get `hybrid`
/// - many distinct, small items get `space_filling`
/// - everything else gets `bin_packing`
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicRecommender;

impl AlgorithmRecommender for HeuristicRecommender {
    fn recommend(
        &self,
        envelope: &WarehouseEnvelope,
        items: &[ItemSpec],
    ) -> Result<Recommendation, RecommenderError> {
        let instance_count: u64 = items.iter().map(|item| u64::from(item.quantity)).sum();
        if instance_count == 0 {
            return Err(RecommenderError::InsufficientData(
                "the catalogue contains no item instances".to_string(),
            ));
        }

        let envelope_volume = envelope.volume();
        let total_volume: f64 = items
            .iter()
            .map(|item| item.volume() * f64::from(item.quantity))
            .sum();
        let volume_ratio = total_volume / envelope_volume;
        let item_variety = items
            .iter()
            .map(|item| item.name.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let mean_instance_volume = total_volume / instance_count as f64;

        let (algorithm, reason) = if volume_ratio > HIGH_DENSITY_RATIO {
            (
                Algorithm::Hybrid,
                format!(
                    "Requested volume fills {:.0} % of the warehouse",
                    volume_ratio * 100.0
                ),
            )
        } else if item_variety > VARIETY_THRESHOLD
            && mean_instance_volume < envelope_volume / SMALL_ITEM_DIVISOR
        {
            (
                Algorithm::SpaceFilling,
                format!("{item_variety} different small item types"),
            )
        } else {
            (
                Algorithm::BinPacking,
                "Catalogue has no density or variety pressure".to_string(),
            )
        };

        Ok(Recommendation {
            algorithm,
            volume_ratio,
            item_variety,
            mean_instance_volume,
            reason,
            priority: priority_order(items),
        })
    }
}

/// Distinct names ordered like the engine places them: larger, then heavier first.
fn priority_order(items: &[ItemSpec]) -> Vec<String> {
    let mut ordered: Vec<&ItemSpec> = items.iter().collect();
    ordered.sort_by(|a, b| {
        b.volume()
            .partial_cmp(&a.volume())
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal))
    });

    let mut seen = BTreeSet::new();
    ordered
        .into_iter()
        .filter(|item| seen.insert(item.name.as_str()))
        .map(|item| item.name.clone())
        .collect()
}
