//! Clearance rule between items of different categories.
//!
//! Same-category items may touch and stack; items of different categories must
//! keep at least the configured clearance (1 m by default) between their boxes.

use serde::Serialize;
use utoipa::ToSchema;

use crate::classifier::Category;
use crate::geometry::{box_distance, intersects, is_contained};
use crate::model::{PlacedItem, WarehouseEnvelope};
use crate::types::{BoundingBox, EPSILON_GENERAL};

/// Decides whether a candidate box keeps its distance to committed items.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceConstraint {
    clearance: f64,
}

impl DistanceConstraint {
    pub const DEFAULT_CLEARANCE: f64 = 1.0;

    pub fn new(clearance: f64) -> Self {
        Self { clearance }
    }

    pub fn clearance(&self) -> f64 {
        self.clearance
    }

    /// Checks a candidate against every placed item.
    ///
    /// Cost is linear in `placed.len()`. Overlap is the grid's job; this only
    /// enforces the clearance between different categories.
    pub fn admissible(
        &self,
        candidate: &BoundingBox,
        category: Category,
        placed: &[PlacedItem],
    ) -> bool {
        placed
            .iter()
            .filter(|p| p.category() != category)
            .all(|p| self.keeps_clearance(candidate, &p.bounding_box()))
    }

    #[inline]
    fn keeps_clearance(&self, a: &BoundingBox, b: &BoundingBox) -> bool {
        box_distance(a, b) >= self.clearance - EPSILON_GENERAL
    }
}

impl Default for DistanceConstraint {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CLEARANCE)
    }
}

/// Kind of constraint a finished plan breaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Overlap,
    Clearance,
    OutOfBounds,
}

/// A constraint broken by a finished placement plan.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ConstraintViolation {
    pub kind: ViolationKind,
    pub item: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// Re-checks a finished plan against containment, overlap and clearance.
///
/// A plan produced by the strategies yields no violations; the audit is part of
/// every result so callers can verify that.
pub fn audit_plan(
    plan: &[PlacedItem],
    envelope: &WarehouseEnvelope,
    constraint: &DistanceConstraint,
) -> Vec<ConstraintViolation> {
    let mut violations = Vec::new();

    for (i, a) in plan.iter().enumerate() {
        if !is_contained(a, envelope) {
            violations.push(ConstraintViolation {
                kind: ViolationKind::OutOfBounds,
                item: a.instance.id.clone(),
                other: None,
                distance: None,
            });
        }

        for b in &plan[i + 1..] {
            if intersects(a, b) {
                violations.push(ConstraintViolation {
                    kind: ViolationKind::Overlap,
                    item: a.instance.id.clone(),
                    other: Some(b.instance.id.clone()),
                    distance: Some(0.0),
                });
                continue;
            }
            if a.category() != b.category() {
                let distance = box_distance(&a.bounding_box(), &b.bounding_box());
                if distance < constraint.clearance() - EPSILON_GENERAL {
                    violations.push(ConstraintViolation {
                        kind: ViolationKind::Clearance,
                        item: a.instance.id.clone(),
                        other: Some(b.instance.id.clone()),
                        distance: Some(distance),
                    });
                }
            }
        }
    }

    violations
}
