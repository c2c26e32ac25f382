//! Data models for warehouse layout optimization.
//!
//! This module defines the fundamental data structures of a placement run:
//! - `WarehouseEnvelope`: The rectangular storage volume
//! - `ItemSpec`: A requested item type with dimensions, weight and quantity
//! - `ItemInstance`: One physical unit expanded from a specification
//! - `PlacedItem`: An instance with its committed position

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::classifier::{Category, classify};
use crate::types::{BoundingBox, Dimensional, Vec3};

/// Validation error for request data.
///
/// Raised before any grid is allocated; a run never starts on invalid input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {field} must be a positive finite number, got: {value}")]
    InvalidDimension { field: String, value: f64 },
    #[error("Invalid weight: {field} must be a non-negative finite number, got: {value}")]
    InvalidWeight { field: String, value: f64 },
    #[error("Invalid quantity: {field} must be at least 1, got: {value}")]
    InvalidQuantity { field: String, value: u32 },
    #[error("Invalid grid resolution: must be a positive finite number, got: {0}")]
    InvalidResolution(f64),
    #[error("Unknown algorithm '{0}', expected one of: bin_packing, space_filling, hybrid")]
    UnknownAlgorithm(String),
    #[error("Occupancy grid of {cells} cells exceeds the configured limit of {limit}")]
    GridTooLarge { cells: u64, limit: u64 },
    #[error("Request expands to {instances} item instances, above the configured limit of {limit}")]
    TooManyInstances { instances: u64, limit: u64 },
}

fn validate_dimension(value: f64, field: impl Into<String>) -> Result<(), ValidationError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(ValidationError::InvalidDimension {
            field: field.into(),
            value,
        });
    }
    Ok(())
}

fn validate_weight(value: f64, field: impl Into<String>) -> Result<(), ValidationError> {
    if value < 0.0 || !value.is_finite() {
        return Err(ValidationError::InvalidWeight {
            field: field.into(),
            value,
        });
    }
    Ok(())
}

/// The rectangular warehouse volume, in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "length": 10.0, "width": 10.0, "height": 5.0 }))]
pub struct WarehouseEnvelope {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl WarehouseEnvelope {
    /// Creates an envelope after validating that every side is positive.
    ///
    /// # Examples
    /// ```
    /// use warehouse_optimizer::model::WarehouseEnvelope;
    ///
    /// assert!(WarehouseEnvelope::new(10.0, 10.0, 5.0).is_ok());
    /// assert!(WarehouseEnvelope::new(10.0, 0.0, 5.0).is_err());
    /// ```
    pub fn new(length: f64, width: f64, height: f64) -> Result<Self, ValidationError> {
        let envelope = Self {
            length,
            width,
            height,
        };
        envelope.validate()?;
        Ok(envelope)
    }

    /// Validates the envelope dimensions.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.length, "warehouse.length")?;
        validate_dimension(self.width, "warehouse.width")?;
        validate_dimension(self.height, "warehouse.height")?;
        Ok(())
    }

    /// Total volume in cubic meters.
    pub fn volume(&self) -> f64 {
        self.length * self.width * self.height
    }
}

impl Dimensional for WarehouseEnvelope {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.length, self.width, self.height)
    }
}

/// A requested item type.
///
/// One specification expands into `quantity` independent instances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Pallet Box", "length": 1.2, "width": 0.8, "height": 1.5,
    "quantity": 10, "weight": 500.0
}))]
pub struct ItemSpec {
    pub name: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub quantity: u32,
    #[serde(default)]
    pub weight: f64,
}

impl ItemSpec {
    /// Validates dimensions, quantity and weight.
    ///
    /// # Parameters
    /// * `index` - Position of the specification in the request, used in messages
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        validate_dimension(self.length, format!("items[{index}].length"))?;
        validate_dimension(self.width, format!("items[{index}].width"))?;
        validate_dimension(self.height, format!("items[{index}].height"))?;
        if self.quantity == 0 {
            return Err(ValidationError::InvalidQuantity {
                field: format!("items[{index}].quantity"),
                value: self.quantity,
            });
        }
        validate_weight(self.weight, format!("items[{index}].weight"))?;
        Ok(())
    }
}

impl Dimensional for ItemSpec {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.length, self.width, self.height)
    }
}

/// One physical unit of an item specification.
///
/// Instances of the same specification are identical in size and weight but
/// carry their own identity.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemInstance {
    /// `"{name}_{n}"`, with `n` counting from 1 within the specification
    pub id: String,
    pub name: String,
    /// Index of the originating specification in the request
    pub spec_index: usize,
    pub dims: Vec3,
    pub weight: f64,
    pub category: Category,
}

impl Dimensional for ItemInstance {
    fn dimensions(&self) -> Vec3 {
        self.dims
    }
}

/// Expands specifications into instances, in request order.
pub fn expand_instances(specs: &[ItemSpec]) -> Vec<ItemInstance> {
    specs
        .iter()
        .enumerate()
        .flat_map(|(spec_index, spec)| {
            let category = classify(&spec.name);
            (1..=spec.quantity).map(move |n| ItemInstance {
                id: format!("{}_{}", spec.name, n),
                name: spec.name.clone(),
                spec_index,
                dims: spec.dimensions(),
                weight: spec.weight,
                category,
            })
        })
        .collect()
}

/// A committed placement.
///
/// Never mutated after creation; the ordered sequence of placed items of a run
/// is its placement plan.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedItem {
    pub instance: ItemInstance,
    /// Minimum corner of the item's box
    pub position: Vec3,
}

impl PlacedItem {
    /// Creates a new placed item.
    pub fn new(instance: ItemInstance, position: Vec3) -> Self {
        Self { instance, position }
    }

    /// The axis-aligned box the item occupies.
    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(self.position, self.instance.dims)
    }

    #[inline]
    pub fn category(&self) -> Category {
        self.instance.category
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        self.instance.weight
    }
}

impl Dimensional for PlacedItem {
    fn dimensions(&self) -> Vec3 {
        self.instance.dims
    }
}
