//! Warehouse layout optimization.
//!
//! Places item types with fixed dimensions inside a rectangular warehouse
//! volume on a discretized occupancy grid. Items never overlap, and items of
//! different object types keep a minimum clearance. Three strategies are
//! available (`bin_packing`, `space_filling`, `hybrid`); the
//! [`orchestrator`] validates requests, runs a strategy and reports metrics.

pub mod api;
pub mod classifier;
pub mod config;
pub mod constraints;
pub mod geometry;
pub mod grid;
pub mod metrics;
pub mod model;
pub mod optimizer;
pub mod orchestrator;
pub mod recommender;
pub mod store;
pub mod types;
