//! Shared building blocks for the scene and pipeline layers
//!
//! `math` holds the nalgebra aliases and the entity transform,
//! `collections` the slotmap keys for entities, cameras and materials,
//! and `logging` the env_logger setup used by the demo binary.

pub mod math;
pub mod collections;
pub mod logging;
