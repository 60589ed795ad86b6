//! # Core Pipeline Module
//!
//! Shared configuration for every stage of the pipeline.

pub mod config;

pub use config::{
    PipelineConfig,
    CullingConfig,
    SortingConfig,
    TransparencyConfig,
    TransparencyMode,
    OitWeightParams,
    ParallelConfig,
};
