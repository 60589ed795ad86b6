//! # Pipeline Configuration
//!
//! All tuning parameters of the visibility and draw pipeline live here.
//! The culling inflation factor and the OIT weight constants are empirical
//! heuristics; they are exposed so they can be adjusted and checked visually
//! rather than baked into the algorithms.
//!
//! ## Configuration Categories
//!
//! - **Culling**: bounding-sphere inflation
//! - **Sorting**: fixed-point depth scale and the transparent key offset
//! - **Transparency**: weighted-blended OIT weights, or plain sorted blending
//! - **Parallel**: optional worker pool for culling and list building

use serde::{Serialize, Deserialize};

use crate::config::{Config, ConfigError};

/// # Culling Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Multiplier applied to world-space bounding sphere radii
    ///
    /// Tight spheres pop at silhouette edges; a conservative bias keeps
    /// them on screen a little longer.
    pub radius_inflation: f32,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self { radius_inflation: 1.2 }
    }
}

/// # Sorting Configuration
///
/// Sort keys are fixed-point encodings of camera-space distance. Transparent
/// keys carry a large constant offset so they always order after opaque keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortingConfig {
    /// Scale applied to distances before rounding to an integer key
    pub depth_scale: f64,
    /// Offset added to every transparent key
    pub transparent_offset: i64,
    /// Distances are clamped to +/- this value before encoding
    pub max_distance: f64,
}

impl SortingConfig {
    /// Largest opaque key magnitude these settings can produce
    pub fn max_key_magnitude(&self) -> f64 {
        (self.max_distance * self.depth_scale).round()
    }
}

impl Default for SortingConfig {
    fn default() -> Self {
        Self {
            depth_scale: 1_000_000.0,
            transparent_offset: 0x0FFF_0000_0000_0000,
            max_distance: 1_000_000.0,
        }
    }
}

/// How transparent geometry is composited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransparencyMode {
    /// Weighted-blended order-independent transparency
    WeightedBlended,
    /// Forward alpha blending in back-to-front order
    Sorted,
}

/// Constants of the OIT weight function
///
/// `weight = clamp(pow(min(1, alpha * alpha_scale) + alpha_bias, exponent)
///               * scale * pow(1 - depth * depth_factor, exponent), min, max)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OitWeightParams {
    /// Alpha multiplier before saturation
    pub alpha_scale: f32,
    /// Bias added to the saturated alpha
    pub alpha_bias: f32,
    /// Exponent for both the alpha and depth terms
    pub exponent: f32,
    /// Overall scale
    pub scale: f32,
    /// Depth attenuation factor
    pub depth_factor: f32,
    /// Lower clamp
    pub min_weight: f32,
    /// Upper clamp
    pub max_weight: f32,
}

impl Default for OitWeightParams {
    fn default() -> Self {
        Self {
            alpha_scale: 10.0,
            alpha_bias: 0.01,
            exponent: 3.0,
            scale: 1e8,
            depth_factor: 0.9,
            min_weight: 1e-2,
            max_weight: 3e3,
        }
    }
}

/// # Transparency Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransparencyConfig {
    /// Compositing technique
    pub mode: TransparencyMode,
    /// Weight function constants
    pub weight: OitWeightParams,
    /// Floor for the accumulated alpha divisor and revealage comparison
    pub epsilon: f32,
}

impl Default for TransparencyConfig {
    fn default() -> Self {
        Self {
            mode: TransparencyMode::WeightedBlended,
            weight: OitWeightParams::default(),
            epsilon: 1e-5,
        }
    }
}

/// # Parallel Build Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Distribute culling and list building over worker threads
    pub enabled: bool,
    /// Number of worker threads
    pub worker_count: usize,
    /// Below this many entities the sequential path is used
    pub min_entities_per_worker: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            worker_count: 4,
            min_entities_per_worker: 64,
        }
    }
}

/// # Complete Pipeline Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Log level used by [`crate::foundation::logging::init_with_level`]
    pub log_level: String,
    /// Culling settings
    pub culling: CullingConfig,
    /// Sort key settings
    pub sorting: SortingConfig,
    /// Transparency settings
    pub transparency: TransparencyConfig,
    /// Parallel build settings
    pub parallel: ParallelConfig,
}

impl PipelineConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            culling: CullingConfig::default(),
            sorting: SortingConfig::default(),
            transparency: TransparencyConfig::default(),
            parallel: ParallelConfig::default(),
        }
    }

    /// Set the transparency mode
    pub fn with_transparency_mode(mut self, mode: TransparencyMode) -> Self {
        self.transparency.mode = mode;
        self
    }

    /// Enable the parallel build with the given worker count
    pub fn with_parallel_workers(mut self, workers: usize) -> Self {
        self.parallel.enabled = true;
        self.parallel.worker_count = workers;
        self
    }

    /// Set the bounding-sphere inflation factor
    pub fn with_radius_inflation(mut self, inflation: f32) -> Self {
        self.culling.radius_inflation = inflation;
        self
    }

    /// Validate the configuration
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.culling.radius_inflation.is_nan() || self.culling.radius_inflation < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "radius inflation must be >= 1.0, got {}",
                self.culling.radius_inflation
            )));
        }

        if self.sorting.depth_scale.is_nan()
            || self.sorting.depth_scale <= 0.0
            || self.sorting.max_distance.is_nan()
            || self.sorting.max_distance <= 0.0
        {
            return Err(ConfigError::Invalid("depth scale and max distance must be positive".to_string()));
        }

        // Worst case: farthest transparent entry against farthest opaque entry
        let offset = self.sorting.transparent_offset as f64;
        let max_key = self.sorting.max_key_magnitude();
        if offset <= 2.0 * max_key || max_key * 2.0 + offset >= i64::MAX as f64 {
            return Err(ConfigError::Invalid(format!(
                "transparent offset {:#x} does not separate keys of magnitude {max_key}",
                self.sorting.transparent_offset
            )));
        }

        let weight = &self.transparency.weight;
        if !weight.min_weight.is_finite()
            || !weight.max_weight.is_finite()
            || weight.min_weight <= 0.0
            || weight.max_weight < weight.min_weight
        {
            return Err(ConfigError::Invalid("OIT weight clamp range is empty".to_string()));
        }

        if !self.transparency.epsilon.is_finite() || self.transparency.epsilon <= 0.0 {
            return Err(ConfigError::Invalid("OIT epsilon must be positive".to_string()));
        }

        if self.parallel.enabled && self.parallel.worker_count == 0 {
            return Err(ConfigError::Invalid("parallel build needs at least one worker".to_string()));
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for PipelineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transparency.mode, TransparencyMode::WeightedBlended);
        assert!(!config.parallel.enabled);
    }

    #[test]
    fn test_offset_must_exceed_opaque_range() {
        let mut config = PipelineConfig::default();
        config.sorting.transparent_offset = 1_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_inflation_below_one_rejected() {
        let config = PipelineConfig::default().with_radius_inflation(0.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parallel_requires_workers() {
        let config = PipelineConfig::default().with_parallel_workers(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_oit_bounds_rejected() {
        let mut config = PipelineConfig::default();
        config.transparency.weight.min_weight = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.transparency.weight.max_weight = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.transparency.weight.max_weight = f32::INFINITY;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.transparency.epsilon = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_tuning() {
        let config = PipelineConfig::default()
            .with_radius_inflation(1.5)
            .with_transparency_mode(TransparencyMode::Sorted);
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let parsed: PipelineConfig = ron::from_str("(culling: (radius_inflation: 1.1))").unwrap();
        assert_eq!(parsed.culling.radius_inflation, 1.1);
        assert_eq!(parsed.sorting, SortingConfig::default());
    }
}
