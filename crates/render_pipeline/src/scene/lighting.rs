//! Lighting inputs supplied by external providers

use crate::error::{precondition_failed, PipelineError};
use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::TextureId;

/// The single directional light
#[derive(Debug, Clone, PartialEq)]
pub struct Sunlight {
    direction: Vec3,
    /// Linear RGB colour, alpha unused
    pub colour: Vec4,
}

impl Sunlight {
    /// Create a sun shining along `direction`
    pub fn new(direction: Vec3, colour: Vec4) -> Self {
        let mut sun = Self { direction: -Vec3::y(), colour };
        sun.set_direction(direction);
        sun
    }

    /// Normalized direction the light travels in
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Change the light direction
    ///
    /// A zero-length direction is rejected and the previous one kept.
    pub fn set_direction(&mut self, direction: Vec3) {
        match direction.try_normalize(f32::EPSILON) {
            Some(normalized) => self.direction = normalized,
            None => precondition_failed(&PipelineError::DegenerateGeometry("zero-length light direction")),
        }
    }
}

impl Default for Sunlight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.25, -1.0, -0.1).normalize(),
            colour: Vec4::new(1.0, 1.0, 1.0, 1.0),
        }
    }
}

/// Shadow map from the shadow provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowMap {
    /// Depth texture
    pub texture: TextureId,
    /// World to light clip space
    pub light_projection: Mat4,
}

/// Precomputed image-based lighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentMap {
    /// Diffuse irradiance cube map
    pub irradiance: TextureId,
    /// Prefiltered specular cube map
    pub prefiltered: TextureId,
    /// BRDF integration lookup
    pub brdf: TextureId,
}
