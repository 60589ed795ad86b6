//! Material definitions
//!
//! A material is what the material system hands the pipeline for a submesh:
//! a compiled shader, where its uniforms live, how it blends, named property
//! values, and the set of optional capabilities the shader expects bound.

use std::collections::{BTreeMap, HashMap};

use bitflags::bitflags;

use crate::foundation::collections::{MaterialId, SlotMap};
use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};
use crate::render::device::{ShaderId, TextureId};
use crate::render::state::BlendMode;

/// Well-known uniforms a material shader may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UniformId {
    /// Entity world matrix
    World,
    /// Camera view matrix
    View,
    /// Camera view-projection matrix
    ViewProjection,
    /// Camera projection matrix
    Projection,
    /// `view * world`
    WorldView,
    /// Inverse-transpose of the upper 3x3 of `view * world`
    Normal,
    /// Camera world position
    Camera,
    /// Output size in pixels
    ScreenSize,
    /// Water clip plane
    ClipPlane,
    /// Skinning palette
    Skeleton,
    /// Skybox cube map
    SkyBox,
    /// Shadow map sampler
    ShadowMap,
    /// Light-space projection for shadow lookups
    ShadowProjection,
    /// Sun colour
    SunlightColour,
    /// Sun direction
    SunlightDirection,
    /// Reflection pass texture
    ReflectionMap,
    /// Refraction pass texture
    RefractionMap,
}

/// Map from well-known uniforms to shader locations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformLocations {
    locations: HashMap<UniformId, i32>,
}

impl UniformLocations {
    /// Record the location of a uniform
    pub fn set(&mut self, id: UniformId, location: i32) {
        self.locations.insert(id, location);
    }

    /// Location of a uniform, if the shader exposes it
    pub fn get(&self, id: UniformId) -> Option<i32> {
        self.locations.get(&id).copied()
    }
}

bitflags! {
    /// Optional resources a material's shader expects
    ///
    /// The binder visits only the tags present, so adding a new feature
    /// does not touch materials that never declare it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u16 {
        /// Samples the scene skybox
        const SKYBOX = 1 << 0;
        /// Deforms vertices with a bone palette
        const SKINNING = 1 << 1;
        /// Samples the shadow map
        const SHADOW_MAP_SAMPLER = 1 << 2;
        /// Needs the light-space projection
        const SHADOW_MAP_PROJECTION = 1 << 3;
        /// Needs the sun colour
        const SUNLIGHT_COLOUR = 1 << 4;
        /// Needs the sun direction
        const SUNLIGHT_DIRECTION = 1 << 5;
        /// Samples the reflection pass output
        const REFLECTION_MAP = 1 << 6;
        /// Samples the refraction pass output
        const REFRACTION_MAP = 1 << 7;
    }
}

impl Capabilities {
    const UNIFORMS: [(Self, UniformId); 8] = [
        (Self::SKYBOX, UniformId::SkyBox),
        (Self::SKINNING, UniformId::Skeleton),
        (Self::SHADOW_MAP_SAMPLER, UniformId::ShadowMap),
        (Self::SHADOW_MAP_PROJECTION, UniformId::ShadowProjection),
        (Self::SUNLIGHT_COLOUR, UniformId::SunlightColour),
        (Self::SUNLIGHT_DIRECTION, UniformId::SunlightDirection),
        (Self::REFLECTION_MAP, UniformId::ReflectionMap),
        (Self::REFRACTION_MAP, UniformId::RefractionMap),
    ];

    /// Uniform a single capability binds to
    pub fn uniform(self) -> Option<UniformId> {
        Self::UNIFORMS
            .iter()
            .find(|(capability, _)| *capability == self)
            .map(|&(_, id)| id)
    }
}

/// Value of a named material property
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    /// Texture, assigned the next free texture unit when bound
    Texture(TextureId),
    /// Scalar
    Number(f32),
    /// 2-component vector
    Vec2(Vec2),
    /// 3-component vector
    Vec3(Vec3),
    /// 4-component vector or colour
    Vec4(Vec4),
    /// Matrix
    Mat4(Mat4),
}

/// Named property with its shader location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Property {
    /// Uniform location in the material's shader
    pub location: i32,
    /// Value uploaded before each draw
    pub value: PropertyValue,
}

/// Material as supplied by the material system
#[derive(Debug, Clone)]
pub struct Material {
    /// Shader program
    pub shader: ShaderId,
    /// Locations of well-known uniforms
    pub uniforms: UniformLocations,
    /// Blend mode, which decides the opaque or transparent bucket
    pub blend: BlendMode,
    /// Depth testing for opaque draws
    pub depth_test: bool,
    /// Disable face culling
    pub double_sided: bool,
    /// Optional resources to bind
    pub capabilities: Capabilities,
    properties: BTreeMap<String, Property>,
}

impl Material {
    /// Create an opaque material for a shader
    pub fn new(shader: ShaderId) -> Self {
        Self {
            shader,
            uniforms: UniformLocations::default(),
            blend: BlendMode::None,
            depth_test: true,
            double_sided: false,
            capabilities: Capabilities::empty(),
            properties: BTreeMap::new(),
        }
    }

    /// Set the blend mode
    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    /// Declare optional capabilities
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities |= capabilities;
        self
    }

    /// Record a well-known uniform location
    pub fn with_uniform(mut self, id: UniformId, location: i32) -> Self {
        self.uniforms.set(id, location);
        self
    }

    /// Set or replace a named property
    pub fn set_property(&mut self, name: impl Into<String>, location: i32, value: PropertyValue) {
        self.properties.insert(name.into(), Property { location, value });
    }

    /// Look up a named property
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Properties in name order
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.properties.iter().map(|(name, property)| (name.as_str(), property))
    }
}

/// Storage for materials referenced by submeshes
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    materials: SlotMap<MaterialId, Material>,
}

impl MaterialRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a material
    pub fn insert(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    /// Look up a material
    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    /// Look up a material for editing
    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    /// Number of materials
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// True if no materials are registered
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
