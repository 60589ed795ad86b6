//! Per-draw uniform binding
//!
//! [`UniformBinder`] turns a material and the current frame state into the
//! flat list of uniform uploads that accompanies a draw call.

use crate::foundation::math::{Mat3, Mat4, Mat4Ext, Vec2, Vec3, Vec4};
use crate::render::device::TextureId;
use crate::render::material::{Capabilities, Material, PropertyValue, UniformId};
use crate::scene::{ShadowMap, Sunlight};

/// Where a uniform value goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformLocation {
    /// Location reported by the material system
    Slot(i32),
    /// Uniform of a built-in pipeline shader, looked up by name
    Named(&'static str),
}

/// A value to upload
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// Scalar
    Float(f32),
    /// 2-component vector
    Vec2(Vec2),
    /// 3-component vector
    Vec3(Vec3),
    /// 4-component vector
    Vec4(Vec4),
    /// 3x3 matrix
    Mat3(Mat3),
    /// 4x4 matrix
    Mat4(Mat4),
    /// Array of matrices
    Mat4Array(Vec<Mat4>),
    /// Texture bound to a texture unit
    Texture {
        /// Texture unit
        unit: u32,
        /// Texture to bind
        texture: TextureId,
    },
    /// Raw uniform block contents
    Block(Vec<u8>),
}

/// One uniform upload
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBinding {
    /// Destination
    pub location: UniformLocation,
    /// Value
    pub value: UniformValue,
}

impl UniformBinding {
    /// Binding for a built-in shader uniform
    pub fn named(name: &'static str, value: UniformValue) -> Self {
        Self { location: UniformLocation::Named(name), value }
    }
}

/// Camera pass and lighting state shared by every draw of a pass
#[derive(Debug, Clone)]
pub struct FrameUniforms<'a> {
    /// View matrix
    pub view: Mat4,
    /// Projection matrix
    pub projection: Mat4,
    /// `projection * view`
    pub view_projection: Mat4,
    /// Eye position in world space
    pub camera_position: Vec3,
    /// Output size in pixels
    pub screen_size: Vec2,
    /// Water clip plane for this pass
    pub clip_plane: Vec4,
    /// Directional light
    pub sunlight: &'a Sunlight,
    /// Shadow map, if the provider has one
    pub shadow_map: Option<&'a ShadowMap>,
    /// Skybox cube map
    pub skybox: Option<TextureId>,
    /// Output of this camera's reflection pass
    pub reflection_map: Option<TextureId>,
    /// Output of this camera's refraction pass
    pub refraction_map: Option<TextureId>,
}

/// Builds uniform bindings for material draws
///
/// The binding buffer is reused between draws.
#[derive(Debug, Default)]
pub struct UniformBinder {
    bindings: Vec<UniformBinding>,
    next_unit: u32,
}

impl UniformBinder {
    /// Create an empty binder
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings for drawing one submesh with `material`
    ///
    /// Properties are bound first, in name order, each texture taking the
    /// next free texture unit. Capability tags are bound next, then the
    /// per-draw matrices.
    pub fn bind(
        &mut self,
        material: &Material,
        frame: &FrameUniforms<'_>,
        world: &Mat4,
        skeleton: Option<&[Mat4]>,
    ) -> &[UniformBinding] {
        self.bindings.clear();
        self.next_unit = 0;

        for (_, property) in material.properties() {
            let value = match property.value {
                PropertyValue::Texture(texture) => self.texture(texture),
                PropertyValue::Number(value) => UniformValue::Float(value),
                PropertyValue::Vec2(value) => UniformValue::Vec2(value),
                PropertyValue::Vec3(value) => UniformValue::Vec3(value),
                PropertyValue::Vec4(value) => UniformValue::Vec4(value),
                PropertyValue::Mat4(value) => UniformValue::Mat4(value),
            };
            self.push_slot(property.location, value);
        }

        for capability in material.capabilities.iter() {
            self.bind_capability(material, capability, frame, skeleton);
        }

        let world_view = frame.view * world;
        let standard = [
            (UniformId::World, UniformValue::Mat4(*world)),
            (UniformId::View, UniformValue::Mat4(frame.view)),
            (UniformId::ViewProjection, UniformValue::Mat4(frame.view_projection)),
            (UniformId::Projection, UniformValue::Mat4(frame.projection)),
            (UniformId::WorldView, UniformValue::Mat4(world_view)),
            (UniformId::Normal, UniformValue::Mat3(world_view.normal_matrix())),
            (UniformId::Camera, UniformValue::Vec3(frame.camera_position)),
            (UniformId::ScreenSize, UniformValue::Vec2(frame.screen_size)),
            (UniformId::ClipPlane, UniformValue::Vec4(frame.clip_plane)),
        ];
        for (id, value) in standard {
            if let Some(location) = material.uniforms.get(id) {
                self.push_slot(location, value);
            }
        }

        &self.bindings
    }

    fn bind_capability(
        &mut self,
        material: &Material,
        capability: Capabilities,
        frame: &FrameUniforms<'_>,
        skeleton: Option<&[Mat4]>,
    ) {
        let Some(id) = capability.uniform() else {
            return;
        };
        let Some(location) = material.uniforms.get(id) else {
            return;
        };

        let value = match id {
            UniformId::SkyBox => frame.skybox.map(|texture| self.texture(texture)),
            UniformId::Skeleton => skeleton.map(|bones| UniformValue::Mat4Array(bones.to_vec())),
            UniformId::ShadowMap => frame.shadow_map.map(|shadow| self.texture(shadow.texture)),
            UniformId::ShadowProjection => frame.shadow_map.map(|shadow| UniformValue::Mat4(shadow.light_projection)),
            UniformId::SunlightColour => Some(UniformValue::Vec4(frame.sunlight.colour)),
            UniformId::SunlightDirection => Some(UniformValue::Vec3(frame.sunlight.direction())),
            UniformId::ReflectionMap => frame.reflection_map.map(|texture| self.texture(texture)),
            UniformId::RefractionMap => frame.refraction_map.map(|texture| self.texture(texture)),
            _ => None,
        };

        match value {
            Some(value) => self.push_slot(location, value),
            None => log::trace!("No resource for capability {capability:?}, leaving unbound"),
        }
    }

    fn texture(&mut self, texture: TextureId) -> UniformValue {
        let unit = self.next_unit;
        self.next_unit += 1;
        UniformValue::Texture { unit, texture }
    }

    fn push_slot(&mut self, location: i32, value: UniformValue) {
        self.bindings.push(UniformBinding { location: UniformLocation::Slot(location), value });
    }
}
