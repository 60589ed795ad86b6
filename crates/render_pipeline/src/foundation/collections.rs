//! Specialized collection types

pub use slotmap::{new_key_type, SecondaryMap, SlotMap};

new_key_type! {
    /// Stable handle to a renderable entity owned by a [`crate::scene::Scene`]
    pub struct EntityId;

    /// Stable handle to a camera owned by a [`crate::scene::Scene`]
    pub struct CameraId;

    /// Stable handle to a material in a [`crate::render::MaterialRegistry`]
    pub struct MaterialId;
}
