//! # Scene Module
//!
//! Scene-side data the pipeline consumes: renderable entities with lazily
//! refreshed bounds, cameras with their three passes, lighting inputs, and
//! the bounding volumes used for culling.

pub mod bounds;
pub mod entity;
pub mod camera;
pub mod lighting;
pub mod registry;

pub use bounds::{AABB, BoundingSphere, Frustum, Planar, Plane};
pub use entity::{Mesh, RenderableEntity, Submesh, SubmeshFlags, ALL_LAYERS};
pub use camera::{Camera, CameraPass, PassKind};
pub use lighting::{EnvironmentMap, ShadowMap, Sunlight};
pub use registry::Scene;
