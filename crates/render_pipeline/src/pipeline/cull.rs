//! Frustum culling against bounding spheres

use crate::foundation::collections::EntityId;
use crate::scene::{BoundingSphere, Frustum, Planar, Scene};

/// True unless the sphere lies entirely behind one of the frustum planes
pub fn visible(frustum: &Frustum, sphere: &BoundingSphere) -> bool {
    frustum
        .planes
        .iter()
        .all(|plane| plane.classify_sphere(sphere) != Planar::Back)
}

/// Append the visible, unhidden entities of `scene` to `out`
///
/// Bounds must have been refreshed for this frame.
pub fn collect_visible(scene: &Scene, frustum: &Frustum, out: &mut Vec<EntityId>) {
    out.extend(
        scene
            .entities()
            .filter(|(_, entity)| !entity.hidden && visible(frustum, entity.world_sphere()))
            .map(|(id, _)| id),
    );
}
