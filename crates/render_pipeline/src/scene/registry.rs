//! # Scene
//!
//! Owns everything the pipeline reads each frame: entities, cameras,
//! materials and the lighting inputs. The pipeline only ever borrows from it.

use crate::error::{precondition_failed, PipelineError, PipelineResult};
use crate::foundation::collections::{CameraId, EntityId, SlotMap};
use crate::render::{MaterialRegistry, TextureId};
use crate::scene::camera::Camera;
use crate::scene::entity::RenderableEntity;
use crate::scene::lighting::{ShadowMap, Sunlight};

/// Scene graph as seen by the render pipeline
#[derive(Debug, Default)]
pub struct Scene {
    entities: SlotMap<EntityId, RenderableEntity>,
    cameras: SlotMap<CameraId, Camera>,
    /// Materials referenced by submeshes
    pub materials: MaterialRegistry,
    /// Directional light
    pub sunlight: Sunlight,
    /// Shadow map from the shadow provider
    pub shadow_map: Option<ShadowMap>,
    /// Skybox cube map
    pub skybox: Option<TextureId>,
    water_level: f32,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity
    ///
    /// Entities with no submeshes or with a zero-extent submesh bound are
    /// rejected here so the per-frame path can assume well-formed geometry.
    pub fn spawn(&mut self, entity: RenderableEntity) -> PipelineResult<EntityId> {
        let submeshes = &entity.mesh().submeshes;
        let problem = if submeshes.is_empty() {
            Some("entity has no submeshes")
        } else if submeshes.iter().any(|submesh| submesh.bounds.is_degenerate()) {
            Some("submesh bounds have zero extent")
        } else {
            None
        };

        if let Some(problem) = problem {
            let error = PipelineError::DegenerateGeometry(problem);
            precondition_failed(&error);
            return Err(error);
        }

        let id = self.entities.insert(entity);
        log::debug!("Spawned entity {id:?}");
        Ok(id)
    }

    /// Remove an entity
    pub fn despawn(&mut self, id: EntityId) -> Option<RenderableEntity> {
        self.entities.remove(id)
    }

    /// Look up an entity
    pub fn entity(&self, id: EntityId) -> Option<&RenderableEntity> {
        self.entities.get(id)
    }

    /// Look up an entity for editing
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut RenderableEntity> {
        self.entities.get_mut(id)
    }

    /// All entities
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &RenderableEntity)> {
        self.entities.iter()
    }

    /// Number of entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Register a camera, building its passes for the current water level
    pub fn add_camera(&mut self, mut camera: Camera) -> CameraId {
        camera.update_passes(self.water_level);
        self.cameras.insert(camera)
    }

    /// Look up a camera
    pub fn camera(&self, id: CameraId) -> Option<&Camera> {
        self.cameras.get(id)
    }

    /// Look up a camera for editing
    ///
    /// Call [`Camera::update_passes`] after moving it.
    pub fn camera_mut(&mut self, id: CameraId) -> Option<&mut Camera> {
        self.cameras.get_mut(id)
    }

    /// Remove a camera
    pub fn remove_camera(&mut self, id: CameraId) -> Option<Camera> {
        self.cameras.remove(id)
    }

    /// All cameras
    pub fn cameras(&self) -> impl Iterator<Item = (CameraId, &Camera)> {
        self.cameras.iter()
    }

    /// Height of the water plane
    pub fn water_level(&self) -> f32 {
        self.water_level
    }

    /// Move the water plane and rebuild every camera's passes
    pub fn set_water_level(&mut self, water_level: f32) {
        self.water_level = water_level;
        for camera in self.cameras.values_mut() {
            camera.update_passes(water_level);
        }
    }

    /// Recompute bounding spheres of entities marked dirty
    ///
    /// Returns how many entities were refreshed.
    pub fn refresh_bounds(&mut self, inflation: f32) -> usize {
        let refreshed = self
            .entities
            .values_mut()
            .map(|entity| entity.refresh_bounds(inflation))
            .filter(|&refreshed| refreshed)
            .count();
        if refreshed > 0 {
            log::trace!("Refreshed bounds of {refreshed} entities");
        }
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Transform, Vec3};
    use crate::render::{Material, MeshHandle, ShaderId};
    use crate::scene::bounds::AABB;
    use crate::scene::entity::{Mesh, Submesh};

    fn entity(scene: &mut Scene, position: Vec3) -> RenderableEntity {
        let material = scene.materials.insert(Material::new(ShaderId(1)));
        let bounds = AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(0.5));
        RenderableEntity::new(
            Transform::from_position(position),
            Mesh::new(MeshHandle(1), vec![Submesh::new(bounds, material)]),
        )
    }

    #[test]
    fn test_refresh_only_dirty_entities() {
        let mut scene = Scene::new();
        let a = entity(&mut scene, Vec3::zeros());
        let b = entity(&mut scene, Vec3::new(0.0, 0.0, -5.0));
        let a = scene.spawn(a).unwrap();
        scene.spawn(b).unwrap();

        assert_eq!(scene.refresh_bounds(1.2), 2);
        assert_eq!(scene.refresh_bounds(1.2), 0);

        let moved = Transform::from_position(Vec3::new(1.0, 0.0, 0.0));
        scene.entity_mut(a).unwrap().set_transform(moved);
        assert_eq!(scene.refresh_bounds(1.2), 1);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "Precondition violated"))]
    fn test_degenerate_bounds_rejected() {
        let mut scene = Scene::new();
        let material = scene.materials.insert(Material::new(ShaderId(1)));
        let flat = AABB::new(Vec3::zeros(), Vec3::zeros());
        let entity = RenderableEntity::new(
            Transform::identity(),
            Mesh::new(MeshHandle(1), vec![Submesh::new(flat, material)]),
        );
        assert!(scene.spawn(entity).is_err());
        assert_eq!(scene.entity_count(), 0);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "Precondition violated"))]
    fn test_empty_mesh_rejected() {
        let mut scene = Scene::new();
        let entity = RenderableEntity::new(Transform::identity(), Mesh::new(MeshHandle(1), Vec::new()));
        assert!(scene.spawn(entity).is_err());
    }
}
