//! Parallel culling and list building
//!
//! Entities are split into contiguous chunks, one per worker. Each worker
//! culls its chunk and fills its own buckets, then appends them to the shared
//! buckets under a single lock. Sorting happens once all workers are done.

use parking_lot::Mutex;

use crate::core::ParallelConfig;
use crate::foundation::collections::EntityId;
use crate::pipeline::cull::{collect_visible, visible};
use crate::pipeline::draw_list::{Buckets, DrawList, DrawListBuilder};

/// Number of workers worth starting for `entity_count` entities
pub fn worker_count(config: &ParallelConfig, entity_count: usize) -> usize {
    if !config.enabled {
        return 1;
    }
    let per_worker = config.min_entities_per_worker.max(1);
    config.worker_count.max(1).min(entity_count.div_ceil(per_worker)).max(1)
}

/// Cull and build a pass, spreading the work over scoped worker threads
///
/// Falls back to a sequential build when the scene is too small to split.
pub fn build_parallel(builder: &DrawListBuilder<'_>, config: &ParallelConfig, frame: u64) -> DrawList {
    let scene = builder.scene();
    let frustum = &builder.pass().frustum;
    let ids: Vec<EntityId> = scene.entities().map(|(id, _)| id).collect();

    let workers = worker_count(config, ids.len());
    if workers <= 1 {
        let mut visible_ids = Vec::with_capacity(ids.len());
        collect_visible(scene, frustum, &mut visible_ids);
        return builder.build(&visible_ids, frame);
    }

    let chunk_size = ids.len().div_ceil(workers);
    let merged = Mutex::new(Buckets::default());

    std::thread::scope(|scope| {
        for (chunk_index, chunk) in ids.chunks(chunk_size).enumerate() {
            let merged = &merged;
            let first = chunk_index * chunk_size;
            scope.spawn(move || {
                let mut local = Buckets::default();
                let chunk_visible = chunk.iter().copied().enumerate().filter_map(|(offset, id)| {
                    let entity = scene.entity(id)?;
                    (!entity.hidden && visible(frustum, entity.world_sphere())).then_some((first + offset, id))
                });
                builder.collect(chunk_visible, &mut local);
                merged.lock().append(&mut local);
            });
        }
    });

    let list = merged.into_inner().into_sorted(builder.pass().kind, frame);
    log::debug!(
        "Built {:?} draw list on {workers} workers: {} opaque, {} transparent",
        list.pass(),
        list.opaque().len(),
        list.transparent().len()
    );
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SortingConfig;
    use crate::foundation::math::{Transform, Vec3};
    use crate::render::{BlendMode, Material, MeshHandle, ShaderId};
    use crate::scene::{Camera, Mesh, PassKind, RenderableEntity, Scene, Submesh, AABB};

    fn crowded_scene() -> (Scene, Camera) {
        let mut scene = Scene::new();
        let opaque = scene.materials.insert(Material::new(ShaderId(1)));
        let glass = scene.materials.insert(Material::new(ShaderId(2)).with_blend(BlendMode::Additive));
        let bounds = AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(0.5));

        for i in 0..200u8 {
            let x = f32::from(i % 20) - 10.0;
            let z = -f32::from(i / 20) * 3.0 - 2.0;
            let material = if i % 3 == 0 { glass } else { opaque };
            let entity = RenderableEntity::new(
                Transform::from_position(Vec3::new(x, 0.0, z)),
                Mesh::new(MeshHandle(u64::from(i)), vec![Submesh::new(bounds, material)]),
            );
            scene.spawn(entity).unwrap();
        }
        scene.refresh_bounds(1.2);

        let camera = Camera::perspective(Vec3::new(0.0, 1.0, 5.0), Vec3::new(0.0, 0.0, -10.0), 60.0, (800, 600), 0.1, 100.0);
        (scene, camera)
    }

    fn summary(list: &DrawList) -> Vec<(EntityId, i64)> {
        list.concatenated().map(|e| (e.entity, e.key)).collect()
    }

    #[test]
    fn test_worker_count_respects_minimum_chunk() {
        let config = ParallelConfig { enabled: true, worker_count: 8, min_entities_per_worker: 64 };
        assert_eq!(worker_count(&config, 10), 1);
        assert_eq!(worker_count(&config, 130), 3);
        assert_eq!(worker_count(&config, 10_000), 8);
        assert_eq!(worker_count(&ParallelConfig::default(), 10_000), 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (scene, camera) = crowded_scene();
        let sorting = SortingConfig::default();
        let pass = camera.pass(PassKind::Final);
        let builder = DrawListBuilder::new(&scene, pass, u64::MAX, &sorting);

        let mut visible_ids = Vec::new();
        collect_visible(&scene, &pass.frustum, &mut visible_ids);
        let sequential = builder.build(&visible_ids, 1);

        let config = ParallelConfig { enabled: true, worker_count: 4, min_entities_per_worker: 16 };
        let parallel = build_parallel(&builder, &config, 1);

        assert!(!sequential.is_empty());
        assert_eq!(summary(&parallel), summary(&sequential));
    }
}
