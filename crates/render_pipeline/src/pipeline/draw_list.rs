//! Draw lists for a single camera pass
//!
//! Visible entities are split per submesh into an opaque bucket and a
//! transparent bucket according to their material's blend mode. Each bucket
//! is sorted by its fixed-point depth key before drawing.

use crate::core::SortingConfig;
use crate::foundation::collections::EntityId;
use crate::pipeline::sort::{opaque_key, sort_bucket, transparent_key};
use crate::scene::{CameraPass, PassKind, Scene, SubmeshFlags};

/// One entity's submeshes for one bucket
#[derive(Debug, Clone, PartialEq)]
pub struct DrawListEntry {
    /// Entity to draw
    pub entity: EntityId,
    /// Indices into the entity's submeshes, never empty
    pub submeshes: Vec<usize>,
    /// Distance along the camera forward axis
    pub distance: f32,
    /// Sort key
    pub key: i64,
    /// Position in the visible set, used to break key ties
    pub(crate) order: usize,
}

/// Opaque and transparent buckets before sorting
#[derive(Debug, Default)]
pub(crate) struct Buckets {
    pub(crate) opaque: Vec<DrawListEntry>,
    pub(crate) transparent: Vec<DrawListEntry>,
}

impl Buckets {
    pub(crate) fn append(&mut self, other: &mut Self) {
        self.opaque.append(&mut other.opaque);
        self.transparent.append(&mut other.transparent);
    }

    pub(crate) fn into_sorted(mut self, pass: PassKind, frame: u64) -> DrawList {
        sort_bucket(&mut self.opaque);
        sort_bucket(&mut self.transparent);
        DrawList {
            pass,
            frame,
            opaque: self.opaque,
            transparent: self.transparent,
        }
    }
}

/// Sorted draw list for one camera pass in one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DrawList {
    pass: PassKind,
    frame: u64,
    opaque: Vec<DrawListEntry>,
    transparent: Vec<DrawListEntry>,
}

impl DrawList {
    /// Empty list, e.g. for a pass with nothing visible
    pub fn empty(pass: PassKind, frame: u64) -> Self {
        Self { pass, frame, opaque: Vec::new(), transparent: Vec::new() }
    }

    /// Pass this list was built for
    pub fn pass(&self) -> PassKind {
        self.pass
    }

    /// Frame this list was built in
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Opaque entries, front to back
    pub fn opaque(&self) -> &[DrawListEntry] {
        &self.opaque
    }

    /// Transparent entries, back to front
    pub fn transparent(&self) -> &[DrawListEntry] {
        &self.transparent
    }

    /// Both buckets as one key-ordered sequence
    pub fn concatenated(&self) -> impl Iterator<Item = &DrawListEntry> {
        self.opaque.iter().chain(self.transparent.iter())
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    /// True if nothing is to be drawn
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }
}

/// Builds a [`DrawList`] from a set of visible entities
///
/// Reads the scene only; entities and materials are never modified.
#[derive(Debug, Clone, Copy)]
pub struct DrawListBuilder<'a> {
    scene: &'a Scene,
    pass: &'a CameraPass,
    render_flags: u64,
    sorting: &'a SortingConfig,
}

impl<'a> DrawListBuilder<'a> {
    /// Builder for one camera pass
    pub fn new(scene: &'a Scene, pass: &'a CameraPass, render_flags: u64, sorting: &'a SortingConfig) -> Self {
        Self { scene, pass, render_flags, sorting }
    }

    /// Sorted draw list for `visible`
    pub fn build(&self, visible: &[EntityId], frame: u64) -> DrawList {
        let mut buckets = Buckets::default();
        self.collect(visible.iter().copied().enumerate(), &mut buckets);
        let list = buckets.into_sorted(self.pass.kind, frame);
        log::debug!(
            "Built {:?} draw list: {} opaque, {} transparent",
            self.pass.kind,
            list.opaque.len(),
            list.transparent.len()
        );
        list
    }

    /// Append unsorted entries to `out`
    ///
    /// Each entity comes with its tie-break position in the full visible set.
    pub(crate) fn collect(&self, visible: impl IntoIterator<Item = (usize, EntityId)>, out: &mut Buckets) {
        for (order, id) in visible {
            self.add_entity(id, order, out);
        }
    }

    /// Pass being built
    pub fn pass(&self) -> &'a CameraPass {
        self.pass
    }

    /// Scene being read
    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    fn add_entity(&self, id: EntityId, order: usize, out: &mut Buckets) {
        let Some(entity) = self.scene.entity(id) else {
            log::warn!("Visible set references missing entity {id:?}");
            return;
        };
        if entity.hidden {
            return;
        }

        let sphere = entity.world_sphere();
        let distance = self.pass.forward.dot(&(sphere.centre - self.pass.position));
        if distance < -sphere.radius {
            return;
        }

        let mut opaque = Vec::new();
        let mut transparent = Vec::new();
        for (index, submesh) in entity.mesh().submeshes.iter().enumerate() {
            if submesh.flags.contains(SubmeshFlags::HIDDEN) || submesh.render_layers & self.render_flags == 0 {
                continue;
            }
            let Some(material) = self.scene.materials.get(submesh.material) else {
                log::warn!("Entity {id:?} submesh {index} references a missing material");
                continue;
            };
            if material.blend.is_transparent() {
                transparent.push(index);
            } else {
                opaque.push(index);
            }
        }

        if !opaque.is_empty() {
            out.opaque.push(DrawListEntry {
                entity: id,
                submeshes: opaque,
                distance,
                key: opaque_key(distance, self.sorting),
                order,
            });
        }
        if !transparent.is_empty() {
            out.transparent.push(DrawListEntry {
                entity: id,
                submeshes: transparent,
                distance,
                key: transparent_key(distance, self.sorting),
                order,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::MaterialId;
    use crate::foundation::math::{Transform, Vec3};
    use crate::render::{BlendMode, Material, MeshHandle, ShaderId};
    use crate::scene::{Camera, Mesh, RenderableEntity, Submesh, AABB};

    struct Fixture {
        scene: Scene,
        camera: Camera,
        opaque: MaterialId,
        glass: MaterialId,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        let opaque = scene.materials.insert(Material::new(ShaderId(1)));
        let glass = scene.materials.insert(Material::new(ShaderId(2)).with_blend(BlendMode::Alpha));
        let camera = Camera::perspective(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), 60.0, (800, 600), 0.1, 100.0);
        Fixture { scene, camera, opaque, glass }
    }

    fn unit_box() -> AABB {
        AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0))
    }

    fn spawn(fixture: &mut Fixture, z: f32, submeshes: Vec<Submesh>) -> EntityId {
        let entity = RenderableEntity::new(
            Transform::from_position(Vec3::new(0.0, 0.0, z)),
            Mesh::new(MeshHandle(1), submeshes),
        );
        fixture.scene.spawn(entity).unwrap()
    }

    fn build(fixture: &mut Fixture, visible: &[EntityId]) -> DrawList {
        fixture.scene.refresh_bounds(1.0);
        let sorting = SortingConfig::default();
        let pass = fixture.camera.pass(PassKind::Final);
        DrawListBuilder::new(&fixture.scene, pass, u64::MAX, &sorting).build(visible, 7)
    }

    #[test]
    fn test_mixed_entity_splits_into_both_buckets() {
        let mut f = fixture();
        let (opaque, glass) = (f.opaque, f.glass);
        let id = spawn(
            &mut f,
            -5.0,
            vec![
                Submesh::new(unit_box(), opaque),
                Submesh::new(unit_box(), glass),
                Submesh::new(unit_box(), opaque),
            ],
        );

        let list = build(&mut f, &[id]);
        assert_eq!(list.frame(), 7);
        assert_eq!(list.opaque().len(), 1);
        assert_eq!(list.transparent().len(), 1);
        assert_eq!(list.opaque()[0].submeshes, [0, 2]);
        assert_eq!(list.transparent()[0].submeshes, [1]);
        assert_eq!(list.opaque()[0].entity, list.transparent()[0].entity);
    }

    #[test]
    fn test_no_empty_entries() {
        let mut f = fixture();
        let opaque = f.opaque;
        let id = spawn(&mut f, -5.0, vec![Submesh::new(unit_box(), opaque)]);

        let list = build(&mut f, &[id]);
        assert_eq!(list.len(), 1);
        assert!(list.transparent().is_empty());
    }

    #[test]
    fn test_hidden_and_masked_submeshes_skipped() {
        let mut f = fixture();
        let (opaque, glass) = (f.opaque, f.glass);
        let id = spawn(
            &mut f,
            -5.0,
            vec![
                Submesh::new(unit_box(), opaque).with_flags(SubmeshFlags::HIDDEN),
                Submesh::new(unit_box(), glass).with_layers(0),
            ],
        );

        assert!(build(&mut f, &[id]).is_empty());
    }

    #[test]
    fn test_behind_camera_boundary() {
        let mut f = fixture();
        let opaque = f.opaque;
        // Radius is exactly 1 with no inflation
        let on_boundary = spawn(&mut f, 1.0, vec![Submesh::new(unit_box(), opaque)]);
        let past_boundary = spawn(&mut f, 1.01, vec![Submesh::new(unit_box(), opaque)]);

        let list = build(&mut f, &[on_boundary, past_boundary]);
        assert_eq!(list.len(), 1);
        assert_eq!(list.opaque()[0].entity, on_boundary);
        assert_eq!(list.opaque()[0].distance, -1.0);
    }

    #[test]
    fn test_buckets_sorted_by_distance() {
        let mut f = fixture();
        let (opaque, glass) = (f.opaque, f.glass);
        let ids: Vec<_> = [-20.0, -3.0, -12.0, -7.0]
            .into_iter()
            .map(|z| spawn(&mut f, z, vec![Submesh::new(unit_box(), opaque), Submesh::new(unit_box(), glass)]))
            .collect();

        let list = build(&mut f, &ids);
        let opaque_distances: Vec<_> = list.opaque().iter().map(|e| e.distance).collect();
        let transparent_distances: Vec<_> = list.transparent().iter().map(|e| e.distance).collect();
        assert_eq!(opaque_distances, [3.0, 7.0, 12.0, 20.0]);
        assert_eq!(transparent_distances, [20.0, 12.0, 7.0, 3.0]);

        let keys: Vec<_> = list.concatenated().map(|e| e.key).collect();
        assert!(keys.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
