//! Renderable entity representation
//!
//! The scene owns entities; the pipeline only ever refers to them by
//! [`EntityId`](crate::foundation::collections::EntityId) for the duration of a frame.

use bitflags::bitflags;

use crate::foundation::collections::MaterialId;
use crate::foundation::math::{Mat4, Transform, Vec3};
use crate::render::MeshHandle;
use crate::scene::bounds::{AABB, BoundingSphere};

bitflags! {
    /// Per-submesh render flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SubmeshFlags: u8 {
        /// Skip this submesh entirely
        const HIDDEN = 1 << 0;
        /// Disable back-face culling for this submesh
        const DOUBLE_SIDED = 1 << 1;
    }
}

/// Render-layer mask matching every camera
pub const ALL_LAYERS: u64 = u64::MAX;

/// One drawable section of a mesh with its own material
#[derive(Debug, Clone, PartialEq)]
pub struct Submesh {
    /// Mesh-local bounds of this submesh
    pub bounds: AABB,
    /// Material used to draw this submesh
    pub material: MaterialId,
    /// Visibility and rasterization flags
    pub flags: SubmeshFlags,
    /// Layers this submesh is drawn on; ANDed with the camera's render flags
    pub render_layers: u64,
}

impl Submesh {
    /// Create a submesh visible on every layer
    pub fn new(bounds: AABB, material: MaterialId) -> Self {
        Self {
            bounds,
            material,
            flags: SubmeshFlags::empty(),
            render_layers: ALL_LAYERS,
        }
    }

    /// Builder-style flag setter
    pub fn with_flags(mut self, flags: SubmeshFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Builder-style layer setter
    pub fn with_layers(mut self, layers: u64) -> Self {
        self.render_layers = layers;
        self
    }

    /// Bounding sphere of this submesh in mesh-local space
    pub fn local_sphere(&self) -> BoundingSphere {
        BoundingSphere::from_aabb(&self.bounds)
    }
}

/// Mesh reference plus per-submesh data
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Device-side geometry handle
    pub handle: MeshHandle,
    /// Submeshes, indexed by draw-list submesh indices
    pub submeshes: Vec<Submesh>,
}

impl Mesh {
    /// Create a mesh
    pub fn new(handle: MeshHandle, submeshes: Vec<Submesh>) -> Self {
        Self { handle, submeshes }
    }

    /// Union of all submesh bounds
    pub fn bounds(&self) -> Option<AABB> {
        self.submeshes
            .iter()
            .map(|submesh| submesh.bounds)
            .reduce(|acc, bounds| acc.union(&bounds))
    }
}

/// Cached bounding volumes, recomputed only when marked dirty
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CachedBounds {
    pub(crate) local: BoundingSphere,
    pub(crate) world: BoundingSphere,
    pub(crate) dirty: bool,
}

/// A scene entity with a world transform and a mesh
#[derive(Debug, Clone)]
pub struct RenderableEntity {
    transform: Transform,
    world_matrix: Mat4,
    mesh: Mesh,
    /// Hides the whole entity regardless of submesh flags
    pub hidden: bool,
    /// Joint matrices for skinned meshes
    pub skeleton: Option<Vec<Mat4>>,
    pub(crate) bounds: CachedBounds,
}

impl RenderableEntity {
    /// Create an entity
    pub fn new(transform: Transform, mesh: Mesh) -> Self {
        let empty = BoundingSphere::new(transform.position, 0.0);
        Self {
            world_matrix: transform.to_matrix(),
            transform,
            mesh,
            hidden: false,
            skeleton: None,
            bounds: CachedBounds { local: empty, world: empty, dirty: true },
        }
    }

    /// World transform
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// World matrix derived from the transform
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    /// World-space position
    pub fn world_position(&self) -> Vec3 {
        self.transform.position
    }

    /// Mesh data
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Replace the transform and mark the bounds dirty
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.world_matrix = transform.to_matrix();
        self.bounds.dirty = true;
    }

    /// Replace a submesh's local bounds and mark the bounds dirty
    ///
    /// Returns false if the submesh index is out of range.
    pub fn set_submesh_bounds(&mut self, submesh: usize, bounds: AABB) -> bool {
        match self.mesh.submeshes.get_mut(submesh) {
            Some(target) => {
                if target.bounds != bounds {
                    target.bounds = bounds;
                    self.bounds.dirty = true;
                }
                true
            }
            None => false,
        }
    }

    /// Mutable access to submesh flags; does not affect bounds
    pub fn submesh_flags_mut(&mut self, submesh: usize) -> Option<&mut SubmeshFlags> {
        self.mesh.submeshes.get_mut(submesh).map(|s| &mut s.flags)
    }

    /// True if the cached bounds need recomputing before the next cull
    pub fn bounds_dirty(&self) -> bool {
        self.bounds.dirty
    }

    /// Cached world-space bounding sphere (inflated)
    ///
    /// Only meaningful after [`crate::scene::Scene::refresh_bounds`].
    pub fn world_sphere(&self) -> &BoundingSphere {
        &self.bounds.world
    }

    /// Recompute cached spheres if dirty; returns true if work was done
    pub(crate) fn refresh_bounds(&mut self, inflation: f32) -> bool {
        if !self.bounds.dirty {
            return false;
        }

        let local = self
            .mesh
            .bounds()
            .map_or(BoundingSphere::new(Vec3::zeros(), 0.0), |aabb| BoundingSphere::from_aabb(&aabb));

        self.bounds.local = local;
        self.bounds.world = local.to_world(&self.world_matrix, self.transform.mean_scale(), inflation);
        self.bounds.dirty = false;
        true
    }
}
