//! # Camera and Camera Passes
//!
//! A camera renders up to three passes per frame. The final pass is what
//! ends up on screen; the reflection and refraction passes feed water-style
//! materials and are only built when the camera asks for them.
//!
//! ## Coordinate System
//! Right-handed, Y-up, looking down -Z in view space, OpenGL clip depth.

use crate::foundation::math::{Vec3, Vec4, Mat4, Mat4Ext, utils};
use crate::render::CullFace;
use crate::scene::bounds::Frustum;

/// Which of a camera's passes is being built or drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PassKind {
    /// The on-screen pass
    Final,
    /// Mirrored about the water plane
    Reflection,
    /// Same view as final, clipped above the water plane
    Refraction,
}

impl PassKind {
    /// All passes in build order
    pub const ALL: [Self; 3] = [Self::Final, Self::Reflection, Self::Refraction];

    /// Stable array index for per-pass storage
    pub const fn index(self) -> usize {
        match self {
            Self::Final => 0,
            Self::Reflection => 1,
            Self::Refraction => 2,
        }
    }

    /// Sign applied to the water clip plane
    pub const fn clip_plane_multiplier(self) -> f32 {
        match self {
            Self::Final => 0.0,
            Self::Reflection => 1.0,
            Self::Refraction => -1.0,
        }
    }
}

/// Matrices and culling data for one pass of a camera
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPass {
    /// Pass identity
    pub kind: PassKind,
    /// View matrix
    pub view: Mat4,
    /// Projection matrix
    pub projection: Mat4,
    /// Cached `projection * view`
    pub view_projection: Mat4,
    /// Frustum extracted from `view_projection`
    pub frustum: Frustum,
    /// World-space viewing direction
    pub forward: Vec3,
    /// World-space eye position for this pass
    pub position: Vec3,
    /// Face culled when drawing opaque geometry
    pub cull_face: CullFace,
}

impl CameraPass {
    fn new(kind: PassKind, view: Mat4, projection: Mat4, position: Vec3) -> Self {
        let view_projection = projection * view;
        Self {
            kind,
            view,
            projection,
            view_projection,
            frustum: Frustum::from_matrix(&view_projection),
            forward: view.forward_vector(),
            position,
            // Mirroring flips triangle winding
            cull_face: if kind == PassKind::Reflection { CullFace::Front } else { CullFace::Back },
        }
    }

    /// User clip plane for this pass against the water surface
    pub fn clip_plane(&self, water_level: f32) -> Vec4 {
        let multiplier = self.kind.clip_plane_multiplier();
        Vec4::new(0.0, 1.0, 0.0, -water_level + 0.08 * multiplier) * multiplier
    }
}

/// Perspective camera with per-pass matrices
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Point the camera is looking at in world space
    pub target: Vec3,
    /// Up vector for camera orientation
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov: f32,
    /// Distance to near clipping plane
    pub near: f32,
    /// Distance to far clipping plane
    pub far: f32,
    /// Output resolution in pixels
    pub resolution: (u32, u32),
    /// Inactive cameras are skipped by the pipeline
    pub active: bool,
    /// Layer mask ANDed with submesh render layers
    pub render_flags: u64,
    /// Also build and draw reflection and refraction passes
    pub water_passes: bool,
    passes: [CameraPass; 3],
}

impl Camera {
    /// Create a new perspective camera looking at `target`
    pub fn perspective(position: Vec3, target: Vec3, fov_degrees: f32, resolution: (u32, u32), near: f32, far: f32) -> Self {
        let placeholder = CameraPass::new(PassKind::Final, Mat4::identity(), Mat4::identity(), position);
        let mut camera = Self {
            position,
            target,
            up: Vec3::y(),
            fov: utils::deg_to_rad(fov_degrees),
            near,
            far,
            resolution,
            active: true,
            render_flags: u64::MAX,
            water_passes: false,
            passes: [placeholder.clone(), placeholder.clone(), placeholder],
        };
        camera.update_passes(0.0);
        camera
    }

    /// Width over height of the output
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect(&self) -> f32 {
        let (width, height) = self.resolution;
        width.max(1) as f32 / height.max(1) as f32
    }

    /// View matrix of the final pass
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// Projection matrix shared by all passes
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov, self.aspect(), self.near, self.far)
    }

    /// Move the camera and refresh its passes
    pub fn look_at(&mut self, position: Vec3, target: Vec3, water_level: f32) {
        self.position = position;
        self.target = target;
        self.update_passes(water_level);
    }

    /// Change the output resolution and refresh its passes
    pub fn set_resolution(&mut self, resolution: (u32, u32), water_level: f32) {
        self.resolution = resolution;
        self.update_passes(water_level);
    }

    /// Rebuild matrices and frusta for every pass
    ///
    /// Must be called after any change to the camera's placement or lens.
    pub fn update_passes(&mut self, water_level: f32) {
        let view = self.view_matrix();
        let projection = self.projection_matrix();

        // Reflect world space about y = water_level before viewing
        let mut mirror = Mat4::identity();
        mirror[(1, 1)] = -1.0;
        mirror[(1, 3)] = 2.0 * water_level;
        let mirrored_position = Vec3::new(self.position.x, 2.0 * water_level - self.position.y, self.position.z);

        self.passes = [
            CameraPass::new(PassKind::Final, view, projection, self.position),
            CameraPass::new(PassKind::Reflection, view * mirror, projection, mirrored_position),
            CameraPass::new(PassKind::Refraction, view, projection, self.position),
        ];
        log::trace!("Camera passes updated: pos={:?}, target={:?}", self.position, self.target);
    }

    /// Access one pass
    pub fn pass(&self, kind: PassKind) -> &CameraPass {
        &self.passes[kind.index()]
    }

    /// Passes the pipeline should build this frame
    pub fn enabled_passes(&self) -> &'static [PassKind] {
        if self.water_passes {
            &PassKind::ALL
        } else {
            &[PassKind::Final]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera() -> Camera {
        Camera::perspective(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 2.0, -1.0), 60.0, (800, 600), 0.1, 100.0)
    }

    #[test]
    fn test_final_pass_forward() {
        let camera = camera();
        assert_relative_eq!(camera.pass(PassKind::Final).forward, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_reflection_pass_mirrors_about_water() {
        let mut camera = Camera::perspective(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 1.0, -1.0), 60.0, (800, 600), 0.1, 100.0);
        camera.update_passes(0.5);
        let reflection = camera.pass(PassKind::Reflection);
        let final_pass = camera.pass(PassKind::Final);

        assert_relative_eq!(reflection.position, Vec3::new(0.0, -1.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(reflection.forward.y, -final_pass.forward.y, epsilon = 1e-6);
        assert_eq!(reflection.cull_face, CullFace::Front);
        assert_eq!(final_pass.cull_face, CullFace::Back);
    }

    #[test]
    fn test_clip_planes_per_pass() {
        let camera = camera();
        assert_eq!(camera.pass(PassKind::Final).clip_plane(1.0), Vec4::zeros());

        let reflection = camera.pass(PassKind::Reflection).clip_plane(1.0);
        assert_relative_eq!(reflection, Vec4::new(0.0, 1.0, 0.0, -0.92), epsilon = 1e-6);

        let refraction = camera.pass(PassKind::Refraction).clip_plane(1.0);
        assert_relative_eq!(refraction, Vec4::new(0.0, -1.0, 0.0, 1.08), epsilon = 1e-6);
    }

    #[test]
    fn test_enabled_passes() {
        let mut camera = camera();
        assert_eq!(camera.enabled_passes(), &[PassKind::Final]);
        camera.water_passes = true;
        assert_eq!(camera.enabled_passes().len(), 3);
    }
}
