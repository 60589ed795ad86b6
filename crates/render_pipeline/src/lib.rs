//! # Render Pipeline
//!
//! Visibility, draw-list and compositing pipeline for a real-time 3D scene
//! renderer.
//!
//! ## Features
//!
//! - **Culling**: bounding spheres against per-pass frustum planes, with
//!   lazily refreshed bounds
//! - **Draw Lists**: opaque and transparent buckets per camera pass with
//!   fixed-point depth keys, optionally built on worker threads
//! - **Deferred Shading**: geometry buffer plus one full-screen lighting
//!   composite
//! - **Transparency**: weighted-blended order-independent transparency
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_pipeline::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut device = RecordingDevice::new();
//!     let mut pipeline = RenderPipeline::new(PipelineConfig::default(), &mut device)?;
//!     pipeline.set_environment_map(EnvironmentMap {
//!         irradiance: device.create_texture(),
//!         prefiltered: device.create_texture(),
//!         brdf: device.create_texture(),
//!     });
//!
//!     let mut scene = Scene::new();
//!     let camera = scene.add_camera(Camera::perspective(
//!         Vec3::new(0.0, 1.0, 5.0),
//!         Vec3::zeros(),
//!         60.0,
//!         (1280, 720),
//!         0.1,
//!         500.0,
//!     ));
//!
//!     pipeline.begin_frame();
//!     pipeline.update_draw_list(&mut scene, camera);
//!     let stats = pipeline.render(&scene, camera, TargetId::SCREEN, &mut device);
//!     println!("{stats:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod core;
pub mod config;
pub mod error;
pub mod foundation;
pub mod scene;
pub mod render;
pub mod pipeline;

pub use error::{DeviceError, DeviceResult, PipelineError, PipelineResult};
pub use pipeline::{FrameStats, RenderPipeline};

/// Common imports for pipeline users
pub mod prelude {
    pub use crate::{
        FrameStats, RenderPipeline,
        config::Config,
        core::{PipelineConfig, TransparencyMode},
        foundation::{
            collections::{CameraId, EntityId, MaterialId},
            math::{Vec3, Vec4, Mat4, Transform},
        },
        render::{
            BlendMode, Capabilities, GraphicsDevice, Material, MeshHandle, RecordingDevice, ShaderId,
            TargetId, UniformId,
        },
        scene::{Camera, EnvironmentMap, Mesh, PassKind, RenderableEntity, Scene, Submesh, AABB},
    };
}
