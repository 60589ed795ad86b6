//! # Render Pipeline
//!
//! Per frame, per active camera:
//!
//! ```text
//! update_draw_list: refresh bounds -> cull -> build buckets -> sort
//! render:           deferred opaque -> lighting composite -> transparency -> output
//! ```
//!
//! `update_draw_list` must run for a camera in the current frame before
//! `render` is called for it. Lists carry the frame they were built in, so a
//! list left over from an earlier frame is never drawn.

pub mod cull;
pub mod draw_list;
pub mod sort;
pub mod parallel;
pub mod gbuffer;
pub mod deferred;
pub mod oit;
mod submit;

#[cfg(test)]
mod scenario_tests;

use crate::config::ConfigError;
use crate::core::{PipelineConfig, TransparencyMode};
use crate::error::{precondition_failed, DeviceResult, PipelineError, PipelineResult};
use crate::foundation::collections::{CameraId, EntityId, SecondaryMap};
use crate::foundation::math::Vec2;
use crate::render::{
    AttachmentFormat, BuiltinShader, DepthAttachment, FrameUniforms, GraphicsDevice, ShaderCache, ShaderId,
    TargetDescriptor, TargetId, TextureId, UniformBinder,
};
use crate::scene::{Camera, CameraPass, EnvironmentMap, PassKind, Scene};

pub use cull::{collect_visible, visible};
pub use draw_list::{DrawList, DrawListBuilder, DrawListEntry};
pub use sort::{opaque_key, sort_bucket, transparent_key};
pub use gbuffer::{GBuffer, GBufferChannel, GBufferClearValues};
pub use deferred::{DeferredPass, DeferredStage, LightingUniforms};
pub use oit::{oit_weight, resolve_pixel, OitBuffers, OitPixel, OitTargets};

use deferred::{CompositeInputs, OpaqueInputs};
use oit::TransparentInputs;

/// Counters for one `render` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Camera passes drawn
    pub passes_rendered: usize,
    /// Camera passes skipped because of a violated precondition or device error
    pub passes_skipped: usize,
    /// Opaque submesh draws
    pub opaque_draws: usize,
    /// Transparent submesh draws
    pub transparent_draws: usize,
    /// Full-screen composite and resolve draws
    pub fullscreen_draws: usize,
}

/// GPU resources and draw lists of one camera
#[derive(Debug, Default)]
struct CameraResources {
    lists: [Option<DrawList>; 3],
    gbuffer: Option<GBuffer>,
    oit: Option<OitTargets>,
    water_targets: [Option<(TargetId, (u32, u32))>; 2],
}

impl CameraResources {
    /// Allocate or resize the geometry buffer and OIT targets
    fn prepare(&mut self, device: &mut dyn GraphicsDevice, size: (u32, u32)) -> DeviceResult<(GBuffer, OitTargets)> {
        let gbuffer = match self.gbuffer {
            Some(mut gbuffer) => {
                gbuffer.ensure_size(device, size)?;
                gbuffer
            }
            None => GBuffer::create(device, size)?,
        };
        self.gbuffer = Some(gbuffer);

        let oit = match self.oit {
            Some(mut oit) => {
                oit.ensure_size(device, size)?;
                oit
            }
            None => OitTargets::create(device, size, gbuffer.target())?,
        };
        self.oit = Some(oit);

        Ok((gbuffer, oit))
    }

    /// Allocate or resize the colour target of a water pass
    fn water_target(&mut self, device: &mut dyn GraphicsDevice, slot: usize, size: (u32, u32)) -> DeviceResult<TargetId> {
        if let Some((target, current)) = self.water_targets[slot] {
            if current != size {
                device.resize_target(target, size)?;
                self.water_targets[slot] = Some((target, size));
            }
            return Ok(target);
        }

        let target = device.create_target(&TargetDescriptor {
            label: if slot == 0 { "reflection" } else { "refraction" },
            size,
            attachments: vec![AttachmentFormat::Rgba8],
            depth: DepthAttachment::Own,
        })?;
        self.water_targets[slot] = Some((target, size));
        Ok(target)
    }

    /// Every allocated target, dependants before the geometry buffer whose depth they share
    fn targets(&self) -> Vec<TargetId> {
        self.oit
            .map(|oit| oit.target())
            .into_iter()
            .chain(self.water_targets.iter().flatten().map(|(target, _)| *target))
            .chain(self.gbuffer.map(|gbuffer| gbuffer.target()))
            .collect()
    }
}

fn destroy_targets(device: &mut dyn GraphicsDevice, targets: impl IntoIterator<Item = TargetId>) {
    for target in targets {
        if let Err(e) = device.destroy_target(target) {
            log::warn!("Failed to destroy {target:?}: {e}");
        }
    }
}

/// Slot of a water pass in the reflection/refraction texture pair
const fn water_slot(kind: PassKind) -> Option<usize> {
    match kind {
        PassKind::Final => None,
        PassKind::Reflection => Some(0),
        PassKind::Refraction => Some(1),
    }
}

/// Targets a pass draws into
#[derive(Debug, Clone, Copy)]
struct PassTargets {
    gbuffer: GBuffer,
    oit: OitTargets,
    output: TargetId,
}

/// Pipeline-wide state shared by every pass
struct Shared<'a> {
    config: &'a PipelineConfig,
    clear_values: &'a GBufferClearValues,
    environment: Option<&'a EnvironmentMap>,
    lighting_shader: ShaderId,
    resolve_shader: ShaderId,
}

/// Culls, sorts and draws scene cameras
#[derive(Debug)]
pub struct RenderPipeline {
    config: PipelineConfig,
    shaders: ShaderCache,
    lighting_shader: ShaderId,
    resolve_shader: ShaderId,
    clear_values: GBufferClearValues,
    environment: Option<EnvironmentMap>,
    binder: UniformBinder,
    cameras: SecondaryMap<CameraId, CameraResources>,
    retired: Vec<TargetId>,
    visible: Vec<EntityId>,
    frame: u64,
}

impl RenderPipeline {
    /// Create a pipeline and compile its built-in shaders
    pub fn new(config: PipelineConfig, device: &mut dyn GraphicsDevice) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut shaders = ShaderCache::new();
        let lighting_shader = shaders.builtin(device, BuiltinShader::LightingComposite);
        let resolve_shader = shaders.builtin(device, BuiltinShader::OitResolve);

        log::info!(
            "Render pipeline ready: transparency {:?}, parallel build {}",
            config.transparency.mode,
            if config.parallel.enabled { "on" } else { "off" }
        );

        Ok(Self {
            config,
            shaders,
            lighting_shader,
            resolve_shader,
            clear_values: GBufferClearValues::new(),
            environment: None,
            binder: UniformBinder::new(),
            cameras: SecondaryMap::new(),
            retired: Vec::new(),
            visible: Vec::new(),
            frame: 0,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Shader cache, for compiling material shaders with fallback
    pub fn shaders_mut(&mut self) -> &mut ShaderCache {
        &mut self.shaders
    }

    /// Current frame number
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Start a new frame; lists from earlier frames become stale
    pub fn begin_frame(&mut self) -> u64 {
        self.frame += 1;
        log::trace!("Begin frame {}", self.frame);
        self.frame
    }

    /// Set the image-based lighting inputs
    ///
    /// Must happen before the first lighting composite.
    pub fn set_environment_map(&mut self, environment: EnvironmentMap) {
        log::info!("Environment map set: {environment:?}");
        self.environment = Some(environment);
    }

    /// Forget a camera's draw lists and destroy its targets
    pub fn release_camera(&mut self, camera: CameraId, device: &mut dyn GraphicsDevice) {
        if let Some(resources) = self.cameras.remove(camera) {
            log::debug!("Releasing resources of camera {camera:?}");
            destroy_targets(device, resources.targets());
        }
    }

    /// Drop resources of cameras no longer in `scene`
    ///
    /// Their targets are destroyed on the next `render`.
    fn retire_removed_cameras(&mut self, scene: &Scene) {
        let retired = &mut self.retired;
        self.cameras.retain(|camera, resources| {
            let alive = scene.camera(camera).is_some();
            if !alive {
                log::debug!("Camera {camera:?} left the scene, retiring its targets");
                retired.extend(resources.targets());
            }
            alive
        });
    }

    /// Rebuild the draw lists of every pass of `camera` for this frame
    ///
    /// Inactive cameras get no lists and are skipped by `render`.
    pub fn update_draw_list(&mut self, scene: &mut Scene, camera_id: CameraId) {
        scene.refresh_bounds(self.config.culling.radius_inflation);
        let scene: &Scene = scene;
        self.retire_removed_cameras(scene);

        let Some(camera) = scene.camera(camera_id) else {
            precondition_failed(&PipelineError::UnknownCamera(camera_id));
            return;
        };

        if !self.cameras.contains_key(camera_id) {
            self.cameras.insert(camera_id, CameraResources::default());
        }
        let Some(resources) = self.cameras.get_mut(camera_id) else {
            return;
        };
        resources.lists = Default::default();

        if !camera.active {
            log::debug!("Camera {camera_id:?} inactive, no draw lists built");
            return;
        }

        for &kind in camera.enabled_passes() {
            let pass = camera.pass(kind);
            let builder = DrawListBuilder::new(scene, pass, camera.render_flags, &self.config.sorting);
            let list = if self.config.parallel.enabled {
                parallel::build_parallel(&builder, &self.config.parallel, self.frame)
            } else {
                self.visible.clear();
                collect_visible(scene, &pass.frustum, &mut self.visible);
                builder.build(&self.visible, self.frame)
            };
            resources.lists[kind.index()] = Some(list);
        }
    }

    /// Draw list of one pass, if built
    pub fn draw_list(&self, camera: CameraId, kind: PassKind) -> Option<&DrawList> {
        self.cameras.get(camera)?.lists[kind.index()].as_ref()
    }

    /// Draw every pass of `camera`, ending with the final pass into `output`
    ///
    /// Never fails: precondition violations and device errors skip the
    /// affected pass and are reported through the log and [`FrameStats`].
    pub fn render(&mut self, scene: &Scene, camera_id: CameraId, output: TargetId, device: &mut dyn GraphicsDevice) -> FrameStats {
        let mut stats = FrameStats::default();
        destroy_targets(device, self.retired.drain(..));

        let Some(camera) = scene.camera(camera_id) else {
            precondition_failed(&PipelineError::UnknownCamera(camera_id));
            return stats;
        };

        let Some(resources) = self.cameras.get_mut(camera_id) else {
            precondition_failed(&PipelineError::DrawListNotBuilt { camera: camera_id, pass: PassKind::Final });
            stats.passes_skipped += camera.enabled_passes().len();
            return stats;
        };

        if resources.lists.iter().all(Option::is_none) && !camera.active {
            log::trace!("Camera {camera_id:?} was inactive when lists were built, skipping");
            return stats;
        }

        let (gbuffer, oit) = match resources.prepare(device, camera.resolution) {
            Ok(targets) => targets,
            Err(e) => {
                log::warn!("{}: {e}", PipelineError::MissingGeometryBuffer(camera_id));
                stats.passes_skipped += camera.enabled_passes().len();
                return stats;
            }
        };

        let shared = Shared {
            config: &self.config,
            clear_values: &self.clear_values,
            environment: self.environment.as_ref(),
            lighting_shader: self.lighting_shader,
            resolve_shader: self.resolve_shader,
        };

        let mut water_maps: [Option<TextureId>; 2] = [None, None];
        for &kind in camera.enabled_passes() {
            let Some(slot) = water_slot(kind) else {
                continue;
            };
            let target = match resources.water_target(device, slot, camera.resolution) {
                Ok(target) => target,
                Err(e) => {
                    log::warn!("{kind:?} target unavailable for camera {camera_id:?}: {e}");
                    stats.passes_skipped += 1;
                    continue;
                }
            };
            if let Err(e) = device.clear_target(target, &[[0.0; 4]], Some(1.0)) {
                log::warn!("Failed to clear {kind:?} target: {e}");
            }

            let job = PassJob {
                camera_id,
                pass: camera.pass(kind),
                list: resources.lists[kind.index()].as_ref(),
                frame: frame_uniforms(scene, camera, camera.pass(kind), [None, None]),
                targets: PassTargets { gbuffer, oit, output: target },
            };
            if job.run(device, scene, self.frame, &shared, &mut self.binder, &mut stats) {
                water_maps[slot] = device.attachment_texture(target, 0).ok();
            }
        }

        let job = PassJob {
            camera_id,
            pass: camera.pass(PassKind::Final),
            list: resources.lists[PassKind::Final.index()].as_ref(),
            frame: frame_uniforms(scene, camera, camera.pass(PassKind::Final), water_maps),
            targets: PassTargets { gbuffer, oit, output },
        };
        job.run(device, scene, self.frame, &shared, &mut self.binder, &mut stats);

        log::trace!("Camera {camera_id:?} frame {}: {stats:?}", self.frame);
        stats
    }
}

#[allow(clippy::cast_precision_loss)]
fn frame_uniforms<'a>(scene: &'a Scene, camera: &Camera, pass: &CameraPass, water_maps: [Option<TextureId>; 2]) -> FrameUniforms<'a> {
    let (width, height) = camera.resolution;
    FrameUniforms {
        view: pass.view,
        projection: pass.projection,
        view_projection: pass.view_projection,
        camera_position: pass.position,
        screen_size: Vec2::new(width as f32, height as f32),
        clip_plane: pass.clip_plane(scene.water_level()),
        sunlight: &scene.sunlight,
        shadow_map: scene.shadow_map.as_ref(),
        skybox: scene.skybox,
        reflection_map: water_maps[0],
        refraction_map: water_maps[1],
    }
}

/// One camera pass ready to draw
struct PassJob<'a> {
    camera_id: CameraId,
    pass: &'a CameraPass,
    list: Option<&'a DrawList>,
    frame: FrameUniforms<'a>,
    targets: PassTargets,
}

impl PassJob<'_> {
    /// Draw the pass if its list is current; returns true if it was drawn
    fn run(
        &self,
        device: &mut dyn GraphicsDevice,
        scene: &Scene,
        current_frame: u64,
        shared: &Shared<'_>,
        binder: &mut UniformBinder,
        stats: &mut FrameStats,
    ) -> bool {
        let Some(list) = self.list.filter(|list| list.frame() == current_frame) else {
            precondition_failed(&PipelineError::DrawListNotBuilt { camera: self.camera_id, pass: self.pass.kind });
            stats.passes_skipped += 1;
            return false;
        };

        match self.execute(device, scene, list, shared, binder, stats) {
            Ok(()) => {
                stats.passes_rendered += 1;
                true
            }
            Err(e) => {
                log::warn!("{:?} pass of camera {:?} incomplete: {e}", self.pass.kind, self.camera_id);
                stats.passes_skipped += 1;
                false
            }
        }
    }

    fn execute(
        &self,
        device: &mut dyn GraphicsDevice,
        scene: &Scene,
        list: &DrawList,
        shared: &Shared<'_>,
        binder: &mut UniformBinder,
        stats: &mut FrameStats,
    ) -> PipelineResult<()> {
        let PassTargets { gbuffer, oit, output } = self.targets;
        let frame = &self.frame;

        let mut deferred = DeferredPass::new();
        deferred.clear_buffers(device, &gbuffer, shared.clear_values)?;
        stats.opaque_draws += deferred.draw_opaque(
            device,
            &OpaqueInputs { scene, entries: list.opaque(), frame, cull_face: self.pass.cull_face },
            binder,
        )?;
        deferred.resolve(device, &gbuffer)?;

        let composite = CompositeInputs {
            scene,
            pass: self.pass,
            environment: shared.environment,
            shader: shared.lighting_shader,
            output,
        };
        match deferred.lighting_composite(device, &gbuffer, &composite) {
            Ok(()) => stats.fullscreen_draws += 1,
            Err(e) => log::warn!("Lighting composite skipped: {e}"),
        }

        if list.transparent().is_empty() {
            return Ok(());
        }

        let transparent = TransparentInputs { scene, entries: list.transparent(), frame, cull_face: self.pass.cull_face };
        match shared.config.transparency.mode {
            TransparencyMode::WeightedBlended => {
                stats.transparent_draws += oit::accumulate_transparent(device, &oit, &transparent, binder)?;
                oit::resolve_transparent(device, &oit, shared.resolve_shader, output, &shared.config.transparency)?;
                stats.fullscreen_draws += 1;
            }
            TransparencyMode::Sorted => {
                stats.transparent_draws +=
                    oit::draw_sorted_transparent(device, gbuffer.target(), output, &transparent, binder)?;
            }
        }
        Ok(())
    }
}
