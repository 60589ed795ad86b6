//! End-to-end frames against the recording device

use super::*;
use crate::core::{OitWeightParams, ParallelConfig};
use crate::foundation::math::{Transform, Vec3, Vec4};
use crate::render::{
    BlendMode, BlendState, Capabilities, Command, DepthMode, Material, MeshHandle, RecordingDevice, RenderState, UniformId,
    UniformLocation, UniformValue,
};
use crate::scene::{Mesh, RenderableEntity, Submesh, AABB};
use approx::assert_relative_eq;

struct Harness {
    scene: Scene,
    device: RecordingDevice,
    pipeline: RenderPipeline,
    camera: CameraId,
    output: TargetId,
}

impl Harness {
    fn new(config: PipelineConfig) -> Self {
        let mut device = RecordingDevice::new();
        let mut pipeline = RenderPipeline::new(config, &mut device).unwrap();
        pipeline.set_environment_map(EnvironmentMap {
            irradiance: device.create_texture(),
            prefiltered: device.create_texture(),
            brdf: device.create_texture(),
        });

        let mut scene = Scene::new();
        let camera = scene.add_camera(Camera::perspective(
            Vec3::zeros(),
            Vec3::new(0.0, 0.0, -1.0),
            60.0,
            (320, 240),
            0.1,
            100.0,
        ));
        let output = device.create_output("output", (320, 240)).unwrap();
        device.take_commands();

        Self { scene, device, pipeline, camera, output }
    }

    /// Sphere of radius 1 at `distance` in front of the camera
    fn sphere(&mut self, distance: f32, blend: BlendMode) -> EntityId {
        let material = self
            .scene
            .materials
            .insert(Material::new(ShaderId(50)).with_blend(blend).with_uniform(UniformId::World, 0));
        let bounds = AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(1.0 / 3f32.sqrt()));
        let entity = RenderableEntity::new(
            Transform::from_position(Vec3::new(0.0, 0.0, -distance)),
            Mesh::new(MeshHandle(1), vec![Submesh::new(bounds, material)]),
        );
        self.scene.spawn(entity).unwrap()
    }

    fn frame(&mut self) -> FrameStats {
        self.pipeline.begin_frame();
        self.pipeline.update_draw_list(&mut self.scene, self.camera);
        self.pipeline.render(&self.scene, self.camera, self.output, &mut self.device)
    }

    fn list(&self, kind: PassKind) -> &DrawList {
        self.pipeline.draw_list(self.camera, kind).unwrap()
    }
}

fn draw_states(commands: &[Command]) -> Vec<(TargetId, RenderState)> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::DrawSubmesh { target, state, .. } | Command::DrawFullscreen { target, state, .. } => {
                Some((*target, *state))
            }
            _ => None,
        })
        .collect()
}

#[test]
fn test_opaque_and_transparent_sphere_scenario() {
    let mut h = Harness::new(PipelineConfig::default());
    let opaque = h.sphere(10.0, BlendMode::None);
    let glass = h.sphere(5.0, BlendMode::Alpha);

    h.pipeline.begin_frame();
    h.pipeline.update_draw_list(&mut h.scene, h.camera);
    let list = h.list(PassKind::Final);

    assert_eq!(list.len(), 2);
    let entries: Vec<_> = list.concatenated().collect();
    assert_eq!(entries[0].entity, opaque);
    assert_eq!(entries[1].entity, glass);

    let sorting = &h.pipeline.config().sorting;
    let (ko, kt) = (entries[0].key, entries[1].key);
    assert!(kt > ko);
    // Distances 10 and 5 encode to +10 and -5 before the offset
    assert_eq!(kt - ko, sorting.transparent_offset - 15 * 1_000_000);
    #[allow(clippy::cast_possible_truncation)]
    let max_key = sorting.max_key_magnitude() as i64;
    assert!(kt - ko >= sorting.transparent_offset - 2 * max_key);
}

#[test]
fn test_frame_command_sequence() {
    let mut h = Harness::new(PipelineConfig::default());
    h.sphere(10.0, BlendMode::None);
    h.sphere(5.0, BlendMode::Alpha);

    let stats = h.frame();
    assert_eq!(
        stats,
        FrameStats {
            passes_rendered: 1,
            passes_skipped: 0,
            opaque_draws: 1,
            transparent_draws: 1,
            fullscreen_draws: 2,
        }
    );

    let commands = h.device.take_commands();
    let clears: Vec<_> = commands
        .iter()
        .filter_map(|c| match c {
            Command::Clear { colours, .. } => Some(colours.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(clears[0], GBufferClearValues::new().colours());
    assert_eq!(clears[1], [OitTargets::ACCUM_CLEAR, OitTargets::REVEAL_CLEAR]);

    let states = draw_states(&commands);
    assert_eq!(states.len(), 4);
    assert_eq!(states[0].1.blend, BlendState::Disabled);
    assert_eq!(states[0].1.depth, DepthMode::OPAQUE);
    assert_eq!(states[1], (h.output, RenderState::fullscreen(states[1].1.shader, BlendState::Alpha)));
    assert_eq!(states[2].1.blend, BlendState::OitAccumulate);
    assert_eq!(states[2].1.depth, DepthMode::READ_ONLY);
    assert_eq!(states[3].0, h.output);
    assert_eq!(states[3].1.blend, BlendState::Alpha);

    let resolve_at = commands.iter().position(|c| matches!(c, Command::Resolve(_))).unwrap();
    let composite_at = commands.iter().position(|c| matches!(c, Command::DrawFullscreen { .. })).unwrap();
    assert!(resolve_at < composite_at);
    assert!(matches!(commands.last(), Some(Command::Invalidate(_))));
}

#[test]
fn test_lighting_composite_binds_inputs() {
    let mut h = Harness::new(PipelineConfig::default());
    h.sphere(10.0, BlendMode::None);
    h.frame();

    let uniforms = h
        .device
        .commands()
        .iter()
        .find_map(|c| match c {
            Command::DrawFullscreen { uniforms, .. } => Some(uniforms.clone()),
            _ => None,
        })
        .unwrap();
    let names: Vec<_> = uniforms
        .iter()
        .filter_map(|u| match u.location {
            UniformLocation::Named(name) => Some(name),
            UniformLocation::Slot(_) => None,
        })
        .collect();
    for expected in ["u_normalMap", "u_positionMap", "u_diffuseMap", "u_maskMap", "u_irradianceMap", "u_prefilterMap", "u_brdfMap", "u_lighting"] {
        assert!(names.contains(&expected), "missing {expected}");
    }
}

#[test]
fn test_opaque_only_frame_skips_transparency() {
    let mut h = Harness::new(PipelineConfig::default());
    h.sphere(10.0, BlendMode::None);
    let stats = h.frame();
    assert_eq!(stats.fullscreen_draws, 1);
    assert!(!h.device.commands().iter().any(|c| matches!(c, Command::Invalidate(_))));
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "Precondition violated"))]
fn test_render_before_update_is_a_precondition_violation() {
    let mut h = Harness::new(PipelineConfig::default());
    h.sphere(10.0, BlendMode::None);
    h.pipeline.begin_frame();
    let stats = h.pipeline.render(&h.scene, h.camera, h.output, &mut h.device);
    assert_eq!(stats.passes_rendered, 0);
    assert_eq!(stats.passes_skipped, 1);
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "Precondition violated"))]
fn test_stale_list_is_not_reused() {
    let mut h = Harness::new(PipelineConfig::default());
    h.sphere(10.0, BlendMode::None);
    h.frame();

    h.pipeline.begin_frame();
    let stats = h.pipeline.render(&h.scene, h.camera, h.output, &mut h.device);
    assert_eq!(stats.passes_skipped, 1);
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "Precondition violated"))]
fn test_missing_environment_map() {
    let mut device = RecordingDevice::new();
    let mut pipeline = RenderPipeline::new(PipelineConfig::default(), &mut device).unwrap();
    let mut scene = Scene::new();
    let camera = scene.add_camera(Camera::perspective(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), 60.0, (64, 64), 0.1, 100.0));

    pipeline.begin_frame();
    pipeline.update_draw_list(&mut scene, camera);
    let stats = pipeline.render(&scene, camera, TargetId::SCREEN, &mut device);
    assert_eq!(stats.fullscreen_draws, 0);
}

#[test]
fn test_inactive_camera_is_skipped() {
    let mut h = Harness::new(PipelineConfig::default());
    h.sphere(10.0, BlendMode::None);
    h.scene.camera_mut(h.camera).unwrap().active = false;

    assert_eq!(h.frame(), FrameStats::default());
    assert_eq!(h.device.submesh_draws(), 0);

    h.scene.camera_mut(h.camera).unwrap().active = true;
    assert_eq!(h.frame().opaque_draws, 1);
}

#[test]
fn test_failed_builtin_shader_falls_back() {
    let mut device = RecordingDevice::new();
    device.fail_shader(BuiltinShader::LightingComposite.name());
    let mut pipeline = RenderPipeline::new(PipelineConfig::default(), &mut device).unwrap();

    assert!(pipeline.shaders_mut().is_fallback(BuiltinShader::LightingComposite.name()));
    assert_ne!(pipeline.lighting_shader, ShaderId::NULL);
    assert_ne!(pipeline.lighting_shader, pipeline.resolve_shader);
}

#[test]
fn test_lazy_bounds_follow_moved_entity() {
    let mut h = Harness::new(PipelineConfig::default());
    let id = h.sphere(10.0, BlendMode::None);
    assert_eq!(h.frame().opaque_draws, 1);

    let behind = Transform::from_position(Vec3::new(0.0, 0.0, 10.0));
    h.scene.entity_mut(id).unwrap().set_transform(behind);
    assert!(h.scene.entity(id).unwrap().bounds_dirty());
    assert_eq!(h.frame().opaque_draws, 0);
    assert!(!h.scene.entity(id).unwrap().bounds_dirty());
}

#[test]
fn test_sorted_mode_blends_into_output() {
    let config = PipelineConfig::default().with_transparency_mode(TransparencyMode::Sorted);
    let mut h = Harness::new(config);
    h.sphere(5.0, BlendMode::Additive);
    h.sphere(8.0, BlendMode::Alpha);

    let stats = h.frame();
    assert_eq!(stats.transparent_draws, 2);
    assert_eq!(stats.fullscreen_draws, 1);

    let states = draw_states(h.device.commands());
    let transparent: Vec<_> = states.iter().filter(|(_, s)| s.depth == DepthMode::READ_ONLY).collect();
    // Back to front: the farther alpha sphere first
    assert_eq!(transparent[0].1.blend, BlendState::Alpha);
    assert_eq!(transparent[1].1.blend, BlendState::Additive);
    assert!(transparent.iter().all(|(target, _)| *target == h.output));
}

#[test]
fn test_sorted_mode_tests_against_opaque_depth() {
    let config = PipelineConfig::default().with_transparency_mode(TransparencyMode::Sorted);
    let mut h = Harness::new(config);
    h.sphere(5.0, BlendMode::None);
    h.sphere(20.0, BlendMode::Alpha);

    let stats = h.frame();
    assert_eq!(stats.transparent_draws, 1);

    let commands = h.device.take_commands();
    let gbuffer = match commands.iter().find(|c| matches!(c, Command::DrawSubmesh { .. })) {
        Some(Command::DrawSubmesh { target, .. }) => *target,
        _ => panic!("no opaque draw recorded"),
    };
    assert_ne!(gbuffer, h.output);

    let copy_at = commands
        .iter()
        .position(|c| *c == Command::CopyDepth { source: gbuffer, destination: h.output })
        .unwrap();
    let glass_at = commands
        .iter()
        .rposition(|c| matches!(c, Command::DrawSubmesh { target, .. } if *target == h.output))
        .unwrap();
    let composite_at = commands.iter().position(|c| matches!(c, Command::DrawFullscreen { .. })).unwrap();
    assert!(composite_at < copy_at);
    assert!(copy_at < glass_at);
}

#[test]
fn test_released_camera_destroys_its_targets() {
    let mut h = Harness::new(PipelineConfig::default());
    h.sphere(10.0, BlendMode::None);
    h.scene.camera_mut(h.camera).unwrap().water_passes = true;
    h.frame();
    h.device.take_commands();

    h.pipeline.release_camera(h.camera, &mut h.device);
    let destroyed: Vec<_> = h
        .device
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::DestroyTarget(target) => Some(*target),
            _ => None,
        })
        .collect();
    // OIT, reflection, refraction, then the geometry buffer they share depth with
    assert_eq!(destroyed.len(), 4);
    assert!(destroyed.iter().all(|target| h.device.target_size(*target).is_none()));
    assert!(h.pipeline.draw_list(h.camera, PassKind::Final).is_none());

    h.pipeline.release_camera(h.camera, &mut h.device);
    assert_eq!(h.device.commands().len(), 4);
}

#[test]
fn test_removed_camera_targets_are_reclaimed() {
    let mut h = Harness::new(PipelineConfig::default());
    h.sphere(10.0, BlendMode::None);
    let second = h.scene.add_camera(Camera::perspective(
        Vec3::zeros(),
        Vec3::new(0.0, 0.0, -1.0),
        60.0,
        (320, 240),
        0.1,
        100.0,
    ));

    h.frame();
    h.pipeline.update_draw_list(&mut h.scene, second);
    h.pipeline.render(&h.scene, second, h.output, &mut h.device);
    assert!(h.pipeline.draw_list(second, PassKind::Final).is_some());
    h.device.take_commands();

    h.scene.remove_camera(second);
    h.frame();
    let destroyed = h.device.commands().iter().filter(|c| matches!(c, Command::DestroyTarget(_))).count();
    assert_eq!(destroyed, 2);
    assert!(h.pipeline.draw_list(second, PassKind::Final).is_none());
}

#[test]
fn test_parallel_pipeline_matches_sequential() {
    let mut sequential = Harness::new(PipelineConfig::default());
    let parallel_config = PipelineConfig {
        parallel: ParallelConfig { enabled: true, worker_count: 3, min_entities_per_worker: 4 },
        ..PipelineConfig::default()
    };
    let mut parallel = Harness::new(parallel_config);

    for i in 0..40u8 {
        let distance = 2.0 + f32::from(i % 13) * 1.5;
        let blend = if i % 4 == 0 { BlendMode::Alpha } else { BlendMode::None };
        sequential.sphere(distance, blend);
        parallel.sphere(distance, blend);
    }

    let a = sequential.frame();
    let b = parallel.frame();
    assert_eq!(a, b);

    let summary = |h: &Harness| -> Vec<(i64, usize)> {
        h.list(PassKind::Final).concatenated().map(|e| (e.key, e.submeshes.len())).collect()
    };
    assert_eq!(summary(&sequential), summary(&parallel));
}

#[test]
fn test_water_passes_feed_final_pass() {
    let mut h = Harness::new(PipelineConfig::default());
    let water = h.scene.materials.insert(
        Material::new(ShaderId(60))
            .with_capabilities(Capabilities::REFLECTION_MAP | Capabilities::REFRACTION_MAP)
            .with_uniform(UniformId::ReflectionMap, 7)
            .with_uniform(UniformId::RefractionMap, 8),
    );
    let bounds = AABB::from_center_extents(Vec3::zeros(), Vec3::new(5.0, 0.1, 5.0));
    h.scene
        .spawn(RenderableEntity::new(
            Transform::from_position(Vec3::new(0.0, -1.0, -10.0)),
            Mesh::new(MeshHandle(9), vec![Submesh::new(bounds, water)]),
        ))
        .unwrap();
    h.scene.camera_mut(h.camera).unwrap().water_passes = true;

    let stats = h.frame();
    assert_eq!(stats.passes_rendered, 3);

    let water_draw = h
        .device
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::DrawSubmesh { target, uniforms, clip_plane, .. } => Some((*target, uniforms.clone(), *clip_plane)),
            _ => None,
        })
        .last()
        .unwrap();
    let bound_slots: Vec<_> = water_draw
        .1
        .iter()
        .filter(|u| matches!(u.value, UniformValue::Texture { .. }))
        .map(|u| u.location)
        .collect();
    assert_eq!(bound_slots, [UniformLocation::Slot(7), UniformLocation::Slot(8)]);
    // The final pass has no clip plane
    assert_eq!(water_draw.2, [0.0; 4]);
}

#[test]
fn test_resolution_change_resizes_buffers() {
    let mut h = Harness::new(PipelineConfig::default());
    h.sphere(10.0, BlendMode::None);
    h.frame();
    h.scene.camera_mut(h.camera).unwrap().set_resolution((640, 480), 0.0);
    h.frame();

    let resizes = h.device.commands().iter().filter(|c| matches!(c, Command::ResizeTarget { .. })).count();
    assert_eq!(resizes, 2);
}

#[test]
fn test_overlapping_quads_are_order_independent() {
    let params = OitWeightParams::default();
    let red = (Vec3::new(1.0, 0.0, 0.0), 0.5, 0.2);
    let blue = (Vec3::new(0.0, 0.0, 1.0), 0.5, 0.6);

    let mut forward = OitBuffers::new(1, 1);
    let mut reversed = OitBuffers::new(1, 1);
    for (colour, alpha, depth) in [red, blue] {
        forward.accumulate_fragment(0, 0, colour, alpha, depth, &params);
    }
    for (colour, alpha, depth) in [blue, red] {
        reversed.accumulate_fragment(0, 0, colour, alpha, depth, &params);
    }

    let background = Vec4::new(0.0, 1.0, 0.0, 1.0);
    let mut a = vec![background];
    let mut b = vec![background];
    forward.resolve_into(&mut a, 1e-5);
    reversed.resolve_into(&mut b, 1e-5);
    assert_relative_eq!(a[0], b[0], epsilon = 1e-5);
    assert_relative_eq!(a[0].y, 0.25, epsilon = 1e-5);
}

#[test]
fn test_resolve_is_idempotent() {
    let params = OitWeightParams::default();
    let mut buffers = OitBuffers::new(2, 1);
    buffers.accumulate_fragment(0, 0, Vec3::new(0.2, 0.4, 0.6), 0.3, 0.5, &params);
    buffers.accumulate_fragment(0, 0, Vec3::new(0.9, 0.1, 0.1), 0.7, 0.1, &params);

    let first = buffers.resolve(1e-5);
    let second = buffers.resolve(1e-5);
    assert_eq!(first, second);
    assert!(first[0].is_some());
    assert!(first[1].is_none());
}

#[test]
fn test_cleared_buffers_discard_everywhere() {
    let params = OitWeightParams::default();
    let mut buffers = OitBuffers::new(3, 2);
    buffers.accumulate_fragment(1, 1, Vec3::repeat(1.0), 0.8, 0.4, &params);
    buffers.clear();

    assert!(buffers.resolve(1e-5).iter().all(Option::is_none));

    let image: Vec<_> = (0u8..6).map(|i| Vec4::repeat(f32::from(i) / 6.0)).collect();
    let mut composited = image.clone();
    buffers.resolve_into(&mut composited, 1e-5);
    assert_eq!(composited, image);
}
