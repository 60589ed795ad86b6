//! Headless pipeline demo
//!
//! Builds a small scene with a ring of opaque crates, a few glass panes and
//! a camera orbiting above a water plane, then runs a handful of frames
//! against the recording device and logs what each frame submitted.

use render_pipeline::foundation::logging;
use render_pipeline::prelude::*;
use render_pipeline::render::Command;

const CONFIG_PATH: &str = "pipeline_demo.toml";
const FRAMES: u32 = 8;
const RING_SIZE: usize = 12;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::load_or_default(CONFIG_PATH)?;
    logging::init_with_level(&config.log_level);
    log::info!("Starting pipeline demo ({:?} transparency)", config.transparency.mode);

    let mut device = RecordingDevice::new();
    let mut pipeline = RenderPipeline::new(config, &mut device)?;
    pipeline.set_environment_map(EnvironmentMap {
        irradiance: device.create_texture(),
        prefiltered: device.create_texture(),
        brdf: device.create_texture(),
    });

    let mut scene = Scene::new();
    scene.set_water_level(0.0);
    scene.skybox = Some(device.create_texture());
    populate(&mut scene)?;

    let mut camera = Camera::perspective(Vec3::new(0.0, 6.0, 20.0), Vec3::zeros(), 60.0, (1280, 720), 0.1, 500.0);
    camera.water_passes = true;
    let camera_id = scene.add_camera(camera);
    let output = device.create_output("screen", (1280, 720))?;

    for frame in 0..FRAMES {
        let angle = frame as f32 / FRAMES as f32 * std::f32::consts::TAU;
        let position = Vec3::new(20.0 * angle.sin(), 6.0, 20.0 * angle.cos());
        let water_level = scene.water_level();
        if let Some(camera) = scene.camera_mut(camera_id) {
            camera.look_at(position, Vec3::zeros(), water_level);
        }

        pipeline.begin_frame();
        pipeline.update_draw_list(&mut scene, camera_id);
        let stats = pipeline.render(&scene, camera_id, output, &mut device);

        let commands = device.take_commands();
        let clears = commands.iter().filter(|c| matches!(c, Command::Clear { .. })).count();
        log::info!(
            "Frame {}: {} passes, {} opaque, {} transparent, {} fullscreen, {} clears",
            pipeline.frame(),
            stats.passes_rendered,
            stats.opaque_draws,
            stats.transparent_draws,
            stats.fullscreen_draws,
            clears
        );
    }

    log::info!("Pipeline demo finished");
    Ok(())
}

/// Ring of opaque crates plus glass panes in front of every third one
fn populate(scene: &mut Scene) -> Result<(), Box<dyn std::error::Error>> {
    let crate_material = scene.materials.insert(
        Material::new(ShaderId(100))
            .with_uniform(UniformId::World, 0)
            .with_uniform(UniformId::ViewProjection, 1),
    );
    let glass_material = scene.materials.insert(
        Material::new(ShaderId(101))
            .with_blend(BlendMode::Alpha)
            .with_capabilities(Capabilities::SUNLIGHT_DIRECTION | Capabilities::SUNLIGHT_COLOUR)
            .with_uniform(UniformId::World, 0)
            .with_uniform(UniformId::ViewProjection, 1)
            .with_uniform(UniformId::SunlightDirection, 2)
            .with_uniform(UniformId::SunlightColour, 3),
    );

    let crate_bounds = AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(1.0));
    let pane_bounds = AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.5, 1.5, 0.05));

    for i in 0..RING_SIZE {
        let angle = i as f32 / RING_SIZE as f32 * std::f32::consts::TAU;
        let position = Vec3::new(8.0 * angle.cos(), 1.0, 8.0 * angle.sin());
        scene.spawn(RenderableEntity::new(
            Transform::from_position(position),
            Mesh::new(MeshHandle(1), vec![Submesh::new(crate_bounds, crate_material)]),
        ))?;

        if i % 3 == 0 {
            scene.spawn(RenderableEntity::new(
                Transform::from_position(position * 0.75 + Vec3::new(0.0, 0.5, 0.0)),
                Mesh::new(MeshHandle(2), vec![Submesh::new(pane_bounds, glass_material)]),
            ))?;
        }
    }

    log::info!("Spawned {} entities", scene.entity_count());
    Ok(())
}
