//! # Deferred Geometry and Lighting
//!
//! Opaque geometry is drawn into the [`GBuffer`], which is then resolved and
//! lit by one full-screen composite pass. The stages run strictly in order:
//!
//! `ClearBuffers -> DrawOpaque -> ResolveGBuffer -> LightingComposite`
//!
//! The composite is alpha blended so the output's existing contents (sky,
//! earlier passes) stay visible wherever the geometry buffer holds no data.

use bytemuck::{Pod, Zeroable};

use crate::error::{precondition_failed, PipelineError, PipelineResult};
use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::pipeline::draw_list::DrawListEntry;
use crate::pipeline::gbuffer::{GBuffer, GBufferChannel, GBufferClearValues};
use crate::pipeline::submit::submit_entries;
use crate::render::{
    BlendState, CullFace, FrameUniforms, FullscreenDraw, GraphicsDevice, RenderState, ShaderId, TargetId,
    UniformBinder, UniformBinding, UniformValue,
};
use crate::scene::{CameraPass, EnvironmentMap, Scene, SubmeshFlags};

/// Stages of the deferred pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredStage {
    /// Clear every geometry buffer channel to its own value
    ClearBuffers,
    /// Draw opaque entries front to back
    DrawOpaque,
    /// Make the geometry buffer sampleable
    ResolveGBuffer,
    /// Full-screen lighting into the output
    LightingComposite,
}

impl DeferredStage {
    /// Stage name for diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            Self::ClearBuffers => "ClearBuffers",
            Self::DrawOpaque => "DrawOpaque",
            Self::ResolveGBuffer => "ResolveGBuffer",
            Self::LightingComposite => "LightingComposite",
        }
    }

    const fn next(self) -> Option<Self> {
        match self {
            Self::ClearBuffers => Some(Self::DrawOpaque),
            Self::DrawOpaque => Some(Self::ResolveGBuffer),
            Self::ResolveGBuffer => Some(Self::LightingComposite),
            Self::LightingComposite => None,
        }
    }
}

/// Lighting composite constants, uploaded as one uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightingUniforms {
    /// View space to world space
    pub inverse_view: [[f32; 4]; 4],
    /// World space to shadow map clip space
    pub light_projection: [[f32; 4]; 4],
    /// Sun direction in world space, w unused
    pub light_direction: [f32; 4],
    /// Sun colour
    pub light_colour: [f32; 4],
    /// Eye position in world space, w unused
    pub camera_position: [f32; 4],
}

impl LightingUniforms {
    /// Gather the constants for one camera pass
    pub fn new(pass: &CameraPass, scene: &Scene) -> Self {
        let inverse_view = pass.view.try_inverse().unwrap_or_else(Mat4::identity);
        let light_projection = scene.shadow_map.map_or_else(Mat4::identity, |shadow| shadow.light_projection);
        Self {
            inverse_view: inverse_view.into(),
            light_projection: light_projection.into(),
            light_direction: extend(scene.sunlight.direction()),
            light_colour: scene.sunlight.colour.into(),
            camera_position: extend(pass.position),
        }
    }
}

fn extend(v: Vec3) -> [f32; 4] {
    Vec4::new(v.x, v.y, v.z, 0.0).into()
}

/// Everything the opaque stage reads
pub struct OpaqueInputs<'a> {
    /// Scene the entries refer to
    pub scene: &'a Scene,
    /// Sorted opaque bucket
    pub entries: &'a [DrawListEntry],
    /// Per-pass uniforms
    pub frame: &'a FrameUniforms<'a>,
    /// Face culled for single-sided geometry
    pub cull_face: CullFace,
}

/// Everything the lighting composite reads
pub struct CompositeInputs<'a> {
    /// Scene lighting inputs
    pub scene: &'a Scene,
    /// Camera pass being lit
    pub pass: &'a CameraPass,
    /// Image-based lighting
    pub environment: Option<&'a EnvironmentMap>,
    /// Lighting composite program
    pub shader: ShaderId,
    /// Destination
    pub output: TargetId,
}

/// Per-camera, per-frame deferred pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredPass {
    next: Option<DeferredStage>,
}

impl DeferredPass {
    /// Start a new pass at `ClearBuffers`
    pub fn new() -> Self {
        Self { next: Some(DeferredStage::ClearBuffers) }
    }

    /// Stage expected next, `None` once the composite has run
    pub fn next_stage(&self) -> Option<DeferredStage> {
        self.next
    }

    fn enter(&mut self, stage: DeferredStage) -> PipelineResult<()> {
        if self.next != Some(stage) {
            return Err(PipelineError::StageOrder {
                expected: self.next.map_or("complete", DeferredStage::name),
                found: stage.name(),
            });
        }
        self.next = stage.next();
        Ok(())
    }

    /// Clear the geometry buffer
    pub fn clear_buffers(
        &mut self,
        device: &mut dyn GraphicsDevice,
        gbuffer: &GBuffer,
        values: &GBufferClearValues,
    ) -> PipelineResult<()> {
        self.enter(DeferredStage::ClearBuffers)?;
        device.bind_target(gbuffer.target())?;
        gbuffer.clear(device, values)?;
        Ok(())
    }

    /// Draw the opaque bucket into the geometry buffer
    ///
    /// Depth test and write on, blending off. Returns the number of draws.
    pub fn draw_opaque(
        &mut self,
        device: &mut dyn GraphicsDevice,
        inputs: &OpaqueInputs<'_>,
        binder: &mut UniformBinder,
    ) -> PipelineResult<usize> {
        self.enter(DeferredStage::DrawOpaque)?;
        let draws = submit_entries(device, inputs.scene, inputs.entries, inputs.frame, binder, |material, submesh| {
            let double_sided = material.double_sided || submesh.flags.contains(SubmeshFlags::DOUBLE_SIDED);
            let cull = if double_sided { CullFace::None } else { inputs.cull_face };
            RenderState::opaque(material.shader, cull, material.depth_test)
        });
        Ok(draws)
    }

    /// Resolve the geometry buffer for sampling
    pub fn resolve(&mut self, device: &mut dyn GraphicsDevice, gbuffer: &GBuffer) -> PipelineResult<()> {
        self.enter(DeferredStage::ResolveGBuffer)?;
        device.resolve_target(gbuffer.target())?;
        Ok(())
    }

    /// Light the resolved geometry buffer into the output
    ///
    /// Running without an environment map is a precondition violation; the
    /// composite is skipped and the output keeps its previous contents.
    pub fn lighting_composite(
        &mut self,
        device: &mut dyn GraphicsDevice,
        gbuffer: &GBuffer,
        inputs: &CompositeInputs<'_>,
    ) -> PipelineResult<()> {
        self.enter(DeferredStage::LightingComposite)?;

        let Some(environment) = inputs.environment else {
            let error = PipelineError::MissingEnvironmentMap;
            precondition_failed(&error);
            return Err(error);
        };

        let mut uniforms = Vec::with_capacity(9);
        let samplers = [
            ("u_normalMap", gbuffer.texture(device, GBufferChannel::Normal)?),
            ("u_positionMap", gbuffer.texture(device, GBufferChannel::Position)?),
            ("u_diffuseMap", gbuffer.texture(device, GBufferChannel::Albedo)?),
            ("u_maskMap", gbuffer.texture(device, GBufferChannel::Mask)?),
            ("u_irradianceMap", environment.irradiance),
            ("u_prefilterMap", environment.prefiltered),
            ("u_brdfMap", environment.brdf),
        ];
        let shadow = inputs.scene.shadow_map.map(|shadow| ("u_shadowMap", shadow.texture));
        for (unit, (name, texture)) in (0u32..).zip(samplers.into_iter().chain(shadow)) {
            uniforms.push(UniformBinding::named(name, UniformValue::Texture { unit, texture }));
        }

        let constants = LightingUniforms::new(inputs.pass, inputs.scene);
        uniforms.push(UniformBinding::named(
            "u_lighting",
            UniformValue::Block(bytemuck::bytes_of(&constants).to_vec()),
        ));

        device.bind_target(inputs.output)?;
        device.draw_fullscreen(&FullscreenDraw {
            state: RenderState::fullscreen(inputs.shader, BlendState::Alpha),
            uniforms: &uniforms,
        })?;
        Ok(())
    }
}

impl Default for DeferredPass {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingDevice;

    #[test]
    fn test_stages_must_run_in_order() {
        let mut device = RecordingDevice::new();
        let gbuffer = GBuffer::create(&mut device, (16, 16)).unwrap();
        let mut pass = DeferredPass::new();

        let err = pass.resolve(&mut device, &gbuffer).unwrap_err();
        assert_eq!(err, PipelineError::StageOrder { expected: "ClearBuffers", found: "ResolveGBuffer" });

        pass.clear_buffers(&mut device, &gbuffer, &GBufferClearValues::new()).unwrap();
        assert_eq!(pass.next_stage(), Some(DeferredStage::DrawOpaque));
        assert!(pass.clear_buffers(&mut device, &gbuffer, &GBufferClearValues::new()).is_err());
    }

    #[test]
    fn test_lighting_uniforms_are_plain_bytes() {
        let uniforms = LightingUniforms::zeroed();
        assert_eq!(bytemuck::bytes_of(&uniforms).len(), std::mem::size_of::<f32>() * (16 * 2 + 4 * 3));
    }
}
