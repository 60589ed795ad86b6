//! # Weighted-Blended Order-Independent Transparency
//!
//! Transparent fragments are accumulated into two targets instead of being
//! blended in strict depth order:
//!
//! - **Accumulation** (RGBA, additive): `vec4(rgb * a, a) * weight`
//! - **Revealage** (R, multiplicative): `revealage *= 1 - a`
//!
//! Both blends commute, so the result does not depend on draw order. A
//! full-screen resolve then divides out the weights and blends the average
//! colour over the lit opaque image with coverage `1 - revealage`.
//!
//! The per-fragment functions here mirror the shader code and back the
//! [`OitBuffers`] reference image used to check the blend properties.

use crate::core::{OitWeightParams, TransparencyConfig};
use crate::error::{DeviceResult, PipelineResult};
use crate::foundation::math::{Vec3, Vec4};
use crate::pipeline::draw_list::DrawListEntry;
use crate::pipeline::submit::submit_entries;
use crate::render::{
    AttachmentFormat, BlendState, CullFace, DepthAttachment, FrameUniforms, FullscreenDraw, GraphicsDevice,
    RenderState, ShaderId, TargetDescriptor, TargetId, TextureId, UniformBinder, UniformBinding, UniformValue,
};
use crate::scene::{Scene, SubmeshFlags};

/// Weight of a fragment from its alpha and normalized depth
///
/// Low-alpha and near fragments weigh more. Depth is in `[0, 1]`, 0 at the
/// near plane.
pub fn oit_weight(alpha: f32, depth: f32, params: &OitWeightParams) -> f32 {
    let coverage = (alpha * params.alpha_scale).min(1.0) + params.alpha_bias;
    let falloff = 1.0 - depth * params.depth_factor;
    let weight = coverage.powf(params.exponent) * params.scale * falloff.powf(params.exponent);
    weight.clamp(params.min_weight, params.max_weight)
}

/// Accumulated state of one pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OitPixel {
    /// Weighted premultiplied colour and weighted alpha
    pub accum: Vec4,
    /// Product of `1 - alpha` over all fragments
    pub revealage: f32,
}

impl OitPixel {
    /// Identity values: nothing accumulated, fully revealed
    pub fn cleared() -> Self {
        Self { accum: Vec4::zeros(), revealage: 1.0 }
    }

    /// Blend one fragment in
    pub fn accumulate(&mut self, colour: Vec3, alpha: f32, depth: f32, params: &OitWeightParams) {
        let weight = oit_weight(alpha, depth, params);
        self.accum += Vec4::new(colour.x * alpha, colour.y * alpha, colour.z * alpha, alpha) * weight;
        self.revealage *= 1.0 - alpha;
    }
}

impl Default for OitPixel {
    fn default() -> Self {
        Self::cleared()
    }
}

/// Resolve one pixel into straight-alpha colour
///
/// Returns `None` where nothing transparent contributed, leaving the
/// underlying image untouched.
pub fn resolve_pixel(pixel: &OitPixel, epsilon: f32) -> Option<Vec4> {
    if approx::relative_eq!(pixel.revealage, 1.0, max_relative = epsilon) {
        return None;
    }

    let mut rgb = pixel.accum.xyz();
    if !rgb.iter().all(|c| c.is_finite()) {
        rgb = Vec3::repeat(pixel.accum.w);
    }
    let colour = rgb / pixel.accum.w.max(epsilon);
    Some(Vec4::new(colour.x, colour.y, colour.z, 1.0 - pixel.revealage))
}

/// `src * src.a + dst * (1 - src.a)`
pub fn blend_over(src: Vec4, dst: Vec4) -> Vec4 {
    src * src.w + dst * (1.0 - src.w)
}

/// CPU image of the two accumulation targets
#[derive(Debug, Clone, PartialEq)]
pub struct OitBuffers {
    width: u32,
    height: u32,
    pixels: Vec<OitPixel>,
}

impl OitBuffers {
    /// Cleared buffers of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![OitPixel::cleared(); width as usize * height as usize],
        }
    }

    /// Reset every pixel to its identity value
    pub fn clear(&mut self) {
        self.pixels.fill(OitPixel::cleared());
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Accumulated state of a pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<&OitPixel> {
        self.index(x, y).map(|i| &self.pixels[i])
    }

    /// Blend one fragment into a pixel; out-of-range fragments are dropped
    pub fn accumulate_fragment(&mut self, x: u32, y: u32, colour: Vec3, alpha: f32, depth: f32, params: &OitWeightParams) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i].accumulate(colour, alpha, depth, params);
        }
    }

    /// Resolve every pixel without modifying the buffers
    pub fn resolve(&self, epsilon: f32) -> Vec<Option<Vec4>> {
        self.pixels.iter().map(|pixel| resolve_pixel(pixel, epsilon)).collect()
    }

    /// Composite the resolved pixels over `image`
    ///
    /// `image` is row-major and the same size as the buffers.
    pub fn resolve_into(&self, image: &mut [Vec4], epsilon: f32) {
        for (dst, pixel) in image.iter_mut().zip(&self.pixels) {
            if let Some(src) = resolve_pixel(pixel, epsilon) {
                *dst = blend_over(src, *dst);
            }
        }
    }
}

/// Accumulation and revealage targets owned by one camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OitTargets {
    target: TargetId,
    size: (u32, u32),
}

impl OitTargets {
    /// Clear value of the accumulation target
    pub const ACCUM_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];
    /// Clear value of the revealage target
    pub const REVEAL_CLEAR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

    /// Allocate both targets, testing against the depth of `depth_source`
    pub fn create(device: &mut dyn GraphicsDevice, size: (u32, u32), depth_source: TargetId) -> DeviceResult<Self> {
        let target = device.create_target(&TargetDescriptor {
            label: "oit",
            size,
            attachments: vec![AttachmentFormat::Rgba16F, AttachmentFormat::R16F],
            depth: DepthAttachment::Shared(depth_source),
        })?;
        log::info!("Created OIT targets {target:?} at {}x{}", size.0, size.1);
        Ok(Self { target, size })
    }

    /// Resize if `size` differs
    pub fn ensure_size(&mut self, device: &mut dyn GraphicsDevice, size: (u32, u32)) -> DeviceResult<()> {
        if self.size != size {
            device.resize_target(self.target, size)?;
            self.size = size;
        }
        Ok(())
    }

    /// Reset both targets to their identity values
    pub fn clear(&self, device: &mut dyn GraphicsDevice) -> DeviceResult<()> {
        device.clear_target(self.target, &[Self::ACCUM_CLEAR, Self::REVEAL_CLEAR], None)
    }

    /// Accumulation texture
    pub fn accum_texture(&self, device: &dyn GraphicsDevice) -> DeviceResult<TextureId> {
        device.attachment_texture(self.target, 0)
    }

    /// Revealage texture
    pub fn reveal_texture(&self, device: &dyn GraphicsDevice) -> DeviceResult<TextureId> {
        device.attachment_texture(self.target, 1)
    }

    /// Underlying render target
    pub fn target(&self) -> TargetId {
        self.target
    }
}

/// Everything the transparent stage reads
pub struct TransparentInputs<'a> {
    /// Scene the entries refer to
    pub scene: &'a Scene,
    /// Sorted transparent bucket
    pub entries: &'a [DrawListEntry],
    /// Per-pass uniforms
    pub frame: &'a FrameUniforms<'a>,
    /// Face culled for single-sided geometry
    pub cull_face: CullFace,
}

fn cull_for(inputs: &TransparentInputs<'_>, double_sided: bool) -> CullFace {
    if double_sided { CullFace::None } else { inputs.cull_face }
}

/// Clear the OIT targets and accumulate the transparent bucket into them
///
/// Returns the number of draws.
pub fn accumulate_transparent(
    device: &mut dyn GraphicsDevice,
    targets: &OitTargets,
    inputs: &TransparentInputs<'_>,
    binder: &mut UniformBinder,
) -> PipelineResult<usize> {
    device.bind_target(targets.target())?;
    targets.clear(device)?;
    let draws = submit_entries(device, inputs.scene, inputs.entries, inputs.frame, binder, |material, submesh| {
        let double_sided = material.double_sided || submesh.flags.contains(SubmeshFlags::DOUBLE_SIDED);
        RenderState::transparent(material.shader, BlendState::OitAccumulate, cull_for(inputs, double_sided))
    });
    Ok(draws)
}

/// Resolve the OIT targets over `output`, then discard them
pub fn resolve_transparent(
    device: &mut dyn GraphicsDevice,
    targets: &OitTargets,
    shader: ShaderId,
    output: TargetId,
    config: &TransparencyConfig,
) -> PipelineResult<()> {
    let uniforms = [
        UniformBinding::named("u_accumMap", UniformValue::Texture { unit: 0, texture: targets.accum_texture(device)? }),
        UniformBinding::named("u_revealMap", UniformValue::Texture { unit: 1, texture: targets.reveal_texture(device)? }),
        UniformBinding::named("u_epsilon", UniformValue::Float(config.epsilon)),
    ];

    device.bind_target(output)?;
    device.draw_fullscreen(&FullscreenDraw {
        state: RenderState::fullscreen(shader, BlendState::Alpha),
        uniforms: &uniforms,
    })?;
    device.invalidate_target(targets.target())?;
    Ok(())
}

/// Forward-blend the transparent bucket straight into `output`
///
/// Relies on the back-to-front order of the bucket instead of OIT. The
/// opaque depth of `depth_source` is copied into `output` first so that
/// surfaces behind opaque geometry fail the depth test.
pub fn draw_sorted_transparent(
    device: &mut dyn GraphicsDevice,
    depth_source: TargetId,
    output: TargetId,
    inputs: &TransparentInputs<'_>,
    binder: &mut UniformBinder,
) -> PipelineResult<usize> {
    device.copy_depth(depth_source, output)?;
    device.bind_target(output)?;
    let draws = submit_entries(device, inputs.scene, inputs.entries, inputs.frame, binder, |material, submesh| {
        let double_sided = material.double_sided || submesh.flags.contains(SubmeshFlags::DOUBLE_SIDED);
        RenderState::transparent(material.shader, material.blend.into(), cull_for(inputs, double_sided))
    });
    Ok(draws)
}
