//! Graphics device abstraction
//!
//! This module defines the trait a graphics API wrapper implements so the
//! pipeline can describe what to draw without knowing how draws are issued.

use crate::error::DeviceResult;
use crate::render::state::RenderState;
use crate::render::uniforms::UniformBinding;

/// Handle to a mesh resource stored in the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Handle to a compiled shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

impl ShaderId {
    /// Program that draws nothing, used when even the fallback fails to build
    pub const NULL: Self = Self(0);
}

/// Handle to a sampleable texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Handle to a render target (framebuffer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u32);

impl TargetId {
    /// The default framebuffer
    pub const SCREEN: Self = Self(0);
}

/// Colour attachment formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentFormat {
    /// 8-bit normalized RGBA
    Rgba8,
    /// Half-float RGBA
    Rgba16F,
    /// Full-float RGBA
    Rgba32F,
    /// Half-float single channel
    R16F,
}

/// Depth attachment of a render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthAttachment {
    /// No depth buffer
    None,
    /// The target owns its depth buffer
    Own,
    /// Reuse the depth buffer of another target
    Shared(TargetId),
}

/// Description of a render target to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    /// Debug label
    pub label: &'static str,
    /// Size in pixels
    pub size: (u32, u32),
    /// One entry per colour attachment, in attachment order
    pub attachments: Vec<AttachmentFormat>,
    /// Depth attachment
    pub depth: DepthAttachment,
}

/// One submesh draw
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    /// Mesh to draw from
    pub mesh: MeshHandle,
    /// Submesh index within the mesh
    pub submesh: usize,
    /// Full state for this draw
    pub state: RenderState,
    /// Uniform values to upload before drawing
    pub uniforms: &'a [UniformBinding],
    /// Water clip plane, enabled when any component is non-zero
    pub clip_plane: [f32; 4],
}

/// One full-screen quad draw
#[derive(Debug, Clone, Copy)]
pub struct FullscreenDraw<'a> {
    /// Full state for this draw
    pub state: RenderState,
    /// Uniform values to upload before drawing
    pub uniforms: &'a [UniformBinding],
}

/// Graphics device trait
///
/// Implemented by the thin per-API wrapper. All calls are made from the
/// render thread in submission order.
pub trait GraphicsDevice {
    /// Compile and link a named shader program
    fn compile_shader(&mut self, name: &str) -> DeviceResult<ShaderId>;

    /// Create a render target
    fn create_target(&mut self, descriptor: &TargetDescriptor) -> DeviceResult<TargetId>;

    /// Release a render target and its attachments
    fn destroy_target(&mut self, target: TargetId) -> DeviceResult<()>;

    /// Resize a render target, discarding its contents
    fn resize_target(&mut self, target: TargetId, size: (u32, u32)) -> DeviceResult<()>;

    /// Texture backing colour attachment `index` of `target`
    fn attachment_texture(&self, target: TargetId, index: usize) -> DeviceResult<TextureId>;

    /// Make `target` the destination of subsequent draws
    fn bind_target(&mut self, target: TargetId) -> DeviceResult<()>;

    /// Clear each colour attachment to its own value, and optionally depth
    fn clear_target(&mut self, target: TargetId, colours: &[[f32; 4]], depth: Option<f32>) -> DeviceResult<()>;

    /// Draw a submesh
    fn draw_submesh(&mut self, call: &DrawCall<'_>) -> DeviceResult<()>;

    /// Draw a full-screen quad
    fn draw_fullscreen(&mut self, draw: &FullscreenDraw<'_>) -> DeviceResult<()>;

    /// Make the contents of `target` available for sampling
    fn resolve_target(&mut self, target: TargetId) -> DeviceResult<()>;

    /// Copy the depth buffer of `source` into the depth buffer of `destination`
    ///
    /// Both targets must have a depth attachment of the same size.
    fn copy_depth(&mut self, source: TargetId, destination: TargetId) -> DeviceResult<()>;

    /// Declare the contents of `target` no longer needed
    fn invalidate_target(&mut self, target: TargetId) -> DeviceResult<()>;
}
