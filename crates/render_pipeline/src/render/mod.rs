//! # Render Module
//!
//! The boundary between the pipeline and the graphics API. The pipeline
//! decides what to draw and with which state; a [`GraphicsDevice`] issues it.
//!
//! - [`state`]: explicit per-draw blend, depth and cull state
//! - [`device`]: the device trait and resource handles
//! - [`material`]: materials, uniform locations and capability tags
//! - [`uniforms`]: per-draw uniform binding
//! - [`shader`]: shader cache with fallback
//! - [`recording`]: headless recording device

pub mod state;
pub mod device;
pub mod material;
pub mod uniforms;
pub mod shader;
pub mod recording;

pub use state::{BlendMode, BlendState, CullFace, DepthMode, RenderState};
pub use device::{
    AttachmentFormat, DepthAttachment, DrawCall, FullscreenDraw, GraphicsDevice, MeshHandle, ShaderId,
    TargetDescriptor, TargetId, TextureId,
};
pub use material::{Capabilities, Material, MaterialRegistry, Property, PropertyValue, UniformId, UniformLocations};
pub use uniforms::{FrameUniforms, UniformBinder, UniformBinding, UniformLocation, UniformValue};
pub use shader::{BuiltinShader, ShaderCache};
pub use recording::{Command, RecordingDevice};
