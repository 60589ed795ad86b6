//! Geometry buffer
//!
//! Four colour attachments plus depth, allocated per camera and resized when
//! the camera's resolution changes.

use crate::error::DeviceResult;
use crate::render::{AttachmentFormat, DepthAttachment, GraphicsDevice, TargetDescriptor, TargetId, TextureId};

/// Colour attachments of the geometry buffer, in attachment order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GBufferChannel {
    /// View-space normal
    Normal,
    /// View-space position
    Position,
    /// Base colour and alpha
    Albedo,
    /// Metallic, roughness, ambient occlusion
    Mask,
}

impl GBufferChannel {
    /// All channels in attachment order
    pub const ALL: [Self; 4] = [Self::Normal, Self::Position, Self::Albedo, Self::Mask];

    /// Attachment index
    pub const fn index(self) -> usize {
        match self {
            Self::Normal => 0,
            Self::Position => 1,
            Self::Albedo => 2,
            Self::Mask => 3,
        }
    }

    const fn format(self) -> AttachmentFormat {
        match self {
            Self::Normal | Self::Position => AttachmentFormat::Rgba16F,
            Self::Albedo | Self::Mask => AttachmentFormat::Rgba8,
        }
    }
}

/// Per-channel clear values
///
/// Each channel has its own "no data" value. Built once when the pipeline
/// is created and passed to every clear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GBufferClearValues {
    colours: [[f32; 4]; 4],
    depth: f32,
}

impl GBufferClearValues {
    /// The standard table
    pub fn new() -> Self {
        let mut colours = [[0.0; 4]; 4];
        colours[GBufferChannel::Normal.index()] = [0.0, 0.0, 0.0, 0.0];
        colours[GBufferChannel::Position.index()] = [0.0, 0.0, 0.0, 1.0];
        colours[GBufferChannel::Albedo.index()] = [0.0, 0.0, 0.0, 0.0];
        colours[GBufferChannel::Mask.index()] = [0.0, 0.0, 0.0, 1.0];
        Self { colours, depth: 1.0 }
    }

    /// Clear value of one channel
    pub fn channel(&self, channel: GBufferChannel) -> [f32; 4] {
        self.colours[channel.index()]
    }

    /// All colour clear values in attachment order
    pub fn colours(&self) -> &[[f32; 4]] {
        &self.colours
    }

    /// Depth clear value
    pub fn depth(&self) -> f32 {
        self.depth
    }
}

impl Default for GBufferClearValues {
    fn default() -> Self {
        Self::new()
    }
}

/// Geometry buffer owned by one camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBuffer {
    target: TargetId,
    size: (u32, u32),
}

impl GBuffer {
    /// Allocate a geometry buffer
    pub fn create(device: &mut dyn GraphicsDevice, size: (u32, u32)) -> DeviceResult<Self> {
        let target = device.create_target(&TargetDescriptor {
            label: "gbuffer",
            size,
            attachments: GBufferChannel::ALL.iter().map(|channel| channel.format()).collect(),
            depth: DepthAttachment::Own,
        })?;
        log::info!("Created geometry buffer {target:?} at {}x{}", size.0, size.1);
        Ok(Self { target, size })
    }

    /// Resize if `size` differs; returns true if a resize happened
    pub fn ensure_size(&mut self, device: &mut dyn GraphicsDevice, size: (u32, u32)) -> DeviceResult<bool> {
        if self.size == size {
            return Ok(false);
        }
        device.resize_target(self.target, size)?;
        log::info!("Resized geometry buffer {:?} to {}x{}", self.target, size.0, size.1);
        self.size = size;
        Ok(true)
    }

    /// Clear every channel to its own value
    pub fn clear(&self, device: &mut dyn GraphicsDevice, values: &GBufferClearValues) -> DeviceResult<()> {
        device.clear_target(self.target, values.colours(), Some(values.depth()))
    }

    /// Texture of one channel
    pub fn texture(&self, device: &dyn GraphicsDevice, channel: GBufferChannel) -> DeviceResult<TextureId> {
        device.attachment_texture(self.target, channel.index())
    }

    /// Underlying render target
    pub fn target(&self) -> TargetId {
        self.target
    }

    /// Current size
    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}
