//! Headless device that records commands
//!
//! Used by tests and the demo binary. Every call is appended to a command
//! log that can be inspected afterwards.

use std::collections::{HashMap, HashSet};

use crate::error::{DeviceError, DeviceResult};
use crate::render::device::{
    AttachmentFormat, DepthAttachment, DrawCall, FullscreenDraw, GraphicsDevice, MeshHandle, ShaderId,
    TargetDescriptor, TargetId, TextureId,
};
use crate::render::state::RenderState;
use crate::render::uniforms::UniformBinding;

/// A recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Shader compiled
    CompileShader {
        /// Program name
        name: String,
        /// Assigned handle
        shader: ShaderId,
    },
    /// Target created
    CreateTarget {
        /// Assigned handle
        target: TargetId,
        /// Debug label
        label: &'static str,
        /// Size in pixels
        size: (u32, u32),
    },
    /// Target destroyed
    DestroyTarget(TargetId),
    /// Target resized
    ResizeTarget {
        /// Target
        target: TargetId,
        /// New size
        size: (u32, u32),
    },
    /// Target bound for drawing
    BindTarget(TargetId),
    /// Target cleared
    Clear {
        /// Target
        target: TargetId,
        /// One clear value per colour attachment
        colours: Vec<[f32; 4]>,
        /// Depth clear value
        depth: Option<f32>,
    },
    /// Submesh drawn
    DrawSubmesh {
        /// Bound target at draw time
        target: TargetId,
        /// Mesh
        mesh: MeshHandle,
        /// Submesh index
        submesh: usize,
        /// Draw state
        state: RenderState,
        /// Uniform uploads
        uniforms: Vec<UniformBinding>,
        /// Clip plane
        clip_plane: [f32; 4],
    },
    /// Full-screen quad drawn
    DrawFullscreen {
        /// Bound target at draw time
        target: TargetId,
        /// Draw state
        state: RenderState,
        /// Uniform uploads
        uniforms: Vec<UniformBinding>,
    },
    /// Target resolved for sampling
    Resolve(TargetId),
    /// Depth copied between targets
    CopyDepth {
        /// Target whose depth is read
        source: TargetId,
        /// Target whose depth is overwritten
        destination: TargetId,
    },
    /// Target contents discarded
    Invalidate(TargetId),
}

#[derive(Debug)]
struct RecordedTarget {
    size: (u32, u32),
    textures: Vec<TextureId>,
    has_depth: bool,
}

/// Graphics device that draws nothing and remembers everything
#[derive(Debug)]
pub struct RecordingDevice {
    commands: Vec<Command>,
    targets: HashMap<TargetId, RecordedTarget>,
    failing_shaders: HashSet<String>,
    bound: TargetId,
    next_shader: u32,
    next_target: u32,
    next_texture: u32,
}

impl RecordingDevice {
    /// Create a device with only the default framebuffer
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            targets: HashMap::new(),
            failing_shaders: HashSet::new(),
            bound: TargetId::SCREEN,
            next_shader: 1,
            next_target: 1,
            next_texture: 1,
        }
    }

    /// Make compilation of `name` fail from now on
    pub fn fail_shader(&mut self, name: impl Into<String>) {
        self.failing_shaders.insert(name.into());
    }

    /// Create a standalone colour target, e.g. a camera output
    pub fn create_output(&mut self, label: &'static str, size: (u32, u32)) -> DeviceResult<TargetId> {
        self.create_target(&TargetDescriptor {
            label,
            size,
            attachments: vec![AttachmentFormat::Rgba8],
            depth: DepthAttachment::Own,
        })
    }

    /// Allocate a texture handle without a target, e.g. an environment map
    pub fn create_texture(&mut self) -> TextureId {
        let texture = TextureId(self.next_texture);
        self.next_texture += 1;
        texture
    }

    /// All recorded commands
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain the command log
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Number of submesh draws recorded
    pub fn submesh_draws(&self) -> usize {
        self.commands.iter().filter(|c| matches!(c, Command::DrawSubmesh { .. })).count()
    }

    /// Current size of a target
    pub fn target_size(&self, target: TargetId) -> Option<(u32, u32)> {
        self.targets.get(&target).map(|t| t.size)
    }

    /// Size of the depth buffer of a target
    ///
    /// The screen always has one, of a size the device does not track.
    fn depth_size(&self, target: TargetId) -> DeviceResult<Option<(u32, u32)>> {
        if target == TargetId::SCREEN {
            return Ok(None);
        }
        match self.targets.get(&target) {
            Some(t) if t.has_depth => Ok(Some(t.size)),
            Some(_) => Err(DeviceError::IncompatibleTargets(format!("{target:?} has no depth buffer"))),
            None => Err(DeviceError::InvalidHandle(format!("{target:?}"))),
        }
    }

    fn check_target(&self, target: TargetId) -> DeviceResult<()> {
        if target == TargetId::SCREEN || self.targets.contains_key(&target) {
            Ok(())
        } else {
            Err(DeviceError::InvalidHandle(format!("{target:?}")))
        }
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn compile_shader(&mut self, name: &str) -> DeviceResult<ShaderId> {
        if self.failing_shaders.contains(name) {
            return Err(DeviceError::ShaderCompile {
                name: name.to_string(),
                log: "compilation disabled on this device".to_string(),
            });
        }

        let shader = ShaderId(self.next_shader);
        self.next_shader += 1;
        self.commands.push(Command::CompileShader { name: name.to_string(), shader });
        Ok(shader)
    }

    fn create_target(&mut self, descriptor: &TargetDescriptor) -> DeviceResult<TargetId> {
        if descriptor.size.0 == 0 || descriptor.size.1 == 0 {
            return Err(DeviceError::TargetCreation(format!("{} has zero size", descriptor.label)));
        }

        let target = TargetId(self.next_target);
        self.next_target += 1;
        let textures = descriptor.attachments.iter().map(|_| self.create_texture()).collect();
        let has_depth = descriptor.depth != DepthAttachment::None;
        self.targets.insert(target, RecordedTarget { size: descriptor.size, textures, has_depth });
        self.commands.push(Command::CreateTarget { target, label: descriptor.label, size: descriptor.size });
        Ok(target)
    }

    fn destroy_target(&mut self, target: TargetId) -> DeviceResult<()> {
        if self.targets.remove(&target).is_none() {
            return Err(DeviceError::InvalidHandle(format!("{target:?}")));
        }
        if self.bound == target {
            self.bound = TargetId::SCREEN;
        }
        self.commands.push(Command::DestroyTarget(target));
        Ok(())
    }

    fn resize_target(&mut self, target: TargetId, size: (u32, u32)) -> DeviceResult<()> {
        let entry = self
            .targets
            .get_mut(&target)
            .ok_or_else(|| DeviceError::InvalidHandle(format!("{target:?}")))?;
        entry.size = size;
        self.commands.push(Command::ResizeTarget { target, size });
        Ok(())
    }

    fn attachment_texture(&self, target: TargetId, index: usize) -> DeviceResult<TextureId> {
        self.targets
            .get(&target)
            .and_then(|t| t.textures.get(index).copied())
            .ok_or_else(|| DeviceError::InvalidHandle(format!("{target:?} attachment {index}")))
    }

    fn bind_target(&mut self, target: TargetId) -> DeviceResult<()> {
        self.check_target(target)?;
        self.bound = target;
        self.commands.push(Command::BindTarget(target));
        Ok(())
    }

    fn clear_target(&mut self, target: TargetId, colours: &[[f32; 4]], depth: Option<f32>) -> DeviceResult<()> {
        self.check_target(target)?;
        self.commands.push(Command::Clear { target, colours: colours.to_vec(), depth });
        Ok(())
    }

    fn draw_submesh(&mut self, call: &DrawCall<'_>) -> DeviceResult<()> {
        self.commands.push(Command::DrawSubmesh {
            target: self.bound,
            mesh: call.mesh,
            submesh: call.submesh,
            state: call.state,
            uniforms: call.uniforms.to_vec(),
            clip_plane: call.clip_plane,
        });
        Ok(())
    }

    fn draw_fullscreen(&mut self, draw: &FullscreenDraw<'_>) -> DeviceResult<()> {
        self.commands.push(Command::DrawFullscreen {
            target: self.bound,
            state: draw.state,
            uniforms: draw.uniforms.to_vec(),
        });
        Ok(())
    }

    fn resolve_target(&mut self, target: TargetId) -> DeviceResult<()> {
        self.check_target(target)?;
        self.commands.push(Command::Resolve(target));
        Ok(())
    }

    fn copy_depth(&mut self, source: TargetId, destination: TargetId) -> DeviceResult<()> {
        let source_size = self.depth_size(source)?;
        let destination_size = self.depth_size(destination)?;
        if let (Some(from), Some(to)) = (source_size, destination_size) {
            if from != to {
                return Err(DeviceError::IncompatibleTargets(format!(
                    "depth copy {source:?} -> {destination:?} between sizes {from:?} and {to:?}"
                )));
            }
        }
        self.commands.push(Command::CopyDepth { source, destination });
        Ok(())
    }

    fn invalidate_target(&mut self, target: TargetId) -> DeviceResult<()> {
        self.check_target(target)?;
        self.commands.push(Command::Invalidate(target));
        Ok(())
    }
}
