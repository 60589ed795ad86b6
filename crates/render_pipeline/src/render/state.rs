//! Explicit render state
//!
//! Every draw carries the full state it needs. Nothing is inherited from the
//! previous draw, so list building never depends on submission order.

use crate::render::device::ShaderId;

/// Blending requested by a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Opaque, drawn into the geometry buffer
    #[default]
    None,
    /// Standard alpha blending
    Alpha,
    /// Additive blending for glows and particles
    Additive,
    /// Multiplicative blending for tints and shadows
    Multiply,
}

impl BlendMode {
    /// Anything other than `None` goes through the transparent path
    pub const fn is_transparent(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Blend equations the device applies while drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendState {
    /// Blending off
    Disabled,
    /// `src * a + dst * (1 - a)`
    Alpha,
    /// `src + dst`
    Additive,
    /// `src * dst`
    Multiply,
    /// Weighted-blended OIT accumulation
    ///
    /// Attachment 0 (accumulation) blends `ONE, ONE`. Attachment 1
    /// (revealage) blends `ZERO, ONE_MINUS_SRC_COLOR`, so each fragment
    /// multiplies revealage by `1 - alpha`.
    OitAccumulate,
}

impl From<BlendMode> for BlendState {
    fn from(mode: BlendMode) -> Self {
        match mode {
            BlendMode::None => Self::Disabled,
            BlendMode::Alpha => Self::Alpha,
            BlendMode::Additive => Self::Additive,
            BlendMode::Multiply => Self::Multiply,
        }
    }
}

/// Face culling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    /// No culling
    None,
    /// Cull back faces
    Back,
    /// Cull front faces
    Front,
}

/// Depth test and depth write switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthMode {
    /// Enable depth testing
    pub test: bool,
    /// Enable depth writing
    pub write: bool,
}

impl DepthMode {
    /// Test and write
    pub const OPAQUE: Self = Self { test: true, write: true };
    /// Test against existing depth without writing
    pub const READ_ONLY: Self = Self { test: true, write: false };
    /// No depth interaction
    pub const DISABLED: Self = Self { test: false, write: false };
}

/// Complete state for a single draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderState {
    /// Shader program to bind
    pub shader: ShaderId,
    /// Blend equations
    pub blend: BlendState,
    /// Depth switches
    pub depth: DepthMode,
    /// Face culling
    pub cull: CullFace,
}

impl RenderState {
    /// Opaque geometry-buffer draw
    pub fn opaque(shader: ShaderId, cull: CullFace, depth_test: bool) -> Self {
        Self {
            shader,
            blend: BlendState::Disabled,
            depth: DepthMode { test: depth_test, write: true },
            cull,
        }
    }

    /// Transparent draw over existing depth
    pub fn transparent(shader: ShaderId, blend: BlendState, cull: CullFace) -> Self {
        Self { shader, blend, depth: DepthMode::READ_ONLY, cull }
    }

    /// Full-screen quad pass
    pub fn fullscreen(shader: ShaderId, blend: BlendState) -> Self {
        Self { shader, blend, depth: DepthMode::DISABLED, cull: CullFace::None }
    }
}
