//! Error types for the device seam and the pipeline

use thiserror::Error;

use crate::foundation::collections::CameraId;
use crate::scene::PassKind;

/// Errors reported by a [`crate::render::GraphicsDevice`]
///
/// These are resource-acquisition failures. The pipeline recovers from them
/// locally (fallback shader, skipped pass) and keeps rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// A shader failed to compile
    #[error("Shader '{name}' failed to compile: {log}")]
    ShaderCompile {
        /// Program name
        name: String,
        /// Compiler output
        log: String,
    },

    /// A shader compiled but failed to link
    #[error("Shader '{name}' failed to link: {log}")]
    ShaderLink {
        /// Program name
        name: String,
        /// Linker output
        log: String,
    },

    /// A render target could not be created or resized
    #[error("Render target creation failed: {0}")]
    TargetCreation(String),

    /// A handle did not refer to a live device resource
    #[error("Invalid device handle: {0}")]
    InvalidHandle(String),

    /// Two targets cannot take part in the same operation
    #[error("Incompatible render targets: {0}")]
    IncompatibleTargets(String),
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Precondition violations and wrapped device failures
///
/// Precondition violations are programmer errors: they trip a debug assertion
/// in debug builds and degrade the camera's output in release builds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// `render` was called before `update_draw_list` in the current frame
    #[error("Draw list for camera {camera:?} pass {pass:?} was not built this frame")]
    DrawListNotBuilt {
        /// Camera being rendered
        camera: CameraId,
        /// Pass being rendered
        pass: PassKind,
    },

    /// The lighting composite ran without an environment map
    #[error("Environment map must be set before the lighting composite runs")]
    MissingEnvironmentMap,

    /// The camera handle is not in the scene
    #[error("Unknown camera {0:?}")]
    UnknownCamera(CameraId),

    /// The camera has no G-Buffer allocated
    #[error("Camera {0:?} has no geometry buffer")]
    MissingGeometryBuffer(CameraId),

    /// Geometry rejected at registration time
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),

    /// A deferred stage was entered out of order
    #[error("Deferred stage {found} entered while expecting {expected}")]
    StageOrder {
        /// Stage the executor expected next
        expected: &'static str,
        /// Stage that was requested
        found: &'static str,
    },

    /// A device call failed
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Report a precondition violation
///
/// Panics in debug builds, logs in release builds.
pub(crate) fn precondition_failed(error: &PipelineError) {
    log::error!("Precondition violated: {error}");
    debug_assert!(false, "Precondition violated: {error}");
}
