//! Shader cache with fallback
//!
//! Shaders are compiled on first use. A program that fails to build is
//! replaced by the magenta fallback so the frame still renders.

use std::collections::HashMap;

use crate::render::device::{GraphicsDevice, ShaderId};

/// Programs owned by the pipeline itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinShader {
    /// Full-screen deferred lighting
    LightingComposite,
    /// Full-screen weighted-blended OIT resolve
    OitResolve,
    /// Flat magenta, substituted for anything that fails to build
    Fallback,
}

impl BuiltinShader {
    /// Program name passed to the device
    pub const fn name(self) -> &'static str {
        match self {
            Self::LightingComposite => "lighting_composite",
            Self::OitResolve => "oit_resolve",
            Self::Fallback => "fallback_magenta",
        }
    }
}

/// Compiled shaders by name
#[derive(Debug, Default)]
pub struct ShaderCache {
    shaders: HashMap<String, ShaderId>,
    fallback: Option<ShaderId>,
}

impl ShaderCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled program for a built-in shader
    pub fn builtin(&mut self, device: &mut dyn GraphicsDevice, shader: BuiltinShader) -> ShaderId {
        self.get_or_compile(device, shader.name())
    }

    /// Compiled program for `name`, compiling it on first request
    ///
    /// Failures are logged and cached as the fallback program.
    pub fn get_or_compile(&mut self, device: &mut dyn GraphicsDevice, name: &str) -> ShaderId {
        if let Some(&shader) = self.shaders.get(name) {
            return shader;
        }

        let shader = match device.compile_shader(name) {
            Ok(shader) => {
                log::debug!("Compiled shader '{name}' as {shader:?}");
                shader
            }
            Err(e) => {
                log::warn!("{e}; using fallback shader");
                self.fallback(device)
            }
        };
        self.shaders.insert(name.to_string(), shader);
        shader
    }

    /// True if `name` is cached and resolved to the fallback program
    pub fn is_fallback(&self, name: &str) -> bool {
        self.fallback.is_some() && self.shaders.get(name) == self.fallback.as_ref()
    }

    fn fallback(&mut self, device: &mut dyn GraphicsDevice) -> ShaderId {
        if let Some(shader) = self.fallback {
            return shader;
        }

        let shader = device.compile_shader(BuiltinShader::Fallback.name()).unwrap_or_else(|e| {
            log::error!("{e}; fallback shader unavailable, draws using it will be skipped");
            ShaderId::NULL
        });
        self.fallback = Some(shader);
        shader
    }
}
