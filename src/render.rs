//! State shared by the Render pass.
//!
//! Two lifetimes meet here. [`RenderResources`] outlives frames: it holds the compiled
//! programs and uploaded textures of one GPU context and frees those whose definitions were
//! dropped. [`RenderContext`] lives for one Render pass and carries the camera's matrices,
//! the active light, the context-level uniform values and the [`FrameStats`] counters that
//! every node updates.

use std::collections::HashMap;
use std::rc::Rc;

use glam::Mat4;

use crate::backend::GpuBackend;
use crate::light::LightState;
use crate::shader::{ShaderCache, ShaderDef};
use crate::texture::TextureCache;
use crate::value::Value;

/// GPU-side caches that live as long as one GPU context.
#[derive(Debug, Default)]
pub struct RenderResources {
    pub shaders: ShaderCache,
    pub textures: TextureCache,
}

impl RenderResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases programs and textures whose owners have been dropped.
    pub fn collect(&mut self, backend: &mut dyn GpuBackend) {
        self.shaders.collect(backend);
        self.textures.collect(backend);
    }
}

/// Counters for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Draw calls the backend accepted.
    pub draws: usize,
    /// Shapes that were visited but not drawn (no shader, failed program, rejected draw).
    pub skipped_draws: usize,
    /// Uniforms left unbound because their value could not be uploaded.
    pub skipped_uniforms: usize,
}

/// What the Render pass hands to each node.
pub struct RenderContext<'a> {
    pub backend: &'a mut dyn GpuBackend,
    pub resources: &'a mut RenderResources,
    /// Context-level uniform values, consulted after a shape's own.
    pub properties: &'a HashMap<String, Value>,
    /// World to eye space.
    pub view: Mat4,
    /// Eye to clip space.
    pub projection: Mat4,
    /// Used by shapes that have no shader of their own.
    pub default_shader: Option<Rc<ShaderDef>>,
    pub light: Option<LightState>,
    pub stats: FrameStats,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        backend: &'a mut dyn GpuBackend,
        resources: &'a mut RenderResources,
        properties: &'a HashMap<String, Value>,
    ) -> Self {
        Self {
            backend,
            resources,
            properties,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            default_shader: None,
            light: None,
            stats: FrameStats::default(),
        }
    }

    pub fn with_matrices(mut self, view: Mat4, projection: Mat4) -> Self {
        self.view = view;
        self.projection = projection;
        self
    }

    pub fn with_default_shader(mut self, shader: Option<Rc<ShaderDef>>) -> Self {
        self.default_shader = shader;
        self
    }

    pub fn with_light(mut self, light: Option<LightState>) -> Self {
        self.light = light;
        self
    }
}
