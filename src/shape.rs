//! Leaf geometry.
//!
//! A [`Shape`] owns its attribute buffers and optional 16-bit index list and knows how to
//! draw itself. Drawing follows a fixed sequence:
//!
//! 1. pick the shape's shader, or the context default; no shader means no draw
//! 2. activate the program and bind its uniforms
//! 3. upload one vertex buffer per shader attribute, in attribute order; the vertex count is
//!    the smallest item count among them
//! 4. draw indexed when the shape has indices, otherwise draw that many vertices
//! 5. release every buffer created for the draw
//!
//! Nothing uploaded for a draw outlives it.

use std::collections::HashMap;
use std::rc::Rc;

use glam::Mat4;

use crate::backend::{BackendError, BufferHandle, DrawCall, GpuBackend};
use crate::mesh::{AttributeBuffer, DrawMode};
use crate::node::{FrameState, SceneNode};
use crate::placement::Placement;
use crate::render::RenderContext;
use crate::shader::{self, ShaderDef};
use crate::value::Value;

pub const POSITIONS: &str = "positions";
pub const NORMALS: &str = "normals";
pub const UVS: &str = "uvs";
pub const COLORS: &str = "colors";

#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("shader reads attribute '{0}' but the shape has no such buffer")]
    MissingAttribute(String),
    #[error("nothing to draw")]
    Empty,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Default)]
pub struct Shape {
    pub placement: Placement,
    pub attributes: HashMap<String, AttributeBuffer>,
    pub indices: Option<Vec<u16>>,
    pub draw_mode: DrawMode,
    pub shader: Option<Rc<ShaderDef>>,
    /// Draw with alpha blending.
    pub transparent: bool,
    /// Uniform values that take precedence over the render context's.
    pub properties: HashMap<String, Value>,
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, buffer: AttributeBuffer) -> Self {
        self.attributes.insert(name.into(), buffer);
        self
    }

    pub fn with_indices(mut self, indices: Vec<u16>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn with_draw_mode(mut self, mode: DrawMode) -> Self {
        self.draw_mode = mode;
        self
    }

    pub fn with_shader(mut self, shader: Rc<ShaderDef>) -> Self {
        self.shader = Some(shader);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn at(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeBuffer> {
        self.attributes.get(name)
    }

    /// Item count of the `positions` buffer, if there is one.
    pub fn vertex_count(&self) -> Option<usize> {
        self.attribute(POSITIONS).map(AttributeBuffer::item_count)
    }

    fn draw(&self, backend: &mut dyn GpuBackend, shader: &ShaderDef) -> Result<(), ShapeError> {
        let mut buffers = Vec::with_capacity(shader.attribute_names().len() + 1);
        let result = self.upload_and_draw(backend, shader, &mut buffers);
        if !buffers.is_empty() {
            backend.release_buffers(&buffers);
        }
        result
    }

    fn upload_and_draw(
        &self,
        backend: &mut dyn GpuBackend,
        shader: &ShaderDef,
        buffers: &mut Vec<BufferHandle>,
    ) -> Result<(), ShapeError> {
        let mut nverts: Option<usize> = None;
        for (slot, name) in shader.attribute_names().iter().enumerate() {
            let buffer = self
                .attributes
                .get(name)
                .ok_or_else(|| ShapeError::MissingAttribute(name.clone()))?;
            buffers.push(backend.create_vertex_buffer(slot as u32, buffer)?);
            let items = buffer.item_count();
            nverts = Some(nverts.map_or(items, |n| n.min(items)));
        }

        let call = match &self.indices {
            Some(indices) if !indices.is_empty() => {
                let handle = backend.create_index_buffer(indices)?;
                buffers.push(handle);
                DrawCall {
                    mode: self.draw_mode,
                    count: indices.len() as u32,
                    indices: Some(handle),
                    blend: self.transparent,
                }
            }
            Some(_) => return Err(ShapeError::Empty),
            None => DrawCall {
                mode: self.draw_mode,
                count: nverts.unwrap_or(0) as u32,
                indices: None,
                blend: self.transparent,
            },
        };
        if call.count == 0 {
            return Err(ShapeError::Empty);
        }
        backend.draw(&call)?;
        Ok(())
    }
}

impl SceneNode for Shape {
    fn placement(&self) -> &Placement {
        &self.placement
    }

    fn placement_mut(&mut self) -> &mut Placement {
        &mut self.placement
    }

    fn render_prep(&mut self, frame: &mut FrameState, parent: Option<&Mat4>) {
        if self.placement.begin_prep(frame) {
            frame.record(&mut self.placement, parent);
        }
    }

    fn render(&self, ctx: &mut RenderContext<'_>) {
        let Some(shader) = self.shader.clone().or_else(|| ctx.default_shader.clone()) else {
            log::debug!("shape has no shader; not drawn");
            ctx.stats.skipped_draws += 1;
            return;
        };
        let Some(program) = ctx.resources.shaders.activate(&shader, ctx.backend) else {
            ctx.stats.skipped_draws += 1;
            return;
        };
        shader::bind_uniforms(
            ctx,
            program,
            &shader,
            &self.properties,
            self.placement.world_matrix(),
        );
        match self.draw(ctx.backend, &shader) {
            Ok(()) => ctx.stats.draws += 1,
            Err(ShapeError::Empty) => {
                log::debug!("shape has no vertices; not drawn");
                ctx.stats.skipped_draws += 1;
            }
            Err(err) => {
                log::warn!("shape not drawn: {err}");
                ctx.stats.skipped_draws += 1;
            }
        }
    }
}
