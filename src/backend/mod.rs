//! The GPU backend contract.
//!
//! The scene graph never talks to a graphics API directly. Everything it needs from the GPU
//! goes through [`GpuBackend`]: program compilation, uniform upload, per-draw vertex and index
//! buffers, textures, and the frame begin/present pair that stands in for the window system.
//!
//! Two implementations ship with the crate:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`WgpuBackend`] | renders to a window surface through wgpu |
//! | [`RecordingBackend`] | headless; records every call as a [`GpuCommand`] |
//!
//! Handles are plain integers issued by the backend. They are only meaningful to the backend
//! that issued them.

mod recording;
mod wgpu_backend;

pub use recording::{GpuCommand, RecordingBackend};
pub use wgpu_backend::{WgpuBackend, pack_uniforms};

use glam::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::mesh::{AttributeBuffer, DrawMode, ElementType};
use crate::texture::{SamplerSettings, TextureImage};
use crate::value::{Color, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// Index of a texture unit (sampler slot) on the GPU context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureUnit(pub u32);

/// A rectangle of the render target in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Width over height, or `None` for an empty rectangle.
    pub fn aspect(&self) -> Option<f32> {
        (self.width > 0 && self.height > 0).then(|| self.width as f32 / self.height as f32)
    }
}

/// Target setup at the start of a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSetup {
    /// `None` renders to the whole target.
    pub viewport: Option<Viewport>,
    pub clear: Color,
}

/// Everything needed to build one GPU program.
#[derive(Clone, Copy, Debug)]
pub struct ProgramSource<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
    /// Attribute `i` is fed from vertex buffer slot `i`.
    pub attributes: &'a [String],
    /// Uniform names in declaration order.
    pub uniforms: &'a [String],
}

/// A uniform value in a shape the GPU accepts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    /// Converts a host value, or returns `None` if it has no uniform shape.
    ///
    /// Loose float arrays are shaped by length: 1, 2, 3 and 4 become scalar and vectors,
    /// 9 a 3×3 matrix and 16 a 4×4 matrix, all column-major.
    pub fn from_value(value: &Value) -> Option<UniformValue> {
        Some(match value {
            Value::Bool(b) => UniformValue::Int(*b as i32),
            Value::Int(i) => UniformValue::Int(*i),
            Value::Float(f) => UniformValue::Float(*f),
            Value::Vec2(v) => UniformValue::Vec2(*v),
            Value::Vec3(v) => UniformValue::Vec3(*v),
            Value::Vec4(v) => UniformValue::Vec4(*v),
            Value::Quat(q) => UniformValue::Vec4(Vec4::from(*q)),
            Value::Color(c) => UniformValue::Vec4(c.to_vec4()),
            Value::Mat2(m) => UniformValue::Mat2(*m),
            Value::Mat3(m) => UniformValue::Mat3(*m),
            Value::Mat4(m) => UniformValue::Mat4(*m),
            Value::Floats(v) => match v.len() {
                1 => UniformValue::Float(v[0]),
                2 => UniformValue::Vec2(Vec2::from_slice(v)),
                3 => UniformValue::Vec3(Vec3::from_slice(v)),
                4 => UniformValue::Vec4(Vec4::from_slice(v)),
                9 => UniformValue::Mat3(Mat3::from_cols_slice(v)),
                16 => UniformValue::Mat4(Mat4::from_cols_slice(v)),
                _ => return None,
            },
            Value::Text(_) | Value::Texture(_) => return None,
        })
    }
}

/// One draw call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCall {
    pub mode: DrawMode,
    /// Vertices (non-indexed) or indices (indexed) to draw.
    pub count: u32,
    /// Index buffer for an indexed draw.
    pub indices: Option<BufferHandle>,
    /// Alpha blending (`src_alpha`, `1 - src_alpha`) for this draw only.
    pub blend: bool,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("shader compilation failed: {0}")]
    Compile(String),
    #[error("pipeline creation failed: {0}")]
    Pipeline(String),
    #[error("draw mode {0:?} is not supported by this backend")]
    UnsupportedDrawMode(DrawMode),
    #[error("vertex layout {components}x{element:?} is not supported by this backend")]
    UnsupportedVertexFormat { element: ElementType, components: u8 },
    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u64 },
    #[error("no frame in progress")]
    NoFrame,
    #[error("surface unavailable: {0}")]
    Surface(String),
    #[error("malformed texture image: {0}")]
    Image(String),
    #[error("uniform `{0}` has no value")]
    UnsetUniform(String),
}

/// Operations the scene graph needs from a GPU context.
///
/// All calls are synchronous from the caller's side and happen on the thread that owns the
/// context.
pub trait GpuBackend {
    /// Binds the target, clears color to `setup.clear` and depth to far, and enables depth
    /// testing with the `less` comparison.
    fn begin_frame(&mut self, setup: &FrameSetup) -> Result<(), BackendError>;

    /// Compiles and links a program, binding attribute `i` to vertex slot `i`.
    fn compile_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramHandle, BackendError>;

    fn delete_program(&mut self, program: ProgramHandle);

    fn use_program(&mut self, program: ProgramHandle);

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: &UniformValue);

    /// Points a sampler uniform at a texture unit.
    fn set_texture_uniform(&mut self, program: ProgramHandle, name: &str, unit: TextureUnit);

    /// Uploads one attribute into vertex slot `slot` for the next draw.
    fn create_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: &AttributeBuffer,
    ) -> Result<BufferHandle, BackendError>;

    fn create_index_buffer(&mut self, indices: &[u16]) -> Result<BufferHandle, BackendError>;

    fn draw(&mut self, call: &DrawCall) -> Result<(), BackendError>;

    /// Frees per-draw buffers. Unknown handles are ignored.
    fn release_buffers(&mut self, buffers: &[BufferHandle]);

    /// Uploads an image and leaves it bound to `unit`.
    fn create_texture(
        &mut self,
        unit: TextureUnit,
        image: &TextureImage,
        sampler: &SamplerSettings,
    ) -> Result<TextureHandle, BackendError>;

    fn delete_texture(&mut self, texture: TextureHandle);

    /// Shows the finished frame.
    fn present(&mut self) -> Result<(), BackendError>;
}
