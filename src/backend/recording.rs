use super::{
    BackendError, BufferHandle, DrawCall, FrameSetup, GpuBackend, ProgramHandle, ProgramSource,
    TextureHandle, TextureUnit, UniformValue,
};
use crate::mesh::{AttributeBuffer, DrawMode, VertexLayout};
use crate::texture::{SamplerSettings, TextureImage};

/// A call made on a [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum GpuCommand {
    BeginFrame(FrameSetup),
    CompileProgram {
        program: ProgramHandle,
        attributes: Vec<String>,
    },
    DeleteProgram(ProgramHandle),
    UseProgram(ProgramHandle),
    SetUniform {
        program: ProgramHandle,
        name: String,
        value: UniformValue,
    },
    SetTextureUniform {
        program: ProgramHandle,
        name: String,
        unit: TextureUnit,
    },
    CreateVertexBuffer {
        buffer: BufferHandle,
        slot: u32,
        layout: VertexLayout,
        items: usize,
    },
    CreateIndexBuffer {
        buffer: BufferHandle,
        count: usize,
    },
    Draw(DrawCall),
    ReleaseBuffers(Vec<BufferHandle>),
    CreateTexture {
        texture: TextureHandle,
        unit: TextureUnit,
        width: u32,
        height: u32,
        faces: usize,
        sampler: SamplerSettings,
    },
    DeleteTexture(TextureHandle),
    Present,
}

/// Headless backend that records every call in order.
///
/// Useful for tests and for hosts without a display. Compilation always succeeds unless
/// [`fail_compiles`](Self::fail_compiles) is set, in which case every program is rejected
/// with the given diagnostic. [`only_modes`](Self::only_modes) narrows the accepted draw
/// modes to mimic a backend with fewer topologies.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub commands: Vec<GpuCommand>,
    compile_error: Option<String>,
    modes: Option<Vec<DrawMode>>,
    next_handle: u64,
    in_frame: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent compilation fail with `diagnostic` (or succeed again with `None`).
    pub fn fail_compiles(&mut self, diagnostic: Option<&str>) {
        self.compile_error = diagnostic.map(str::to_owned);
    }

    /// Rejects draws in any mode not listed, as [`BackendError::UnsupportedDrawMode`].
    pub fn only_modes(&mut self, modes: &[DrawMode]) {
        self.modes = Some(modes.to_vec());
    }

    /// Draw calls issued so far, in order.
    pub fn draws(&self) -> Vec<DrawCall> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                GpuCommand::Draw(call) => Some(*call),
                _ => None,
            })
            .collect()
    }

    /// Value most recently set for uniform `name`, if any.
    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.commands.iter().rev().find_map(|c| match c {
            GpuCommand::SetUniform {
                name: n, value, ..
            } if n == name => Some(*value),
            _ => None,
        })
    }

    pub fn count(&self, pred: impl Fn(&GpuCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl GpuBackend for RecordingBackend {
    fn begin_frame(&mut self, setup: &FrameSetup) -> Result<(), BackendError> {
        self.in_frame = true;
        self.commands.push(GpuCommand::BeginFrame(*setup));
        Ok(())
    }

    fn compile_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramHandle, BackendError> {
        if let Some(diagnostic) = &self.compile_error {
            return Err(BackendError::Compile(diagnostic.clone()));
        }
        let program = ProgramHandle(self.next());
        self.commands.push(GpuCommand::CompileProgram {
            program,
            attributes: source.attributes.to_vec(),
        });
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.commands.push(GpuCommand::DeleteProgram(program));
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.commands.push(GpuCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: &UniformValue) {
        self.commands.push(GpuCommand::SetUniform {
            program,
            name: name.to_owned(),
            value: *value,
        });
    }

    fn set_texture_uniform(&mut self, program: ProgramHandle, name: &str, unit: TextureUnit) {
        self.commands.push(GpuCommand::SetTextureUniform {
            program,
            name: name.to_owned(),
            unit,
        });
    }

    fn create_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: &AttributeBuffer,
    ) -> Result<BufferHandle, BackendError> {
        let handle = BufferHandle(self.next());
        self.commands.push(GpuCommand::CreateVertexBuffer {
            buffer: handle,
            slot,
            layout: buffer.layout(),
            items: buffer.item_count(),
        });
        Ok(handle)
    }

    fn create_index_buffer(&mut self, indices: &[u16]) -> Result<BufferHandle, BackendError> {
        let handle = BufferHandle(self.next());
        self.commands.push(GpuCommand::CreateIndexBuffer {
            buffer: handle,
            count: indices.len(),
        });
        Ok(handle)
    }

    fn draw(&mut self, call: &DrawCall) -> Result<(), BackendError> {
        if !self.in_frame {
            return Err(BackendError::NoFrame);
        }
        if self
            .modes
            .as_ref()
            .is_some_and(|modes| !modes.contains(&call.mode))
        {
            return Err(BackendError::UnsupportedDrawMode(call.mode));
        }
        self.commands.push(GpuCommand::Draw(*call));
        Ok(())
    }

    fn release_buffers(&mut self, buffers: &[BufferHandle]) {
        self.commands.push(GpuCommand::ReleaseBuffers(buffers.to_vec()));
    }

    fn create_texture(
        &mut self,
        unit: TextureUnit,
        image: &TextureImage,
        sampler: &SamplerSettings,
    ) -> Result<TextureHandle, BackendError> {
        let texture = TextureHandle(self.next());
        self.commands.push(GpuCommand::CreateTexture {
            texture,
            unit,
            width: image.width(),
            height: image.height(),
            faces: image.faces().len(),
            sampler: *sampler,
        });
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.commands.push(GpuCommand::DeleteTexture(texture));
    }

    fn present(&mut self) -> Result<(), BackendError> {
        if !self.in_frame {
            return Err(BackendError::NoFrame);
        }
        self.in_frame = false;
        self.commands.push(GpuCommand::Present);
        Ok(())
    }
}
