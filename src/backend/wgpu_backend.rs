//! [`GpuBackend`] over wgpu.
//!
//! # Shader conventions
//!
//! Each program is two WGSL modules, the vertex text with entry point `vs_main` and the
//! fragment text with entry point `fs_main`. Attribute `i` of the program arrives at
//! `@location(i)`. Non-texture uniforms are packed, in declaration order, into one uniform
//! buffer at `@group(0) @binding(0)`; the WGSL struct must declare the same members in the
//! same order. A texture uniform at position `i` of the uniform list binds its texture at
//! `@group(1) @binding(2 * i)` and its sampler at `@group(1) @binding(2 * i + 1)`.
//! Every non-texture uniform must have been set before a draw; the struct has no defaults.
//!
//! # Depth range
//!
//! Projections from [`crate::math`] produce OpenGL clip space, where depth runs from `-w` to
//! `w`. wgpu clips depth to `0..w`, so `pmatrix` and `mvpmatrix` are premultiplied by
//! [`OPENGL_TO_WGPU`] as they are staged. Shaders use them unchanged.
//!
//! # Frames
//!
//! `begin_frame` acquires the surface texture and clears color and depth in one pass. Each
//! draw then records its own pass that loads both attachments, so draws land in call order.
//! Everything is submitted together by `present`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use glam::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use wgpu::util::DeviceExt;

use crate::backend::{
    BackendError, BufferHandle, DrawCall, FrameSetup, GpuBackend, ProgramHandle, ProgramSource,
    TextureHandle, TextureUnit, UniformValue, Viewport,
};
use crate::gpu::{DEPTH_FORMAT, GpuContext};
use crate::mesh::{AttributeBuffer, DrawMode, ElementType, VertexLayout};
use crate::texture::{MagFilter, MinFilter, SamplerSettings, TextureImage, Wrap};

const VERTEX_ENTRY: &str = "vs_main";
const FRAGMENT_ENTRY: &str = "fs_main";

/// Maps OpenGL clip-space depth `[-w, w]` onto wgpu's `[0, w]`.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
]);

/// Uniform names whose matrix ends in clip space.
const CLIP_SPACE_UNIFORMS: [&str; 2] = ["pmatrix", "mvpmatrix"];

struct Program {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    uniforms: Vec<String>,
    values: HashMap<String, UniformValue>,
    samplers: HashMap<String, TextureUnit>,
}

impl Program {
    fn packed_uniforms(&self) -> Result<Vec<u8>, BackendError> {
        let values = ordered_uniforms(&self.uniforms, &self.values, &self.samplers)?;
        Ok(pack_uniforms(&values))
    }
}

/// Staged values in declaration order, skipping texture uniforms.
///
/// A member with no value would shift every later member into the wrong slot of the WGSL
/// struct, so it fails the draw instead.
fn ordered_uniforms(
    names: &[String],
    values: &HashMap<String, UniformValue>,
    samplers: &HashMap<String, TextureUnit>,
) -> Result<Vec<UniformValue>, BackendError> {
    names
        .iter()
        .filter(|name| !samplers.contains_key(*name))
        .map(|name| {
            values
                .get(name)
                .copied()
                .ok_or_else(|| BackendError::UnsetUniform(name.clone()))
        })
        .collect()
}

/// Bytes needed for `layers` RGBA8 images of the given size.
fn rgba_len(width: u32, height: u32, layers: usize) -> Result<usize, BackendError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .and_then(|bytes| bytes.checked_mul(layers))
        .ok_or_else(|| BackendError::Image(format!("{width}x{height}x{layers} is too large")))
}

/// The value as staged for wgpu: clip-space matrices get their depth range remapped.
fn staged_value(name: &str, value: &UniformValue) -> UniformValue {
    match *value {
        UniformValue::Mat4(m) if CLIP_SPACE_UNIFORMS.contains(&name) => {
            UniformValue::Mat4(OPENGL_TO_WGPU * m)
        }
        other => other,
    }
}

struct VertexBinding {
    slot: u32,
    buffer: BufferHandle,
    format: wgpu::VertexFormat,
    stride: u64,
}

struct GpuTexture {
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

struct Frame {
    surface: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    viewport: Option<Viewport>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    topology: wgpu::PrimitiveTopology,
    strip_index: bool,
    vertex: Vec<(wgpu::VertexFormat, u64)>,
    blend: bool,
}

/// Draws through a [`GpuContext`] it owns.
pub struct WgpuBackend {
    gpu: GpuContext,
    depth_view: wgpu::TextureView,
    depth_size: (u32, u32),
    programs: HashMap<ProgramHandle, Program>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    current: Option<ProgramHandle>,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    pending: Vec<VertexBinding>,
    textures: HashMap<TextureHandle, GpuTexture>,
    units: HashMap<TextureUnit, TextureHandle>,
    frame: Option<Frame>,
    next_handle: u64,
}

impl WgpuBackend {
    pub fn new(gpu: GpuContext) -> Self {
        let (_, depth_view) = gpu.create_depth_texture();
        let depth_size = (gpu.width(), gpu.height());
        Self {
            gpu,
            depth_view,
            depth_size,
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            current: None,
            buffers: HashMap::new(),
            pending: Vec::new(),
            textures: HashMap::new(),
            units: HashMap::new(),
            frame: None,
            next_handle: 0,
        }
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn ensure_depth_size(&mut self) {
        let size = (self.gpu.width(), self.gpu.height());
        if self.depth_size != size {
            let (_, view) = self.gpu.create_depth_texture();
            self.depth_view = view;
            self.depth_size = size;
        }
    }

    /// Runs `f` under a validation error scope, turning a validation error or a panic from
    /// wgpu into a message.
    fn scoped<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> Result<T, String> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = catch_unwind(AssertUnwindSafe(f));
        let error = pollster::block_on(device.pop_error_scope());
        match (result, error) {
            (Ok(value), None) => Ok(value),
            (Ok(_), Some(err)) => Err(err.to_string()),
            (Err(_), _) => Err("wgpu panicked".into()),
        }
    }

    fn compile_module(&self, label: &str, text: &str) -> Result<wgpu::ShaderModule, BackendError> {
        Self::scoped(&self.gpu.device, || {
            self.gpu
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(text)),
                })
        })
        .map_err(BackendError::Compile)
    }

    fn pipeline(&mut self, key: &PipelineKey) -> Result<&wgpu::RenderPipeline, BackendError> {
        if !self.pipelines.contains_key(key) {
            let pipeline = self.create_pipeline(key)?;
            self.pipelines.insert(key.clone(), pipeline);
        }
        self.pipelines
            .get(key)
            .ok_or(BackendError::UnknownHandle {
                kind: "pipeline",
                id: key.program.0,
            })
    }

    fn create_pipeline(&self, key: &PipelineKey) -> Result<wgpu::RenderPipeline, BackendError> {
        let program = self
            .programs
            .get(&key.program)
            .ok_or(BackendError::UnknownHandle {
                kind: "program",
                id: key.program.0,
            })?;

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = key
            .vertex
            .iter()
            .enumerate()
            .map(|(location, (format, _))| {
                [wgpu::VertexAttribute {
                    format: *format,
                    offset: 0,
                    shader_location: location as u32,
                }]
            })
            .collect();
        let layouts: Vec<wgpu::VertexBufferLayout<'_>> = key
            .vertex
            .iter()
            .zip(&attributes)
            .map(|((_, stride), attribute)| wgpu::VertexBufferLayout {
                array_stride: *stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attribute,
            })
            .collect();

        let blend = if key.blend {
            wgpu::BlendState::ALPHA_BLENDING
        } else {
            wgpu::BlendState::REPLACE
        };

        Self::scoped(&self.gpu.device, || {
            self.gpu
                .device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("Shape Pipeline"),
                    layout: None,
                    vertex: wgpu::VertexState {
                        module: &program.vertex,
                        entry_point: Some(VERTEX_ENTRY),
                        buffers: &layouts,
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &program.fragment,
                        entry_point: Some(FRAGMENT_ENTRY),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: self.gpu.config.format,
                            blend: Some(blend),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: key.topology,
                        strip_index_format: key.strip_index.then_some(wgpu::IndexFormat::Uint16),
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        ..Default::default()
                    },
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: DEPTH_FORMAT,
                        depth_write_enabled: !key.blend,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                })
        })
        .map_err(BackendError::Pipeline)
    }

    /// Uniform and texture bind groups for `program` against `pipeline`'s layout.
    fn bind_groups(
        &self,
        program: &Program,
        pipeline: &wgpu::RenderPipeline,
    ) -> Result<Vec<(u32, wgpu::BindGroup)>, BackendError> {
        let device = &self.gpu.device;
        let packed = program.packed_uniforms()?;
        let mut textures = Vec::new();
        for (index, name) in program.uniforms.iter().enumerate() {
            let Some(unit) = program.samplers.get(name) else {
                continue;
            };
            let texture = self
                .units
                .get(unit)
                .and_then(|handle| self.textures.get(handle))
                .ok_or(BackendError::UnknownHandle {
                    kind: "texture unit",
                    id: unit.0 as u64,
                })?;
            textures.push((index as u32, texture));
        }

        Self::scoped(device, || {
            let mut groups = Vec::with_capacity(2);
            if !packed.is_empty() {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Shape Uniforms"),
                    contents: &packed,
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Shape Uniform Bind Group"),
                    layout: &pipeline.get_bind_group_layout(0),
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                groups.push((0, group));
            }
            if !textures.is_empty() {
                let entries: Vec<wgpu::BindGroupEntry<'_>> = textures
                    .iter()
                    .flat_map(|(index, texture)| {
                        [
                            wgpu::BindGroupEntry {
                                binding: index * 2,
                                resource: wgpu::BindingResource::TextureView(&texture.view),
                            },
                            wgpu::BindGroupEntry {
                                binding: index * 2 + 1,
                                resource: wgpu::BindingResource::Sampler(&texture.sampler),
                            },
                        ]
                    })
                    .collect();
                let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Shape Texture Bind Group"),
                    layout: &pipeline.get_bind_group_layout(1),
                    entries: &entries,
                });
                groups.push((1, group));
            }
            groups
        })
        .map_err(BackendError::Pipeline)
    }

    fn encode_draw(&mut self, call: &DrawCall) -> Result<(), BackendError> {
        let program_handle = self.current.ok_or(BackendError::UnknownHandle {
            kind: "program",
            id: 0,
        })?;
        let topology = topology(call.mode)?;
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|binding| binding.slot);
        let key = PipelineKey {
            program: program_handle,
            topology,
            strip_index: call.indices.is_some() && topology.is_strip(),
            vertex: pending.iter().map(|b| (b.format, b.stride)).collect(),
            blend: call.blend,
        };

        self.pipeline(&key)?;
        let (Some(pipeline), Some(program)) = (
            self.pipelines.get(&key),
            self.programs.get(&program_handle),
        ) else {
            return Err(BackendError::UnknownHandle {
                kind: "program",
                id: program_handle.0,
            });
        };
        let groups = self.bind_groups(program, pipeline)?;

        let frame = self.frame.as_mut().ok_or(BackendError::NoFrame)?;
        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shape Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if let Some(v) = frame.viewport {
            pass.set_viewport(
                v.x as f32,
                v.y as f32,
                v.width as f32,
                v.height as f32,
                0.0,
                1.0,
            );
        }
        pass.set_pipeline(pipeline);
        for (index, group) in &groups {
            pass.set_bind_group(*index, group, &[]);
        }
        for (location, binding) in pending.iter().enumerate() {
            let buffer = self
                .buffers
                .get(&binding.buffer)
                .ok_or(BackendError::UnknownHandle {
                    kind: "buffer",
                    id: binding.buffer.0,
                })?;
            pass.set_vertex_buffer(location as u32, buffer.slice(..));
        }
        match call.indices {
            Some(handle) => {
                let buffer = self.buffers.get(&handle).ok_or(BackendError::UnknownHandle {
                    kind: "buffer",
                    id: handle.0,
                })?;
                pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..call.count, 0, 0..1);
            }
            None => pass.draw(0..call.count, 0..1),
        }
        Ok(())
    }
}

impl GpuBackend for WgpuBackend {
    fn begin_frame(&mut self, setup: &FrameSetup) -> Result<(), BackendError> {
        if self.frame.is_some() {
            log::warn!("begin_frame called twice without present; dropping the open frame");
            self.frame = None;
        }
        self.ensure_depth_size();

        let surface = match self.gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.gpu.surface.configure(&self.gpu.device, &self.gpu.config);
                return Err(BackendError::Surface(err.to_string()));
            }
            Err(err) => return Err(BackendError::Surface(err.to_string())),
        };
        let view = surface
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        // Load ops clear the whole attachment regardless of viewport.
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(setup.clear.into()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        self.frame = Some(Frame {
            surface,
            view,
            encoder,
            viewport: setup.viewport,
        });
        Ok(())
    }

    fn compile_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramHandle, BackendError> {
        let vertex = self.compile_module("Vertex Shader", source.vertex)?;
        let fragment = self.compile_module("Fragment Shader", source.fragment)?;
        let handle = ProgramHandle(self.next());
        self.programs.insert(
            handle,
            Program {
                vertex,
                fragment,
                uniforms: source.uniforms.to_vec(),
                values: HashMap::new(),
                samplers: HashMap::new(),
            },
        );
        log::debug!(
            "compiled program {} with {} attributes",
            handle.0,
            source.attributes.len()
        );
        Ok(handle)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.pipelines.retain(|key, _| key.program != program);
        if self.current == Some(program) {
            self.current = None;
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current = Some(program);
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: &UniformValue) {
        if let Some(program) = self.programs.get_mut(&program) {
            program.samplers.remove(name);
            program
                .values
                .insert(name.to_owned(), staged_value(name, value));
        }
    }

    fn set_texture_uniform(&mut self, program: ProgramHandle, name: &str, unit: TextureUnit) {
        if let Some(program) = self.programs.get_mut(&program) {
            program.values.remove(name);
            program.samplers.insert(name.to_owned(), unit);
        }
    }

    fn create_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: &AttributeBuffer,
    ) -> Result<BufferHandle, BackendError> {
        let layout = buffer.layout();
        let format = vertex_format(layout)?;
        let gpu_buffer = self
            .gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Attribute Buffer"),
                contents: buffer.data().as_bytes(),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, gpu_buffer);
        self.pending.retain(|binding| binding.slot != slot);
        self.pending.push(VertexBinding {
            slot,
            buffer: handle,
            format,
            stride: layout.stride() as u64,
        });
        Ok(handle)
    }

    fn create_index_buffer(&mut self, indices: &[u16]) -> Result<BufferHandle, BackendError> {
        let gpu_buffer = self
            .gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, gpu_buffer);
        Ok(handle)
    }

    fn draw(&mut self, call: &DrawCall) -> Result<(), BackendError> {
        if self.frame.is_none() {
            self.pending.clear();
            return Err(BackendError::NoFrame);
        }
        let result = self.encode_draw(call);
        self.pending.clear();
        result
    }

    fn release_buffers(&mut self, buffers: &[BufferHandle]) {
        for handle in buffers {
            self.buffers.remove(handle);
        }
        self.pending
            .retain(|binding| !buffers.contains(&binding.buffer));
    }

    fn create_texture(
        &mut self,
        unit: TextureUnit,
        image: &TextureImage,
        sampler: &SamplerSettings,
    ) -> Result<TextureHandle, BackendError> {
        let layers = image.faces().len() as u32;
        let mut data =
            Vec::with_capacity(rgba_len(image.width(), image.height(), image.faces().len())?);
        for face in 0..image.faces().len() {
            let rgba = image
                .rgba_face(face)
                .ok_or_else(|| BackendError::Image(format!("face {face} is missing")))?;
            data.extend_from_slice(&rgba);
        }
        if sampler.mipmap {
            log::debug!("mipmap generation is not supported; uploading the base level only");
        }

        let device = &self.gpu.device;
        let queue = &self.gpu.queue;
        let (view, gpu_sampler) = Self::scoped(device, || {
            let texture = device.create_texture_with_data(
                queue,
                &wgpu::TextureDescriptor {
                    label: Some("Scene Texture"),
                    size: wgpu::Extent3d {
                        width: image.width(),
                        height: image.height(),
                        depth_or_array_layers: layers,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8UnormSrgb,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &data,
            );
            let view = texture.create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(if image.is_cube() {
                    wgpu::TextureViewDimension::Cube
                } else {
                    wgpu::TextureViewDimension::D2
                }),
                ..Default::default()
            });
            (view, device.create_sampler(&sampler_descriptor(sampler)))
        })
        .map_err(BackendError::Image)?;

        let handle = TextureHandle(self.next());
        self.textures.insert(
            handle,
            GpuTexture {
                view,
                sampler: gpu_sampler,
            },
        );
        self.units.insert(unit, handle);
        Ok(handle)
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.units.retain(|_, handle| *handle != texture);
    }

    fn present(&mut self) -> Result<(), BackendError> {
        let frame = self.frame.take().ok_or(BackendError::NoFrame)?;
        self.gpu.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.surface.present();
        Ok(())
    }
}

fn topology(mode: DrawMode) -> Result<wgpu::PrimitiveTopology, BackendError> {
    Ok(match mode {
        DrawMode::Points => wgpu::PrimitiveTopology::PointList,
        DrawMode::Lines => wgpu::PrimitiveTopology::LineList,
        DrawMode::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        DrawMode::Triangles => wgpu::PrimitiveTopology::TriangleList,
        DrawMode::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        other => return Err(BackendError::UnsupportedDrawMode(other)),
    })
}

/// Vertex format for a buffer layout. Byte and short elements are read as normalized.
fn vertex_format(layout: VertexLayout) -> Result<wgpu::VertexFormat, BackendError> {
    use wgpu::VertexFormat as F;
    let format = match (layout.element, layout.components) {
        (ElementType::F32, 1) => Some(F::Float32),
        (ElementType::F32, 2) => Some(F::Float32x2),
        (ElementType::F32, 3) => Some(F::Float32x3),
        (ElementType::F32, 4) => Some(F::Float32x4),
        (ElementType::I32, 1) => Some(F::Sint32),
        (ElementType::I32, 2) => Some(F::Sint32x2),
        (ElementType::I32, 3) => Some(F::Sint32x3),
        (ElementType::I32, 4) => Some(F::Sint32x4),
        (ElementType::U8, 4) => Some(F::Unorm8x4),
        (ElementType::U16, 2) => Some(F::Unorm16x2),
        (ElementType::U16, 4) => Some(F::Unorm16x4),
        _ => None,
    };
    format.ok_or(BackendError::UnsupportedVertexFormat {
        element: layout.element,
        components: layout.components,
    })
}

fn address_mode(wrap: Wrap) -> wgpu::AddressMode {
    match wrap {
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        Wrap::Repeat => wgpu::AddressMode::Repeat,
        Wrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

fn sampler_descriptor(settings: &SamplerSettings) -> wgpu::SamplerDescriptor<'static> {
    use wgpu::FilterMode::{Linear, Nearest};
    let (min_filter, mipmap_filter) = match settings.min_filter {
        MinFilter::Nearest => (Nearest, Nearest),
        MinFilter::Linear => (Linear, Nearest),
        MinFilter::NearestMipmapNearest => (Nearest, Nearest),
        MinFilter::LinearMipmapNearest => (Linear, Nearest),
        MinFilter::NearestMipmapLinear => (Nearest, Linear),
        MinFilter::LinearMipmapLinear => (Linear, Linear),
    };
    wgpu::SamplerDescriptor {
        label: Some("Scene Sampler"),
        address_mode_u: address_mode(settings.wrap_s),
        address_mode_v: address_mode(settings.wrap_t),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: match settings.mag_filter {
            MagFilter::Linear => Linear,
            MagFilter::Nearest => Nearest,
        },
        min_filter,
        mipmap_filter,
        ..Default::default()
    }
}

/// Packs uniform values into a WGSL uniform-buffer struct with the same members in order.
///
/// Members follow WGSL host-shareable layout: scalars align to 4 bytes, `vec2` to 8,
/// `vec3` and `vec4` to 16; `mat2x2` is two 8-byte columns, `mat3x3` three 16-byte columns
/// and `mat4x4` four. The total is padded to a multiple of 16.
pub fn pack_uniforms(values: &[UniformValue]) -> Vec<u8> {
    fn put(out: &mut Vec<u8>, align: usize, floats: &[f32]) {
        out.resize(out.len().next_multiple_of(align), 0);
        out.extend_from_slice(bytemuck::cast_slice(floats));
    }
    fn columns3(m: Mat3) -> [f32; 12] {
        let [a, b, c] = m.to_cols_array_2d();
        [a[0], a[1], a[2], 0.0, b[0], b[1], b[2], 0.0, c[0], c[1], c[2], 0.0]
    }

    let mut out = Vec::new();
    for value in values {
        match *value {
            UniformValue::Float(f) => put(&mut out, 4, &[f]),
            UniformValue::Int(i) => {
                out.resize(out.len().next_multiple_of(4), 0);
                out.extend_from_slice(&i.to_ne_bytes());
            }
            UniformValue::Vec2(v) => put(&mut out, 8, &Vec2::to_array(&v)),
            UniformValue::Vec3(v) => put(&mut out, 16, &Vec3::to_array(&v)),
            UniformValue::Vec4(v) => put(&mut out, 16, &Vec4::to_array(&v)),
            UniformValue::Mat2(m) => put(&mut out, 8, &Mat2::to_cols_array(&m)),
            UniformValue::Mat3(m) => put(&mut out, 16, &columns3(m)),
            UniformValue::Mat4(m) => put(&mut out, 16, &Mat4::to_cols_array(&m)),
        }
    }
    out.resize(out.len().next_multiple_of(16), 0);
    out
}
