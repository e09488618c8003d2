//! # Pegasus3d
//!
//! **The transform and render-traversal core of a 3D scene browser.**
//!
//! A scene is a tree of nodes ([`Group`], [`Shape`], [`Light`]) each carrying a
//! [`Placement`]. Once per tick the host hands the tree to a [`Camera`], which composes world
//! matrices, gathers light state, computes its view and projection, and drives a
//! [`GpuBackend`](backend::GpuBackend) through one draw per visible shape, in document order.
//!
//! ## Quick Start
//!
//! ```
//! use std::rc::Rc;
//! use pegasus3d::backend::RecordingBackend;
//! use pegasus3d::*;
//!
//! let shader = Rc::new(
//!     ShaderDef::new("vertex text", "fragment text")
//!         .attributes(["positions", "normals"])
//!         .uniforms(["mvpmatrix", "lightOrigin"]),
//! );
//! let ball = geometry::sphere(1.0, 16).unwrap().with_shader(shader);
//!
//! let mut world = World::new(
//!     Group::new()
//!         .with(Light::new().at(Vec3::new(2.0, 4.0, 0.0)))
//!         .with(ball),
//! );
//! let mut camera = Camera::new().at(Vec3::new(0.0, 0.0, 6.0));
//!
//! let mut backend = RecordingBackend::new();
//! let mut resources = RenderResources::new();
//! let report = camera.render(&mut world, &mut backend, &mut resources).unwrap();
//! assert_eq!(report.stats.draws, 1);
//! ```
//!
//! ## Layout
//!
//! - [`math`]: column-major matrix operations over glam types
//! - [`Placement`] and [`SceneNode`]: the per-node transform and the two-pass protocol
//! - [`ShaderDef`], [`Texture`]: GPU programs and images, cached per GPU context in
//!   [`RenderResources`]
//! - [`backend`]: the GPU contract, a recording backend for headless use, and the wgpu backend

pub mod backend;
mod camera;
mod config;
pub mod geometry;
mod gpu;
mod group;
mod light;
pub mod math;
mod mesh;
mod node;
mod placement;
mod render;
mod shader;
mod shape;
mod texture;
mod value;

pub use camera::{Camera, CameraState, Follow, FrameReport, Projection, RenderError, World};
pub use config::{CameraConfig, ConfigError, RenderConfig};
pub use geometry::GeometryError;
pub use gpu::GpuContext;
pub use group::Group;
pub use light::{Light, LightState};
pub use mesh::{AttributeBuffer, BufferData, DrawMode, ElementType, VertexLayout};
pub use node::{FrameState, SceneNode};
pub use placement::{NodeId, Placement, Visibility};
pub use render::{FrameStats, RenderContext, RenderResources};
pub use shader::{BindError, ShaderCache, ShaderDef, ShaderId, UniformSources, resolve_uniform};
pub use shape::{COLORS, NORMALS, POSITIONS, Shape, ShapeError, UVS};
pub use texture::{
    MagFilter, MinFilter, SamplerSettings, Texture, TextureCache, TextureError, TextureId,
    TextureImage, TextureUnits, Wrap,
};
pub use value::{Color, Value};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
