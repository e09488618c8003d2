//! Procedural shapes.
//!
//! Each generator fills `positions`, `normals`, `uvs` and a 16-bit index list and returns a
//! ready-to-place [`Shape`] with no shader. Inputs that would produce an empty mesh or more
//! vertices than a 16-bit index can reach are rejected with a [`GeometryError`].
//!
//! | Generator | Vertices | Indices |
//! |-----------|----------|---------|
//! | [`sphere`] | `segments × (segments - 2) + 2` | `6 × segments²` |
//! | [`plane`] | `(segments + 1)²` | `6 × segments²` |
//! | [`cube`] | 24 | 36 |
//!
//! ```
//! use pegasus3d::geometry;
//!
//! let ball = geometry::sphere(1.0, 4).unwrap();
//! assert_eq!(ball.vertex_count(), Some(10));
//! assert!(geometry::sphere(1.0, 2).is_err());
//! ```

use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::mesh::AttributeBuffer;
use crate::shape::{NORMALS, POSITIONS, Shape, UVS};

/// Vertex ceiling imposed by 16-bit indices.
pub const MAX_VERTICES: u64 = 1 << 16;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("{shape} needs at least {min} segments, got {got}")]
    TooFewSegments {
        shape: &'static str,
        min: u32,
        got: u32,
    },
    #[error("{shape} would need {vertices} vertices, more than 16-bit indices can address")]
    TooManyVertices { shape: &'static str, vertices: u64 },
}

/// Vertex data accumulated by a generator.
#[derive(Default)]
struct MeshBuilder {
    positions: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    indices: Vec<u16>,
}

impl MeshBuilder {
    fn with_capacity(vertices: usize, indices: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices * 3),
            normals: Vec::with_capacity(vertices * 3),
            uvs: Vec::with_capacity(vertices * 2),
            indices: Vec::with_capacity(indices),
        }
    }

    fn vertex(&mut self, position: Vec3, normal: Vec3, uv: Vec2) {
        self.positions.extend_from_slice(&position.to_array());
        self.normals.extend_from_slice(&normal.to_array());
        self.uvs.extend_from_slice(&uv.to_array());
    }

    fn triangle(&mut self, a: u16, b: u16, c: u16) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    fn build(self) -> Shape {
        Shape::new()
            .with_attribute(POSITIONS, AttributeBuffer::f32(3, self.positions))
            .with_attribute(NORMALS, AttributeBuffer::f32(3, self.normals))
            .with_attribute(UVS, AttributeBuffer::f32(2, self.uvs))
            .with_indices(self.indices)
    }
}

fn check_vertices(shape: &'static str, vertices: u64) -> Result<(), GeometryError> {
    if vertices >= MAX_VERTICES {
        log::warn!("{shape} rejected: {vertices} vertices exceed the 16-bit index range");
        return Err(GeometryError::TooManyVertices { shape, vertices });
    }
    Ok(())
}

fn too_few(shape: &'static str, min: u32, got: u32) -> GeometryError {
    log::warn!("{shape} rejected: {got} segments, need at least {min}");
    GeometryError::TooFewSegments { shape, min, got }
}

/// A UV sphere of `radius` centered on the origin.
///
/// There are `segments` vertex rows from pole to pole: one vertex at each pole and
/// `segments - 2` rings of `segments` vertices between them. The index list always covers a
/// full `segments × segments` grid of quads. Quads that touch a pole collapse one of their
/// triangles onto the pole vertex, and the last band lies entirely on the south pole, so
/// those triangles are degenerate and rasterize to nothing.
pub fn sphere(radius: f32, segments: u32) -> Result<Shape, GeometryError> {
    if segments <= 2 {
        return Err(too_few("sphere", 3, segments));
    }
    let s = segments as u64;
    check_vertices("sphere", s * (s - 2) + 2)?;

    let n = segments as usize;
    let rows = n;
    let south = (n * (n - 2) + 1) as u16;
    let mut mesh = MeshBuilder::with_capacity(n * (n - 2) + 2, 6 * n * n);

    mesh.vertex(Vec3::Y * radius, Vec3::Y, Vec2::new(0.5, 0.0));
    for row in 1..rows - 1 {
        let phi = PI * row as f32 / (rows - 1) as f32;
        let (ring_radius, y) = phi.sin_cos();
        for seg in 0..n {
            let theta = 2.0 * PI * seg as f32 / n as f32;
            let normal = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());
            let uv = Vec2::new(seg as f32 / n as f32, row as f32 / (rows - 1) as f32);
            mesh.vertex(normal * radius, normal, uv);
        }
    }
    mesh.vertex(Vec3::NEG_Y * radius, Vec3::NEG_Y, Vec2::new(0.5, 1.0));

    let index = |row: usize, seg: usize| -> u16 {
        if row == 0 {
            0
        } else if row >= rows - 1 {
            south
        } else {
            (1 + (row - 1) * n + seg % n) as u16
        }
    };
    for band in 0..n {
        for seg in 0..n {
            let a = index(band, seg);
            let b = index(band, seg + 1);
            let c = index(band + 1, seg);
            let d = index(band + 1, seg + 1);
            mesh.triangle(a, b, c);
            mesh.triangle(b, d, c);
        }
    }

    Ok(mesh.build())
}

/// A unit square on the XZ plane, facing +Y, split into `segments × segments` cells.
///
/// Texture coordinates run from 0 to `uv_repeat` across the plane.
pub fn plane(segments: u32, uv_repeat: f32) -> Result<Shape, GeometryError> {
    if segments < 1 {
        return Err(too_few("plane", 1, segments));
    }
    let s = segments as u64;
    check_vertices("plane", (s + 1) * (s + 1))?;

    let n = segments as usize;
    let stride = n + 1;
    let mut mesh = MeshBuilder::with_capacity(stride * stride, 6 * n * n);
    for j in 0..=n {
        for i in 0..=n {
            let (u, v) = (i as f32 / n as f32, j as f32 / n as f32);
            mesh.vertex(
                Vec3::new(u - 0.5, 0.0, v - 0.5),
                Vec3::Y,
                Vec2::new(u, v) * uv_repeat,
            );
        }
    }
    for j in 0..n {
        for i in 0..n {
            let a = (j * stride + i) as u16;
            let b = a + 1;
            let c = a + stride as u16;
            let d = c + 1;
            mesh.triangle(a, c, b);
            mesh.triangle(b, c, d);
        }
    }

    Ok(mesh.build())
}

/// A cube with edges of length `size`, centered on the origin.
///
/// Each face has its own four vertices so normals and texture coordinates stay flat.
pub fn cube(size: f32) -> Shape {
    // (normal, u axis, v axis) per face; the face corner order keeps triangles counter-clockwise.
    const FACES: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    ];
    const CORNERS: [Vec2; 4] = [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
    ];

    let half = size * 0.5;
    let mut mesh = MeshBuilder::with_capacity(24, 36);
    for (face, (normal, u_axis, v_axis)) in FACES.iter().enumerate() {
        for corner in CORNERS {
            let offset = *u_axis * (corner.x * 2.0 - 1.0) + *v_axis * (corner.y * 2.0 - 1.0);
            mesh.vertex((*normal + offset) * half, *normal, corner);
        }
        let base = (face * 4) as u16;
        mesh.triangle(base, base + 1, base + 2);
        mesh.triangle(base + 2, base + 3, base);
    }
    mesh.build()
}
