//! Per-vertex data as held by shapes.
//!
//! A shape stores each vertex attribute (positions, normals, uvs, colors, or anything a
//! custom shader reads) as a separate [`AttributeBuffer`]: a flat array of numbers plus the
//! number of numbers that make up one vertex. The buffer describes itself, so the upload
//! layout is never re-derived from the shader.
//!
//! ```
//! use pegasus3d::{AttributeBuffer, ElementType};
//!
//! let positions = AttributeBuffer::f32(3, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
//! assert_eq!(positions.element_type(), ElementType::F32);
//! assert_eq!(positions.item_count(), 2);
//! ```

/// Numeric type of a buffer's elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    F32,
    U8,
    U16,
    I32,
}

impl ElementType {
    pub fn size(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::U16 => 2,
            ElementType::F32 | ElementType::I32 => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BufferData {
    F32(Vec<f32>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    I32(Vec<i32>),
}

impl BufferData {
    pub fn element_type(&self) -> ElementType {
        match self {
            BufferData::F32(_) => ElementType::F32,
            BufferData::U8(_) => ElementType::U8,
            BufferData::U16(_) => ElementType::U16,
            BufferData::I32(_) => ElementType::I32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BufferData::F32(v) => v.len(),
            BufferData::U8(v) => v.len(),
            BufferData::U16(v) => v.len(),
            BufferData::I32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes in native order, ready for upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            BufferData::F32(v) => bytemuck::cast_slice(v),
            BufferData::U8(v) => v,
            BufferData::U16(v) => bytemuck::cast_slice(v),
            BufferData::I32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// Layout of one vertex attribute: element type and elements per vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub element: ElementType,
    pub components: u8,
}

impl VertexLayout {
    /// Bytes from one vertex to the next.
    pub fn stride(&self) -> usize {
        self.element.size() * self.components as usize
    }
}

/// A flat attribute array with its own layout.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeBuffer {
    data: BufferData,
    components: u8,
}

impl AttributeBuffer {
    /// Wraps `data`, reading `components` elements per vertex (clamped to `1..=4`).
    pub fn new(components: u8, data: BufferData) -> Self {
        Self {
            data,
            components: components.clamp(1, 4),
        }
    }

    pub fn f32(components: u8, data: Vec<f32>) -> Self {
        Self::new(components, BufferData::F32(data))
    }

    pub fn u8(components: u8, data: Vec<u8>) -> Self {
        Self::new(components, BufferData::U8(data))
    }

    pub fn u16(components: u8, data: Vec<u16>) -> Self {
        Self::new(components, BufferData::U16(data))
    }

    pub fn i32(components: u8, data: Vec<i32>) -> Self {
        Self::new(components, BufferData::I32(data))
    }

    pub fn data(&self) -> &BufferData {
        &self.data
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn components(&self) -> u8 {
        self.components
    }

    pub fn layout(&self) -> VertexLayout {
        VertexLayout {
            element: self.element_type(),
            components: self.components,
        }
    }

    /// Whole vertices in the buffer; a trailing partial vertex is ignored.
    pub fn item_count(&self) -> usize {
        self.data.len() / self.components as usize
    }
}

/// How a vertex or index stream is assembled into primitives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    LinesAdjacency,
    LineStripAdjacency,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
    TrianglesAdjacency,
    TriangleStripAdjacency,
    Patches,
    Polygon,
}

impl DrawMode {
    /// Parses the host-facing mode name (`"Triangles"`, `"LineStrip"`, ...).
    ///
    /// Unknown names fall back to [`DrawMode::Triangles`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "Points" => DrawMode::Points,
            "Lines" => DrawMode::Lines,
            "LineStrip" => DrawMode::LineStrip,
            "LineLoop" => DrawMode::LineLoop,
            "LinesAdjacency" => DrawMode::LinesAdjacency,
            "LineStripAdjacency" => DrawMode::LineStripAdjacency,
            "Triangles" => DrawMode::Triangles,
            "TriangleStrip" => DrawMode::TriangleStrip,
            "TriangleFan" => DrawMode::TriangleFan,
            "TrianglesAdjacency" => DrawMode::TrianglesAdjacency,
            "TriangleStripAdjacency" => DrawMode::TriangleStripAdjacency,
            "Patches" => DrawMode::Patches,
            "Polygon" => DrawMode::Polygon,
            _ => {
                log::debug!("unknown draw mode {name:?}; using Triangles");
                DrawMode::Triangles
            }
        }
    }
}
