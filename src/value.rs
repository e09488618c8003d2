//! Typed property values handed to nodes by the host.
//!
//! The host layer sets node properties (uniform inputs, light colors, custom shader data)
//! as [`Value`]s. The render path never inspects them except through
//! [`UniformValue::from_value`](crate::backend::UniformValue::from_value), which decides
//! whether a value has a shape the GPU can receive.

use std::rc::Rc;

use glam::{Mat2, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

use crate::texture::Texture;

/// RGBA color, each channel nominally in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Opaque gray with all three channels set to `value`.
    pub const fn gray(value: f32) -> Self {
        Self::rgb(value, value, value)
    }

    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.r, self.g, self.b, self.a)
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Color::rgba(r, g, b, a)
    }
}

impl From<Color> for wgpu::Color {
    fn from(c: Color) -> Self {
        wgpu::Color {
            r: c.r as f64,
            g: c.g as f64,
            b: c.b as f64,
            a: c.a as f64,
        }
    }
}

/// A property value as supplied by the host.
///
/// `Floats` carries loose numeric data whose shape is decided by its length when it is
/// uploaded as a uniform.
#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Floats(Vec<f32>),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Quat(Quat),
    Color(Color),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
    Text(String),
    Texture(Rc<Texture>),
}

impl Value {
    /// Short name of the value's shape, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Floats(_) => "float array",
            Value::Vec2(_) => "vec2",
            Value::Vec3(_) => "vec3",
            Value::Vec4(_) => "vec4",
            Value::Quat(_) => "quaternion",
            Value::Color(_) => "color",
            Value::Mat2(_) => "mat2",
            Value::Mat3(_) => "mat3",
            Value::Mat4(_) => "mat4",
            Value::Text(_) => "text",
            Value::Texture(_) => "texture",
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::Vec3(v)
    }
}

impl From<Vec4> for Value {
    fn from(v: Vec4) -> Self {
        Value::Vec4(v)
    }
}

impl From<Color> for Value {
    fn from(v: Color) -> Self {
        Value::Color(v)
    }
}

impl From<Mat4> for Value {
    fn from(v: Mat4) -> Self {
        Value::Mat4(v)
    }
}

impl From<Rc<Texture>> for Value {
    fn from(v: Rc<Texture>) -> Self {
        Value::Texture(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_sets_all_channels_opaque() {
        assert_eq!(Color::gray(0.25), Color::rgba(0.25, 0.25, 0.25, 1.0));
    }

    #[test]
    fn default_color_is_white() {
        assert_eq!(Color::default(), Color::WHITE);
    }
}
