//! Textures and texture-unit management.
//!
//! A [`Texture`] is an image plus sampler settings. Shapes refer to textures through
//! `Rc<Texture>` uniform values; the first time a texture is bound, [`TextureCache`] takes
//! the next free [`TextureUnit`], uploads the image to it, and remembers the unit for as
//! long as the texture lives. Textures dropped by the host are deleted from the GPU on the
//! next [`TextureCache::collect`].
//!
//! # Image Data
//!
//! Pixel data arrives already decoded from the resource loader: width, height, bytes per
//! pixel (3 for RGB, 4 for RGBA), and one face for a 2D texture or six faces
//! (+X, -X, +Y, -Y, +Z, -Z) for a cube map. [`TextureImage::from_encoded`] is a convenience
//! for hosts that hold PNG/JPEG bytes instead.

use std::borrow::Cow;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{BackendError, GpuBackend, TextureHandle, TextureUnit};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("expected {expected} bytes of pixel data, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("a texture has 1 or 6 faces, got {0}")]
    FaceCount(usize),
    #[error("unsupported pixel size of {0} bytes (expected 3 or 4)")]
    PixelSize(u8),
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Decoded pixel data for a 2D texture or cube map.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    bytes_per_pixel: u8,
    faces: Vec<Vec<u8>>,
}

impl TextureImage {
    /// A 2D image. `pixels` holds `width × height × bytes_per_pixel` bytes, row by row.
    pub fn new(
        width: u32,
        height: u32,
        bytes_per_pixel: u8,
        pixels: Vec<u8>,
    ) -> Result<Self, TextureError> {
        Self::with_faces(width, height, bytes_per_pixel, vec![pixels])
    }

    /// A cube map from six square faces in +X, -X, +Y, -Y, +Z, -Z order.
    pub fn cube(
        size: u32,
        bytes_per_pixel: u8,
        faces: Vec<Vec<u8>>,
    ) -> Result<Self, TextureError> {
        if faces.len() != 6 {
            return Err(TextureError::FaceCount(faces.len()));
        }
        Self::with_faces(size, size, bytes_per_pixel, faces)
    }

    fn with_faces(
        width: u32,
        height: u32,
        bytes_per_pixel: u8,
        faces: Vec<Vec<u8>>,
    ) -> Result<Self, TextureError> {
        if !matches!(bytes_per_pixel, 3 | 4) {
            return Err(TextureError::PixelSize(bytes_per_pixel));
        }
        if faces.len() != 1 && faces.len() != 6 {
            return Err(TextureError::FaceCount(faces.len()));
        }
        let expected = width as usize * height as usize * bytes_per_pixel as usize;
        if let Some(bad) = faces.iter().find(|f| f.len() != expected) {
            return Err(TextureError::SizeMismatch {
                expected,
                actual: bad.len(),
            });
        }
        Ok(Self {
            width,
            height,
            bytes_per_pixel,
            faces,
        })
    }

    /// Decodes PNG, JPEG or any other format the `image` crate understands into RGBA.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, TextureError> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = img.dimensions();
        Self::new(width, height, 4, img.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_pixel(&self) -> u8 {
        self.bytes_per_pixel
    }

    pub fn faces(&self) -> &[Vec<u8>] {
        &self.faces
    }

    pub fn is_cube(&self) -> bool {
        self.faces.len() == 6
    }

    /// More than three bytes per pixel means the data carries alpha.
    pub fn has_alpha(&self) -> bool {
        self.bytes_per_pixel > 3
    }

    /// Face `index` as RGBA, filling in opaque alpha for RGB data.
    pub fn rgba_face(&self, index: usize) -> Option<Cow<'_, [u8]>> {
        let face = self.faces.get(index)?;
        if self.has_alpha() {
            return Some(Cow::Borrowed(face));
        }
        let mut out = Vec::with_capacity(face.len() / 3 * 4);
        for px in face.chunks_exact(3) {
            out.extend_from_slice(px);
            out.push(u8::MAX);
        }
        Some(Cow::Owned(out))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Wrap {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

impl Wrap {
    /// Parses a host-facing name; anything unrecognized clamps.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Repeat" => Wrap::Repeat,
            "MirroredRepeat" => Wrap::MirroredRepeat,
            _ => Wrap::ClampToEdge,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MagFilter {
    #[default]
    Linear,
    Nearest,
}

impl MagFilter {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Nearest" => MagFilter::Nearest,
            _ => MagFilter::Linear,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    #[default]
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl MinFilter {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Nearest" => MinFilter::Nearest,
            "Linear" => MinFilter::Linear,
            "NearestMipmapNearest" => MinFilter::NearestMipmapNearest,
            "LinearMipmapNearest" => MinFilter::LinearMipmapNearest,
            "LinearMipmapLinear" => MinFilter::LinearMipmapLinear,
            _ => MinFilter::NearestMipmapLinear,
        }
    }
}

/// How a texture is sampled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerSettings {
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
    pub mag_filter: MagFilter,
    pub min_filter: MinFilter,
    pub mipmap: bool,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            wrap_s: Wrap::default(),
            wrap_t: Wrap::default(),
            mag_filter: MagFilter::default(),
            min_filter: MinFilter::default(),
            mipmap: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

/// An image with sampler settings, shared between shapes as `Rc<Texture>`.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    pub image: TextureImage,
    pub sampler: SamplerSettings,
}

impl Texture {
    pub fn new(image: TextureImage) -> Self {
        Self {
            id: TextureId(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed)),
            image,
            sampler: SamplerSettings::default(),
        }
    }

    pub fn with_sampler(mut self, sampler: SamplerSettings) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn id(&self) -> TextureId {
        self.id
    }
}

/// Hands out texture units in increasing order for one GPU context.
#[derive(Debug, Default)]
pub struct TextureUnits {
    next: u32,
}

impl TextureUnits {
    pub fn allocate(&mut self) -> TextureUnit {
        let unit = TextureUnit(self.next);
        self.next += 1;
        unit
    }

    /// Number of units handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next
    }
}

#[derive(Debug)]
struct Uploaded {
    texture: Weak<Texture>,
    unit: TextureUnit,
    handle: TextureHandle,
}

/// Textures uploaded to one GPU context, keyed by texture identity.
#[derive(Debug, Default)]
pub struct TextureCache {
    units: TextureUnits,
    uploaded: HashMap<TextureId, Uploaded>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the unit holding `texture`, uploading it on first use.
    pub fn bind(
        &mut self,
        texture: &Rc<Texture>,
        backend: &mut dyn GpuBackend,
    ) -> Result<TextureUnit, BackendError> {
        if let Some(entry) = self.uploaded.get(&texture.id) {
            return Ok(entry.unit);
        }
        let unit = self.units.allocate();
        let handle = backend.create_texture(unit, &texture.image, &texture.sampler)?;
        log::debug!(
            "uploaded {}x{} texture to unit {}",
            texture.image.width(),
            texture.image.height(),
            unit.0
        );
        self.uploaded.insert(
            texture.id,
            Uploaded {
                texture: Rc::downgrade(texture),
                unit,
                handle,
            },
        );
        Ok(unit)
    }

    pub fn unit_of(&self, texture: &Texture) -> Option<TextureUnit> {
        self.uploaded.get(&texture.id).map(|e| e.unit)
    }

    /// Deletes GPU textures whose [`Texture`] has been dropped.
    pub fn collect(&mut self, backend: &mut dyn GpuBackend) {
        self.uploaded.retain(|_, entry| {
            let alive = entry.texture.strong_count() > 0;
            if !alive {
                backend.delete_texture(entry.handle);
            }
            alive
        });
    }

    pub fn len(&self) -> usize {
        self.uploaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploaded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GpuCommand, RecordingBackend};

    fn checker() -> Rc<Texture> {
        let pixels = vec![0, 0, 0, 255, 255, 255, 255, 255, 255, 0, 0, 0];
        let image = TextureImage::new(2, 2, 3, pixels).unwrap();
        Rc::new(Texture::new(image))
    }

    #[test]
    fn sampler_defaults() {
        let s = SamplerSettings::default();
        assert_eq!(s.wrap_s, Wrap::ClampToEdge);
        assert_eq!(s.wrap_t, Wrap::ClampToEdge);
        assert_eq!(s.mag_filter, MagFilter::Linear);
        assert_eq!(s.min_filter, MinFilter::NearestMipmapLinear);
        assert!(s.mipmap);
    }

    #[test]
    fn names_parse_with_fallbacks() {
        assert_eq!(Wrap::from_name("MirroredRepeat"), Wrap::MirroredRepeat);
        assert_eq!(Wrap::from_name("Bogus"), Wrap::ClampToEdge);
        assert_eq!(MinFilter::from_name("LinearMipmapNearest"), MinFilter::LinearMipmapNearest);
        assert_eq!(MagFilter::from_name("Nearest"), MagFilter::Nearest);
    }

    #[test]
    fn image_size_is_checked() {
        assert!(matches!(
            TextureImage::new(2, 2, 4, vec![0; 15]),
            Err(TextureError::SizeMismatch { expected: 16, actual: 15 })
        ));
        assert!(matches!(
            TextureImage::new(1, 1, 2, vec![0; 2]),
            Err(TextureError::PixelSize(2))
        ));
        assert!(matches!(
            TextureImage::cube(1, 4, vec![vec![0; 4]; 5]),
            Err(TextureError::FaceCount(5))
        ));
    }

    #[test]
    fn rgb_faces_expand_to_rgba() {
        let tex = checker();
        assert!(!tex.image.has_alpha());
        let face = tex.image.rgba_face(0).unwrap();
        assert_eq!(face.len(), 16);
        assert_eq!(&face[4..8], &[255, 255, 255, 255]);
    }

    #[test]
    fn units_are_assigned_once_per_texture() {
        let mut backend = RecordingBackend::new();
        let mut cache = TextureCache::new();
        let a = checker();
        let b = checker();

        let first = cache.bind(&a, &mut backend).unwrap();
        let again = cache.bind(&a, &mut backend).unwrap();
        let other = cache.bind(&b, &mut backend).unwrap();

        assert_eq!(first, TextureUnit(0));
        assert_eq!(again, first);
        assert_eq!(other, TextureUnit(1));
        assert_eq!(
            backend.count(|c| matches!(c, GpuCommand::CreateTexture { .. })),
            2
        );
    }

    #[test]
    fn dropped_textures_are_deleted_and_units_not_reused() {
        let mut backend = RecordingBackend::new();
        let mut cache = TextureCache::new();
        let a = checker();
        cache.bind(&a, &mut backend).unwrap();
        drop(a);

        cache.collect(&mut backend);
        assert!(cache.is_empty());
        assert_eq!(
            backend.count(|c| matches!(c, GpuCommand::DeleteTexture(_))),
            1
        );

        let b = checker();
        assert_eq!(cache.bind(&b, &mut backend).unwrap(), TextureUnit(1));
    }
}
