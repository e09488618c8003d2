//! Renderer configuration loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! background = [0.0, 0.0, 0.0, 1.0]
//!
//! [camera]
//! projection = "perspective"
//! fov = 50.0
//! near = 0.1
//! far = 1000.0
//! origin = [0.0, 0.0, 5.0]
//! viewport = [0, 0, 800, 600]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::camera::Projection;
use crate::value::Color;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Initial camera settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub projection: Projection,
    /// Vertical field of view in degrees.
    pub fov: f32,
    /// View volume height for orthogonal projection.
    pub view_height: f32,
    pub near: f32,
    pub far: f32,
    pub origin: [f32; 3],
    /// `[x, y, width, height]` in pixels; the whole target when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<[u32; 4]>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            projection: Projection::Perspective,
            fov: 50.0,
            view_height: 10.0,
            near: 0.1,
            far: 1000.0,
            origin: [0.0, 0.0, 5.0],
            viewport: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub camera: CameraConfig,
    /// Clear color, RGBA.
    pub background: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            background: Color::BLACK.to_array(),
        }
    }
}

impl RenderConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("loaded render config from {}", path.display());
        Ok(config)
    }

    pub fn background(&self) -> Color {
        Color::from(self.background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = RenderConfig::from_toml_str("").unwrap();
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.camera.fov, 50.0);
        assert_eq!(config.camera.origin, [0.0, 0.0, 5.0]);
        assert_eq!(config.background(), Color::BLACK);
    }

    #[test]
    fn partial_camera_table_keeps_other_defaults() {
        let config = RenderConfig::from_toml_str(
            r#"
            background = [0.2, 0.2, 0.2, 1.0]

            [camera]
            projection = "orthogonal"
            view_height = 4.0
            viewport = [0, 0, 640, 480]
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.projection, Projection::Orthogonal);
        assert_eq!(config.camera.view_height, 4.0);
        assert_eq!(config.camera.viewport, Some([0, 0, 640, 480]));
        assert_eq!(config.camera.near, 0.1);
        assert_eq!(config.background(), Color::gray(0.2));
    }

    #[test]
    fn unknown_projection_is_a_parse_error() {
        let err = RenderConfig::from_toml_str("[camera]\nprojection = \"fisheye\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RenderConfig::load("/nonexistent/pegasus3d.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn serializes_back_to_toml() {
        let config = RenderConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(RenderConfig::from_toml_str(&text).unwrap(), config);
    }
}
