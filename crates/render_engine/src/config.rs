//! Engine configuration
//!
//! Tunables for batching and frame logging, loadable from TOML. Every
//! field has a default, so a partial file (or none at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file was not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field held a value outside its allowed range
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Renderer tunables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Vertex ceiling for a merged static batch
    pub max_batch_vertices: u32,

    /// Instance ceiling for a hardware-instanced batch
    pub max_instance_batch: u32,

    /// World-space size ceiling on any axis of a static batch's bounds
    ///
    /// Oversized merged geometry defeats frustum culling, so groups are
    /// split when adding a mesh would grow the batch box past this.
    pub max_batch_extent: f32,

    /// Log per-frame draw and cull counts at debug level
    pub log_frame_stats: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_batch_vertices: 65_535,
            max_instance_batch: 1024,
            max_batch_extent: 100.0,
            log_frame_stats: false,
        }
    }
}

impl RenderConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check field ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_vertices == 0 {
            return Err(ConfigError::Invalid(
                "max_batch_vertices must be positive".into(),
            ));
        }
        if self.max_instance_batch == 0 {
            return Err(ConfigError::Invalid(
                "max_instance_batch must be positive".into(),
            ));
        }
        if self.max_batch_extent <= 0.0 {
            return Err(ConfigError::Invalid(
                "max_batch_extent must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_batch_vertices, 65_535);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = RenderConfig::from_toml_str("max_instance_batch = 64").unwrap();
        assert_eq!(config.max_instance_batch, 64);
        assert_eq!(config.max_batch_vertices, 65_535);
    }

    #[test]
    fn test_zero_ceiling_is_rejected() {
        let result = RenderConfig::from_toml_str("max_batch_vertices = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_garbage_toml_is_a_parse_error() {
        let result = RenderConfig::from_toml_str("max_batch_vertices = \"lots\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
