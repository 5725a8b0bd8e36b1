//! Loader configuration.
//!
//! Configuration is read from a TOML file; every field has a default so an
//! empty file (or no file at all) gives the stock behaviour.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Settings for the load pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Name of the layer created for the decoded pixels
    pub layer_name: String,

    /// Attach the EXIF block to the created image
    pub attach_exif: bool,

    /// Longest edge of chooser thumbnails in pixels (0 disables them)
    pub preview_edge: u32,

    /// File suffixes handled by the load procedure, without dots
    pub file_extensions: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            layer_name: "image content".to_string(),
            attach_exif: true,
            preview_edge: 128,
            file_extensions: vec!["heic".to_string(), "heif".to_string()],
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LoaderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Validation(e.to_string()))
    }

    /// Check field values. Called by [`LoaderConfig::from_toml_str`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layer_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "layer_name must not be empty".to_string(),
            ));
        }
        if self.file_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "file_extensions must list at least one suffix".to_string(),
            ));
        }
        if let Some(bad) = self
            .file_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(ConfigError::Validation(format!(
                "invalid file extension {:?}, expected a suffix without a dot",
                bad
            )));
        }
        Ok(())
    }

    /// Comma-separated suffix list, as load handlers are registered with.
    pub fn extension_list(&self) -> String {
        self.file_extensions.join(",")
    }

    /// Whether `path` has one of the handled suffixes (case-insensitive).
    pub fn handles(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.file_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}
