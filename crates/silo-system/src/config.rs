//! Silo behaviour configuration.
//!
//! [`SiloConfig`] can be built in code or loaded from a RON, TOML or JSON
//! file; the format is detected from the file extension. Every field is
//! optional in the file and falls back to its default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading a [`SiloConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(ConfigError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// SiloConfig
// ===========================================================================

/// Tunables for the silo system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiloConfig {
    /// Move a utilizer's existing materials into the silo when it links.
    pub transfer_on_link: bool,
    /// Only use a silo while it is powered.
    pub require_power: bool,
    /// Re-raise silo material changes on every connected utilizer.
    pub fan_out_changes: bool,
}

impl Default for SiloConfig {
    fn default() -> Self {
        Self {
            transfer_on_link: true,
            require_power: true,
            fan_out_changes: true,
        }
    }
}

impl SiloConfig {
    /// Load a config file; the format is taken from its extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format).map_err(|detail| ConfigError::Parse {
            file: path.to_path_buf(),
            detail,
        })
    }

    /// Parse config text in the given format.
    pub fn parse(content: &str, format: Format) -> Result<Self, String> {
        match format {
            Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}
