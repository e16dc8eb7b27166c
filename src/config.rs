//! Runtime configuration.
//!
//! A flat serde-backed struct with stock defaults, optionally loaded from a
//! TOML file and overridden field-by-field from CLI flags. There is no
//! hierarchy or cascade: one process, one config.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Resize bound for stored artifacts (see [`crate::normalize`]).
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct ImageBounds {
    /// Output width when the source is wider than tall.
    pub width: u32,
    /// Output height otherwise.
    pub height: u32,
}

impl Default for ImageBounds {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Full application configuration with stock defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CuratorConfig {
    /// Address the HTTP server binds to.
    pub bind: String,
    /// Directory stored artifacts are written to and served from.
    pub upload_dir: PathBuf,
    /// SQLite database file path.
    pub db_path: PathBuf,
    /// Maximum accepted upload body size in bytes.
    pub max_upload_bytes: usize,
    /// Target bound for the normalizer's resize policy.
    pub image_bounds: ImageBounds,
    /// JPEG encoding quality for stored artifacts (1-100).
    pub jpeg_quality: u8,
    /// Upper bound on a single PDF export, in seconds.
    pub export_timeout_secs: u64,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            upload_dir: PathBuf::from("uploads"),
            db_path: PathBuf::from("curator.db"),
            max_upload_bytes: 16 * 1024 * 1024,
            image_bounds: ImageBounds::default(),
            jpeg_quality: 85,
            export_timeout_secs: 60,
        }
    }
}

impl CuratorConfig {
    /// Load config from a TOML file. Missing fields fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from `path` when given, otherwise return stock defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}
