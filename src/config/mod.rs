//! Configuration for the torchlive bridge
//!
//! Configuration is read from a TOML file. Every section and every field is
//! optional; missing values take their defaults.
//!
//! # Config Location
//!
//! The default file lives in the platform config directory:
//! - **Linux**: `~/.config/dev.torchlive.bridge/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.torchlive.bridge/config.toml`
//! - **Windows**: `%APPDATA%\dev.torchlive.bridge\config.toml`
//!
//! # Example
//!
//! ```toml
//! [engine]
//! max_operations = 500000
//!
//! [modules]
//! preload = ["resize", "centerCrop"]
//!
//! [media]
//! max_blob_bytes = 16777216
//!
//! [logging]
//! level = "debug"
//! directory = "/var/log/torchlive"
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.torchlive.bridge";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub engine: EngineSettings,
    pub modules: ModuleSettings,
    pub media: MediaSettings,
    pub logging: LoggingSettings,
}

impl BridgeConfig {
    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            BridgeError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Load `path` if given, else the default location; defaults when the
    /// file does not exist. A file that exists but fails to parse is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Save config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BridgeError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| BridgeError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            BridgeError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}
