//! Configuration sections
//!
//! - [`EngineSettings`] - Safety limits applied to the Rhai engine
//! - [`ModuleSettings`] - Modules loaded eagerly at startup
//! - [`MediaSettings`] - Limits for blob copies
//! - [`LoggingSettings`] - Log level and optional log file directory

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default cap on a single blob copy (256 MiB)
pub const DEFAULT_MAX_BLOB_BYTES: usize = 256 * 1024 * 1024;

/// Rhai engine safety limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum expression nesting depth (statements and functions)
    pub max_expr_depth: usize,

    /// Maximum function call nesting
    pub max_call_levels: usize,

    /// Maximum operations per script run (0 = unlimited)
    pub max_operations: u64,

    pub max_string_size: usize,

    /// Maximum array length; tensor data arrays count against this
    pub max_array_size: usize,

    pub max_map_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_expr_depth: 64,
            max_call_levels: 32,
            max_operations: 1_000_000,
            max_string_size: 10_000,
            max_array_size: 1_000_000,
            max_map_size: 1_000,
        }
    }
}

/// Module loading behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    /// Module names loaded before any script runs
    pub preload: Vec<String>,
}

/// Buffer bridge limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    /// Largest region `toBlob` will copy, in bytes
    pub max_blob_bytes: usize,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
        }
    }
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,

    /// Write a daily rolling log file here in addition to stderr
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info,torchlive_rs=debug".to_string(),
            directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_uses_defaults() {
        let engine: EngineSettings = toml::from_str("max_call_levels = 8").unwrap();
        assert_eq!(engine.max_call_levels, 8);
        assert_eq!(engine.max_expr_depth, EngineSettings::default().max_expr_depth);
    }

    #[test]
    fn test_logging_default_filter() {
        let logging = LoggingSettings::default();
        assert!(logging.level.contains("torchlive_rs=debug"));
        assert!(logging.directory.is_none());
    }
}
