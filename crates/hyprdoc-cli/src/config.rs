//! CLI configuration (`~/.config/hyprdoc/config.ron`).
//!
//! ```ron
//! (
//!     default_owner: "alice",
//!     summary_width: 48,
//!     short_ids: true,
//!     tree: (min_column_width: 15.0, max_depth: 16),
//! )
//! ```
//!
//! Every field is optional; a missing file means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hyprdoc_tree::TreeConfig;

/// Error type for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Owner recorded on documents created with `new`.
    pub default_owner: String,
    /// Characters of block content shown per line by `show`.
    pub summary_width: usize,
    /// Print 8-character ids in `show`.
    pub short_ids: bool,
    pub tree: TreeConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_owner: "owner".into(),
            summary_width: 40,
            short_ids: false,
            tree: TreeConfig::default(),
        }
    }
}

/// Get the config file path (~/.config/hyprdoc/config.ron).
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hyprdoc").join("config.ron"))
}

/// Load and parse a config file.
pub fn load_config_from_file(path: &Path) -> Result<CliConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    Ok(ron::from_str(&text)?)
}

/// Load config from `explicit` or the user's config directory.
///
/// An explicit path must exist and parse. The default location falls back
/// to defaults when the file is absent or broken.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config_from_file(path);
    }

    let Some(path) = config_file_path() else {
        tracing::debug!("No config directory available, using default config");
        return Ok(CliConfig::default());
    };
    if !path.exists() {
        tracing::debug!("Config file not found at {:?}, using defaults", path);
        return Ok(CliConfig::default());
    }

    match load_config_from_file(&path) {
        Ok(config) => {
            tracing::debug!("Loaded config from {:?}", path);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!("Failed to load config from {:?}: {}", path, e);
            Ok(CliConfig::default())
        }
    }
}
