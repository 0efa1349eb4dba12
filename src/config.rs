//! User configuration
//!
//! Settings live in `~/.config/dircontxt/config` as `KEY=VALUE` lines:
//!
//! ```text
//! # what a snapshot leaves behind: both | text | binary
//! OUTPUT_MODE=both
//! # capture symlink targets instead of skipping links
//! FOLLOW_SYMLINKS=false
//! ```
//!
//! Blank lines and `#` comments are ignored. Unknown keys, unknown values
//! and malformed lines produce warnings and leave the default in place, so
//! a bad config file never stops a snapshot. The user-global ignore file
//! sits next to it as `~/.config/dircontxt/ignore`.

use crate::error::Result;
use crate::types::OutputMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the settings file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config";

/// Name of the user-global ignore file inside the config directory
pub const GLOBAL_IGNORE_FILE_NAME: &str = "ignore";

/// Settings read from the config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which artifacts a snapshot produces
    pub output_mode: OutputMode,
    /// Capture symlink targets instead of skipping links
    pub follow_symlinks: bool,
}

impl AppConfig {
    /// Parse config text, warning about anything unrecognized
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!("Config line {} has no '=': {}", idx + 1, line);
                continue;
            };
            config.apply(key.trim(), value.trim());
        }
        config
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "OUTPUT_MODE" => match value.parse() {
                Ok(mode) => self.output_mode = mode,
                Err(e) => warn!("OUTPUT_MODE: {}, keeping {}", e, self.output_mode),
            },
            "FOLLOW_SYMLINKS" => match value.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => self.follow_symlinks = true,
                "false" | "no" | "0" => self.follow_symlinks = false,
                _ => warn!("FOLLOW_SYMLINKS: unknown value '{}'", value),
            },
            _ => warn!("Unknown config key '{}'", key),
        }
    }

    /// Load settings from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let config = Self::parse(&text);
                debug!("Loaded config from {}: {}", path.display(), serde_json::to_string(&config)?);
                Ok(config)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load settings from the user's config directory.
    ///
    /// Never fails: an unreadable file or unknown home directory is logged
    /// and defaults are used.
    pub fn load() -> Self {
        let Some(path) = config_dir().map(|dir| dir.join(CONFIG_FILE_NAME)) else {
            debug!("No home directory, using default config");
            return Self::default();
        };
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!("Cannot read config {}: {}", path.display(), e);
            Self::default()
        })
    }
}

/// `~/.config/dircontxt`, if a home directory is known
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("dircontxt"))
}

/// `~/.config/dircontxt/ignore`, if a home directory is known
pub fn global_ignore_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(GLOBAL_IGNORE_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_defaults() {
        assert_eq!(AppConfig::parse(""), AppConfig::default());
        assert_eq!(AppConfig::default().output_mode, OutputMode::Both);
        assert!(!AppConfig::default().follow_symlinks);
    }

    #[test]
    fn test_parse_values() {
        let config = AppConfig::parse(
            "# comment\n\n  OUTPUT_MODE = binary \nFOLLOW_SYMLINKS=true\n",
        );
        assert_eq!(config.output_mode, OutputMode::Binary);
        assert!(config.follow_symlinks);
    }

    #[test]
    fn test_parse_ignores_bad_lines() {
        let config = AppConfig::parse(
            "OUTPUT_MODE=text\nOUTPUT_MODE=pdf\nCOLOR=always\nno equals here\nFOLLOW_SYMLINKS=maybe\n",
        );
        assert_eq!(config.output_mode, OutputMode::Text);
        assert!(!config.follow_symlinks);
    }

    #[test]
    fn test_load_from() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert_eq!(AppConfig::load_from(&path).unwrap(), AppConfig::default());

        fs::write(&path, "OUTPUT_MODE=text\n").unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap().output_mode, OutputMode::Text);
    }
}
