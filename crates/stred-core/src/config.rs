//! Editor configuration.
//!
//! ## Learning: Serde for Serialization
//!
//! `#[derive(Serialize, Deserialize)]` generates the conversion code
//! for TOML, and `#[serde(default)]` falls back to `Default` for
//! missing fields, so old config files keep working as options are
//! added.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use stred_buffer::DEFAULT_CHUNK_SIZE;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Editing behavior settings
    pub editor: EditorConfig,

    /// Named patterns available to every script as `<name>`
    pub rules: HashMap<String, String>,
}

impl Config {
    /// Loads config from the default location, falling back to
    /// defaults if there is none or it fails to parse.
    pub fn load() -> Self {
        match Self::load_from_default_path() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("ignoring configuration: {err}");
                Self::default()
            }
        }
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("stred").join("config.toml"))
    }

    /// Saves the config to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

/// Editing behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Bytes served per scanner read
    pub scan_chunk_size: usize,

    /// Terminate printed output with a newline when the text itself
    /// does not end in one
    pub newline_after_print: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            scan_chunk_size: DEFAULT_CHUNK_SIZE,
            newline_after_print: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.editor.scan_chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.editor.newline_after_print);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.rules.insert("word".into(), "[a-z]+".into());
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.rules.get("word").map(String::as_str), Some("[a-z]+"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[editor]\nscan_chunk_size = 128\n\n[rules]\nnum = \"[0-9]+\"").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.editor.scan_chunk_size, 128);
        assert_eq!(config.rules.get("num").map(String::as_str), Some("[0-9]+"));
        assert!(config.editor.newline_after_print);
    }

    #[test]
    fn test_load_from_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml [").unwrap();
        assert!(matches!(
            Config::load_from(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
