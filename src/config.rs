//! Configuration management.
//!
//! Loads the TOML config from the platform config directory, writing the
//! defaults on first run. Values the file omits fall back to the built-in
//! defaults via serde.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PglineError, Result};

/// Reserved value meaning "use the built-in default path".
pub const DEFAULT_SENTINEL: &str = "default";

const CONFIG_FILENAME: &str = "config.toml";

/// Default prompt template: user@host:database.
pub const DEFAULT_PROMPT: &str = "\\u@\\h:\\d> ";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub main: MainConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainConfig {
    /// Prompt template; see the prompt escape tokens.
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// History file path, or the `default` sentinel.
    #[serde(default = "default_sentinel")]
    pub history_file: String,

    /// Log file path, or the `default` sentinel.
    #[serde(default = "default_sentinel")]
    pub log_file: String,
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_sentinel() -> String {
    DEFAULT_SENTINEL.to_string()
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            history_file: default_sentinel(),
            log_file: default_sentinel(),
        }
    }
}

impl Config {
    /// The platform config directory for pgline.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pgline")
    }

    /// The default config file path.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join(CONFIG_FILENAME)
    }

    /// Loads the config from a file; a missing file yields the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| PglineError::config(format!("failed to read config file: {e}")))?;
        toml::from_str(&content).map_err(|e| {
            PglineError::config(format!("configuration error in {}: {e}", path.display()))
        })
    }

    /// Loads the config, writing the defaults to disk when no file exists
    /// yet. Any failure degrades to the built-in defaults.
    pub fn load_or_create(path: &Path) -> Self {
        if path.exists() {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    eprintln!("unable to load user configuration, using defaults\n{e}");
                    return Self::default();
                }
            }
        }
        let config = Self::default();
        if let Err(e) = config.save(path) {
            debug!(error = %e, "could not write default config");
        }
        config
    }

    /// Writes the config to the given path, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PglineError::config(format!("failed to create config dir: {e}")))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| PglineError::config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| PglineError::config(format!("failed to write config file: {e}")))?;
        Ok(())
    }

    /// Resolves the log file path, honoring the sentinel.
    pub fn log_path(&self) -> PathBuf {
        if self.main.log_file.is_empty() || self.main.log_file == DEFAULT_SENTINEL {
            Self::config_dir().join("pgline.log")
        } else {
            PathBuf::from(&self.main.log_file)
        }
    }
}
