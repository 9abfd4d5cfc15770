//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/invite/config.toml)
//! 3. Environment variables (INVITE_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "INVITE";

/// Default quiet period before an autosave fires
pub const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 800;

/// Default longest side of a stored image, in pixels
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 1500;

/// Keys accepted by [`Config::set_value`]
pub const CONFIG_KEYS: &[&str] = &[
    "data_dir",
    "autosave_delay_ms",
    "max_image_dimension",
    "log_level",
];

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the store database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Quiet period before pending edits are written, in milliseconds
    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,

    /// Images larger than this on either side are scaled down on upload
    #[serde(default = "default_max_image_dimension")]
    pub max_image_dimension: u32,

    /// Log filter used when RUST_LOG is not set (e.g. "info", "invite_core=debug")
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
            log_level: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (INVITE_DATA_DIR, INVITE_AUTOSAVE_DELAY_MS, ...)
    /// 2. Config file (~/.config/invite/config.toml or INVITE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit file given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable numeric values are ignored.
    fn apply_env_overrides(&mut self) {
        // INVITE_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // INVITE_AUTOSAVE_DELAY_MS
        if let Ok(val) = std::env::var(format!("{}_AUTOSAVE_DELAY_MS", ENV_PREFIX)) {
            if let Ok(ms) = val.trim().parse() {
                self.autosave_delay_ms = ms;
            }
        }

        // INVITE_MAX_IMAGE_DIMENSION
        if let Ok(val) = std::env::var(format!("{}_MAX_IMAGE_DIMENSION", ENV_PREFIX)) {
            if let Ok(px) = val.trim().parse() {
                self.max_image_dimension = px;
            }
        }

        // INVITE_LOG_LEVEL
        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            self.log_level = if val.is_empty() { None } else { Some(val) };
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Set a value by its config file key
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "data_dir" => {
                self.data_dir = value.into();
            }
            "autosave_delay_ms" => {
                self.autosave_delay_ms = value
                    .parse()
                    .context("Invalid value for autosave_delay_ms. Use a number of milliseconds.")?;
            }
            "max_image_dimension" => {
                let px: u32 = value
                    .parse()
                    .context("Invalid value for max_image_dimension. Use a number of pixels.")?;
                if px == 0 {
                    bail!("max_image_dimension must be greater than zero");
                }
                self.max_image_dimension = px;
            }
            "log_level" => {
                self.log_level = if value.is_empty() || value == "none" {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            _ => {
                bail!(
                    "Unknown configuration key: '{}'\nValid keys: {}",
                    key,
                    CONFIG_KEYS.join(", ")
                );
            }
        }
        Ok(())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with INVITE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("invite")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("invite.db")
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invite")
}

fn default_autosave_delay_ms() -> u64 {
    DEFAULT_AUTOSAVE_DELAY_MS
}

fn default_max_image_dimension() -> u32 {
    DEFAULT_MAX_IMAGE_DIMENSION
}
