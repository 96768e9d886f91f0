use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::file_utils::DEFAULT_EXTENSIONS;

pub const MIN_GRID_SIZE: usize = 2;
pub const MAX_GRID_SIZE: usize = 7;

/// Configuration structure for the .image-selectorrc file
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SelectorConfig {
    /// SQLite database holding the duplicate records
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Root under which deleted images are moved aside
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// File extensions treated as images (case-insensitive)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Rows and columns of the review grid
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,

    /// Descend into subdirectories when loading
    #[serde(default)]
    pub recursive: bool,

    /// Whether to show progress information while loading
    #[serde(default)]
    pub progress: bool,

    /// Default output format for exports
    #[serde(default = "default_format")]
    pub format: String,

    /// Default file include patterns
    #[serde(default)]
    pub include: Vec<String>,

    /// Default file exclude patterns
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Key overrides, action name to list of keys, e.g. `keep = ["s", "k"]`
    #[serde(default)]
    pub keys: BTreeMap<String, Vec<String>>,
}

fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".image-selector")
}

fn default_database() -> PathBuf {
    app_dir().join("duplicates.db")
}

fn default_backup_dir() -> PathBuf {
    app_dir().join("backup")
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_grid_size() -> usize {
    MIN_GRID_SIZE
}

fn default_format() -> String {
    "json".to_string()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            backup_dir: default_backup_dir(),
            extensions: default_extensions(),
            grid_size: default_grid_size(),
            recursive: false,
            progress: false,
            format: default_format(),
            include: Vec::new(),
            exclude: Vec::new(),
            keys: BTreeMap::new(),
        }
    }
}

impl SelectorConfig {
    /// Get the path to the user's config file
    pub fn get_config_path() -> Result<PathBuf> {
        let path = {
            #[cfg(target_family = "unix")]
            {
                let home_dir = dirs::home_dir().context("Could not determine home directory")?;
                log::debug!("Unix config path. Home dir: {:?}", home_dir);
                home_dir.join(".image-selectorrc")
            }

            #[cfg(target_family = "windows")]
            {
                match dirs::config_dir() {
                    Some(config_dir) => config_dir.join("image-selector").join("config.toml"),
                    None => dirs::home_dir()
                        .context("Could not determine home directory")?
                        .join(".image-selectorrc"),
                }
            }
        };

        log::debug!("Final config path: {:?}, exists: {}", path, path.exists());
        Ok(path)
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config = match fs::read_to_string(path) {
            Ok(contents) => toml::from_str::<SelectorConfig>(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config file: {:?}", path));
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&self.grid_size) {
            anyhow::bail!(
                "grid_size must be between {} and {}, got {}",
                MIN_GRID_SIZE,
                MAX_GRID_SIZE,
                self.grid_size
            );
        }
        if self.extensions.is_empty() {
            anyhow::bail!("extensions must list at least one file type");
        }
        if !matches!(self.format.as_str(), "json" | "toml") {
            anyhow::bail!("Unsupported output format in config: {}", self.format);
        }
        Ok(())
    }

    /// Save the configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Create a default configuration file if it doesn't exist
    pub fn create_default_if_not_exists() -> Result<bool> {
        let config_path = Self::get_config_path()?;
        if config_path.exists() {
            return Ok(false);
        }
        Self::default().save_to_path(&config_path)?;
        Ok(true)
    }
}
