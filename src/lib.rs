// src/lib.rs

// Library half of the crate; main.rs and the integration tests both use it.

pub mod backup;
pub mod config;
pub mod error;
pub mod exif_utils;
pub mod file_utils;
pub mod keymap;
pub mod labels;
pub mod session;
pub mod store;
pub mod tui_app;

use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::{SelectorConfig, MIN_GRID_SIZE};
use crate::file_utils::{FilterRules, LoadOptions};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// The directory holding the photos to review.
    #[clap(required_unless_present = "export")]
    pub directory: Option<PathBuf>,

    /// SQLite database receiving the keep/delete records.
    #[clap(long, value_name = "PATH", help = "Duplicate database (default: ~/.image-selector/duplicates.db)")]
    pub database: Option<PathBuf>,

    /// Root of the backup tree that deleted images are moved into.
    #[clap(long, value_name = "DIR", help = "Backup root for deleted images (default: ~/.image-selector/backup)")]
    pub backup_dir: Option<PathBuf>,

    /// Rows and columns of the review grid.
    #[clap(short, long, value_parser = clap::value_parser!(u8).range(2..=7), help = "Grid size, 2-7 (default: 2)")]
    pub grid: Option<u8>,

    /// Also load images from subdirectories.
    #[clap(short, long, help = "Load images from subdirectories too")]
    pub recursive: bool,

    /// Include files matching the given glob pattern. Can be specified multiple times.
    #[clap(long, help = "Include specific file patterns (glob)")]
    pub include: Vec<String>,

    /// Exclude files matching the given glob pattern. Can be specified multiple times.
    #[clap(long, help = "Exclude specific file patterns (glob)")]
    pub exclude: Vec<String>,

    /// Read filter rules from a file (similar to rclone filter files).
    #[clap(
        long,
        help = "Load filter rules from a file (one pattern per line, # for comments)"
    )]
    pub filter_from: Option<PathBuf>,

    /// Run in dry run mode - label and save groups without writing records or moving files.
    #[clap(long, help = "Perform a dry run without making any actual changes")]
    pub dry_run: bool,

    /// Print the images that would be reviewed and exit.
    #[clap(long, help = "List images in review order and exit")]
    pub list: bool,

    /// Write every stored record to a file.
    #[clap(short, long, value_name = "PATH", help = "Export stored records to a file (e.g., records.json)")]
    pub export: Option<PathBuf>,

    /// Output format for the export file.
    #[clap(short, long, value_parser = clap::builder::PossibleValuesParser::new(["json", "toml"]), help = "Format for the export file [json|toml]")]
    pub format: Option<String>,

    /// Move a file from the backup directory back into the working directory.
    #[clap(long, value_name = "FILENAME", help = "Restore a backed-up file by name and exit")]
    pub restore: Option<String>,

    /// Show progress information while loading.
    #[clap(long, help = "Show progress while loading images")]
    pub progress: bool,

    /// Write actions and errors to a log file.
    #[clap(short, long, help = "Enable logging to a file (default: image-selector.log)")]
    pub log: bool,

    /// Specify a custom log file path.
    #[clap(long, value_name = "PATH", help = "Specify a custom log file path")]
    pub log_file: Option<PathBuf>,

    /// Verbosity level.
    #[clap(short, long, action = clap::ArgAction::Count, help = "Verbosity level (-v, -vv, -vvv)")]
    pub verbose: u8,

    /// Path to a custom config file. If provided, overrides the default ~/.image-selectorrc file.
    #[clap(
        long,
        help = "Path to a custom config file (overrides the default ~/.image-selectorrc)"
    )]
    pub config_file: Option<PathBuf>,

    /// Image extensions, filled from the config file.
    #[clap(skip)]
    pub extensions: Vec<String>,

    /// Key overrides, filled from the config file.
    #[clap(skip)]
    pub keys: BTreeMap<String, Vec<String>>,
}

impl Cli {
    /// Parse the command line and fill unspecified values from the config file
    pub fn with_config() -> anyhow::Result<Self> {
        let mut cli = Self::parse();

        let config = if let Some(config_path) = &cli.config_file {
            SelectorConfig::load_from_path(config_path)?
        } else {
            SelectorConfig::load()?
        };

        cli.apply_config(config);

        // Only create the default file for the default location
        if cli.config_file.is_none() {
            let _ = SelectorConfig::create_default_if_not_exists();
        }

        Ok(cli)
    }

    /// Apply config values to CLI arguments that weren't explicitly provided
    pub fn apply_config(&mut self, config: SelectorConfig) {
        if self.database.is_none() {
            self.database = Some(config.database);
        }

        if self.backup_dir.is_none() {
            self.backup_dir = Some(config.backup_dir);
        }

        if self.grid.is_none() {
            self.grid = u8::try_from(config.grid_size).ok();
        }

        if self.format.is_none() {
            self.format = Some(config.format);
        }

        // Flags can only be switched on by the config
        if !self.recursive && config.recursive {
            self.recursive = true;
        }

        if !self.progress && config.progress {
            self.progress = true;
        }

        // Only apply include/exclude patterns if none were specified on the command line
        if self.include.is_empty() && !config.include.is_empty() {
            self.include = config.include;
        }

        if self.exclude.is_empty() && !config.exclude.is_empty() {
            self.exclude = config.exclude;
        }

        if self.extensions.is_empty() {
            self.extensions = config.extensions;
        }

        if self.keys.is_empty() {
            self.keys = config.keys;
        }
    }

    pub fn grid_size(&self) -> usize {
        self.grid.map(usize::from).unwrap_or(MIN_GRID_SIZE)
    }

    pub fn export_format(&self) -> &str {
        self.format.as_deref().unwrap_or("json")
    }

    /// Loader settings derived from the filter and extension options.
    pub fn load_options(&self) -> anyhow::Result<LoadOptions> {
        let filter = FilterRules::new(&self.include, &self.exclude, self.filter_from.as_deref())?;
        let mut options = LoadOptions {
            recursive: self.recursive,
            filter,
            progress: self.progress,
            ..LoadOptions::default()
        };
        if !self.extensions.is_empty() {
            options.extensions = self.extensions.clone();
        }
        Ok(options)
    }
}
