//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. Root folder resolution
//! follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SEED_ROOT_FOLDER`, then `SEED_ROOT`)
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: a warning is logged and
//! compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the SQLite database file inside the root folder
pub const DATABASE_FILE_NAME: &str = "seed.db";

/// Environment variables consulted for the root folder, in priority order
const ROOT_FOLDER_ENV_VARS: [&str; 2] = ["SEED_ROOT_FOLDER", "SEED_ROOT"];

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit database path; defaults to `<root_folder>/seed.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Matching/merge tuning (optional)
    #[serde(default)]
    pub matching: MatchingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Matching and merge tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum normalized-address similarity (0.0-1.0) for a candidate match
    #[serde(default = "default_address_similarity_threshold")]
    pub address_similarity_threshold: f64,

    /// Minimum confidence at which imports merge automatically
    #[serde(default = "default_auto_match_threshold")]
    pub auto_match_threshold: f64,

    /// Delimiter placed between cells of a concatenated column mapping
    #[serde(default = "default_concat_delimiter")]
    pub concat_delimiter: String,

    /// Event bus capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            address_similarity_threshold: default_address_similarity_threshold(),
            auto_match_threshold: default_auto_match_threshold(),
            concat_delimiter: default_concat_delimiter(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl MatchingConfig {
    /// Reject thresholds outside 0.0-1.0
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("address_similarity_threshold", self.address_similarity_threshold),
            ("auto_match_threshold", self.auto_match_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "matching.{} must be within 0.0-1.0, got {}",
                    name, value
                )));
            }
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("matching.event_capacity must be > 0".to_string()));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_address_similarity_threshold() -> f64 {
    0.90
}

fn default_auto_match_threshold() -> f64 {
    0.95
}

fn default_concat_delimiter() -> String {
    " ".to_string()
}

fn default_event_capacity() -> usize {
    100
}

impl TomlConfig {
    /// Parse and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
        config.matching.validate()?;
        Ok(config)
    }

    /// Load the platform config file, falling back to defaults when it is
    /// missing or invalid
    pub fn load_or_default() -> Self {
        match config_file_path() {
            Some(path) => match Self::load(&path) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring configuration file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            None => {
                debug!("No configuration file found, using compiled defaults");
                Self::default()
            }
        }
    }

    /// Serialize back to TOML and write to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Resolves the root folder from CLI argument, environment, TOML file and
/// compiled default, in that order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_config: Option<TomlConfig>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_config: None,
        }
    }

    /// Highest-priority override from the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Use an already-loaded TOML config instead of reading the platform file
    pub fn with_toml_config(mut self, config: TomlConfig) -> Self {
        self.toml_config = Some(config);
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, path = %path.display(), "Root folder from command line");
            return path.clone();
        }

        for var in ROOT_FOLDER_ENV_VARS {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    debug!(module = %self.module_name, var, "Root folder from environment");
                    return PathBuf::from(value);
                }
            }
        }

        let toml_root = match &self.toml_config {
            Some(config) => config.root_folder.clone(),
            None => config_file_path()
                .and_then(|path| TomlConfig::load(&path).ok())
                .and_then(|config| config.root_folder),
        };
        if let Some(path) = toml_root {
            debug!(module = %self.module_name, path = %path.display(), "Root folder from TOML");
            return path;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder on first run and locates files inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}

/// Platform config file location, if one exists
///
/// Linux checks `~/.config/seed/config.toml` then `/etc/seed/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("seed").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/seed/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("seed"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/seed"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("seed"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/seed"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("seed"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\seed"))
    } else {
        PathBuf::from("./seed_data")
    }
}
