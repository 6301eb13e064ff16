//! Configuration module for the photo sync tool
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\photo_sync_tool\config.toml
//! - Linux/macOS: ~/.config/photo_sync_tool/config.toml
//!
//! A config.toml in the current directory takes precedence, which allows
//! per-export overrides when working through several Takeout archives.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Application name used for config directory
const APP_NAME: &str = "photo_sync_tool";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the standard configuration directory for the application.
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Initialize the configuration file if it doesn't exist.
///
/// Creates the config directory and writes a default config.
/// Returns the path to the config file.
pub fn init_config() -> Result<PathBuf, ConfigError> {
    let config_dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::WriteError(config_dir.clone(), e.to_string()))?;
    }

    let config_path = config_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        Config::default().save(&config_path)?;
    }

    Ok(config_path)
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source/target directory settings
    pub directories: DirectoriesConfig,

    /// Name and content matching settings
    pub matching: MatchingConfig,

    /// Signature cache settings
    pub hashing: HashingConfig,

    /// Duplicate detection settings
    pub duplicates: DuplicatesConfig,

    /// Metadata writer settings
    pub writer: WriterConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Directory layout for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoriesConfig {
    /// Export with JSON sidecar metadata (e.g. a Google Takeout archive)
    pub source_dir: PathBuf,

    /// Export to pair and fix up (e.g. an Apple Photos export)
    pub target_dir: PathBuf,

    /// Where cache files and CSV reports are written
    pub data_dir: PathBuf,
}

/// Matching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum similarity for the content-hash fallback to accept a pair
    pub content_threshold: f64,
}

/// Signature cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    /// Path to the flat signature cache file
    pub cache_file: PathBuf,

    /// Flush the cache to disk after this many new signatures
    pub flush_batch_size: usize,
}

/// Duplicate detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatesConfig {
    /// Minimum perceptual similarity for two images to be grouped
    pub similarity_threshold: f64,
}

/// Metadata writer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// exiftool executable (name or full path)
    pub exiftool: String,

    /// Keep original files untouched; exiftool writes in place when false
    pub preserve_originals: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log to file
    pub log_to_file: bool,

    /// Log file path
    pub log_file: PathBuf,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("./old"),
            target_dir: PathBuf::from("./new"),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            content_threshold: 0.98,
        }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from("./data/signature_cache.csv"),
            flush_batch_size: 500,
        }
    }
}

impl Default for DuplicatesConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.98,
        }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            exiftool: "exiftool".to_string(),
            preserve_originals: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./photo_sync.log"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./config.toml (current directory - for per-export overrides)
    /// 2. ./photo_sync.toml (current directory - alternative name)
    /// 3. Standard config location
    ///
    /// If no config file is found, returns default configuration.
    pub fn load_default() -> Result<Self, ConfigError> {
        let local_paths = [
            PathBuf::from("./config.toml"),
            PathBuf::from("./photo_sync.toml"),
        ];

        for path in &local_paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        Ok(Self::default())
    }

    /// Get the path where the config file is (or would be) located.
    pub fn get_active_config_path() -> PathBuf {
        let local_paths = [
            PathBuf::from("./config.toml"),
            PathBuf::from("./photo_sync.toml"),
        ];

        for path in &local_paths {
            if path.exists() {
                return path.clone();
            }
        }

        get_config_path().unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::WriteError(path.as_ref().to_path_buf(), e.to_string()))?;

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to read the configuration file
    #[error("Failed to read config file '{0}': {1}")]
    ReadError(PathBuf, String),

    /// Failed to parse the configuration file (invalid TOML)
    #[error("Failed to parse config file '{0}': {1}")]
    ParseError(PathBuf, String),

    /// Failed to serialize configuration to TOML
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(String),

    /// Failed to write configuration file
    #[error("Failed to write config file '{0}': {1}")]
    WriteError(PathBuf, String),

    /// Could not determine config directory
    #[error("Could not determine configuration directory")]
    ConfigDirNotFound,
}
