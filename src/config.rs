//! TOML configuration.
//!
//! Looked up at `--config`, then `./card-classifier.toml`, then the platform
//! config directory (`~/.config/card-classifier/config.toml` on Linux,
//! `%APPDATA%\card-classifier\config.toml` on Windows). A missing file is
//! created with defaults.

use crate::coordinator::RunSettings;
use crate::error::ConfigError;
use crate::scanner::DEFAULT_MEDIA_DIR;
use crate::watcher;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "card-classifier";
const CONFIG_FILE_NAME: &str = "config.toml";
const LOCAL_CONFIG_FILE: &str = "card-classifier.toml";
const DEFAULT_OUTPUT_DIR_NAME: &str = "ImageClassification";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub scan: ScanConfig,
    pub watch: WatchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root that `make/model/date` folders are created under
    pub directory: PathBuf,
    /// Open the output directory in the file browser after each run
    pub open_when_done: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let directory = dirs::picture_dir()
            .map(|p| p.join(DEFAULT_OUTPUT_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR_NAME));
        Self {
            directory,
            open_when_done: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Media directory looked for under each volume
    pub media_dir: String,
    /// Parallel file workers per run (0 = one per CPU)
    pub workers: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            media_dir: DEFAULT_MEDIA_DIR.to_string(),
            workers: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directories whose children are mounted volumes. Unused on Windows,
    /// where drive letters are polled.
    pub mount_roots: Vec<PathBuf>,
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            mount_roots: watcher::default_mount_roots(),
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// error, warn, info, debug or trace
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// The configuration a process starts with.
#[derive(Debug)]
pub struct LoadedConfig {
    /// File backing `config`, if one could be located.
    pub path: Option<PathBuf>,
    pub config: Config,
    /// Problems that made us fall back to defaults.
    pub warnings: Vec<ConfigError>,
}

/// Standard config file location for this platform.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
}

impl Config {
    /// Pick the config file to use: explicit path, local override, then the
    /// standard location (which may not exist yet).
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Ok(local);
        }
        default_config_path().ok_or(ConfigError::NoConfigDir)
    }

    /// Locate and load the config for this process. Never fails: a missing
    /// config directory or an unreadable file leaves the defaults in place.
    pub fn load_for_startup(explicit: Option<&Path>) -> LoadedConfig {
        Self::from_location(Self::locate(explicit))
    }

    fn from_location(located: Result<PathBuf, ConfigError>) -> LoadedConfig {
        let mut warnings = Vec::new();
        let path = match located {
            Ok(path) => Some(path),
            Err(e) => {
                warnings.push(e);
                None
            }
        };
        let config = match path.as_deref().map(Self::load_or_init) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                warnings.push(e);
                Self::default()
            }
            None => Self::default(),
        };
        LoadedConfig {
            path,
            config,
            warnings,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path`, writing a default config there first if it is missing.
    /// A default that cannot be written is still returned.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        match config.save(path) {
            Ok(()) => log::info!("Created default config at {}", path.display()),
            Err(e) => log::warn!("{}; using defaults", e),
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, content).map_err(write_err)
    }

    /// Persist a new output directory to the config file at `path`.
    pub fn set_output_dir(path: &Path, directory: PathBuf) -> Result<Self, ConfigError> {
        let mut config = Self::load_or_init(path)?;
        config.output.directory = directory;
        config.save(path)?;
        Ok(config)
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            media_dir: self.scan.media_dir.clone(),
            workers: self.scan.workers,
            open_when_done: self.output.open_when_done,
        }
    }
}
