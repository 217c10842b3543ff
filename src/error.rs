//! Error types for routing and configuration.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single file could not be routed. Never fatal to a run.
#[derive(Error, Debug)]
pub enum RouteError {
    /// The volume was ejected before the file was reached
    #[error("volume {} is no longer present", .0.display())]
    VolumeRemoved(PathBuf),

    /// Reading, creating or copying failed (file locked or removed mid-copy)
    #[error("cannot access '{}': {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Anything else, including a panic in the file's worker
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl RouteError {
    pub fn access(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| RouteError::FileAccess { path, source }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write config file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not determine a configuration directory")]
    NoConfigDir,
}
