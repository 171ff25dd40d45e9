//! Configuration for conlite.
//!
//! Settings are read from `~/.conlite/config.toml`. Every key is optional:
//!
//! ```toml
//! # Per-byte wait for the cursor report, in milliseconds (0 = wait forever)
//! reply_timeout_ms = 1000
//!
//! # Most bytes of a cursor report consumed before giving up
//! max_reply_len = 32
//!
//! # Fail instead of reading without raw mode when stdin is not a terminal
//! strict_tty = false
//!
//! # Log level for the conlite binary (trace, debug, info, warn, error)
//! log_level = "info"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::reply::DEFAULT_MAX_REPLY_LEN;
use crate::core::LocatorOptions;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write config: {0}")]
    Write(#[source] io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config path")]
    NoHome,
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-byte wait for the cursor report in milliseconds; 0 waits forever
    pub reply_timeout_ms: u64,
    /// Most bytes of a cursor report consumed before giving up
    pub max_reply_len: usize,
    /// Fail with NotATerminal instead of reading in the current mode
    pub strict_tty: bool,
    /// Log level for the binary
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 1000,
            max_reply_len: DEFAULT_MAX_REPLY_LEN,
            strict_tty: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `~/.conlite/config.toml`, falling back to
    /// defaults when the file is missing or invalid.
    pub fn load() -> Self {
        Self::try_load().unwrap_or_else(|e| {
            debug!(error = %e, "using default config");
            Self::default()
        })
    }

    /// Like [`Config::load`], but an unreadable or invalid file is an error.
    /// A missing file or home directory still yields the defaults.
    pub fn try_load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) => Self::try_load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn try_load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(ConfigError::Read)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to `~/.conlite/config.toml`
    pub fn save(&self) -> Result<(), ConfigError> {
        let dir = Self::config_dir().ok_or(ConfigError::NoHome)?;
        fs::create_dir_all(&dir).map_err(ConfigError::Write)?;
        self.save_to(&dir.join("config.toml"))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(ConfigError::Write)
    }

    /// Directory holding config and log files
    pub fn config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".conlite"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn log_path() -> PathBuf {
        Self::config_dir()
            .map(|dir| dir.join("conlite.log"))
            .unwrap_or_else(|| PathBuf::from("conlite.log"))
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        (self.reply_timeout_ms > 0).then(|| Duration::from_millis(self.reply_timeout_ms))
    }

    /// Locator settings derived from this configuration
    pub fn locator(&self) -> LocatorOptions {
        LocatorOptions {
            reply_timeout: self.reply_timeout(),
            max_reply_len: self.max_reply_len,
            strict_tty: self.strict_tty,
        }
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
