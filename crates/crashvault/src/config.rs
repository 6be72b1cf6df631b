//! Configuration management for crashvault.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "crashvault";

/// Name of the directory holding native crash report files.
const CRASH_DIR_NAME: &str = "ndk";

/// Name of the marker file written before a crash so an unclean exit can be
/// detected on the next launch.
const MARKER_FILE_NAME: &str = "crash_marker";

/// Name of the packaged symbol table blob.
const SYMBOLS_FILE_NAME: &str = "native_symbols.b64";

/// Delay before the one-shot signal-handler integrity check runs.
pub const HANDLER_CHECK_DELAY: Duration = Duration::from_millis(5000);

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CRASHVAULT_`)
/// 2. TOML config file at `~/.config/crashvault/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Native crash capture configuration.
    pub native: NativeCrashConfig,
}

/// Native crash capture configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeCrashConfig {
    /// Enable native crash capture.
    pub enabled: bool,
    /// Enable detection of signal handlers overwritten by third-party
    /// native libraries.
    pub handler_detection_enabled: bool,
    /// Run crash retrieval on a background worker instead of the
    /// initializing thread.
    pub deferred_retrieval: bool,
    /// Enable verbose logging inside the native runtime.
    pub dev_logging: bool,
    /// Directory holding crash report files.
    /// Defaults to `~/.local/share/crashvault/ndk`.
    pub crash_dir: Option<PathBuf>,
    /// Path of the crash marker file.
    /// Defaults to `~/.local/share/crashvault/crash_marker`.
    pub marker_file: Option<PathBuf>,
    /// Path of the packaged base64 symbol table.
    /// Defaults to `~/.local/share/crashvault/native_symbols.b64`.
    pub symbols_file: Option<PathBuf>,
}

impl Default for NativeCrashConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            handler_detection_enabled: true,
            deferred_retrieval: false,
            dev_logging: false,
            crash_dir: None, // Will be resolved to default at runtime
            marker_file: None,
            symbols_file: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `CRASHVAULT_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("CRASHVAULT_").split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("crash_dir", &self.native.crash_dir),
            ("marker_file", &self.native.marker_file),
            ("symbols_file", &self.native.symbols_file),
        ] {
            if let Some(path) = path {
                if !path.is_absolute() {
                    return Err(Error::ConfigValidation {
                        message: format!("{name} must be an absolute path: {}", path.display()),
                    });
                }
            }
        }
        Ok(())
    }

    /// Get the crash report directory, resolving defaults if not set.
    #[must_use]
    pub fn crash_dir(&self) -> PathBuf {
        self.native
            .crash_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(CRASH_DIR_NAME))
    }

    /// Get the marker file path, resolving defaults if not set.
    #[must_use]
    pub fn marker_file_path(&self) -> PathBuf {
        self.native
            .marker_file
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(MARKER_FILE_NAME))
    }

    /// Get the packaged symbol table path, resolving defaults if not set.
    #[must_use]
    pub fn symbols_path(&self) -> PathBuf {
        self.native
            .symbols_file
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(SYMBOLS_FILE_NAME))
    }
}
