//! Boundary to the native signal-handling runtime.
//!
//! Everything below this trait runs in native code loaded into the process.
//! The orchestrator drives it exclusively through [`SignalBridge`], so tests
//! and non-device builds can substitute a fake.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors surfaced by the native runtime across the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The native runtime library could not be loaded.
    #[error("native runtime unavailable: {message}")]
    RuntimeUnavailable {
        /// Description of the load failure.
        message: String,
    },

    /// Handler installation was rejected by the native runtime.
    #[error("handler installation failed: {message}")]
    InstallRejected {
        /// Description of the rejection.
        message: String,
    },
}

impl BridgeError {
    /// Create a runtime-unavailable error.
    #[must_use]
    pub fn runtime_unavailable(message: impl Into<String>) -> Self {
        Self::RuntimeUnavailable {
            message: message.into(),
        }
    }

    /// Create an install-rejected error.
    #[must_use]
    pub fn install_rejected(message: impl Into<String>) -> Self {
        Self::InstallRejected {
            message: message.into(),
        }
    }
}

/// Everything the native runtime needs to install its signal handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Directory the runtime writes crash report files into.
    pub report_dir: PathBuf,
    /// Path of the marker file written at crash time.
    pub marker_path: PathBuf,
    /// Initial metadata snapshot, serialized.
    pub metadata_json: String,
    /// Session id to stamp into reports, or the null placeholder.
    pub session_id: String,
    /// Current application state (foreground or background).
    pub app_state: String,
    /// Pre-generated identifier for a crash report this process may write.
    pub crash_id: String,
    /// Platform API level.
    pub api_level: i32,
    /// Whether the process runs a 32-bit userspace.
    pub is_32bit: bool,
    /// Enable verbose logging inside the native runtime.
    pub dev_logging: bool,
}

/// Operations the native signal-handling runtime exposes to this crate.
///
/// Implementations must be callable from any thread. All read operations
/// return `None` rather than failing; the caller decides how to degrade.
pub trait SignalBridge: Send + Sync {
    /// Install the signal handlers.
    ///
    /// # Errors
    ///
    /// Returns an error if the native runtime cannot be loaded or rejects
    /// the installation.
    fn install_handlers(&self, request: &InstallRequest) -> Result<(), BridgeError>;

    /// Check whether a third-party library replaced our handlers.
    ///
    /// Returns the name of the library now holding a handler, or `None` if
    /// the handlers are intact or the check is unsupported.
    fn check_for_overwritten_handlers(&self) -> Option<String>;

    /// Re-install the handlers after an overwrite was detected. Returns
    /// `false` if reinstallation is not possible.
    fn reinstall_handlers(&self) -> bool;

    /// Push a serialized metadata snapshot into the native runtime.
    fn update_metadata(&self, metadata_json: &str);

    /// Push the current session id into the native runtime.
    fn update_session_id(&self, session_id: &str);

    /// Push the current application state into the native runtime.
    fn update_app_state(&self, app_state: &str);

    /// Read the raw payload of a crash report file.
    ///
    /// Returns `None` when the file cannot be read at all; a readable but
    /// corrupt payload is returned as-is for the caller to reject.
    fn read_crash_report(&self, path: &Path) -> Option<String>;

    /// Read the raw payload of an error companion file.
    fn read_errors(&self, path: &Path) -> Option<String>;

    /// Remove the installed handlers.
    fn uninstall_handlers(&self);
}
