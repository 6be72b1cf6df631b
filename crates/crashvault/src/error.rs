//! Error types for crashvault.
//!
//! This module defines all error types used throughout the crashvault crate,
//! plus the internal-error channel the SDK logs its own failures to. Nothing
//! defined here is ever surfaced to the integrating application.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for crashvault operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Handler Installation Errors ===
    /// The signal bridge failed to install handlers.
    #[error("failed to install signal handlers: {message}")]
    HandlerInstall {
        /// Description of what went wrong.
        message: String,
    },

    /// An operation required installed handlers but none are installed.
    #[error("signal handlers are not installed")]
    NotInstalled,

    // === Crash Report Errors ===
    /// A crash report payload could not be parsed.
    #[error("failed to parse crash report at {path}: {source}")]
    CrashReportParse {
        /// Path of the offending crash file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A crash report file could not be read through the bridge.
    #[error("failed to read crash report at {path}")]
    CrashReportRead {
        /// Path of the unreadable crash file.
        path: PathBuf,
    },

    // === Symbol Errors ===
    /// The packaged symbol table could not be decoded.
    #[error("failed to decode packaged symbols: {message}")]
    SymbolsDecode {
        /// Description of what went wrong.
        message: String,
    },

    // === Delivery Errors ===
    /// The downstream delivery collaborator rejected a record.
    #[error("crash delivery failed: {message}")]
    Delivery {
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for crashvault operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new handler-install error.
    #[must_use]
    pub fn handler_install(message: impl Into<String>) -> Self {
        Self::HandlerInstall {
            message: message.into(),
        }
    }

    /// Create a new symbol-decode error.
    #[must_use]
    pub fn symbols_decode(message: impl Into<String>) -> Self {
        Self::SymbolsDecode {
            message: message.into(),
        }
    }

    /// Create a new delivery error.
    #[must_use]
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means the handlers are not installed.
    #[must_use]
    pub fn is_not_installed(&self) -> bool {
        matches!(self, Self::NotInstalled)
    }
}

/// Categories for the SDK's internal-error log channel.
///
/// Failures of the crash pipeline itself are never surfaced to the host
/// application; they are recorded here and logged, nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalErrorType {
    /// The native runtime could not be loaded or handlers failed to install.
    NativeHandlerInstallFail,
    /// A stored crash report could not be loaded or parsed.
    NativeCrashLoadFail,
    /// The packaged symbol table was missing or malformed.
    InvalidNativeSymbols,
    /// The downstream delivery collaborator failed.
    CrashDeliveryFail,
}

impl std::fmt::Display for InternalErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NativeHandlerInstallFail => write!(f, "native_handler_install_fail"),
            Self::NativeCrashLoadFail => write!(f, "native_crash_load_fail"),
            Self::InvalidNativeSymbols => write!(f, "invalid_native_symbols"),
            Self::CrashDeliveryFail => write!(f, "crash_delivery_fail"),
        }
    }
}

/// Record an internal SDK failure on the internal-error channel.
///
/// This is the only telemetry the pipeline emits about its own failures.
pub fn track_internal_error(error_type: InternalErrorType, detail: &dyn std::fmt::Display) {
    tracing::error!(internal_error = %error_type, "{detail}");
}
