//! Core crash report types for crashvault.
//!
//! This module defines the on-disk naming contract for native crash report
//! files and the in-memory parsed form of a recovered crash.
//!
//! # Crash file naming
//!
//! ```text
//! cv_crash_<timestampMs>_<sessionIdOrNull>_<pid>_<flag>.<suffix>
//! ```
//!
//! The crash, error, and map files for one crash event share the same
//! basename stem and differ only by suffix. This scheme is the only on-disk
//! contract with the native runtime: it must round-trip through sorting by
//! embedded timestamp and through stem-based pairing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::metadata::MetadataSnapshot;

/// Filename prefix shared by every native crash report file.
pub const NATIVE_CRASH_FILE_PREFIX: &str = "cv_crash";

/// Placeholder token used in filenames when no session id was active.
pub const SESSION_ID_NULL: &str = "null";

/// The logical kind of a crash report file, selected by its suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrashFileKind {
    /// The serialized crash report (raw unwind payload).
    Crash,
    /// Per-thread/per-frame unwind error entries.
    Error,
    /// The process memory map at crash time.
    Map,
}

impl CrashFileKind {
    /// The filename suffix for this kind, including the leading dot.
    #[must_use]
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Crash => ".crash",
            Self::Error => ".error",
            Self::Map => ".map",
        }
    }

    /// Map a filename suffix back to a kind.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            ".crash" => Some(Self::Crash),
            ".error" => Some(Self::Error),
            ".map" => Some(Self::Map),
            _ => None,
        }
    }
}

impl std::fmt::Display for CrashFileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crash => write!(f, "crash"),
            Self::Error => write!(f, "error"),
            Self::Map => write!(f, "map"),
        }
    }
}

/// The application lifecycle state pushed into the native runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    /// The application is in the foreground.
    Foreground,
    /// The application is in the background.
    Background,
}

impl AppState {
    /// The wire string for this state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Foreground => "foreground",
            Self::Background => "background",
        }
    }
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A crash report file on disk, parsed from the deterministic naming scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReportFile {
    /// Full path of the file.
    pub path: PathBuf,
    /// Creation timestamp embedded in the filename (epoch milliseconds).
    pub timestamp_ms: i64,
    /// Session id active when the crash occurred, if any.
    pub session_id: Option<String>,
    /// Process id of the crashed process.
    pub pid: u32,
    /// Whether the process was in the foreground at crash time.
    pub foreground: bool,
    /// The logical kind of this file.
    pub kind: CrashFileKind,
}

impl CrashReportFile {
    /// Build the canonical filename for this file's fields.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}{}",
            NATIVE_CRASH_FILE_PREFIX,
            self.timestamp_ms,
            self.session_id.as_deref().unwrap_or(SESSION_ID_NULL),
            self.pid,
            self.foreground,
            self.kind.suffix()
        )
    }

    /// Parse a path whose filename follows the crash report naming scheme.
    ///
    /// Returns `None` for any file that does not match the scheme exactly;
    /// such files are never treated as crash candidates.
    #[must_use]
    pub fn parse(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let dot = name.rfind('.')?;
        let (stem, suffix) = name.split_at(dot);
        let kind = CrashFileKind::from_suffix(suffix)?;

        let rest = stem.strip_prefix(NATIVE_CRASH_FILE_PREFIX)?.strip_prefix('_')?;
        let parts: Vec<&str> = rest.split('_').collect();
        if parts.len() != 4 {
            return None;
        }

        let timestamp_ms: i64 = parts[0].parse().ok()?;
        let session_id = match parts[1] {
            SESSION_ID_NULL | "" => None,
            other => Some(other.to_string()),
        };
        let pid: u32 = parts[2].parse().ok()?;
        let foreground = match parts[3] {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => return None,
        };

        Some(Self {
            path: path.to_path_buf(),
            timestamp_ms,
            session_id,
            pid,
            foreground,
            kind,
        })
    }

    /// Path of the companion file of the given kind (same stem, suffix
    /// swapped). The companion is not guaranteed to exist.
    #[must_use]
    pub fn companion_path(&self, kind: CrashFileKind) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(dot) = name.rfind('.') {
            name.truncate(dot);
        }
        name.push_str(kind.suffix());
        self.path.with_file_name(name)
    }

    /// Sort key: embedded timestamp, ties broken by filename.
    #[must_use]
    pub fn sort_key(&self) -> (i64, String) {
        (self.timestamp_ms, self.file_name())
    }
}

/// A per-thread/per-frame unwind error entry from the native runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashErrorEntry {
    /// Native error code reported by the unwinder.
    pub code: i64,
    /// Context value for the error (thread or frame index).
    pub context: i64,
}

/// A recovered native crash, parsed from the on-disk evidence.
///
/// A record is only ever constructed from a readable crash file; the raw
/// unwind payload (`crash`) is therefore never absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeCrashRecord {
    /// Unique id assigned to the crash at handler-install time.
    pub crash_id: String,

    /// Session id active when the crash occurred, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// When the crash occurred (epoch milliseconds).
    pub timestamp_ms: i64,

    /// Application state at crash time ("foreground"/"background").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_state: Option<String>,

    /// Raw serialized unwind payload captured at signal time.
    pub crash: String,

    /// Unwind error entries from the paired error file, if parseable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<CrashErrorEntry>>,

    /// Raw text of the paired memory-map file, if readable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,

    /// Address-to-symbol table for the crashed architecture, if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<BTreeMap<String, String>>,

    /// Metadata snapshot last pushed into the native runtime before the crash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataSnapshot>,
}
