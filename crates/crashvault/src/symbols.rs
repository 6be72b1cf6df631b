//! Packaged symbol table loading and per-architecture lookup.
//!
//! Build tooling packages an address-to-symbol table alongside the
//! application as a single base64-encoded string. Decoded, it is a JSON
//! object keyed by CPU architecture name, each value a map of address to
//! symbol name. The table is loaded at most once per process; a decode or
//! parse failure is also cached so a corrupt blob is never re-read.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{track_internal_error, Error, InternalErrorType, Result};

/// Supplies the raw base64 symbol blob.
///
/// The blob is packaged differently per platform (a string resource on
/// device, a file on disk for tooling), so the source is abstracted here.
pub trait SymbolSource: Send + Sync {
    /// Return the base64-encoded blob, or `None` if none was packaged.
    fn load(&self) -> Option<String>;
}

/// Reads the symbol blob from a file.
#[derive(Debug, Clone)]
pub struct FileSymbolSource {
    path: PathBuf,
}

impl FileSymbolSource {
    /// Create a source backed by the given file path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SymbolSource for FileSymbolSource {
    fn load(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(blob) => Some(blob.trim().to_string()),
            Err(err) => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %err,
                    "no packaged symbol table"
                );
                None
            }
        }
    }
}

/// The decoded symbol table, keyed by architecture name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeSymbols {
    /// Architecture name to address-to-symbol map.
    pub symbols: HashMap<String, BTreeMap<String, String>>,
}

impl NativeSymbols {
    /// Look up the symbol map for an architecture.
    ///
    /// Lookup is case-insensitive on the architecture name. A 64-bit
    /// architecture with no entry of its own falls back to its 32-bit
    /// counterpart (`arm64-v8a` to `armeabi-v7a`, `x86_64` to `x86`),
    /// since those symbol files are compatible.
    #[must_use]
    pub fn for_architecture(&self, arch: &str) -> Option<BTreeMap<String, String>> {
        let arch = arch.to_lowercase();
        if let Some(found) = self.symbols.get(&arch) {
            return Some(found.clone());
        }
        let compat = match arch.as_str() {
            "arm64-v8a" => "armeabi-v7a",
            "x86_64" => "x86",
            _ => return None,
        };
        self.symbols.get(compat).cloned()
    }
}

/// Decode a base64 blob into a [`NativeSymbols`] table.
///
/// # Errors
///
/// Returns an error if the blob is not valid base64, not valid UTF-8, or
/// does not deserialize into an architecture-keyed table.
pub fn decode_symbols(blob: &str) -> Result<NativeSymbols> {
    let bytes = STANDARD
        .decode(blob)
        .map_err(|err| Error::symbols_decode(format!("invalid base64: {err}")))?;
    let json = String::from_utf8(bytes)
        .map_err(|err| Error::symbols_decode(format!("invalid utf-8: {err}")))?;
    serde_json::from_str(&json)
        .map_err(|err| Error::symbols_decode(format!("invalid symbol json: {err}")))
}

/// Loads the packaged symbol table once and answers per-architecture lookups
/// for the rest of the process lifetime.
pub struct SymbolResolver {
    source: Box<dyn SymbolSource>,
    table: OnceLock<Option<NativeSymbols>>,
}

impl std::fmt::Debug for SymbolResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolResolver")
            .field("loaded", &self.table.get().is_some())
            .finish_non_exhaustive()
    }
}

impl SymbolResolver {
    /// Create a resolver over the given source. Nothing is read until the
    /// first lookup.
    #[must_use]
    pub fn new(source: Box<dyn SymbolSource>) -> Self {
        Self {
            source,
            table: OnceLock::new(),
        }
    }

    /// Resolve the symbol map for an architecture.
    ///
    /// The packaged blob is loaded and decoded on the first call and the
    /// outcome is cached, including a failed decode. A missing or corrupt
    /// table degrades to `None`; it never fails the crash pipeline.
    pub fn resolve(&self, arch: &str) -> Option<BTreeMap<String, String>> {
        let table = self.table.get_or_init(|| {
            let blob = self.source.load()?;
            match decode_symbols(&blob) {
                Ok(table) => Some(table),
                Err(err) => {
                    track_internal_error(InternalErrorType::InvalidNativeSymbols, &err);
                    None
                }
            }
        });
        table.as_ref().and_then(|table| table.for_architecture(arch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn encode(json: &str) -> String {
        STANDARD.encode(json)
    }

    struct CountingSource {
        blob: Option<String>,
        loads: Arc<AtomicUsize>,
    }

    impl SymbolSource for CountingSource {
        fn load(&self) -> Option<String> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.blob.clone()
        }
    }

    const SAMPLE: &str =
        r#"{"symbols":{"arm64-v8a":{"0x1000":"main","0x2000":"handle_signal"}}}"#;

    #[test]
    fn test_decode_symbols() {
        let table = decode_symbols(&encode(SAMPLE)).unwrap();
        let arch = table.for_architecture("arm64-v8a").unwrap();
        assert_eq!(arch.get("0x1000"), Some(&"main".to_string()));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let err = decode_symbols("!!! not base64 !!!").unwrap_err();
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn test_decode_rejects_bad_json() {
        let err = decode_symbols(&encode("{ nope")).unwrap_err();
        assert!(err.to_string().contains("json"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = decode_symbols(&encode(SAMPLE)).unwrap();
        assert!(table.for_architecture("ARM64-V8A").is_some());
    }

    #[test]
    fn test_64bit_arch_falls_back_to_32bit_entry() {
        let json = r#"{"symbols":{"armeabi-v7a":{"0x1000":"main"}}}"#;
        let table = decode_symbols(&encode(json)).unwrap();

        let arch = table.for_architecture("arm64-v8a").unwrap();
        assert_eq!(arch.get("0x1000"), Some(&"main".to_string()));
    }

    #[test]
    fn test_x86_64_falls_back_to_x86_entry() {
        let json = r#"{"symbols":{"x86":{"0x2000":"start"}}}"#;
        let table = decode_symbols(&encode(json)).unwrap();

        let arch = table.for_architecture("x86_64").unwrap();
        assert_eq!(arch.get("0x2000"), Some(&"start".to_string()));
    }

    #[test]
    fn test_own_entry_wins_over_fallback() {
        let json =
            r#"{"symbols":{"arm64-v8a":{"0x1":"own"},"armeabi-v7a":{"0x1":"compat"}}}"#;
        let table = decode_symbols(&encode(json)).unwrap();

        let arch = table.for_architecture("arm64-v8a").unwrap();
        assert_eq!(arch.get("0x1"), Some(&"own".to_string()));
    }

    #[test]
    fn test_unknown_arch_resolves_to_none() {
        let table = decode_symbols(&encode(SAMPLE)).unwrap();
        assert!(table.for_architecture("x86").is_none());
    }

    #[test]
    fn test_resolver_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let resolver = SymbolResolver::new(Box::new(CountingSource {
            blob: Some(encode(SAMPLE)),
            loads: Arc::clone(&loads),
        }));

        assert!(resolver.resolve("arm64-v8a").is_some());
        assert!(resolver.resolve("arm64-v8a").is_some());
        assert!(resolver.resolve("x86").is_none());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolver_caches_decode_failure() {
        let loads = Arc::new(AtomicUsize::new(0));
        let resolver = SymbolResolver::new(Box::new(CountingSource {
            blob: Some("not base64".to_string()),
            loads: Arc::clone(&loads),
        }));

        assert!(resolver.resolve("arm64-v8a").is_none());
        // The corrupt blob is not re-read on later lookups.
        assert!(resolver.resolve("arm64-v8a").is_none());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolver_missing_blob() {
        let resolver = SymbolResolver::new(Box::new(CountingSource {
            blob: None,
            loads: Arc::new(AtomicUsize::new(0)),
        }));
        assert!(resolver.resolve("arm64-v8a").is_none());
    }

    #[test]
    fn test_file_source_reads_and_trims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("native_symbols.b64");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", encode(SAMPLE)).unwrap();

        let source = FileSymbolSource::new(path);
        let blob = source.load().unwrap();
        assert!(decode_symbols(&blob).is_ok());
    }

    #[test]
    fn test_file_source_missing_file() {
        let source = FileSymbolSource::new(PathBuf::from("/nonexistent/symbols.b64"));
        assert!(source.load().is_none());
    }
}
