//! Android signal-bridge implementation for crashvault.
//!
//! This crate links against the packaged native crash runtime
//! (`libcrashvault-native.so`) and implements [`crashvault::SignalBridge`]
//! over its C entry points. It is the only crate in the workspace that
//! contains unsafe code; everything above it drives the runtime through the
//! safe trait.

#![cfg(target_os = "android")]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod ffi;

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crashvault::bridge::{BridgeError, InstallRequest, SignalBridge};

/// Bridge to the packaged native crash runtime.
#[derive(Debug, Default)]
pub struct AndroidSignalBridge;

impl AndroidSignalBridge {
    /// Create a bridge. The native library is linked at load time; a missing
    /// library fails process startup, not this constructor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn cstring(value: &str) -> Result<CString, BridgeError> {
    CString::new(value)
        .map_err(|_| BridgeError::install_rejected("string contains interior NUL byte"))
}

fn cstring_path(path: &Path) -> Result<CString, BridgeError> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| BridgeError::install_rejected("path contains interior NUL byte"))
}

/// Take ownership of a string returned by the native runtime.
///
/// The runtime allocates returned strings; they must be released through
/// `cv_free_string` exactly once, which this function guarantees.
fn take_native_string(ptr: *mut c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: the runtime returns either null or a NUL-terminated string it
    // allocated; it is not mutated concurrently and is freed exactly once
    // below.
    let value = unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_owned);
    unsafe { ffi::cv_free_string(ptr) };
    match value {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(error = %err, "native runtime returned non-utf8 string");
            None
        }
    }
}

fn read_native(path: &Path, reader: unsafe extern "C" fn(*const c_char) -> *mut c_char) -> Option<String> {
    let path = cstring_path(path).ok()?;
    // SAFETY: path is a valid NUL-terminated string for the duration of the
    // call; the runtime does not retain the pointer.
    take_native_string(unsafe { reader(path.as_ptr()) })
}

impl SignalBridge for AndroidSignalBridge {
    fn install_handlers(&self, request: &InstallRequest) -> Result<(), BridgeError> {
        let report_dir = cstring_path(&request.report_dir)?;
        let marker_path = cstring_path(&request.marker_path)?;
        let metadata_json = cstring(&request.metadata_json)?;
        let session_id = cstring(&request.session_id)?;
        let app_state = cstring(&request.app_state)?;
        let crash_id = cstring(&request.crash_id)?;

        // SAFETY: all pointers are valid NUL-terminated strings for the
        // duration of the call; the runtime copies what it needs.
        let rc = unsafe {
            ffi::cv_install_handlers(
                report_dir.as_ptr(),
                marker_path.as_ptr(),
                metadata_json.as_ptr(),
                session_id.as_ptr(),
                app_state.as_ptr(),
                crash_id.as_ptr(),
                request.api_level,
                c_int::from(request.is_32bit),
                c_int::from(request.dev_logging),
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(BridgeError::install_rejected(format!(
                "native runtime returned {rc}"
            )))
        }
    }

    fn check_for_overwritten_handlers(&self) -> Option<String> {
        // SAFETY: no arguments; returns null or an owned string.
        take_native_string(unsafe { ffi::cv_check_overwritten_handlers() })
    }

    fn reinstall_handlers(&self) -> bool {
        // SAFETY: no arguments.
        unsafe { ffi::cv_reinstall_handlers() == 0 }
    }

    fn update_metadata(&self, metadata_json: &str) {
        if let Ok(json) = cstring(metadata_json) {
            // SAFETY: json is valid for the duration of the call.
            unsafe { ffi::cv_update_metadata(json.as_ptr()) };
        }
    }

    fn update_session_id(&self, session_id: &str) {
        if let Ok(id) = cstring(session_id) {
            // SAFETY: id is valid for the duration of the call.
            unsafe { ffi::cv_update_session_id(id.as_ptr()) };
        }
    }

    fn update_app_state(&self, app_state: &str) {
        if let Ok(state) = cstring(app_state) {
            // SAFETY: state is valid for the duration of the call.
            unsafe { ffi::cv_update_app_state(state.as_ptr()) };
        }
    }

    fn read_crash_report(&self, path: &Path) -> Option<String> {
        read_native(path, ffi::cv_read_crash_report)
    }

    fn read_errors(&self, path: &Path) -> Option<String> {
        read_native(path, ffi::cv_read_errors)
    }

    fn uninstall_handlers(&self) {
        // SAFETY: no arguments.
        unsafe { ffi::cv_uninstall_handlers() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cstring_rejects_interior_nul() {
        assert!(cstring("with\0nul").is_err());
        assert!(cstring("clean").is_ok());
    }

    #[test]
    fn test_cstring_path() {
        assert!(cstring_path(Path::new("/data/ndk")).is_ok());
    }

    #[test]
    fn test_take_native_string_null() {
        assert!(take_native_string(std::ptr::null_mut()).is_none());
    }
}
