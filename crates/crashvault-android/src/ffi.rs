//! C entry points of the packaged native crash runtime.
//!
//! All declarations are centralized here so the unsafe surface is reviewable
//! in one place. Ownership rule: every `*mut c_char` returned by the runtime
//! is heap-allocated by the runtime and must be released with
//! [`cv_free_string`] exactly once.

use std::os::raw::{c_char, c_int};

#[link(name = "crashvault-native")]
extern "C" {
    /// Install the signal handlers. Returns 0 on success.
    pub fn cv_install_handlers(
        report_dir: *const c_char,
        marker_path: *const c_char,
        metadata_json: *const c_char,
        session_id: *const c_char,
        app_state: *const c_char,
        crash_id: *const c_char,
        api_level: c_int,
        is_32bit: c_int,
        dev_logging: c_int,
    ) -> c_int;

    /// Returns the name of a library holding one of our handlers, or null.
    pub fn cv_check_overwritten_handlers() -> *mut c_char;

    /// Re-install the handlers. Returns 0 on success.
    pub fn cv_reinstall_handlers() -> c_int;

    /// Replace the retained metadata snapshot.
    pub fn cv_update_metadata(metadata_json: *const c_char);

    /// Replace the retained session id.
    pub fn cv_update_session_id(session_id: *const c_char);

    /// Replace the retained application state.
    pub fn cv_update_app_state(app_state: *const c_char);

    /// Read a crash report payload. Returns null if unreadable.
    pub fn cv_read_crash_report(path: *const c_char) -> *mut c_char;

    /// Read an error companion payload. Returns null if unreadable.
    pub fn cv_read_errors(path: *const c_char) -> *mut c_char;

    /// Remove the installed handlers.
    pub fn cv_uninstall_handlers();

    /// Release a string allocated by the runtime.
    pub fn cv_free_string(ptr: *mut c_char);
}
