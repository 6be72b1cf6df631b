//! Native crash orchestrator.
//!
//! Process-wide controller over the signal-handling runtime. It installs
//! handlers at startup, schedules a one-shot integrity check to catch
//! third-party libraries that silently replace them, keeps the native side's
//! metadata snapshot current, and recovers crash evidence left behind by a
//! previous process instance.
//!
//! At most one orchestrator per process may call [`CrashOrchestrator::install`];
//! signal handlers are a process-global resource.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use uuid::Uuid;

use crate::bridge::{InstallRequest, SignalBridge};
use crate::config::{Config, HANDLER_CHECK_DELAY};
use crate::delivery::CrashDelivery;
use crate::error::{track_internal_error, Error, InternalErrorType, Result};
use crate::metadata::{MetadataStore, METADATA_MAX_BYTES};
use crate::report::{AppState, CrashReportFile, NativeCrashRecord, SESSION_ID_NULL};
use crate::repository::{CrashReportRepository, SortOrder};
use crate::symbols::{FileSymbolSource, SymbolResolver};
use crate::worker::BackgroundWorker;

/// Native libraries allowed to hold a signal handler without triggering
/// reinstallation. Matched as substrings of the culprit library name.
pub const HANDLER_ALLOW_LIST: &[&str] = &["libwebviewchromium.so"];

/// Installation lifecycle of the signal handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    /// Handlers are not installed.
    Uninstalled,
    /// Installation is in progress.
    Installing,
    /// Handlers are installed.
    Installed,
}

/// Integrity of the installed handlers, tracked only while installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerIntegrity {
    /// Our handlers are in place as far as we know.
    Ok,
    /// A third-party library was seen holding one of our handlers.
    Overwritten,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives handler installation, metadata propagation, and crash recovery.
pub struct CrashOrchestrator {
    config: Config,
    bridge: Arc<dyn SignalBridge>,
    delivery: Arc<dyn CrashDelivery>,
    repository: CrashReportRepository,
    metadata: MetadataStore,
    symbols: SymbolResolver,
    worker: BackgroundWorker,
    // Self-handle for tasks spawned off this instance (integrity check,
    // worker closures).
    weak: Weak<Self>,
    // Guards the install transition and every synchronous bridge push, so a
    // state push cannot reach a bridge that is mid-install.
    state: Mutex<InstallState>,
    integrity: Mutex<HandlerIntegrity>,
    installed: AtomicBool,
    app_state: Mutex<AppState>,
    session_id: Mutex<Option<String>>,
}

impl std::fmt::Debug for CrashOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashOrchestrator")
            .field("state", &*lock(&self.state))
            .field("integrity", &*lock(&self.integrity))
            .finish_non_exhaustive()
    }
}

impl CrashOrchestrator {
    /// Create an orchestrator. Requires a tokio runtime (spawns the
    /// background worker). Nothing touches the bridge until
    /// [`install`](Self::install) is called.
    #[must_use]
    pub fn new(
        config: Config,
        bridge: Arc<dyn SignalBridge>,
        delivery: Arc<dyn CrashDelivery>,
        metadata: MetadataStore,
    ) -> Arc<Self> {
        let repository = CrashReportRepository::new(vec![config.crash_dir()]);
        let symbols = SymbolResolver::new(Box::new(FileSymbolSource::new(config.symbols_path())));
        Arc::new_cyclic(|weak| Self {
            config,
            bridge,
            delivery,
            repository,
            metadata,
            symbols,
            worker: BackgroundWorker::spawn(),
            weak: weak.clone(),
            state: Mutex::new(InstallState::Uninstalled),
            integrity: Mutex::new(HandlerIntegrity::Ok),
            installed: AtomicBool::new(false),
            app_state: Mutex::new(AppState::Foreground),
            session_id: Mutex::new(None),
        })
    }

    /// Whether the handlers are currently installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// The repository this orchestrator recovers crash files from.
    #[must_use]
    pub fn repository(&self) -> &CrashReportRepository {
        &self.repository
    }

    /// The metadata store feeding snapshots to the native side.
    #[must_use]
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Install the signal handlers.
    ///
    /// Skipped entirely when native capture is disabled in config. Any
    /// failure is logged on the internal-error channel and leaves the
    /// orchestrator uninstalled; it is never fatal to the host application
    /// and is not retried within this process.
    pub fn install(&self) {
        if !self.config.native.enabled {
            tracing::debug!("native crash capture disabled, skipping handler install");
            return;
        }

        let mut state = lock(&self.state);
        if *state != InstallState::Uninstalled {
            return;
        }
        *state = InstallState::Installing;

        match self.try_install() {
            Ok(()) => {
                *state = InstallState::Installed;
                self.installed.store(true, Ordering::SeqCst);
                drop(state);
                tracing::info!("native crash handlers installed");
                if self.config.native.handler_detection_enabled {
                    self.schedule_integrity_check();
                }
            }
            Err(err) => {
                *state = InstallState::Uninstalled;
                drop(state);
                track_internal_error(InternalErrorType::NativeHandlerInstallFail, &err);
            }
        }
    }

    fn try_install(&self) -> Result<()> {
        let report_dir = self.config.crash_dir();
        if let Err(err) = fs::create_dir_all(&report_dir) {
            // The native runtime may still be able to write here.
            tracing::warn!(
                dir = %report_dir.display(),
                error = %err,
                "failed to create crash report directory"
            );
        }

        let metadata_json = self.bounded_metadata_json()?;
        let session_id = lock(&self.session_id)
            .clone()
            .unwrap_or_else(|| SESSION_ID_NULL.to_string());
        let device = self.metadata.device_info();
        let request = InstallRequest {
            report_dir,
            marker_path: self.config.marker_file_path(),
            metadata_json,
            session_id,
            app_state: lock(&self.app_state).as_str().to_string(),
            crash_id: Uuid::new_v4().to_string(),
            api_level: device.api_level,
            is_32bit: device.is_32bit,
            dev_logging: self.config.native.dev_logging,
        };

        self.bridge
            .install_handlers(&request)
            .map_err(|err| Error::handler_install(err.to_string()))
    }

    /// Remove the handlers and return to the uninstalled state.
    pub fn uninstall(&self) {
        let mut state = lock(&self.state);
        if *state == InstallState::Installed {
            self.bridge.uninstall_handlers();
        }
        *state = InstallState::Uninstalled;
        self.installed.store(false, Ordering::SeqCst);
    }

    fn schedule_integrity_check(&self) {
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(HANDLER_CHECK_DELAY).await;
            this.check_handler_integrity();
        });
    }

    // One-shot by design: runs once after the install delay and is never
    // re-armed, even when an overwrite was found and healed.
    fn check_handler_integrity(&self) {
        if !self.is_installed() {
            return;
        }
        let Some(culprit) = self.bridge.check_for_overwritten_handlers() else {
            return;
        };
        if HANDLER_ALLOW_LIST.iter().any(|ok| culprit.contains(ok)) {
            tracing::debug!(library = %culprit, "handler held by allow-listed library");
            return;
        }

        *lock(&self.integrity) = HandlerIntegrity::Overwritten;
        tracing::warn!(
            library = %culprit,
            "signal handlers overwritten by third-party library, reinstalling"
        );
        if !self.bridge.reinstall_handlers() {
            tracing::warn!("handler reinstallation was rejected by the native runtime");
        }
        // Best-effort self-healing; the reinstall is not re-verified.
        *lock(&self.integrity) = HandlerIntegrity::Ok;
    }

    /// Serialize the current metadata snapshot, degrading to the variant
    /// without session properties when the full one reaches the ceiling.
    fn bounded_metadata_json(&self) -> Result<String> {
        let full = self.metadata.serialize(true)?;
        if full.len() < METADATA_MAX_BYTES {
            return Ok(full);
        }
        tracing::debug!(
            bytes = full.len(),
            "metadata snapshot too large, dropping session properties"
        );
        self.metadata.serialize(false)
    }

    fn push_metadata_now(&self) {
        if !self.is_installed() {
            return;
        }
        match self.bounded_metadata_json() {
            Ok(json) => self.bridge.update_metadata(&json),
            Err(err) => tracing::warn!(error = %err, "failed to serialize metadata snapshot"),
        }
    }

    /// Recompute the metadata snapshot and push it on the background worker.
    pub fn push_metadata(&self) {
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        self.worker.submit(move || this.push_metadata_now());
    }

    /// Replace user info and propagate the new snapshot.
    pub fn set_user_info(&self, user_info: crate::metadata::UserInfo) {
        self.metadata.set_user_info(user_info);
        self.push_metadata();
    }

    /// Set a session property and propagate the new snapshot.
    pub fn set_session_property(&self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.set_session_property(key, value);
        self.push_metadata();
    }

    /// Remove a session property and propagate the new snapshot.
    pub fn remove_session_property(&self, key: &str) {
        self.metadata.remove_session_property(key);
        self.push_metadata();
    }

    /// Push the new session id into the native runtime.
    pub fn update_session_id(&self, session_id: &str) {
        *lock(&self.session_id) = Some(session_id.to_string());
        let state = lock(&self.state);
        if *state == InstallState::Installed {
            self.bridge.update_session_id(session_id);
        }
    }

    /// The application moved to the foreground.
    pub fn on_foreground(&self) {
        self.push_app_state(AppState::Foreground);
    }

    /// The application moved to the background.
    pub fn on_background(&self) {
        self.push_app_state(AppState::Background);
    }

    // Synchronous and under the install lock, so the push cannot race an
    // in-progress install and reach an uninitialized bridge.
    fn push_app_state(&self, app_state: AppState) {
        let state = lock(&self.state);
        *lock(&self.app_state) = app_state;
        if *state == InstallState::Installed {
            self.bridge.update_app_state(app_state.as_str());
        }
    }

    /// Read one crash file and assemble its record plus the companion files
    /// that should be deleted with it.
    ///
    /// An unreadable file is left on disk for a later pass; a readable but
    /// unparseable payload deletes the file, corrupt data is never retried.
    fn load_record(
        &self,
        crash: &CrashReportFile,
    ) -> Option<(
        NativeCrashRecord,
        Option<CrashReportFile>,
        Option<CrashReportFile>,
    )> {
        let Some(raw) = self.bridge.read_crash_report(&crash.path) else {
            track_internal_error(
                InternalErrorType::NativeCrashLoadFail,
                &Error::CrashReportRead {
                    path: crash.path.clone(),
                },
            );
            return None;
        };

        let mut record: NativeCrashRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(source) => {
                let err = Error::CrashReportParse {
                    path: crash.path.clone(),
                    source,
                };
                track_internal_error(InternalErrorType::NativeCrashLoadFail, &err);
                if let Err(err) = fs::remove_file(&crash.path) {
                    tracing::warn!(
                        path = %crash.path.display(),
                        error = %err,
                        "failed to delete corrupt crash file"
                    );
                }
                return None;
            }
        };

        let error_file = self.repository.error_file_for(crash);
        record.errors = error_file
            .as_ref()
            .and_then(|file| self.bridge.read_errors(&file.path))
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(errors) => Some(errors),
                Err(err) => {
                    tracing::warn!(
                        path = %crash.path.display(),
                        error = %err,
                        "failed to parse crash error payload"
                    );
                    None
                }
            });

        let map_file = self.repository.map_file_for(crash);
        record.map = map_file.as_ref().and_then(|file| {
            fs::read_to_string(&file.path)
                .map_err(|err| {
                    tracing::warn!(
                        path = %file.path.display(),
                        error = %err,
                        "failed to read map file"
                    );
                })
                .ok()
        });

        let arch = &self.metadata.device_info().architecture;
        record.symbols = self.symbols.resolve(arch);
        if record.symbols.is_none() {
            tracing::debug!(architecture = %arch, "no symbol table for architecture");
        }

        Some((record, error_file, map_file))
    }

    /// Parse every crash file on disk without deleting anything.
    ///
    /// Corrupt files are still deleted as a side effect of parsing; per-file
    /// failures are isolated so one bad file cannot block the others.
    #[must_use]
    pub fn get_all_native_crashes(&self) -> Vec<NativeCrashRecord> {
        self.repository
            .list_crash_files(SortOrder::NewestFirst)
            .iter()
            .filter_map(|crash| self.load_record(crash).map(|(record, _, _)| record))
            .collect()
    }

    /// Return the most recent crash record and delete all crash evidence.
    ///
    /// Every readable crash file is consumed in this pass; afterwards the
    /// directory holds no crash files other than unreadable ones.
    #[must_use]
    pub fn get_latest_native_crash(&self) -> Option<NativeCrashRecord> {
        let mut newest = None;
        for crash in self.repository.list_crash_files(SortOrder::NewestFirst) {
            if let Some((record, error_file, map_file)) = self.load_record(&crash) {
                self.repository
                    .delete_files(&crash, error_file.as_ref(), map_file.as_ref());
                if newest.is_none() {
                    newest = Some(record);
                }
            }
        }
        newest
    }

    /// Delete all crash evidence without parsing it.
    pub fn delete_all_native_crashes(&self) {
        for crash in self.repository.list_crash_files(SortOrder::NewestFirst) {
            self.repository.delete_files(
                &crash,
                self.repository.error_file_for(&crash).as_ref(),
                self.repository.map_file_for(&crash).as_ref(),
            );
        }
        self.repository.enforce_retention();
    }

    /// Recover crashes from a previous process instance and hand them to
    /// the delivery collaborator, newest first.
    ///
    /// Delivery is at most once: the on-disk trio is deleted whether or not
    /// delivery succeeded, and a failed send is logged and dropped, never
    /// retried. Returns the number of records delivered.
    pub async fn recover_and_send(&self) -> usize {
        let mut delivered = 0;
        for crash in self.repository.list_crash_files(SortOrder::NewestFirst) {
            let Some((record, error_file, map_file)) = self.load_record(&crash) else {
                continue;
            };
            match self.delivery.send(&record).await {
                Ok(()) => delivered += 1,
                Err(err) => track_internal_error(InternalErrorType::CrashDeliveryFail, &err),
            }
            self.repository
                .delete_files(&crash, error_file.as_ref(), map_file.as_ref());
        }
        self.repository.enforce_retention();
        delivered
    }

    /// Run startup recovery, honoring the deferred-retrieval config flag.
    ///
    /// Inline recovery returns the delivered count; deferred recovery is
    /// spawned onto the runtime and returns `None` immediately so SDK
    /// startup is not blocked on crash-file I/O.
    pub async fn recover_on_startup(&self) -> Option<usize> {
        if self.config.native.deferred_retrieval {
            if let Some(this) = self.weak.upgrade() {
                tokio::spawn(async move {
                    let delivered = this.recover_and_send().await;
                    tracing::debug!(delivered, "deferred crash recovery finished");
                });
            }
            None
        } else {
            Some(self.recover_and_send().await)
        }
    }
}
