//! On-disk crash report repository.
//!
//! Scans the crash directories for files matching the crash naming scheme,
//! pairs crash files with their error and map companions, and enforces the
//! retention cap. All deletes are best-effort; a failed delete is logged and
//! never propagated.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use crate::report::{CrashFileKind, CrashReportFile};

/// Maximum number of crash files kept on disk.
pub const MAX_RETAINED_CRASHES: usize = 4;

/// Ordering for crash file listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest crash first.
    #[default]
    NewestFirst,
    /// Oldest crash first.
    OldestFirst,
}

/// Counts of crash-related files currently on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryStats {
    /// Number of crash files.
    pub crash_files: usize,
    /// Number of error companion files.
    pub error_files: usize,
    /// Number of map companion files.
    pub map_files: usize,
    /// Companion files with no matching crash file.
    pub orphans: usize,
}

/// Finds, pairs, and prunes crash report files under one or more roots.
///
/// Multiple roots exist because older releases stored crash files in a
/// different directory; reports written there must still be recovered.
#[derive(Debug, Clone)]
pub struct CrashReportRepository {
    roots: Vec<PathBuf>,
}

impl CrashReportRepository {
    /// Create a repository over the given root directories.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// All files under the roots that parse under the crash naming scheme,
    /// regardless of kind. Unparseable files are ignored.
    fn scan(&self) -> Vec<CrashReportFile> {
        let mut found = Vec::new();
        for root in &self.roots {
            let entries = match fs::read_dir(root) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::debug!(root = %root.display(), error = %err, "crash dir not readable");
                    continue;
                }
            };
            for entry in entries.flatten() {
                if let Some(file) = CrashReportFile::parse(&entry.path()) {
                    found.push(file);
                }
            }
        }
        found
    }

    /// List crash files (kind `.crash` only) in the given order.
    ///
    /// Ordering is by the timestamp embedded in the filename, with ties
    /// broken by the full filename, so listings are stable across runs.
    #[must_use]
    pub fn list_crash_files(&self, order: SortOrder) -> Vec<CrashReportFile> {
        let mut crashes: Vec<CrashReportFile> = self
            .scan()
            .into_iter()
            .filter(|file| file.kind == CrashFileKind::Crash)
            .collect();
        crashes.sort_by_key(CrashReportFile::sort_key);
        if order == SortOrder::NewestFirst {
            crashes.reverse();
        }
        crashes
    }

    fn companion(&self, crash: &CrashReportFile, kind: CrashFileKind) -> Option<CrashReportFile> {
        let path = crash.companion_path(kind);
        if path.exists() {
            CrashReportFile::parse(&path)
        } else {
            None
        }
    }

    /// The error companion of a crash file, if present on disk.
    #[must_use]
    pub fn error_file_for(&self, crash: &CrashReportFile) -> Option<CrashReportFile> {
        self.companion(crash, CrashFileKind::Error)
    }

    /// The map companion of a crash file, if present on disk.
    #[must_use]
    pub fn map_file_for(&self, crash: &CrashReportFile) -> Option<CrashReportFile> {
        self.companion(crash, CrashFileKind::Map)
    }

    fn remove(path: &PathBuf) {
        if let Err(err) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %err, "failed to delete crash file");
        }
    }

    /// Delete a crash file and its companions.
    ///
    /// Deletion is unconditional; it runs whether or not the crash was
    /// delivered, so a report is attempted at most once.
    pub fn delete_files(
        &self,
        crash: &CrashReportFile,
        error: Option<&CrashReportFile>,
        map: Option<&CrashReportFile>,
    ) {
        Self::remove(&crash.path);
        if let Some(error) = error {
            Self::remove(&error.path);
        }
        if let Some(map) = map {
            Self::remove(&map.path);
        }
    }

    /// Count crash-related files currently on disk.
    #[must_use]
    pub fn stats(&self) -> RepositoryStats {
        let mut stats = RepositoryStats::default();
        for file in self.scan() {
            match file.kind {
                CrashFileKind::Crash => stats.crash_files += 1,
                CrashFileKind::Error => stats.error_files += 1,
                CrashFileKind::Map => stats.map_files += 1,
            }
            if file.kind != CrashFileKind::Crash
                && !file.companion_path(CrashFileKind::Crash).exists()
            {
                stats.orphans += 1;
            }
        }
        stats
    }

    /// Enforce the retention cap and sweep orphans.
    ///
    /// Keeps the newest [`MAX_RETAINED_CRASHES`] crash files and deletes the
    /// rest along with their companions. Error and map files whose crash
    /// sibling no longer exists are deleted as well.
    pub fn enforce_retention(&self) {
        let crashes = self.list_crash_files(SortOrder::NewestFirst);
        for crash in crashes.iter().skip(MAX_RETAINED_CRASHES) {
            tracing::debug!(file = %crash.path.display(), "evicting crash beyond retention cap");
            self.delete_files(
                crash,
                self.error_file_for(crash).as_ref(),
                self.map_file_for(crash).as_ref(),
            );
        }

        for file in self.scan() {
            if file.kind == CrashFileKind::Crash {
                continue;
            }
            if !file.companion_path(CrashFileKind::Crash).exists() {
                tracing::debug!(file = %file.path.display(), "deleting orphan companion file");
                Self::remove(&file.path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"{}").unwrap();
        path
    }

    fn crash_name(ts: i64, session: &str, pid: u32) -> String {
        format!("cv_crash_{ts}_{session}_{pid}_true.crash")
    }

    #[test]
    fn test_list_orders_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &crash_name(300, "s3", 13));
        touch(dir.path(), &crash_name(100, "s1", 11));
        touch(dir.path(), &crash_name(200, "s2", 12));

        let repo = CrashReportRepository::new(vec![dir.path().to_path_buf()]);

        let newest = repo.list_crash_files(SortOrder::NewestFirst);
        let stamps: Vec<i64> = newest.iter().map(|f| f.timestamp_ms).collect();
        assert_eq!(stamps, vec![300, 200, 100]);

        let oldest = repo.list_crash_files(SortOrder::OldestFirst);
        let stamps: Vec<i64> = oldest.iter().map(|f| f.timestamp_ms).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
    }

    #[test]
    fn test_list_breaks_timestamp_ties_by_filename() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &crash_name(100, "bb", 2));
        touch(dir.path(), &crash_name(100, "aa", 1));

        let repo = CrashReportRepository::new(vec![dir.path().to_path_buf()]);
        let files = repo.list_crash_files(SortOrder::OldestFirst);

        assert_eq!(files[0].session_id.as_deref(), Some("aa"));
        assert_eq!(files[1].session_id.as_deref(), Some("bb"));
    }

    #[test]
    fn test_list_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &crash_name(100, "s1", 11));
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "cv_crash_bad_name.crash");

        let repo = CrashReportRepository::new(vec![dir.path().to_path_buf()]);
        assert_eq!(repo.list_crash_files(SortOrder::NewestFirst).len(), 1);
    }

    #[test]
    fn test_list_spans_multiple_roots() {
        let old_dir = tempfile::tempdir().unwrap();
        let new_dir = tempfile::tempdir().unwrap();
        touch(old_dir.path(), &crash_name(100, "old", 1));
        touch(new_dir.path(), &crash_name(200, "new", 2));

        let repo = CrashReportRepository::new(vec![
            new_dir.path().to_path_buf(),
            old_dir.path().to_path_buf(),
        ]);

        let files = repo.list_crash_files(SortOrder::NewestFirst);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].session_id.as_deref(), Some("new"));
    }

    #[test]
    fn test_missing_root_is_not_an_error() {
        let repo = CrashReportRepository::new(vec![PathBuf::from("/nonexistent/ndk")]);
        assert!(repo.list_crash_files(SortOrder::NewestFirst).is_empty());
    }

    #[test]
    fn test_companion_lookup() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &crash_name(100, "s1", 11));
        touch(dir.path(), "cv_crash_100_s1_11_true.error");

        let repo = CrashReportRepository::new(vec![dir.path().to_path_buf()]);
        let crash = &repo.list_crash_files(SortOrder::NewestFirst)[0];

        let error = repo.error_file_for(crash).unwrap();
        assert_eq!(error.kind, CrashFileKind::Error);
        assert!(repo.map_file_for(crash).is_none());
    }

    #[test]
    fn test_delete_files_removes_trio() {
        let dir = tempfile::tempdir().unwrap();
        let crash_path = touch(dir.path(), &crash_name(100, "s1", 11));
        let error_path = touch(dir.path(), "cv_crash_100_s1_11_true.error");
        let map_path = touch(dir.path(), "cv_crash_100_s1_11_true.map");

        let repo = CrashReportRepository::new(vec![dir.path().to_path_buf()]);
        let crash = &repo.list_crash_files(SortOrder::NewestFirst)[0];
        let error = repo.error_file_for(crash);
        let map = repo.map_file_for(crash);

        repo.delete_files(crash, error.as_ref(), map.as_ref());

        assert!(!crash_path.exists());
        assert!(!error_path.exists());
        assert!(!map_path.exists());
    }

    #[test]
    fn test_retention_keeps_newest_four() {
        let dir = tempfile::tempdir().unwrap();
        for ts in 1..=6 {
            touch(dir.path(), &crash_name(ts * 100, "s", ts as u32));
        }

        let repo = CrashReportRepository::new(vec![dir.path().to_path_buf()]);
        repo.enforce_retention();

        let files = repo.list_crash_files(SortOrder::NewestFirst);
        let stamps: Vec<i64> = files.iter().map(|f| f.timestamp_ms).collect();
        assert_eq!(stamps, vec![600, 500, 400, 300]);
    }

    #[test]
    fn test_retention_deletes_companions_of_evicted() {
        let dir = tempfile::tempdir().unwrap();
        for ts in 1..=5 {
            touch(dir.path(), &crash_name(ts * 100, "s", ts as u32));
        }
        let evicted_error = touch(dir.path(), "cv_crash_100_s_1_true.error");

        let repo = CrashReportRepository::new(vec![dir.path().to_path_buf()]);
        repo.enforce_retention();

        assert!(!evicted_error.exists());
    }

    #[test]
    fn test_retention_sweeps_orphan_companions() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &crash_name(100, "s1", 11));
        touch(dir.path(), "cv_crash_100_s1_11_true.map");
        let orphan_error = touch(dir.path(), "cv_crash_999_gone_9_true.error");
        let orphan_map = touch(dir.path(), "cv_crash_998_gone_9_true.map");

        let repo = CrashReportRepository::new(vec![dir.path().to_path_buf()]);
        repo.enforce_retention();

        assert!(!orphan_error.exists());
        assert!(!orphan_map.exists());
        // Companions of surviving crashes stay.
        assert!(dir.path().join("cv_crash_100_s1_11_true.map").exists());
    }

    #[test]
    fn test_stats_counts_kinds_and_orphans() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &crash_name(100, "s1", 11));
        touch(dir.path(), "cv_crash_100_s1_11_true.error");
        touch(dir.path(), "cv_crash_999_gone_9_true.map");

        let repo = CrashReportRepository::new(vec![dir.path().to_path_buf()]);
        let stats = repo.stats();

        assert_eq!(stats.crash_files, 1);
        assert_eq!(stats.error_files, 1);
        assert_eq!(stats.map_files, 1);
        assert_eq!(stats.orphans, 1);
    }

    #[test]
    fn test_retention_with_fewer_than_cap_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &crash_name(100, "s1", 11));

        let repo = CrashReportRepository::new(vec![dir.path().to_path_buf()]);
        repo.enforce_retention();

        assert_eq!(repo.list_crash_files(SortOrder::NewestFirst).len(), 1);
    }
}
