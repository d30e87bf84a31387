//! Pre-mutation snapshots of the catalog database.
//!
//! The store notifies a [`SnapshotHook`] before every write. Snapshots are
//! best effort: a failing hook is logged by the store and the write goes
//! ahead.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// The write about to happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotContext {
    /// Store operation, e.g. `upsert_part`.
    pub operation: &'static str,
    /// Key of the record being written.
    pub target: String,
}

impl SnapshotContext {
    pub fn new(operation: &'static str, target: impl Into<String>) -> Self {
        Self {
            operation,
            target: target.into(),
        }
    }
}

/// What a hook produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    /// Written copy; `None` when there was nothing to copy.
    pub path: Option<PathBuf>,
    pub taken_at: DateTime<Utc>,
}

pub trait SnapshotHook: Send + Sync {
    fn snapshot(&self, context: &SnapshotContext) -> Result<BackupHandle>;
}

/// Hook for catalogs without a file, such as in-memory databases.
#[derive(Debug, Clone, Default)]
pub struct NoopSnapshotHook;

impl SnapshotHook for NoopSnapshotHook {
    fn snapshot(&self, _context: &SnapshotContext) -> Result<BackupHandle> {
        Ok(BackupHandle {
            path: None,
            taken_at: Utc::now(),
        })
    }
}

/// Copies the database file into a backup directory before each write.
///
/// Copies are named `<stem>.backup-<YYYYmmdd-HHMMSS-fff><ext>`.
#[derive(Debug, Clone)]
pub struct FileSnapshotHook {
    database_file: PathBuf,
    directory: PathBuf,
}

impl FileSnapshotHook {
    pub fn new(database_file: impl Into<PathBuf>, directory: impl Into<PathBuf>) -> Self {
        Self {
            database_file: database_file.into(),
            directory: directory.into(),
        }
    }

    pub fn backup_name(database_file: &Path, taken_at: DateTime<Utc>) -> String {
        let stem = database_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("catalog");
        let ext = database_file
            .extension()
            .and_then(|s| s.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        format!("{}.backup-{}{}", stem, taken_at.format("%Y%m%d-%H%M%S-%3f"), ext)
    }
}

impl SnapshotHook for FileSnapshotHook {
    fn snapshot(&self, context: &SnapshotContext) -> Result<BackupHandle> {
        let taken_at = Utc::now();

        // First write into a fresh catalog
        if !self.database_file.exists() {
            return Ok(BackupHandle { path: None, taken_at });
        }

        std::fs::create_dir_all(&self.directory)
            .with_context(|| format!("Failed to create backup directory {}", self.directory.display()))?;

        let target = self.directory.join(Self::backup_name(&self.database_file, taken_at));
        std::fs::copy(&self.database_file, &target)
            .with_context(|| format!("Failed to copy {} to {}", self.database_file.display(), target.display()))?;

        tracing::debug!(
            operation = context.operation,
            target = %context.target,
            backup = %target.display(),
            "Catalog snapshot written"
        );

        Ok(BackupHandle {
            path: Some(target),
            taken_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_backup_name() {
        let taken_at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap() + chrono::Duration::milliseconds(42);
        assert_eq!(
            FileSnapshotHook::backup_name(Path::new("data/parts_bom.db"), taken_at),
            "parts_bom.backup-20240309-140507-042.db"
        );
    }

    #[test]
    fn test_file_snapshot_copies_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("parts_bom.db");
        std::fs::write(&db, b"catalog bytes").unwrap();

        let hook = FileSnapshotHook::new(&db, dir.path().join("_db_backups"));
        let handle = hook.snapshot(&SnapshotContext::new("upsert_part", "P-1")).unwrap();

        let path = handle.path.unwrap();
        assert!(path.starts_with(dir.path().join("_db_backups")));
        assert_eq!(std::fs::read(path).unwrap(), b"catalog bytes");
    }

    #[test]
    fn test_missing_database_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let hook = FileSnapshotHook::new(dir.path().join("absent.db"), dir.path().join("_db_backups"));
        let handle = hook.snapshot(&SnapshotContext::new("create_bom", "Site A")).unwrap();
        assert!(handle.path.is_none());
    }
}
