//! All-or-nothing multi-file writes.
//!
//! [`AtomicWriter::write_files`] takes a batch of (path, content) pairs and
//! guarantees that, as observed after the call returns, either every target
//! holds its new content or every target holds its old content (best effort
//! on platforms without atomic rename).
//!
//! Sequence: back up every existing target, write each new content to a
//! sibling `<path>.tmp`, then rename every temp over its final path. A
//! failure before the renames deletes the temps and restores backed-up
//! targets; only after every rename lands are byte-identical backups dropped
//! and old backups pruned.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::backup::BackupManager;
use super::StorageError;

/// Writes one or more files as a single all-or-nothing unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicWriter {
    backups: BackupManager,
}

impl AtomicWriter {
    pub fn new(backups: BackupManager) -> Self {
        Self { backups }
    }

    pub fn write_file(&self, path: &Path, content: &str) -> Result<(), StorageError> {
        self.write_files(&[(path.to_path_buf(), content.to_string())])
    }

    /// Write every (path, content) pair or none of them.
    pub fn write_files(&self, files: &[(PathBuf, String)]) -> Result<(), StorageError> {
        // Parent directories first; nothing to roll back yet.
        for (path, _) in files {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| StorageError::WriteFailed {
                    path: path.clone(),
                    source,
                })?;
            }
        }

        // Pre-write backups for targets that already exist.
        let mut restorable: Vec<(PathBuf, PathBuf)> = Vec::new();
        for (path, _) in files {
            if let Some(backup) = self.backups.create(path) {
                restorable.push((path.clone(), backup));
            }
        }

        // Temp-write phase: any failure unwinds completely.
        let mut temps: Vec<PathBuf> = Vec::new();
        for (path, content) in files {
            let temp = temp_path(path);
            if let Err(source) = fs::write(&temp, content) {
                remove_temps(&temps);
                let _ = fs::remove_file(&temp);
                restore(&restorable);
                return Err(StorageError::WriteFailed {
                    path: path.clone(),
                    source,
                });
            }
            temps.push(temp);
        }

        // Commit phase: rename every temp over its final path.
        for (i, (path, _)) in files.iter().enumerate() {
            if let Err(source) = fs::rename(&temps[i], path) {
                remove_temps(&temps[i..]);
                restore(&restorable);
                return Err(StorageError::WriteFailed {
                    path: path.clone(),
                    source,
                });
            }
        }

        // Success: no-op saves should not accumulate backups.
        for (path, _) in files {
            self.backups.drop_duplicate(path);
            self.backups.prune(path);
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn remove_temps(temps: &[PathBuf]) {
    for temp in temps {
        if let Err(error) = fs::remove_file(temp) {
            if error.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %temp.display(), %error, "cannot remove temp file");
            }
        }
    }
}

/// Best-effort rollback: copy each backup over its original.
fn restore(restorable: &[(PathBuf, PathBuf)]) {
    for (path, backup) in restorable {
        if let Err(error) = fs::copy(backup, path) {
            tracing::warn!(
                path = %path.display(),
                backup = %backup.display(),
                %error,
                "rollback restore failed"
            );
        }
    }
}
