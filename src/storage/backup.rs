//! Numbered backup copies with retention.
//!
//! A backup of `items.txt` is a sibling file `items.txt.<n>.backup` with
//! `n ≥ 1` assigned one past the highest number in use, so surviving backups
//! always read oldest→newest by number. Everything here is best effort:
//! backups are a safety net, and a failed directory scan or delete is logged
//! and swallowed rather than failing the write that triggered it.

use std::fs;
use std::path::{Path, PathBuf};

/// How many backups of a file survive pruning.
pub const DEFAULT_RETENTION: usize = 3;

/// Creates, lists, and prunes numbered backups under a retention policy.
#[derive(Debug, Clone, Copy)]
pub struct BackupManager {
    retention: usize,
}

impl Default for BackupManager {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
        }
    }
}

impl BackupManager {
    pub fn new(retention: usize) -> Self {
        Self { retention }
    }

    /// The backup file path for a given number.
    pub fn backup_path(path: &Path, number: u32) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(format!(".{number}.backup"));
        PathBuf::from(name)
    }

    /// All backups of `path`, ordered oldest→newest by number.
    pub fn all_backups(path: &Path) -> Vec<(u32, PathBuf)> {
        let Some(parent) = path.parent() else {
            return Vec::new();
        };
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Vec::new();
        };
        let entries = match fs::read_dir(parent) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(path = %parent.display(), %error, "cannot scan for backups");
                return Vec::new();
            }
        };

        let mut backups = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(number) = name
                .strip_prefix(file_name)
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(|rest| rest.strip_suffix(".backup"))
                .and_then(|digits| digits.parse::<u32>().ok())
            else {
                continue;
            };
            if number >= 1 {
                backups.push((number, entry.path()));
            }
        }
        backups.sort_by_key(|(number, _)| *number);
        backups
    }

    /// Copy `path` to its next numbered backup. Returns the backup path, or
    /// `None` when the source does not exist or the copy failed.
    pub fn create(&self, path: &Path) -> Option<PathBuf> {
        if !path.exists() {
            return None;
        }
        let next = Self::all_backups(path)
            .last()
            .map(|(number, _)| number + 1)
            .unwrap_or(1);
        let backup = Self::backup_path(path, next);
        match fs::copy(path, &backup) {
            Ok(_) => Some(backup),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "backup copy failed");
                None
            }
        }
    }

    /// Delete the most recent backup if it is byte-identical to the file's
    /// current content, so saving unchanged content does not accumulate
    /// backups.
    pub fn drop_duplicate(&self, path: &Path) {
        let Some((_, newest)) = Self::all_backups(path).into_iter().last() else {
            return;
        };
        let same = match (fs::read(path), fs::read(&newest)) {
            (Ok(current), Ok(backup)) => current == backup,
            _ => false,
        };
        if same {
            if let Err(error) = fs::remove_file(&newest) {
                tracing::warn!(path = %newest.display(), %error, "cannot drop duplicate backup");
            }
        }
    }

    /// Delete backups beyond the retention count, oldest (lowest numbers)
    /// first.
    pub fn prune(&self, path: &Path) {
        let backups = Self::all_backups(path);
        if backups.len() <= self.retention {
            return;
        }
        let excess = backups.len() - self.retention;
        for (_, backup) in backups.into_iter().take(excess) {
            if let Err(error) = fs::remove_file(&backup) {
                tracing::warn!(path = %backup.display(), %error, "cannot prune backup");
            }
        }
    }
}
