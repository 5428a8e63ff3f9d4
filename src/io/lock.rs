//! Lock file management for single-instance enforcement.
//!
//! Only one monitor may run per user session; two monitors would both toggle
//! the same accessory on every transition. The lock file holds the owner's PID
//! and is removed when the [`LockFile`] guard drops.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::constants::LOCK_FILE_NAME;
use crate::common::utils::{self, private_path};

/// Held lock; released and removed on drop.
pub struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

/// `$XDG_RUNTIME_DIR/keylight.lock`, falling back to `/tmp`.
pub fn lock_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join(LOCK_FILE_NAME)
}

/// Try to take the lock at `path`.
///
/// Returns `Ok(None)` when a live process already holds it.
pub fn acquire_lock(path: &Path) -> Result<Option<LockFile>> {
    if let Some(file) = try_lock(path)? {
        return Ok(Some(file));
    }

    match holder_pid(path) {
        Some(pid) if utils::is_process_running(pid) => {
            log_pipe!();
            log_error!("keylight is already running (PID: {pid})");
            log_indented!("Lock file: {}", private_path(path));
            Ok(None)
        }
        stale => {
            match stale {
                Some(pid) => log_warning!("Removing stale lock file (process {pid} no longer running)"),
                None => log_warning!("Lock file format invalid, removing"),
            }
            let _ = std::fs::remove_file(path);
            try_lock(path)
        }
    }
}

fn try_lock(path: &Path) -> Result<Option<LockFile>> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open lock file {}", private_path(path)))?;

    if file.try_lock_exclusive().is_err() {
        return Ok(None);
    }

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()?;

    Ok(Some(LockFile {
        file,
        path: path.to_path_buf(),
    }))
}

fn holder_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()?
        .lines()
        .next()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_acquire_is_refused_while_held() {
        crate::common::logger::Log::set_enabled(false);
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);

        let first = acquire_lock(&path).unwrap();
        assert!(first.is_some());
        assert_eq!(holder_pid(&path), Some(std::process::id()));

        assert!(acquire_lock(&path).unwrap().is_none());

        drop(first);
        assert!(!path.exists());
        assert!(acquire_lock(&path).unwrap().is_some());
    }

    #[test]
    fn test_leftover_file_from_dead_process_is_reused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        std::fs::write(&path, "999999999\n").unwrap();

        let lock = acquire_lock(&path).unwrap().expect("lock should be acquired");
        assert_eq!(lock.path(), path.as_path());
        assert_eq!(holder_pid(&path), Some(std::process::id()));
    }
}
