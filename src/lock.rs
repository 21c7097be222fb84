//! File-based locking for single-operator safety.
//!
//! Archive and restore mutate the archive dir, the index and the runtime tree; they
//! hold an exclusive fs2 advisory lock so two invocations on one tree fail fast instead
//! of racing on the "snapshot dir must not exist" check or the index read-modify-write.
//!
//! Lock file path: <archive_dir>/LOCK
//! Lock is released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = "LOCK";

pub struct LockGuard {
    file: std::fs::File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // fs2 unlock errors on drop are ignored deliberately.
        let _ = self.file.unlock();
    }
}

fn lock_file_path(archive_root: &Path) -> PathBuf {
    archive_root.join(LOCK_FILE)
}

/// Try to take the exclusive archive lock. Returns Err if another operation holds it.
pub fn try_acquire_exclusive_lock(archive_root: &Path) -> Result<LockGuard> {
    fs::create_dir_all(archive_root)
        .with_context(|| format!("create {}", archive_root.display()))?;
    let path = lock_file_path(archive_root);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    file.try_lock_exclusive().with_context(|| {
        format!(
            "another archive/restore is running (lock held: {})",
            path.display()
        )
    })?;
    log::debug!("lock: acquired {}", path.display());
    Ok(LockGuard { file, path })
}
