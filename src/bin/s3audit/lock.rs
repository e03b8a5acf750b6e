// Advisory run lock held for the whole audit.
//
// The lock is an exclusive `flock`-style lock on a plain file. It is
// released when the guard is dropped, on every exit path out of `run`.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use fs4::FileExt;
use tracing::{debug, warn};

use s3audit_rs::AuditError;
use s3audit_rs::config::Config;

const DEFAULT_LOCK_FILE_NAME: &str = "s3audit.lock";

/// `--lock-file`, or `s3audit.lock` in the system temp directory.
pub fn lock_path(config: &Config) -> PathBuf {
    config
        .lock_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_LOCK_FILE_NAME))
}

pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    /// Take the lock without waiting.
    ///
    /// Fails with [`AuditError::LockHeld`] when another run holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create lock directory {}", parent.display())
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| anyhow!(AuditError::Io(e.to_string())))
            .with_context(|| format!("failed to open lock file {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(lock_file = %path.display(), "run lock acquired.");
                Ok(Self {
                    path: path.to_path_buf(),
                    file,
                })
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                warn!(lock_file = %path.display(), "another audit run is in progress.");
                Err(anyhow!(AuditError::LockHeld(path.display().to_string())))
            }
            Err(e) => Err(anyhow!(AuditError::Io(e.to_string())))
                .with_context(|| format!("failed to lock {}", path.display())),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(lock_file = %self.path.display(), "failed to release run lock: {}", e);
            return;
        }
        debug!(lock_file = %self.path.display(), "run lock released.");
    }
}
