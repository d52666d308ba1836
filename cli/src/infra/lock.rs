//! Infrastructure implementation of the `DeployLocker` port.
//!
//! An exclusive advisory lock on `<base>/.deploy.lock`. The guard owns the
//! open file; closing it (on drop, or when the process dies) releases the
//! lock.

use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use fs4::FileExt;

use crate::application::ports::DeployLocker;
use crate::domain::{AppLayout, LockError};

/// How long `acquire` waits for a contended lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Holds the deploy lock until dropped.
#[derive(Debug)]
pub struct DeployLockGuard {
    _file: File,
    path: PathBuf,
}

impl Drop for DeployLockGuard {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "deploy lock released");
    }
}

/// File-based `DeployLocker` with a bounded polling wait.
pub struct FileLocker {
    timeout: Duration,
}

impl FileLocker {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for FileLocker {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl DeployLocker for FileLocker {
    type Guard = DeployLockGuard;

    async fn acquire(&self, layout: &AppLayout) -> Result<DeployLockGuard> {
        let path = layout.lock_path();
        std::fs::create_dir_all(layout.base())
            .with_context(|| format!("creating directory {}", layout.base().display()))?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open deploy lock {}", path.display()))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "deploy lock acquired");
                    return Ok(DeployLockGuard { _file: file, path });
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(LockError::DeploymentInProgress {
                            app: layout.name().to_string(),
                            path: path.display().to_string(),
                        }
                        .into());
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("failed to lock {}", path.display()));
                }
            }
        }
    }
}
