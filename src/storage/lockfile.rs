//! Data directory lock
//!
//! sled allows one process per database. The lock file records the owning
//! PID so a second instance fails fast with an actionable message instead
//! of a sled I/O error.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const LOCK_FILE_NAME: &str = ".pumpguard.lock";

/// What an existing lock file tells us.
#[derive(Debug, PartialEq, Eq)]
enum LockState {
    /// Owned by a live pumpguard process
    Held(u32),
    /// Left behind by a process that is gone
    Stale,
    /// Present but not a PID
    Unreadable,
}

/// Exclusive claim on a data directory, released on drop.
#[derive(Debug)]
pub struct ProcessLock {
    lock_path: PathBuf,
    owned: bool,
}

impl ProcessLock {
    /// Claim `data_dir`, creating it if needed.
    ///
    /// Fails when another live instance holds the directory. Stale or
    /// unreadable lock files are replaced.
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let lock_path = data_dir.join(LOCK_FILE_NAME);

        if lock_path.exists() {
            match Self::inspect(&lock_path) {
                LockState::Held(pid) => bail!(
                    "Another pumpguard instance (PID {pid}) is using {}\n\
                     Stop it, or remove {} if it is no longer running.",
                    data_dir.display(),
                    lock_path.display()
                ),
                LockState::Stale => {
                    tracing::info!(path = %lock_path.display(), "Removing stale lock file");
                }
                LockState::Unreadable => {
                    tracing::warn!(path = %lock_path.display(), "Replacing unreadable lock file");
                }
            }
            fs::remove_file(&lock_path).context("Failed to remove old lock file")?;
        }

        let pid = std::process::id();
        fs::write(&lock_path, format!("{pid}\n"))
            .with_context(|| format!("Failed to write lock file: {}", lock_path.display()))?;
        tracing::debug!(pid, path = %lock_path.display(), "Acquired data directory lock");

        Ok(Self {
            lock_path,
            owned: true,
        })
    }

    fn inspect(lock_path: &Path) -> LockState {
        let Ok(contents) = fs::read_to_string(lock_path) else {
            return LockState::Unreadable;
        };
        match contents.trim().parse::<u32>() {
            Ok(pid) if pid != std::process::id() && Self::is_pumpguard_running(pid) => {
                LockState::Held(pid)
            }
            Ok(_) => LockState::Stale,
            Err(_) => LockState::Unreadable,
        }
    }

    #[cfg(unix)]
    fn is_pumpguard_running(pid: u32) -> bool {
        fs::read_to_string(format!("/proc/{pid}/cmdline"))
            .map(|cmdline| cmdline.contains("pumpguard"))
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    fn is_pumpguard_running(_pid: u32) -> bool {
        true
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    pub fn release(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                tracing::warn!(error = %e, "Failed to remove lock file");
            }
            self.owned = false;
        }
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.release();
    }
}
