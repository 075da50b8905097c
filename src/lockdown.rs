//! Persisted lockdown switch.
//!
//! The state is the existence of a marker file: present means LOCKED, absent
//! means UNLOCKED. The engine only ever locks; unlocking is an explicit
//! administrative reset.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::config::Layout;

const FLAG_CONTENT: &str = "LOCKED";

#[derive(Debug, Error)]
#[error("lockdown flag I/O failed on {path}: {source}")]
pub struct LockdownError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

#[derive(Debug, Clone)]
pub struct Lockdown {
    flag_path: PathBuf,
}

impl Lockdown {
    pub fn new(flag_path: impl Into<PathBuf>) -> Self {
        Self {
            flag_path: flag_path.into(),
        }
    }

    pub fn from_layout(layout: &Layout) -> Self {
        Self::new(&layout.lockdown_path)
    }

    pub fn flag_path(&self) -> &Path {
        &self.flag_path
    }

    pub fn is_locked(&self) -> bool {
        self.flag_path.exists()
    }

    /// Enter lockdown. Idempotent.
    pub fn trigger(&self) -> Result<(), LockdownError> {
        if let Some(parent) = self.flag_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LockdownError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let was_locked = self.is_locked();
        std::fs::write(&self.flag_path, FLAG_CONTENT).map_err(|source| LockdownError {
            path: self.flag_path.clone(),
            source,
        })?;
        if !was_locked {
            error!(flag = %self.flag_path.display(), "lockdown triggered, scanning suspended");
        }
        Ok(())
    }

    /// Leave lockdown. Idempotent.
    pub fn reset(&self) -> Result<(), LockdownError> {
        match std::fs::remove_file(&self.flag_path) {
            Ok(()) => {
                info!(flag = %self.flag_path.display(), "lockdown reset by administrator");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LockdownError {
                path: self.flag_path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initially_unlocked() {
        let dir = tempfile::TempDir::new().unwrap();
        let lockdown = Lockdown::new(dir.path().join("lockdown.flag"));
        assert!(!lockdown.is_locked());
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let lockdown = Lockdown::new(dir.path().join("data/lockdown.flag"));

        lockdown.trigger().unwrap();
        assert!(lockdown.is_locked());
        lockdown.trigger().unwrap();
        assert!(lockdown.is_locked());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let lockdown = Lockdown::new(dir.path().join("lockdown.flag"));

        lockdown.reset().unwrap();
        assert!(!lockdown.is_locked());

        lockdown.trigger().unwrap();
        lockdown.reset().unwrap();
        assert!(!lockdown.is_locked());
        lockdown.reset().unwrap();
        assert!(!lockdown.is_locked());
    }

    #[test]
    fn test_flag_content_is_irrelevant() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lockdown.flag");
        std::fs::write(&path, "").unwrap();
        assert!(Lockdown::new(&path).is_locked());
    }
}
