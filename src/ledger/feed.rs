//! Plain-text alert transcript, one line per incident.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::LedgerError;

#[derive(Debug, Clone)]
pub struct LiveFeed {
    path: PathBuf,
}

impl LiveFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line. A trailing newline is added.
    pub fn append(&self, line: &str) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::io(parent, e))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LedgerError::io(&self.path, e))?;
        writeln!(file, "{line}").map_err(|e| LedgerError::io(&self.path, e))?;
        Ok(())
    }

    /// Every line in write order. Missing or unreadable feed yields nothing.
    pub fn lines(&self) -> Vec<String> {
        match std::fs::read(&self.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::trim_end)
                .filter(|l| !l.is_empty())
                .map(str::to_owned)
                .collect(),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "live feed unreadable");
                }
                Vec::new()
            }
        }
    }

    /// Up to `limit` lines, most recent first.
    pub fn tail_recent(&self, limit: usize) -> Vec<String> {
        self.lines().into_iter().rev().take(limit).collect()
    }
}
