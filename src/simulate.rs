//! Simulation tooling: drop synthetic leak files into the watched directory.
//!
//! Writing a file into the watched directory is the only input the engine
//! accepts, so these helpers are all a test harness or dashboard needs.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Canned leak scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeakKind {
    Ssn,
    CreditCard,
}

impl LeakKind {
    fn file_prefix(&self) -> &'static str {
        match self {
            Self::Ssn => "threat_sim",
            Self::CreditCard => "cc_leak",
        }
    }

    pub fn content(&self) -> &'static str {
        match self {
            Self::Ssn => "OFFICER NOTE: Found sensitive data. SSN: 000-00-0000",
            Self::CreditCard => "Transaction Record: User card 4111-1111-1111-1111",
        }
    }
}

impl std::str::FromStr for LeakKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ssn" => Ok(Self::Ssn),
            "credit-card" | "cc" => Ok(Self::CreditCard),
            other => bail!("unknown leak kind '{other}', expected 'ssn' or 'credit-card'"),
        }
    }
}

/// Write a canned leak file named `<prefix>_<HHMMSS>.txt`.
pub fn inject(watch_dir: &Path, kind: LeakKind) -> Result<PathBuf> {
    let name = format!("{}_{}.txt", kind.file_prefix(), Local::now().format("%H%M%S"));
    inject_custom(watch_dir, &name, kind.content().as_bytes())
}

/// Write arbitrary `content` as `name` in the watched directory.
pub fn inject_custom(watch_dir: &Path, name: &str, content: &[u8]) -> Result<PathBuf> {
    let file_name = Path::new(name)
        .file_name()
        .filter(|n| *n == std::ffi::OsStr::new(name))
        .with_context(|| format!("'{name}' is not a plain file name"))?;

    std::fs::create_dir_all(watch_dir)
        .with_context(|| format!("failed to create watched directory: {}", watch_dir.display()))?;
    let path = watch_dir.join(file_name);
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write simulated file: {}", path.display()))?;

    info!(path = %path.display(), "simulated file injected");
    Ok(path)
}
