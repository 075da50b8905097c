//! The quarantine engine: a single sequential poll loop over the watched
//! directory.
//!
//! Each cycle checks the lockdown flag, scans every regular file directly
//! inside the watched directory, quarantines files that match a rule,
//! re-evaluates risk and triggers lockdown at the threshold. Per-file
//! failures are logged and skipped; nothing stops the loop short of killing
//! the process.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Layout, ScanConfig, SentinelConfig};
use crate::ledger::{Ledger, LedgerError};
use crate::lockdown::Lockdown;
use crate::risk::RiskEvaluator;
use crate::rules::{decode_content, RuleSet};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("failed to move {from} to {to}: {source}")]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A file that matched a rule and was moved to quarantine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub file: String,
    pub reason: String,
}

/// Result of one pass over the watched directory.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Regular files examined.
    pub scanned: usize,
    pub quarantined: Vec<Detection>,
    /// Files abandoned because of an I/O error.
    pub skipped: usize,
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// Lockdown was active; nothing was scanned.
    Locked,
    Scanned {
        report: ScanReport,
        risk_score: u32,
        lockdown_triggered: bool,
    },
}

pub struct QuarantineEngine {
    watch_dir: PathBuf,
    quarantine_dir: PathBuf,
    rules: RuleSet,
    ledger: Ledger,
    risk: RiskEvaluator,
    lockdown: Lockdown,
    scan: ScanConfig,
    /// Files already recorded whose move into quarantine failed. They are
    /// retried without a second ledger entry.
    unmoved: Mutex<HashSet<(PathBuf, String)>>,
}

impl QuarantineEngine {
    pub fn new(
        layout: &Layout,
        rules: RuleSet,
        ledger: Ledger,
        risk: RiskEvaluator,
        lockdown: Lockdown,
        scan: ScanConfig,
    ) -> Self {
        Self {
            watch_dir: layout.watch_dir.clone(),
            quarantine_dir: layout.quarantine_dir.clone(),
            rules,
            ledger,
            risk,
            lockdown,
            scan,
            unmoved: Mutex::new(HashSet::new()),
        }
    }

    /// Wire an engine with the built-in rules from a loaded configuration.
    pub fn from_config(config: &SentinelConfig) -> Self {
        let layout = config.layout();
        let ledger = Ledger::from_layout(&layout);
        let risk = RiskEvaluator::new(ledger.clone(), config.risk.clone());
        Self::new(
            &layout,
            RuleSet::builtin(),
            ledger,
            risk,
            Lockdown::from_layout(&layout),
            config.scan.clone(),
        )
    }

    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    /// Run cycles forever on the calling thread.
    pub fn run(&self) -> ! {
        info!(watch_dir = %self.watch_dir.display(), "quarantine engine started");
        loop {
            let outcome = self.run_cycle();
            std::thread::sleep(self.pause_after(&outcome));
        }
    }

    /// How long to sleep after a cycle with the given outcome.
    pub fn pause_after(&self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Locked => self.scan.locked_interval(),
            CycleOutcome::Scanned { .. } => self.scan.poll_interval(),
        }
    }

    /// One cycle: lockdown check, scan, risk evaluation, possible lockdown.
    pub fn run_cycle(&self) -> CycleOutcome {
        if self.lockdown.is_locked() {
            debug!("lockdown active, skipping scan");
            return CycleOutcome::Locked;
        }

        let report = self.scan_once();

        let risk_score = self.risk.score();
        let mut lockdown_triggered = false;
        if self.risk.should_lock(risk_score) {
            match self.lockdown.trigger() {
                Ok(()) => lockdown_triggered = true,
                Err(e) => warn!(error = %e, risk_score, "failed to raise lockdown flag"),
            }
        }

        CycleOutcome::Scanned {
            report,
            risk_score,
            lockdown_triggered,
        }
    }

    /// Examine every regular file directly inside the watched directory.
    pub fn scan_once(&self) -> ScanReport {
        let mut report = ScanReport::default();

        let entries = match std::fs::read_dir(&self.watch_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(watch_dir = %self.watch_dir.display(), error = %e, "watched directory unavailable");
                return report;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| !path.is_dir())
            .collect();
        paths.sort();

        for path in paths {
            report.scanned += 1;
            match self.process_file(&path) {
                Ok(Some(detection)) => report.quarantined.push(detection),
                Ok(None) => {}
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping file");
                    report.skipped += 1;
                }
            }
        }

        report
    }

    /// Classify one file and quarantine it on the first matching rule.
    fn process_file(&self, path: &Path) -> Result<Option<Detection>, EngineError> {
        let Some(file_name) = path.file_name() else {
            return Ok(None);
        };

        let bytes = std::fs::read(path).map_err(|source| EngineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let content = decode_content(&bytes);

        let Some(rule) = self.rules.first_match(&content) else {
            return Ok(None);
        };

        let file = file_name.to_string_lossy().into_owned();
        let destination = self.quarantine_dir.join(file_name);
        let key = (path.to_path_buf(), rule.name().to_string());
        let relocate_err = |source| EngineError::Relocate {
            from: path.to_path_buf(),
            to: destination.clone(),
            source,
        };

        let mut unmoved = self.unmoved.lock().unwrap_or_else(|e| e.into_inner());
        if !unmoved.contains(&key) {
            if destination.is_dir() {
                return Err(relocate_err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "a directory occupies the quarantine destination",
                )));
            }
            self.ledger.append(&file, rule.name())?;
        }

        if let Err(source) = relocate(path, &destination) {
            unmoved.insert(key);
            return Err(relocate_err(source));
        }
        unmoved.remove(&key);

        warn!(file = %file, reason = %rule.name(), "file quarantined");
        Ok(Some(Detection {
            file,
            reason: rule.name().to_string(),
        }))
    }
}

#[cfg(windows)]
const CROSS_DEVICE: i32 = 17; // ERROR_NOT_SAME_DEVICE
#[cfg(not(windows))]
const CROSS_DEVICE: i32 = 18; // EXDEV

/// Move `from` to `to`, creating the destination directory if needed.
///
/// A plain rename is tried first. Only when it fails because the two paths
/// are on different filesystems is the file copied and the source removed;
/// if that removal fails the copy is deleted again.
pub fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(CROSS_DEVICE) => {
            std::fs::copy(from, to)?;
            if let Err(remove_err) = std::fs::remove_file(from) {
                let _ = std::fs::remove_file(to);
                return Err(remove_err);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
