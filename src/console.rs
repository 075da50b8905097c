//! Read-side handle for dashboards, reports and the CLI.
//!
//! Bundles the ledger, risk evaluator and lockdown switch behind the calls a
//! reporting process needs. Every read goes to disk, so a console running in
//! another process sees the engine's writes on the next call.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{Layout, SentinelConfig};
use crate::ledger::{IncidentRecord, Ledger};
use crate::lockdown::{Lockdown, LockdownError};
use crate::risk::{RiskEvaluator, RiskLevel};

/// Point-in-time summary of the sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub locked: bool,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub total_incidents: usize,
    pub quarantined_files: usize,
}

#[derive(Debug, Clone)]
pub struct Console {
    layout: Layout,
    ledger: Ledger,
    risk: RiskEvaluator,
    lockdown: Lockdown,
}

impl Console {
    pub fn from_config(config: &SentinelConfig) -> Self {
        let layout = config.layout();
        let ledger = Ledger::from_layout(&layout);
        let risk = RiskEvaluator::new(ledger.clone(), config.risk.clone());
        let lockdown = Lockdown::from_layout(&layout);
        Self {
            layout,
            ledger,
            risk,
            lockdown,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn watch_dir(&self) -> &Path {
        &self.layout.watch_dir
    }

    pub fn load_ledger(&self) -> Vec<IncidentRecord> {
        self.ledger.load()
    }

    pub fn incidents_recent_first(&self) -> Vec<IncidentRecord> {
        self.ledger.recent_first()
    }

    pub fn risk_score(&self) -> u32 {
        self.risk.score()
    }

    pub fn is_locked(&self) -> bool {
        self.lockdown.is_locked()
    }

    pub fn reset_lockdown(&self) -> Result<(), LockdownError> {
        self.lockdown.reset()
    }

    /// Up to `limit` live-feed lines, newest first.
    pub fn feed_tail(&self, limit: usize) -> Vec<String> {
        self.ledger.feed().tail_recent(limit)
    }

    /// Regular files currently held in quarantine.
    pub fn quarantined_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.layout.quarantine_dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        files
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let risk_score = self.risk_score();
        StatusSnapshot {
            locked: self.is_locked(),
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            total_incidents: self.load_ledger().len(),
            quarantined_files: self.quarantined_files().len(),
        }
    }
}
