//! Rolling risk score derived from recent ledger activity.
//!
//! The score is recomputed from the ledger on every call and never cached:
//! incidents detected inside the trailing window each add a fixed number of
//! points, clamped to a ceiling.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::config::RiskConfig;
use crate::ledger::{now_local, IncidentRecord, Ledger};

/// Display band for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Normal,
    Elevated,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 8 => Self::Critical,
            s if s >= 5 => Self::Elevated,
            _ => Self::Normal,
        }
    }

    /// Gauge colour used by dashboards.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Normal => "green",
            Self::Elevated => "orange",
            Self::Critical => "red",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskEvaluator {
    ledger: Ledger,
    policy: RiskConfig,
}

impl RiskEvaluator {
    pub fn new(ledger: Ledger, policy: RiskConfig) -> Self {
        Self { ledger, policy }
    }

    pub fn policy(&self) -> &RiskConfig {
        &self.policy
    }

    /// Score at the current local time.
    pub fn score(&self) -> u32 {
        self.score_at(now_local())
    }

    /// Score as seen at `now`.
    pub fn score_at(&self, now: NaiveDateTime) -> u32 {
        score_records(&self.ledger.load(), now, &self.policy)
    }

    /// Whether `score` has reached the lockdown threshold.
    pub fn should_lock(&self, score: u32) -> bool {
        score >= self.policy.lockdown_threshold
    }
}

/// Count records newer than `now - window` and convert to a clamped score.
pub fn score_records(records: &[IncidentRecord], now: NaiveDateTime, policy: &RiskConfig) -> u32 {
    let cutoff = i64::try_from(policy.window_sec)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(NaiveDateTime::MIN);

    let recent = records.iter().filter(|r| r.timestamp > cutoff).count();
    let recent = u32::try_from(recent).unwrap_or(u32::MAX);

    recent
        .saturating_mul(policy.points_per_incident)
        .min(policy.max_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LiveFeed;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn evaluator(dir: &tempfile::TempDir) -> (Ledger, RiskEvaluator) {
        let ledger = Ledger::new(
            dir.path().join("audit_log.json"),
            LiveFeed::new(dir.path().join("live_feed.txt")),
        );
        let risk = RiskEvaluator::new(ledger.clone(), RiskConfig::default());
        (ledger, risk)
    }

    #[test]
    fn test_empty_ledger_scores_zero() {
        let dir = tempfile::TempDir::new().unwrap();
        let (_, risk) = evaluator(&dir);
        assert_eq!(risk.score(), 0);
        assert_eq!(risk.score_at(noon()), 0);
    }

    #[test]
    fn test_two_points_per_recent_incident() {
        let dir = tempfile::TempDir::new().unwrap();
        let (ledger, risk) = evaluator(&dir);

        for n in 1..=5u32 {
            ledger
                .append_at(&format!("f{n}.txt"), "SSN_DETECTED", noon() - Duration::seconds(5))
                .unwrap();
            assert_eq!(risk.score_at(noon()), 2 * n);
        }
    }

    #[test]
    fn test_score_clamps_at_ten() {
        let dir = tempfile::TempDir::new().unwrap();
        let (ledger, risk) = evaluator(&dir);

        for n in 0..8 {
            ledger.append_at(&format!("f{n}.txt"), "CREDIT_CARD", noon()).unwrap();
        }
        assert_eq!(risk.score_at(noon()), 10);
        assert!(risk.should_lock(risk.score_at(noon())));
    }

    #[test]
    fn test_window_excludes_old_incidents() {
        let dir = tempfile::TempDir::new().unwrap();
        let (ledger, risk) = evaluator(&dir);

        ledger.append_at("stale.txt", "SSN_DETECTED", noon() - Duration::seconds(60)).unwrap();
        ledger.append_at("older.txt", "SSN_DETECTED", noon() - Duration::minutes(10)).unwrap();
        ledger.append_at("fresh.txt", "SSN_DETECTED", noon() - Duration::seconds(59)).unwrap();

        assert_eq!(risk.score_at(noon()), 2);
    }

    #[test]
    fn test_custom_policy() {
        let policy = RiskConfig {
            window_sec: 10,
            points_per_incident: 3,
            max_score: 7,
            lockdown_threshold: 6,
        };
        let records: Vec<IncidentRecord> = (0..2)
            .map(|i| IncidentRecord::quarantined(format!("{i}"), "X", noon()))
            .collect();

        assert_eq!(score_records(&records, noon(), &policy), 6);
        assert_eq!(score_records(&records, noon() + Duration::seconds(10), &policy), 0);
    }

    #[test]
    fn test_levels() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Normal);
        assert_eq!(RiskLevel::from_score(4), RiskLevel::Normal);
        assert_eq!(RiskLevel::from_score(5), RiskLevel::Elevated);
        assert_eq!(RiskLevel::from_score(8), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(10).color(), "red");
    }
}
