//! Append-only incident ledger.
//!
//! The ledger is a JSON array of [`IncidentRecord`]s rewritten in full on every
//! append (load all, push, write all). The rewrite goes through a sibling
//! temp file and a rename so a concurrent reader sees either the old or the
//! new array. Readers treat anything they cannot parse as an empty history.
//!
//! Each append also adds one line to the [`LiveFeed`] transcript.

pub mod feed;

use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Layout;

pub use self::feed::LiveFeed;

/// Wire format of [`IncidentRecord::timestamp`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl LedgerError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// IncidentRecord
// ---------------------------------------------------------------------------

/// Lifecycle state of an incident. Every record this engine writes is
/// `QUARANTINED`; any other value found on disk is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IncidentStatus {
    Quarantined,
    Other(String),
}

impl IncidentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Quarantined => "QUARANTINED",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for IncidentStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "QUARANTINED" => Self::Quarantined,
            _ => Self::Other(raw),
        }
    }
}

impl From<IncidentStatus> for String {
    fn from(status: IncidentStatus) -> Self {
        match status {
            IncidentStatus::Quarantined => "QUARANTINED".to_string(),
            IncidentStatus::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One quarantined file. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Local wall-clock time of detection, second precision.
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    /// File name (not path) as found in the watched directory.
    pub file: String,
    /// Name of the rule that matched.
    pub reason: String,
    pub status: IncidentStatus,
}

impl IncidentRecord {
    pub fn quarantined(file: impl Into<String>, reason: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            timestamp: truncate_to_second(at),
            file: file.into(),
            reason: reason.into(),
            status: IncidentStatus::Quarantined,
        }
    }

    /// The live-feed line for this record: `[HH:MM:SS] ALERT: <reason> in <file>`.
    ///
    /// Control characters in the reason or file name are escaped so each
    /// record stays on exactly one line.
    pub fn feed_line(&self) -> String {
        format!(
            "[{}] ALERT: {} in {}",
            self.timestamp.format("%H:%M:%S"),
            escape_controls(&self.reason),
            escape_controls(&self.file)
        )
    }
}

fn escape_controls(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_control() {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    out
}

mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Current local time truncated to whole seconds.
pub fn now_local() -> NaiveDateTime {
    truncate_to_second(Local::now().naive_local())
}

fn truncate_to_second(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Handle to the persisted incident collection and its live feed.
///
/// Cheap to clone; holds paths only. Single writer, any number of readers.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    feed: LiveFeed,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>, feed: LiveFeed) -> Self {
        Self {
            path: path.into(),
            feed,
        }
    }

    pub fn from_layout(layout: &Layout) -> Self {
        Self::new(&layout.ledger_path, LiveFeed::new(&layout.feed_path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn feed(&self) -> &LiveFeed {
        &self.feed
    }

    /// All persisted records in append order.
    ///
    /// A missing, empty or malformed ledger yields an empty vector.
    pub fn load(&self) -> Vec<IncidentRecord> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ledger unreadable, treating as empty");
                return Vec::new();
            }
        };

        if content.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ledger malformed, treating as empty");
                Vec::new()
            }
        }
    }

    /// Record a quarantine of `file` for `reason` at the current local time.
    pub fn append(&self, file: &str, reason: &str) -> Result<IncidentRecord, LedgerError> {
        self.append_at(file, reason, now_local())
    }

    /// Record a quarantine with an explicit detection time.
    pub fn append_at(
        &self,
        file: &str,
        reason: &str,
        at: NaiveDateTime,
    ) -> Result<IncidentRecord, LedgerError> {
        let record = IncidentRecord::quarantined(file, reason, at);

        let mut records = self.load();
        records.push(record.clone());
        self.write_all(&records)?;

        self.feed.append(&record.feed_line())?;

        debug!(file, reason, total = records.len(), "ledger entry appended");
        Ok(record)
    }

    /// Records detected strictly after `cutoff`, in append order.
    pub fn since(&self, cutoff: NaiveDateTime) -> Vec<IncidentRecord> {
        self.load()
            .into_iter()
            .filter(|r| r.timestamp > cutoff)
            .collect()
    }

    /// All records, newest first.
    pub fn recent_first(&self) -> Vec<IncidentRecord> {
        let mut records = self.load();
        // Stable sort keeps append order among equal timestamps before the reverse.
        records.sort_by_key(|r| r.timestamp);
        records.reverse();
        records
    }

    fn write_all(&self, records: &[IncidentRecord]) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::io(parent, e))?;
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        records.serialize(&mut serializer)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, &buf).map_err(|e| LedgerError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| LedgerError::io(&self.path, e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn ledger_in(dir: &tempfile::TempDir) -> Ledger {
        Ledger::new(
            dir.path().join("data/audit_log.json"),
            LiveFeed::new(dir.path().join("data/live_feed.txt")),
        )
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(ledger_in(&dir).load().is_empty());
    }

    #[test]
    fn test_load_empty_or_corrupt_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        std::fs::create_dir_all(ledger.path().parent().unwrap()).unwrap();

        std::fs::write(ledger.path(), "").unwrap();
        assert!(ledger.load().is_empty());

        std::fs::write(ledger.path(), "[{\"timestamp\": \"2026-03").unwrap();
        assert!(ledger.load().is_empty());

        std::fs::write(ledger.path(), "{\"not\": \"an array\"}").unwrap();
        assert!(ledger.load().is_empty());
    }

    #[test]
    fn test_append_then_load_preserves_order_and_fields() {
        let dir = tempfile::TempDir::new().unwrap();
        let ledger = ledger_in(&dir);

        ledger.append_at("payroll.csv", "SSN_DETECTED", at(9, 0, 1)).unwrap();
        ledger.append_at("cards v2.txt", "CREDIT_CARD", at(9, 0, 2)).unwrap();
        ledger.append_at("naïve.txt", "SSN_DETECTED", at(8, 59, 59)).unwrap();

        let records = ledger.load();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].file, "payroll.csv");
        assert_eq!(records[1].file, "cards v2.txt");
        assert_eq!(records[1].reason, "CREDIT_CARD");
        assert_eq!(records[2].file, "naïve.txt");
        assert_eq!(records[2].timestamp, at(8, 59, 59));
        assert!(records.iter().all(|r| r.status == IncidentStatus::Quarantined));
    }

    #[test]
    fn test_append_recovers_from_corrupt_ledger() {
        let dir = tempfile::TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        std::fs::create_dir_all(ledger.path().parent().unwrap()).unwrap();
        std::fs::write(ledger.path(), "garbage").unwrap();

        ledger.append("a.txt", "SSN_DETECTED").unwrap();
        assert_eq!(ledger.load().len(), 1);
    }

    #[test]
    fn test_persisted_json_shape() {
        let dir = tempfile::TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        ledger.append_at("leak.txt", "SSN_DETECTED", at(13, 5, 9)).unwrap();

        let raw = std::fs::read_to_string(ledger.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = &value[0];
        assert_eq!(entry["timestamp"], "2026-03-14 13:05:09");
        assert_eq!(entry["file"], "leak.txt");
        assert_eq!(entry["reason"], "SSN_DETECTED");
        assert_eq!(entry["status"], "QUARANTINED");

        // Four-space indentation.
        assert!(raw.contains("\n        \"file\": \"leak.txt\""));
        // No temp file left behind.
        assert!(!dir.path().join("data/audit_log.json.tmp").exists());
    }

    #[test]
    fn test_append_writes_feed_line() {
        let dir = tempfile::TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        ledger.append_at("leak.txt", "SSN_DETECTED", at(13, 5, 9)).unwrap();
        ledger.append_at("cc.txt", "CREDIT_CARD", at(13, 5, 10)).unwrap();

        let lines = ledger.feed().lines();
        assert_eq!(
            lines,
            vec![
                "[13:05:09] ALERT: SSN_DETECTED in leak.txt".to_string(),
                "[13:05:10] ALERT: CREDIT_CARD in cc.txt".to_string(),
            ]
        );
    }

    #[test]
    fn test_since_is_strict() {
        let dir = tempfile::TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        let base = at(12, 0, 0);
        ledger.append_at("old.txt", "SSN_DETECTED", base - Duration::seconds(60)).unwrap();
        ledger.append_at("edge.txt", "SSN_DETECTED", base).unwrap();
        ledger.append_at("new.txt", "SSN_DETECTED", base + Duration::seconds(1)).unwrap();

        let recent = ledger.since(base);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].file, "new.txt");
    }

    #[test]
    fn test_recent_first() {
        let dir = tempfile::TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        ledger.append_at("b.txt", "SSN_DETECTED", at(10, 0, 0)).unwrap();
        ledger.append_at("c.txt", "SSN_DETECTED", at(11, 0, 0)).unwrap();
        ledger.append_at("a.txt", "SSN_DETECTED", at(9, 0, 0)).unwrap();

        let files: Vec<String> = ledger.recent_first().into_iter().map(|r| r.file).collect();
        assert_eq!(files, vec!["c.txt", "b.txt", "a.txt"]);
    }

    #[test]
    fn test_unknown_status_survives_append() {
        let dir = tempfile::TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        std::fs::create_dir_all(ledger.path().parent().unwrap()).unwrap();
        std::fs::write(
            ledger.path(),
            r#"[
    {"timestamp": "2026-03-14 10:00:00", "file": "a.txt", "reason": "SSN_DETECTED", "status": "QUARANTINED"},
    {"timestamp": "2026-03-14 10:00:01", "file": "b.txt", "reason": "CREDIT_CARD", "status": "RELEASED"}
]"#,
        )
        .unwrap();

        assert_eq!(ledger.load().len(), 2);
        ledger.append("c.txt", "SSN_DETECTED").unwrap();

        let records = ledger.load();
        let files: Vec<&str> = records.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(files, vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(records[1].status, IncidentStatus::Other("RELEASED".into()));
        assert_eq!(records[1].status.to_string(), "RELEASED");

        let raw = std::fs::read_to_string(ledger.path()).unwrap();
        assert!(raw.contains("\"status\": \"RELEASED\""));
    }

    #[test]
    fn test_feed_line_escapes_control_characters() {
        let dir = tempfile::TempDir::new().unwrap();
        let ledger = ledger_in(&dir);
        let forged = "x\n[00:00:00] ALERT: CREDIT_CARD in forged.txt";
        ledger.append_at(forged, "SSN_DETECTED", at(22, 33, 16)).unwrap();

        let lines = ledger.feed().lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            "[22:33:16] ALERT: SSN_DETECTED in x\\n[00:00:00] ALERT: CREDIT_CARD in forged.txt"
        );
        // The ledger keeps the name exactly as found.
        assert_eq!(ledger.load()[0].file, forged);
    }

    #[test]
    fn test_record_truncates_subsecond() {
        let ts = at(1, 2, 3) + Duration::milliseconds(750);
        let record = IncidentRecord::quarantined("f", "r", ts);
        assert_eq!(record.timestamp, at(1, 2, 3));
    }
}
