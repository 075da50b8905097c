//! TOML configuration for the CASB sentinel.
//!
//! A layered model: compiled-in defaults, overridden by a TOML file found via
//! the `CASB_SENTINEL_CONFIG` environment variable or `./casb-sentinel.toml`.
//! Every section is optional; missing keys fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CASB_SENTINEL_CONFIG";

/// Config file looked up in the working directory when no env var is set.
pub const LOCAL_CONFIG_FILE: &str = "casb-sentinel.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the sentinel process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SentinelConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded sentinel configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path in `CASB_SENTINEL_CONFIG`.
    /// 2. `./casb-sentinel.toml`.
    /// 3. Compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "CASB_SENTINEL_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local_path = Path::new(LOCAL_CONFIG_FILE);
        if local_path.exists() {
            match Self::load(local_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %local_path.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    /// Resolve the on-disk layout described by the `[paths]` section.
    pub fn layout(&self) -> Layout {
        self.paths.layout()
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Where the watched directory, quarantine and persisted state live.
///
/// Relative entries are joined onto `base_dir`; absolute entries are used as-is.
/// The ledger, feed and lockdown flag are placed inside `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub base_dir: PathBuf,
    pub watch_dir: PathBuf,
    pub quarantine_dir: PathBuf,
    pub data_dir: PathBuf,
    pub ledger_file: PathBuf,
    pub feed_file: PathBuf,
    pub lockdown_flag: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            watch_dir: PathBuf::from("cloud_storage"),
            quarantine_dir: PathBuf::from("quarantine"),
            data_dir: PathBuf::from("data"),
            ledger_file: PathBuf::from("audit_log.json"),
            feed_file: PathBuf::from("live_feed.txt"),
            lockdown_flag: PathBuf::from("lockdown.flag"),
        }
    }
}

impl PathsConfig {
    /// Paths rooted at `base_dir`, every other entry left at its default.
    pub fn rooted_at(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn layout(&self) -> Layout {
        let data_dir = self.base_dir.join(&self.data_dir);
        Layout {
            watch_dir: self.base_dir.join(&self.watch_dir),
            quarantine_dir: self.base_dir.join(&self.quarantine_dir),
            ledger_path: data_dir.join(&self.ledger_file),
            feed_path: data_dir.join(&self.feed_file),
            lockdown_path: data_dir.join(&self.lockdown_flag),
            data_dir,
        }
    }
}

/// Fully resolved filesystem layout shared by every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub watch_dir: PathBuf,
    pub quarantine_dir: PathBuf,
    pub data_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub feed_path: PathBuf,
    pub lockdown_path: PathBuf,
}

impl Layout {
    /// Create the data, watched and quarantine directories.
    ///
    /// A plain file sitting where a directory belongs is removed first.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.watch_dir, &self.quarantine_dir] {
            if dir.exists() && !dir.is_dir() {
                warn!(path = %dir.display(), "replacing file that occupies a directory path");
                std::fs::remove_file(dir)
                    .with_context(|| format!("failed to remove stray file: {}", dir.display()))?;
            }
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

/// Poll loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Pause after a completed scan pass (milliseconds).
    pub poll_interval_ms: u64,
    /// Pause between lockdown checks while locked (milliseconds).
    pub locked_interval_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            locked_interval_ms: 2_000,
        }
    }
}

impl ScanConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn locked_interval(&self) -> Duration {
        Duration::from_millis(self.locked_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

/// Risk scoring policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Trailing window, in seconds, over which incidents count.
    pub window_sec: u64,
    /// Points each recent incident adds.
    pub points_per_incident: u32,
    /// Upper clamp on the score.
    pub max_score: u32,
    /// Score at or above which the engine triggers lockdown.
    pub lockdown_threshold: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            window_sec: 60,
            points_per_incident: 2,
            max_score: 10,
            lockdown_threshold: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

/// Read API listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen_address: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:8502".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Tracing output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
