use std::path::PathBuf;

use anyhow::Result;
use casb_sentinel::config::{SentinelConfig, CONFIG_ENV};
use casb_sentinel::console::Console;
use casb_sentinel::engine::{CycleOutcome, QuarantineEngine};
use casb_sentinel::simulate::{self, LeakKind};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "casb-sentinel",
    about = "Simulated cloud access security broker: DLP scanning, quarantine and lockdown",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Override the base directory for storage, quarantine and state
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the watched, quarantine and data directories
    Init,

    /// Run the scan loop in the foreground
    Watch,

    /// Run the scan loop plus the read API
    Serve {
        /// Bind address (defaults to the configured listen address)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run a single scan cycle and report what happened
    ScanOnce,

    /// Show lockdown state, risk score and incident counts
    Status {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List recorded incidents, newest first
    Incidents {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show the live alert feed, newest first
    Feed {
        /// Number of lines to show
        #[arg(long, default_value = "20")]
        lines: usize,
    },

    /// Clear lockdown and resume scanning
    ResetLockdown,

    /// Drop a simulated leak file into the watched directory
    Inject {
        #[arg(value_enum)]
        kind: InjectKind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InjectKind {
    Ssn,
    CreditCard,
}

impl From<InjectKind> for LeakKind {
    fn from(kind: InjectKind) -> Self {
        match kind {
            InjectKind::Ssn => LeakKind::Ssn,
            InjectKind::CreditCard => LeakKind::CreditCard,
        }
    }
}

fn init_tracing(config: &SentinelConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config warnings are emitted before the configured subscriber exists.
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    let mut config = tracing::subscriber::with_default(bootstrap, || match &cli.config {
        Some(path) => SentinelConfig::load(path),
        None => Ok(SentinelConfig::load_or_default()),
    })?;
    if let Some(base_dir) = cli.base_dir {
        config.paths.base_dir = base_dir;
    }

    init_tracing(&config);

    match cli.command {
        Commands::Init => {
            let layout = config.layout();
            layout.ensure_dirs()?;
            println!("Watched directory:    {}", layout.watch_dir.display());
            println!("Quarantine directory: {}", layout.quarantine_dir.display());
            println!("Data directory:       {}", layout.data_dir.display());
        }
        Commands::Watch => {
            tracing::info!("Starting quarantine engine");
            tokio::task::block_in_place(|| casb_sentinel::watch(&config))?;
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.api.listen_address.clone());
            tracing::info!(%bind, "Starting casb-sentinel daemon");
            casb_sentinel::serve(&config, &bind).await?;
        }
        Commands::ScanOnce => {
            config.layout().ensure_dirs()?;
            let engine = QuarantineEngine::from_config(&config);
            match engine.run_cycle() {
                CycleOutcome::Locked => {
                    println!("System is in LOCKDOWN; nothing scanned. Run `reset-lockdown` to resume.");
                }
                CycleOutcome::Scanned {
                    report,
                    risk_score,
                    lockdown_triggered,
                } => {
                    println!(
                        "Scanned {} file(s), quarantined {}, skipped {}.",
                        report.scanned,
                        report.quarantined.len(),
                        report.skipped
                    );
                    for d in &report.quarantined {
                        println!(" - {:<14} {}", d.reason, d.file);
                    }
                    println!("Risk score: {}/{}", risk_score, config.risk.max_score);
                    if lockdown_triggered {
                        println!("Risk threshold reached: LOCKDOWN engaged.");
                    }
                }
            }
        }
        Commands::Status { json } => {
            let snapshot = Console::from_config(&config).snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("\n=== CASB Sentinel Status ===");
                println!(
                    "Lockdown:     {}",
                    if snapshot.locked { "ENGAGED" } else { "clear" }
                );
                println!(
                    "Risk score:   {}/{} ({})",
                    snapshot.risk_score,
                    config.risk.max_score,
                    snapshot.risk_level.color().to_uppercase()
                );
                println!("Incidents:    {}", snapshot.total_incidents);
                println!("Quarantined:  {}", snapshot.quarantined_files);
                println!("============================\n");
            }
        }
        Commands::Incidents { json } => {
            let incidents = Console::from_config(&config).incidents_recent_first();
            if json {
                println!("{}", serde_json::to_string_pretty(&incidents)?);
            } else if incidents.is_empty() {
                println!("No threats detected yet. The system is clean.");
            } else {
                println!("{:<19} | {:<14} | {:<11} | File", "Timestamp", "Reason", "Status");
                println!("{:-<19}-|-{:-<14}-|-{:-<11}-|-{:-<30}", "", "", "", "");
                for r in incidents {
                    println!(
                        "{:<19} | {:<14} | {:<11} | {}",
                        r.timestamp.format(casb_sentinel::ledger::TIMESTAMP_FORMAT),
                        r.reason,
                        r.status,
                        r.file
                    );
                }
            }
        }
        Commands::Feed { lines } => {
            let feed = Console::from_config(&config).feed_tail(lines);
            if feed.is_empty() {
                println!("Waiting for scanner events...");
            }
            for line in feed {
                println!("{}", line);
            }
        }
        Commands::ResetLockdown => {
            Console::from_config(&config).reset_lockdown()?;
            println!("System reset. Scanning resumes on the next cycle.");
        }
        Commands::Inject { kind } => {
            let path = simulate::inject(&config.layout().watch_dir, kind.into())?;
            println!("Injected: {}", path.display());
        }
    }

    Ok(())
}
