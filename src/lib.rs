//! casb-sentinel -- a simulated cloud access security broker.
//!
//! Watches a "cloud storage" directory for files containing sensitive data
//! patterns, moves offenders into quarantine, records every incident in an
//! append-only ledger, keeps a rolling risk score and locks scanning down
//! when risk peaks.

pub mod api;
pub mod config;
pub mod console;
pub mod engine;
pub mod ledger;
pub mod lockdown;
pub mod risk;
pub mod rules;
pub mod simulate;

use anyhow::{Context, Result};

use crate::config::SentinelConfig;
use crate::console::Console;
use crate::engine::QuarantineEngine;

/// Run the quarantine engine on the calling thread. Never returns on success.
pub fn watch(config: &SentinelConfig) -> Result<()> {
    let layout = config.layout();
    layout.ensure_dirs()?;
    tracing::info!(watch_dir = %layout.watch_dir.display(), "scanner active");
    QuarantineEngine::from_config(config).run()
}

/// Start the engine on a dedicated thread and serve the read API.
pub async fn serve(config: &SentinelConfig, bind: &str) -> Result<()> {
    let layout = config.layout();
    layout.ensure_dirs()?;

    // 1. Engine worker
    let engine = QuarantineEngine::from_config(config);
    std::thread::Builder::new()
        .name("quarantine-engine".into())
        .spawn(move || engine.run())
        .context("failed to spawn quarantine engine thread")?;

    // 2. API server
    let state = api::state::AppState {
        console: Console::from_config(config),
    };
    let app = api::router(state);

    let addr: std::net::SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address: {bind}"))?;
    tracing::info!(%addr, "casb-sentinel API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
