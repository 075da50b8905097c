//! API route definitions.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use super::ApiError;
use crate::console::Console;
use crate::risk::RiskLevel;
use crate::simulate::{self, LeakKind};

const DEFAULT_FEED_LINES: usize = 50;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/incidents", get(list_incidents))
        .route("/risk", get(risk))
        .route("/lockdown", get(lockdown))
        .route("/lockdown/reset", post(reset_lockdown))
        .route("/feed", get(feed))
        .route("/simulate/{kind}", post(simulate_leak))
}

fn meta() -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })
}

/// Run a filesystem-bound read off the async workers.
async fn with_console<T, F>(state: AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Console) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&state.console))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": meta()
    }))
}

async fn status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let snapshot = with_console(state, Console::snapshot).await?;
    Ok(Json(json!({ "data": snapshot, "meta": meta() })))
}

async fn list_incidents(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let incidents = with_console(state, Console::incidents_recent_first).await?;
    let total = incidents.len();
    Ok(Json(json!({
        "data": incidents,
        "meta": { "total": total, "timestamp": chrono::Utc::now().to_rfc3339() }
    })))
}

async fn risk(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let score = with_console(state, Console::risk_score).await?;
    let level = RiskLevel::from_score(score);
    Ok(Json(json!({
        "data": { "score": score, "level": level, "color": level.color() },
        "meta": meta()
    })))
}

async fn lockdown(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let locked = with_console(state, Console::is_locked).await?;
    Ok(Json(json!({ "data": { "locked": locked }, "meta": meta() })))
}

async fn reset_lockdown(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    with_console(state, Console::reset_lockdown).await??;
    Ok(Json(json!({ "data": { "locked": false }, "meta": meta() })))
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    lines: Option<usize>,
}

async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.lines.unwrap_or(DEFAULT_FEED_LINES);
    let lines = with_console(state, move |c| c.feed_tail(limit)).await?;
    let total = lines.len();
    Ok(Json(json!({ "data": lines, "meta": { "total": total } })))
}

async fn simulate_leak(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let kind: LeakKind = kind
        .parse()
        .map_err(|e: anyhow::Error| ApiError::BadRequest(e.to_string()))?;
    let path = with_console(state, move |c| simulate::inject(c.watch_dir(), kind))
        .await?
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Json(json!({ "data": { "injected": file, "kind": kind }, "meta": meta() })))
}
