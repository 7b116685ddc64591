//! History/summary/tool-state listing and clearing endpoints (§6 "Inbound
//! HTTP", last bullet), all keyed by `user_id` with an optional
//! `session_id` query parameter.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ServeError;

#[derive(Deserialize, Default)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

pub async fn read_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(q): Query<SessionQuery>,
) -> Result<impl IntoResponse, ServeError> {
    let entries = state.ctx.store.read_history(&user_id, q.session_id.as_deref()).await?;
    Ok(Json(entries))
}

pub async fn clear_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(q): Query<SessionQuery>,
) -> Result<impl IntoResponse, ServeError> {
    match q.session_id {
        Some(session_id) => state.ctx.store.delete_history(&user_id, Some(&session_id)).await?,
        None => state.ctx.store.delete_all_history(&user_id).await?,
    }
    Ok(Json(json!({ "cleared": true })))
}

pub async fn read_summary(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(q): Query<SessionQuery>,
) -> Result<impl IntoResponse, ServeError> {
    if let Some(session_id) = q.session_id {
        let summary = state.ctx.store.read_summary(&user_id, Some(&session_id)).await?;
        Ok(Json(json!(summary.map(|s| s.0))))
    } else {
        let summaries = state.ctx.store.list_summaries(&user_id).await?;
        let body: Vec<_> = summaries
            .into_iter()
            .map(|(session_id, summary)| json!({ "session_id": session_id, "summary": summary.0 }))
            .collect();
        Ok(Json(json!(body)))
    }
}

pub async fn clear_summary(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(q): Query<SessionQuery>,
) -> Result<impl IntoResponse, ServeError> {
    state.ctx.store.delete_summary(&user_id, q.session_id.as_deref()).await?;
    Ok(Json(json!({ "cleared": true })))
}

pub async fn read_tool_state(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(q): Query<SessionQuery>,
) -> Result<impl IntoResponse, ServeError> {
    if let Some(session_id) = q.session_id {
        let state_value = state.ctx.store.read_tool_state(&user_id, Some(&session_id)).await?;
        Ok(Json(json!(state_value.map(|s| s.0))))
    } else {
        let states = state.ctx.store.list_tool_states(&user_id).await?;
        let body: Vec<_> = states
            .into_iter()
            .map(|(session_id, tool_state)| json!({ "session_id": session_id, "tool_state": tool_state.0 }))
            .collect();
        Ok(Json(json!(body)))
    }
}

pub async fn clear_tool_state(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(q): Query<SessionQuery>,
) -> Result<impl IntoResponse, ServeError> {
    state.ctx.store.delete_tool_state(&user_id, q.session_id.as_deref()).await?;
    Ok(Json(json!({ "cleared": true })))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ServeError> {
    let sessions = state.ctx.store.list_sessions(&user_id).await?;
    let body: Vec<_> = sessions
        .into_iter()
        .map(|s| json!({ "session_id": s.session_id, "entry_count": s.entry_count }))
        .collect();
    Ok(Json(body))
}
