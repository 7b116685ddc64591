//! Axum app: shared state and router (§6 "Inbound HTTP").

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use orchestrator_core::{Context, PersonaConfig};

use crate::chat::{chat_request, chat_status, request_log};
use crate::sessions::{clear_history, clear_summary, clear_tool_state, list_sessions, read_history, read_summary, read_tool_state};

/// Shared dependencies for every handler (§9 "Global state singletons").
pub struct AppState {
    pub ctx: Context,
    pub persona: PersonaConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat/request", post(chat_request))
        .route("/chat/request/:request_id", get(request_log))
        .route("/chat/status/:request_id", get(chat_status))
        .route("/history/:user_id", get(read_history).delete(clear_history))
        .route("/summary/:user_id", get(read_summary).delete(clear_summary))
        .route("/tool-state/:user_id", get(read_tool_state).delete(clear_tool_state))
        .route("/sessions/:user_id", get(list_sessions))
        .with_state(state)
}
