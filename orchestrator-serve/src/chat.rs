//! `/chat/request` and `/chat/status/{request_id}` (§6 "Inbound HTTP").

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use orchestrator_core::{Request, SessionModality};
use stream_event::ChannelRecord;

use crate::app::AppState;
use crate::error::ServeError;

#[derive(Deserialize)]
pub struct ChatRequestBody {
    /// Not named in the wire shape the distilled spec gives for this
    /// endpoint, but session memory is keyed by `(user_id, session_id)`
    /// throughout the core, so the adapter requires it explicitly rather
    /// than inventing an identity source.
    pub user_id: String,
    pub message: String,
    pub session_id: Option<String>,
    pub person_id: Option<String>,
    pub personality_id: Option<String>,
    #[serde(default)]
    pub session_type: Option<SessionModality>,
    pub selected_filters: Option<Value>,
    pub image_url: Option<String>,
    pub recommendation_ids: Option<Vec<String>>,
    pub fillers: Option<bool>,
}

/// `POST /chat/request`: accepts a turn, spawns its orchestration task, and
/// returns immediately with the id the client polls/streams against (§6).
pub async fn chat_request(State(state): State<Arc<AppState>>, Json(body): Json<ChatRequestBody>) -> impl IntoResponse {
    let mut request = Request::new(body.user_id, body.message);
    request.session_id = body.session_id;
    request.person_id = body.person_id;
    request.personality_id = body.personality_id;
    request.modality = body.session_type.unwrap_or_default();
    request.selected_filters = body.selected_filters;
    request.image_url = body.image_url;
    request.recommendation_ids = body.recommendation_ids;
    request.fillers = body.fillers;

    let request_id = request.request_id.clone();
    let ctx = state.ctx.clone();
    let persona = state.persona.clone();
    tokio::spawn(async move {
        orchestrator_core::run_request(&ctx, &persona, request).await;
    });

    Json(json!({ "request_id": request_id, "status": "accepted" }))
}

/// `GET /chat/status/{request_id}`: relays the request's status channel as
/// SSE, one frame per [`ChannelRecord`], closing after the terminal record
/// (§6, §3 RequestChannel).
pub async fn chat_status(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>, ServeError> {
    let channel = format!("chat_status:{request_id}");
    let records = state.ctx.store.subscribe(&channel).await?;

    let events = futures::stream::unfold(Some(records), |state| async move {
        let mut records = state?;
        let raw = records.next().await?;
        let record: Option<ChannelRecord> = serde_json::from_value(raw.clone()).ok();
        let event = match &record {
            Some(r) => Event::default().event(r.sse_event_name()).json_data(raw).ok()?,
            None => Event::default().event("status").json_data(raw).ok()?,
        };
        let is_terminal = record.map(|r| r.is_terminal()).unwrap_or(false);
        Some((Ok(event), if is_terminal { None } else { Some(records) }))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// `GET /chat/request/{request_id}`: the durable completion log. The backing
/// document store is an out-of-scope external collaborator (§1); this adapter
/// always reports the pending shape until that store is wired in.
pub async fn request_log(Path(_request_id): Path<String>) -> impl IntoResponse {
    Json(json!({ "status": "pending", "complete": false }))
}
