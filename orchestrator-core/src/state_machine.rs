//! Orchestrator state machine (§4.5), the pending-future response loop and
//! ping heartbeat (§4.6), and the background summary-update dispatch.
//!
//! [`run_request`] is the body of the one long-lived task spawned per
//! accepted request (§5): it walks `RECEIVED -> LLM_CHECKING_TOOLS ->
//! {...tool sub-path...} -> LLM_SUMMARIZING -> COMPLETED`, publishing a
//! status event to `chat_status:{request_id}` at each boundary and returning
//! the single terminal [`RequestOutcome`] that closes the channel.

use std::time::Instant;

use orchestrator_protocol::{LlmJob, LlmResponse, Step, SUMMARY_JOB_PREFIX};
use orchestrator_store::{HistoryEntry, Role, SessionSummary};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::warn;

use crate::context::Context;
use crate::fallback::pick_fallback;
use crate::pending_future::PendingFutureError;
use crate::persona::PersonaConfig;
use crate::prompt::{self, ConnectedProfile, SummaryPromptInputs};
use crate::request::Request;
use crate::tool_args::ToolArgsEngine;

fn chat_status_channel(request_id: &str) -> String {
    format!("chat_status:{request_id}")
}

/// The single terminal outcome of a request (§4.5 completion event).
#[derive(Clone, Debug)]
pub struct RequestOutcome {
    pub final_answer: String,
    pub tool_result: Option<Value>,
    pub audio_url: Option<String>,
    pub error: Option<String>,
}

async fn emit(
    ctx: &Context,
    sequencer: &std::sync::Mutex<stream_event::ChannelSequencer>,
    channel: &str,
    record: stream_event::ChannelRecord,
) {
    let stamped = sequencer.lock().unwrap().stamp(record);
    let Ok(value) = serde_json::to_value(&stamped) else {
        return;
    };
    if let Err(err) = ctx.store.publish(channel, value).await {
        warn!(error = %err, channel, "failed to publish status event");
    }
}

/// Registers a waiter for `request_id`, publishes `job`, and waits up to the
/// configured per-step timeout (§4.5). Times out -> `None`, freeing the id
/// for the next step (§4.6 single-shot registry).
async fn run_llm_step(ctx: &Context, request_id: &str, job: LlmJob) -> Option<LlmResponse> {
    let waiter = match ctx.pending.register(request_id) {
        Ok(waiter) => waiter,
        Err(PendingFutureError::AlreadyRegistered(_)) => {
            ctx.pending.cancel(request_id);
            ctx.pending.register(request_id).ok()?
        }
        Err(_) => return None,
    };

    ctx.metrics.record_llm_job_start();
    if let Err(err) = ctx.bus.publish_job(&job).await {
        warn!(error = %err, request_id, "failed to publish job");
    }

    let step_start = Instant::now();
    let outcome = tokio::time::timeout(ctx.config.step_timeout, waiter.wait()).await;
    let elapsed = step_start.elapsed().as_secs_f64();
    ctx.metrics.record_llm_job_end(elapsed);
    ctx.metrics.record_step_duration(step_label(job.step), elapsed);

    match outcome {
        Ok(Ok(response)) => {
            if let Some(usage) = &response.usage {
                ctx.metrics.record_tokens(usage.total_tokens as u64, elapsed);
            }
            Some(response)
        }
        Ok(Err(_)) => None,
        Err(_) => {
            ctx.pending.cancel(request_id);
            None
        }
    }
}

fn step_label(step: Step) -> &'static str {
    match step {
        Step::CheckToolRequired => "check_tool_required",
        Step::SelectTool => "select_tool",
        Step::GetToolArgs => "get_tool_args",
        Step::Summarize => "summarize",
        Step::Custom => "custom",
    }
}

/// Runs the full per-request pipeline (§4.5) and returns its terminal outcome.
/// `request.request_id` correlates every main-step job; the caller is
/// responsible for publishing [`RequestOutcome`] as the channel's terminal
/// [`stream_event::ChannelRecord`] and writing the durable log.
pub async fn run_request(ctx: &Context, persona: &PersonaConfig, request: Request) -> RequestOutcome {
    ctx.metrics.record_request_start();
    let start = Instant::now();
    let channel = chat_status_channel(&request.request_id);
    let sequencer = std::sync::Mutex::new(stream_event::ChannelSequencer::new(&request.request_id));
    let user = request.user_id.as_str();
    let session = request.session_id.as_deref();

    emit(ctx, &sequencer, &channel, stream_event::ChannelRecord::status(&request.request_id, "received")).await;

    if let Err(err) = ctx
        .store
        .append_history(user, session, HistoryEntry::new(Role::User, request.message.clone()))
        .await
    {
        warn!(error = %err, "failed to append user turn to history");
    }
    let history = ctx.store.read_history(user, session).await.unwrap_or_default();
    let summary = ctx.store.read_summary(user, session).await.unwrap_or(None);
    let connected_profile = match &request.person_id {
        Some(person_id) => ctx
            .store
            .read_person(user, person_id)
            .await
            .unwrap_or(None)
            .map(|v| ConnectedProfile::from_value(&v)),
        None => None,
    };

    let outcome = run_pipeline(ctx, persona, &request, &history, &summary, &connected_profile, &sequencer, &channel).await;

    if let Err(err) = ctx
        .store
        .append_history(user, session, HistoryEntry::new(Role::Assistant, outcome.final_answer.clone()))
        .await
    {
        warn!(error = %err, "failed to append assistant turn to history");
    }

    emit(
        ctx,
        &sequencer,
        &channel,
        stream_event::ChannelRecord::terminal(
            &request.request_id,
            outcome.final_answer.clone(),
            outcome.tool_result.clone(),
            outcome.audio_url.clone(),
            outcome.error.clone(),
        ),
    )
    .await;

    ctx.metrics.record_request_complete(start.elapsed().as_secs_f64(), outcome.error.is_some());
    dispatch_background_summary_update(ctx, &request, &outcome);
    outcome
}

async fn run_pipeline(
    ctx: &Context,
    persona: &PersonaConfig,
    request: &Request,
    history: &[HistoryEntry],
    summary: &Option<SessionSummary>,
    connected_profile: &Option<ConnectedProfile>,
    sequencer: &std::sync::Mutex<stream_event::ChannelSequencer>,
    channel: &str,
) -> RequestOutcome {
    emit(
        ctx,
        sequencer,
        channel,
        stream_event::ChannelRecord::step_boundary(&request.request_id, Step::CheckToolRequired, "llm_checking_tools"),
    )
    .await;
    let decision_job = LlmJob::new(&request.request_id, Step::CheckToolRequired, ctx.config.responses_topic.clone())
        .with_message(request.message.clone())
        .with_system_prompt(prompt::decision_prompt(history))
        .expect_json();
    let Some(decision_response) = run_llm_step(ctx, &request.request_id, decision_job).await else {
        return fallback_outcome("classification timed out");
    };
    let decision = decision_response.decision();

    let (tool_result, decision) = if decision.requires_tool() {
        match run_tool_subpath(ctx, request, history, sequencer, channel).await {
            Ok(result) => (result, decision),
            Err(TimedOut) => return fallback_outcome("tool step timed out"),
        }
    } else {
        (None, decision)
    };

    emit(
        ctx,
        sequencer,
        channel,
        stream_event::ChannelRecord::step_boundary(&request.request_id, Step::Summarize, "llm_summarizing"),
    )
    .await;
    let summary_prompt = prompt::summarize_prompt(&SummaryPromptInputs {
        decision,
        history,
        tool_result: tool_result.as_ref(),
        persona,
        summary,
        connected_profile,
    });
    let summarize_job = LlmJob::new(&request.request_id, Step::Summarize, ctx.config.responses_topic.clone())
        .with_system_prompt(summary_prompt);
    let Some(summarize_response) = run_llm_step(ctx, &request.request_id, summarize_job).await else {
        return RequestOutcome {
            final_answer: pick_fallback().to_string(),
            tool_result,
            audio_url: None,
            error: Some("summarization timed out".to_string()),
        };
    };

    match summarize_response.final_answer.filter(|a| !a.is_empty()) {
        Some(final_answer) => RequestOutcome {
            audio_url: request.modality.produces_audio().then(|| synthesize_audio_url(&request.request_id)),
            final_answer,
            tool_result,
            error: None,
        },
        None => RequestOutcome {
            final_answer: pick_fallback().to_string(),
            tool_result,
            audio_url: None,
            error: Some("summarizer returned no answer".to_string()),
        },
    }
}

/// Marker for "the select-tool or get-tool-args LLM step timed out" (§4.5,
/// §7: non-terminal timeouts raise to the top-level fallback, same as the
/// classification step — they must not be folded into a live `no_tool` path).
struct TimedOut;

/// The `tool` decision branch: select -> extract args -> prepare -> call -> paginate
/// (§4.5). Returns `Ok(tool_result)` on a completed attempt (possibly `None`
/// inside if the tool produced nothing, was not selected, or failed), or
/// `Err(TimedOut)` if the select or get-args step itself never completed.
async fn run_tool_subpath(
    ctx: &Context,
    request: &Request,
    history: &[HistoryEntry],
    sequencer: &std::sync::Mutex<stream_event::ChannelSequencer>,
    channel: &str,
) -> Result<Option<Value>, TimedOut> {
    emit(
        ctx,
        sequencer,
        channel,
        stream_event::ChannelRecord::step_boundary(&request.request_id, Step::SelectTool, "llm_selecting_tool"),
    )
    .await;
    let catalog = ctx.mcp.catalog().await;
    let tool_names: Vec<(String, Option<String>)> =
        catalog.iter().map(|t| (t.name.clone(), t.description.clone())).collect();
    let select_job = LlmJob::new(&request.request_id, Step::SelectTool, ctx.config.responses_topic.clone())
        .with_system_prompt(prompt::tool_selection_prompt(&tool_names, history))
        .expect_json();
    let select_response = run_llm_step(ctx, &request.request_id, select_job).await.ok_or(TimedOut)?;

    let Some(tool_name) = select_response.selected_tool.filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let Some(descriptor) = catalog.into_iter().find(|t| t.name == tool_name) else {
        return Ok(None);
    };

    emit(ctx, sequencer, channel, stream_event::ChannelRecord::step_boundary(&request.request_id, Step::GetToolArgs, "llm_extracting_args")).await;
    let args_job = LlmJob::new(&request.request_id, Step::GetToolArgs, ctx.config.responses_topic.clone())
        .with_system_prompt(prompt::tool_args_prompt(&tool_name, &descriptor.schema, history, extraction_guide(&tool_name)))
        .expect_json();
    let args_response = run_llm_step(ctx, &request.request_id, args_job).await.ok_or(TimedOut)?;

    let raw_args = args_response.tool_args.unwrap_or_else(|| json!({}));
    if raw_args.as_object().is_some_and(|o| o.is_empty()) {
        return Ok(None);
    }

    let engine = ToolArgsEngine::new(ctx.store.clone());
    let user = request.user_id.as_str();
    let session = request.session_id.as_deref();
    let cleaned_args = match engine.prepare(user, session, &tool_name, raw_args, &descriptor.schema).await {
        Ok(args) => args,
        Err(err) => {
            warn!(error = %err, tool = %tool_name, "tool-argument preparation failed");
            return Ok(None);
        }
    };

    emit(ctx, sequencer, channel, stream_event::ChannelRecord::status(&request.request_id, "tool_selected")).await;

    let call_result = ctx.mcp.call_tool(&tool_name, cleaned_args.clone()).await;
    let outcome = match call_result {
        Ok(outcome) if outcome.success => outcome,
        Ok(outcome) => {
            emit(ctx, sequencer, channel, stream_event::ChannelRecord::status(&request.request_id, "tool_error")).await;
            return Ok(outcome.error.map(|e| json!({ "error": e })));
        }
        Err(err) => {
            warn!(error = %err, tool = %tool_name, "mcp call failed");
            emit(ctx, sequencer, channel, stream_event::ChannelRecord::status(&request.request_id, "tool_error")).await;
            return Ok(None);
        }
    };

    let args_for_history = cleaned_args.clone();
    let final_outcome = match engine
        .handle_result_and_paginate(ctx.mcp.as_ref(), user, session, &tool_name, cleaned_args, outcome)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(error = %err, tool = %tool_name, "pagination/dedup handling failed");
            return Ok(None);
        }
    };

    emit(ctx, sequencer, channel, stream_event::ChannelRecord::status(&request.request_id, "tool_executed")).await;
    if let Err(err) = ctx
        .store
        .append_history(user, session, HistoryEntry::tool_call(tool_name.clone(), args_for_history))
        .await
    {
        warn!(error = %err, tool = %tool_name, "failed to append tool-call turn to history");
    }
    Ok(final_outcome.output)
}

fn extraction_guide(tool_name: &str) -> &'static str {
    match tool_name {
        "search_profiles" => {
            "Map gendered nouns to the gender field (e.g. \"girls\" -> female, \"boys\" -> male). \
             Carry explicit ages into min_age/max_age. A bare \"more\"/\"next\" maps to {\"page\": 1} \
             (the next-page marker); do not guess a page number yourself. Do not invent fields the \
             schema doesn't declare."
        }
        _ => "Extract only the fields the schema declares, using the most recent user message first.",
    }
}

fn fallback_outcome(reason: &str) -> RequestOutcome {
    RequestOutcome {
        final_answer: pick_fallback().to_string(),
        tool_result: None,
        audio_url: None,
        error: Some(reason.to_string()),
    }
}

fn synthesize_audio_url(request_id: &str) -> String {
    format!("pending-synthesis://{request_id}")
}

/// Fires the synthetic `SUMMARY-<id>` background job after completion (§4.5).
/// Its response is routed by [`handle_response`], not a pending future.
fn dispatch_background_summary_update(ctx: &Context, request: &Request, outcome: &RequestOutcome) {
    let ctx = ctx.clone();
    let request = request.clone();
    let final_answer = outcome.final_answer.clone();
    tokio::spawn(async move {
        let summary_request_id = format!("{SUMMARY_JOB_PREFIX}{}", uuid::Uuid::new_v4());
        let metadata = json!({
            "user_id": request.user_id,
            "session_id": request.session_id,
        });
        let job = LlmJob::new(summary_request_id, Step::Custom, ctx.config.responses_topic.clone())
            .with_system_prompt(format!(
                "Update the session summary given the latest exchange.\nUser: {}\nAssistant: {}",
                request.message, final_answer
            ))
            .with_metadata(metadata)
            .expect_json();
        if let Err(err) = ctx.bus.publish_job(&job).await {
            warn!(error = %err, "failed to publish background summary-update job");
        }
    });
}

/// The response loop (§4.6): consumes the responses topic continuously,
/// dispatching each record to the pending-future registry or the background
/// summary writer. Runs for the lifetime of the process.
pub async fn run_response_loop(ctx: Context, mut responses: mpsc::Receiver<LlmResponse>) {
    while let Some(response) = responses.recv().await {
        handle_response(&ctx, response).await;
    }
}

async fn handle_response(ctx: &Context, response: LlmResponse) {
    if response.is_self_echo() || response.is_keepalive() {
        return;
    }
    if response.request_id.starts_with(SUMMARY_JOB_PREFIX) {
        apply_summary_update(ctx, response).await;
        return;
    }
    ctx.pending.resolve(response);
}

/// Validates and writes a background summary-update response (§4.6 rule 3).
async fn apply_summary_update(ctx: &Context, response: LlmResponse) {
    let Some(metadata) = response_metadata(&response) else {
        return;
    };
    let metadata = metadata.clone();
    let Some(payload) = response.custom_response else {
        return;
    };
    let Some(important_points) = payload.get("important_points").and_then(|v| v.as_array()) else {
        return;
    };
    let Some(user_details) = payload.get("user_details").and_then(|v| v.as_array()) else {
        return;
    };
    let user_id = metadata.get("user_id").and_then(|v| v.as_str());
    let Some(user_id) = user_id else { return };
    let session_id = metadata.get("session_id").and_then(|v| v.as_str());

    let summary = json!({
        "important_points": important_points,
        "user_details": user_details,
        "last_updated": chrono::Utc::now(),
    });
    if let Err(err) = ctx.store.write_summary(user_id, session_id, SessionSummary(summary)).await {
        warn!(error = %err, "failed to write session summary");
    }
}

/// Metadata isn't on [`LlmResponse`] itself (only jobs carry it); the worker
/// pool is expected to echo it back on `custom_response.metadata` for
/// one-off jobs like the background summary update.
fn response_metadata(response: &LlmResponse) -> Option<&Value> {
    response.custom_response.as_ref()?.get("metadata")
}

/// The ping loop (§4.6): publishes an unaddressed heartbeat job every
/// `ping_interval`. Its response (if any) is a `pong` custom payload,
/// discarded by [`handle_response`]'s keepalive check (§9: "keep as
/// heartbeat only").
pub async fn run_ping_loop(ctx: Context) {
    let mut interval = tokio::time::interval(ctx.config.ping_interval);
    loop {
        interval.tick().await;
        let job = LlmJob::new("ping", Step::Custom, ctx.config.responses_topic.clone())
            .with_metadata(json!({ "kind": "ping" }));
        if let Err(err) = ctx.bus.publish_job(&job).await {
            warn!(error = %err, "failed to publish heartbeat ping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::mcp::ToolCallOutcome;
    use crate::mcp::ToolDescriptor;
    use crate::request::SessionModality;
    use crate::test_support::{FakeBus, FakeMcp};
    use orchestrator_store::InMemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn search_schema() -> Value {
        json!({
            "properties": {
                "gender": {"type": "string", "enum": ["male", "female"]},
                "hair_style": {"type": "string"},
                "location": {"type": "string"},
                "page": {"type": "integer"},
                "user_id": {"type": "string"}
            }
        })
    }

    #[tokio::test]
    async fn happy_path_search_produces_a_summary_and_persists_tool_state() {
        let bus = Arc::new(FakeBus::new());
        let mcp = Arc::new(FakeMcp::new());
        mcp.set_catalog(vec![ToolDescriptor {
            name: "search_profiles".to_string(),
            description: Some("search for matching profiles".to_string()),
            schema: search_schema(),
        }]);
        mcp.queue(
            "search_profiles",
            ToolCallOutcome::success(json!({"docs": [{"id": "1"}, {"id": "2"}, {"id": "3"}]})),
        );

        let mut request = Request::new("u1", "show me girls with curly hair in Bangalore");
        request.request_id = "req-1".to_string();

        let ctx = Context::new(bus.clone(), Arc::new(InMemoryStore::new()), mcp.clone());
        let handle = tokio::spawn({
            let ctx = ctx.clone();
            let request = request.clone();
            async move { run_request(&ctx, &PersonaConfig::default(), request).await }
        });

        bus.deliver(LlmResponse {
            request_id: "req-1".to_string(),
            step: Some(Step::CheckToolRequired),
            decision: Some("tool".to_string()),
            ..Default::default()
        })
        .await;
        bus.deliver(LlmResponse {
            request_id: "req-1".to_string(),
            step: Some(Step::SelectTool),
            selected_tool: Some("search_profiles".to_string()),
            ..Default::default()
        })
        .await;
        bus.deliver(LlmResponse {
            request_id: "req-1".to_string(),
            step: Some(Step::GetToolArgs),
            tool_args: Some(json!({"gender": "female", "hair_style": "curly", "location": "Bangalore"})),
            ..Default::default()
        })
        .await;
        bus.deliver(LlmResponse {
            request_id: "req-1".to_string(),
            step: Some(Step::Summarize),
            final_answer: Some("Found a few great matches for you!".to_string()),
            ..Default::default()
        })
        .await;

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.final_answer, "Found a few great matches for you!");
        assert!(outcome.error.is_none());

        let blob = ctx.store.read_tool_state("u1", None).await.unwrap().unwrap();
        assert_eq!(blob.0["search_profiles"]["page"], 1);
        assert_eq!(blob.0["search_profiles"]["location"], "Bangalore");
        let seen = blob.0["_seen_docs"]["search_profiles"].as_array().unwrap();
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn gibberish_decision_skips_tool_selection_entirely() {
        let bus = Arc::new(FakeBus::new());
        let mcp = Arc::new(FakeMcp::new());
        let mut request = Request::new("u1", "asdkjfh qwoeiru");
        request.request_id = "req-2".to_string();

        let ctx = Context::new(bus.clone(), Arc::new(InMemoryStore::new()), mcp.clone());
        let handle = tokio::spawn({
            let ctx = ctx.clone();
            let request = request.clone();
            async move { run_request(&ctx, &PersonaConfig::default(), request).await }
        });

        bus.deliver(LlmResponse {
            request_id: "req-2".to_string(),
            step: Some(Step::CheckToolRequired),
            decision: Some("gibberish".to_string()),
            ..Default::default()
        })
        .await;
        bus.deliver(LlmResponse {
            request_id: "req-2".to_string(),
            step: Some(Step::Summarize),
            final_answer: Some("Could you rephrase that?".to_string()),
            ..Default::default()
        })
        .await;

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.final_answer, "Could you rephrase that?");
        assert!(mcp.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn classification_timeout_falls_back_and_sets_error() {
        let bus = Arc::new(FakeBus::new());
        let mcp = Arc::new(FakeMcp::new());
        let mut request = Request::new("u1", "hello");
        request.request_id = "req-3".to_string();

        let mut config = crate::context::ContextConfig::default();
        config.step_timeout = std::time::Duration::from_millis(20);
        let ctx = Context::new(bus, Arc::new(InMemoryStore::new()), mcp).with_config(config);

        let outcome = run_request(&ctx, &PersonaConfig::default(), request).await;
        assert!(crate::fallback::FALLBACK_MESSAGES.contains(&outcome.final_answer.as_str()));
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn tool_selection_timeout_falls_back_instead_of_running_summarize() {
        let bus = Arc::new(FakeBus::new());
        let mcp = Arc::new(FakeMcp::new());
        mcp.set_catalog(vec![ToolDescriptor {
            name: "search_profiles".to_string(),
            description: Some("search for matching profiles".to_string()),
            schema: search_schema(),
        }]);
        let mut request = Request::new("u1", "show me girls in Bangalore");
        request.request_id = "req-timeout".to_string();

        let mut config = crate::context::ContextConfig::default();
        config.step_timeout = std::time::Duration::from_millis(20);
        let ctx = Context::new(bus.clone(), Arc::new(InMemoryStore::new()), mcp.clone()).with_config(config);

        let handle = tokio::spawn({
            let ctx = ctx.clone();
            let request = request.clone();
            async move { run_request(&ctx, &PersonaConfig::default(), request).await }
        });

        bus.deliver(LlmResponse {
            request_id: "req-timeout".to_string(),
            step: Some(Step::CheckToolRequired),
            decision: Some("tool".to_string()),
            ..Default::default()
        })
        .await;
        // No SelectTool response is ever delivered: the select step times out.

        let outcome = handle.await.unwrap();
        assert!(crate::fallback::FALLBACK_MESSAGES.contains(&outcome.final_answer.as_str()));
        assert_eq!(outcome.error.as_deref(), Some("tool step timed out"));
        assert!(mcp.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn response_loop_routes_summary_update_to_the_store() {
        let bus = Arc::new(FakeBus::new());
        let mcp = Arc::new(FakeMcp::new());
        let ctx = Context::new(bus, Arc::new(InMemoryStore::new()), mcp);
        let (tx, rx) = mpsc::channel(8);
        let loop_handle = tokio::spawn(run_response_loop(ctx.clone(), rx));

        tx.send(LlmResponse {
            request_id: format!("{SUMMARY_JOB_PREFIX}abc"),
            custom_response: Some(json!({
                "important_points": ["likes curly hair matches"],
                "user_details": ["based in Bangalore"],
                "metadata": {"user_id": "u1", "session_id": "s1"}
            })),
            ..Default::default()
        })
        .await
        .unwrap();
        drop(tx);
        loop_handle.await.unwrap();

        let summary = ctx.store.read_summary("u1", Some("s1")).await.unwrap().unwrap();
        assert_eq!(summary.0["important_points"][0], "likes curly hair matches");
    }

    #[tokio::test]
    async fn self_echo_and_keepalive_responses_are_ignored() {
        let bus = Arc::new(FakeBus::new());
        let mcp = Arc::new(FakeMcp::new());
        let ctx = Context::new(bus, Arc::new(InMemoryStore::new()), mcp);

        handle_response(
            &ctx,
            LlmResponse {
                request_id: "req-x".to_string(),
                source: Some("orchestrator".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(!ctx.pending.is_registered("req-x"));

        handle_response(
            &ctx,
            LlmResponse {
                request_id: "req-y".to_string(),
                custom_response: Some(json!({"kind": "pong"})),
                ..Default::default()
            },
        )
        .await;
        assert!(!ctx.pending.is_registered("req-y"));
    }
}
