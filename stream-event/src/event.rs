//! Record shape published onto `chat_status:{request_id}` (§3 RequestChannel, §6).
//!
//! One record is either a progress status (no `final_answer`/`error`) or the
//! single terminal record that closes the stream. The inbound HTTP adapter
//! decides the SSE event name from shape alone: a record with a non-null
//! `step` is sent as `message`, everything else as `status` (§6).

use orchestrator_protocol::Step;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One frame on a request's status channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub request_id: String,
    /// Monotonically increasing within one channel; assigned by [`ChannelSequencer`].
    pub event_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelRecord {
    /// A progress status frame carrying only a free-text status label (no `step`).
    pub fn status(request_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            event_id: 0,
            step: None,
            status: Some(status.into()),
            final_answer: None,
            tool_result: None,
            audio_url: None,
            error: None,
        }
    }

    /// Emitted at the boundary of an orchestrator step (§4.5).
    pub fn step_boundary(request_id: impl Into<String>, step: Step, status: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            event_id: 0,
            step: Some(step),
            status: Some(status.into()),
            final_answer: None,
            tool_result: None,
            audio_url: None,
            error: None,
        }
    }

    /// The single terminal record for a request (§4.5, §8: exactly one per request).
    pub fn terminal(
        request_id: impl Into<String>,
        final_answer: impl Into<String>,
        tool_result: Option<Value>,
        audio_url: Option<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            event_id: 0,
            step: Some(Step::Summarize),
            status: Some("completed".to_string()),
            final_answer: Some(final_answer.into()),
            tool_result,
            audio_url,
            error,
        }
    }

    /// True when this record closes the SSE stream (§6: non-empty `final_answer` or `error`).
    pub fn is_terminal(&self) -> bool {
        self.final_answer.as_deref().is_some_and(|s| !s.is_empty())
            || self.error.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// SSE event name per §6: `message` when `step` is present, `status` otherwise.
    pub fn sse_event_name(&self) -> &'static str {
        if self.step.is_some() {
            "message"
        } else {
            "status"
        }
    }
}
