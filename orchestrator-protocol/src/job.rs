use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Decision;

/// Prefix marking a synthetic background-summary job id on the responses topic (§4.5, §4.6).
pub const SUMMARY_JOB_PREFIX: &str = "SUMMARY-";

/// One of the four main orchestration steps, or a custom one-off call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    CheckToolRequired,
    SelectTool,
    GetToolArgs,
    Summarize,
    Custom,
}

/// A record published on the `jobs` topic, addressed to the worker pool.
///
/// `response_topic` tells the worker where to publish its [`LlmResponse`]; the
/// orchestrator always consumes that same topic (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmJob {
    pub request_id: String,
    pub step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub json_response: bool,
    pub response_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl LlmJob {
    pub fn new(request_id: impl Into<String>, step: Step, response_topic: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            step,
            message: None,
            system_prompt: None,
            json_response: false,
            response_topic: response_topic.into(),
            metadata: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn expect_json(mut self) -> Self {
        self.json_response = true;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// True when this job's id is a synthetic background-summary job (§4.5).
    pub fn is_summary_job(&self) -> bool {
        self.request_id.starts_with(SUMMARY_JOB_PREFIX)
    }
}

/// Token accounting reported by a worker, used for the tokens-per-second metric (§4.8).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A record consumed from the `responses` topic.
///
/// Exactly one of the payload fields is meaningful per step: `decision` answers
/// `check_tool_required`, `selected_tool` answers `select_tool`, `tool_args`
/// answers `get_tool_args`, `final_answer` answers `summarize`, and
/// `custom_response` answers a one-off `custom` job (including the background
/// summary-update job).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub request_id: String,
    pub step: Option<Step>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub selected_tool: Option<String>,
    #[serde(default)]
    pub tool_args: Option<Value>,
    #[serde(default)]
    pub tool_result: Option<Value>,
    #[serde(default)]
    pub final_answer: Option<String>,
    #[serde(default)]
    pub custom_response: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    /// Self-echo of a status event the orchestrator itself published (§4.6 rule 1).
    pub fn is_self_echo(&self) -> bool {
        self.source.as_deref() == Some("orchestrator")
    }

    pub fn decision(&self) -> Decision {
        self.decision
            .as_deref()
            .map(Decision::from_raw)
            .unwrap_or(Decision::NoTool)
    }

    pub fn is_keepalive(&self) -> bool {
        self.custom_response
            .as_ref()
            .and_then(|v| v.get("kind"))
            .and_then(|v| v.as_str())
            == Some("pong")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_job_prefix_detected() {
        let job = LlmJob::new("SUMMARY-abc123", Step::Custom, "responses");
        assert!(job.is_summary_job());
        let job = LlmJob::new("req-1", Step::Summarize, "responses");
        assert!(!job.is_summary_job());
    }

    #[test]
    fn response_roundtrips_through_json() {
        let resp = LlmResponse {
            request_id: "req-1".into(),
            step: Some(Step::Summarize),
            final_answer: Some("hi there".into()),
            ..Default::default()
        };
        let encoded = serde_json::to_string(&resp).unwrap();
        let decoded: LlmResponse = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.request_id, "req-1");
        assert_eq!(decoded.final_answer.as_deref(), Some("hi there"));
    }
}
