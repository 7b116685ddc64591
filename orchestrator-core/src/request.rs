//! The Request entity (§3) and its session-modality axis.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which side of the conversation is text and which is speech (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionModality {
    TextToText,
    TextToSpeech,
    SpeechToText,
    SpeechToSpeech,
}

impl SessionModality {
    /// True for the two modalities where the final answer needs a synthesized
    /// audio URL attached (§4.5 completion event).
    pub fn produces_audio(&self) -> bool {
        matches!(self, SessionModality::TextToSpeech | SessionModality::SpeechToSpeech)
    }
}

impl Default for SessionModality {
    fn default() -> Self {
        SessionModality::TextToText
    }
}

/// One accepted user turn (§3 Request). Owned exclusively by the orchestrator
/// task that runs its state machine; mutated only by that task.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    pub request_id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub person_id: Option<String>,
    pub personality_id: Option<String>,
    pub modality: SessionModality,
    pub message: String,
    pub image_url: Option<String>,
    pub selected_filters: Option<Value>,
    pub recommendation_ids: Option<Vec<String>>,
    pub fillers: Option<bool>,
}

impl Request {
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            session_id: None,
            person_id: None,
            personality_id: None,
            modality: SessionModality::default(),
            message: message.into(),
            image_url: None,
            selected_filters: None,
            recommendation_ids: None,
            fillers: None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speech_modalities_produce_audio() {
        assert!(SessionModality::TextToSpeech.produces_audio());
        assert!(SessionModality::SpeechToSpeech.produces_audio());
        assert!(!SessionModality::TextToText.produces_audio());
        assert!(!SessionModality::SpeechToText.produces_audio());
    }

    #[test]
    fn new_request_gets_a_fresh_id() {
        let a = Request::new("u1", "hi");
        let b = Request::new("u1", "hi");
        assert_ne!(a.request_id, b.request_id);
    }
}
