//! Prompt assembler (§4.7): pure functions producing deterministic prompt
//! text for each orchestration step from history, schemas, session summary,
//! persona, and user profile. Never calls out — no I/O, no randomness.

use orchestrator_protocol::Decision;
use orchestrator_store::{HistoryEntry, Role, SessionSummary};
use serde_json::Value;

use crate::persona::PersonaConfig;

/// A connected user's profile, projected for prompt rendering (§4.7
/// "the connected user's profile ... when present").
#[derive(Clone, Debug, Default)]
pub struct ConnectedProfile {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub location: Option<String>,
    pub interests: Vec<String>,
}

impl ConnectedProfile {
    /// Projects a cached person-profile JSON blob (§4.2 `readPerson`) into the
    /// fields the prompt assembler renders.
    pub fn from_value(value: &Value) -> Self {
        Self {
            name: value.get("name").and_then(|v| v.as_str()).map(str::to_string),
            age: value.get("age").and_then(|v| v.as_u64()).map(|v| v as u32),
            gender: value.get("gender").and_then(|v| v.as_str()).map(str::to_string),
            location: value.get("location").and_then(|v| v.as_str()).map(str::to_string),
            interests: value
                .get("tags")
                .or_else(|| value.get("interests"))
                .and_then(|v| v.as_array())
                .map(|items| items.iter().filter_map(|v| v.as_str()).map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

pub fn format_history(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "No prior messages in this session.".to_string();
    }
    history
        .iter()
        .map(|entry| match entry.role {
            Role::User => format!("User: {}", entry.content.as_deref().unwrap_or("")),
            Role::Assistant => format!("Assistant: {}", entry.content.as_deref().unwrap_or("")),
            Role::Tool => format!(
                "Tool ({}) Call: {}",
                entry.tool_name.as_deref().unwrap_or(""),
                entry.tool_args.as_ref().unwrap_or(&Value::Null)
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_profile(profile: &ConnectedProfile) -> Option<String> {
    let mut lines = Vec::new();
    if let Some(name) = &profile.name {
        lines.push(format!("Name: {name}"));
    }
    if let Some(age) = profile.age {
        lines.push(format!("Age: {age}"));
    }
    if let Some(gender) = &profile.gender {
        lines.push(format!("Gender: {gender}"));
    }
    if let Some(location) = &profile.location {
        lines.push(format!("Location: {location}"));
    }
    if !profile.interests.is_empty() {
        lines.push(format!("Interests: {}", profile.interests.join(", ")));
    }
    (!lines.is_empty()).then(|| format!("Connected user profile:\n{}", lines.join("\n")))
}

fn format_persona_block(persona: &PersonaConfig) -> Option<String> {
    let mut lines = Vec::new();
    if let Some(name) = &persona.identity.full_name {
        lines.push(format!("You are {name}."));
    }
    if let Some(role) = &persona.professional.current_role {
        lines.push(format!("You work as {role}."));
    }
    if !persona.lifestyle.hobbies.is_empty() {
        lines.push(format!("Your hobbies include {}.", persona.lifestyle.hobbies.join(", ")));
    }
    if let Some(humor) = &persona.humor {
        lines.push(format!("Your sense of humor: {humor}."));
    }
    (!lines.is_empty()).then(|| lines.join(" "))
}

fn format_summary_block(summary: &Option<SessionSummary>) -> Option<String> {
    let summary = summary.as_ref()?;
    let important_points = summary.0.get("important_points")?.as_array()?;
    if important_points.is_empty() {
        return None;
    }
    let points = important_points.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>().join("; ");
    Some(format!("Remember from earlier in this session: {points}."))
}

fn language_constraint(persona: &PersonaConfig) -> String {
    format!("Respond in one of: {}.", persona.languages_or_default().join(", "))
}

const SHORT_ANSWER_CONSTRAINT: &str = "Keep the reply to one or two short sentences.";

/// Decision/classification prompt (§4.7): last-five history text block only.
pub fn decision_prompt(history: &[HistoryEntry]) -> String {
    format!(
        "Classify the user's latest message into exactly one of: tool, no_tool, \
         ask_clarification, inappropriate_block, gibberish.\n\nConversation so far:\n{}",
        format_history(history)
    )
}

/// Tool-selection prompt (§4.7): cleaned tool catalog (name + description) plus history.
pub fn tool_selection_prompt(tools: &[(String, Option<String>)], history: &[HistoryEntry]) -> String {
    let catalog = tools
        .iter()
        .map(|(name, description)| match description {
            Some(description) => format!("- {name}: {description}"),
            None => format!("- {name}"),
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Select the single best tool for the user's request, or reply with no tool if none apply.\n\n\
         Available tools:\n{catalog}\n\nConversation so far:\n{}",
        format_history(history)
    )
}

/// Tool-argument extraction prompt (§4.7): selected tool, cleaned schema, history,
/// and a per-tool extraction guide.
pub fn tool_args_prompt(tool_name: &str, schema: &Value, history: &[HistoryEntry], extraction_guide: &str) -> String {
    format!(
        "Extract arguments for the tool `{tool_name}` as a single JSON object matching this schema:\n{}\n\n\
         {extraction_guide}\n\nConversation so far:\n{}",
        serde_json::to_string_pretty(schema).unwrap_or_default(),
        format_history(history)
    )
}

/// Summarization prompt (§4.7): one of five templates chosen by `decision`,
/// composed with the optional persona/summary/profile blocks, a short-answer
/// constraint, and a language constraint.
pub struct SummaryPromptInputs<'a> {
    pub decision: Decision,
    pub history: &'a [HistoryEntry],
    pub tool_result: Option<&'a Value>,
    pub persona: &'a PersonaConfig,
    pub summary: &'a Option<SessionSummary>,
    pub connected_profile: &'a Option<ConnectedProfile>,
}

pub fn summarize_prompt(inputs: &SummaryPromptInputs) -> String {
    let mut sections = Vec::new();
    sections.push(decision_template(inputs.decision, inputs.tool_result));
    sections.push(format!("Conversation so far:\n{}", format_history(inputs.history)));
    if let Some(persona_block) = format_persona_block(inputs.persona) {
        sections.push(persona_block);
    }
    if let Some(summary_block) = format_summary_block(inputs.summary) {
        sections.push(summary_block);
    }
    if let Some(profile) = inputs.connected_profile.as_ref().and_then(format_profile) {
        sections.push(profile);
    }
    sections.push(SHORT_ANSWER_CONSTRAINT.to_string());
    sections.push(language_constraint(inputs.persona));
    sections.join("\n\n")
}

fn decision_template(decision: Decision, tool_result: Option<&Value>) -> String {
    match decision {
        Decision::Tool => match tool_result {
            Some(result) => format!(
                "Summarize the following tool results for the user in an upbeat, concise way:\n{}",
                serde_json::to_string_pretty(result).unwrap_or_default()
            ),
            None => "The requested tool produced no usable result. Apologize briefly and ask one \
                     clarifying follow-up question."
                .to_string(),
        },
        Decision::NoTool => "Reply directly to the user's message without invoking any tool.".to_string(),
        Decision::AskClarification => {
            "Ask the user exactly one clarifying question needed to proceed.".to_string()
        }
        Decision::InappropriateBlock => {
            "Decline the request in one or two neutral sentences. Do not engage further or ask a \
             follow-up question."
                .to_string()
        }
        Decision::Gibberish => "The message was not understandable. Reply with a single short \
                                 sentence asking the user to rephrase."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn history() -> Vec<HistoryEntry> {
        vec![
            HistoryEntry::new(Role::User, "show me girls in Bangalore"),
            HistoryEntry::new(Role::Assistant, "Here are a few matches!"),
        ]
    }

    #[test]
    fn empty_history_renders_a_placeholder() {
        assert_eq!(format_history(&[]), "No prior messages in this session.");
    }

    #[test]
    fn tool_call_entries_render_with_name_and_args() {
        let mut entries = history();
        entries.push(HistoryEntry::tool_call("search_matches", json!({ "city": "Bangalore" })));
        let rendered = format_history(&entries);
        assert!(rendered.contains("Tool (search_matches) Call:"));
        assert!(rendered.contains("Bangalore"));
    }

    #[test]
    fn decision_prompt_includes_history_text() {
        let prompt = decision_prompt(&history());
        assert!(prompt.contains("show me girls in Bangalore"));
    }

    #[test]
    fn gibberish_summary_is_a_single_sentence_directive() {
        let inputs = SummaryPromptInputs {
            decision: Decision::Gibberish,
            history: &history(),
            tool_result: None,
            persona: &PersonaConfig::default(),
            summary: &None,
            connected_profile: &None,
        };
        let prompt = summarize_prompt(&inputs);
        assert!(prompt.contains("single short"));
        assert!(prompt.contains(SHORT_ANSWER_CONSTRAINT));
    }

    #[test]
    fn inappropriate_block_never_asks_a_follow_up() {
        let inputs = SummaryPromptInputs {
            decision: Decision::InappropriateBlock,
            history: &history(),
            tool_result: None,
            persona: &PersonaConfig::default(),
            summary: &None,
            connected_profile: &None,
        };
        let prompt = summarize_prompt(&inputs);
        assert!(prompt.contains("Do not engage further"));
    }

    #[test]
    fn tool_summary_embeds_the_result_payload() {
        let result = json!({"docs": [{"id": "1"}]});
        let inputs = SummaryPromptInputs {
            decision: Decision::Tool,
            history: &history(),
            tool_result: Some(&result),
            persona: &PersonaConfig::default(),
            summary: &None,
            connected_profile: &None,
        };
        let prompt = summarize_prompt(&inputs);
        assert!(prompt.contains("\"id\": \"1\""));
    }

    #[test]
    fn connected_profile_block_only_appears_when_present() {
        let without = SummaryPromptInputs {
            decision: Decision::NoTool,
            history: &history(),
            tool_result: None,
            persona: &PersonaConfig::default(),
            summary: &None,
            connected_profile: &None,
        };
        assert!(!summarize_prompt(&without).contains("Connected user profile"));

        let profile = ConnectedProfile {
            name: Some("Asha".to_string()),
            age: Some(28),
            gender: None,
            location: Some("Pune".to_string()),
            interests: vec![],
        };
        let with = SummaryPromptInputs {
            connected_profile: &Some(profile),
            ..without
        };
        assert!(summarize_prompt(&with).contains("Name: Asha"));
    }

    #[test]
    fn language_constraint_defaults_to_english() {
        let prompt = language_constraint(&PersonaConfig::default());
        assert_eq!(prompt, "Respond in one of: English.");
    }
}
