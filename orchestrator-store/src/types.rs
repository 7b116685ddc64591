//! Value shapes stored under the keyed store (§4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// One turn in a bounded rolling history (§4.2 `appendHistory`/`readHistory`).
/// A `Tool` entry carries `tool_name`/`tool_args` instead of free-text
/// `content`, matching the `(tool_name, tool_args)` payload in the glossary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_name: None,
            tool_args: None,
            timestamp: Utc::now(),
        }
    }

    pub fn tool_call(tool_name: impl Into<String>, tool_args: Value) -> Self {
        Self {
            role: Role::Tool,
            content: None,
            tool_name: Some(tool_name.into()),
            tool_args: Some(tool_args),
            timestamp: Utc::now(),
        }
    }
}

/// Opaque JSON blob summarizing a session (§4.2 `readSummary`/`writeSummary`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary(pub Value);

/// Opaque per-tool argument state (§4.2 `readToolState`/`writeToolState`, fed
/// into the tool-argument engine's merge step, §4.4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolState(pub Value);

/// A session identifier paired with how many history entries it holds,
/// returned by `listSessions` (§4.2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionEntryCount {
    pub session_id: Option<String>,
    pub entry_count: usize,
}
