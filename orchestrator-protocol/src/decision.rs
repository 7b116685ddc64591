use serde::{Deserialize, Serialize};

/// The classifier's verdict for routing one user turn (§4.5).
///
/// Deserializing an out-of-vocabulary string never fails: [`Decision::from_raw`]
/// folds anything it doesn't recognize into [`Decision::NoTool`], matching the
/// source system's "unrecognized decision behaves as no_tool" rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Tool,
    NoTool,
    AskClarification,
    InappropriateBlock,
    Gibberish,
}

impl Decision {
    /// Parses a raw classifier string, defaulting unknown values to `NoTool`.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tool" => Decision::Tool,
            "no_tool" => Decision::NoTool,
            "ask_clarification" => Decision::AskClarification,
            "inappropriate_block" => Decision::InappropriateBlock,
            "gibberish" => Decision::Gibberish,
            _ => Decision::NoTool,
        }
    }

    /// Whether this decision enters the tool-execution sub-path.
    pub fn requires_tool(self) -> bool {
        matches!(self, Decision::Tool)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Decision::Tool => "tool",
            Decision::NoTool => "no_tool",
            Decision::AskClarification => "ask_clarification",
            Decision::InappropriateBlock => "inappropriate_block",
            Decision::Gibberish => "gibberish",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_decision_becomes_no_tool() {
        assert_eq!(Decision::from_raw("maybe_tool"), Decision::NoTool);
        assert_eq!(Decision::from_raw(""), Decision::NoTool);
    }

    #[test]
    fn recognized_values_roundtrip_through_display() {
        for d in [
            Decision::Tool,
            Decision::NoTool,
            Decision::AskClarification,
            Decision::InappropriateBlock,
            Decision::Gibberish,
        ] {
            assert_eq!(Decision::from_raw(&d.to_string()), d);
        }
    }

    #[test]
    fn case_and_whitespace_insensitive() {
        assert_eq!(Decision::from_raw("  Tool \n"), Decision::Tool);
        assert_eq!(Decision::from_raw("GIBBERISH"), Decision::Gibberish);
    }
}
