//! Best-effort JSON recovery for raw LLM output (§9 "Ad-hoc JSON extraction").
//!
//! Models wrap JSON in code fences, leave trailing commas, or add comments.
//! [`parse_tolerant`] strips those imperfections before falling back to a
//! balanced-brace extraction so a single malformed turn doesn't drop a request.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TolerantJsonError {
    #[error("no JSON object found in model output")]
    NotFound,
    #[error("json: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Parses `raw` as JSON, tolerating common model-output imperfections.
///
/// Order of attempts:
/// 1. Strip ``` fences (and an optional `json` language tag).
/// 2. Strip `//` and `/* */` comments.
/// 3. Remove trailing commas before `]` or `}`.
/// 4. Parse as-is.
/// 5. On failure, extract the first balanced `{...}` span and retry.
pub fn parse_tolerant(raw: &str) -> Result<Value, TolerantJsonError> {
    let stripped = strip_fences(raw);
    let no_comments = strip_comments(&stripped);
    let no_trailing_commas = strip_trailing_commas(&no_comments);

    if let Ok(value) = serde_json::from_str(no_trailing_commas.trim()) {
        return Ok(value);
    }

    let balanced = extract_balanced_object(&no_trailing_commas).ok_or(TolerantJsonError::NotFound)?;
    let balanced = strip_trailing_commas(&balanced);
    serde_json::from_str(balanced.trim()).map_err(TolerantJsonError::from)
}

fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    match rest.rfind("```") {
        Some(end) => rest[..end].to_string(),
        None => rest.to_string(),
    }
}

fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    let mut in_string = false;
    let mut escape = false;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if in_string {
            out.push(c);
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            '/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            '/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 2;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == ']' || chars[j] == '}') {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

fn extract_balanced_object(input: &str) -> Option<String> {
    let start = input.find('{')?;
    let bytes = input.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        let c = b as char;
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(input[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
