//! MCP adapter (§4.3): one long-lived subprocess worker hosting tool
//! implementations, reached over rmcp's child-process transport.
//!
//! Schema cleaning and output normalization are pure functions
//! ([`clean_schema`], [`normalize_tool_output`]) so they're testable without
//! a running subprocess; [`RmcpAdapter`] wires them to a real `rmcp`
//! `RunningService`, following the spawn/backoff/retry shape of a typed MCP
//! client wrapper over generic tool calls.

use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::{RunningService, ServiceExt};
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::RoleClient;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("spawn: {0}")]
    Spawn(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("tool '{0}' failed: {1}")]
    Tool(String, String),
    #[error("tool call timed out")]
    Timeout,
}

/// The normalized result of a `callTool` invocation (§4.3). `success=false`
/// is not a transport error — it's recorded and fed into summarization with
/// an empty tool-result context (§4.5 "MCP call raises").
#[derive(Clone, Debug)]
pub struct ToolCallOutcome {
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl ToolCallOutcome {
    pub fn success(output: Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// `result.docs`, or an empty array when the payload has none — used by
    /// the tool-argument engine's auto-reset/dedup step (§4.4).
    pub fn docs(&self) -> Vec<Value> {
        self.output
            .as_ref()
            .and_then(|v| v.get("docs"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait McpAdapter: Send + Sync {
    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolCallOutcome, McpError>;

    /// The cached, schema-cleaned tool catalog (§4.3), used by the prompt
    /// assembler's tool-selection step.
    async fn catalog(&self) -> Vec<ToolDescriptor>;
}

/// A tool's name, description, and cleaned input schema, as cached after the
/// `initialize` handshake (§4.3).
#[derive(Clone, Debug)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub schema: Value,
}

/// rmcp-backed adapter wrapping a single long-lived subprocess (§4.3, §5:
/// "one MCP subprocess").
pub struct RmcpAdapter {
    service: RwLock<RunningService<RoleClient, ()>>,
    catalog: RwLock<Vec<ToolDescriptor>>,
    prompts: RwLock<Value>,
    resources: RwLock<Value>,
}

impl RmcpAdapter {
    pub async fn spawn(command: &str, args: &[String]) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args);
        let child = TokioChildProcess::new(cmd).map_err(|e| McpError::Spawn(e.to_string()))?;
        let service = ()
            .serve(child)
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        let adapter = Self {
            service: RwLock::new(service),
            catalog: RwLock::new(Vec::new()),
            prompts: RwLock::new(Value::Null),
            resources: RwLock::new(Value::Null),
        };
        adapter.refresh_catalog().await?;
        Ok(adapter)
    }

    /// Re-runs the three handshake calls (`list_tools`, `list_prompts`,
    /// `list_resources`, §4.3) and replaces every cached catalog.
    pub async fn refresh_catalog(&self) -> Result<(), McpError> {
        let service = self.service.read().await;
        let tools_result = service
            .list_tools(Default::default())
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;
        let prompts_result = service
            .list_prompts(Default::default())
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;
        let resources_result = service
            .list_resources(Default::default())
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        let raw = serde_json::to_value(&tools_result).map_err(|e| McpError::Transport(e.to_string()))?;
        let tools = parse_tool_catalog(&raw);
        let prompts = serde_json::to_value(&prompts_result).map_err(|e| McpError::Transport(e.to_string()))?;
        let resources = serde_json::to_value(&resources_result).map_err(|e| McpError::Transport(e.to_string()))?;
        drop(service);

        *self.catalog.write().await = tools;
        *self.prompts.write().await = prompts;
        *self.resources.write().await = resources;
        Ok(())
    }

    /// The cached `list_prompts` payload, as returned at the last handshake.
    pub async fn prompts(&self) -> Value {
        self.prompts.read().await.clone()
    }

    /// The cached `list_resources` payload, as returned at the last handshake.
    pub async fn resources(&self) -> Value {
        self.resources.read().await.clone()
    }
}

#[async_trait]
impl McpAdapter for RmcpAdapter {
    async fn catalog(&self) -> Vec<ToolDescriptor> {
        self.catalog.read().await.clone()
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<ToolCallOutcome, McpError> {
        let service = self.service.read().await;
        let result = service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: args.as_object().cloned(),
            })
            .await;
        match result {
            Ok(raw) => {
                let value = serde_json::to_value(&raw).unwrap_or(Value::Null);
                Ok(normalize_tool_output(&value))
            }
            Err(err) => Ok(ToolCallOutcome::failure(err.to_string())),
        }
    }
}

fn parse_tool_catalog(raw: &Value) -> Vec<ToolDescriptor> {
    let Some(tools) = raw.get("tools").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    tools
        .iter()
        .filter_map(|t| {
            let name = t.get("name").and_then(|v| v.as_str())?.to_string();
            let description = t.get("description").and_then(|v| v.as_str()).map(str::to_string);
            let raw_schema = t.get("inputSchema").cloned().unwrap_or(Value::Object(Map::new()));
            Some(ToolDescriptor {
                name,
                description,
                schema: clean_schema(&raw_schema),
            })
        })
        .collect()
}

/// Cleans a JSON Schema fragment from a tool's `inputSchema` (§4.3):
/// - resolves `$ref` pointers into the schema's own `$defs`/`definitions`
/// - collapses `anyOf: [T, {"type": "null"}]` to `T`
/// - drops `title` and `default`
/// - preserves `enum`, `type`, and nested `properties`
pub fn clean_schema(schema: &Value) -> Value {
    clean_schema_with_defs(schema, schema)
}

fn clean_schema_with_defs(node: &Value, root: &Value) -> Value {
    match node {
        Value::Object(obj) => {
            if let Some(ref_path) = obj.get("$ref").and_then(|v| v.as_str()) {
                if let Some(resolved) = resolve_ref(root, ref_path) {
                    return clean_schema_with_defs(&resolved, root);
                }
            }
            if let Some(any_of) = obj.get("anyOf").and_then(|v| v.as_array()) {
                if let Some(collapsed) = collapse_nullable_any_of(any_of, root) {
                    return collapsed;
                }
            }

            let mut out = Map::new();
            for (key, value) in obj {
                if key == "title" || key == "default" || key == "$defs" || key == "definitions" {
                    continue;
                }
                let cleaned = if key == "properties" {
                    clean_properties(value, root)
                } else {
                    clean_schema_with_defs(value, root)
                };
                out.insert(key.clone(), cleaned);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| clean_schema_with_defs(v, root)).collect()),
        other => other.clone(),
    }
}

fn clean_properties(properties: &Value, root: &Value) -> Value {
    let Value::Object(props) = properties else {
        return properties.clone();
    };
    let mut out = Map::new();
    for (name, prop_schema) in props {
        out.insert(name.clone(), clean_schema_with_defs(prop_schema, root));
    }
    Value::Object(out)
}

fn collapse_nullable_any_of(variants: &[Value], root: &Value) -> Option<Value> {
    let is_null_variant = |v: &Value| v.get("type").and_then(|t| t.as_str()) == Some("null");
    let non_null: Vec<&Value> = variants.iter().filter(|v| !is_null_variant(v)).collect();
    if non_null.len() == 1 && non_null.len() + 1 == variants.len() {
        Some(clean_schema_with_defs(non_null[0], root))
    } else {
        None
    }
}

fn resolve_ref(root: &Value, pointer: &str) -> Option<Value> {
    let path = pointer.strip_prefix("#/")?;
    let mut current = root;
    for segment in path.split('/') {
        current = current.get(segment)?;
    }
    Some(current.clone())
}

/// Normalizes a `callTool` result into `{success, output|error}` (§4.3).
/// Output arrives either as a `structuredContent` object, or as a
/// `content[]` list where one item is `{"type": "text", "text": "<json>"}`.
pub fn normalize_tool_output(raw: &Value) -> ToolCallOutcome {
    if raw.get("isError").and_then(|v| v.as_bool()) == Some(true) {
        let message = text_content(raw).unwrap_or_else(|| "tool call failed".to_string());
        return ToolCallOutcome::failure(message);
    }
    if let Some(structured) = raw.get("structuredContent") {
        return ToolCallOutcome::success(structured.clone());
    }
    if let Some(text) = text_content(raw) {
        if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
            return ToolCallOutcome::success(parsed);
        }
        return ToolCallOutcome::success(Value::String(text));
    }
    ToolCallOutcome::success(Value::Null)
}

fn text_content(raw: &Value) -> Option<String> {
    raw.get("content")?
        .as_array()?
        .iter()
        .find(|item| item.get("type").and_then(|t| t.as_str()) == Some("text"))
        .and_then(|item| item.get("text"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
