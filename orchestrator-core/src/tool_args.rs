//! Tool-argument engine (§4.4): merges per-turn LLM-extracted arguments with
//! persisted state, prunes by schema, and handles pagination/dedup across
//! MCP calls.
//!
//! The full tool-state blob for `(user, session)` is one JSON object whose
//! keys are tool names plus a reserved `_seen_docs` subsection mapping tool
//! name to the list of document ids already returned to that session (§3
//! ToolState). [`prepare`] and [`handle_result_and_paginate`] both read and
//! rewrite that single blob through [`KeyedStore`].

use orchestrator_store::{KeyedStore, StoreError, ToolState};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::mcp::{McpAdapter, McpError, ToolCallOutcome};

#[derive(Debug, Error)]
pub enum ToolArgsError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Mcp(#[from] McpError),
}

const SEEN_DOCS_KEY: &str = "_seen_docs";
/// §4.4 "bounded at four retries total" for the already-seen dedup loop.
const MAX_PAGINATION_RETRIES: u32 = 4;
/// §4.4 "more than four are duplicates" triggers the already-seen branch.
const DUPLICATE_THRESHOLD: usize = 4;

pub struct ToolArgsEngine {
    store: Arc<dyn KeyedStore>,
}

impl ToolArgsEngine {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    /// §4.4 `prepare`: merge/validate/prune `raw_args` against the persisted
    /// baseline for `tool`, returning the cleaned arguments that were also
    /// just persisted as the new baseline.
    pub async fn prepare(
        &self,
        user: &str,
        session: Option<&str>,
        tool: &str,
        raw_args: Value,
        schema: &Value,
    ) -> Result<Value, ToolArgsError> {
        let mut blob = self.load_blob(user, session).await?;
        let baseline = blob.get(tool).cloned().unwrap_or_else(|| Value::Object(Map::new()));

        let mut raw_args = normalize_pagination(raw_args, &baseline);

        let reset = raw_args
            .as_object_mut()
            .and_then(|obj| obj.remove("_reset"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let baseline = if reset { Value::Object(Map::new()) } else { baseline };

        let filter_changed = raw_args.as_object().is_some_and(|obj| {
            obj.keys().any(|k| !matches!(k.as_str(), "page" | "_reset" | "user_id"))
        });

        let mut merged = merge(baseline, raw_args);
        if filter_changed {
            set_field(&mut merged, "page", Value::from(1));
        }
        set_field(&mut merged, "user_id", Value::String(user.to_string()));

        let cleaned = prune_by_schema(&merged, schema);

        if let Value::Object(ref mut map) = blob {
            map.insert(tool.to_string(), cleaned.clone());
        }
        self.store.write_tool_state(user, session, ToolState(blob)).await?;

        Ok(cleaned)
    }

    /// §4.4 `handleResultAndPaginate`: auto-reset on empty docs, dedup via
    /// `_seen_docs`, and bounded re-call when a page is entirely duplicates.
    pub async fn handle_result_and_paginate(
        &self,
        mcp: &dyn McpAdapter,
        user: &str,
        session: Option<&str>,
        tool: &str,
        mut args: Value,
        mut result: ToolCallOutcome,
    ) -> Result<ToolCallOutcome, ToolArgsError> {
        let mut attempts = 0u32;
        loop {
            let docs = result.docs();
            if docs.is_empty() {
                self.clear_tool_section(user, session, tool).await?;
                return Ok(result);
            }

            let mut blob = self.load_blob(user, session).await?;
            let seen = seen_docs_for(&blob, tool);
            let duplicate_count = docs.iter().filter(|d| doc_id(d).is_some_and(|id| seen.contains(&id))).count();
            let all_ids: Vec<String> = docs.iter().filter_map(doc_id).collect();
            insert_seen_docs(&mut blob, tool, &all_ids);
            self.store.write_tool_state(user, session, ToolState(blob)).await?;

            if duplicate_count <= DUPLICATE_THRESHOLD || attempts >= MAX_PAGINATION_RETRIES {
                return Ok(result);
            }

            attempts += 1;
            let next_page = args.get("page").and_then(|v| v.as_i64()).unwrap_or(1) + 1;
            set_field(&mut args, "page", Value::from(next_page));
            result = mcp.call_tool(tool, args.clone()).await?;
        }
    }

    async fn clear_tool_section(&self, user: &str, session: Option<&str>, tool: &str) -> Result<(), ToolArgsError> {
        let mut blob = self.load_blob(user, session).await?;
        if let Value::Object(ref mut map) = blob {
            map.remove(tool);
        }
        self.store.write_tool_state(user, session, ToolState(blob)).await?;
        Ok(())
    }

    async fn load_blob(&self, user: &str, session: Option<&str>) -> Result<Value, ToolArgsError> {
        Ok(self
            .store
            .read_tool_state(user, session)
            .await?
            .map(|s| s.0)
            .unwrap_or_else(|| Value::Object(Map::new())))
    }
}

/// §4.4 step 2: `page > 0` means "next page" (baseline page + 1); `page == 0`
/// means "reset to page 1". Fields other than `page` pass through untouched.
fn normalize_pagination(mut raw_args: Value, baseline: &Value) -> Value {
    let Some(obj) = raw_args.as_object_mut() else {
        return raw_args;
    };
    if let Some(page) = obj.get("page").and_then(|v| v.as_i64()) {
        let baseline_page = baseline.get("page").and_then(|v| v.as_i64()).unwrap_or(1);
        let normalized = if page > 0 { baseline_page + 1 } else { 1 };
        obj.insert("page".to_string(), Value::from(normalized));
    }
    raw_args
}

/// §4.4 step 4: start from `baseline`, then for each key in `overlay`: `null`
/// removes the key, anything else overwrites/inserts.
fn merge(baseline: Value, overlay: Value) -> Value {
    let mut merged = match baseline {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Value::Object(overlay) = overlay {
        for (key, value) in overlay {
            if value.is_null() {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }
    }
    Value::Object(merged)
}

fn set_field(value: &mut Value, key: &str, new_value: Value) {
    if let Value::Object(map) = value {
        map.insert(key.to_string(), new_value);
    }
}

/// §4.4 step 7: keep only schema-declared keys, drop empties, enforce enum
/// membership and type, recursing into nested objects.
pub fn prune_by_schema(merged: &Value, schema: &Value) -> Value {
    let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) else {
        return merged.clone();
    };
    let Some(merged_obj) = merged.as_object() else {
        return merged.clone();
    };

    let mut out = Map::new();
    for (key, prop_schema) in properties {
        let Some(value) = merged_obj.get(key) else {
            continue;
        };
        if let Some(cleaned) = prune_value(value, prop_schema) {
            out.insert(key.clone(), cleaned);
        }
    }
    Value::Object(out)
}

fn prune_value(value: &Value, schema: &Value) -> Option<Value> {
    if is_empty(value) {
        return None;
    }

    if let Some(enum_values) = schema.get("enum").and_then(|v| v.as_array()) {
        return prune_against_enum(value, enum_values);
    }

    match schema.get("type").and_then(|v| v.as_str()) {
        Some("integer") | Some("number") => value.is_number().then(|| value.clone()),
        Some("string") => value.is_string().then(|| value.clone()),
        Some("boolean") => value.is_boolean().then(|| value.clone()),
        Some("object") => {
            let cleaned = prune_by_schema(value, schema);
            (!cleaned.as_object().is_some_and(Map::is_empty)).then_some(cleaned)
        }
        Some("array") => value.as_array().map(|items| Value::Array(items.clone())),
        _ => Some(value.clone()),
    }
}

fn prune_against_enum(value: &Value, enum_values: &[Value]) -> Option<Value> {
    if let Some(items) = value.as_array() {
        let filtered: Vec<Value> = items.iter().filter(|v| enum_values.contains(v)).cloned().collect();
        return (!filtered.is_empty()).then_some(Value::Array(filtered));
    }
    enum_values.contains(value).then(|| value.clone())
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn doc_id(doc: &Value) -> Option<String> {
    doc.get("id").and_then(|v| v.as_str()).map(str::to_string)
}

fn seen_docs_for(blob: &Value, tool: &str) -> std::collections::HashSet<String> {
    blob.get(SEEN_DOCS_KEY)
        .and_then(|v| v.get(tool))
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn insert_seen_docs(blob: &mut Value, tool: &str, new_ids: &[String]) {
    if !blob.is_object() {
        *blob = Value::Object(Map::new());
    }
    let Value::Object(map) = blob else { return };
    let seen_docs = map.entry(SEEN_DOCS_KEY).or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(seen_docs) = seen_docs else { return };
    let mut ids = seen_docs
        .get(tool)
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str()).map(str::to_string).collect::<Vec<_>>())
        .unwrap_or_default();
    for id in new_ids {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    seen_docs.insert(tool.to_string(), Value::Array(ids.into_iter().map(Value::String).collect()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_store::InMemoryStore;
    use serde_json::json;

    fn search_schema() -> Value {
        json!({
            "properties": {
                "gender": {"type": "string", "enum": ["male", "female"]},
                "hair_style": {"type": "string"},
                "location": {"type": "string"},
                "min_age": {"type": "integer"},
                "max_age": {"type": "integer"},
                "page": {"type": "integer"},
                "user_id": {"type": "string"}
            }
        })
    }

    #[tokio::test]
    async fn first_call_starts_from_page_one() {
        let engine = ToolArgsEngine::new(Arc::new(InMemoryStore::new()));
        let cleaned = engine
            .prepare(
                "u1",
                None,
                "search_profiles",
                json!({"gender": "female", "hair_style": "curly", "location": "Bangalore"}),
                &search_schema(),
            )
            .await
            .unwrap();
        assert_eq!(cleaned["page"], 1);
        assert_eq!(cleaned["gender"], "female");
    }

    #[tokio::test]
    async fn next_page_marker_increments_persisted_page() {
        let engine = ToolArgsEngine::new(Arc::new(InMemoryStore::new()));
        engine
            .prepare(
                "u1",
                None,
                "search_profiles",
                json!({"gender": "female", "hair_style": "curly", "location": "Bangalore"}),
                &search_schema(),
            )
            .await
            .unwrap();
        let cleaned = engine
            .prepare("u1", None, "search_profiles", json!({"page": 1}), &search_schema())
            .await
            .unwrap();
        assert_eq!(cleaned["page"], 2);
        assert_eq!(cleaned["gender"], "female");
        assert_eq!(cleaned["location"], "Bangalore");
    }

    #[tokio::test]
    async fn filter_change_resets_page_to_one() {
        let engine = ToolArgsEngine::new(Arc::new(InMemoryStore::new()));
        engine
            .prepare(
                "u1",
                None,
                "search_profiles",
                json!({"gender": "female", "location": "Bangalore"}),
                &search_schema(),
            )
            .await
            .unwrap();
        engine
            .prepare("u1", None, "search_profiles", json!({"page": 1}), &search_schema())
            .await
            .unwrap();
        let cleaned = engine
            .prepare("u1", None, "search_profiles", json!({"location": "Chennai"}), &search_schema())
            .await
            .unwrap();
        assert_eq!(cleaned["page"], 1);
        assert_eq!(cleaned["location"], "Chennai");
    }

    #[tokio::test]
    async fn exact_age_filter_boundary() {
        let engine = ToolArgsEngine::new(Arc::new(InMemoryStore::new()));
        let cleaned = engine
            .prepare(
                "u1",
                None,
                "search_profiles",
                json!({"min_age": 20, "max_age": 20}),
                &search_schema(),
            )
            .await
            .unwrap();
        assert_eq!(cleaned["min_age"], 20);
        assert_eq!(cleaned["max_age"], 20);
    }

    #[tokio::test]
    async fn reset_clears_only_the_current_tools_section() {
        let store = Arc::new(InMemoryStore::new());
        let engine = ToolArgsEngine::new(store.clone());
        engine
            .prepare("u1", None, "search_profiles", json!({"location": "Bangalore"}), &search_schema())
            .await
            .unwrap();
        engine
            .prepare("u1", None, "other_tool", json!({"query": "x"}), &json!({"properties": {"query": {"type": "string"}}}))
            .await
            .unwrap();

        engine
            .prepare("u1", None, "search_profiles", json!({"_reset": true, "location": "Mumbai"}), &search_schema())
            .await
            .unwrap();

        let blob = store.read_tool_state("u1", None).await.unwrap().unwrap();
        assert_eq!(blob.0["search_profiles"]["location"], "Mumbai");
        assert!(blob.0["search_profiles"].get("min_age").is_none());
        assert_eq!(blob.0["other_tool"]["query"], "x");
    }

    #[test]
    fn cleaning_drops_enum_mismatches_and_empties() {
        let merged = json!({"gender": "nonbinary", "hair_style": "", "location": "Pune", "page": 1});
        let cleaned = prune_by_schema(&merged, &search_schema());
        assert!(cleaned.get("gender").is_none());
        assert!(cleaned.get("hair_style").is_none());
        assert_eq!(cleaned["location"], "Pune");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let merged = json!({"gender": "female", "hair_style": "curly", "page": 2, "extra": "dropped"});
        let once = prune_by_schema(&merged, &search_schema());
        let twice = prune_by_schema(&once, &search_schema());
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn empty_docs_result_clears_tool_section() {
        let store = Arc::new(InMemoryStore::new());
        let engine = ToolArgsEngine::new(store.clone());
        engine
            .prepare("u1", None, "search_profiles", json!({"location": "Assam"}), &search_schema())
            .await
            .unwrap();

        let mcp = crate::test_support::FakeMcp::new();
        let result = engine
            .handle_result_and_paginate(
                &mcp,
                "u1",
                None,
                "search_profiles",
                json!({"page": 1}),
                ToolCallOutcome::success(json!({"docs": []})),
            )
            .await
            .unwrap();
        assert!(result.docs().is_empty());

        let blob = store.read_tool_state("u1", None).await.unwrap().unwrap();
        assert!(blob.0.get("search_profiles").is_none());
    }

    #[tokio::test]
    async fn all_duplicate_docs_retries_up_to_four_times_with_increasing_page() {
        let store = Arc::new(InMemoryStore::new());
        let engine = ToolArgsEngine::new(store.clone());
        let dup_docs = json!({"docs": [{"id": "a"}, {"id": "b"}, {"id": "c"}, {"id": "d"}, {"id": "e"}]});

        // Seed `_seen_docs` as though a prior turn already returned these ids.
        let mut seeded = Value::Object(Map::new());
        insert_seen_docs(&mut seeded, "search_profiles", &["a", "b", "c", "d", "e"].map(String::from));
        store.write_tool_state("u1", None, ToolState(seeded)).await.unwrap();

        let mcp = crate::test_support::FakeMcp::new();
        for _ in 0..4 {
            mcp.queue("search_profiles", ToolCallOutcome::success(dup_docs.clone()));
        }

        let first = ToolCallOutcome::success(dup_docs);
        engine
            .handle_result_and_paginate(&mcp, "u1", None, "search_profiles", json!({"page": 1}), first)
            .await
            .unwrap();

        assert_eq!(mcp.calls.lock().unwrap().len(), 4);
        let pages: Vec<i64> = mcp
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, args)| args["page"].as_i64().unwrap())
            .collect();
        assert_eq!(pages, vec![2, 3, 4, 5]);
    }
}
