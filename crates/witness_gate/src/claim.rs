//! Claims about tool results found in generated text.

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Normalised keys naming an execution ID
const EXECUTION_ID_KEYS: &[&str] = &["executionid", "execid"];

/// Normalised keys naming a tool, highest priority first
const TOOL_NAME_KEYS: &[&str] = &["toolname", "tool", "functionname", "function", "toolcall"];

/// Leading identifier of a call expression such as `ping(host="x")`
static CALL_EXPR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_.\-]*)\s*\(").expect("valid regex"));

/// An assertion that a tool produced a specific result
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    /// Cited execution ID, if any
    pub execution_id: Option<String>,
    /// Cited tool name, if any
    pub tool_name: Option<String>,
    /// Fields of the block the claim came from
    pub fields: Map<String, Value>,
}

impl Claim {
    /// Build a claim from a parsed object.
    ///
    /// Returns `None` unless the object has a tool-name or execution-id
    /// field.
    #[must_use]
    pub fn from_fields(fields: &Map<String, Value>) -> Option<Self> {
        let id_field = find_field(fields, EXECUTION_ID_KEYS);
        let tool_field = find_field(fields, TOOL_NAME_KEYS);
        if id_field.is_none() && tool_field.is_none() {
            return None;
        }
        Some(Self {
            execution_id: id_field.and_then(resolve_execution_id),
            tool_name: tool_field.and_then(resolve_tool_name),
            fields: fields.clone(),
        })
    }
}

/// Everything the extractor found in one text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Claims from structured blocks
    pub claims: Vec<Claim>,
    /// Execution IDs mentioned outside structured claims, in order of appearance
    pub referenced_ids: IndexSet<String>,
}

impl Extraction {
    /// Whether the text makes no verifiable tool assertions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty() && self.referenced_ids.is_empty()
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// First field whose normalised key appears in `keys`, honouring key priority
fn find_field<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|wanted| {
        fields
            .iter()
            .find(|(key, _)| normalize_key(key) == *wanted)
            .map(|(_, value)| value)
    })
}

fn resolve_execution_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Resolve a tool name from a field value.
///
/// Accepts plain names, `TOOL: name` lines, call expressions, and objects
/// carrying a `name` field.
#[must_use]
pub fn resolve_tool_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => tool_name_from_str(s),
        Value::Object(map) => map.get("name").and_then(Value::as_str).and_then(tool_name_from_str),
        _ => None,
    }
}

fn tool_name_from_str(raw: &str) -> Option<String> {
    let mut name = raw.trim();
    if let Some(rest) = name
        .get(..5)
        .filter(|prefix| prefix.eq_ignore_ascii_case("tool:"))
        .map(|_| &name[5..])
    {
        name = rest.trim();
    }
    if let Some(caps) = CALL_EXPR.captures(name) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    Some(name.to_string()).filter(|n| !n.is_empty())
}
