//! Query Plan Parser
//!
//! Models asked for "only JSON" still wrap it in prose, code fences, or encode
//! it a second time as a JSON string. [`QueryPlanParser::parse`] tries a fixed
//! ladder of recovery strategies and reports every failure when none works.

use super::planning::{QueryPlan, SearchQuery};
use serde_json::Value;
use thiserror::Error;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Error)]
#[error("could not extract a query plan from model output ({}); output began with: {preview:?}", .attempts.join("; "))]
pub struct ParseError {
    /// Raw model output, truncated for diagnostics
    pub preview: String,
    /// Distinct failure reasons, in the order the strategies ran
    pub attempts: Vec<String>,
}

pub struct QueryPlanParser;

impl QueryPlanParser {
    pub fn parse(raw: &str) -> Result<QueryPlan, ParseError> {
        let mut attempts: Vec<String> = Vec::new();
        let mut record = |step: &str, reason: String| {
            let reason = format!("{step}: {reason}");
            if !attempts.contains(&reason) {
                attempts.push(reason);
            }
        };

        match parse_direct(raw) {
            Ok(plan) => return Ok(plan),
            Err(e) => record("direct", e),
        }

        match plan_from_json(&unescape(raw)) {
            Ok(plan) => return Ok(plan),
            Err(e) => record("unescaped", e),
        }

        match extract_fenced(raw) {
            Some(block) => match plan_from_json(&unescape(block)) {
                Ok(plan) => return Ok(plan),
                Err(e) => record("fenced block", e),
            },
            None => record("fenced block", "no code fence found".to_string()),
        }

        match extract_braced(raw) {
            Some(object) => match plan_from_json(&unescape(object)) {
                Ok(plan) => return Ok(plan),
                Err(e) => record("braced object", e),
            },
            None => record("braced object", "no balanced {...} found".to_string()),
        }

        Err(ParseError {
            preview: raw.chars().take(PREVIEW_CHARS).collect(),
            attempts,
        })
    }
}

/// Parse as-is; a JSON string is treated as double-encoded and parsed again
fn parse_direct(raw: &str) -> Result<QueryPlan, String> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(|e| e.to_string())?;
    match value {
        Value::String(inner) => plan_from_json(&inner),
        other => plan_from_value(other),
    }
}

fn plan_from_json(text: &str) -> Result<QueryPlan, String> {
    let value: Value = serde_json::from_str(text.trim()).map_err(|e| e.to_string())?;
    plan_from_value(value)
}

/// Accepts an object with a `queries` array, keeping only well-typed entries
fn plan_from_value(value: Value) -> Result<QueryPlan, String> {
    let Value::Object(mut object) = value else {
        return Err("top-level value is not an object".to_string());
    };

    let queries = match object.remove("queries") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err("`queries` is not an array".to_string()),
        None => return Err("missing `queries`".to_string()),
    };

    let rationale = object
        .get("rationale")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let queries = queries
        .into_iter()
        .filter_map(|item| {
            let query = item.get("query")?.as_str()?.trim();
            let rationale = item.get("rationale")?.as_str()?;
            if query.is_empty() {
                return None;
            }
            Some(SearchQuery::new(query, rationale))
        })
        .collect();

    Ok(QueryPlan { rationale, queries })
}

/// Undo the escaping artifacts models commonly leave behind
fn unescape(text: &str) -> String {
    text.replace("\\\"", "\"")
        .replace("\\n", "\n")
        .replace("\\\\", "\\")
}

/// Body of the first ``` fenced block, without an optional `json` tag
fn extract_fenced(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let end = rest.find("```")?;
    let block = &rest[..end];

    let tag_len = block
        .get(..4)
        .filter(|tag| tag.eq_ignore_ascii_case("json"))
        .map_or(0, |_| 4);
    Some(block[tag_len..].trim())
}

/// First top-level `{...}` span, found by counting braces outside of strings
fn extract_braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
