use crate::traits::ToolCall;
use serde_json::{Map, Value};

const TOOL_CALL_OPEN: &str = "<tool_call>";
const TOOL_CALL_CLOSE: &str = "</tool_call>";

/// Splits a text response into the prose around `<tool_call>` blocks and the
/// calls found inside them. Used when the provider returns no native calls.
pub fn parse_tool_calls(response: &str) -> (String, Vec<ToolCall>) {
    let mut text_parts = vec![];
    let mut calls = vec![];
    let mut remaining = response;

    while let Some(start) = remaining.find(TOOL_CALL_OPEN) {
        let before = &remaining[..start];
        if !before.trim().is_empty() {
            text_parts.push(before.trim().to_string());
        }

        let after_open = &remaining[start + TOOL_CALL_OPEN.len()..];
        let Some(close_idx) = after_open.find(TOOL_CALL_CLOSE) else {
            break;
        };

        calls.extend(
            extract_json_objects(&after_open[..close_idx])
                .iter()
                .filter_map(tool_call_from_value),
        );
        remaining = &after_open[close_idx + TOOL_CALL_CLOSE.len()..];
    }

    if !remaining.trim().is_empty() {
        text_parts.push(remaining.trim().to_string());
    }

    (text_parts.join("\n"), calls)
}

fn tool_call_from_value(value: &Value) -> Option<ToolCall> {
    let name = value.get("name")?.as_str()?.to_string();
    let arguments = value
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    let arguments = serde_json::to_string(&arguments).ok()?;
    let id = format!("call_{:x}", md5::compute(format!("{name}:{arguments}").as_bytes()));

    Some(ToolCall {
        id,
        name,
        arguments,
    })
}

/// Every top-level balanced `{...}` in `text` that parses as a JSON object,
/// in order of appearance.
pub fn extract_json_objects(text: &str) -> Vec<Value> {
    let mut values = vec![];
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(s) = start.take()
                    && let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&text[s..=i])
                {
                    values.push(value);
                }
            }
            _ => {}
        }
    }

    values
}

/// Turns an agent's final answer into a JSON object payload: the whole text if
/// it is an object, else the first object embedded in it, else `{"text": ...}`.
pub fn payload_from_text(text: &str) -> Value {
    let trimmed = strip_code_fence(text.trim());

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }

    if let Some(value) = extract_json_objects(trimmed).into_iter().next() {
        return value;
    }

    serde_json::json!({ "text": text.trim() })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
