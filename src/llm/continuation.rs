//! Truncation detection and schema-shape checking for structured LLM
//! responses (spec §4.3): shared by `LlmGateway::generate_structured`'s
//! default continuation loop so every backend — mock or real — gets the
//! same "re-prompt on truncation, validate on completion" behavior without
//! reimplementing it.

use serde_json::Value;

/// A system-role message containing this marker is a continuation
/// instruction this crate generated, not part of the caller's original
/// prompt — `MockLlmGateway` filters these out before recomputing its
/// deterministic seed, and counts them to know which continuation attempt
/// it's on.
pub const CONTINUATION_MARKER: &str = "itinerary-engine:continue-structured-response";

/// Hard cap on continuation round-trips before a structured call gives up
/// (spec §4.3: "give up after 2 continuations").
pub const MAX_CONTINUATIONS: u32 = 2;

/// Scans `text` for an unterminated JSON string or an unbalanced
/// object/array nesting depth — the two ways a completion can be cut off
/// mid-structure. Deliberately not a full JSON validator: a string that
/// parses as *invalid* JSON for some other reason (e.g. a trailing comma)
/// is not "truncated" and should fail fast rather than loop on
/// continuations that will never fix it.
pub fn looks_truncated(text: &str) -> bool {
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape = false;
    for ch in text.chars() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => depth -= 1,
            _ => {}
        }
    }
    in_string || depth != 0
}

/// Permissive structural check that `value` is shaped like `schema`
/// declares: recurses into `object`/`array` schemas and checks scalar
/// types, but never rejects on an unrecognized or absent schema keyword —
/// this is a sanity check against gross mismatch, not a full JSON Schema
/// validator.
pub fn matches_schema(value: &Value, schema: &Value) -> bool {
    if let Some(variants) = schema.get("enum").and_then(Value::as_array) {
        return variants.contains(value);
    }
    match schema.get("type").and_then(Value::as_str) {
        Some("object") => {
            let Some(obj) = value.as_object() else { return false };
            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                for (key, sub_schema) in properties {
                    match obj.get(key) {
                        Some(sub_value) => {
                            if !matches_schema(sub_value, sub_schema) {
                                return false;
                            }
                        }
                        None => {
                            let required = schema
                                .get("required")
                                .and_then(Value::as_array)
                                .map(|r| r.iter().any(|v| v.as_str() == Some(key.as_str())))
                                .unwrap_or(false);
                            if required {
                                return false;
                            }
                        }
                    }
                }
            }
            true
        }
        Some("array") => {
            let Some(items) = value.as_array() else { return false };
            if let Some(item_schema) = schema.get("items") {
                items.iter().all(|item| matches_schema(item, item_schema))
            } else {
                true
            }
        }
        Some("string") => value.is_string(),
        Some("integer") => value.is_i64() || value.is_u64(),
        Some("number") => value.is_number(),
        Some("boolean") => value.is_boolean(),
        _ => true,
    }
}
