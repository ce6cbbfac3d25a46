//! Deterministic mock `LlmGateway` — the default test double used
//! everywhere in this crate's own test suite and by any embedding
//! application that sets `llm.mock = true` (spec §4.3, §0 test tooling).
//!
//! Outputs are derived from a SHA-256 hash of the prompt so the same input
//! always produces the same output, without depending on the wall clock or
//! any external service.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::continuation::CONTINUATION_MARKER;
use super::retry::with_retry;
use super::{LlmGateway, Message};
use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Explicit prompt markers (spec §4.3: "deterministic based on prompt hash
/// or explicit mapping") a test can include in a user message to force the
/// mock to simulate a truncated completion: `TRUNCATE_ONCE_TEST` resolves
/// after one continuation, `TRUNCATE_ALWAYS_TEST` never resolves, exercising
/// the continuation cap.
const TRUNCATE_ONCE_MARKER: &str = "TRUNCATE_ONCE_TEST";
const TRUNCATE_ALWAYS_MARKER: &str = "TRUNCATE_ALWAYS_TEST";

pub struct MockLlmGateway {
    config: LlmConfig,
}

impl MockLlmGateway {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }

    fn seed(messages: &[Message]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for message in messages {
            hasher.update(message.role.as_bytes());
            hasher.update(message.content.as_bytes());
        }
        hasher.finalize().into()
    }

    /// Synthesizes a value matching `schema`'s declared type, using bytes
    /// from `seed` to vary strings/numbers deterministically without ever
    /// calling a real model.
    fn synthesize(schema: &Value, seed: &[u8; 32], cursor: &mut usize) -> Value {
        let next_byte = |cursor: &mut usize| -> u8 {
            let b = seed[*cursor % seed.len()];
            *cursor += 1;
            b
        };
        if let Some(variants) = schema.get("enum").and_then(Value::as_array) {
            if !variants.is_empty() {
                let index = next_byte(cursor) as usize % variants.len();
                return variants[index].clone();
            }
        }
        match schema.get("type").and_then(Value::as_str) {
            Some("object") => {
                let mut obj = Map::new();
                if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                    for (key, sub_schema) in properties {
                        obj.insert(key.clone(), Self::synthesize(sub_schema, seed, cursor));
                    }
                }
                Value::Object(obj)
            }
            Some("array") => {
                let item_schema = schema.get("items").cloned().unwrap_or(json!({"type": "string"}));
                let len = 1 + (next_byte(cursor) % 2) as usize;
                Value::Array((0..len).map(|_| Self::synthesize(&item_schema, seed, cursor)).collect())
            }
            Some("integer") => Value::from(next_byte(cursor) as i64),
            Some("number") => Value::from((next_byte(cursor) as f64) / 10.0),
            Some("boolean") => Value::Bool(next_byte(cursor) % 2 == 0),
            _ => {
                let b = next_byte(cursor);
                Value::String(format!("mock-value-{:02x}", b))
            }
        }
    }
}

#[async_trait]
impl LlmGateway for MockLlmGateway {
    async fn generate_text(&self, messages: &[Message]) -> Result<String> {
        with_retry(&self.config.retry, || async {
            let seed = Self::seed(messages);
            Ok(format!("mock-response-{}", hex::encode(&seed[..8])))
        })
        .await
    }

    async fn generate_structured_raw(&self, messages: &[Message], schema: &Value) -> Result<String> {
        with_retry(&self.config.retry, || async {
            if schema.get("type").and_then(Value::as_str) != Some("object") && schema.get("type").is_none() {
                return Err(Error::InvalidStructuredResponse("schema must declare a type".to_string()));
            }

            // Continuation instructions this crate appended are excluded
            // from the seed so every round trip of one logical completion
            // synthesizes the same target value to split or not.
            let original: Vec<Message> = messages.iter().filter(|m| !m.content.contains(CONTINUATION_MARKER)).cloned().collect();
            let continuation_attempt = messages.len() - original.len();

            let seed = Self::seed(&original);
            let mut cursor = 0usize;
            let value = Self::synthesize(schema, &seed, &mut cursor);
            let full_text = serde_json::to_string(&value)?;

            let prompt_text: String = original.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n");
            if prompt_text.contains(TRUNCATE_ALWAYS_MARKER) {
                // Never closes its outermost brace, so `looks_truncated`
                // stays true no matter how many continuations run.
                return Ok(r#"{"unterminated": ""#.to_string());
            }
            if prompt_text.contains(TRUNCATE_ONCE_MARKER) {
                let split_at = char_boundary_near(&full_text, full_text.len() * 3 / 5);
                return Ok(if continuation_attempt == 0 {
                    full_text[..split_at].to_string()
                } else {
                    full_text[split_at..].to_string()
                });
            }

            Ok(full_text)
        })
        .await
    }
}

/// Nudges `idx` backward to the nearest UTF-8 char boundary in `text`, so
/// the deliberate truncation split never panics on a multi-byte character.
fn char_boundary_near(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
