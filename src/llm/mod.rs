//! LLM Gateway (spec §4.3): the single seam through which every agent talks
//! to the completion service. New code — the teacher has no LLM transport
//! of its own (its ONNX embeddings are a local, synchronous, fixed-shape
//! call, not a generative completion API) — grounded on the teacher's
//! general `#[async_trait]` extension-point idiom (`domain_agent.rs`) and
//! on the retry/backoff shape common across the retrieval pack's
//! agent-orchestrator examples.

mod continuation;
mod mock;
mod retry;

pub use continuation::{looks_truncated, matches_schema, CONTINUATION_MARKER, MAX_CONTINUATIONS};
pub use mock::MockLlmGateway;
pub use retry::with_retry;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// A single chat-style message in a prompt.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// The opaque completion transport every agent is written against. Never
/// implemented by this crate for production use beyond the mock — a real
/// backend is a deployment detail outside this crate's scope (spec §1 OUT
/// OF SCOPE).
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Free-form text completion, used by agents that produce prose
    /// (`ExplainAgent`, tips/warnings copy).
    async fn generate_text(&self, messages: &[Message]) -> Result<String>;

    /// One raw structured-completion round trip: may return text that is
    /// cut off mid-structure (an unterminated brace or string). Backends
    /// implement only this; `generate_structured`'s default implementation
    /// below handles the truncation/continuation loop and schema
    /// validation uniformly, so every backend gets identical behavior for
    /// spec §4.3's continuation contract without reimplementing it.
    async fn generate_structured_raw(&self, messages: &[Message], schema: &Value) -> Result<String>;

    /// Completion constrained to a JSON Schema (spec §4.3): calls
    /// `generate_structured_raw`, and on a truncated result re-prompts with
    /// the partial output and a continuation instruction, concatenating and
    /// re-validating, up to `MAX_CONTINUATIONS` times before surfacing
    /// `InvalidStructuredResponse`. A result that parses but doesn't match
    /// `schema` fails immediately — no amount of continuation fixes a
    /// shape mismatch.
    async fn generate_structured(&self, messages: &[Message], schema: &Value) -> Result<Value> {
        let mut buffer = String::new();
        let mut history = messages.to_vec();
        let mut continuations = 0u32;

        loop {
            let chunk = self.generate_structured_raw(&history, schema).await?;
            buffer.push_str(&chunk);

            if !looks_truncated(&buffer) {
                let value: Value = serde_json::from_str(&buffer)
                    .map_err(|e| Error::InvalidStructuredResponse(format!("malformed JSON: {}", e)))?;
                return if matches_schema(&value, schema) {
                    Ok(value)
                } else {
                    Err(Error::InvalidStructuredResponse("response did not match the requested schema".to_string()))
                };
            }

            if continuations >= MAX_CONTINUATIONS {
                return Err(Error::InvalidStructuredResponse(format!(
                    "response still truncated after {} continuation attempt(s)",
                    continuations
                )));
            }
            continuations += 1;
            history.push(Message::system(format!(
                "{marker} (attempt {n}): the previous output was cut off before it finished. \
                 Here is everything received so far, continue it exactly from where it left off, \
                 do not repeat any of it: {partial}",
                marker = CONTINUATION_MARKER,
                n = continuations,
                partial = buffer,
            )));
        }
    }
}

/// Convenience wrapper deserializing a `generate_structured` response into
/// a concrete type, used by agents that want a typed result rather than a
/// raw `Value`.
pub async fn generate_typed<T: DeserializeOwned>(
    gateway: &dyn LlmGateway,
    messages: &[Message],
    schema: &Value,
) -> Result<T> {
    let value = gateway.generate_structured(messages, schema).await?;
    Ok(serde_json::from_value(value)?)
}

/// Builds the configured gateway. Only the mock backend ships with this
/// crate (spec §1); a real transport is injected by the embedding
/// application via a separate `LlmGateway` implementation.
pub fn gateway_from_config(config: &LlmConfig) -> MockLlmGateway {
    MockLlmGateway::new(config.clone())
}
