//! Centralized error handling.
//!
//! Every fallible operation in this crate returns `Result<T>`. Variants map
//! onto the failure kinds the system is required to surface (itinerary
//! orchestration/mutation spec §7): store conflicts, locked-node violations,
//! malformed change-sets, LLM transport failures, agent timeouts, and
//! retryable I/O. No panics in library code — lock acquisition on
//! non-poisonable primitives and test helpers are the only exceptions.

use thiserror::Error;

/// Primary error type for the itinerary engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Itinerary, node, revision, or task not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Compare-and-swap on `version` failed; caller should reload and retry.
    #[error("version conflict on {itinerary_id}: expected {expected}, found {found}")]
    VersionConflict {
        itinerary_id: String,
        expected: u64,
        found: u64,
    },

    /// A retried apply hit a second version conflict.
    #[error("contested: {0}")]
    Contested(String),

    /// An op targeted one or more locked nodes.
    #[error("locked node violation: {0:?}")]
    LockedNodeViolation(Vec<String>),

    /// A change-set op is malformed or references a nonexistent id.
    #[error("invalid change set at op {op_index}: {reason}")]
    InvalidChangeSet { op_index: usize, reason: String },

    /// LLM transport is unreachable (network/5xx after retries exhausted).
    #[error("llm unavailable: {0}")]
    LLMUnavailable(String),

    /// LLM transport returned 429 after retries exhausted.
    #[error("llm rate limited: {0}")]
    LLMRateLimited(String),

    /// LLM call exceeded its deadline.
    #[error("llm timeout after {0:?}")]
    LLMTimeout(std::time::Duration),

    /// Structured LLM response failed schema validation after continuation
    /// attempts were exhausted.
    #[error("invalid structured response: {0}")]
    InvalidStructuredResponse(String),

    /// An agent execution exceeded its deadline.
    #[error("agent timeout: {agent_id} after {elapsed:?}")]
    AgentTimeout {
        agent_id: String,
        elapsed: std::time::Duration,
    },

    /// An agent is not registered for the requested task type.
    #[error("agent not available for task type: {0}")]
    AgentNotAvailable(String),

    /// Two chat-enabled agents declared the same task type at registration.
    #[error("zero-overlap violation: task type {task_type} claimed by both {first} and {second}")]
    ZeroOverlapViolation {
        task_type: String,
        first: String,
        second: String,
    },

    /// Transient store I/O failure, retried internally before surfacing.
    #[error("transient store error: {0}")]
    TransientIO(String),

    /// Caller-initiated cancellation observed cooperatively.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Generic I/O error (file, database).
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration parse/validation error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal error; should not occur in normal operation.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Internal(format!("database error: {}", err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_informative() {
        let err = Error::NotFound("it_123".to_string());
        assert_eq!(err.to_string(), "not found: it_123");

        let err = Error::LockedNodeViolation(vec!["day1_node3".to_string()]);
        assert!(err.to_string().contains("day1_node3"));
    }

    #[test]
    fn error_conversion_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn errors_are_cloneable_and_comparable() {
        let a = Error::NotFound("x".to_string());
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Error::Contested("x".to_string()));
    }
}
