//! Itinerary Engine
//!
//! Agent-orchestrated generation and mutation of travel itineraries: a
//! five-phase pipeline builds a trip from a skeleton outline through
//! populated days, enrichment, and cost estimation; a change engine applies
//! and undoes edits against a versioned document with compare-and-swap
//! concurrency; a chat router classifies natural-language requests and
//! routes them to the agent registered for that intent; and a durable task
//! lifecycle lets any of the above run off-line, with retry and timeout
//! recovery, when a caller can't wait synchronously.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Itinerary Engine                          │
//! ├───────────────┬──────────────────┬───────────────┬───────────────┤
//! │ Orchestrator  │  Change Engine   │  Chat Router  │ Task Lifecycle│
//! │ (5-phase gen) │ (propose/apply/  │  (intent →    │ (submit/pick  │
//! │               │  undo, CAS)      │   agent)      │  up/execute)  │
//! ├───────────────┴──────────────────┴───────────────┴───────────────┤
//! │               Agent Registry (taskType → Agent)                   │
//! ├─────────────────────────────────────────────┬─────────────────────┤
//! │  Model (Itinerary/Day/Node/Revision/Task)    │  Event Bus          │
//! │  Store Adapter (in-memory / SQLite)          │  LLM Gateway        │
//! └───────────────────────────────────────────────┴───────────────────┘
//! ```

pub mod agents;
pub mod change_engine;
pub mod chat_router;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod llm;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod store;
pub mod task_lifecycle;

pub use agents::{Agent, AgentContext, AgentOutcome};
pub use change_engine::ChangeEngine;
pub use chat_router::{ChatRequest, ChatResponse, ChatRouter};
pub use config::Config;
pub use error::{Error, Result};
pub use event_bus::{AgentProgressEvent, Event, EventBus, PatchEvent, Phase, PhaseStatus};
pub use llm::{gateway_from_config, LlmGateway, Message};
pub use model::{
    Author, ChangeSet, Day, Diff, Itinerary, Node, Op, Revision, Scope, Task, TaskStatus,
    TripMetadata,
};
pub use orchestrator::Orchestrator;
pub use registry::{AgentRegistry, Capability};
pub use store::{InMemoryStore, SqliteStore, StoreAdapter};
pub use task_lifecycle::{TaskExecutor, TaskMonitor, TaskScheduler};

/// Crate version, exposed at runtime for logging and diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_cargo_toml() {
        assert_eq!(version(), "0.1.0");
    }
}
