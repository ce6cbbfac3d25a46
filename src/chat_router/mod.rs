//! Chat Router (spec §4.9): turns a free-form chat message into a routed
//! agent invocation — keyword pre-routing falling back to an LLM intent
//! classification, disambiguation against the itinerary when a reference is
//! ambiguous, then execution through the same `AgentRegistry` the
//! orchestrator and task lifecycle use.

mod disambiguation;
mod intent;
mod router;

pub use disambiguation::{resolve, Candidate, Resolution};
pub use intent::{classify_by_keyword, classify_with_llm, ClassifiedIntent, Intent};
pub use router::{ChatRequest, ChatResponse, ChatRouter};
