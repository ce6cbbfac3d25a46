//! The twelve agents (spec §4.6/§4.7): six pipeline-only agents driving
//! generation, and six chat-enabled agents additionally reachable from the
//! chat router.
//!
//! The `Agent` trait is grounded on `domain_agent.rs`'s
//! `#[async_trait] trait DomainAgent` — a single polymorphic entry point
//! agents implement, queried through `Arc<dyn Agent>` exactly as the
//! teacher queries `Arc<dyn DomainAgent>`. The one-file-per-agent layout
//! with a re-exporting `mod.rs` follows the teacher's `agents/` directory
//! convention.

mod activity;
mod booking;
mod cost_estimator;
mod day_by_day_planner;
mod editor;
mod enrichment;
mod enrichment_chat;
mod explain;
mod meal;
mod places;
mod skeleton_planner;
mod support;
mod transport;

pub use activity::ActivityAgent;
pub use booking::BookingAgent;
pub use cost_estimator::CostEstimatorAgent;
pub use day_by_day_planner::DayByDayPlannerAgent;
pub use editor::EditorAgent;
pub use enrichment::EnrichmentAgent;
pub use enrichment_chat::EnrichmentChatAgent;
pub use explain::ExplainAgent;
pub use meal::MealAgent;
pub use places::PlacesAgent;
pub use skeleton_planner::SkeletonPlannerAgent;
pub use transport::TransportAgent;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::llm::LlmGateway;
use crate::model::{ChangeSet, Day, Itinerary, Node};

/// Everything an agent needs to do one unit of work: a read-only view of
/// the itinerary (or the slice of it relevant to this invocation), the task
/// parameters it was invoked with, and a handle to the LLM Gateway.
/// Constructed fresh per invocation by the orchestrator/chat router rather
/// than held by the agent, so agents themselves stay stateless (spec §4.6:
/// "agents hold no itinerary state between invocations").
pub struct AgentContext {
    pub itinerary: Itinerary,
    pub day_number: Option<u32>,
    pub params: Value,
    pub user_message: Option<String>,
    pub llm: Arc<dyn LlmGateway>,
}

/// What an agent produced. Pipeline agents return `Nodes`; chat-enabled
/// agents that mutate content return `Proposal`; agents that only answer a
/// question return `Text`.
#[derive(Debug, Clone)]
pub enum AgentOutcome {
    /// Skeleton planner output: the initial day shells for the trip.
    Days(Vec<Day>),
    /// Population/enrichment output: nodes to add to `ctx.day_number`.
    Nodes(Vec<Node>),
    /// A chat-originated mutation ready for the change engine.
    Proposal(ChangeSet),
    /// A natural-language answer with no itinerary-mutating effect.
    Text(String),
}

#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable identifier used as the registry's "first"/"second" claimant
    /// in a zero-overlap violation and as the `agent_id` on progress
    /// events.
    fn id(&self) -> &str;

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome>;
}
