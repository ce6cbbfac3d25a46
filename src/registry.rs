//! Agent Registry & Coordinator (spec §4.5): capability registration and
//! routing by `taskType`, enforcing the zero-overlap invariant — no two
//! chat-enabled agents may claim the same task type.
//!
//! Grounded directly on `agent_network.rs::register_agent`, which already
//! panics at registration time when two handlers claim the same domain key
//! — this crate keeps that "fail fast at startup, not at routing time"
//! shape but swaps the key from `Domain` to `taskType` and swaps the
//! in-memory collection from per-domain agent trait objects to this
//! crate's `Agent` trait objects (see `agents::Agent`).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::agents::Agent;
use crate::error::{Error, Result};

/// An agent's declared routing capability (spec §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub task_type: String,
    pub priority: i32,
    pub chat_enabled: bool,
}

struct Registration {
    agent: Arc<dyn Agent>,
    capability: Capability,
}

/// Holds every registered agent and enforces that each `taskType` maps to
/// exactly one agent. Registration happens once at startup; a duplicate
/// `taskType` claimed by two chat-enabled agents is a fatal configuration
/// error the embedding application should surface before serving traffic,
/// mirroring the teacher's "duplicate domain registration panics" contract
/// — expressed here as a returned `Error` rather than a panic, since this
/// registry is built incrementally via `register` rather than at a single
/// call site the teacher controlled entirely.
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Registration>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `agent` for `capability.task_type`. Returns
    /// `ZeroOverlapViolation` if another *chat-enabled* agent already claims
    /// the same task type — pipeline-only agents never receive chat
    /// routing so they cannot collide with each other on taskType in the
    /// way that matters for spec §4.5's invariant, but this registry still
    /// rejects any literal duplicate key to keep registration unambiguous.
    pub async fn register(&self, agent: Arc<dyn Agent>, capability: Capability) -> Result<()> {
        let mut agents = self.agents.write().await;
        if let Some(existing) = agents.get(&capability.task_type) {
            return Err(Error::ZeroOverlapViolation {
                task_type: capability.task_type.clone(),
                first: existing.agent.id().to_string(),
                second: agent.id().to_string(),
            });
        }
        info!(task_type = %capability.task_type, agent_id = %agent.id(), "agent registered");
        agents.insert(capability.task_type.clone(), Registration { agent, capability });
        Ok(())
    }

    pub async fn route(&self, task_type: &str) -> Result<Arc<dyn Agent>> {
        self.agents
            .read()
            .await
            .get(task_type)
            .map(|r| r.agent.clone())
            .ok_or_else(|| Error::AgentNotAvailable(task_type.to_string()))
    }

    pub async fn capability_of(&self, task_type: &str) -> Option<Capability> {
        self.agents.read().await.get(task_type).map(|r| r.capability.clone())
    }

    pub async fn chat_enabled_task_types(&self) -> Vec<String> {
        self.agents
            .read()
            .await
            .values()
            .filter(|r| r.capability.chat_enabled)
            .map(|r| r.capability.task_type.clone())
            .collect()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
