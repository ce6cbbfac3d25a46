//! Chat Router (spec §4.9): classifies a chat turn, resolves a referenced
//! node if needed, routes to the single agent the registry has registered
//! for the resulting `taskType`, and folds the agent's output back through
//! the change engine when it produced a `ChangeSet`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::disambiguation::{resolve, Candidate, Resolution};
use super::intent::{classify_by_keyword, classify_with_llm, Intent};
use crate::agents::{Agent, AgentContext, AgentOutcome};
use crate::change_engine::ChangeEngine;
use crate::error::{Error, Result};
use crate::llm::LlmGateway;
use crate::model::{Author, ChangeSet, Diff, Itinerary, Scope};
use crate::registry::AgentRegistry;
use crate::store::StoreAdapter;

/// Request shape for a single chat turn (spec §4.9 input).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub itinerary_id: String,
    pub chat_text: String,
    #[serde(default)]
    pub selected_node_id: Option<String>,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub day: Option<u32>,
    #[serde(default)]
    pub auto_apply: Option<bool>,
}

/// Response shape for a single chat turn (spec §4.9 step 4).
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub intent: Intent,
    pub message: Option<String>,
    pub change_set: Option<ChangeSet>,
    pub diff: Option<Diff>,
    pub applied: bool,
    pub to_version: Option<u64>,
    pub warnings: Vec<String>,
    pub needs_disambiguation: bool,
    pub candidates: Vec<Candidate>,
}

impl serde::Serialize for Intent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let s = match self {
            Intent::Edit => "edit",
            Intent::Plan => "plan",
            Intent::Explain => "explain",
            Intent::Book => "book",
            Intent::Enrich => "enrich",
            Intent::Undo => "undo",
            Intent::ReplanToday => "replan_today",
        };
        serializer.serialize_str(s)
    }
}

impl ChatResponse {
    fn needs_disambiguation(intent: Intent, candidates: Vec<Candidate>) -> Self {
        Self {
            intent,
            message: None,
            change_set: None,
            diff: None,
            applied: false,
            to_version: None,
            warnings: Vec::new(),
            needs_disambiguation: true,
            candidates,
        }
    }
}

/// The user-facing `{message, applied: false}` shape for a locked-node
/// rejection (spec §4.9), regardless of whether the violation surfaced
/// from the agent's own pre-validation or from the change engine's apply/
/// propose once an agent's proposal reached it.
fn locked_node_response(intent: Intent, ids: &[String]) -> ChatResponse {
    ChatResponse {
        intent,
        message: Some(format!("can't do that, these nodes are locked: {:?}", ids)),
        change_set: None,
        diff: None,
        applied: false,
        to_version: None,
        warnings: Vec::new(),
        needs_disambiguation: false,
        candidates: Vec::new(),
    }
}

pub struct ChatRouter {
    registry: Arc<AgentRegistry>,
    change_engine: Arc<ChangeEngine>,
    store: Arc<dyn StoreAdapter>,
    llm: Arc<dyn LlmGateway>,
}

impl ChatRouter {
    pub fn new(registry: Arc<AgentRegistry>, change_engine: Arc<ChangeEngine>, store: Arc<dyn StoreAdapter>, llm: Arc<dyn LlmGateway>) -> Self {
        Self { registry, change_engine, store, llm }
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse> {
        let intent = match classify_by_keyword(&request.chat_text) {
            Some(intent) => intent,
            None => classify_with_llm(self.llm.as_ref(), &request.chat_text).await?.intent,
        };

        let itinerary = self
            .store
            .get_itinerary(&request.itinerary_id)
            .await?
            .ok_or_else(|| Error::NotFound(request.itinerary_id.clone()))?;

        // Node disambiguation (spec §4.9 step 2): only relevant when the
        // turn names a node by description rather than id, and no explicit
        // selection was already made.
        let node_id = if let Some(id) = &request.selected_node_id {
            Some(id.clone())
        } else if matches!(intent, Intent::Edit | Intent::Book | Intent::Enrich) {
            match resolve(&itinerary, &request.chat_text) {
                Resolution::Resolved(candidate) => Some(candidate.id),
                Resolution::Ambiguous(candidates) if candidates.len() != 1 => {
                    return Ok(ChatResponse::needs_disambiguation(intent, candidates));
                }
                Resolution::Ambiguous(mut candidates) => Some(candidates.remove(0).id),
            }
        } else {
            None
        };

        if let Intent::Undo = intent {
            return self.handle_undo(&request, &itinerary).await;
        }

        let task_type = intent.task_type();
        let agent = self.registry.route(task_type).await?;

        let mut params = serde_json::Map::new();
        if let Some(id) = &node_id {
            params.insert("node_id".to_string(), serde_json::Value::String(id.clone()));
        }
        if let Intent::Plan = intent {
            params.insert("destination".to_string(), serde_json::Value::String(itinerary.summary.clone()));
            params.insert("num_days".to_string(), serde_json::Value::from(itinerary.days.len() as u64));
        }

        let day_number = request.day.or_else(|| node_id.as_deref().and_then(|id| itinerary.find_node(id).map(|(d, _)| d)));

        let ctx = AgentContext {
            itinerary: itinerary.clone(),
            day_number,
            params: serde_json::Value::Object(params),
            user_message: Some(request.chat_text.clone()),
            llm: self.llm.clone(),
        };

        let outcome = agent.execute(ctx).await;
        self.finish(intent, &request, outcome, agent.as_ref()).await
    }

    async fn finish(
        &self,
        intent: Intent,
        request: &ChatRequest,
        outcome: Result<AgentOutcome>,
        agent: &dyn Agent,
    ) -> Result<ChatResponse> {
        match outcome {
            Err(Error::LockedNodeViolation(ids)) => Ok(locked_node_response(intent, &ids)),
            Err(err) => Err(err),
            Ok(AgentOutcome::Text(text)) => Ok(ChatResponse {
                intent,
                message: Some(text),
                change_set: None,
                diff: None,
                applied: false,
                to_version: None,
                warnings: Vec::new(),
                needs_disambiguation: false,
                candidates: Vec::new(),
            }),
            Ok(AgentOutcome::Proposal(mut change_set)) => {
                if let Some(scope) = intent.forced_scope() {
                    change_set.scope = scope;
                    if scope == Scope::Day {
                        change_set.day = change_set.day.or(request.day);
                    }
                }
                let auto_apply = request.auto_apply.unwrap_or(false);
                if auto_apply {
                    let (updated, diff) = match self
                        .change_engine
                        .apply(&request.itinerary_id, &change_set, Author::Agent)
                        .await
                    {
                        Ok(result) => result,
                        Err(Error::LockedNodeViolation(ids)) => return Ok(locked_node_response(intent, &ids)),
                        Err(err) => return Err(err),
                    };
                    Ok(ChatResponse {
                        intent,
                        message: None,
                        change_set: Some(change_set),
                        diff: Some(diff),
                        applied: true,
                        to_version: Some(updated.version),
                        warnings: updated.days.iter().flat_map(|d| d.warnings.clone()).collect(),
                        needs_disambiguation: false,
                        candidates: Vec::new(),
                    })
                } else {
                    let itinerary = self
                        .store
                        .get_itinerary(&request.itinerary_id)
                        .await?
                        .ok_or_else(|| Error::NotFound(request.itinerary_id.clone()))?;
                    let diff = match self.change_engine.propose(&itinerary, &change_set) {
                        Ok(diff) => diff,
                        Err(Error::LockedNodeViolation(ids)) => return Ok(locked_node_response(intent, &ids)),
                        Err(err) => return Err(err),
                    };
                    Ok(ChatResponse {
                        intent,
                        message: None,
                        change_set: Some(change_set),
                        diff: Some(diff),
                        applied: false,
                        to_version: None,
                        warnings: Vec::new(),
                        needs_disambiguation: false,
                        candidates: Vec::new(),
                    })
                }
            }
            Ok(other @ (AgentOutcome::Days(_) | AgentOutcome::Nodes(_))) => {
                Err(Error::Internal(format!("{} returned a non-chat outcome: {:?}", agent.id(), other)))
            }
        }
    }

    async fn handle_undo(&self, request: &ChatRequest, itinerary: &Itinerary) -> Result<ChatResponse> {
        if itinerary.version <= 1 {
            return Ok(ChatResponse {
                intent: Intent::Undo,
                message: Some("nothing to undo".to_string()),
                change_set: None,
                diff: None,
                applied: false,
                to_version: None,
                warnings: Vec::new(),
                needs_disambiguation: false,
                candidates: Vec::new(),
            });
        }
        let target_version = itinerary.version - 1;
        let restored = self.change_engine.undo(&request.itinerary_id, target_version, Author::User).await?;
        Ok(ChatResponse {
            intent: Intent::Undo,
            message: None,
            change_set: None,
            diff: None,
            applied: true,
            to_version: Some(restored.version),
            warnings: Vec::new(),
            needs_disambiguation: false,
            candidates: Vec::new(),
        })
    }
}
