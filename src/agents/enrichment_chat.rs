//! `EnrichmentChatAgent` — chat-enabled counterpart to `EnrichmentAgent`:
//! refreshes tips/details for one node on request (e.g. "what should I know
//! before visiting this?") rather than enriching a whole day during
//! generation (spec §4.7, §4.9 routing table: `enrich_node`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Agent, AgentContext, AgentOutcome};
use crate::error::{Error, Result};
use crate::llm::Message;
use crate::model::{ChangeSet, Op, Scope};

pub struct EnrichmentChatAgent;

impl EnrichmentChatAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnrichmentChatAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct TipUpdate {
    travel: String,
    #[serde(default)]
    warnings: Vec<String>,
    best_time: String,
}

#[async_trait]
impl Agent for EnrichmentChatAgent {
    fn id(&self) -> &str {
        "enrichment_chat_agent"
    }

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome> {
        let node_id = ctx
            .params
            .get("node_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidStructuredResponse("enrichment_chat_agent requires params.node_id".to_string()))?
            .to_string();
        let (_, node) = ctx
            .itinerary
            .find_node(&node_id)
            .ok_or_else(|| Error::NotFound(node_id.clone()))?;
        let request = ctx.user_message.clone().unwrap_or_default();

        let schema = json!({
            "type": "object",
            "properties": {
                "travel": {"type": "string"},
                "warnings": {"type": "array", "items": {"type": "string"}},
                "best_time": {"type": "string"}
            }
        });
        let messages = vec![
            Message::system("Refresh the travel tips for this node based on the traveler's question."),
            Message::user(format!("node={} question={}", node.title, request)),
        ];
        let value = ctx.llm.generate_structured(&messages, &schema).await?;
        let update: TipUpdate = serde_json::from_value(value).map_err(|e| Error::InvalidStructuredResponse(e.to_string()))?;

        let mut enriched = node.clone();
        enriched.tips.travel = Some(update.travel);
        enriched.tips.warnings = update.warnings;
        enriched.tips.best_time = Some(update.best_time);

        Ok(AgentOutcome::Proposal(ChangeSet::new(
            Scope::Trip,
            vec![Op::Replace { id: node_id, node: enriched }],
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::llm::MockLlmGateway;
    use crate::model::{Author, Cost, CostPer, Day, Itinerary, Location, Node, NodeStatus, NodeType, Timing};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn refreshes_tips_for_the_requested_node() {
        let mut itinerary = Itinerary::new("it_1", "user_1", "USD", chrono::Utc::now());
        let mut day = Day::new(1);
        day.nodes.push(Node {
            id: "n1".to_string(),
            node_type: NodeType::Attraction,
            title: "Shrine".to_string(),
            location: Location::named("x"),
            timing: Timing::default(),
            cost: Some(Cost { amount: 0.0, currency: "USD".to_string(), per: CostPer::Person }),
            details: Default::default(),
            labels: vec![],
            tips: Default::default(),
            links: Default::default(),
            locked: false,
            booking_ref: None,
            status: NodeStatus::Planned,
            updated_by: Author::Agent,
            updated_at: chrono::Utc::now(),
        });
        itinerary.days.push(day);

        let agent = EnrichmentChatAgent::new();
        let ctx = AgentContext {
            itinerary,
            day_number: None,
            params: json!({"node_id": "n1"}),
            user_message: Some("what should I wear?".to_string()),
            llm: Arc::new(MockLlmGateway::new(LlmConfig::default())),
        };
        match agent.execute(ctx).await.unwrap() {
            AgentOutcome::Proposal(cs) => match &cs.ops[0] {
                Op::Replace { node, .. } => assert!(node.tips.travel.is_some()),
                other => panic!("expected Replace op, got {:?}", other),
            },
            other => panic!("expected Proposal outcome, got {:?}", other),
        }
    }
}
