//! `TransportAgent` — phase 2 population agent populating transport nodes
//! for a single day (spec §4.8). Inter-node transit (`Day::edges`) is
//! filled in afterward by `EnrichmentAgent`, which has visibility into the
//! full set of nodes the three population agents produced.

use async_trait::async_trait;

use super::support::{node_list_schema, populate_placeholders};
use super::{Agent, AgentContext, AgentOutcome};
use crate::error::{Error, Result};
use crate::llm::Message;
use crate::model::NodeType;

pub struct TransportAgent;

impl TransportAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TransportAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for TransportAgent {
    fn id(&self) -> &str {
        "transport_agent"
    }

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome> {
        let day_number = ctx
            .day_number
            .ok_or_else(|| Error::InvalidStructuredResponse("transport_agent requires a day_number".to_string()))?;
        let day = ctx
            .itinerary
            .day(day_number)
            .ok_or_else(|| Error::NotFound(format!("day {}", day_number)))?;

        let messages = vec![
            Message::system("Suggest any standalone transport bookings needed this day (e.g. intercity trains, airport transfers)."),
            Message::user(format!("location={}", day.location)),
        ];
        let value = ctx.llm.generate_structured(&messages, &node_list_schema()).await?;
        let nodes = populate_placeholders(value, NodeType::Transport, day_number, &day.nodes, &ctx.itinerary.currency);
        Ok(AgentOutcome::Nodes(nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::llm::MockLlmGateway;
    use crate::model::{Day, Itinerary};
    use std::sync::Arc;

    #[tokio::test]
    async fn populates_transport_nodes_for_the_requested_day() {
        let mut itinerary = Itinerary::new("it_1", "user_1", "USD", chrono::Utc::now());
        itinerary.days.push(Day::new(1));
        let agent = TransportAgent::new();
        let ctx = AgentContext {
            itinerary,
            day_number: Some(1),
            params: serde_json::Value::Null,
            user_message: None,
            llm: Arc::new(MockLlmGateway::new(LlmConfig::default())),
        };
        let outcome = agent.execute(ctx).await.unwrap();
        match outcome {
            AgentOutcome::Nodes(nodes) => assert!(nodes.iter().all(|n| n.node_type == NodeType::Transport)),
            other => panic!("expected Nodes outcome, got {:?}", other),
        }
    }
}
