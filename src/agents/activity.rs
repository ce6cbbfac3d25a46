//! `ActivityAgent` — phase 2 population agent populating attraction nodes
//! for a single day (spec §4.8).

use async_trait::async_trait;

use super::support::{node_list_schema, populate_placeholders};
use super::{Agent, AgentContext, AgentOutcome};
use crate::error::{Error, Result};
use crate::llm::Message;
use crate::model::NodeType;

pub struct ActivityAgent;

impl ActivityAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ActivityAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ActivityAgent {
    fn id(&self) -> &str {
        "activity_agent"
    }

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome> {
        let day_number = ctx.day_number.ok_or_else(|| {
            Error::InvalidStructuredResponse("activity_agent requires a day_number".to_string())
        })?;
        let day = ctx
            .itinerary
            .day(day_number)
            .ok_or_else(|| Error::NotFound(format!("day {}", day_number)))?;

        let messages = vec![
            Message::system("Suggest attractions to visit for this day of the trip."),
            Message::user(format!("location={} themes={:?}", day.location, ctx.itinerary.themes)),
        ];
        let value = ctx.llm.generate_structured(&messages, &node_list_schema()).await?;
        let nodes = populate_placeholders(value, NodeType::Attraction, day_number, &day.nodes, &ctx.itinerary.currency);
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
    async fn populates_attraction_nodes_for_the_requested_day() {
        let mut itinerary = Itinerary::new("it_1", "user_1", "USD", chrono::Utc::now());
        itinerary.days.push(Day::new(1));
        let agent = ActivityAgent::new();
        let ctx = AgentContext {
            itinerary,
            day_number: Some(1),
            params: serde_json::Value::Null,
            user_message: None,
            llm: Arc::new(MockLlmGateway::new(LlmConfig::default())),
        };
        let outcome = agent.execute(ctx).await.unwrap();
        match outcome {
            AgentOutcome::Nodes(nodes) => assert!(nodes.iter().all(|n| n.node_type == NodeType::Attraction)),
            other => panic!("expected Nodes outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_day_number_is_rejected() {
        let itinerary = Itinerary::new("it_1", "user_1", "USD", chrono::Utc::now());
        let agent = ActivityAgent::new();
        let ctx = AgentContext {
            itinerary,
            day_number: None,
            params: serde_json::Value::Null,
            user_message: None,
            llm: Arc::new(MockLlmGateway::new(LlmConfig::default())),
        };
        assert!(agent.execute(ctx).await.is_err());
    }
}
