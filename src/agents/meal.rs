//! `MealAgent` — phase 2 population agent populating meal nodes for a
//! single day (spec §4.8).

use async_trait::async_trait;

use super::support::{node_list_schema, populate_placeholders};
use super::{Agent, AgentContext, AgentOutcome};
use crate::error::{Error, Result};
use crate::llm::Message;
use crate::model::NodeType;

pub struct MealAgent;

impl MealAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MealAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for MealAgent {
    fn id(&self) -> &str {
        "meal_agent"
    }

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome> {
        let day_number = ctx
            .day_number
            .ok_or_else(|| Error::InvalidStructuredResponse("meal_agent requires a day_number".to_string()))?;
        let day = ctx
            .itinerary
            .day(day_number)
            .ok_or_else(|| Error::NotFound(format!("day {}", day_number)))?;

        let messages = vec![
            Message::system("Suggest breakfast, lunch, and dinner venues for this day."),
            Message::user(format!("location={}", day.location)),
        ];
        let value = ctx.llm.generate_structured(&messages, &node_list_schema()).await?;
        let nodes = populate_placeholders(value, NodeType::Meal, day_number, &day.nodes, &ctx.itinerary.currency);
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
    async fn populates_meal_nodes_for_the_requested_day() {
        let mut itinerary = Itinerary::new("it_1", "user_1", "USD", chrono::Utc::now());
        itinerary.days.push(Day::new(1));
        let agent = MealAgent::new();
        let ctx = AgentContext {
            itinerary,
            day_number: Some(1),
            params: serde_json::Value::Null,
            user_message: None,
            llm: Arc::new(MockLlmGateway::new(LlmConfig::default())),
        };
        let outcome = agent.execute(ctx).await.unwrap();
        match outcome {
            AgentOutcome::Nodes(nodes) => assert!(nodes.iter().all(|n| n.node_type == NodeType::Meal)),
            other => panic!("expected Nodes outcome, got {:?}", other),
        }
    }
}
