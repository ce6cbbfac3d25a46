//! `SkeletonPlannerAgent` — phase 1 of the generation pipeline (spec
//! §4.8): produces the empty day shells (date, location, pacing hint) that
//! phase 2's population agents then fill concurrently.
//!
//! Grounded on `function_call_generator.rs`'s natural-language-to-structured
//! pattern: a free-form trip brief goes in, a fixed JSON shape comes out.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::support::placeholder_node;
use super::{Agent, AgentContext, AgentOutcome};
use crate::error::{Error, Result};
use crate::llm::Message;
use crate::model::{Day, NodeType, Pacing};

pub struct SkeletonPlannerAgent;

impl SkeletonPlannerAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SkeletonPlannerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SkeletonDay {
    location: String,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SkeletonResponse {
    days: Vec<SkeletonDay>,
}

#[async_trait]
impl Agent for SkeletonPlannerAgent {
    fn id(&self) -> &str {
        "skeleton_planner_agent"
    }

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome> {
        let num_days = ctx
            .params
            .get("num_days")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::InvalidStructuredResponse("num_days missing from skeleton params".to_string()))?;
        let destination = ctx
            .params
            .get("destination")
            .and_then(|v| v.as_str())
            .unwrap_or(&ctx.itinerary.summary)
            .to_string();

        let schema = json!({
            "type": "object",
            "properties": {
                "days": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "location": {"type": "string"},
                            "date": {"type": "string"}
                        }
                    }
                }
            }
        });
        let messages = vec![
            Message::system("Produce one day entry per requested day, in order, for the destination given."),
            Message::user(format!("destination={} num_days={}", destination, num_days)),
        ];
        let value = ctx.llm.generate_structured(&messages, &schema).await?;
        let parsed: SkeletonResponse = serde_json::from_value(value)
            .map_err(|e| Error::InvalidStructuredResponse(e.to_string()))?;

        let days = (1..=num_days as u32)
            .map(|day_number| {
                let location = parsed
                    .days
                    .get(day_number as usize - 1)
                    .map(|d| d.location.clone())
                    .unwrap_or_else(|| destination.clone());
                let date = parsed.days.get(day_number as usize - 1).and_then(|d| d.date.clone());
                let is_final_day = day_number == num_days as u32;
                Day {
                    day_number,
                    date,
                    nodes: canonical_placeholders(day_number, &location, is_final_day),
                    edges: Vec::new(),
                    location,
                    pacing: Pacing::default(),
                    time_window: Default::default(),
                    totals: Default::default(),
                    warnings: Vec::new(),
                    notes: Vec::new(),
                }
            })
            .collect();

        Ok(AgentOutcome::Days(days))
    }
}

/// Canonical placeholder order for one day (spec §4.6): breakfast, a
/// morning attraction, lunch, an afternoon attraction, dinner, and an
/// overnight-accommodation placeholder — except on the trip's final day,
/// where checkout replaces the overnight stay with a departure transport
/// placeholder. Ids follow the `day{N}_node{seq}` contract population
/// agents preserve as they fill each placeholder in (spec §8).
fn canonical_placeholders(day_number: u32, location: &str, is_final_day: bool) -> Vec<crate::model::Node> {
    let id = |seq: u32| format!("day{}_node{}", day_number, seq);
    let mut nodes = vec![
        placeholder_node(id(1), NodeType::Meal, "Breakfast", location),
        placeholder_node(id(2), NodeType::Attraction, "Morning activity", location),
        placeholder_node(id(3), NodeType::Meal, "Lunch", location),
        placeholder_node(id(4), NodeType::Attraction, "Afternoon activity", location),
        placeholder_node(id(5), NodeType::Meal, "Dinner", location),
    ];
    nodes.push(if is_final_day {
        placeholder_node(id(6), NodeType::Transport, "Departure transport", location)
    } else {
        placeholder_node(id(6), NodeType::Accommodation, "Overnight stay", location)
    });
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmGateway;
    use crate::config::LlmConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn produces_one_day_per_requested_num_days() {
        let agent = SkeletonPlannerAgent::new();
        let ctx = AgentContext {
            itinerary: crate::model::Itinerary::new("it_1", "user_1", "USD", chrono::Utc::now()),
            day_number: None,
            params: json!({"destination": "Lisbon", "num_days": 3}),
            user_message: None,
            llm: Arc::new(MockLlmGateway::new(LlmConfig::default())),
        };
        let outcome = agent.execute(ctx).await.unwrap();
        match outcome {
            AgentOutcome::Days(days) => {
                assert_eq!(days.len(), 3);
                assert_eq!(days[0].day_number, 1);
                assert_eq!(days[2].day_number, 3);
            }
            other => panic!("expected Days outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn each_day_gets_six_ided_placeholders_with_the_final_day_swapping_in_transport() {
        let agent = SkeletonPlannerAgent::new();
        let ctx = AgentContext {
            itinerary: crate::model::Itinerary::new("it_1", "user_1", "USD", chrono::Utc::now()),
            day_number: None,
            params: json!({"destination": "Lisbon", "num_days": 2}),
            user_message: None,
            llm: Arc::new(MockLlmGateway::new(LlmConfig::default())),
        };
        let outcome = agent.execute(ctx).await.unwrap();
        let days = match outcome {
            AgentOutcome::Days(days) => days,
            other => panic!("expected Days outcome, got {:?}", other),
        };

        for day in &days {
            assert_eq!(day.nodes.len(), 6);
            for (i, node) in day.nodes.iter().enumerate() {
                assert_eq!(node.id, format!("day{}_node{}", day.day_number, i + 1));
                assert!(super::super::support::is_placeholder(node));
            }
        }
        assert_eq!(days[0].nodes[5].node_type, crate::model::NodeType::Accommodation);
        assert_eq!(days[1].nodes[5].node_type, crate::model::NodeType::Transport);
    }

    #[tokio::test]
    async fn missing_num_days_is_an_invalid_structured_response() {
        let agent = SkeletonPlannerAgent::new();
        let ctx = AgentContext {
            itinerary: crate::model::Itinerary::new("it_1", "user_1", "USD", chrono::Utc::now()),
            day_number: None,
            params: json!({}),
            user_message: None,
            llm: Arc::new(MockLlmGateway::new(LlmConfig::default())),
        };
        assert!(agent.execute(ctx).await.is_err());
    }
}
