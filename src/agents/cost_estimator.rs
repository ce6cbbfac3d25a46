//! `CostEstimatorAgent` — phase 4 of the generation pipeline (spec §4.8):
//! pure-logic normalization of each node's already-priced `cost` into a
//! per-person amount using the itinerary's party size, summed into
//! `day.totals.cost` and the itinerary-root `total_cost` (spec §4.7). No
//! LLM call — inventing a price for an unpriced node isn't this agent's
//! job; turning a per-group/per-night cost into a comparable per-person
//! total is.

use async_trait::async_trait;

use super::{Agent, AgentContext, AgentOutcome};
use crate::error::Result;
use crate::model::{Cost, CostPer, Day};

pub struct CostEstimatorAgent;

impl CostEstimatorAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CostEstimatorAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// A cost's share for one traveler out of `party_size` (floored at 1 so a
/// trip nobody set a party size for still normalizes sanely).
fn per_person(cost: &Cost, party_size: u32) -> f64 {
    let party = party_size.max(1) as f64;
    match cost.per {
        CostPer::Person => cost.amount,
        CostPer::Group | CostPer::Night => cost.amount / party,
    }
}

fn with_normalized_total(day: &Day, party_size: u32) -> Day {
    let mut day = day.clone();
    day.totals.cost = day.nodes.iter().filter_map(|n| n.cost.as_ref()).map(|c| per_person(c, party_size)).sum();
    day
}

#[async_trait]
impl Agent for CostEstimatorAgent {
    fn id(&self) -> &str {
        "cost_estimator_agent"
    }

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome> {
        let party_size = ctx.itinerary.party_size;
        let days: Vec<Day> = ctx
            .itinerary
            .days
            .iter()
            .map(|day| with_normalized_total(day, party_size))
            .collect();
        Ok(AgentOutcome::Days(days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::llm::MockLlmGateway;
    use crate::model::{Author, Itinerary, Location, Node, NodeStatus, NodeType, Timing};
    use std::sync::Arc;

    fn node_with_cost(id: &str, amount: f64, per: CostPer) -> Node {
        Node {
            id: id.to_string(),
            node_type: NodeType::Attraction,
            title: id.to_string(),
            location: Location::named("x"),
            timing: Timing::default(),
            cost: Some(Cost { amount, currency: "USD".to_string(), per }),
            details: Default::default(),
            labels: vec![],
            tips: Default::default(),
            links: Default::default(),
            locked: false,
            booking_ref: None,
            status: NodeStatus::Planned,
            updated_by: Author::Agent,
            updated_at: chrono::Utc::now(),
        }
    }

    async fn run(itinerary: Itinerary) -> Vec<Day> {
        let agent = CostEstimatorAgent::new();
        let ctx = AgentContext {
            itinerary,
            day_number: None,
            params: serde_json::Value::Null,
            user_message: None,
            llm: Arc::new(MockLlmGateway::new(LlmConfig::default())),
        };
        match agent.execute(ctx).await.unwrap() {
            AgentOutcome::Days(days) => days,
            other => panic!("expected Days outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn group_cost_is_split_across_the_party() {
        let mut itinerary = Itinerary::new("it_1", "user_1", "USD", chrono::Utc::now());
        itinerary.party_size = 4;
        let mut day = Day::new(1);
        day.nodes.push(node_with_cost("n1", 100.0, CostPer::Group));
        day.nodes.push(node_with_cost("n2", 20.0, CostPer::Person));
        itinerary.days.push(day);

        let days = run(itinerary).await;
        assert_eq!(days[0].totals.cost, 45.0);
    }

    #[tokio::test]
    async fn night_cost_is_split_across_the_party_too() {
        let mut itinerary = Itinerary::new("it_1", "user_1", "USD", chrono::Utc::now());
        itinerary.party_size = 2;
        let mut day = Day::new(1);
        day.nodes.push(node_with_cost("n1", 50.0, CostPer::Night));
        itinerary.days.push(day);

        let days = run(itinerary).await;
        assert_eq!(days[0].totals.cost, 25.0);
    }

    #[tokio::test]
    async fn a_party_size_of_zero_does_not_divide_by_zero() {
        let mut itinerary = Itinerary::new("it_1", "user_1", "USD", chrono::Utc::now());
        itinerary.party_size = 0;
        let mut day = Day::new(1);
        day.nodes.push(node_with_cost("n1", 40.0, CostPer::Group));
        itinerary.days.push(day);

        let days = run(itinerary).await;
        assert_eq!(days[0].totals.cost, 40.0);
    }

    #[tokio::test]
    async fn a_node_with_no_cost_contributes_nothing() {
        let mut itinerary = Itinerary::new("it_1", "user_1", "USD", chrono::Utc::now());
        let mut day = Day::new(1);
        day.nodes.push(Node { cost: None, ..node_with_cost("n1", 0.0, CostPer::Person) });
        itinerary.days.push(day);

        let days = run(itinerary).await;
        assert_eq!(days[0].totals.cost, 0.0);
    }
}
