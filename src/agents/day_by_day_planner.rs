//! `DayByDayPlannerAgent` — chat-enabled agent that replans an entire day
//! on request (e.g. "redo day 2 around food markets instead"), producing a
//! change-set rather than mutating the pipeline's node list directly, so
//! the change engine's lock checks and version CAS still apply (spec §4.7,
//! §4.9 routing table: `replan_day`).

use async_trait::async_trait;

use super::support::{node_list_schema, nodes_from_structured};
use super::{Agent, AgentContext, AgentOutcome};
use crate::error::{Error, Result};
use crate::llm::Message;
use crate::model::{ChangeSet, NodeType, Op, Scope};

pub struct DayByDayPlannerAgent;

impl DayByDayPlannerAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DayByDayPlannerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for DayByDayPlannerAgent {
    fn id(&self) -> &str {
        "day_by_day_planner_agent"
    }

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome> {
        let day_number = ctx
            .day_number
            .ok_or_else(|| Error::InvalidStructuredResponse("day_by_day_planner_agent requires a day_number".to_string()))?;
        let day = ctx
            .itinerary
            .day(day_number)
            .ok_or_else(|| Error::NotFound(format!("day {}", day_number)))?;
        let request = ctx.user_message.clone().unwrap_or_default();

        let locked_ids: Vec<String> = day.nodes.iter().filter(|n| n.locked).map(|n| n.id.clone()).collect();
        let unlocked_ids: Vec<String> = day.nodes.iter().filter(|n| !n.locked).map(|n| n.id.clone()).collect();

        let messages = vec![
            Message::system("Replace this day's unlocked activities according to the traveler's request. Locked nodes stay untouched."),
            Message::user(format!("location={} request={} locked={:?}", day.location, request, locked_ids)),
        ];
        let value = ctx.llm.generate_structured(&messages, &node_list_schema()).await?;
        let new_nodes = nodes_from_structured(value, NodeType::Attraction, "replan", day_number, &ctx.itinerary.currency);

        let mut ops: Vec<Op> = unlocked_ids.into_iter().map(|id| Op::Delete { id }).collect();
        ops.extend(new_nodes.into_iter().map(|node| Op::Insert { after: None, day: day_number, node }));

        let mut change_set = ChangeSet::new(Scope::Day, ops);
        change_set.day = Some(day_number);
        Ok(AgentOutcome::Proposal(change_set))
    }
}
