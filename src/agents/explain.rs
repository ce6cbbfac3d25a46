//! `ExplainAgent` — chat-enabled agent answering questions about the
//! itinerary (cost breakdowns, why a node is scheduled where it is) without
//! mutating anything (spec §4.7, §4.9 routing table: `explain`).

use async_trait::async_trait;

use super::{Agent, AgentContext, AgentOutcome};
use crate::error::Result;
use crate::llm::Message;

pub struct ExplainAgent;

impl ExplainAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExplainAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ExplainAgent {
    fn id(&self) -> &str {
        "explain_agent"
    }

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome> {
        let question = ctx.user_message.clone().unwrap_or_default();
        let day_summary = ctx
            .day_number
            .and_then(|d| ctx.itinerary.day(d))
            .map(|d| format!("day {} has {} nodes, pacing {:?}", d.day_number, d.nodes.len(), d.pacing))
            .unwrap_or_else(|| format!("the trip has {} days", ctx.itinerary.days.len()));

        let messages = vec![
            Message::system("Answer the traveler's question about their itinerary concisely."),
            Message::user(format!("context={} question={}", day_summary, question)),
        ];
        let text = ctx.llm.generate_text(&messages).await?;
        Ok(AgentOutcome::Text(text))
    }
}
