//! `PlacesAgent` — chat-enabled agent answering place-lookup questions
//! ("what's a good coffee place near the museum?") without touching the
//! itinerary document itself (spec §4.7, §4.9 routing table:
//! `places_lookup`). Like `ExplainAgent` this only produces `Text`; the
//! distinction is the question's subject (places in the world) rather than
//! the itinerary's own state.

use async_trait::async_trait;

use super::{Agent, AgentContext, AgentOutcome};
use crate::error::Result;
use crate::llm::Message;

pub struct PlacesAgent;

impl PlacesAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlacesAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for PlacesAgent {
    fn id(&self) -> &str {
        "places_agent"
    }

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome> {
        let question = ctx.user_message.clone().unwrap_or_default();
        let location = ctx
            .day_number
            .and_then(|d| ctx.itinerary.day(d))
            .map(|d| d.location.clone())
            .unwrap_or_default();

        let messages = vec![
            Message::system("Answer a question about places near the traveler's current location."),
            Message::user(format!("location={} question={}", location, question)),
        ];
        let text = ctx.llm.generate_text(&messages).await?;
        Ok(AgentOutcome::Text(text))
    }
}
