//! `BookingAgent` — chat-enabled agent that confirms a booking for a node,
//! attaching `bookingRef` and the reserved `"Booked"` label (spec §3, §4.7,
//! §4.9 routing table: `book_node`). Payment provider integration itself is
//! out of scope (spec §1); this agent only records the reference a caller
//! supplies or one a mock confirmation step produces.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Agent, AgentContext, AgentOutcome};
use crate::error::{Error, Result};
use crate::llm::Message;
use crate::model::{ChangeSet, Op, Scope, BOOKED_LABEL};

pub struct BookingAgent;

impl BookingAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BookingAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct BookingConfirmation {
    booking_ref: String,
}

#[async_trait]
impl Agent for BookingAgent {
    fn id(&self) -> &str {
        "booking_agent"
    }

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome> {
        let node_id = ctx
            .params
            .get("node_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidStructuredResponse("booking_agent requires params.node_id".to_string()))?
            .to_string();
        let (_, node) = ctx
            .itinerary
            .find_node(&node_id)
            .ok_or_else(|| Error::NotFound(node_id.clone()))?;
        if node.locked {
            return Err(Error::LockedNodeViolation(vec![node_id]));
        }

        let schema = json!({
            "type": "object",
            "properties": {"booking_ref": {"type": "string"}}
        });
        let messages = vec![
            Message::system("Produce a confirmation reference for this booking."),
            Message::user(format!("node={}", node.title)),
        ];
        let value = ctx.llm.generate_structured(&messages, &schema).await?;
        let confirmation: BookingConfirmation = serde_json::from_value(value)
            .map_err(|e| Error::InvalidStructuredResponse(e.to_string()))?;

        let mut booked = node.clone();
        booked.booking_ref = Some(confirmation.booking_ref);
        booked.locked = true;
        if !booked.labels.iter().any(|l| l == BOOKED_LABEL) {
            booked.labels.push(BOOKED_LABEL.to_string());
        }

        Ok(AgentOutcome::Proposal(ChangeSet::new(
            Scope::Trip,
            vec![Op::Replace { id: node_id, node: booked }],
        )))
    }
}
