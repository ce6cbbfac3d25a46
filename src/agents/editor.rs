//! `EditorAgent` — chat-enabled agent handling single-node edits (move,
//! insert, delete, replace) that don't warrant a whole-day replan (spec
//! §4.7, §4.9 routing table: `edit_node`/`move_node`/`delete_node`).
//! Pre-validates against the locked node itself before ever calling the
//! LLM, rather than leaving lock enforcement entirely to the change
//! engine once a proposal reaches `apply`/`propose` (spec §3 Node
//! invariant: locked nodes reject everything but `Insert`).

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::{Agent, AgentContext, AgentOutcome};
use crate::error::{Error, Result};
use crate::llm::Message;
use crate::model::{Author, ChangeSet, Cost, Location, Node, NodeStatus, NodeType, Op, Scope, Timing};

pub struct EditorAgent;

impl EditorAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EditorAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Content fields the LLM may propose for an inserted or replaced node.
/// Bookkeeping fields (id, `updatedBy`/`updatedAt`) are never asked of the
/// model — the agent fills those in itself, the way `BookingAgent` mutates
/// a cloned node rather than expecting a whole document back.
#[derive(Debug, Default, Deserialize)]
struct ProposedContent {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    location: Option<Location>,
    #[serde(default)]
    timing: Option<Timing>,
    #[serde(default)]
    cost: Option<Cost>,
}

/// One proposed mutation, shaped after the real `Op` wire contract (spec
/// §3) rather than a move/delete-only custom shape — `id`/`day` are
/// optional since a single-node chat turn already carries the target node
/// from context; an explicit value here lets a multi-op proposal target
/// more than one node.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ProposedOp {
    Move {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        start_time: Option<String>,
        #[serde(default)]
        end_time: Option<String>,
    },
    Insert {
        #[serde(default)]
        after: Option<String>,
        #[serde(default)]
        day: Option<u32>,
        #[serde(default)]
        content: ProposedContent,
    },
    Delete {
        #[serde(default)]
        id: Option<String>,
    },
    Replace {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        content: ProposedContent,
    },
}

#[derive(Debug, Deserialize)]
struct ProposedChangeSet {
    #[serde(default)]
    ops: Vec<ProposedOp>,
}

#[async_trait]
impl Agent for EditorAgent {
    fn id(&self) -> &str {
        "editor_agent"
    }

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome> {
        let node_id = ctx
            .params
            .get("node_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidStructuredResponse("editor_agent requires params.node_id".to_string()))?
            .to_string();
        let request = ctx.user_message.clone().unwrap_or_default();

        let (day_number, node) = ctx
            .itinerary
            .find_node(&node_id)
            .ok_or_else(|| Error::NotFound(node_id.clone()))?;
        if node.locked {
            return Err(Error::LockedNodeViolation(vec![node_id]));
        }
        let node = node.clone();

        let schema = json!({
            "type": "object",
            "properties": {
                "ops": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "op": {"type": "string", "enum": ["move", "insert", "delete", "replace"]},
                            "id": {"type": "string"},
                            "start_time": {"type": "string"},
                            "end_time": {"type": "string"},
                            "after": {"type": "string"},
                            "day": {"type": "integer"},
                            "content": {
                                "type": "object",
                                "properties": {
                                    "title": {"type": "string"}
                                }
                            }
                        }
                    }
                }
            }
        });
        let messages = vec![
            Message::system(
                "Propose one or more ops (move, insert, delete, replace) for this node. \
                 Omit `id`/`day` to target the node already in context.",
            ),
            Message::user(format!("node={} request={}", node.title, request)),
        ];
        let value = ctx.llm.generate_structured(&messages, &schema).await?;
        let proposed: ProposedChangeSet = serde_json::from_value(value)
            .unwrap_or(ProposedChangeSet { ops: vec![ProposedOp::Move { id: None, start_time: None, end_time: None }] });

        let now = Utc::now();
        let ops: Vec<Op> = proposed
            .ops
            .into_iter()
            .map(|op| to_op(op, &node_id, day_number, &node, now))
            .collect();

        Ok(AgentOutcome::Proposal(ChangeSet::new(Scope::Trip, ops)))
    }
}

fn to_op(proposed: ProposedOp, default_id: &str, default_day: u32, target: &Node, now: chrono::DateTime<Utc>) -> Op {
    match proposed {
        ProposedOp::Move { id, start_time, end_time } => Op::Move {
            id: id.unwrap_or_else(|| default_id.to_string()),
            start_time,
            end_time,
        },
        ProposedOp::Delete { id } => Op::Delete { id: id.unwrap_or_else(|| default_id.to_string()) },
        ProposedOp::Insert { after, day, content } => Op::Insert {
            after,
            day: day.unwrap_or(default_day),
            node: new_node_from_content(content, now),
        },
        ProposedOp::Replace { id, content } => Op::Replace {
            id: id.unwrap_or_else(|| default_id.to_string()),
            node: apply_content(target.clone(), content, now),
        },
    }
}

fn new_node_from_content(content: ProposedContent, now: chrono::DateTime<Utc>) -> Node {
    apply_content(
        Node {
            id: String::new(),
            node_type: NodeType::Attraction,
            title: String::new(),
            location: Location::named(""),
            timing: Timing::default(),
            cost: None,
            details: Default::default(),
            labels: vec![],
            tips: Default::default(),
            links: Default::default(),
            locked: false,
            booking_ref: None,
            status: NodeStatus::Planned,
            updated_by: Author::Agent,
            updated_at: now,
        },
        content,
        now,
    )
}

fn apply_content(mut node: Node, content: ProposedContent, now: chrono::DateTime<Utc>) -> Node {
    if let Some(title) = content.title {
        node.title = title;
    }
    if let Some(location) = content.location {
        node.location = location;
    }
    if let Some(timing) = content.timing {
        node.timing = timing;
    }
    if let Some(cost) = content.cost {
        node.cost = Some(cost);
    }
    node.touch(Author::Agent, now);
    node
}
