//! Shared schema/parsing helpers used by several pipeline agents so each
//! agent file stays focused on its own domain logic rather than repeating
//! JSON-schema boilerplate.
//!
//! Also home to the node-id contract (spec §4.6, §8): every node a
//! population agent returns is ided `day{N}_node{seq}`, continuing the
//! sequence `SkeletonPlannerAgent` laid down as placeholders so a node's id
//! never changes as it moves from placeholder to populated.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::model::{next_node_seq, Author, Cost, CostPer, Location, Node, NodeType, Timing};

/// Marker stored in `Node::details::category` for a skeleton-originated
/// placeholder not yet populated by a phase-2 agent. Never surfaced to a
/// caller past the population phase — every placeholder is expected to be
/// replaced in place before generation finishes.
pub const PLACEHOLDER_CATEGORY: &str = "__placeholder__";

pub fn is_placeholder(node: &Node) -> bool {
    node.details.category.as_deref() == Some(PLACEHOLDER_CATEGORY)
}

/// Builds an unpopulated placeholder `Node` of `node_type` at `id`, the
/// shape `SkeletonPlannerAgent` emits for phase 2 to fill in.
pub fn placeholder_node(id: impl Into<String>, node_type: NodeType, title: impl Into<String>, location: impl Into<String>) -> Node {
    Node {
        id: id.into(),
        node_type,
        title: title.into(),
        location: Location::named(location),
        timing: Timing::default(),
        cost: None,
        details: crate::model::NodeDetails {
            category: Some(PLACEHOLDER_CATEGORY.to_string()),
            ..Default::default()
        },
        labels: vec![],
        tips: Default::default(),
        links: Default::default(),
        locked: false,
        booking_ref: None,
        status: crate::model::NodeStatus::Planned,
        updated_by: Author::Agent,
        updated_at: Utc::now(),
    }
}

/// Schema for the structured shape every pipeline-populated node is
/// requested in: enough for the node list to be useful without forcing the
/// LLM Gateway to reproduce every optional field up front (tips/links are
/// filled in later by `EnrichmentAgent`).
pub fn node_list_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "nodes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string"},
                        "location_name": {"type": "string"},
                        "start_time": {"type": "string"},
                        "duration_min": {"type": "integer"},
                        "cost_amount": {"type": "number"},
                    }
                }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct RawNode {
    title: String,
    location_name: String,
    start_time: String,
    duration_min: u32,
    cost_amount: f64,
}

#[derive(Debug, Deserialize)]
struct RawNodeList {
    nodes: Vec<RawNode>,
}

/// Turns the LLM Gateway's structured response into concrete `Node`s of
/// `node_type`, one per matching placeholder already sitting in
/// `day_nodes` — preserving each placeholder's id rather than minting a
/// new one, per the node-id contract (spec §8: "pipeline preserves
/// skeleton node ids").
///
/// The mock gateway's array synthesis always returns 1-2 items regardless
/// of how many placeholders exist (`llm::mock`), so raw items are cycled
/// to guarantee every placeholder gets populated. When `day_nodes` holds
/// no matching placeholder (a day assembled by hand rather than by
/// `SkeletonPlannerAgent`), fresh ids are minted continuing the day's
/// `day{N}_node{seq}` sequence instead.
pub fn populate_placeholders(value: Value, node_type: NodeType, day_number: u32, day_nodes: &[Node], currency: &str) -> Vec<Node> {
    let raw: RawNodeList = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(_) => return Vec::new(),
    };
    if raw.nodes.is_empty() {
        return Vec::new();
    }

    let placeholder_ids: Vec<String> = day_nodes
        .iter()
        .filter(|n| n.node_type == node_type && is_placeholder(n))
        .map(|n| n.id.clone())
        .collect();

    let ids: Vec<String> = if placeholder_ids.is_empty() {
        let mut seq = next_node_seq(day_number, day_nodes);
        raw.nodes
            .iter()
            .map(|_| {
                let id = format!("day{}_node{}", day_number, seq);
                seq += 1;
                id
            })
            .collect()
    } else {
        placeholder_ids
    };

    ids.into_iter()
        .enumerate()
        .map(|(i, id)| {
            let r = &raw.nodes[i % raw.nodes.len()];
            Node {
                id,
                node_type,
                title: r.title.clone(),
                location: Location::named(r.location_name.clone()),
                timing: Timing {
                    start_time: Some(r.start_time.clone()),
                    end_time: None,
                    duration_min: Some(r.duration_min),
                },
                cost: Some(Cost {
                    amount: r.cost_amount,
                    currency: currency.to_string(),
                    per: CostPer::Person,
                }),
                details: Default::default(),
                labels: vec![],
                tips: Default::default(),
                links: Default::default(),
                locked: false,
                booking_ref: None,
                status: crate::model::NodeStatus::Planned,
                updated_by: Author::Agent,
                updated_at: Utc::now(),
            }
        })
        .collect()
}
