//! `ChangeSet`/`Op` — the batch-mutation contract the change engine accepts
//! (spec §3, §4.4), and `Diff` — what actually changed after an apply.

use serde::{Deserialize, Serialize};

use super::node::Node;

/// Whether a change set applies trip-wide or to a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Trip,
    Day,
}

/// Per-request hints that modulate how the change engine and agents behave,
/// not part of the itinerary document itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub user_first: Option<bool>,
    #[serde(default)]
    pub auto_apply: Option<bool>,
    #[serde(default)]
    pub respect_locks: Option<bool>,
}

/// A single mutation within a `ChangeSet`. Locked nodes reject `Move`,
/// `Delete`, and `Replace` (spec §3 Node invariant); `Insert` never touches
/// an existing node so it is always permitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Move {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        start_time: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_time: Option<String>,
    },
    Insert {
        #[serde(skip_serializing_if = "Option::is_none")]
        after: Option<String>,
        day: u32,
        node: Node,
    },
    Delete {
        id: String,
    },
    Replace {
        id: String,
        node: Node,
    },
}

impl Op {
    /// The node id this op targets, for lock-enforcement and ordering
    /// purposes. `Insert` has no pre-existing target.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Op::Move { id, .. } => Some(id),
            Op::Insert { .. } => None,
            Op::Delete { id } => Some(id),
            Op::Replace { id, .. } => Some(id),
        }
    }

    pub fn requires_unlocked_target(&self) -> bool {
        !matches!(self, Op::Insert { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    pub ops: Vec<Op>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl ChangeSet {
    pub fn new(scope: Scope, ops: Vec<Op>) -> Self {
        Self {
            scope,
            day: None,
            ops,
            preferences: Preferences::default(),
        }
    }

    pub fn respects_locks(&self) -> bool {
        self.preferences.respect_locks.unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffUpdate {
    pub id: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    #[serde(default)]
    pub added: Vec<NodeRef>,
    #[serde(default)]
    pub removed: Vec<NodeRef>,
    #[serde(default)]
    pub updated: Vec<DiffUpdate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: String,
    pub day: u32,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::itinerary::Author;
    use crate::model::node::{Location, NodeStatus, NodeType, Timing};
    use chrono::Utc;

    fn sample_node() -> Node {
        Node {
            id: "day1_node_new".to_string(),
            node_type: NodeType::Attraction,
            title: "New Stop".to_string(),
            location: Location::named("Somewhere"),
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
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn insert_does_not_require_unlocked_target() {
        let op = Op::Insert {
            after: None,
            day: 1,
            node: sample_node(),
        };
        assert!(!op.requires_unlocked_target());
        assert_eq!(op.target_id(), None);
    }

    #[test]
    fn move_requires_unlocked_target_and_reports_id() {
        let op = Op::Move {
            id: "day1_node1".to_string(),
            start_time: Some("09:00".to_string()),
            end_time: None,
        };
        assert!(op.requires_unlocked_target());
        assert_eq!(op.target_id(), Some("day1_node1"));
    }

    #[test]
    fn change_set_respects_locks_by_default() {
        let cs = ChangeSet::new(Scope::Day, vec![]);
        assert!(cs.respects_locks());
    }

    #[test]
    fn diff_is_empty_when_all_lists_empty() {
        assert!(Diff::default().is_empty());
    }
}
