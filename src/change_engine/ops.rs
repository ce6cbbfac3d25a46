//! Validation and application of individual `Op`s against a `Day` (spec
//! §4.4).
//!
//! Grounded on `verification.rs`'s ordered-rule-checking structure: each op
//! is checked against a fixed sequence of invariants before any mutation is
//! applied, so a single malformed op in a batch fails fast with the
//! offending index (spec §4.4 rule: an invalid op aborts the whole apply).

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{Author, Day, Op};

/// Validates `op` against `day` without mutating it. Returns the reason
/// string `InvalidChangeSet` should carry if invalid.
pub fn validate_op(day: &Day, op: &Op, respect_locks: bool) -> Result<()> {
    match op {
        Op::Move { id, start_time, end_time } => {
            let node = day.node(id).ok_or_else(|| invalid(format!("node {} not found", id)))?;
            if respect_locks && node.locked {
                return Err(Error::LockedNodeViolation(vec![id.clone()]));
            }
            if start_time.is_none() && end_time.is_none() {
                return Err(invalid("move requires at least one of start_time/end_time".to_string()));
            }
            Ok(())
        }
        Op::Insert { after, day: target_day, node } => {
            if *target_day != day.day_number {
                return Err(invalid(format!(
                    "insert targets day {} but is being applied to day {}",
                    target_day, day.day_number
                )));
            }
            if day.contains_node(&node.id) {
                return Err(invalid(format!("node {} already exists", node.id)));
            }
            if let Some(after_id) = after {
                if !day.contains_node(after_id) {
                    return Err(invalid(format!("insert after unknown node {}", after_id)));
                }
            }
            Ok(())
        }
        Op::Delete { id } => {
            let node = day.node(id).ok_or_else(|| invalid(format!("node {} not found", id)))?;
            if respect_locks && node.locked {
                return Err(Error::LockedNodeViolation(vec![id.clone()]));
            }
            Ok(())
        }
        Op::Replace { id, node: replacement } => {
            let existing = day.node(id).ok_or_else(|| invalid(format!("node {} not found", id)))?;
            if respect_locks && existing.locked {
                return Err(Error::LockedNodeViolation(vec![id.clone()]));
            }
            if replacement.id != *id && day.contains_node(&replacement.id) {
                return Err(invalid(format!(
                    "replace would collide with existing node {}",
                    replacement.id
                )));
            }
            Ok(())
        }
    }
}

/// Applies `op` to `day`, which must have already passed `validate_op`.
/// Returns the ids added/removed/updated (with the field names that
/// actually changed, for `Diff` construction). `author`/`now` are stamped
/// onto every node the op touches (spec §4.4 rule 6: audit), and any
/// `HH:mm` timing the op introduces is expanded to full ISO-8601 against
/// `day.date` (spec §4.4 rule 3: time normalization).
pub fn apply_op(day: &mut Day, op: Op, author: Author, now: DateTime<Utc>) -> OpEffect {
    let date = day.date.clone();
    match op {
        Op::Move { id, start_time, end_time } => {
            let mut fields = Vec::new();
            if let Some(node) = day.node_mut(&id) {
                if let Some(start) = start_time {
                    node.timing.start_time = Some(normalize_time(date.as_deref(), &start));
                    fields.push("timing".to_string());
                }
                if let Some(end) = end_time {
                    node.timing.end_time = Some(normalize_time(date.as_deref(), &end));
                    if !fields.iter().any(|f| f == "timing") {
                        fields.push("timing".to_string());
                    }
                }
                if !fields.is_empty() {
                    node.touch(author, now);
                }
            }
            OpEffect {
                updated: vec![(id, fields)],
                ..Default::default()
            }
        }
        Op::Insert { after, mut node, .. } => {
            normalize_timing(date.as_deref(), &mut node.timing);
            node.touch(author, now);
            let id = node.id.clone();
            let position = after
                .as_ref()
                .and_then(|after_id| day.nodes.iter().position(|n| &n.id == after_id))
                .map(|idx| idx + 1)
                .unwrap_or(day.nodes.len());
            let predecessor = if position == 0 { None } else { Some(day.nodes[position - 1].id.clone()) };
            day.nodes.insert(position, node);
            repair_edges_after_insert(day, predecessor.as_deref(), &id);
            OpEffect {
                added: vec![id],
                ..Default::default()
            }
        }
        Op::Delete { id } => {
            day.nodes.retain(|n| n.id != id);
            repair_edges_after_delete(day, &id);
            OpEffect {
                removed: vec![id],
                ..Default::default()
            }
        }
        Op::Replace { id, mut node } => {
            normalize_timing(date.as_deref(), &mut node.timing);
            node.touch(author, now);
            let new_id = node.id.clone();
            let mut fields = Vec::new();
            if let Some(existing) = day.nodes.iter_mut().find(|n| n.id == id) {
                fields = changed_fields(existing, &node);
                *existing = node;
            }
            if new_id != id {
                for edge in &mut day.edges {
                    if edge.from == id {
                        edge.from = new_id.clone();
                    }
                    if edge.to == id {
                        edge.to = new_id.clone();
                    }
                }
            }
            OpEffect {
                updated: vec![(new_id, fields)],
                ..Default::default()
            }
        }
    }
}

/// Expands `value` from `HH:mm` to `{date}T{HH:mm}:00` when `date` is
/// known; anything already ISO-8601 (or any other shape) passes through
/// unchanged, and a day with no `date` yet leaves `HH:mm` as-is since
/// there is nothing to key the expansion off (spec §4.4 rule 3).
fn normalize_time(date: Option<&str>, value: &str) -> String {
    match date {
        Some(date) if is_hhmm(value) => format!("{}T{}:00", date, value),
        _ => value.to_string(),
    }
}

fn normalize_timing(date: Option<&str>, timing: &mut crate::model::Timing) {
    if let Some(start) = timing.start_time.take() {
        timing.start_time = Some(normalize_time(date, &start));
    }
    if let Some(end) = timing.end_time.take() {
        timing.end_time = Some(normalize_time(date, &end));
    }
}

fn is_hhmm(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 5
        && bytes[2] == b':'
        && bytes[..2].iter().all(u8::is_ascii_digit)
        && bytes[3..].iter().all(u8::is_ascii_digit)
}

/// Names of the `Node` fields that differ between `old` and `new`, in a
/// fixed check order, for `Diff.updated[].fields` (spec §3 Diff shape).
/// Booking-style updates (lock + label + ref) lead the order since they're
/// the most common agent-driven replace; everything else follows.
pub(crate) fn changed_fields(old: &crate::model::Node, new: &crate::model::Node) -> Vec<String> {
    let mut fields = Vec::new();
    if old.locked != new.locked {
        fields.push("locked".to_string());
    }
    if old.labels != new.labels {
        fields.push("labels".to_string());
    }
    if old.booking_ref != new.booking_ref {
        fields.push("bookingRef".to_string());
    }
    if old.title != new.title {
        fields.push("title".to_string());
    }
    if old.location != new.location {
        fields.push("location".to_string());
    }
    if old.timing != new.timing {
        fields.push("timing".to_string());
    }
    if old.cost != new.cost {
        fields.push("cost".to_string());
    }
    if old.details != new.details {
        fields.push("details".to_string());
    }
    if old.tips != new.tips {
        fields.push("tips".to_string());
    }
    if old.links != new.links {
        fields.push("links".to_string());
    }
    if old.status != new.status {
        fields.push("status".to_string());
    }
    fields
}

/// Removes edges that referenced the deleted node and, when the node sat
/// between two others, re-links its predecessor to its successor so the
/// day's edge chain stays connected (spec §4.4 "edge repair").
fn repair_edges_after_delete(day: &mut Day, deleted_id: &str) {
    let predecessor = day.edges.iter().find(|e| e.to == deleted_id).map(|e| e.from.clone());
    let successor = day.edges.iter().find(|e| e.from == deleted_id).map(|e| e.to.clone());

    day.edges.retain(|e| e.from != deleted_id && e.to != deleted_id);

    if let (Some(from), Some(to)) = (predecessor, successor) {
        day.edges.push(crate::model::Edge {
            from,
            to,
            transit: crate::model::Transit::default(),
        });
    }
}

/// Inserts a single edge from `predecessor` to `new_id` when a node was
/// placed immediately after `predecessor`, re-linking `new_id` to
/// `predecessor`'s former successor so the chain doesn't break (spec §4.4
/// rule 5: "a single edge is inserted after `after`"). No-op when there is
/// no predecessor (node inserted at the front of an empty day).
fn repair_edges_after_insert(day: &mut Day, predecessor: Option<&str>, new_id: &str) {
    if let Some(pred) = predecessor {
        if let Some(edge) = day.edges.iter_mut().find(|e| e.from == pred) {
            let old_successor = std::mem::replace(&mut edge.to, new_id.to_string());
            day.edges.push(crate::model::Edge {
                from: new_id.to_string(),
                to: old_successor,
                transit: crate::model::Transit::default(),
            });
        } else {
            day.edges.push(crate::model::Edge {
                from: pred.to_string(),
                to: new_id.to_string(),
                transit: crate::model::Transit::default(),
            });
        }
    }
}

/// Relocates `id` from `source` into `target` (spec §3 "move ... to
/// another day by setting a time on the target day"), appending it at the
/// end and optionally retiming it, then repairs edges in both days (spec
/// §4.4 rule 5: "On move across days, edges are adjusted in both"). A
/// move into a day with no existing nodes yields no new edge. Any `HH:mm`
/// retiming is expanded against `target.date` (spec §4.4 rule 3), and the
/// node is stamped with `author`/`now` (spec §4.4 rule 6).
pub fn relocate_node(
    source: &mut Day,
    target: &mut Day,
    id: &str,
    start_time: Option<String>,
    end_time: Option<String>,
    author: Author,
    now: DateTime<Utc>,
) -> (OpEffect, OpEffect) {
    let position = match source.nodes.iter().position(|n| n.id == id) {
        Some(idx) => idx,
        None => return (OpEffect::default(), OpEffect::default()),
    };
    let mut node = source.nodes.remove(position);
    repair_edges_after_delete(source, id);

    let date = target.date.clone();
    if let Some(start) = start_time {
        node.timing.start_time = Some(normalize_time(date.as_deref(), &start));
    }
    if let Some(end) = end_time {
        node.timing.end_time = Some(normalize_time(date.as_deref(), &end));
    }
    node.touch(author, now);

    let predecessor = target.nodes.last().map(|n| n.id.clone());
    target.nodes.push(node);
    repair_edges_after_insert(target, predecessor.as_deref(), id);

    (
        OpEffect { removed: vec![id.to_string()], ..Default::default() },
        OpEffect { added: vec![id.to_string()], ..Default::default() },
    )
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct OpEffect {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<(String, Vec<String>)>,
}

fn invalid(reason: String) -> Error {
    // op_index is filled in by the caller, which knows the position within
    // the batch; this constructs a placeholder the engine overwrites.
    Error::InvalidChangeSet { op_index: usize::MAX, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Author, Cost, CostPer, Location, NodeStatus, NodeType, Timing};
    use chrono::Utc;

    fn node(id: &str, locked: bool) -> crate::model::Node {
        crate::model::Node {
            id: id.to_string(),
            node_type: NodeType::Attraction,
            title: id.to_string(),
            location: Location::named("x"),
            timing: Timing::default(),
            cost: Some(Cost { amount: 10.0, currency: "USD".to_string(), per: CostPer::Person }),
            details: Default::default(),
            labels: vec![],
            tips: Default::default(),
            links: Default::default(),
            locked,
            booking_ref: None,
            status: NodeStatus::Planned,
            updated_by: Author::Agent,
            updated_at: Utc::now(),
        }
    }

    fn day_with(nodes: Vec<crate::model::Node>) -> Day {
        let mut day = Day::new(1);
        let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        day.nodes = nodes;
        for w in ids.windows(2) {
            day.edges.push(crate::model::Edge {
                from: w[0].clone(),
                to: w[1].clone(),
                transit: crate::model::Transit::default(),
            });
        }
        day
    }

    #[test]
    fn move_on_locked_node_is_rejected() {
        let day = day_with(vec![node("n1", true)]);
        let op = Op::Move { id: "n1".to_string(), start_time: Some("10:00".to_string()), end_time: None };
        let err = validate_op(&day, &op, true).unwrap_err();
        assert!(matches!(err, Error::LockedNodeViolation(ids) if ids == vec!["n1".to_string()]));
    }

    #[test]
    fn respect_locks_false_permits_locked_mutation() {
        let day = day_with(vec![node("n1", true)]);
        let op = Op::Delete { id: "n1".to_string() };
        assert!(validate_op(&day, &op, false).is_ok());
    }

    #[test]
    fn delete_repairs_edges_across_the_removed_node() {
        let mut day = day_with(vec![node("n1", false), node("n2", false), node("n3", false)]);
        apply_op(&mut day, Op::Delete { id: "n2".to_string() }, Author::User, Utc::now());
        assert_eq!(day.edges.len(), 1);
        assert_eq!(day.edges[0].from, "n1");
        assert_eq!(day.edges[0].to, "n3");
    }

    #[test]
    fn insert_after_unknown_node_is_invalid() {
        let day = day_with(vec![node("n1", false)]);
        let op = Op::Insert { after: Some("ghost".to_string()), day: 1, node: node("n2", false) };
        assert!(validate_op(&day, &op, true).is_err());
    }

    #[test]
    fn insert_after_a_node_splices_a_single_edge_in_and_relinks_the_former_successor() {
        let mut day = day_with(vec![node("n1", false), node("n3", false)]);
        apply_op(&mut day, Op::Insert { after: Some("n1".to_string()), day: 1, node: node("n2", false) }, Author::User, Utc::now());
        assert_eq!(day.nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>(), vec!["n1", "n2", "n3"]);
        assert_eq!(day.edges.len(), 2);
        assert!(day.edges.iter().any(|e| e.from == "n1" && e.to == "n2"));
        assert!(day.edges.iter().any(|e| e.from == "n2" && e.to == "n3"));
    }

    #[test]
    fn insert_appended_to_the_end_links_from_the_former_last_node() {
        let mut day = day_with(vec![node("n1", false)]);
        apply_op(&mut day, Op::Insert { after: None, day: 1, node: node("n2", false) }, Author::User, Utc::now());
        assert_eq!(day.edges.len(), 1);
        assert_eq!(day.edges[0].from, "n1");
        assert_eq!(day.edges[0].to, "n2");
    }

    #[test]
    fn move_expands_hhmm_against_the_days_date_and_touches_the_node() {
        let mut day = day_with(vec![node("n1", false)]);
        day.date = Some("2026-01-24".to_string());
        let op = Op::Move { id: "n1".to_string(), start_time: Some("11:00".to_string()), end_time: None };
        apply_op(&mut day, op, Author::User, Utc::now());
        let n1 = day.node("n1").unwrap();
        assert_eq!(n1.timing.start_time, Some("2026-01-24T11:00:00".to_string()));
        assert_eq!(n1.updated_by, Author::User);
    }

    #[test]
    fn move_leaves_already_iso_times_untouched() {
        let mut day = day_with(vec![node("n1", false)]);
        day.date = Some("2026-01-24".to_string());
        let op = Op::Move {
            id: "n1".to_string(),
            start_time: Some("2026-01-24T11:00:00".to_string()),
            end_time: None,
        };
        apply_op(&mut day, op, Author::User, Utc::now());
        assert_eq!(day.node("n1").unwrap().timing.start_time, Some("2026-01-24T11:00:00".to_string()));
    }

    #[test]
    fn insert_normalizes_hhmm_timing_on_the_new_node() {
        let mut day = day_with(vec![]);
        day.date = Some("2026-01-24".to_string());
        let mut inserted = node("n1", false);
        inserted.timing.start_time = Some("08:30".to_string());
        apply_op(&mut day, Op::Insert { after: None, day: 1, node: inserted }, Author::Agent, Utc::now());
        assert_eq!(day.node("n1").unwrap().timing.start_time, Some("2026-01-24T08:30:00".to_string()));
    }

    #[test]
    fn relocate_node_moves_it_into_an_empty_day_with_no_new_edge() {
        let mut source = day_with(vec![node("n1", false)]);
        let mut target = Day::new(2);
        let (removed, added) = relocate_node(&mut source, &mut target, "n1", Some("09:00".to_string()), None, Author::User, Utc::now());
        assert!(source.nodes.is_empty());
        assert!(source.edges.is_empty());
        assert_eq!(target.nodes.len(), 1);
        assert!(target.edges.is_empty());
        assert_eq!(target.nodes[0].timing.start_time, Some("09:00".to_string()));
        assert_eq!(removed.removed, vec!["n1".to_string()]);
        assert_eq!(added.added, vec!["n1".to_string()]);
    }

    #[test]
    fn relocate_node_expands_hhmm_against_the_target_days_date() {
        let mut source = day_with(vec![node("n1", false)]);
        let mut target = Day::new(2);
        target.date = Some("2026-01-25".to_string());
        relocate_node(&mut source, &mut target, "n1", Some("09:00".to_string()), None, Author::User, Utc::now());
        assert_eq!(target.nodes[0].timing.start_time, Some("2026-01-25T09:00:00".to_string()));
        assert_eq!(target.nodes[0].updated_by, Author::User);
    }

    #[test]
    fn relocate_node_into_a_day_with_nodes_links_from_the_former_last_node() {
        let mut source = day_with(vec![node("n1", false)]);
        let mut target = day_with(vec![node("n3", false)]);
        relocate_node(&mut source, &mut target, "n1", None, None, Author::Agent, Utc::now());
        assert!(source.nodes.is_empty());
        assert_eq!(target.nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>(), vec!["n3", "n1"]);
        assert_eq!(target.edges.len(), 1);
        assert_eq!(target.edges[0].from, "n3");
        assert_eq!(target.edges[0].to, "n1");
    }
}
