//! Change Engine (spec §4.4): propose/apply/undo over a `ChangeSet`,
//! enforcing lock immunity, edge repair, and pacing/totals recompute, with
//! CAS-based apply against the store.
//!
//! Grounded on `verification.rs`'s staged-validation approach (validate
//! everything before mutating anything) for `propose`/`apply`, and on the
//! teacher's general optimistic-concurrency handling for the CAS retry
//! shape: one retry against the freshly reloaded document, then surface
//! `Contested` rather than retrying indefinitely (spec §4.4: "a second
//! conflict on retry is surfaced to the caller, not retried again").

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::diff::DiffBuilder;
use super::ops::{apply_op, validate_op};
use super::pacing;
use crate::error::{Error, Result};
use crate::event_bus::EventBus;
use crate::model::{Author, ChangeSet, Diff, Itinerary, Op, Revision, Scope};
use crate::store::StoreAdapter;

pub struct ChangeEngine {
    store: Arc<dyn StoreAdapter>,
    event_bus: Arc<EventBus>,
    revisions_retain: usize,
}

impl ChangeEngine {
    pub fn new(store: Arc<dyn StoreAdapter>, event_bus: Arc<EventBus>, revisions_retain: usize) -> Self {
        Self { store, event_bus, revisions_retain }
    }

    /// Validates and applies `change_set` against a snapshot, without
    /// persisting anything — used to preview what an apply would do (spec
    /// §4.4 `propose`). A preview has no caller-supplied author, so touched
    /// nodes are audited as `Author::User` — `propose` only ever previews a
    /// chat-originated, not-yet-applied user edit.
    pub fn propose(&self, itinerary: &Itinerary, change_set: &ChangeSet) -> Result<Diff> {
        let mut working = itinerary.clone();
        self.mutate(&mut working, change_set, Author::User, Utc::now()).map(|(diff, _)| diff)
    }

    /// Validates, mutates, and persists `change_set` against the itinerary
    /// identified by `itinerary_id`, retrying once on a version conflict
    /// before surfacing `Contested`.
    pub async fn apply(
        &self,
        itinerary_id: &str,
        change_set: &ChangeSet,
        author: Author,
    ) -> Result<(Itinerary, Diff)> {
        self.apply_with_retry(itinerary_id, author, |working| {
            self.mutate(working, change_set, author, Utc::now()).map(|(diff, _)| diff)
        })
        .await
    }

    /// Same CAS-retry-then-persist-then-publish sequence as `apply`, but
    /// driven by an arbitrary mutation closure instead of a `ChangeSet` —
    /// for callers that mutate an itinerary in ways no single `Op` can
    /// express (the orchestrator's generation phases replace whole days).
    /// `mutate` is responsible for building the `Diff` it returns; lock
    /// enforcement and edge repair are the caller's problem outside the
    /// `Op` path.
    pub async fn apply_mutation<F>(&self, itinerary_id: &str, author: Author, mutate: F) -> Result<(Itinerary, Diff)>
    where
        F: Fn(&mut Itinerary) -> Result<Diff> + Send + Sync,
    {
        self.apply_with_retry(itinerary_id, author, mutate).await
    }

    async fn apply_with_retry<F>(&self, itinerary_id: &str, author: Author, mutate: F) -> Result<(Itinerary, Diff)>
    where
        F: Fn(&mut Itinerary) -> Result<Diff>,
    {
        match self.try_apply_once(itinerary_id, author, &mutate).await {
            Ok(result) => Ok(result),
            Err(Error::VersionConflict { .. }) => {
                warn!(itinerary_id, "version conflict on apply, retrying once");
                match self.try_apply_once(itinerary_id, author, &mutate).await {
                    Ok(result) => Ok(result),
                    Err(Error::VersionConflict { .. }) => Err(Error::Contested(itinerary_id.to_string())),
                    Err(other) => Err(other),
                }
            }
            Err(other) => Err(other),
        }
    }

    async fn try_apply_once<F>(&self, itinerary_id: &str, author: Author, mutate: &F) -> Result<(Itinerary, Diff)>
    where
        F: Fn(&mut Itinerary) -> Result<Diff>,
    {
        let current = self
            .store
            .get_itinerary(itinerary_id)
            .await?
            .ok_or_else(|| Error::NotFound(itinerary_id.to_string()))?;
        let expected_version = current.version;

        let mut working = current.clone();
        let diff = mutate(&mut working)?;
        working.version = expected_version + 1;
        working.updated_at = Utc::now();

        self.store.put_itinerary(&working, Some(expected_version)).await?;

        // The revision at version V must equal `get(id)` immediately after
        // this apply (spec §8) — snapshot the post-apply `working` state at
        // its new version, not the pre-apply `current` one.
        self.store
            .put_revision(Revision::of(working.clone(), author, Utc::now()), self.revisions_retain)
            .await?;

        let event_itinerary_id = itinerary_id.to_string();
        let event_diff = diff.clone();
        let new_version = working.version;
        self.event_bus
            .publish(&event_itinerary_id, |seq| {
                crate::event_bus::Event::Patch(crate::event_bus::PatchEvent::new(
                    event_itinerary_id.clone(),
                    seq,
                    new_version,
                    event_diff.clone(),
                ))
            })
            .await;

        info!(itinerary_id, version = working.version, "change set applied");
        Ok((working, diff))
    }

    /// Restores an itinerary's content to an earlier revision's snapshot
    /// while still bumping `version` forward by one from `current` —
    /// content can regress, `version` itself never does (spec §3, §4.4:
    /// undo "bumps version from current").
    pub async fn undo(&self, itinerary_id: &str, target_version: u64, author: Author) -> Result<Itinerary> {
        let current = self
            .store
            .get_itinerary(itinerary_id)
            .await?
            .ok_or_else(|| Error::NotFound(itinerary_id.to_string()))?;
        let revision = self
            .store
            .get_revision(itinerary_id, target_version)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{}@v{}", itinerary_id, target_version)))?;

        let mut restored = revision.snapshot;
        restored.version = current.version + 1;
        restored.updated_at = Utc::now();

        self.store.put_itinerary(&restored, Some(current.version)).await?;
        // Same rule as `try_apply_once`: the revision at the new version
        // must equal the post-undo state, not the state being undone from.
        self.store
            .put_revision(Revision::of(restored.clone(), author, Utc::now()), self.revisions_retain)
            .await?;

        let diff = Diff::default();
        let itinerary_id_owned = itinerary_id.to_string();
        let restored_version = restored.version;
        self.event_bus
            .publish(&itinerary_id_owned, |seq| {
                crate::event_bus::Event::Patch(crate::event_bus::PatchEvent::new(
                    itinerary_id_owned.clone(),
                    seq,
                    restored_version,
                    diff.clone(),
                ))
            })
            .await;

        Ok(restored)
    }

    /// Validates every op in `change_set` against the days it targets, then
    /// applies them in order, recomputing totals/pacing for every touched
    /// day. Aborts on the first invalid op without partially mutating
    /// `itinerary` (spec §4.4: invalid change sets fail atomically). Every
    /// touched node is stamped with `author`/`now` (rule 6), and any
    /// `HH:mm` timing introduced by an op is expanded against its day's
    /// `date` (rule 3).
    fn mutate(&self, itinerary: &mut Itinerary, change_set: &ChangeSet, author: Author, now: chrono::DateTime<Utc>) -> Result<(Diff, usize)> {
        // Inserted nodes without an id get one, continuing the target
        // day's `day{N}_node{seq}` sequence, before any validation runs
        // (spec §4.4 rule 4).
        let mut ops = change_set.ops.clone();
        let mut next_seq: std::collections::HashMap<u32, u32> = std::collections::HashMap::new();
        for op in &mut ops {
            if let Op::Insert { day: target_day, node, .. } = op {
                if node.id.is_empty() {
                    let seq = next_seq
                        .entry(*target_day)
                        .or_insert_with(|| itinerary.day(*target_day).map(|d| d.next_node_seq()).unwrap_or(1));
                    node.id = format!("day{}_node{}", target_day, seq);
                    *seq += 1;
                }
            }
        }

        // A `Move` relocates across days when `change_set.day` names a
        // target day other than the node's current one (spec §3: "move ...
        // or move to another day by setting a time on the target day").
        let mut day_numbers = Vec::with_capacity(ops.len());
        let mut relocations: Vec<Option<u32>> = Vec::with_capacity(ops.len());
        for (index, op) in ops.iter().enumerate() {
            let day_number = self.op_day_number(itinerary, change_set, op, index)?;
            let day = itinerary
                .day(day_number)
                .ok_or_else(|| Error::InvalidChangeSet { op_index: index, reason: format!("day {} not found", day_number) })?;
            validate_op(day, op, change_set.respects_locks()).map_err(|e| reindex(e, index))?;

            let relocation = match (op, change_set.day) {
                (Op::Move { .. }, Some(target_day)) if target_day != day_number => {
                    itinerary.day(target_day).ok_or_else(|| Error::InvalidChangeSet {
                        op_index: index,
                        reason: format!("day {} not found", target_day),
                    })?;
                    Some(target_day)
                }
                _ => None,
            };

            day_numbers.push(day_number);
            relocations.push(relocation);
        }

        let mut builder = DiffBuilder::default();
        let mut touched_days = std::collections::HashSet::new();

        for ((op, day_number), relocation) in ops.into_iter().zip(day_numbers).zip(relocations) {
            match (op, relocation) {
                (Op::Move { id, start_time, end_time }, Some(target_day)) => {
                    if let Some((source, target)) = two_days_mut(itinerary, day_number, target_day) {
                        let (removed, added) = super::ops::relocate_node(source, target, &id, start_time, end_time, author, now);
                        builder.record(day_number, removed);
                        builder.record(target_day, added);
                        touched_days.insert(day_number);
                        touched_days.insert(target_day);
                    }
                }
                (op, _) => {
                    if let Some(day) = itinerary.day_mut(day_number) {
                        let effect = apply_op(day, op, author, now);
                        builder.record(day_number, effect);
                        touched_days.insert(day_number);
                    }
                }
            }
        }

        for day_number in &touched_days {
            if let Some(day) = itinerary.day_mut(*day_number) {
                pacing::recompute(day);
            }
        }

        Ok((builder.build(), touched_days.len()))
    }

    fn op_day_number(&self, itinerary: &Itinerary, change_set: &ChangeSet, op: &Op, index: usize) -> Result<u32> {
        match op {
            Op::Insert { day, .. } => Ok(*day),
            other => {
                let id = other
                    .target_id()
                    .ok_or_else(|| Error::InvalidChangeSet { op_index: index, reason: "op has no target id".to_string() })?;
                itinerary
                    .find_node(id)
                    .map(|(day_number, _)| day_number)
                    .or(change_set.day)
                    .ok_or_else(|| Error::InvalidChangeSet { op_index: index, reason: format!("node {} not found", id) })
            }
        }
    }
}

/// Mutable references to two distinct days by day number, in the order
/// requested rather than their physical position in `itinerary.days` —
/// lets a cross-day `Move` mutate its source and target day at once
/// without fighting the borrow checker over a single `Vec<Day>`.
fn two_days_mut(itinerary: &mut Itinerary, a: u32, b: u32) -> Option<(&mut crate::model::Day, &mut crate::model::Day)> {
    let idx_a = itinerary.days.iter().position(|d| d.day_number == a)?;
    let idx_b = itinerary.days.iter().position(|d| d.day_number == b)?;
    if idx_a == idx_b {
        return None;
    }
    if idx_a < idx_b {
        let (left, right) = itinerary.days.split_at_mut(idx_b);
        Some((&mut left[idx_a], &mut right[0]))
    } else {
        let (left, right) = itinerary.days.split_at_mut(idx_a);
        Some((&mut right[0], &mut left[idx_b]))
    }
}

fn reindex(err: Error, index: usize) -> Error {
    match err {
        Error::InvalidChangeSet { reason, .. } => Error::InvalidChangeSet { op_index: index, reason },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cost, CostPer, Location, Node, NodeStatus, NodeType, Timing};
    use crate::store::InMemoryStore;

    fn sample_node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            node_type: NodeType::Attraction,
            title: id.to_string(),
            location: Location::named("x"),
            timing: Timing { start_time: Some("09:00".to_string()), end_time: Some("10:00".to_string()), duration_min: Some(60) },
            cost: Some(Cost { amount: 10.0, currency: "USD".to_string(), per: CostPer::Person }),
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

    async fn seeded_engine() -> (ChangeEngine, Arc<InMemoryStore>, Itinerary) {
        let store = Arc::new(InMemoryStore::new());
        let event_bus = Arc::new(EventBus::new());
        let mut itinerary = Itinerary::new("it_1", "user_1", "USD", Utc::now());
        let mut day = crate::model::Day::new(1);
        day.nodes.push(sample_node("day1_node1"));
        itinerary.days.push(day);
        store.put_itinerary(&itinerary, None).await.unwrap();
        let engine = ChangeEngine::new(store.clone(), event_bus, 50);
        (engine, store, itinerary)
    }

    #[tokio::test]
    async fn apply_bumps_version_and_persists() {
        let (engine, store, itinerary) = seeded_engine().await;
        let change_set = ChangeSet::new(
            Scope::Day,
            vec![Op::Move {
                id: "day1_node1".to_string(),
                start_time: Some("11:00".to_string()),
                end_time: None,
            }],
        );
        let (updated, diff) = engine.apply(&itinerary.id, &change_set, Author::User).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(diff.updated.len(), 1);

        let stored = store.get_itinerary(&itinerary.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn revision_at_the_new_version_matches_the_state_returned_by_get() {
        let (engine, store, itinerary) = seeded_engine().await;
        let change_set = ChangeSet::new(
            Scope::Day,
            vec![Op::Move {
                id: "day1_node1".to_string(),
                start_time: Some("11:00".to_string()),
                end_time: None,
            }],
        );
        let (updated, _) = engine.apply(&itinerary.id, &change_set, Author::User).await.unwrap();

        let fetched = store.get_itinerary(&itinerary.id).await.unwrap().unwrap();
        let revision = store.get_revision(&itinerary.id, updated.version).await.unwrap().unwrap();
        assert_eq!(revision.snapshot, fetched);
        assert_eq!(revision.version, updated.version);
    }

    #[tokio::test]
    async fn apply_assigns_an_id_to_an_inserted_node_that_has_none() {
        let (engine, store, itinerary) = seeded_engine().await;
        let mut node = sample_node("");
        node.id = String::new();
        let change_set = ChangeSet::new(Scope::Day, vec![Op::Insert { after: None, day: 1, node }]);
        let (updated, diff) = engine.apply(&itinerary.id, &change_set, Author::User).await.unwrap();
        assert_eq!(diff.added.len(), 1);
        assert_eq!(updated.days[0].nodes[1].id, "day1_node2");

        let stored = store.get_itinerary(&itinerary.id).await.unwrap().unwrap();
        assert_eq!(stored.days[0].nodes[1].id, "day1_node2");
    }

    #[tokio::test]
    async fn apply_rejects_ops_on_locked_nodes() {
        let (engine, _store, mut itinerary) = seeded_engine().await;
        itinerary.days[0].nodes[0].locked = true;
        let change_set = ChangeSet::new(Scope::Day, vec![Op::Delete { id: "day1_node1".to_string() }]);
        let err = engine.mutate(&mut itinerary.clone(), &change_set, Author::User, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::LockedNodeViolation(_)));
    }

    #[tokio::test]
    async fn propose_does_not_persist_changes() {
        let (engine, store, itinerary) = seeded_engine().await;
        let change_set = ChangeSet::new(Scope::Day, vec![Op::Delete { id: "day1_node1".to_string() }]);
        let diff = engine.propose(&itinerary, &change_set).unwrap();
        assert_eq!(diff.removed.len(), 1);
        let stored = store.get_itinerary(&itinerary.id).await.unwrap().unwrap();
        assert_eq!(stored.days[0].nodes.len(), 1);
    }

    #[tokio::test]
    async fn undo_restores_an_earlier_revision_and_bumps_version_forward() {
        let (engine, store, itinerary) = seeded_engine().await;
        let change_set = ChangeSet::new(Scope::Day, vec![Op::Delete { id: "day1_node1".to_string() }]);
        let (applied, _) = engine.apply(&itinerary.id, &change_set, Author::User).await.unwrap();
        assert_eq!(applied.version, 2);

        let restored = engine.undo(&itinerary.id, 1, Author::User).await.unwrap();
        assert_eq!(restored.days[0].nodes.len(), 1);
        assert_eq!(restored.version, 3);

        let stored = store.get_itinerary(&itinerary.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 3);
    }

    #[tokio::test]
    async fn move_into_an_empty_day_relocates_the_node_with_no_edge_patch() {
        let store = Arc::new(InMemoryStore::new());
        let event_bus = Arc::new(EventBus::new());
        let mut itinerary = Itinerary::new("it_2", "user_1", "USD", Utc::now());
        let mut day1 = crate::model::Day::new(1);
        day1.nodes.push(sample_node("day1_node1"));
        itinerary.days.push(day1);
        itinerary.days.push(crate::model::Day::new(2));
        store.put_itinerary(&itinerary, None).await.unwrap();
        let engine = ChangeEngine::new(store.clone(), event_bus, 50);

        let mut change_set = ChangeSet::new(
            Scope::Day,
            vec![Op::Move {
                id: "day1_node1".to_string(),
                start_time: Some("09:00".to_string()),
                end_time: None,
            }],
        );
        change_set.day = Some(2);

        let (updated, diff) = engine.apply(&itinerary.id, &change_set, Author::User).await.unwrap();
        assert!(updated.days[0].nodes.is_empty());
        assert_eq!(updated.days[1].nodes.len(), 1);
        assert_eq!(updated.days[1].nodes[0].id, "day1_node1");
        assert!(updated.days[1].edges.is_empty());
        assert_eq!(diff.removed, vec![crate::model::NodeRef { id: "day1_node1".to_string(), day: 1 }]);
        assert_eq!(diff.added, vec![crate::model::NodeRef { id: "day1_node1".to_string(), day: 2 }]);
    }
}
