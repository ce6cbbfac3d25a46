//! Store Adapter (spec §4.1) — the persistence boundary the rest of the
//! crate is written against. This crate is never the production remote
//! store itself (that is an opaque KV+subcollection service, out of scope);
//! `in_memory` and `sqlite` here are reference implementations / test
//! doubles behind the same `StoreAdapter` trait.

mod in_memory;
mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Itinerary, Revision, Task, TaskStatus, TripMetadata};

/// Persistence boundary for itineraries, revisions, trip metadata, and
/// tasks. All mutation goes through compare-and-swap on `Itinerary::version`
/// so concurrent applies are detected rather than silently lost (spec §4.1,
/// §4.4).
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    async fn get_itinerary(&self, id: &str) -> Result<Option<Itinerary>>;

    /// Create or replace an itinerary, enforcing that `expected_version`
    /// matches the currently stored version (`None` expected version means
    /// "must not already exist"). Returns the stored document's new version
    /// on success.
    async fn put_itinerary(&self, itinerary: &Itinerary, expected_version: Option<u64>) -> Result<u64>;

    async fn put_revision(&self, revision: Revision, retain: usize) -> Result<()>;

    async fn list_revisions(&self, itinerary_id: &str) -> Result<Vec<Revision>>;

    async fn get_revision(&self, itinerary_id: &str, version: u64) -> Result<Option<Revision>>;

    async fn put_trip_metadata(&self, metadata: TripMetadata) -> Result<()>;

    async fn list_trip_metadata(&self, owner: &str) -> Result<Vec<TripMetadata>>;

    async fn update_trip_status(&self, itinerary_id: &str, status: &str) -> Result<()>;

    async fn create_task(&self, task: Task) -> Result<()>;

    async fn get_task(&self, id: &str) -> Result<Option<Task>>;

    async fn update_task(&self, task: Task) -> Result<()>;

    /// Looks up a task by its caller-supplied idempotency key, so a
    /// duplicate submission returns the existing task id instead of
    /// queueing a second unit of work (spec §4.10 "Submit").
    async fn find_task_by_idempotency_key(&self, key: &str) -> Result<Option<Task>>;

    /// Tasks eligible for pickup: `pending` with `next_attempt_at <= now`,
    /// or `running` tasks whose `updated_at` is older than the staleness
    /// threshold (zombie recovery, spec §4.10).
    async fn list_due_tasks(&self, now: chrono::DateTime<chrono::Utc>, stale_before: chrono::DateTime<chrono::Utc>) -> Result<Vec<Task>>;

    async fn list_tasks_by_status(&self, itinerary_id: &str, status: TaskStatus) -> Result<Vec<Task>>;

    /// All `running` tasks (across every itinerary) whose `updated_at` is
    /// older than `cutoff`, used by the task sweep's zombie-recovery pass
    /// (spec §4.10). Distinct from `list_due_tasks`, which is scoped to one
    /// staleness threshold for pickup eligibility — the sweep needs to
    /// apply the soft (10 min) and hard (30 min) thresholds separately.
    async fn list_running_tasks_older_than(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<Vec<Task>>;
}
