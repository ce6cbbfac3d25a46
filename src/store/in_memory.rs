//! In-memory `StoreAdapter`, the default test double (spec §0 test tooling).
//!
//! Grounded on the same `Arc<RwLock<HashMap<_, _>>>` shape the teacher's
//! `agent_network.rs` uses for its concurrent agent registry, applied here
//! to document storage instead of agent handles.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::StoreAdapter;
use crate::error::{Error, Result};
use crate::model::{Author, Itinerary, Revision, Task, TaskStatus, TripMetadata};

#[derive(Default)]
struct Inner {
    itineraries: HashMap<String, Itinerary>,
    revisions: HashMap<String, Vec<Revision>>,
    trip_metadata: HashMap<String, TripMetadata>,
    tasks: HashMap<String, Task>,
}

/// Non-persistent `StoreAdapter` suitable for unit/integration tests and
/// for running the engine without a SQLite dependency.
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreAdapter for InMemoryStore {
    async fn get_itinerary(&self, id: &str) -> Result<Option<Itinerary>> {
        Ok(self.inner.read().await.itineraries.get(id).cloned())
    }

    async fn put_itinerary(&self, itinerary: &Itinerary, expected_version: Option<u64>) -> Result<u64> {
        let mut guard = self.inner.write().await;
        let is_create = match (guard.itineraries.get(&itinerary.id), expected_version) {
            (None, None) => true,
            (None, Some(_)) => {
                return Err(Error::NotFound(itinerary.id.clone()));
            }
            (Some(existing), Some(expected)) if existing.version == expected => false,
            (Some(existing), expected) => {
                return Err(Error::VersionConflict {
                    itinerary_id: itinerary.id.clone(),
                    expected: expected.unwrap_or(existing.version),
                    found: existing.version,
                });
            }
            (Some(_), None) => {
                return Err(Error::VersionConflict {
                    itinerary_id: itinerary.id.clone(),
                    expected: 0,
                    found: guard.itineraries[&itinerary.id].version,
                });
            }
        };
        guard.itineraries.insert(itinerary.id.clone(), itinerary.clone());
        if is_create {
            // Seeds version 1 so `undo()`'s `current_version - 1` lookup resolves
            // right after creation, without waiting for a first `apply`.
            guard
                .revisions
                .entry(itinerary.id.clone())
                .or_default()
                .push(Revision::of(itinerary.clone(), Author::User, itinerary.updated_at));
        }
        Ok(itinerary.version)
    }

    async fn put_revision(&self, revision: Revision, retain: usize) -> Result<()> {
        let mut guard = self.inner.write().await;
        let list = guard.revisions.entry(revision.itinerary_id.clone()).or_default();
        list.push(revision);
        list.sort_by_key(|r| r.version);
        while list.len() > retain {
            list.remove(0);
        }
        Ok(())
    }

    async fn list_revisions(&self, itinerary_id: &str) -> Result<Vec<Revision>> {
        Ok(self
            .inner
            .read()
            .await
            .revisions
            .get(itinerary_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_revision(&self, itinerary_id: &str, version: u64) -> Result<Option<Revision>> {
        Ok(self
            .inner
            .read()
            .await
            .revisions
            .get(itinerary_id)
            .and_then(|list| list.iter().find(|r| r.version == version).cloned()))
    }

    async fn put_trip_metadata(&self, metadata: TripMetadata) -> Result<()> {
        self.inner
            .write()
            .await
            .trip_metadata
            .insert(metadata.itinerary_id.clone(), metadata);
        Ok(())
    }

    async fn list_trip_metadata(&self, owner: &str) -> Result<Vec<TripMetadata>> {
        Ok(self
            .inner
            .read()
            .await
            .trip_metadata
            .values()
            .filter(|m| m.owner == owner)
            .cloned()
            .collect())
    }

    async fn update_trip_status(&self, itinerary_id: &str, status: &str) -> Result<()> {
        let mut guard = self.inner.write().await;
        let metadata = guard
            .trip_metadata
            .get_mut(itinerary_id)
            .ok_or_else(|| Error::NotFound(itinerary_id.to_string()))?;
        metadata.status = status.to_string();
        Ok(())
    }

    async fn create_task(&self, task: Task) -> Result<()> {
        self.inner.write().await.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.inner.read().await.tasks.get(id).cloned())
    }

    async fn update_task(&self, task: Task) -> Result<()> {
        self.inner.write().await.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    async fn find_task_by_idempotency_key(&self, key: &str) -> Result<Option<Task>> {
        Ok(self
            .inner
            .read()
            .await
            .tasks
            .values()
            .find(|t| t.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn list_due_tasks(&self, now: DateTime<Utc>, stale_before: DateTime<Utc>) -> Result<Vec<Task>> {
        Ok(self
            .inner
            .read()
            .await
            .tasks
            .values()
            .filter(|t| match t.status {
                TaskStatus::Pending => t.next_attempt_at.map(|at| at <= now).unwrap_or(true),
                TaskStatus::Running => t.updated_at < stale_before,
                _ => false,
            })
            .cloned()
            .collect())
    }

    async fn list_tasks_by_status(&self, itinerary_id: &str, status: TaskStatus) -> Result<Vec<Task>> {
        Ok(self
            .inner
            .read()
            .await
            .tasks
            .values()
            .filter(|t| t.itinerary_id == itinerary_id && t.status == status)
            .cloned()
            .collect())
    }

    async fn list_running_tasks_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Task>> {
        Ok(self
            .inner
            .read()
            .await
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Running && t.updated_at < cutoff)
            .cloned()
            .collect())
    }
}
