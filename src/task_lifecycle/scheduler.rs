//! `TaskScheduler` — submission and pickup (spec §4.10 "Submit"/"Pickup").
//!
//! Grounded on `task_scheduler/scheduler.rs`'s dispatch-loop shape, trimmed
//! to the two operations this crate's durable queue actually needs: callers
//! submit units of work identified by the same `taskType` strings the
//! `AgentRegistry` routes on, and a worker loop claims one due unit at a
//! time.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Task, TaskStatus};
use crate::store::StoreAdapter;

pub struct TaskScheduler {
    store: Arc<dyn StoreAdapter>,
    max_attempts: u32,
}

impl TaskScheduler {
    pub fn new(store: Arc<dyn StoreAdapter>, max_attempts: u32) -> Self {
        Self { store, max_attempts }
    }

    /// Persists a new `pending` task. A duplicate `idempotency_key` returns
    /// the id of the task already on file instead of queueing a second unit
    /// of work (spec §4.10: "duplicate keys return existing task id").
    pub async fn submit(
        &self,
        task_type: impl Into<String>,
        itinerary_id: impl Into<String>,
        owner: impl Into<String>,
        params: Value,
        idempotency_key: Option<String>,
    ) -> Result<String> {
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.store.find_task_by_idempotency_key(key).await? {
                info!(task_id = %existing.id, idempotency_key = key, "duplicate submission, returning existing task");
                return Ok(existing.id);
            }
        }

        let id = format!("task_{}", Uuid::new_v4());
        let now = Utc::now();
        let mut task = Task::new(id.clone(), task_type, itinerary_id, owner, params, self.max_attempts, now);
        task.idempotency_key = idempotency_key;
        self.store.create_task(task).await?;
        info!(task_id = %id, "task submitted");
        Ok(id)
    }

    /// Claims the next due task (a `pending` task whose `next_attempt_at`
    /// has arrived, or a stale `running` task reclaimed as a zombie) by
    /// transitioning it to `running` and persisting the claim. Returns
    /// `None` if nothing is due.
    ///
    /// This is not a compare-and-swap the way itinerary `apply` is — the
    /// store abstraction only specifies CAS on `Itinerary::version` (spec
    /// §4.1) — so concurrent pickers racing against the same task id can
    /// both observe it as due. A single-worker-per-process deployment (the
    /// orchestrator's task sweep) does not hit this in practice; a
    /// multi-worker deployment should route pickup through a single
    /// coordinator.
    pub async fn pickup(&self, stale_before: chrono::DateTime<Utc>) -> Result<Option<Task>> {
        let now = Utc::now();
        let due = self.store.list_due_tasks(now, stale_before).await?;
        let Some(mut task) = due.into_iter().find(|t| !t.is_terminal()) else {
            return Ok(None);
        };
        task.status = TaskStatus::Running;
        task.updated_at = now;
        self.store.update_task(task.clone()).await?;
        info!(task_id = %task.id, task_type = %task.task_type, "task picked up");
        Ok(Some(task))
    }

    /// Marks a task `cancelled`. Terminal; a worker mid-execution observes
    /// this on its next reload and exits cooperatively rather than
    /// persisting a completion (spec §4.10 "Cancellation").
    pub async fn cancel(&self, task_id: &str) -> Result<bool> {
        let Some(mut task) = self.store.get_task(task_id).await? else {
            return Ok(false);
        };
        if task.is_terminal() {
            return Ok(false);
        }
        task.status = TaskStatus::Cancelled;
        task.updated_at = Utc::now();
        self.store.update_task(task).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn scheduler() -> (TaskScheduler, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (TaskScheduler::new(store.clone(), 3), store)
    }

    #[tokio::test]
    async fn submit_persists_a_pending_task() {
        let (scheduler, store) = scheduler();
        let id = scheduler.submit("edit", "it_1", "user_1", json!({}), None).await.unwrap();
        let task = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_returns_existing_task_id() {
        let (scheduler, _store) = scheduler();
        let key = Some("req-42".to_string());
        let first = scheduler.submit("edit", "it_1", "user_1", json!({}), key.clone()).await.unwrap();
        let second = scheduler.submit("edit", "it_1", "user_1", json!({}), key).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn pickup_claims_a_due_pending_task() {
        let (scheduler, _store) = scheduler();
        let id = scheduler.submit("edit", "it_1", "user_1", json!({}), None).await.unwrap();
        let claimed = scheduler.pickup(Utc::now() - chrono::Duration::minutes(10)).await.unwrap().unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn pickup_returns_none_when_nothing_is_due() {
        let (scheduler, _store) = scheduler();
        assert!(scheduler.pickup(Utc::now() - chrono::Duration::minutes(10)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancel_is_terminal_and_idempotent() {
        let (scheduler, store) = scheduler();
        let id = scheduler.submit("edit", "it_1", "user_1", json!({}), None).await.unwrap();
        assert!(scheduler.cancel(&id).await.unwrap());
        let task = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(!scheduler.cancel(&id).await.unwrap());
    }
}
