//! `TaskMonitor` — periodic sweep for stuck `running` tasks (spec §4.10
//! "Timeout monitoring").
//!
//! Grounded on `task_scheduler/monitor.rs`'s interval-driven sweep loop,
//! generalized from a single staleness check to the two-tier soft/hard
//! threshold spec §4.10 describes: a soft timeout treats the task like any
//! other failed attempt (it counts against `max_attempts`), a hard timeout
//! is a backstop against a worker that crashed holding the lease and resets
//! the task unconditionally.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::interval;
use tracing::{info, warn};

use super::executor::backoff;
use crate::config::TaskSweepConfig;
use crate::error::Result;
use crate::model::{Task, TaskStatus};
use crate::store::StoreAdapter;

pub struct TaskMonitor {
    store: Arc<dyn StoreAdapter>,
    config: TaskSweepConfig,
}

impl TaskMonitor {
    pub fn new(store: Arc<dyn StoreAdapter>, config: TaskSweepConfig) -> Self {
        Self { store, config }
    }

    /// Runs the sweep on `config.interval_sec` forever. Intended to be
    /// spawned as its own background task alongside the task executor's
    /// pickup/execute loop.
    pub async fn run(&self) {
        let mut ticker = interval(std::time::Duration::from_secs(self.config.interval_sec));
        loop {
            ticker.tick().await;
            if let Err(err) = self.sweep().await {
                warn!(error = %err, "task sweep failed");
            }
        }
    }

    /// One pass: reclaims every `running` task staler than the hard
    /// threshold unconditionally, then every `running` task staler than the
    /// soft threshold as a counted failed attempt. A task past both
    /// thresholds is only touched once, by the hard branch.
    pub async fn sweep(&self) -> Result<usize> {
        let now = Utc::now();
        let hard_cutoff = now - chrono::Duration::minutes(self.config.hard_staleness_minutes);
        let soft_cutoff = now - chrono::Duration::minutes(self.config.staleness_minutes);

        let mut reclaimed = 0usize;

        let hard_stale = self.store.list_running_tasks_older_than(hard_cutoff).await?;
        for task in hard_stale {
            self.reclaim_unconditionally(task, now).await?;
            reclaimed += 1;
        }

        let soft_stale = self.store.list_running_tasks_older_than(soft_cutoff).await?;
        for task in soft_stale {
            if task.updated_at < hard_cutoff {
                // already reclaimed above
                continue;
            }
            self.reclaim_as_failed_attempt(task, now).await?;
            reclaimed += 1;
        }

        Ok(reclaimed)
    }

    async fn reclaim_unconditionally(&self, mut task: Task, now: chrono::DateTime<Utc>) -> Result<()> {
        warn!(task_id = %task.id, "hard staleness threshold exceeded, resetting unconditionally");
        task.status = TaskStatus::Pending;
        task.next_attempt_at = Some(now);
        task.last_error = Some("reclaimed after hard staleness timeout".to_string());
        task.updated_at = now;
        self.store.update_task(task).await
    }

    async fn reclaim_as_failed_attempt(&self, mut task: Task, now: chrono::DateTime<Utc>) -> Result<()> {
        task.attempts += 1;
        task.last_error = Some("reclaimed after soft staleness timeout".to_string());
        task.updated_at = now;
        if task.exhausted_retries() {
            task.status = TaskStatus::Failed;
            info!(task_id = %task.id, attempts = task.attempts, "zombie task exhausted retries, marking failed");
        } else {
            task.status = TaskStatus::Pending;
            task.next_attempt_at = Some(now + backoff(task.attempts));
            info!(task_id = %task.id, attempts = task.attempts, "zombie task requeued");
        }
        self.store.update_task(task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn stale_task(id: &str, minutes_old: i64, attempts: u32, max_attempts: u32) -> Task {
        let now = Utc::now();
        let mut task = Task::new(id, "edit", "it_1", "user_1", json!({}), max_attempts, now);
        task.status = TaskStatus::Running;
        task.attempts = attempts;
        task.updated_at = now - chrono::Duration::minutes(minutes_old);
        task
    }

    fn monitor(store: Arc<InMemoryStore>) -> TaskMonitor {
        TaskMonitor::new(store, TaskSweepConfig { staleness_minutes: 10, hard_staleness_minutes: 30, interval_sec: 30 })
    }

    #[tokio::test]
    async fn a_soft_stale_task_is_requeued_as_a_failed_attempt() {
        let store = Arc::new(InMemoryStore::new());
        store.create_task(stale_task("t1", 15, 0, 3)).await.unwrap();
        let reclaimed = monitor(store.clone()).sweep().await.unwrap();
        assert_eq!(reclaimed, 1);
        let task = store.get_task("t1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.attempts, 1);
    }

    #[tokio::test]
    async fn a_soft_stale_task_past_max_attempts_is_marked_failed() {
        let store = Arc::new(InMemoryStore::new());
        store.create_task(stale_task("t1", 15, 2, 3)).await.unwrap();
        monitor(store.clone()).sweep().await.unwrap();
        let task = store.get_task("t1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn a_hard_stale_task_is_reset_without_counting_an_attempt() {
        let store = Arc::new(InMemoryStore::new());
        store.create_task(stale_task("t1", 45, 2, 3)).await.unwrap();
        monitor(store.clone()).sweep().await.unwrap();
        let task = store.get_task("t1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.attempts, 2);
    }

    #[tokio::test]
    async fn a_fresh_running_task_is_left_alone() {
        let store = Arc::new(InMemoryStore::new());
        store.create_task(stale_task("t1", 1, 0, 3)).await.unwrap();
        let reclaimed = monitor(store.clone()).sweep().await.unwrap();
        assert_eq!(reclaimed, 0);
        let task = store.get_task("t1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Running);
    }
}
