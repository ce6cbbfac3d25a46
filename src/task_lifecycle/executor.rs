//! `TaskExecutor` — runs one claimed task to completion (spec §4.10
//! "Execute").
//!
//! Grounded on `task_scheduler/executor.rs`'s execution-state bookkeeping,
//! replacing its sprint-task dispatch with a route through this crate's
//! `AgentRegistry` by `task.task_type` — the same routing contract the
//! orchestrator and chat router use (spec §4.5), so a task is just a
//! durable, retryable way to invoke the same agents.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::agents::{AgentContext, AgentOutcome};
use crate::change_engine::ChangeEngine;
use crate::error::{Error, Result};
use crate::llm::LlmGateway;
use crate::model::{Author, Task, TaskStatus};
use crate::registry::AgentRegistry;
use crate::store::StoreAdapter;

/// Base delay for the first retry; doubles per attempt and caps at one
/// hour, mirroring the LLM Gateway's backoff shape (spec §4.3) applied here
/// to task-level retries instead of individual LLM calls.
const BASE_BACKOFF_SECS: i64 = 30;
const MAX_BACKOFF_SECS: i64 = 3_600;

pub(super) fn backoff(attempts: u32) -> Duration {
    let secs = BASE_BACKOFF_SECS.saturating_mul(1i64 << attempts.min(20)).min(MAX_BACKOFF_SECS);
    Duration::seconds(secs)
}

pub struct TaskExecutor {
    store: Arc<dyn StoreAdapter>,
    registry: Arc<AgentRegistry>,
    change_engine: Arc<ChangeEngine>,
    llm: Arc<dyn LlmGateway>,
}

impl TaskExecutor {
    pub fn new(
        store: Arc<dyn StoreAdapter>,
        registry: Arc<AgentRegistry>,
        change_engine: Arc<ChangeEngine>,
        llm: Arc<dyn LlmGateway>,
    ) -> Self {
        Self { store, registry, change_engine, llm }
    }

    /// Executes `task`, persisting its terminal or retry state. Never
    /// returns the agent's own error to the caller — failures become a
    /// stored `failed`/re-queued `pending` task, matching spec §4.10's
    /// "on failure transitions to `pending`... until `attempts >=
    /// maxAttempts` then `failed`".
    pub async fn execute(&self, task: Task) -> Result<()> {
        let outcome = self.run(&task).await;

        // Cooperative cancellation (spec §4.10): reload before persisting a
        // result so a `cancel` issued mid-execution is observed and the
        // task is left in its terminal `cancelled` state.
        if let Some(current) = self.store.get_task(&task.id).await? {
            if current.status == TaskStatus::Cancelled {
                info!(task_id = %task.id, "task was cancelled during execution, discarding result");
                return Ok(());
            }
        }

        match outcome {
            Ok(result) => self.complete(task, result).await,
            Err(err) => self.fail(task, err).await,
        }
    }

    async fn run(&self, task: &Task) -> Result<serde_json::Value> {
        let itinerary = self
            .store
            .get_itinerary(&task.itinerary_id)
            .await?
            .ok_or_else(|| Error::NotFound(task.itinerary_id.clone()))?;

        let agent = self.registry.route(&task.task_type).await?;
        let day_number = task.params.get("day_number").and_then(|v| v.as_u64()).map(|d| d as u32);
        let ctx = AgentContext {
            itinerary,
            day_number,
            params: task.params.clone(),
            user_message: task.params.get("chat_text").and_then(|v| v.as_str()).map(str::to_string),
            llm: self.llm.clone(),
        };

        match agent.execute(ctx).await? {
            AgentOutcome::Proposal(change_set) => {
                let (updated, diff) = self
                    .change_engine
                    .apply(&task.itinerary_id, &change_set, Author::Agent)
                    .await?;
                Ok(serde_json::json!({"toVersion": updated.version, "diff": diff}))
            }
            AgentOutcome::Text(text) => Ok(serde_json::json!({"message": text})),
            other => Ok(serde_json::json!({"outcome": format!("{:?}", other)})),
        }
    }

    async fn complete(&self, mut task: Task, result: serde_json::Value) -> Result<()> {
        task.status = TaskStatus::Completed;
        task.result = Some(result);
        task.last_error = None;
        task.updated_at = Utc::now();
        info!(task_id = %task.id, "task completed");
        self.store.update_task(task).await
    }

    async fn fail(&self, mut task: Task, err: Error) -> Result<()> {
        task.attempts += 1;
        task.last_error = Some(err.to_string());
        task.updated_at = Utc::now();
        if task.exhausted_retries() {
            task.status = TaskStatus::Failed;
            error!(task_id = %task.id, attempts = task.attempts, error = %err, "task failed permanently");
        } else {
            task.status = TaskStatus::Pending;
            task.next_attempt_at = Some(schedule_retry(task.attempts, Utc::now()));
            warn!(task_id = %task.id, attempts = task.attempts, error = %err, "task failed, will retry");
        }
        self.store.update_task(task).await
    }
}

fn schedule_retry(attempts: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    now + backoff(attempts)
}
