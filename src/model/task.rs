//! `Task` — a durably queued unit of work (spec §3, §4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task lifecycle state (spec §4.10): `pending` → `running` →
/// `completed`|`failed`, with `cancelled` reachable from `pending`/`running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub itinerary_id: String,
    pub owner: String,
    #[serde(default)]
    pub params: Value,
    pub status: TaskStatus,
    #[serde(default)]
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        task_type: impl Into<String>,
        itinerary_id: impl Into<String>,
        owner: impl Into<String>,
        params: Value,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            itinerary_id: itinerary_id.into(),
            owner: owner.into(),
            params,
            status: TaskStatus::Pending,
            attempts: 0,
            max_attempts,
            next_attempt_at: Some(now),
            last_error: None,
            result: None,
            created_at: now,
            updated_at: now,
            idempotency_key: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn exhausted_retries(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_pending_with_zero_attempts() {
        let t = Task::new("t1", "generate", "it_1", "user_1", Value::Null, 3, Utc::now());
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.attempts, 0);
        assert!(!t.is_terminal());
    }

    #[test]
    fn exhausted_retries_compares_attempts_to_max() {
        let mut t = Task::new("t1", "generate", "it_1", "user_1", Value::Null, 2, Utc::now());
        t.attempts = 2;
        assert!(t.exhausted_retries());
    }
}
