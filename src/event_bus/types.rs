//! Event envelope types broadcast over the event bus (spec §4.2, §6).
//!
//! Grounded on `realtime_sync/types.rs`'s `SyncEvent` envelope shape
//! (id/event_type/timestamp + payload fields), repurposed here from
//! design-decision/blocker/discovery sync events to orchestration progress
//! and itinerary patches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Diff;

/// Which orchestration phase an `AgentProgressEvent` reports on (spec
/// §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Skeleton,
    Population,
    Enrichment,
    CostEstimation,
    Finalization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Started,
    Progress,
    Completed,
    Failed,
}

/// Streamed during generation: one event per phase transition and, within
/// phase 2, one per population agent as it finishes (spec §4.8, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProgressEvent {
    pub event_id: String,
    pub itinerary_id: String,
    pub seq: u64,
    pub phase: Phase,
    pub status: PhaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AgentProgressEvent {
    pub fn new(itinerary_id: impl Into<String>, seq: u64, phase: Phase, status: PhaseStatus) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            itinerary_id: itinerary_id.into(),
            seq,
            phase,
            status,
            agent_id: None,
            message: None,
            timestamp: Utc::now(),
        }
    }
}

/// Streamed after every successful change-set apply (spec §4.4, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchEvent {
    pub event_id: String,
    pub itinerary_id: String,
    pub seq: u64,
    pub version: u64,
    pub diff: Diff,
    pub timestamp: DateTime<Utc>,
}

impl PatchEvent {
    pub fn new(itinerary_id: impl Into<String>, seq: u64, version: u64, diff: Diff) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            itinerary_id: itinerary_id.into(),
            seq,
            version,
            diff,
            timestamp: Utc::now(),
        }
    }
}

/// The union type subscribers receive; at-least-once, ordered by `seq`
/// within a single itinerary (spec §4.2 Non-goals: exactly-once delivery is
/// not guaranteed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Progress(AgentProgressEvent),
    Patch(PatchEvent),
}

impl Event {
    pub fn seq(&self) -> u64 {
        match self {
            Event::Progress(e) => e.seq,
            Event::Patch(e) => e.seq,
        }
    }

    pub fn itinerary_id(&self) -> &str {
        match self {
            Event::Progress(e) => &e.itinerary_id,
            Event::Patch(e) => &e.itinerary_id,
        }
    }
}
