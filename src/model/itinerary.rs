//! `Itinerary` — the aggregate root, plus `TripMetadata` (spec §3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::day::Day;

/// Who last touched a node or authored a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    Agent,
    User,
}

/// Default scope a chat edit applies to when the request doesn't say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultScope {
    Trip,
    Day,
}

impl Default for DefaultScope {
    fn default() -> Self {
        DefaultScope::Day
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItinerarySettings {
    #[serde(default)]
    pub auto_apply: bool,
    #[serde(default)]
    pub default_scope: DefaultScope,
}

impl Default for ItinerarySettings {
    fn default() -> Self {
        Self {
            auto_apply: false,
            default_scope: DefaultScope::default(),
        }
    }
}

/// Last-run bookkeeping per agent kind, keyed by agent id (e.g.
/// `"activity_agent"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRunInfo {
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_run_succeeded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub id: String,
    pub version: u64,
    pub owner: String,
    #[serde(default)]
    pub summary: String,
    pub currency: String,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub days: Vec<Day>,
    #[serde(default)]
    pub settings: ItinerarySettings,
    #[serde(default)]
    pub agents: HashMap<String, AgentRunInfo>,
    /// Number of travelers cost totals are normalized for (spec §4.7).
    #[serde(default = "default_party_size")]
    pub party_size: u32,
    /// Summary total across all days' `totals.cost`, kept in sync by the
    /// cost estimation phase (spec §4.7).
    #[serde(default)]
    pub total_cost: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_party_size() -> u32 {
    1
}

impl Itinerary {
    pub fn new(id: impl Into<String>, owner: impl Into<String>, currency: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            version: 1,
            owner: owner.into(),
            summary: String::new(),
            currency: currency.into(),
            themes: Vec::new(),
            days: Vec::new(),
            settings: ItinerarySettings::default(),
            agents: HashMap::new(),
            party_size: default_party_size(),
            total_cost: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn day(&self, day_number: u32) -> Option<&Day> {
        self.days.iter().find(|d| d.day_number == day_number)
    }

    pub fn day_mut(&mut self, day_number: u32) -> Option<&mut Day> {
        self.days.iter_mut().find(|d| d.day_number == day_number)
    }

    pub fn find_node(&self, node_id: &str) -> Option<(u32, &super::node::Node)> {
        self.days
            .iter()
            .find_map(|d| d.node(node_id).map(|n| (d.day_number, n)))
    }

    /// Day numbers `1..N` with no gaps, in order — the invariant spec §3
    /// requires of `days`.
    pub fn has_contiguous_day_numbers(&self) -> bool {
        self.days
            .iter()
            .enumerate()
            .all(|(i, d)| d.day_number as usize == i + 1)
    }

    pub fn record_agent_run(&mut self, agent_id: &str, succeeded: bool, at: DateTime<Utc>) {
        let entry = self.agents.entry(agent_id.to_string()).or_default();
        entry.last_run_at = Some(at);
        entry.last_run_succeeded = succeeded;
    }
}

/// Lightweight index record established synchronously at creation, so a
/// listing of a user's trips never requires loading full itinerary bodies
/// (spec §3, §4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripMetadata {
    pub owner: String,
    pub itinerary_id: String,
    pub destination: String,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
}
