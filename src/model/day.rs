//! `Day` — an ordered sequence of nodes and the edges connecting them.

use serde::{Deserialize, Serialize};

use super::node::Node;

/// How densely a day is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    Relaxed,
    Balanced,
    Intense,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::Balanced
    }
}

/// Mode and measurements of travel between two consecutive nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transit {
    pub mode: String,
    pub duration_min: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// A directed connection between two node ids within the same day.
///
/// Edges must reference only node ids present in `Day::nodes` and must form
/// a DAG following node order in time (spec §3) — enforced by the change
/// engine, not by this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub transit: Transit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Aggregate totals recomputed by the change engine after every mutation
/// affecting this day (spec §4.4 rule 7).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub distance_km: f64,
    pub cost: f64,
    pub duration_hr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub day_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub pacing: Pacing,
    #[serde(default)]
    pub time_window: TimeWindow,
    #[serde(default)]
    pub totals: Totals,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Day {
    pub fn new(day_number: u32) -> Self {
        Self {
            day_number,
            date: None,
            location: String::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            pacing: Pacing::default(),
            time_window: TimeWindow::default(),
            totals: Totals::default(),
            warnings: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Edges that reference a node id not present in `nodes`. Used by
    /// enrichment to emit a day-level warning rather than fail the phase
    /// (spec §9 Open Question resolution).
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| !self.contains_node(&e.from) || !self.contains_node(&e.to))
            .collect()
    }

    /// Next unused sequence number under this day's `day{N}_node{seq}`
    /// id contract (spec §4.6, §4.4 rule 4), based on the highest suffix
    /// already present among `nodes`.
    pub fn next_node_seq(&self) -> u32 {
        next_node_seq(self.day_number, &self.nodes)
    }

    /// Recompute `totals` from the current nodes. Called by the change
    /// engine after any apply touching this day (spec §4.4 rule 7).
    pub fn recompute_totals(&mut self) {
        let cost: f64 = self
            .nodes
            .iter()
            .filter_map(|n| n.cost.as_ref())
            .map(|c| c.amount)
            .sum();
        let duration_hr: f64 = self.nodes.iter().map(|n| n.duration_hours()).sum();
        let distance_km: f64 = self.edges.iter().filter_map(|e| e.transit.distance_km).sum();
        self.totals = Totals {
            distance_km,
            cost,
            duration_hr,
        };
    }
}

/// Highest `day{day_number}_node{seq}` suffix found among `nodes`, plus
/// one — the next id a placeholder or auto-ided insert should use. Falls
/// back to `1` when no node yet follows the contract.
pub fn next_node_seq(day_number: u32, nodes: &[Node]) -> u32 {
    let prefix = format!("day{}_node", day_number);
    nodes
        .iter()
        .filter_map(|n| n.id.strip_prefix(prefix.as_str()))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1
}
