//! `EnrichmentAgent` — phase 3 of the generation pipeline (spec §4.8): pure
//! logic, no LLM in the core path. Validates each node's timing against its
//! `details.opening_hours`, links nodes into a fresh edge chain and
//! completes any edge missing a transit duration (estimated from
//! coordinates when both endpoints have them, a conservative flat default
//! otherwise), recomputes day pacing, and appends `"closed at requested
//! time"` / `"high pacing"` / `"tight connection"` warnings where they
//! apply.

use async_trait::async_trait;

use super::{Agent, AgentContext, AgentOutcome};
use crate::error::{Error, Result};
use crate::model::{Coordinates, Day, Edge, Node, Pacing, Transit};

pub struct EnrichmentAgent;

impl EnrichmentAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnrichmentAgent {
    fn default() -> Self {
        Self::new()
    }
}

const AVERAGE_SPEED_KMH: f64 = 30.0;
const MIN_TRANSIT_MIN: u32 = 5;
const DEFAULT_TRANSIT_MIN: u32 = 20;
const EARTH_RADIUS_KM: f64 = 6371.0;

#[async_trait]
impl Agent for EnrichmentAgent {
    fn id(&self) -> &str {
        "enrichment_agent"
    }

    async fn execute(&self, ctx: AgentContext) -> Result<AgentOutcome> {
        let day_number = ctx
            .day_number
            .ok_or_else(|| Error::InvalidStructuredResponse("enrichment_agent requires a day_number".to_string()))?;
        let mut day = ctx
            .itinerary
            .day(day_number)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("day {}", day_number)))?;

        if day.nodes.is_empty() {
            return Ok(AgentOutcome::Days(vec![day]));
        }

        for node in &mut day.nodes {
            validate_opening_hours(node);
        }

        for (from, to) in dangling_edge_pairs(&day) {
            day.warnings.push(format!("dropped dangling edge {} -> {}", from, to));
        }
        rebuild_edges(&mut day);
        crate::change_engine::recompute_day(&mut day);
        evaluate_day_warnings(&mut day);

        Ok(AgentOutcome::Days(vec![day]))
    }
}

/// Appends `"closed at requested time"` to `node.tips.warnings` when the
/// node's `timing.start_time` falls outside every `"HH:mm-HH:mm"` window in
/// `details.opening_hours`. Nodes with no declared hours, or no start time
/// to check, are left alone — there is nothing to validate against.
fn validate_opening_hours(node: &mut Node) {
    if node.details.opening_hours.is_empty() {
        return;
    }
    let Some(start) = node.timing.start_time.as_deref().and_then(time_to_minutes) else {
        return;
    };
    let within_any = node
        .details
        .opening_hours
        .iter()
        .filter_map(|window| parse_window(window))
        .any(|(open, close)| start >= open && start < close);

    if !within_any {
        let warning = "closed at requested time";
        if !node.tips.warnings.iter().any(|w| w == warning) {
            node.tips.warnings.push(warning.to_string());
        }
    }
}

/// Parses an `"HH:mm-HH:mm"` opening-hours window into minutes-of-day.
fn parse_window(window: &str) -> Option<(u32, u32)> {
    let (open, close) = window.split_once('-')?;
    Some((time_to_minutes(open.trim())?, time_to_minutes(close.trim())?))
}

/// Parses an `"HH:mm"` clock time into minutes since midnight.
fn time_to_minutes(value: &str) -> Option<u32> {
    let (hours, minutes) = value.trim().split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    Some(hours * 60 + minutes)
}

fn dangling_edge_pairs(day: &Day) -> Vec<(String, String)> {
    day.dangling_edges().into_iter().map(|e| (e.from.clone(), e.to.clone())).collect()
}

/// Rebuilds `day.edges` as a chain following current node order, keeping
/// an existing edge's transit measurement when one is already set
/// (non-zero `duration_min`) and estimating the rest, completing missing
/// durations rather than discarding deliberate ones (spec §4.8).
fn rebuild_edges(day: &mut Day) {
    let previous: std::collections::HashMap<(String, String), Transit> = day
        .edges
        .iter()
        .map(|e| ((e.from.clone(), e.to.clone()), e.transit.clone()))
        .collect();

    let mut edges = Vec::with_capacity(day.nodes.len().saturating_sub(1));
    for pair in day.nodes.windows(2) {
        let key = (pair[0].id.clone(), pair[1].id.clone());
        let transit = match previous.get(&key) {
            Some(t) if t.duration_min > 0 => t.clone(),
            _ => estimate_transit(&pair[0], &pair[1]),
        };
        edges.push(Edge { from: pair[0].id.clone(), to: pair[1].id.clone(), transit });
    }
    day.edges = edges;
}

/// Estimates transit time between two nodes: a straight-line distance at
/// an assumed average city-travel speed when both have coordinates, a
/// conservative flat duration with no distance otherwise.
fn estimate_transit(from: &Node, to: &Node) -> Transit {
    match (from.location.coordinates, to.location.coordinates) {
        (Some(a), Some(b)) => {
            let distance_km = haversine_km(a, b);
            let duration_min = ((distance_km / AVERAGE_SPEED_KMH) * 60.0).round().max(MIN_TRANSIT_MIN as f64) as u32;
            Transit { mode: "drive".to_string(), duration_min, distance_km: Some(distance_km) }
        }
        _ => Transit { mode: "unknown".to_string(), duration_min: DEFAULT_TRANSIT_MIN, distance_km: None },
    }
}

fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Refreshes the two pacing-derived day warnings from scratch so repeated
/// enrichment runs don't accumulate duplicates.
fn evaluate_day_warnings(day: &mut Day) {
    day.warnings.retain(|w| w != "high pacing" && w != "tight connection");

    if day.pacing == Pacing::Intense {
        day.warnings.push("high pacing".to_string());
    }
    if day.edges.iter().any(|edge| is_tight_connection(day, edge)) {
        day.warnings.push("tight connection".to_string());
    }
}

/// A connection is tight when the scheduled gap between two consecutive
/// nodes is shorter than the transit time estimated/recorded for it.
/// Missing timing on either end means there's nothing to compare, so it's
/// not flagged.
fn is_tight_connection(day: &Day, edge: &Edge) -> bool {
    let (Some(from), Some(to)) = (day.node(&edge.from), day.node(&edge.to)) else {
        return false;
    };
    let (Some(end), Some(start)) = (
        from.timing.end_time.as_deref().and_then(time_to_minutes),
        to.timing.start_time.as_deref().and_then(time_to_minutes),
    ) else {
        return false;
    };
    start >= end && (start - end) < edge.transit.duration_min
}
