//! `Node` — the single polymorphic content unit within a `Day` (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::itinerary::Author;

/// Which of the four content kinds a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Attraction,
    Meal,
    Accommodation,
    Transport,
}

/// Node lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Planned,
    InProgress,
    Skipped,
    Cancelled,
    Completed,
}

impl Default for NodeStatus {
    fn default() -> Self {
        NodeStatus::Planned
    }
}

/// Geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Where a node takes place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl Location {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            coordinates: None,
        }
    }
}

/// When a node starts/ends. `start_time`/`end_time` are ISO-8601 or
/// `HH:mm`; the change engine normalizes `HH:mm` to full ISO-8601 using the
/// day's date (spec §4.4 rule 3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_min: Option<u32>,
}

/// Who a cost is charged per.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostPer {
    Person,
    Group,
    Night,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub amount: f64,
    pub currency: String,
    pub per: CostPer,
}

/// Type-specific free-form attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub opening_hours: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_maps_uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tips {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Label reserved by the booking flow (spec §3); applying it manually
/// outside `BookingAgent` is not forbidden by the model, only by agent
/// contracts.
pub const BOOKED_LABEL: &str = "Booked";

/// The single polymorphic content unit within a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: String,
    pub location: Location,
    #[serde(default)]
    pub timing: Timing,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Cost>,
    #[serde(default)]
    pub details: NodeDetails,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub tips: Tips,
    #[serde(default)]
    pub links: Links,
    #[serde(default)]
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_ref: Option<String>,
    #[serde(default)]
    pub status: NodeStatus,
    pub updated_by: Author,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn touch(&mut self, by: Author, at: DateTime<Utc>) {
        self.updated_by = by;
        self.updated_at = at;
    }

    /// Duration this node occupies, for pacing recomputation (spec §4.4
    /// rule 7). Falls back to 0 when no timing information is present.
    pub fn duration_hours(&self) -> f64 {
        self.timing.duration_min.map(|m| m as f64 / 60.0).unwrap_or(0.0)
    }
}
