//! `Revision` — an immutable snapshot taken on every successful apply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::itinerary::{Author, Itinerary};

/// Snapshot of an itinerary at a given version, retained for undo (spec §3,
/// §4.4). Retention count is `revisions.retain` in config, default 50.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub itinerary_id: String,
    pub version: u64,
    pub snapshot: Itinerary,
    pub author: Author,
    pub created_at: DateTime<Utc>,
}

impl Revision {
    pub fn of(snapshot: Itinerary, author: Author, created_at: DateTime<Utc>) -> Self {
        Self {
            itinerary_id: snapshot.id.clone(),
            version: snapshot.version,
            snapshot,
            author,
            created_at,
        }
    }
}
