//! Event Bus (spec §4.2): per-itinerary pub/sub with monotonic sequence
//! numbers, fanning `AgentProgressEvent`s and `PatchEvent`s out to
//! subscribers with at-least-once delivery.

mod bus;
mod server;
mod types;

pub use bus::EventBus;
pub use server::{subscribe, ConnectionClaims};
pub use types::{AgentProgressEvent, Event, PatchEvent, Phase, PhaseStatus};
