//! The normalized itinerary data model (spec §3).
//!
//! `Itinerary` is the aggregate root: a monotonically versioned document
//! containing an ordered sequence of `Day`s, each holding an ordered
//! sequence of polymorphic `Node`s connected by `Edge`s. `ChangeSet`/`Op`
//! describe a batch of mutations the change engine accepts; `Diff`
//! describes what actually changed after an apply.

mod change_set;
mod day;
mod itinerary;
mod node;
mod revision;
mod task;

pub use change_set::{ChangeSet, Diff, DiffUpdate, NodeRef, Op, Preferences, Scope};
pub use day::{next_node_seq, Day, Edge, Pacing, Totals, Transit, TimeWindow};
pub use itinerary::{AgentRunInfo, Author, DefaultScope, Itinerary, ItinerarySettings, TripMetadata};
pub use node::{
    Coordinates, Cost, CostPer, Links, Location, Node, NodeDetails, NodeStatus, NodeType, Tips, Timing,
    BOOKED_LABEL,
};
pub use revision::Revision;
pub use task::{Task, TaskStatus};
