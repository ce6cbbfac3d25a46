//! Change Engine (spec §4.4): the sole path by which itinerary content is
//! mutated after generation — propose/apply/undo over a `ChangeSet`,
//! enforcing lock immunity, edge repair, and pacing/totals recompute.

mod diff;
mod engine;
mod ops;
mod pacing;

pub use engine::ChangeEngine;
pub use ops::changed_fields;
pub use pacing::recompute as recompute_day;
