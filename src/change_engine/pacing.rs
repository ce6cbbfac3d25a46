//! Recomputes a day's `pacing` classification from its scheduled activity
//! load after a mutation (spec §4.4 rule 7, alongside `totals`).

use crate::model::{Day, Pacing};

const RELAXED_MAX_HOURS: f64 = 5.0;
const BALANCED_MAX_HOURS: f64 = 9.0;

/// Buckets a day's total scheduled duration into relaxed/balanced/intense.
/// Thresholds are a deliberately simple, documented heuristic rather than a
/// per-destination model — agents and chat edits can still set `pacing`
/// explicitly via `Op::Replace`/direct mutation, this only supplies the
/// automatic recompute after node moves/inserts/deletes.
pub fn classify(day: &Day) -> Pacing {
    if day.totals.duration_hr <= RELAXED_MAX_HOURS {
        Pacing::Relaxed
    } else if day.totals.duration_hr <= BALANCED_MAX_HOURS {
        Pacing::Balanced
    } else {
        Pacing::Intense
    }
}

pub fn recompute(day: &mut Day) {
    day.recompute_totals();
    day.pacing = classify(day);
}
