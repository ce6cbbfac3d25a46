//! Node resolution for chat turns that reference a node by description
//! rather than id (spec §4.9 step 2 and "Node resolution" paragraph):
//! case-insensitive fuzzy match over `title`/`location.name`/`type`,
//! ranked by substring + token overlap, with a confidence threshold above
//! which a single candidate is returned outright.

use serde::{Deserialize, Serialize};

use crate::model::{Itinerary, Node, NodeType};

/// A node surfaced to the caller for disambiguation (spec §4.9 step 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub day: u32,
    pub node_type: NodeType,
    pub location: String,
}

const CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Scores every node in `itinerary` against `hint`, returning candidates
/// sorted by descending score. An empty result means no match at all; a
/// single high-confidence match (see [`resolve`]) means no disambiguation
/// is needed.
fn score_candidates<'a>(itinerary: &'a Itinerary, hint: &str) -> Vec<(f64, u32, &'a Node)> {
    let hint_lower = hint.to_lowercase();
    let hint_tokens: Vec<&str> = hint_lower.split_whitespace().collect();

    let mut scored = Vec::new();
    for day in &itinerary.days {
        for node in &day.nodes {
            let haystack = format!("{} {} {:?}", node.title, node.location.name, node.node_type).to_lowercase();
            let substring_hit = if haystack.contains(&hint_lower) { 1.0 } else { 0.0 };
            let token_overlap = if hint_tokens.is_empty() {
                0.0
            } else {
                let hits = hint_tokens.iter().filter(|t| haystack.contains(*t)).count();
                hits as f64 / hint_tokens.len() as f64
            };
            let score = 0.5 * substring_hit + 0.5 * token_overlap;
            if score > 0.0 {
                scored.push((score, day.day_number, node));
            }
        }
    }
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    scored
}

/// Resolution outcome: either a single confident match, or a list of
/// candidates the caller must disambiguate among (possibly empty, meaning
/// no match was found at all).
pub enum Resolution {
    Resolved(Candidate),
    Ambiguous(Vec<Candidate>),
}

pub fn resolve(itinerary: &Itinerary, hint: &str) -> Resolution {
    let scored = score_candidates(itinerary, hint);

    if let Some((score, day, node)) = scored.first() {
        if *score >= CONFIDENCE_THRESHOLD && (scored.len() == 1 || scored[1].0 < CONFIDENCE_THRESHOLD) {
            return Resolution::Resolved(to_candidate(*day, node));
        }
    }

    Resolution::Ambiguous(scored.into_iter().map(|(_, day, node)| to_candidate(day, node)).collect())
}

fn to_candidate(day: u32, node: &Node) -> Candidate {
    Candidate {
        id: node.id.clone(),
        title: node.title.clone(),
        day,
        node_type: node.node_type,
        location: node.location.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Author, Cost, CostPer, Day, Itinerary, Location, NodeStatus, Timing};
    use chrono::Utc;

    fn node(id: &str, title: &str, location: &str, node_type: NodeType) -> Node {
        Node {
            id: id.to_string(),
            node_type,
            title: title.to_string(),
            location: Location::named(location),
            timing: Timing::default(),
            cost: Some(Cost { amount: 0.0, currency: "USD".to_string(), per: CostPer::Person }),
            details: Default::default(),
            labels: vec![],
            tips: Default::default(),
            links: Default::default(),
            locked: false,
            booking_ref: None,
            status: NodeStatus::Planned,
            updated_by: Author::Agent,
            updated_at: Utc::now(),
        }
    }

    fn sample_itinerary() -> Itinerary {
        let mut itinerary = Itinerary::new("it_1", "user_1", "USD", Utc::now());
        let mut day = Day::new(1);
        day.nodes.push(node("n1", "Tokyo National Museum", "Ueno", NodeType::Attraction));
        day.nodes.push(node("n2", "Shinjuku Ramen House", "Shinjuku", NodeType::Meal));
        itinerary.days.push(day);
        itinerary
    }

    #[test]
    fn a_strong_substring_match_resolves_without_disambiguation() {
        let itinerary = sample_itinerary();
        match resolve(&itinerary, "national museum") {
            Resolution::Resolved(candidate) => assert_eq!(candidate.id, "n1"),
            Resolution::Ambiguous(_) => panic!("expected a resolved candidate"),
        }
    }

    #[test]
    fn an_unmatched_hint_returns_no_candidates() {
        let itinerary = sample_itinerary();
        match resolve(&itinerary, "scuba diving center") {
            Resolution::Ambiguous(candidates) => assert!(candidates.is_empty()),
            Resolution::Resolved(_) => panic!("did not expect a match"),
        }
    }

    #[test]
    fn a_vague_hint_matching_multiple_nodes_is_ambiguous() {
        let mut itinerary = sample_itinerary();
        itinerary.days[0].nodes.push(node("n3", "Shinjuku Gyoen", "Shinjuku", NodeType::Attraction));
        match resolve(&itinerary, "shinjuku") {
            Resolution::Ambiguous(candidates) => assert!(candidates.len() >= 2),
            Resolution::Resolved(c) => panic!("expected ambiguity, got single match {}", c.id),
        }
    }
}
