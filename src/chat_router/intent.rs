//! Intent classification (spec §4.9 step 1): a cheap keyword pre-router
//! first, falling back to a structured LLM call only when no keyword rule
//! fires.
//!
//! Grounded on `domain_router.rs`'s keyword-table-then-fallback shape,
//! repurposed from routing chat turns to one of eight domains to routing
//! them to one of this crate's seven chat intents.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::llm::{LlmGateway, Message};

/// One of the seven chat-turn intents spec §4.9 classifies a turn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Edit,
    Plan,
    Explain,
    Book,
    Enrich,
    Undo,
    ReplanToday,
}

impl Intent {
    /// The `taskType` this intent routes to per spec §4.9 step 3's fixed
    /// map. `Undo` and `ReplanToday` both fold onto an existing taskType
    /// rather than introducing new agents of their own.
    pub fn task_type(self) -> &'static str {
        match self {
            Intent::Edit => "edit",
            Intent::Plan => "plan",
            Intent::Explain => "explain",
            Intent::Book => "book",
            Intent::Enrich => "enrich",
            // Undo bypasses agent routing entirely; the change engine's
            // own `undo` is invoked directly by the router.
            Intent::Undo => "edit",
            // `replan_today` routes to EditorAgent scoped to the current
            // day (spec §4.9 fixed routing map), not to the whole-trip
            // planner.
            Intent::ReplanToday => "edit",
        }
    }

    /// The `ChangeSet`/params scope this intent forces, overriding the
    /// itinerary's `default_scope` setting. `None` means the request's own
    /// scope/default applies unmodified.
    pub fn forced_scope(self) -> Option<crate::model::Scope> {
        match self {
            Intent::ReplanToday => Some(crate::model::Scope::Day),
            _ => None,
        }
    }
}

/// Structured fallback response shape (spec §4.9 step 1).
#[derive(Debug, Deserialize)]
pub struct ClassifiedIntent {
    pub intent: Intent,
    #[serde(default)]
    pub day: Option<u32>,
    #[serde(default)]
    pub node_hints: Vec<String>,
}

/// Keyword pre-router. Returns `None` when no rule matches confidently,
/// signaling the caller should fall back to an LLM structured call.
pub fn classify_by_keyword(chat_text: &str) -> Option<Intent> {
    let text = chat_text.to_lowercase();
    let rules: &[(&[&str], Intent)] = &[
        (&["undo", "revert", "go back"], Intent::Undo),
        (&["book", "reserve", "confirm booking"], Intent::Book),
        (&["redo today", "replan today", "redo this day"], Intent::ReplanToday),
        (&["why", "explain", "how much", "what's the"], Intent::Explain),
        (&["tip", "enrich", "what should i know", "what to wear"], Intent::Enrich),
        (&["plan a trip", "new itinerary", "create a trip"], Intent::Plan),
        (&["move", "delete", "remove", "change time", "edit"], Intent::Edit),
    ];
    for (keywords, intent) in rules {
        if keywords.iter().any(|k| text.contains(k)) {
            return Some(*intent);
        }
    }
    None
}

/// LLM fallback when the keyword pre-router can't confidently label the
/// turn (spec §4.9 step 1).
pub async fn classify_with_llm(llm: &dyn LlmGateway, chat_text: &str) -> Result<ClassifiedIntent> {
    let schema = json!({
        "type": "object",
        "properties": {
            "intent": {"type": "string", "enum": ["edit", "plan", "explain", "book", "enrich", "undo", "replan_today"]},
            "day": {"type": "integer"},
            "node_hints": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["intent"]
    });
    let messages = vec![
        Message::system(
            "Classify the traveler's chat turn into exactly one of: edit, plan, explain, book, enrich, undo, replan_today.",
        ),
        Message::user(chat_text),
    ];
    let value: Value = llm.generate_structured(&messages, &schema).await?;
    serde_json::from_value(value).map_err(|e| Error::InvalidStructuredResponse(e.to_string()))
}
