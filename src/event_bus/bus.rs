//! In-process event bus: per-itinerary pub/sub with monotonic sequence
//! numbers (spec §4.2).
//!
//! Grounded on the teacher's `agent_network.rs` concurrent-registry shape
//! (`Arc<RwLock<HashMap<_, _>>>`), here mapping itinerary id to a broadcast
//! channel instead of agent handle. `tokio::sync::broadcast` gives
//! at-least-once fan-out and drops lagging/dead subscribers automatically —
//! exactly the Non-goal spec §4.2 explicitly permits (exactly-once delivery
//! is not required).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::types::Event;

const CHANNEL_CAPACITY: usize = 256;

struct ItineraryChannel {
    sender: broadcast::Sender<Event>,
    next_seq: u64,
}

/// Publishes and subscribes to `Event`s scoped to a single itinerary.
/// Sequence numbers are monotonic per itinerary, assigned at publish time,
/// and never reused even across server restarts within a process lifetime.
pub struct EventBus {
    channels: Arc<RwLock<HashMap<String, ItineraryChannel>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish an event, stamping it with the next sequence number for its
    /// itinerary. Returns the stamped event. If there are no subscribers,
    /// the event is simply dropped (spec §4.2: publishing never blocks on
    /// the absence of a reader).
    pub async fn publish(&self, itinerary_id: &str, mut build: impl FnMut(u64) -> Event) -> Event {
        let mut channels = self.channels.write().await;
        let channel = channels
            .entry(itinerary_id.to_string())
            .or_insert_with(|| ItineraryChannel {
                sender: broadcast::channel(CHANNEL_CAPACITY).0,
                next_seq: 1,
            });
        let seq = channel.next_seq;
        channel.next_seq += 1;
        let event = build(seq);
        if channel.sender.send(event.clone()).is_err() {
            debug!(itinerary_id, seq, "no subscribers, event dropped");
        }
        event
    }

    pub async fn subscribe(&self, itinerary_id: &str) -> broadcast::Receiver<Event> {
        let mut channels = self.channels.write().await;
        channels
            .entry(itinerary_id.to_string())
            .or_insert_with(|| ItineraryChannel {
                sender: broadcast::channel(CHANNEL_CAPACITY).0,
                next_seq: 1,
            })
            .sender
            .subscribe()
    }

    /// Drop the channel for an itinerary once nobody references it. Safe to
    /// call speculatively; a subsequent `publish`/`subscribe` recreates it.
    pub async fn evict_if_idle(&self, itinerary_id: &str) {
        let mut channels = self.channels.write().await;
        if let Some(channel) = channels.get(itinerary_id) {
            if channel.sender.receiver_count() == 0 {
                channels.remove(itinerary_id);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::types::{AgentProgressEvent, Phase, PhaseStatus};

    #[tokio::test]
    async fn sequence_numbers_are_monotonic_per_itinerary() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("it_1").await;

        let e1 = bus
            .publish("it_1", |seq| {
                Event::Progress(AgentProgressEvent::new("it_1", seq, Phase::Skeleton, PhaseStatus::Started))
            })
            .await;
        let e2 = bus
            .publish("it_1", |seq| {
                Event::Progress(AgentProgressEvent::new("it_1", seq, Phase::Skeleton, PhaseStatus::Completed))
            })
            .await;

        assert_eq!(e1.seq(), 1);
        assert_eq!(e2.seq(), 2);
        assert_eq!(rx.recv().await.unwrap().seq(), 1);
        assert_eq!(rx.recv().await.unwrap().seq(), 2);
    }

    #[tokio::test]
    async fn separate_itineraries_have_independent_sequences() {
        let bus = EventBus::new();
        let a = bus
            .publish("it_a", |seq| {
                Event::Progress(AgentProgressEvent::new("it_a", seq, Phase::Skeleton, PhaseStatus::Started))
            })
            .await;
        let b = bus
            .publish("it_b", |seq| {
                Event::Progress(AgentProgressEvent::new("it_b", seq, Phase::Skeleton, PhaseStatus::Started))
            })
            .await;
        assert_eq!(a.seq(), 1);
        assert_eq!(b.seq(), 1);
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_error() {
        let bus = EventBus::new();
        let event = bus
            .publish("it_1", |seq| {
                Event::Progress(AgentProgressEvent::new("it_1", seq, Phase::Skeleton, PhaseStatus::Started))
            })
            .await;
        assert_eq!(event.seq(), 1);
    }
}
