//! Orchestrator (spec §4.8): the five-phase generation pipeline —
//! skeleton → parallel population → enrichment → cost estimation →
//! finalization — with real-time progress fan-out over the event bus.
//!
//! Phase 2's concurrent fan-out is grounded on `agent_network.rs`'s
//! `Arc<RwLock<HashMap<_, Box<dyn _>>>>` concurrent-query pattern
//! (`src/agents::AgentRegistry` here), generalized from domain routing to
//! running the three population agents for one day side by side and
//! joining their results — see `DESIGN.md` §4.11. The join itself follows
//! `task_scheduler/scheduler.rs`'s parallel-dispatch-then-join shape.
//!
//! Every phase's mutation is routed through `ChangeEngine::apply_mutation`
//! rather than touching `itinerary.days` in place, so each phase bumps
//! `version` and publishes a `PatchEvent` the same way a chat-originated
//! edit does (spec §4.8: "each apply increments version").

use std::sync::Arc;

use tracing::{error, info, warn};
use tokio::time::timeout;

use crate::agents::{AgentContext, AgentOutcome};
use crate::change_engine::{changed_fields, recompute_day, ChangeEngine};
use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::event_bus::{AgentProgressEvent, Event, EventBus, Phase, PhaseStatus};
use crate::llm::LlmGateway;
use crate::model::{Author, Day, Diff, DiffUpdate, Itinerary, Node, NodeRef};
use crate::registry::AgentRegistry;
use crate::store::StoreAdapter;

/// Task types the orchestrator routes through the registry for each phase.
/// These are the same `taskType` strings pipeline agents register under
/// (spec §4.5), kept here as constants so the orchestrator and the
/// embedding application's registration code can't drift apart silently.
pub mod task_types {
    pub const SKELETON: &str = "skeleton";
    pub const POPULATE_ACTIVITIES: &str = "populate_attractions";
    pub const POPULATE_MEALS: &str = "populate_meals";
    pub const POPULATE_TRANSPORT: &str = "populate_transport";
    pub const ENRICH_DAY: &str = "enrich_day";
    pub const ESTIMATE_COST: &str = "estimate_costs";
}

pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    change_engine: Arc<ChangeEngine>,
    store: Arc<dyn StoreAdapter>,
    event_bus: Arc<EventBus>,
    llm: Arc<dyn LlmGateway>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        change_engine: Arc<ChangeEngine>,
        store: Arc<dyn StoreAdapter>,
        event_bus: Arc<EventBus>,
        llm: Arc<dyn LlmGateway>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { registry, change_engine, store, event_bus, llm, config }
    }

    /// Runs the full five-phase pipeline for an itinerary that already
    /// exists in the store with empty `days` (created synchronously by the
    /// caller at request time, per spec §4.8: "a client requests an
    /// itinerary... the system returns an identifier immediately").
    pub async fn generate(&self, itinerary_id: &str, destination: &str, num_days: u32) -> Result<Itinerary> {
        let itinerary = self
            .store
            .get_itinerary(itinerary_id)
            .await?
            .ok_or_else(|| Error::NotFound(itinerary_id.to_string()))?;

        let itinerary = self.run_skeleton_phase(itinerary, destination, num_days).await?;
        let itinerary = self.run_population_phase(itinerary).await;
        let itinerary = self.run_enrichment_phase(itinerary).await;
        let itinerary = self.run_cost_estimation_phase(itinerary).await;
        let itinerary = self.run_finalization_phase(itinerary).await?;

        Ok(itinerary)
    }

    async fn emit(&self, itinerary_id: &str, phase: Phase, status: PhaseStatus, agent_id: Option<&str>) {
        let agent_id = agent_id.map(str::to_string);
        self.event_bus
            .publish(itinerary_id, |seq| {
                let mut event = AgentProgressEvent::new(itinerary_id, seq, phase, status);
                event.agent_id = agent_id.clone();
                Event::Progress(event)
            })
            .await;
    }

    async fn phase_timeout<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        match timeout(std::time::Duration::from_secs(self.config.phase_timeout_sec), fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::AgentTimeout {
                agent_id: "phase".to_string(),
                elapsed: std::time::Duration::from_secs(self.config.phase_timeout_sec),
            }),
        }
    }

    async fn run_skeleton_phase(&self, itinerary: Itinerary, destination: &str, num_days: u32) -> Result<Itinerary> {
        self.emit(&itinerary.id, Phase::Skeleton, PhaseStatus::Started, None).await;
        let agent = self.registry.route(task_types::SKELETON).await?;
        let ctx = AgentContext {
            itinerary: itinerary.clone(),
            day_number: None,
            params: serde_json::json!({"destination": destination, "num_days": num_days}),
            user_message: None,
            llm: self.llm.clone(),
        };
        let outcome = self.phase_timeout(agent.execute(ctx)).await?;
        let days = match outcome {
            AgentOutcome::Days(days) => days,
            other => return Err(Error::Internal(format!("skeleton agent returned unexpected outcome: {:?}", other))),
        };

        let (updated, _diff) = self
            .change_engine
            .apply_mutation(&itinerary.id, Author::Agent, move |working| {
                let added = days
                    .iter()
                    .flat_map(|d| d.nodes.iter().map(|n| NodeRef { id: n.id.clone(), day: d.day_number }))
                    .collect();
                working.days = days.clone();
                Ok(Diff { added, removed: Vec::new(), updated: Vec::new() })
            })
            .await?;

        self.emit(&updated.id, Phase::Skeleton, PhaseStatus::Completed, None).await;
        Ok(updated)
    }

    /// Fans the three population agents out concurrently for every day,
    /// isolating a single failing agent rather than failing the whole
    /// phase (spec §4.8, §9 Open Question resolution recorded in
    /// `SPEC_FULL.md`). Each successful agent's output is applied through
    /// the change engine as its own mutation, in the fixed order the tasks
    /// are listed in, so concurrent execution never races on who bumps
    /// `version` first.
    async fn run_population_phase(&self, itinerary: Itinerary) -> Itinerary {
        self.emit(&itinerary.id, Phase::Population, PhaseStatus::Started, None).await;

        let mut itinerary = itinerary;
        let day_numbers: Vec<u32> = itinerary.days.iter().map(|d| d.day_number).collect();

        for day_number in day_numbers {
            let tasks = [
                (task_types::POPULATE_ACTIVITIES, "activity_agent"),
                (task_types::POPULATE_MEALS, "meal_agent"),
                (task_types::POPULATE_TRANSPORT, "transport_agent"),
            ];
            let results = futures::future::join_all(tasks.iter().map(|(task_type, agent_id)| {
                let itinerary_snapshot = itinerary.clone();
                let llm = self.llm.clone();
                let registry = self.registry.clone();
                async move {
                    let agent = registry.route(task_type).await?;
                    let ctx = AgentContext {
                        itinerary: itinerary_snapshot,
                        day_number: Some(day_number),
                        params: serde_json::Value::Null,
                        user_message: None,
                        llm,
                    };
                    agent.execute(ctx).await.map(|outcome| (*agent_id, outcome))
                }
            }))
            .await;

            for result in results {
                match result {
                    Ok((agent_id, AgentOutcome::Nodes(nodes))) if !nodes.is_empty() => {
                        match self.apply_population_result(&itinerary.id, day_number, nodes).await {
                            Ok(updated) => {
                                itinerary = updated;
                                self.emit(&itinerary.id, Phase::Population, PhaseStatus::Progress, Some(agent_id)).await;
                            }
                            Err(err) => {
                                error!(error = %err, day_number, agent_id, "failed to apply population agent output");
                            }
                        }
                    }
                    Ok((agent_id, AgentOutcome::Nodes(_))) => {
                        self.emit(&itinerary.id, Phase::Population, PhaseStatus::Progress, Some(agent_id)).await;
                    }
                    Ok((agent_id, other)) => {
                        warn!(agent_id, "population agent returned unexpected outcome: {:?}", other);
                    }
                    Err(err) => {
                        error!(error = %err, day_number, "population agent failed, isolating and continuing");
                        let message = format!("a population agent failed for day {}: {}", day_number, err);
                        if let Ok(updated) = self.record_day_warning(&itinerary.id, day_number, message).await {
                            itinerary = updated;
                        }
                    }
                }
            }
        }

        self.emit(&itinerary.id, Phase::Population, PhaseStatus::Completed, None).await;
        itinerary
    }

    async fn apply_population_result(&self, itinerary_id: &str, day_number: u32, nodes: Vec<Node>) -> Result<Itinerary> {
        let (updated, _diff) = self
            .change_engine
            .apply_mutation(itinerary_id, Author::Agent, move |working| {
                let day = working
                    .day_mut(day_number)
                    .ok_or_else(|| Error::NotFound(format!("day {}", day_number)))?;
                let diff = merge_populated_nodes(day, nodes.clone());
                recompute_day(day);
                Ok(diff)
            })
            .await?;
        Ok(updated)
    }

    async fn run_enrichment_phase(&self, itinerary: Itinerary) -> Itinerary {
        self.emit(&itinerary.id, Phase::Enrichment, PhaseStatus::Started, None).await;

        let mut itinerary = itinerary;
        let day_numbers: Vec<u32> = itinerary.days.iter().map(|d| d.day_number).collect();

        for day_number in day_numbers {
            let agent = match self.registry.route(task_types::ENRICH_DAY).await {
                Ok(agent) => agent,
                Err(err) => {
                    warn!(error = %err, day_number, "no enrichment agent registered, skipping");
                    continue;
                }
            };
            let ctx = AgentContext {
                itinerary: itinerary.clone(),
                day_number: Some(day_number),
                params: serde_json::Value::Null,
                user_message: None,
                llm: self.llm.clone(),
            };
            match agent.execute(ctx).await {
                Ok(AgentOutcome::Days(mut days)) if !days.is_empty() => {
                    let enriched_day = days.remove(0);
                    match self.apply_day_replacement(&itinerary.id, day_number, enriched_day).await {
                        Ok(updated) => itinerary = updated,
                        Err(err) => warn!(error = %err, day_number, "failed to apply enrichment result"),
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, day_number, "enrichment failed for day, continuing with unenriched nodes");
                    let message = format!("enrichment failed for day {}: {}", day_number, err);
                    if let Ok(updated) = self.record_day_warning(&itinerary.id, day_number, message).await {
                        itinerary = updated;
                    }
                }
            }
        }

        self.emit(&itinerary.id, Phase::Enrichment, PhaseStatus::Completed, None).await;
        itinerary
    }

    async fn apply_day_replacement(&self, itinerary_id: &str, day_number: u32, new_day: Day) -> Result<Itinerary> {
        let (updated, _diff) = self
            .change_engine
            .apply_mutation(itinerary_id, Author::Agent, move |working| {
                let day = working
                    .day_mut(day_number)
                    .ok_or_else(|| Error::NotFound(format!("day {}", day_number)))?;
                let diff = diff_day_replacement(day, &new_day);
                *day = new_day.clone();
                Ok(diff)
            })
            .await?;
        Ok(updated)
    }

    /// Cost estimation runs once over the whole itinerary (spec §4.7: party
    /// normalization needs every day's costs to roll up an itinerary-root
    /// total), unlike the per-day phases around it.
    async fn run_cost_estimation_phase(&self, itinerary: Itinerary) -> Itinerary {
        self.emit(&itinerary.id, Phase::CostEstimation, PhaseStatus::Started, None).await;

        let agent = match self.registry.route(task_types::ESTIMATE_COST).await {
            Ok(agent) => agent,
            Err(err) => {
                warn!(error = %err, "no cost estimator registered, skipping");
                self.emit(&itinerary.id, Phase::CostEstimation, PhaseStatus::Completed, None).await;
                return itinerary;
            }
        };
        let ctx = AgentContext {
            itinerary: itinerary.clone(),
            day_number: None,
            params: serde_json::Value::Null,
            user_message: None,
            llm: self.llm.clone(),
        };
        let itinerary = match agent.execute(ctx).await {
            Ok(AgentOutcome::Days(days)) => match self.apply_cost_totals(&itinerary.id, days).await {
                Ok(updated) => updated,
                Err(err) => {
                    warn!(error = %err, "failed to apply cost totals");
                    itinerary
                }
            },
            Ok(_) => itinerary,
            Err(err) => {
                warn!(error = %err, "cost estimation failed");
                itinerary
            }
        };

        self.emit(&itinerary.id, Phase::CostEstimation, PhaseStatus::Completed, None).await;
        itinerary
    }

    async fn apply_cost_totals(&self, itinerary_id: &str, days: Vec<Day>) -> Result<Itinerary> {
        let (updated, _diff) = self
            .change_engine
            .apply_mutation(itinerary_id, Author::Agent, move |working| {
                for day in &days {
                    if let Some(existing) = working.day_mut(day.day_number) {
                        existing.totals.cost = day.totals.cost;
                    }
                }
                working.total_cost = working.days.iter().map(|d| d.totals.cost).sum();
                Ok(Diff::default())
            })
            .await?;
        Ok(updated)
    }

    async fn record_day_warning(&self, itinerary_id: &str, day_number: u32, message: String) -> Result<Itinerary> {
        let (updated, _diff) = self
            .change_engine
            .apply_mutation(itinerary_id, Author::Agent, move |working| {
                if let Some(day) = working.day_mut(day_number) {
                    day.warnings.push(message.clone());
                }
                Ok(Diff::default())
            })
            .await?;
        Ok(updated)
    }

    /// By the time generation reaches this phase every prior phase has
    /// already persisted its own changes through `ChangeEngine::apply_mutation`
    /// — finalization just re-reads the durable result and announces
    /// completion rather than writing anything itself.
    async fn run_finalization_phase(&self, itinerary: Itinerary) -> Result<Itinerary> {
        self.emit(&itinerary.id, Phase::Finalization, PhaseStatus::Started, None).await;
        let itinerary = self
            .store
            .get_itinerary(&itinerary.id)
            .await?
            .ok_or_else(|| Error::NotFound(itinerary.id.clone()))?;
        self.emit(&itinerary.id, Phase::Finalization, PhaseStatus::Completed, None).await;
        info!(itinerary_id = %itinerary.id, version = itinerary.version, "generation pipeline finalized");
        Ok(itinerary)
    }
}

/// Folds a population agent's output into `day.nodes` in place: a node
/// whose id matches an existing one (the normal case — a populated node
/// replacing the placeholder it was generated for, per the node-id
/// contract in spec §8) overwrites it, preserving position; anything else
/// is appended. Returns the `Diff` describing what changed so the caller
/// can publish it alongside the version bump.
fn merge_populated_nodes(day: &mut Day, nodes: Vec<Node>) -> Diff {
    let mut diff = Diff::default();
    let day_number = day.day_number;
    for node in nodes {
        if let Some(existing) = day.nodes.iter_mut().find(|n| n.id == node.id) {
            let fields = changed_fields(existing, &node);
            if !fields.is_empty() {
                diff.updated.push(DiffUpdate { id: node.id.clone(), fields });
            }
            *existing = node;
        } else {
            diff.added.push(NodeRef { id: node.id.clone(), day: day_number });
            day.nodes.push(node);
        }
    }
    diff
}

/// Diffs a day before it's overwritten by `new_day` (enrichment replaces
/// the whole day document), node by node, the same way `merge_populated_nodes`
/// does for an incremental merge.
fn diff_day_replacement(old: &Day, new_day: &Day) -> Diff {
    let mut diff = Diff::default();
    for node in &new_day.nodes {
        match old.nodes.iter().find(|n| n.id == node.id) {
            Some(existing) => {
                let fields = changed_fields(existing, node);
                if !fields.is_empty() {
                    diff.updated.push(DiffUpdate { id: node.id.clone(), fields });
                }
            }
            None => diff.added.push(NodeRef { id: node.id.clone(), day: new_day.day_number }),
        }
    }
    for node in &old.nodes {
        if !new_day.nodes.iter().any(|n| n.id == node.id) {
            diff.removed.push(NodeRef { id: node.id.clone(), day: old.day_number });
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{ActivityAgent, CostEstimatorAgent, EnrichmentAgent, MealAgent, SkeletonPlannerAgent, TransportAgent};
    use crate::config::LlmConfig;
    use crate::llm::MockLlmGateway;
    use crate::registry::Capability;
    use crate::store::InMemoryStore;
    use chrono::Utc;

    async fn wired_orchestrator() -> (Orchestrator, Arc<InMemoryStore>, String) {
        let registry = Arc::new(AgentRegistry::new());
        registry
            .register(Arc::new(SkeletonPlannerAgent::new()), Capability { task_type: task_types::SKELETON.to_string(), priority: 1, chat_enabled: false })
            .await
            .unwrap();
        registry
            .register(Arc::new(ActivityAgent::new()), Capability { task_type: task_types::POPULATE_ACTIVITIES.to_string(), priority: 1, chat_enabled: false })
            .await
            .unwrap();
        registry
            .register(Arc::new(MealAgent::new()), Capability { task_type: task_types::POPULATE_MEALS.to_string(), priority: 1, chat_enabled: false })
            .await
            .unwrap();
        registry
            .register(Arc::new(TransportAgent::new()), Capability { task_type: task_types::POPULATE_TRANSPORT.to_string(), priority: 1, chat_enabled: false })
            .await
            .unwrap();
        registry
            .register(Arc::new(EnrichmentAgent::new()), Capability { task_type: task_types::ENRICH_DAY.to_string(), priority: 1, chat_enabled: false })
            .await
            .unwrap();
        registry
            .register(Arc::new(CostEstimatorAgent::new()), Capability { task_type: task_types::ESTIMATE_COST.to_string(), priority: 1, chat_enabled: false })
            .await
            .unwrap();

        let store = Arc::new(InMemoryStore::new());
        let itinerary = Itinerary::new("it_1", "user_1", "USD", Utc::now());
        store.put_itinerary(&itinerary, None).await.unwrap();

        let event_bus = Arc::new(EventBus::new());
        let change_engine = Arc::new(ChangeEngine::new(store.clone(), event_bus.clone(), 50));
        let orchestrator = Orchestrator::new(
            registry,
            change_engine,
            store.clone(),
            event_bus,
            Arc::new(MockLlmGateway::new(LlmConfig::default())),
            OrchestratorConfig::default(),
        );
        (orchestrator, store, "it_1".to_string())
    }

    #[tokio::test]
    async fn generate_produces_the_requested_number_of_days() {
        let (orchestrator, _store, itinerary_id) = wired_orchestrator().await;
        let result = orchestrator.generate(&itinerary_id, "Lisbon", 2).await.unwrap();
        assert_eq!(result.days.len(), 2);
    }

    #[tokio::test]
    async fn generate_populates_and_enriches_nodes() {
        let (orchestrator, _store, itinerary_id) = wired_orchestrator().await;
        let result = orchestrator.generate(&itinerary_id, "Lisbon", 1).await.unwrap();
        let day = &result.days[0];
        assert!(!day.nodes.is_empty());
        assert!(day.nodes.iter().all(|n| n.cost.is_some()));
    }

    #[tokio::test]
    async fn generate_bumps_version_on_every_phase_that_mutated_something() {
        let (orchestrator, store, itinerary_id) = wired_orchestrator().await;
        let result = orchestrator.generate(&itinerary_id, "Lisbon", 1).await.unwrap();
        assert!(result.version > 1, "skeleton, population, enrichment, and cost phases should each bump version");

        let stored = store.get_itinerary(&itinerary_id).await.unwrap().unwrap();
        assert_eq!(stored.version, result.version);
    }

    #[tokio::test]
    async fn generate_preserves_the_day_node_id_contract_through_every_phase() {
        let (orchestrator, _store, itinerary_id) = wired_orchestrator().await;
        let result = orchestrator.generate(&itinerary_id, "Lisbon", 2).await.unwrap();
        for day in &result.days {
            let prefix = format!("day{}_node", day.day_number);
            assert!(day.nodes.iter().all(|n| n.id.starts_with(&prefix)));
            let ids: Vec<&str> = day.nodes.iter().map(|n| n.id.as_str()).collect();
            let unique: std::collections::HashSet<&str> = ids.iter().copied().collect();
            assert_eq!(ids.len(), unique.len(), "no duplicate node ids within a day");
        }
    }

    fn bare_node(id: &str) -> crate::model::Node {
        crate::model::Node {
            id: id.to_string(),
            node_type: crate::model::NodeType::Meal,
            title: id.to_string(),
            location: crate::model::Location::named("x"),
            timing: Default::default(),
            cost: None,
            details: Default::default(),
            labels: vec![],
            tips: Default::default(),
            links: Default::default(),
            locked: false,
            booking_ref: None,
            status: crate::model::NodeStatus::Planned,
            updated_by: crate::model::Author::Agent,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn merge_populated_nodes_overwrites_a_matching_placeholder_in_place() {
        let mut day = crate::model::Day::new(1);
        day.nodes.push(bare_node("day1_node1"));
        day.nodes.push(bare_node("day1_node2"));

        let mut replacement = bare_node("day1_node1");
        replacement.title = "Populated".to_string();
        let diff = merge_populated_nodes(&mut day, vec![replacement]);

        assert_eq!(day.nodes.len(), 2);
        assert_eq!(day.nodes[0].title, "Populated");
        assert_eq!(day.nodes[1].id, "day1_node2");
        assert_eq!(diff.updated.len(), 1);
        assert!(diff.updated[0].fields.contains(&"title".to_string()));
    }

    #[test]
    fn merge_populated_nodes_appends_nodes_with_no_matching_id() {
        let mut day = crate::model::Day::new(1);
        let diff = merge_populated_nodes(&mut day, vec![bare_node("day1_node9")]);
        assert_eq!(day.nodes.len(), 1);
        assert_eq!(diff.added.len(), 1);
    }
}
