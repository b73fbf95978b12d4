use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::errors::AgentResult;
use super::llm::LlmClient;
use super::prompts::library;
use super::types::Stage;
use super::worker::AgentWorker;
use crate::bus::{AgentBus, Delivery, Subscription};
use crate::domain::message::{topics, AgentRole, Message, MessageKind};

/// The article-writing team wired onto one bus
///
/// The Planner is driven by [`Crew::submit`]; every other agent reacts to the
/// topic published by its upstream neighbour:
/// ```text
/// planReady -> Researcher -> researchReady -> Writer -> draftReady
///   -> Reviewer -> reviewComplete -> Writer (rewrite) -> rewriteComplete
/// ```
pub struct Crew {
    bus: AgentBus,
    llm: Arc<dyn LlmClient>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Crew {
    /// Subscribes the default pipeline stages to `bus`
    pub fn start(bus: AgentBus, llm: Arc<dyn LlmClient>) -> Self {
        Self::with_stages(bus, llm, Stage::pipeline())
    }

    pub fn with_stages(bus: AgentBus, llm: Arc<dyn LlmClient>, stages: Vec<Stage>) -> Self {
        let subscriptions = stages
            .into_iter()
            .map(|stage| Self::attach(&bus, &llm, stage))
            .collect();

        tracing::info!(provider = llm.provider(), model = llm.model(), "Crew started");

        Self {
            bus,
            llm,
            subscriptions: Mutex::new(subscriptions),
        }
    }

    fn attach(bus: &AgentBus, llm: &Arc<dyn LlmClient>, stage: Stage) -> Subscription {
        let bus_handle = bus.clone();
        let llm = Arc::clone(llm);
        let stage = Arc::new(stage);
        let topic = stage.listens_on;

        bus.subscribe(topic, move |delivery: Delivery| {
            if !bus_handle.is_current(delivery.epoch) {
                tracing::debug!(topic = %delivery.topic, epoch = delivery.epoch, "Discarding stale delivery");
                return;
            }

            let worker = AgentWorker::new(stage.role, bus_handle.clone(), Arc::clone(&llm))
                .in_epoch(delivery.epoch);
            let stage = Arc::clone(&stage);

            tokio::spawn(async move {
                if let Err(e) = worker.run_stage(&stage, &delivery.message).await {
                    tracing::error!(
                        agent = stage.role.bus_name(),
                        topic = stage.listens_on,
                        error = %e,
                        "Stage failed"
                    );
                }
            });
        })
    }

    /// Plans `topic` and publishes the plan, opening a new flow
    pub async fn submit(&self, topic: &str) -> AgentResult<Message> {
        let planner = AgentWorker::new(AgentRole::Planner, self.bus.clone(), Arc::clone(&self.llm));
        let vars = HashMap::from([("topic".to_string(), topic.to_string())]);
        let prompt = library::planner().to_prompt(&vars)?;

        tracing::info!(topic, "Planning new article");

        // The plan goes first so the planner's LLM traffic belongs to the flow it opens.
        let exchange = planner.consult_deferred(prompt).await?;
        planner.publish_with(
            topics::PLAN_READY,
            AgentRole::Researcher.bus_name(),
            MessageKind::Plan,
            exchange,
        )
    }

    pub fn bus(&self) -> &AgentBus {
        &self.bus
    }

    /// Unsubscribes every stage; in-flight stage runs still finish
    pub fn shutdown(&self) {
        let subscriptions = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for subscription in &subscriptions {
            subscription.unsubscribe();
        }
        tracing::info!(stages = subscriptions.len(), "Crew shut down");
    }
}
