use std::sync::Arc;

use super::errors::{AgentError, AgentResult};
use super::llm::{LlmClient, LlmReply};
use super::types::Stage;
use crate::bus::AgentBus;
use crate::domain::message::{topics, AgentRole, Message, MessageKind, PromptMessage};

/// Bus-facing side of one agent: publishes its LLM traffic and results
///
/// Every operation is bound to the epoch the worker was created in; once
/// the bus is reset, the worker stops publishing and reports
/// [`AgentError::Superseded`].
#[derive(Clone)]
pub struct AgentWorker {
    pub role: AgentRole,
    bus: AgentBus,
    llm: Arc<dyn LlmClient>,
    epoch: u64,
}

impl AgentWorker {
    pub fn new(role: AgentRole, bus: AgentBus, llm: Arc<dyn LlmClient>) -> Self {
        let epoch = bus.epoch();
        Self {
            role,
            bus,
            llm,
            epoch,
        }
    }

    /// Binds the worker to a specific epoch, e.g. that of a delivery
    pub fn in_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    fn name(&self) -> &'static str {
        self.role.bus_name()
    }

    fn stale(&self) -> AgentError {
        if self.bus.is_disposed() {
            AgentError::BusDisposed
        } else {
            AgentError::Superseded {
                agent: self.name().to_string(),
                epoch: self.epoch,
            }
        }
    }

    fn ensure_current(&self) -> AgentResult<()> {
        if self.bus.is_disposed() || !self.bus.is_current(self.epoch) {
            return Err(self.stale());
        }
        Ok(())
    }

    fn emit(&self, topic: &str, message: Message) -> AgentResult<()> {
        if self.bus.emit_in_epoch(self.epoch, topic, message) {
            Ok(())
        } else {
            Err(self.stale())
        }
    }

    fn request_message(&self, prompt: &[PromptMessage]) -> Message {
        Message::llm_request(self.name(), prompt.to_vec())
            .with_llm(self.llm.provider(), self.llm.model())
    }

    fn response_message(&self, prompt: Vec<PromptMessage>, reply: &LlmReply) -> Message {
        let mut response = Message::llm_response(self.name(), reply.content.clone())
            .with_prompt(prompt)
            .with_llm(self.llm.provider(), self.llm.model());
        response.usage = reply.usage;
        response
    }

    async fn invoke(&self, prompt: &[PromptMessage]) -> AgentResult<LlmReply> {
        self.bus.set_active_agent(Some(self.name()));
        let result = self.llm.invoke(prompt).await;
        self.bus.set_active_agent(None);

        result.map_err(|e| {
            tracing::error!(agent = self.name(), error = %e, "LLM call failed");
            e
        })
    }

    /// Calls the LLM, recording the request and response on the bus
    ///
    /// A failed call leaves its `llm_request` without a response.
    pub async fn consult(&self, prompt: Vec<PromptMessage>) -> AgentResult<LlmReply> {
        self.ensure_current()?;
        self.emit(topics::LLM_REQUEST, self.request_message(&prompt))?;

        let reply = self.invoke(&prompt).await?;

        self.emit(topics::LLM_RESPONSE, self.response_message(prompt, &reply))?;
        Ok(reply)
    }

    /// Calls the LLM and holds the exchange back for [`AgentWorker::publish_with`]
    ///
    /// Used by agents whose output opens a flow, so that their LLM traffic
    /// lands after the message it produced. A failed call is still recorded
    /// as an unanswered `llm_request`.
    pub async fn consult_deferred(&self, prompt: Vec<PromptMessage>) -> AgentResult<LlmExchange> {
        self.ensure_current()?;
        let request = self.request_message(&prompt);

        let reply = match self.invoke(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                self.emit(topics::LLM_REQUEST, request)?;
                return Err(e);
            }
        };

        Ok(LlmExchange {
            request,
            response: self.response_message(prompt, &reply),
            reply,
        })
    }

    /// Publishes a domain message from this agent under a fresh id
    pub fn publish(
        &self,
        topic: &str,
        receiver: &str,
        kind: MessageKind,
        content: impl Into<String>,
    ) -> AgentResult<Message> {
        let message = Message::new(self.name(), receiver, kind, content).with_random_id();
        self.emit(topic, message.clone())?;
        Ok(message)
    }

    /// Publishes the exchange's reply followed by the exchange itself
    ///
    /// The three messages are appended as one batch, so nothing emitted
    /// concurrently (e.g. by a downstream agent reacting to the output) can
    /// land between them.
    pub fn publish_with(
        &self,
        topic: &str,
        receiver: &str,
        kind: MessageKind,
        exchange: LlmExchange,
    ) -> AgentResult<Message> {
        let message = Message::new(self.name(), receiver, kind, exchange.reply.content)
            .with_random_id();
        let batch = [
            (topic, message.clone()),
            (topics::LLM_REQUEST, exchange.request),
            (topics::LLM_RESPONSE, exchange.response),
        ];

        if self.bus.emit_all_in_epoch(self.epoch, batch) {
            Ok(message)
        } else {
            Err(self.stale())
        }
    }

    /// Runs `stage` for the message that triggered it
    pub async fn run_stage(&self, stage: &Stage, trigger: &Message) -> AgentResult<Message> {
        let log = self.bus.messages();
        let prompt = stage.template.to_prompt(&(stage.vars)(trigger, log.as_slice()))?;

        tracing::info!(
            agent = self.name(),
            template = %stage.template.name,
            topic = stage.listens_on,
            "Stage started"
        );

        let reply = self.consult(prompt).await?;
        let output = self.publish(
            stage.publishes_on,
            stage.receiver.bus_name(),
            stage.kind.clone(),
            reply.content,
        )?;

        tracing::info!(agent = self.name(), topic = stage.publishes_on, "Stage finished");
        Ok(output)
    }
}

/// An LLM call that has completed but is not yet on the bus
#[derive(Debug, Clone)]
pub struct LlmExchange {
    pub request: Message,
    pub response: Message,
    pub reply: LlmReply,
}

impl std::fmt::Debug for AgentWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentWorker")
            .field("role", &self.role)
            .field("model", &self.llm.model())
            .field("epoch", &self.epoch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::llm::ScriptedLlm;
    use crate::domain::message::{Usage, LLM};

    #[tokio::test]
    async fn consult_records_request_and_response() {
        let bus = AgentBus::new();
        let llm = ScriptedLlm::new("m1").reply(LlmReply::new("answer").with_usage(Usage::new(3, 4)));
        let worker = AgentWorker::new(AgentRole::Reviewer, bus.clone(), Arc::new(llm));

        let reply = worker.consult(vec![PromptMessage::user("q")]).await.unwrap();

        assert_eq!(reply.content, "answer");
        let log = bus.messages();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, MessageKind::LlmRequest);
        assert_eq!(log[0].receiver, LLM);
        assert_eq!(log[0].model.as_deref(), Some("m1"));
        assert_eq!(log[1].kind, MessageKind::LlmResponse);
        assert_eq!(log[1].usage.map(|u| u.total_tokens), Some(7));
        assert_eq!(bus.active_agent(), None);
    }

    #[tokio::test]
    async fn failed_call_leaves_request_unanswered() {
        let bus = AgentBus::new();
        let llm = ScriptedLlm::new("m1").fail("timeout");
        let worker = AgentWorker::new(AgentRole::Writer, bus.clone(), Arc::new(llm));

        let result = worker.consult(vec![PromptMessage::user("q")]).await;

        assert!(matches!(result, Err(AgentError::LlmError(_))));
        assert_eq!(bus.len(), 1);
        assert_eq!(bus.messages()[0].kind, MessageKind::LlmRequest);
    }

    #[tokio::test]
    async fn stale_worker_refuses_to_publish() {
        let bus = AgentBus::new();
        let worker = AgentWorker::new(AgentRole::Planner, bus.clone(), Arc::new(ScriptedLlm::new("m")));
        bus.reset();

        let result = worker.publish("planReady", "ResearchAgent", MessageKind::Plan, "p");

        assert!(matches!(result, Err(AgentError::Superseded { epoch: 0, .. })));
        assert!(bus.is_empty());
    }

    #[tokio::test]
    async fn deferred_exchange_lands_after_its_output() {
        let bus = AgentBus::new();
        let llm = ScriptedLlm::new("m").reply(LlmReply::new("outline").with_usage(Usage::new(2, 3)));
        let worker = AgentWorker::new(AgentRole::Planner, bus.clone(), Arc::new(llm));

        let exchange = worker.consult_deferred(vec![PromptMessage::user("topic")]).await.unwrap();
        assert!(bus.is_empty());

        let plan = worker
            .publish_with("planReady", "ResearchAgent", MessageKind::Plan, exchange)
            .unwrap();

        let log = bus.messages();
        assert_eq!(plan.content, "outline");
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].kind, MessageKind::Plan);
        assert_eq!(log[1].kind, MessageKind::LlmRequest);
        assert_eq!(log[2].kind, MessageKind::LlmResponse);
        assert_eq!(log[2].usage.map(|u| u.total_tokens), Some(5));
    }

    #[tokio::test]
    async fn deferred_failure_records_unanswered_request() {
        let bus = AgentBus::new();
        let llm = ScriptedLlm::new("m").fail("down");
        let worker = AgentWorker::new(AgentRole::Planner, bus.clone(), Arc::new(llm));

        let result = worker.consult_deferred(vec![PromptMessage::user("topic")]).await;

        assert!(matches!(result, Err(AgentError::LlmError(_))));
        assert_eq!(bus.len(), 1);
        assert_eq!(bus.messages()[0].kind, MessageKind::LlmRequest);
    }

    #[tokio::test]
    async fn deferred_exchange_is_dropped_after_reset() {
        let bus = AgentBus::new();
        let llm = ScriptedLlm::new("m").reply(LlmReply::new("outline"));
        let worker = AgentWorker::new(AgentRole::Planner, bus.clone(), Arc::new(llm));
        let exchange = worker.consult_deferred(vec![PromptMessage::user("topic")]).await.unwrap();

        bus.reset();
        let result = worker.publish_with("planReady", "ResearchAgent", MessageKind::Plan, exchange);

        assert!(matches!(result, Err(AgentError::Superseded { epoch: 0, .. })));
        assert!(bus.is_empty());
    }

    #[tokio::test]
    async fn disposed_bus_reports_disposed() {
        let bus = AgentBus::new();
        let worker = AgentWorker::new(AgentRole::Writer, bus.clone(), Arc::new(ScriptedLlm::new("m")));
        bus.dispose();

        let result = worker.publish("draftReady", "ReviewerAgent", MessageKind::Draft, "v1");

        assert!(matches!(result, Err(AgentError::BusDisposed)));
    }

    #[tokio::test]
    async fn run_stage_publishes_output() {
        let bus = AgentBus::new();
        let llm = ScriptedLlm::new("m").reply(LlmReply::new("notes"));
        let worker = AgentWorker::new(AgentRole::Researcher, bus.clone(), Arc::new(llm));
        let plan = Message::new("PlannerAgent", "ResearchAgent", MessageKind::Plan, "outline");

        let output = worker.run_stage(&Stage::research(), &plan).await.unwrap();

        assert_eq!(output.kind, MessageKind::Research);
        assert_eq!(output.receiver, "WriterAgent");
        assert!(output.id.is_some());
        assert_eq!(bus.len(), 3);
    }
}
