use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::usage::Usage;
use super::value_objects::{MessageKind, LLM};

/// Role of one entry in an LLM prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role/content pair of a structured prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One event on the agent bus
///
/// Messages are values: once emitted, the bus never changes them. Optional
/// fields are omitted from JSON when absent.
///
/// # Example
/// ```
/// use agent_bus::domain::message::{Message, MessageKind};
///
/// let plan = Message::new("PlannerAgent", "ResearchAgent", MessageKind::Plan, "Outline")
///     .with_id("plan-1");
///
/// assert_eq!(plan.kind, MessageKind::Plan);
/// assert_eq!(plan.id.as_deref(), Some("plan-1"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub sender: String,
    pub receiver: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Vec<PromptMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Message {
    /// Creates a message stamped with the current time and no id
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        kind: impl Into<MessageKind>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            sender: sender.into(),
            receiver: receiver.into(),
            kind: kind.into(),
            content: content.into(),
            timestamp: Utc::now(),
            prompt: None,
            provider: None,
            model: None,
            usage: None,
        }
    }

    /// An `llm_request` from `sender`; the payload travels in `prompt`
    pub fn llm_request(sender: impl Into<String>, prompt: Vec<PromptMessage>) -> Self {
        Self::new(sender, LLM, MessageKind::LlmRequest, "").with_prompt(prompt)
    }

    /// An `llm_response` carrying the model's output back to `sender`
    pub fn llm_response(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender, LLM, MessageKind::LlmResponse, content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Assigns a fresh random v4 id
    pub fn with_random_id(self) -> Self {
        self.with_id(Uuid::new_v4().to_string())
    }

    pub fn with_prompt(mut self, prompt: Vec<PromptMessage>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_llm(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self.model = Some(model.into());
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Overrides the creation time
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_llm(&self) -> bool {
        self.kind.is_llm()
    }

    /// True when `sender` matches and the message carries `kind`
    pub fn is_from(&self, sender: &str, kind: &MessageKind) -> bool {
        self.sender == sender && &self.kind == kind
    }
}
