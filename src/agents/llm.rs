use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;

use super::errors::{AgentError, AgentResult};
use crate::domain::message::{PromptMessage, RawUsage, Role, Usage};

/// What an LLM call produced
#[derive(Debug, Clone, PartialEq)]
pub struct LlmReply {
    pub content: String,
    pub usage: Option<Usage>,
}

impl LlmReply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Parses a provider body of the form `{"content": ..., "usage": {...}}`
    ///
    /// The usage object may use any supported vocabulary; it is normalized.
    pub fn from_json(body: &str) -> AgentResult<Self> {
        #[derive(Deserialize)]
        struct Body {
            content: String,
            #[serde(default)]
            usage: Option<RawUsage>,
        }

        let body: Body = serde_json::from_str(body)?;
        Ok(Self {
            content: body.content,
            usage: body.usage.map(Usage::from),
        })
    }
}

/// Opaque asynchronous LLM capability used by the agent drivers
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(&self, prompt: &[PromptMessage]) -> AgentResult<LlmReply>;

    /// Provider label recorded on LLM messages
    fn provider(&self) -> &str;

    /// Model label recorded on LLM messages
    fn model(&self) -> &str;
}

/// Offline client that answers with the last user message
///
/// Usage is estimated from whitespace-separated words.
#[derive(Debug, Clone)]
pub struct EchoLlm {
    provider: String,
    model: String,
}

impl EchoLlm {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmClient for EchoLlm {
    async fn invoke(&self, prompt: &[PromptMessage]) -> AgentResult<LlmReply> {
        let input = prompt
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .ok_or_else(|| AgentError::LlmError("prompt has no user message".to_string()))?;

        let prompt_words: usize = prompt.iter().map(|m| m.content.split_whitespace().count()).sum();
        let content = format!("[{}] {}", self.model, input);
        let usage = Usage::new(
            prompt_words as u64,
            content.split_whitespace().count() as u64,
        );

        Ok(LlmReply::new(content).with_usage(usage))
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Client that replays a fixed script of replies and failures in order
///
/// Once the script is exhausted every call fails.
#[derive(Debug)]
pub struct ScriptedLlm {
    model: String,
    script: Mutex<VecDeque<Result<LlmReply, String>>>,
    prompts: Mutex<Vec<Vec<PromptMessage>>>,
}

impl ScriptedLlm {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, reply: LlmReply) -> Self {
        self.push(Ok(reply));
        self
    }

    pub fn fail(self, reason: impl Into<String>) -> Self {
        self.push(Err(reason.into()));
        self
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<Vec<PromptMessage>> {
        self.prompts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn push(&self, entry: Result<LlmReply, String>) {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(entry);
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn invoke(&self, prompt: &[PromptMessage]) -> AgentResult<LlmReply> {
        self.prompts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(prompt.to_vec());

        let next = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();

        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(AgentError::LlmError(reason)),
            None => Err(AgentError::LlmError("script exhausted".to_string())),
        }
    }

    fn provider(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_answers_last_user_message() {
        let llm = EchoLlm::new("offline", "echo-1");
        let prompt = vec![PromptMessage::system("be brief"), PromptMessage::user("hello world")];

        let reply = llm.invoke(&prompt).await.unwrap();

        assert_eq!(reply.content, "[echo-1] hello world");
        let usage = reply.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 4);
        assert_eq!(usage.completion_tokens, 3);
        assert_eq!(usage.total_tokens, 7);
    }

    #[tokio::test]
    async fn echo_rejects_prompt_without_user_message() {
        let llm = EchoLlm::new("offline", "echo-1");
        let result = llm.invoke(&[PromptMessage::system("x")]).await;
        assert!(matches!(result, Err(AgentError::LlmError(_))));
    }

    #[tokio::test]
    async fn scripted_replays_in_order_then_fails() {
        let llm = ScriptedLlm::new("script-1")
            .reply(LlmReply::new("first"))
            .fail("rate limited");

        assert_eq!(llm.invoke(&[]).await.unwrap().content, "first");
        assert!(matches!(llm.invoke(&[]).await, Err(AgentError::LlmError(r)) if r == "rate limited"));
        assert!(llm.invoke(&[]).await.is_err());
        assert_eq!(llm.prompts().len(), 3);
    }

    #[test]
    fn reply_from_json_normalizes_usage() {
        let reply =
            LlmReply::from_json(r#"{"content": "hi", "usage": {"input_tokens": 2, "output_tokens": 1}}"#)
                .unwrap();

        assert_eq!(reply.content, "hi");
        assert_eq!(reply.usage, Some(Usage::new(2, 1)));
    }

    #[test]
    fn reply_from_invalid_json_is_an_error() {
        assert!(matches!(
            LlmReply::from_json("not json"),
            Err(AgentError::JsonError(_))
        ));
    }
}
