use std::collections::HashMap;

use super::prompts::{library, PromptTemplate};
use crate::domain::flow::latest_draft;
use crate::domain::message::{topics, AgentRole, Message, MessageKind};

/// Builds prompt variables from the triggering message and the current log
pub type PromptVars = fn(&Message, &[Message]) -> HashMap<String, String>;

/// One reactive step of the article pipeline
///
/// A stage listens on `listens_on`, asks the LLM using `template`, and
/// publishes the answer on `publishes_on` as a `kind` message from `role` to
/// `receiver`.
#[derive(Debug, Clone)]
pub struct Stage {
    pub role: AgentRole,
    pub listens_on: &'static str,
    pub publishes_on: &'static str,
    pub receiver: AgentRole,
    pub kind: MessageKind,
    pub template: PromptTemplate,
    pub vars: PromptVars,
}

impl Stage {
    /// Researcher: plan → research notes for the Writer
    pub fn research() -> Self {
        Self {
            role: AgentRole::Researcher,
            listens_on: topics::PLAN_READY,
            publishes_on: topics::RESEARCH_READY,
            receiver: AgentRole::Writer,
            kind: MessageKind::Research,
            template: library::researcher(),
            vars: |msg, _| single("plan", &msg.content),
        }
    }

    /// Writer: research → first draft for the Reviewer
    pub fn draft() -> Self {
        Self {
            role: AgentRole::Writer,
            listens_on: topics::RESEARCH_READY,
            publishes_on: topics::DRAFT_READY,
            receiver: AgentRole::Reviewer,
            kind: MessageKind::Draft,
            template: library::writer(),
            vars: |msg, _| single("research", &msg.content),
        }
    }

    /// Reviewer: draft → feedback for the Writer
    pub fn review() -> Self {
        Self {
            role: AgentRole::Reviewer,
            listens_on: topics::DRAFT_READY,
            publishes_on: topics::REVIEW_COMPLETE,
            receiver: AgentRole::Writer,
            kind: MessageKind::Feedback,
            template: library::reviewer(),
            vars: |msg, _| single("draft", &msg.content),
        }
    }

    /// Writer: feedback plus latest draft → revised draft
    pub fn rewrite() -> Self {
        Self {
            role: AgentRole::Writer,
            listens_on: topics::REVIEW_COMPLETE,
            publishes_on: topics::REWRITE_COMPLETE,
            receiver: AgentRole::Reviewer,
            kind: MessageKind::Draft,
            template: library::rewrite(),
            vars: |msg, log| {
                let mut vars = single("feedback", &msg.content);
                vars.insert(
                    "draft".to_string(),
                    latest_draft(log).unwrap_or_default().to_string(),
                );
                vars
            },
        }
    }

    /// The stages wired by a default crew, in pipeline order
    pub fn pipeline() -> Vec<Self> {
        vec![Self::research(), Self::draft(), Self::review(), Self::rewrite()]
    }
}

fn single(key: &str, value: &str) -> HashMap<String, String> {
    HashMap::from([(key.to_string(), value.to_string())])
}
