// Read-side helpers used by timeline, graph and renderer consumers

use serde::Serialize;

use crate::domain::message::{AgentRole, Message, MessageKind};

/// Content of the most recent Writer draft, if any
pub fn latest_draft(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.is_from(AgentRole::Writer.bus_name(), &MessageKind::Draft))
        .map(|m| m.content.as_str())
}

/// True while the Writer owes a rewrite
///
/// That is the case when the latest Reviewer→Writer review or feedback has no
/// later Writer→Reviewer message.
pub fn writer_awaiting_rewrite(messages: &[Message]) -> bool {
    let writer = AgentRole::Writer.bus_name();
    let reviewer = AgentRole::Reviewer.bus_name();

    let last_review = messages.iter().rposition(|m| {
        m.sender == reviewer
            && m.receiver == writer
            && matches!(m.kind, MessageKind::Review | MessageKind::Feedback)
    });

    match last_review {
        Some(index) => !messages[index + 1..]
            .iter()
            .any(|m| m.sender == writer && m.receiver == reviewer),
        None => false,
    }
}

/// The last `n` messages of the log
pub fn recent(messages: &[Message], n: usize) -> &[Message] {
    &messages[messages.len().saturating_sub(n)..]
}

/// Agent-to-agent messages only, hiding LLM traffic
pub fn conversation_messages<'a, I>(messages: I) -> Vec<&'a Message>
where
    I: IntoIterator<Item = &'a Message>,
{
    messages.into_iter().filter(|m| !m.is_llm()).collect()
}

/// Token usage summed over the LLM responses of a set of messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenTotals {
    pub calls: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenTotals {
    pub fn from_messages<'a, I>(messages: I) -> Self
    where
        I: IntoIterator<Item = &'a Message>,
    {
        messages
            .into_iter()
            .filter(|m| m.kind == MessageKind::LlmResponse)
            .fold(Self::default(), |mut totals, m| {
                totals.calls += 1;
                if let Some(usage) = m.usage {
                    totals.prompt_tokens = totals.prompt_tokens.saturating_add(usage.prompt_tokens);
                    totals.completion_tokens = totals
                        .completion_tokens
                        .saturating_add(usage.completion_tokens);
                    totals.total_tokens = totals.total_tokens.saturating_add(usage.total_tokens);
                }
                totals
            })
    }
}
