use serde::Serialize;

use super::grouping::Flow;
use crate::domain::message::{Message, MessageKind};

/// An LLM request together with the response that answered it, if any
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmPair<'a> {
    pub request: &'a Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<&'a Message>,
}

impl<'a> LlmPair<'a> {
    /// A request that never received a response (e.g. the provider failed)
    pub fn is_unresolved(&self) -> bool {
        self.response.is_none()
    }
}

impl<'a> Flow<'a> {
    /// LLM request/response pairs of this flow
    pub fn llm_pairs(&self) -> Vec<LlmPair<'a>> {
        pair_llm(self.messages.iter().copied())
    }
}

/// Pairs `llm_request` messages with the `llm_response` that follows them
///
/// # State Machine
/// ```text
/// Idle    --llm_request-->  Pending
/// Pending --llm_response--> Idle      (emits resolved pair)
/// Pending --llm_request-->  Pending   (emits prior request unresolved)
/// ```
/// A request still pending at the end is emitted unresolved. A response that
/// arrives while idle has nothing to answer and is skipped.
///
/// # Example
/// ```
/// use agent_bus::domain::flow::pair_llm;
/// use agent_bus::domain::message::Message;
///
/// let log = vec![
///     Message::llm_request("WriterAgent", vec![]),
///     Message::llm_response("WriterAgent", "Draft"),
/// ];
///
/// let pairs = pair_llm(&log);
/// assert_eq!(pairs.len(), 1);
/// assert!(!pairs[0].is_unresolved());
/// ```
pub fn pair_llm<'a, I>(messages: I) -> Vec<LlmPair<'a>>
where
    I: IntoIterator<Item = &'a Message>,
{
    let mut pairs = Vec::new();
    let mut pending: Option<&'a Message> = None;

    for msg in messages {
        match msg.kind {
            MessageKind::LlmRequest => {
                if let Some(request) = pending.replace(msg) {
                    pairs.push(LlmPair {
                        request,
                        response: None,
                    });
                }
            }
            MessageKind::LlmResponse => {
                if let Some(request) = pending.take() {
                    pairs.push(LlmPair {
                        request,
                        response: Some(msg),
                    });
                }
            }
            _ => {}
        }
    }

    if let Some(request) = pending {
        pairs.push(LlmPair {
            request,
            response: None,
        });
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content: &str) -> Message {
        Message::llm_request("WriterAgent", vec![]).with_id(content)
    }

    fn response(content: &str) -> Message {
        Message::llm_response("WriterAgent", content)
    }

    #[test]
    fn interleaved_requests_resolve_in_order() {
        let log = vec![
            request("r1"),
            response("a1"),
            request("r2"),
            response("a2"),
            request("r3"),
            response("a3"),
        ];

        let pairs = pair_llm(&log);

        assert_eq!(pairs.len(), 3);
        for (i, pair) in pairs.iter().enumerate() {
            assert_eq!(pair.request.id.as_deref(), Some(format!("r{}", i + 1).as_str()));
            assert_eq!(
                pair.response.map(|m| m.content.as_str()),
                Some(format!("a{}", i + 1).as_str())
            );
        }
    }

    #[test]
    fn back_to_back_requests_flush_the_first() {
        let log = vec![request("r1"), request("r2"), response("a2")];

        let pairs = pair_llm(&log);

        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].is_unresolved());
        assert_eq!(pairs[1].request.id.as_deref(), Some("r2"));
        assert_eq!(pairs[1].response.map(|m| m.content.as_str()), Some("a2"));
    }

    #[test]
    fn trailing_request_is_unresolved() {
        let log = vec![request("r1"), response("a1"), request("r2")];

        let pairs = pair_llm(&log);

        assert_eq!(pairs.len(), 2);
        assert!(pairs[1].is_unresolved());
    }

    #[test]
    fn orphan_response_is_skipped() {
        let log = vec![response("stray"), request("r1"), response("a1"), response("late")];

        let pairs = pair_llm(&log);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].response.map(|m| m.content.as_str()), Some("a1"));
    }

    #[test]
    fn non_llm_messages_are_ignored() {
        let log = vec![
            Message::new("PlannerAgent", "ResearchAgent", MessageKind::Plan, "p"),
            request("r1"),
            Message::new("ResearchAgent", "WriterAgent", MessageKind::Research, "n"),
            response("a1"),
        ];

        assert_eq!(pair_llm(&log).len(), 1);
    }

    #[test]
    fn works_on_flow_views() {
        let log = vec![request("r1"), response("a1")];
        let view: Vec<&Message> = log.iter().collect();

        assert_eq!(pair_llm(view.iter().copied()).len(), 1);
    }
}
