use std::collections::HashSet;

use serde::Serialize;

use crate::domain::message::{AgentRole, Message, MessageKind};

/// One end-to-end collaboration reconstructed from the bus log
///
/// A flow borrows from the log it was computed from and has no identity of
/// its own; recompute it whenever the log changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flow<'a> {
    /// Content of the plan that opened the flow, or empty
    pub summary: &'a str,
    /// Messages of the flow in log order, duplicates removed
    pub messages: Vec<&'a Message>,
    /// Whether the close condition was met
    pub closed: bool,
}

impl<'a> Flow<'a> {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// A flow that was still in progress when the log ended or a new plan arrived
    pub fn is_open(&self) -> bool {
        !self.closed
    }
}

/// Boundary rules for splitting the log into flows
///
/// [`FlowRules::default`] opens a flow on a Planner `plan` and closes it on a
/// Writer `draft` that follows a Reviewer `review`/`feedback`, unless the very
/// next message also comes from the Writer.
///
/// # Example
/// ```
/// use agent_bus::domain::flow::FlowRules;
/// use agent_bus::domain::message::{Message, MessageKind};
///
/// let log = vec![
///     Message::new("PlannerAgent", "ResearchAgent", MessageKind::Plan, "Rust article"),
///     Message::new("ReviewerAgent", "WriterAgent", MessageKind::Feedback, "Shorter"),
///     Message::new("WriterAgent", "ReviewerAgent", MessageKind::Draft, "Final"),
/// ];
///
/// let flows = FlowRules::default().group(&log);
/// assert_eq!(flows.len(), 1);
/// assert!(flows[0].closed);
/// assert_eq!(flows[0].summary, "Rust article");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRules {
    pub planner: String,
    pub reviewer: String,
    pub writer: String,
    /// Reviewer message kinds that count as a completed review
    pub review_kinds: Vec<MessageKind>,
    /// Keep a flow open while the message after the closing draft is also from the Writer
    pub require_writer_lookahead: bool,
}

impl Default for FlowRules {
    fn default() -> Self {
        Self {
            planner: AgentRole::Planner.bus_name().to_string(),
            reviewer: AgentRole::Reviewer.bus_name().to_string(),
            writer: AgentRole::Writer.bus_name().to_string(),
            review_kinds: vec![MessageKind::Review, MessageKind::Feedback],
            require_writer_lookahead: true,
        }
    }
}

impl FlowRules {
    pub fn with_writer_lookahead(mut self, enabled: bool) -> Self {
        self.require_writer_lookahead = enabled;
        self
    }

    fn opens(&self, msg: &Message) -> bool {
        msg.is_from(&self.planner, &MessageKind::Plan)
    }

    fn is_review(&self, msg: &Message) -> bool {
        msg.sender == self.reviewer && self.review_kinds.contains(&msg.kind)
    }

    fn is_draft(&self, msg: &Message) -> bool {
        msg.is_from(&self.writer, &MessageKind::Draft)
    }

    fn next_allows_close(&self, next: Option<&Message>) -> bool {
        if !self.require_writer_lookahead {
            return true;
        }
        next.map_or(true, |m| m.sender != self.writer)
    }

    /// Splits `messages` into flows
    ///
    /// Never fails: a log without any plan yields a single flow with an empty
    /// summary, and an unfinished collaboration is returned as a trailing
    /// open flow. An empty log yields no flows.
    pub fn group<'a>(&self, messages: &'a [Message]) -> Vec<Flow<'a>> {
        let mut flows = Vec::new();
        let mut current = FlowBuilder::default();

        for (index, msg) in messages.iter().enumerate() {
            if current.is_duplicate(msg) {
                continue;
            }

            if self.opens(msg) {
                if !current.is_empty() {
                    flows.push(current.finish(false));
                }
                current = FlowBuilder::opened_by(msg);
            }

            current.push(msg);

            if self.is_review(msg) {
                current.review_seen = true;
            } else if current.review_seen
                && self.is_draft(msg)
                && self.next_allows_close(messages.get(index + 1))
            {
                flows.push(std::mem::take(&mut current).finish(true));
            }
        }

        if !current.is_empty() {
            flows.push(current.finish(false));
        }

        flows
    }
}

/// Groups `messages` into flows using [`FlowRules::default`]
pub fn group_by_flow(messages: &[Message]) -> Vec<Flow<'_>> {
    FlowRules::default().group(messages)
}

#[derive(Default)]
struct FlowBuilder<'a> {
    summary: &'a str,
    messages: Vec<&'a Message>,
    seen_ids: HashSet<&'a str>,
    review_seen: bool,
}

impl<'a> FlowBuilder<'a> {
    fn opened_by(plan: &'a Message) -> Self {
        Self {
            summary: &plan.content,
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    // LLM traffic is never deduplicated; each call is unique even when ids collide.
    fn is_duplicate(&self, msg: &Message) -> bool {
        match msg.id.as_deref() {
            Some(id) if !msg.is_llm() => self.seen_ids.contains(id),
            _ => false,
        }
    }

    fn push(&mut self, msg: &'a Message) {
        if let Some(id) = msg.id.as_deref() {
            if !msg.is_llm() {
                self.seen_ids.insert(id);
            }
        }
        self.messages.push(msg);
    }

    fn finish(self, closed: bool) -> Flow<'a> {
        Flow {
            summary: self.summary,
            messages: self.messages,
            closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(sender: &str, receiver: &str, kind: MessageKind, content: &str) -> Message {
        Message::new(sender, receiver, kind, content)
    }

    fn article_cycle(plan: &str) -> Vec<Message> {
        vec![
            msg("PlannerAgent", "ResearchAgent", MessageKind::Plan, plan),
            msg("ResearchAgent", "WriterAgent", MessageKind::Research, "notes"),
            msg("WriterAgent", "ReviewerAgent", MessageKind::Draft, "v1"),
            msg("ReviewerAgent", "WriterAgent", MessageKind::Feedback, "tighten"),
            msg("WriterAgent", "ReviewerAgent", MessageKind::Draft, "v2"),
        ]
    }

    #[test]
    fn empty_log_has_no_flows() {
        assert!(group_by_flow(&[]).is_empty());
    }

    #[test]
    fn first_draft_does_not_close_before_review() {
        let log = article_cycle("p");
        let flows = group_by_flow(&log[..3]);

        assert_eq!(flows.len(), 1);
        assert!(flows[0].is_open());
    }

    #[test]
    fn two_cycles_make_two_closed_flows() {
        let mut log = article_cycle("first");
        log.extend(article_cycle("second"));

        let flows = group_by_flow(&log);

        assert_eq!(flows.len(), 2);
        assert!(flows.iter().all(|f| f.closed));
        assert_eq!(flows[0].summary, "first");
        assert_eq!(flows[1].summary, "second");
        assert_eq!(flows[1].messages[0].content, "second");
    }

    #[test]
    fn writer_lookahead_keeps_flow_open() {
        let mut log = article_cycle("p");
        log.push(msg("WriterAgent", "ReviewerAgent", MessageKind::Draft, "v2 part 2"));

        let flows = group_by_flow(&log);

        assert_eq!(flows.len(), 1);
        assert!(flows[0].closed);
        assert_eq!(flows[0].len(), 6);
        assert_eq!(flows[0].messages.last().map(|m| m.content.as_str()), Some("v2 part 2"));
    }

    #[test]
    fn disabling_lookahead_closes_on_first_post_review_draft() {
        let mut log = article_cycle("p");
        log.push(msg("WriterAgent", "ReviewerAgent", MessageKind::Draft, "v2 part 2"));

        let flows = FlowRules::default().with_writer_lookahead(false).group(&log);

        assert_eq!(flows.len(), 2);
        assert!(flows[0].closed);
        assert_eq!(flows[0].len(), 5);
        assert_eq!(flows[1].summary, "");
        assert!(flows[1].is_open());
    }

    #[test]
    fn review_kind_also_counts() {
        let log = vec![
            msg("PlannerAgent", "ResearchAgent", MessageKind::Plan, "p"),
            msg("ReviewerAgent", "WriterAgent", MessageKind::Review, "ok"),
            msg("WriterAgent", "ReviewerAgent", MessageKind::Draft, "final"),
        ];

        assert!(group_by_flow(&log)[0].closed);
    }

    #[test]
    fn review_from_other_sender_is_ignored() {
        let log = vec![
            msg("PlannerAgent", "ResearchAgent", MessageKind::Plan, "p"),
            msg("User", "WriterAgent", MessageKind::Feedback, "my notes"),
            msg("WriterAgent", "ReviewerAgent", MessageKind::Draft, "final"),
        ];

        assert!(group_by_flow(&log)[0].is_open());
    }

    #[test]
    fn new_plan_interrupts_open_flow() {
        let log = vec![
            msg("PlannerAgent", "ResearchAgent", MessageKind::Plan, "abandoned"),
            msg("ResearchAgent", "WriterAgent", MessageKind::Research, "notes"),
            msg("PlannerAgent", "ResearchAgent", MessageKind::Plan, "retry"),
        ];

        let flows = group_by_flow(&log);

        assert_eq!(flows.len(), 2);
        assert!(flows[0].is_open());
        assert_eq!(flows[0].len(), 2);
        assert_eq!(flows[1].summary, "retry");
    }

    #[test]
    fn messages_without_plan_form_one_unsummarized_flow() {
        let log = vec![
            msg("ResearchAgent", "WriterAgent", MessageKind::Research, "notes"),
            msg("WriterAgent", "ReviewerAgent", MessageKind::Draft, "v1"),
        ];

        let flows = group_by_flow(&log);

        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].summary, "");
        assert_eq!(flows[0].len(), 2);
    }

    #[test]
    fn duplicate_ids_reset_between_flows() {
        let mut log = article_cycle("a");
        log[1].id = Some("shared".to_string());
        let mut second = article_cycle("b");
        second[1].id = Some("shared".to_string());
        log.extend(second);

        let flows = group_by_flow(&log);

        assert_eq!(flows[0].len(), 5);
        assert_eq!(flows[1].len(), 5);
    }

    #[test]
    fn duplicate_cannot_close_a_flow() {
        let mut log = article_cycle("p");
        log[2].id = Some("draft-1".to_string());
        log[4].id = Some("draft-1".to_string());

        let flows = group_by_flow(&log);

        assert_eq!(flows.len(), 1);
        assert!(flows[0].is_open());
        assert_eq!(flows[0].len(), 4);
    }
}
