use serde::{Deserialize, Serialize};

/// Event tag carried in a message's `type` field
///
/// Unknown tags are preserved verbatim in [`MessageKind::Other`] so that
/// messages from newer agents survive a round trip through the bus.
///
/// # Example
/// ```
/// use agent_bus::domain::message::MessageKind;
///
/// assert_eq!(MessageKind::from("llm_request"), MessageKind::LlmRequest);
/// assert_eq!(MessageKind::from("summary").as_str(), "summary");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    Plan,
    Task,
    Research,
    Draft,
    Feedback,
    Review,
    Html,
    Pdf,
    LlmRequest,
    LlmResponse,
    /// Any tag this crate does not know about
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Plan => "plan",
            MessageKind::Task => "task",
            MessageKind::Research => "research",
            MessageKind::Draft => "draft",
            MessageKind::Feedback => "feedback",
            MessageKind::Review => "review",
            MessageKind::Html => "html",
            MessageKind::Pdf => "pdf",
            MessageKind::LlmRequest => "llm_request",
            MessageKind::LlmResponse => "llm_response",
            MessageKind::Other(tag) => tag,
        }
    }

    /// True for `llm_request` and `llm_response`
    pub fn is_llm(&self) -> bool {
        matches!(self, MessageKind::LlmRequest | MessageKind::LlmResponse)
    }
}

impl From<&str> for MessageKind {
    fn from(tag: &str) -> Self {
        match tag {
            "plan" => MessageKind::Plan,
            "task" => MessageKind::Task,
            "research" => MessageKind::Research,
            "draft" => MessageKind::Draft,
            "feedback" => MessageKind::Feedback,
            "review" => MessageKind::Review,
            "html" => MessageKind::Html,
            "pdf" => MessageKind::Pdf,
            "llm_request" => MessageKind::LlmRequest,
            "llm_response" => MessageKind::LlmResponse,
            other => MessageKind::Other(other.to_string()),
        }
    }
}

impl From<String> for MessageKind {
    fn from(tag: String) -> Self {
        match MessageKind::from(tag.as_str()) {
            MessageKind::Other(_) => MessageKind::Other(tag),
            known => known,
        }
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sender/receiver name used for the language model side of an exchange
pub const LLM: &str = "LLM";

/// Sender/receiver name used for the human end user
pub const USER: &str = "User";

/// Fixed agent roles that take part in an article flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    Planner,
    Researcher,
    Writer,
    Reviewer,
    Html,
    Pdf,
}

impl AgentRole {
    /// Name the role uses as `sender`/`receiver` on the bus
    pub fn bus_name(&self) -> &'static str {
        match self {
            AgentRole::Planner => "PlannerAgent",
            AgentRole::Researcher => "ResearchAgent",
            AgentRole::Writer => "WriterAgent",
            AgentRole::Reviewer => "ReviewerAgent",
            AgentRole::Html => "HtmlAgent",
            AgentRole::Pdf => "PdfAgent",
        }
    }

    /// Looks a role up by its bus name
    pub fn from_bus_name(name: &str) -> Option<Self> {
        match name {
            "PlannerAgent" => Some(AgentRole::Planner),
            "ResearchAgent" => Some(AgentRole::Researcher),
            "WriterAgent" => Some(AgentRole::Writer),
            "ReviewerAgent" => Some(AgentRole::Reviewer),
            "HtmlAgent" => Some(AgentRole::Html),
            "PdfAgent" => Some(AgentRole::Pdf),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Planner => write!(f, "Planner"),
            AgentRole::Researcher => write!(f, "Researcher"),
            AgentRole::Writer => write!(f, "Writer"),
            AgentRole::Reviewer => write!(f, "Reviewer"),
            AgentRole::Html => write!(f, "HTML"),
            AgentRole::Pdf => write!(f, "PDF"),
        }
    }
}

/// Topic names the bundled agent drivers publish on
pub mod topics {
    pub const PLAN_READY: &str = "planReady";
    pub const RESEARCH_READY: &str = "researchReady";
    pub const DRAFT_READY: &str = "draftReady";
    pub const REVIEW_COMPLETE: &str = "reviewComplete";
    pub const REWRITE_COMPLETE: &str = "rewriteComplete";
    pub const LLM_REQUEST: &str = "llm_request";
    pub const LLM_RESPONSE: &str = "llm_response";
    pub const HTML_READY: &str = "htmlReady";
    pub const PDF_READY: &str = "pdfReady";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_parse() {
        assert_eq!(MessageKind::from("plan"), MessageKind::Plan);
        assert_eq!(MessageKind::from("feedback"), MessageKind::Feedback);
        assert_eq!(MessageKind::from("llm_response"), MessageKind::LlmResponse);
    }

    #[test]
    fn unknown_tag_round_trips_through_json() {
        let kind: MessageKind = serde_json::from_str("\"outline\"").unwrap();
        assert_eq!(kind, MessageKind::Other("outline".to_string()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"outline\"");
    }

    #[test]
    fn known_tag_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&MessageKind::LlmRequest).unwrap(),
            "\"llm_request\""
        );
    }

    #[test]
    fn llm_kinds() {
        assert!(MessageKind::LlmRequest.is_llm());
        assert!(MessageKind::LlmResponse.is_llm());
        assert!(!MessageKind::Draft.is_llm());
        assert!(!MessageKind::Other("llm".to_string()).is_llm());
    }

    #[test]
    fn role_bus_names() {
        for role in [
            AgentRole::Planner,
            AgentRole::Researcher,
            AgentRole::Writer,
            AgentRole::Reviewer,
            AgentRole::Html,
            AgentRole::Pdf,
        ] {
            assert_eq!(AgentRole::from_bus_name(role.bus_name()), Some(role));
        }
        assert_eq!(AgentRole::from_bus_name(LLM), None);
    }

    #[test]
    fn role_display() {
        assert_eq!(AgentRole::Researcher.to_string(), "Researcher");
        assert_eq!(AgentRole::Pdf.to_string(), "PDF");
    }
}
