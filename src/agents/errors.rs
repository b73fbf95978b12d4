use thiserror::Error;

/// Errors that can occur in the agent drivers
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Prompt template {template} is missing variable {variable}")]
    MissingVariable { template: String, variable: String },

    #[error("Bus was reset while {agent} was working (epoch {epoch} is stale)")]
    Superseded { agent: String, epoch: u64 },

    #[error("Agent bus has been disposed")]
    BusDisposed,
}

pub type AgentResult<T> = Result<T, AgentError>;
