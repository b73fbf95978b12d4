// Agent drivers
//
// The Planner/Researcher/Writer/Reviewer team. Agents talk to each other and
// to the LLM only through the bus, so every exchange shows up in the log.

pub mod crew;
pub mod errors;
pub mod llm;
pub mod prompts;
pub mod types;
pub mod worker;

// Re-export main types
pub use crew::Crew;
pub use errors::{AgentError, AgentResult};
pub use llm::{EchoLlm, LlmClient, LlmReply, ScriptedLlm};
pub use types::Stage;
pub use worker::{AgentWorker, LlmExchange};
