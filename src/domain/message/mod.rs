// Message domain module
// Contains the bus event record, its tag enum and usage normalization

#![allow(clippy::module_inception)]

pub mod message;
pub mod usage;
pub mod value_objects;

// Re-export main types for convenience
pub use message::{Message, PromptMessage, Role};
pub use usage::{RawUsage, Usage};
pub use value_objects::{topics, AgentRole, MessageKind, LLM, USER};
