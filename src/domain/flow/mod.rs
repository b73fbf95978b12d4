// Flow reconstruction
// Pure read-time projections over the bus log; nothing here mutates it

pub mod grouping;
pub mod pairing;
pub mod views;

pub use grouping::{group_by_flow, Flow, FlowRules};
pub use pairing::{pair_llm, LlmPair};
pub use views::{conversation_messages, latest_draft, recent, writer_awaiting_rewrite, TokenTotals};
