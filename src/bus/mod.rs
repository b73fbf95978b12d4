// Bus core
//
// In-process publish/subscribe event log shared by the agent drivers and
// the observability consumers.

pub mod agent_bus;
pub mod subscription;

pub use agent_bus::AgentBus;
pub use subscription::{Delivery, LogSnapshot, Subscription};
