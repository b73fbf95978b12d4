// Domain layer module exports
// Message data model and the flow projections computed from it
// Domain is independent of the bus runtime and of HTTP concerns

pub mod flow;
pub mod message;
