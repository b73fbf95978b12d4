//! Agent Bus Library
//!
//! An observable publish/subscribe event log for a team of article-writing
//! agents, plus the read-time projections (flows, LLM request/response
//! pairs) that visualization and audit consumers build from it.

pub mod agents;
pub mod api;
pub mod bus;
pub mod config;
pub mod domain;
