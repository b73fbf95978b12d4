use std::sync::Arc;

use crate::agents::Crew;
use crate::bus::AgentBus;
use crate::domain::flow::FlowRules;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub bus: AgentBus,
    pub crew: Arc<Crew>,
    pub rules: Arc<FlowRules>,
}

impl AppState {
    pub fn new(crew: Arc<Crew>, rules: FlowRules) -> Self {
        Self {
            bus: crew.bus().clone(),
            crew,
            rules: Arc::new(rules),
        }
    }
}
