use std::net::SocketAddr;

use thiserror::Error;

use crate::domain::flow::FlowRules;

/// Errors raised while reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Runtime settings, read from the environment (and `.env` when present)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the observability API listens on
    pub bind_addr: SocketAddr,
    /// Provider label recorded on LLM messages
    pub llm_provider: String,
    /// Model label recorded on LLM messages
    pub llm_model: String,
    /// Whether a closing draft must not be followed by another Writer message
    pub flow_writer_lookahead: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            llm_provider: "offline".to_string(),
            llm_model: "echo-1".to_string(),
            flow_writer_lookahead: true,
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = match lookup("AGENT_BUS_ADDR") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "AGENT_BUS_ADDR",
                value,
            })?,
            None => {
                tracing::warn!("AGENT_BUS_ADDR not set, using default");
                defaults.bind_addr
            }
        };

        let flow_writer_lookahead = match lookup("FLOW_WRITER_LOOKAHEAD") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidValue {
                key: "FLOW_WRITER_LOOKAHEAD",
                value,
            })?,
            None => defaults.flow_writer_lookahead,
        };

        Ok(Self {
            bind_addr,
            llm_provider: lookup("LLM_PROVIDER").unwrap_or(defaults.llm_provider),
            llm_model: lookup("LLM_MODEL").unwrap_or(defaults.llm_model),
            flow_writer_lookahead,
        })
    }

    /// Flow grouping rules implied by this config
    pub fn flow_rules(&self) -> FlowRules {
        FlowRules::default().with_writer_lookahead(self.flow_writer_lookahead)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
