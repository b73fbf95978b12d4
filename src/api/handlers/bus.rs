use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::api::state::AppState;
use crate::domain::flow::{Flow, LlmPair, TokenTotals};
use crate::domain::message::{Message, MessageKind, PromptMessage, RawUsage, Usage};

/// Full log with the epoch it belongs to
#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub epoch: u64,
    pub messages: Vec<Message>,
}

/// LLM request/response pair
#[derive(Debug, Serialize)]
pub struct LlmPairResponse {
    pub request: Message,
    pub response: Option<Message>,
}

impl From<&LlmPair<'_>> for LlmPairResponse {
    fn from(pair: &LlmPair<'_>) -> Self {
        Self {
            request: pair.request.clone(),
            response: pair.response.cloned(),
        }
    }
}

/// One reconstructed flow
#[derive(Debug, Serialize)]
pub struct FlowResponse {
    pub summary: String,
    pub closed: bool,
    pub messages: Vec<Message>,
    pub llm_pairs: Vec<LlmPairResponse>,
    pub tokens: TokenTotals,
}

impl From<&Flow<'_>> for FlowResponse {
    fn from(flow: &Flow<'_>) -> Self {
        Self {
            summary: flow.summary.to_string(),
            closed: flow.closed,
            messages: flow.messages.iter().map(|m| (*m).clone()).collect(),
            llm_pairs: flow.llm_pairs().iter().map(LlmPairResponse::from).collect(),
            tokens: TokenTotals::from_messages(flow.messages.iter().copied()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FlowsResponse {
    pub epoch: u64,
    pub flows: Vec<FlowResponse>,
}

/// Request body for emitting a message
///
/// `usage` may use any provider vocabulary; it is normalized before the
/// message reaches the bus.
#[derive(Debug, Deserialize)]
pub struct EmitRequest {
    pub id: Option<String>,
    pub sender: String,
    pub receiver: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub prompt: Option<Vec<PromptMessage>>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub usage: Option<RawUsage>,
}

impl From<EmitRequest> for Message {
    fn from(req: EmitRequest) -> Self {
        Message {
            id: req.id,
            sender: req.sender,
            receiver: req.receiver,
            kind: req.kind,
            content: req.content,
            timestamp: req.timestamp.unwrap_or_else(Utc::now),
            prompt: req.prompt,
            provider: req.provider,
            model: req.model,
            usage: req.usage.map(Usage::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmitResponse {
    pub epoch: u64,
    pub position: usize,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub epoch: u64,
}

/// Get the full log
///
/// GET /api/messages
pub async fn get_messages(State(state): State<AppState>) -> Json<LogResponse> {
    let snapshot = state.bus.log();

    Json(LogResponse {
        epoch: snapshot.epoch,
        messages: snapshot.messages.to_vec(),
    })
}

/// Get the log grouped into flows, with LLM pairs
///
/// GET /api/flows
pub async fn get_flows(State(state): State<AppState>) -> Json<FlowsResponse> {
    let snapshot = state.bus.log();
    let flows = state.rules.group(&snapshot.messages);

    Json(FlowsResponse {
        epoch: snapshot.epoch,
        flows: flows.iter().map(FlowResponse::from).collect(),
    })
}

/// Emit a message on a topic
///
/// POST /api/events/:topic
pub async fn emit_event(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Json(req): Json<EmitRequest>,
) -> Result<(StatusCode, Json<EmitResponse>), ApiError> {
    if req.sender.trim().is_empty() || req.receiver.trim().is_empty() {
        return Err(ApiError::bad_request("sender and receiver are required"));
    }
    if state.bus.is_disposed() {
        return Err(ApiError::unavailable("Agent bus has been disposed"));
    }

    state.bus.emit(&topic, Message::from(req));
    let snapshot = state.bus.log();

    Ok((
        StatusCode::ACCEPTED,
        Json(EmitResponse {
            epoch: snapshot.epoch,
            position: snapshot.len().saturating_sub(1),
        }),
    ))
}

/// Clear the log and start a new epoch
///
/// POST /api/reset
pub async fn reset(State(state): State<AppState>) -> Json<ResetResponse> {
    Json(ResetResponse {
        epoch: state.bus.reset(),
    })
}
