use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::api::state::AppState;

/// Request body for starting an article flow
#[derive(Debug, Deserialize)]
pub struct SubmitTopicRequest {
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitTopicResponse {
    pub epoch: u64,
    pub topic: String,
}

/// Start a new article flow for a topic
///
/// POST /api/topics
///
/// Planning runs in the background; follow progress through `/api/flows`.
pub async fn submit_topic(
    State(state): State<AppState>,
    Json(req): Json<SubmitTopicRequest>,
) -> Result<(StatusCode, Json<SubmitTopicResponse>), ApiError> {
    let topic = req.topic.trim().to_string();
    if topic.is_empty() {
        return Err(ApiError::bad_request("Topic cannot be empty"));
    }
    if state.bus.is_disposed() {
        return Err(ApiError::unavailable("Agent bus has been disposed"));
    }

    let crew = state.crew.clone();
    let planned = topic.clone();
    tokio::spawn(async move {
        if let Err(e) = crew.submit(&planned).await {
            tracing::error!(topic = %planned, error = %e, "Planning failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitTopicResponse {
            epoch: state.bus.epoch(),
            topic,
        }),
    ))
}

/// Health check endpoint
///
/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}
