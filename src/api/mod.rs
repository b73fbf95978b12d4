// API layer module (adapter for observability consumers)
// Exposes the bus read API and the crew entry point over HTTP

pub mod errors;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::{bus, crew};
pub use state::AppState;

/// Build the HTTP router over `state`
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(crew::health_check))
        // Bus read API
        .route("/api/messages", get(bus::get_messages))
        .route("/api/flows", get(bus::get_flows))
        // Bus write API
        .route("/api/events/:topic", post(bus::emit_event))
        .route("/api/reset", post(bus::reset))
        // Crew
        .route("/api/topics", post(crew::submit_topic))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Shared state
        .with_state(state)
}
