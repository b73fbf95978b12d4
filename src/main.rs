use std::sync::Arc;

use agent_bus::agents::{Crew, EchoLlm};
use agent_bus::api::{self, AppState};
use agent_bus::bus::AgentBus;
use agent_bus::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    // The bus lives for the whole process; agents and handlers share handles to it
    let bus = AgentBus::new();
    let llm = Arc::new(EchoLlm::new(&config.llm_provider, &config.llm_model));
    let crew = Arc::new(Crew::start(bus.clone(), llm));

    let app = api::router(AppState::new(crew.clone(), config.flow_rules()));

    tracing::info!("Server listening on {}", config.bind_addr);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %config.bind_addr, error = %e, "Failed to bind address");
            std::process::exit(1);
        }
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown requested");
    });

    if let Err(e) = server.await {
        tracing::error!(error = %e, "Server failed");
    }

    crew.shutdown();
    bus.dispose();
}
