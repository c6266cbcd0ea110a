//! dialog-bridge - protocol adapter between a bot connector and Dialogflow
//!
//! Accepts one turn of dialogue over HTTP, authenticates to the NLU backend
//! with a per-turn signed assertion, and applies the fallback-escalation
//! policy to the backend's verdict.

mod api;
mod auth;
mod error;
mod ledger;
mod nlu;
mod orchestrator;

use std::net::SocketAddr;
use std::sync::Arc;

use api::{create_router, AppState};
use auth::{Credential, JwtBearerMinter};
use ledger::EscalationPolicy;
use nlu::DialogflowClient;
use orchestrator::{BridgeConfig, TurnOrchestrator, DEFAULT_LANGUAGE};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dialog_bridge=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = BridgeConfig::from_env();

    let port: u16 = std::env::var("BRIDGE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let credentials = config
        .credentials
        .clone()
        .ok_or("BRIDGE_CREDENTIALS must be set")?;

    // Credentials are re-parsed per turn; this startup parse fails fast on
    // a broken deployment and pins the backend project for the client.
    let startup_credential = Credential::parse(&credentials)?;

    let mut policy = EscalationPolicy::default();
    if let Some(threshold) = config.fallback_threshold {
        policy = policy.with_threshold(threshold);
    }
    if let Some(matching) = config.context_match {
        policy = policy.with_matching(matching);
    }

    let minter = Arc::new(JwtBearerMinter::new(config.token_url.as_deref()));
    let backend = Arc::new(DialogflowClient::new(
        startup_credential.project_id.clone(),
        config.nlu_url.as_deref(),
    ));

    let orchestrator = TurnOrchestrator::new(
        credentials,
        minter,
        backend,
        policy,
        config.language_code.as_deref().unwrap_or(DEFAULT_LANGUAGE),
    );

    tracing::info!(
        project = %startup_credential.project_id,
        issuer = %startup_credential.issuer,
        "Adapter configured"
    );

    let state = AppState::new(orchestrator);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("dialog-bridge listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
