//! Example x402 facilitator service.
//!
//! A facilitator verifies MultiversX payment payloads by simulating them on a
//! gateway node, and settles them by broadcasting the payer's signed
//! transaction. It holds no keys.
//!
//! Run with:
//! ```bash
//! cargo run --example facilitator
//! ```
//!
//! Environment variables:
//! - MULTIVERSX_API_URL: Gateway endpoint (default: devnet gateway)
//! - MULTIVERSX_TIMEOUT_SECS: Gateway request timeout (default: 10)
//! - MULTIVERSX_NETWORK: Network the gateway belongs to (default: multiversx:D)
//! - PORT: Server port (default: 8080)

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use x402_multiversx::facilitator::{Facilitator, FacilitatorConfig};
use x402_multiversx::types::{SettlementRequest, VerificationRequest};

async fn verify_handler(
    State(facilitator): State<Arc<Facilitator>>,
    Json(request): Json<VerificationRequest>,
) -> impl IntoResponse {
    match facilitator.verify(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn settle_handler(
    State(facilitator): State<Arc<Facilitator>>,
    Json(request): Json<SettlementRequest>,
) -> impl IntoResponse {
    match facilitator.settle(request).await {
        Ok(response) if response.success => (StatusCode::OK, Json(response)).into_response(),
        Ok(response) => (StatusCode::BAD_REQUEST, Json(response)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn supported_handler(State(facilitator): State<Arc<Facilitator>>) -> impl IntoResponse {
    Json(facilitator.supported())
}

async fn health_handler(State(facilitator): State<Arc<Facilitator>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "x402-multiversx-facilitator",
        "gateway": facilitator.config().gateway_url,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = FacilitatorConfig::from_env()?;

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()?;

    info!(
        gateway = %config.gateway_url,
        timeout = ?config.timeout,
        supported = ?config.supported,
        "starting facilitator"
    );
    let facilitator = Arc::new(Facilitator::new(config)?);

    let app = Router::new()
        .route("/verify", post(verify_handler))
        .route("/settle", post(settle_handler))
        .route("/supported", get(supported_handler))
        .route("/health", get(health_handler))
        .with_state(facilitator);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("facilitator listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
