//! Example x402 server using Axum.
//!
//! This example demonstrates how to create a web server that requires an
//! EGLD or ESDT payment for accessing protected endpoints.
//!
//! Run with:
//! ```bash
//! cargo run --example server
//! ```
//!
//! Environment variables:
//! - PAY_TO: Bech32 address to receive payments
//! - FACILITATOR_URL: URL of the facilitator service
//! - NETWORK: Network identifier (default: multiversx:D)
//! - ASSET: Token identifier, or EGLD (default: EGLD)
//! - PORT: Server port (default: 3000)

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::Engine;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use x402_multiversx::client::{PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER};
use x402_multiversx::server::{
    create_payment_required_response, verify_and_settle_payment, PaymentConfig,
};

#[derive(Clone)]
struct AppState {
    payment_config: PaymentConfig,
}

/// Protected endpoint that requires payment.
async fn weather_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let Some(payment_header) = headers.get(PAYMENT_HEADER) else {
        let mut configs = HashMap::new();
        configs.insert("weather".to_string(), state.payment_config.clone());

        let payment_required = create_payment_required_response(&configs)
            .map_err(|e| AppError::ServerError(e.to_string()))?;
        return Ok((StatusCode::PAYMENT_REQUIRED, Json(payment_required)).into_response());
    };

    let payment_str = payment_header
        .to_str()
        .map_err(|_| AppError::InvalidPayment("Invalid payment header encoding".into()))?;

    let settlement = verify_and_settle_payment(payment_str, &state.payment_config)
        .await
        .map_err(|e| AppError::PaymentFailed(e.to_string()))?;
    info!(tx_hash = %settlement.transaction, payer = ?settlement.payer, "payment settled");

    let settlement_json =
        serde_json::to_string(&settlement).map_err(|e| AppError::ServerError(e.to_string()))?;
    let settlement_encoded =
        base64::engine::general_purpose::STANDARD.encode(settlement_json.as_bytes());

    let weather_data = json!({
        "location": "Bucharest",
        "temperature": 21,
        "conditions": "Clear",
        "paid": true,
        "txHash": settlement.transaction,
    });

    Ok((
        StatusCode::OK,
        [(PAYMENT_RESPONSE_HEADER, settlement_encoded)],
        Json(weather_data),
    )
        .into_response())
}

/// Health check endpoint (no payment required).
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "protocol": "x402",
        "version": x402_multiversx::X402_VERSION,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let pay_to = std::env::var("PAY_TO").unwrap_or_else(|_| {
        "erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx".to_string()
    });
    let facilitator_url =
        std::env::var("FACILITATOR_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let network = std::env::var("NETWORK").unwrap_or_else(|_| "multiversx:D".to_string());
    let asset = std::env::var("ASSET").unwrap_or_else(|_| "EGLD".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()?;

    // 0.001 EGLD, or 0.01 of a six-decimal token
    let base = PaymentConfig::new(pay_to, "0", network, facilitator_url)
        .with_description("Weather API access")
        .with_timeout(300);
    let payment_config = if asset == "EGLD" {
        base.with_price("0.001", 18)?
    } else {
        base.with_asset(asset).with_price("0.01", 6)?
    };

    // Fail at startup rather than on the first request.
    let requirements = payment_config.to_requirements()?;
    info!(
        pay_to = %requirements.pay_to,
        asset = %requirements.asset,
        amount = %requirements.amount,
        network = %requirements.network,
        "payment requirements ready"
    );

    let state = Arc::new(AppState { payment_config });
    let app = Router::new()
        .route("/weather", get(weather_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

enum AppError {
    InvalidPayment(String),
    PaymentFailed(String),
    ServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidPayment(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PaymentFailed(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
