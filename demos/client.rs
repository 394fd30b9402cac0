//! Example x402 client.
//!
//! This example demonstrates how to make requests to an x402-enabled server,
//! paying for them with a MultiversX transaction signed by a local key.
//!
//! Run with:
//! ```bash
//! cargo run --example client
//! ```
//!
//! Environment variables:
//! - SECRET_KEY: Hex-encoded Ed25519 secret key for signing payments
//! - GATEWAY_URL: MultiversX gateway used to look up the account nonce
//! - NETWORK: Preferred network (default: multiversx:D)
//! - API_URL: The protected API endpoint to access

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use x402_multiversx::client::{
    decode_payment_response, get, X402ClientConfig, PAYMENT_RESPONSE_HEADER,
};
use x402_multiversx::signer::Ed25519Signer;
use x402_multiversx::Signer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let signer = match std::env::var("SECRET_KEY") {
        Ok(secret) => Ed25519Signer::from_secret_key_hex(&secret)?,
        Err(_) => {
            warn!("no SECRET_KEY set, paying with a throwaway key");
            Ed25519Signer::generate()
        }
    };
    let gateway_url = std::env::var("GATEWAY_URL")
        .unwrap_or_else(|_| "https://devnet-gateway.multiversx.com".to_string());
    let network = std::env::var("NETWORK").unwrap_or_else(|_| "multiversx:D".to_string());
    let api_url =
        std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000/weather".to_string());

    info!(payer = %signer.address(), gateway = %gateway_url, api = %api_url, "starting client");

    let config =
        X402ClientConfig::with_gateway(Arc::new(signer), &gateway_url)?.with_network(network);
    let response = get(&config, &api_url).await?;
    info!(status = %response.status(), "response received");

    if let Some(settlement) = response
        .headers()
        .get(PAYMENT_RESPONSE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|encoded| decode_payment_response(encoded).ok())
    {
        info!(tx_hash = %settlement.transaction, network = %settlement.network, "payment settled");
    }

    let body = response.text().await?;
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", body),
    }

    Ok(())
}
