//! Client-side functionality for the x402 protocol.
//!
//! This module provides functions for making HTTP requests that handle 402 Payment Required
//! responses, generate MultiversX payment payloads, and retry requests with payment.

use crate::errors::{Result, X402Error};
use crate::gateway::GatewayClient;
use crate::schemes::exact_multiversx::ExactMultiversxClient;
use crate::schemes::SchemeClient;
use crate::signer::Signer;
use crate::types::{Asset, PaymentRequiredResponse, PaymentRequirements, SettlementResponse};
use crate::utils::{chain_id_for_network, encode_payment_header};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Header carrying the payment payload.
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// Header in which servers return the settlement result.
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Configuration for x402 client requests.
#[derive(Clone)]
pub struct X402ClientConfig {
    /// Scheme implementation used to build payloads
    pub scheme: Arc<dyn SchemeClient>,

    /// HTTP client to use for requests
    pub http_client: Client,

    /// Preferred network (e.g., "multiversx:1" for mainnet)
    pub preferred_network: Option<String>,

    /// Preferred asset (e.g., "USDC-c76f1f")
    pub preferred_asset: Option<String>,
}

impl X402ClientConfig {
    /// Creates a new client configuration paying with `signer`.
    ///
    /// Transactions use nonce 0 until a gateway is attached with
    /// [`X402ClientConfig::with_gateway`].
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use x402_multiversx::client::X402ClientConfig;
    /// use x402_multiversx::signer::Ed25519Signer;
    ///
    /// let config = X402ClientConfig::new(Arc::new(Ed25519Signer::generate()))
    ///     .with_network("multiversx:D");
    /// ```
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self::with_scheme(Arc::new(ExactMultiversxClient::new(signer)))
    }

    /// Creates a configuration around an existing scheme client.
    pub fn with_scheme(scheme: Arc<dyn SchemeClient>) -> Self {
        Self {
            scheme,
            http_client: Client::new(),
            preferred_network: None,
            preferred_asset: None,
        }
    }

    /// Pays with `signer`, fetching its nonce from the gateway at `gateway_url`.
    pub fn with_gateway(signer: Arc<dyn Signer>, gateway_url: &str) -> Result<Self> {
        let gateway = Arc::new(GatewayClient::new(gateway_url)?);
        let scheme = ExactMultiversxClient::new(signer).with_nonce_provider(gateway);
        Ok(Self::with_scheme(Arc::new(scheme)))
    }

    /// Sets the preferred network.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.preferred_network = Some(network.into());
        self
    }

    /// Sets the preferred asset.
    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.preferred_asset = Some(asset.into());
        self
    }

    /// Sets a custom HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }
}

/// Makes an HTTP request with automatic x402 payment handling.
///
/// If the server responds with 402 Payment Required, this function will:
/// 1. Parse the payment requirements
/// 2. Generate a payment payload
/// 3. Retry the request once with the X-PAYMENT header
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use x402_multiversx::client::{X402ClientConfig, request_with_payment};
/// use x402_multiversx::signer::Ed25519Signer;
/// use reqwest::Method;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let signer = Ed25519Signer::from_secret_key_hex(&std::env::var("SECRET_KEY")?)?;
/// let config = X402ClientConfig::with_gateway(
///     Arc::new(signer),
///     "https://devnet-gateway.multiversx.com",
/// )?;
///
/// let response = request_with_payment(
///     &config,
///     Method::GET,
///     "https://api.example.com/weather",
///     None,
/// ).await?;
///
/// println!("Response: {}", response.text().await?);
/// # Ok(())
/// # }
/// ```
#[instrument(skip_all, fields(method = %method, url = %url))]
pub async fn request_with_payment(
    config: &X402ClientConfig,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Response> {
    let mut request = config.http_client.request(method.clone(), url);
    if let Some(body) = &body {
        request = request.json(body);
    }

    let response = request.send().await?;
    if response.status() != StatusCode::PAYMENT_REQUIRED {
        return Ok(response);
    }

    let payment_info: PaymentRequiredResponse = response.json().await?;
    let requirement = select_requirement(&payment_info, config)?;
    debug!(
        network = %requirement.network,
        asset = %requirement.asset,
        amount = %requirement.amount,
        "paying"
    );

    let payload = config.scheme.create_payment_payload(requirement).await?;
    let payment_header = encode_payment_header(&payload)?;

    let mut retry_request = config
        .http_client
        .request(method, url)
        .header(PAYMENT_HEADER, payment_header);
    if let Some(body) = body {
        retry_request = retry_request.json(&body);
    }

    let retry_response = retry_request.send().await?;
    if let Some(settlement) = retry_response
        .headers()
        .get(PAYMENT_RESPONSE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|encoded| decode_payment_response(encoded).ok())
    {
        debug!(tx_hash = %settlement.transaction, success = settlement.success, "payment response");
    }

    Ok(retry_response)
}

/// Decodes the Base64 JSON settlement carried in `X-PAYMENT-RESPONSE`.
pub fn decode_payment_response(encoded: &str) -> Result<SettlementResponse> {
    let bytes = BASE64.decode(encoded.trim().as_bytes())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Selects an appropriate payment requirement from the server's offers.
fn select_requirement<'a>(
    response: &'a PaymentRequiredResponse,
    config: &X402ClientConfig,
) -> Result<&'a PaymentRequirements> {
    let preferred_chain = match &config.preferred_network {
        Some(network) => Some(chain_id_for_network(network)?),
        None => None,
    };
    let preferred_asset = config.preferred_asset.as_deref().map(Asset::classify);

    response
        .accepts
        .iter()
        .filter(|r| r.scheme == config.scheme.scheme())
        .filter(|r| match chain_id_for_network(&r.network) {
            Ok(chain_id) => preferred_chain.as_ref().map_or(true, |p| *p == chain_id),
            Err(_) => false,
        })
        .find(|r| {
            preferred_asset
                .as_ref()
                .map_or(true, |asset| Asset::classify(&r.asset) == *asset)
        })
        .ok_or(X402Error::NoSuitableRequirement)
}

/// A simpler convenience function for GET requests.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use x402_multiversx::client::{X402ClientConfig, get};
/// use x402_multiversx::signer::Ed25519Signer;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = X402ClientConfig::new(Arc::new(Ed25519Signer::generate()));
///
/// let response = get(&config, "https://api.example.com/data").await?;
/// println!("{}", response.text().await?);
/// # Ok(())
/// # }
/// ```
pub async fn get(config: &X402ClientConfig, url: &str) -> Result<Response> {
    request_with_payment(config, Method::GET, url, None).await
}

/// A simpler convenience function for POST requests.
pub async fn post(config: &X402ClientConfig, url: &str, body: Value) -> Result<Response> {
    request_with_payment(config, Method::POST, url, Some(body)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Ed25519Signer;
    use crate::utils::decode_payment_header;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAY_TO: &str = "erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx";

    fn requirement(network: &str, asset: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: network.to_string(),
            amount: "1000".to_string(),
            asset: asset.to_string(),
            pay_to: PAY_TO.to_string(),
            max_timeout_seconds: 300,
            ..Default::default()
        }
    }

    fn config() -> X402ClientConfig {
        X402ClientConfig::new(Arc::new(Ed25519Signer::from_bytes(&[9u8; 32])))
    }

    #[test]
    fn test_config_builders() {
        let config = config().with_network("multiversx:1").with_asset("USDC-c76f1f");
        assert_eq!(config.preferred_network, Some("multiversx:1".to_string()));
        assert_eq!(config.preferred_asset, Some("USDC-c76f1f".to_string()));
        assert!(X402ClientConfig::with_gateway(Arc::new(Ed25519Signer::generate()), "::").is_err());
    }

    #[test]
    fn test_select_requirement() {
        let mut upto = requirement("multiversx:D", "EGLD");
        upto.scheme = "upto".to_string();
        let response = PaymentRequiredResponse {
            x402_version: 2,
            accepts: vec![
                requirement("eip155:8453", "0xusdc"),
                upto,
                requirement("multiversx:D", "EGLD"),
                requirement("multiversx:1", "USDC-c76f1f"),
            ],
            error: None,
        };

        let chosen = select_requirement(&response, &config()).unwrap();
        assert_eq!(chosen.network, "multiversx:D");
        assert_eq!(chosen.scheme, "exact");

        let chosen = select_requirement(&response, &config().with_network("mainnet")).unwrap();
        assert_eq!(chosen.asset, "USDC-c76f1f");

        let chosen = select_requirement(&response, &config().with_asset("USDC-c76f1f")).unwrap();
        assert_eq!(chosen.network, "multiversx:1");

        assert!(matches!(
            select_requirement(&response, &config().with_network("multiversx:T")),
            Err(X402Error::NoSuitableRequirement)
        ));
    }

    #[test]
    fn test_select_requirement_native_asset_spellings() {
        let response = PaymentRequiredResponse {
            x402_version: 2,
            accepts: vec![
                requirement("multiversx:D", "USDC-c76f1f"),
                requirement("multiversx:D", ""),
            ],
            error: None,
        };

        let chosen = select_requirement(&response, &config().with_asset("EGLD")).unwrap();
        assert_eq!(chosen.asset, "");

        let mut egld = response.clone();
        egld.accepts[1].asset = "EGLD".to_string();
        let chosen = select_requirement(&egld, &config().with_asset("")).unwrap();
        assert_eq!(chosen.asset, "EGLD");

        let chosen = select_requirement(&response, &config().with_asset("USDC-c76f1f")).unwrap();
        assert_eq!(chosen.asset, "USDC-c76f1f");
    }

    #[tokio::test]
    async fn test_request_without_payment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/free"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let response = get(&config(), &format!("{}/free", server.uri())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_pays_and_retries_on_402() {
        let server = MockServer::start().await;
        // Mounted first so it wins once the header is present.
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(header_exists(PAYMENT_HEADER))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"temp": 21})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "x402Version": 2,
                "accepts": [requirement("multiversx:D", "EGLD")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = config();
        let response = get(&config, &format!("{}/weather", server.uri())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let requests = server.received_requests().await.unwrap();
        let paid = requests
            .iter()
            .find_map(|r| r.headers.get(PAYMENT_HEADER))
            .unwrap();
        let payload = decode_payment_header(paid.to_str().unwrap()).unwrap();
        assert_eq!(payload.network, "multiversx:D");
        assert_eq!(payload.payload["data"]["receiver"], PAY_TO);
        assert_eq!(payload.payload["data"]["value"], "1000");
    }

    #[tokio::test]
    async fn test_no_matching_requirement() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "x402Version": 2,
                "accepts": [requirement("eip155:8453", "0xusdc")]
            })))
            .mount(&server)
            .await;

        let err = get(&config(), &server.uri()).await.unwrap_err();
        assert!(matches!(err, X402Error::NoSuitableRequirement));
    }

    #[test]
    fn test_decode_payment_response() {
        let encoded = BASE64.encode(
            json!({"success": true, "transaction": "abc", "network": "multiversx:D"}).to_string(),
        );
        let settlement = decode_payment_response(&encoded).unwrap();
        assert!(settlement.success);
        assert_eq!(settlement.transaction, "abc");
    }
}
