//! Server-side functionality for the x402 protocol.
//!
//! This module provides helpers for resource servers that charge for access:
//! building the 402 response that advertises MultiversX payment options, and
//! handing a received X-PAYMENT header to a remote facilitator.

use crate::amount::{parse_amount, parse_units};
use crate::errors::{Result, X402Error};
use crate::schemes::exact_multiversx::normalize_requirements;
use crate::types::{
    PaymentRequiredResponse, PaymentRequirements, SettlementRequest, SettlementResponse,
    VerificationRequest, VerificationResponse, NATIVE_ASSET, RESOURCE_ID_KEY, SCHEME_EXACT,
    X402_VERSION,
};
use crate::utils::{decode_payment_header, network_for_chain_id, DEVNET_CHAIN_ID};
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Configuration for payment requirements on a server endpoint.
#[derive(Clone, Debug)]
pub struct PaymentConfig {
    /// `erd1…` address to receive payments
    pub pay_to: String,

    /// Price in atomic units of `asset`
    pub amount: String,

    /// `EGLD` or an ESDT token identifier
    pub asset: String,

    /// Network identifier (e.g., "multiversx:1" for mainnet)
    pub network: String,

    /// Payment scheme (e.g., "exact")
    pub scheme: String,

    /// Description of what the payment is for
    pub description: Option<String>,

    /// Reference carried in token transfers, such as an invoice id
    pub resource_id: Option<String>,

    /// Facilitator URL for verification and settlement
    pub facilitator_url: String,

    /// Maximum timeout in seconds for payment validity
    pub max_timeout_seconds: u64,
}

impl PaymentConfig {
    /// Creates a new EGLD payment configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use x402_multiversx::server::PaymentConfig;
    ///
    /// let config = PaymentConfig::new(
    ///     "erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx",
    ///     "10000000000000000", // 0.01 EGLD
    ///     "multiversx:D",
    ///     "https://facilitator.example.com",
    /// )
    /// .with_description("Weather API access");
    /// ```
    pub fn new(
        pay_to: impl Into<String>,
        amount: impl Into<String>,
        network: impl Into<String>,
        facilitator_url: impl Into<String>,
    ) -> Self {
        Self {
            pay_to: pay_to.into(),
            amount: amount.into(),
            asset: NATIVE_ASSET.to_string(),
            network: network.into(),
            scheme: SCHEME_EXACT.to_string(),
            description: None,
            resource_id: None,
            facilitator_url: facilitator_url.into(),
            max_timeout_seconds: 300,
        }
    }

    /// Charges in an ESDT token instead of EGLD.
    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = asset.into();
        self
    }

    /// Sets the price from a human-readable amount, e.g. `"0.5"` with 6 decimals.
    pub fn with_price(mut self, human: &str, decimals: u32) -> Result<Self> {
        self.amount = parse_units(human, decimals)?.to_string();
        Ok(self)
    }

    /// Sets the description shown to payers.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the reference attached to token transfers.
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Sets the timeout for payment validity.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    /// Converts the configuration to payment requirements.
    pub fn to_requirements(&self) -> Result<PaymentRequirements> {
        parse_amount(&self.amount)?;

        let mut extra = Map::new();
        if let Some(resource_id) = &self.resource_id {
            extra.insert(RESOURCE_ID_KEY.to_string(), Value::String(resource_id.clone()));
        }

        normalize_requirements(&PaymentRequirements {
            scheme: self.scheme.clone(),
            network: self.network.clone(),
            amount: self.amount.clone(),
            asset: self.asset.clone(),
            pay_to: self.pay_to.clone(),
            max_timeout_seconds: self.max_timeout_seconds,
            description: self.description.clone(),
            extra,
        })
    }
}

async fn post_to_facilitator<T, R>(
    client: &Client,
    base_url: &str,
    path: &str,
    body: &T,
) -> Result<R>
where
    T: serde::Serialize + ?Sized,
    R: serde::de::DeserializeOwned,
{
    let url = format!("{}/{}", base_url.trim_end_matches('/'), path);
    let response = client.post(&url).json(body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(X402Error::GatewayError(format!(
            "facilitator {} returned status {}: {}",
            path,
            status.as_u16(),
            body
        )));
    }
    Ok(response.json().await?)
}

/// Verifies and settles a payment through the configured facilitator.
///
/// # Arguments
///
/// * `payment_header` - The X-PAYMENT header value (Base64 encoded)
/// * `config` - Payment configuration
///
/// # Returns
///
/// The settlement, with the transaction hash, if the payment is valid and
/// was accepted by the network.
#[instrument(skip_all, fields(facilitator = %config.facilitator_url))]
pub async fn verify_and_settle_payment(
    payment_header: &str,
    config: &PaymentConfig,
) -> Result<SettlementResponse> {
    let requirements = config.to_requirements()?;
    let payload = decode_payment_header(payment_header)?;
    let client = Client::new();

    let verify_request = VerificationRequest {
        payment_payload: payload,
        payment_requirements: requirements,
    };
    let verification: VerificationResponse =
        post_to_facilitator(&client, &config.facilitator_url, "verify", &verify_request)
            .await
            .map_err(|e| X402Error::VerificationFailed(e.to_string()))?;
    if !verification.is_valid {
        return Err(X402Error::VerificationFailed(
            verification
                .invalid_reason
                .unwrap_or_else(|| "Unknown reason".to_string()),
        ));
    }
    debug!(payer = ?verification.payer, "facilitator accepted payment");

    let settle_request: SettlementRequest = verify_request;
    let settlement: SettlementResponse =
        post_to_facilitator(&client, &config.facilitator_url, "settle", &settle_request)
            .await
            .map_err(|e| X402Error::SettlementError(e.to_string()))?;
    if !settlement.success {
        return Err(X402Error::SettlementError(
            settlement
                .error
                .unwrap_or_else(|| "Unknown reason".to_string()),
        ));
    }

    Ok(settlement)
}

/// Creates a 402 Payment Required response.
///
/// # Arguments
///
/// * `configs` - Map of payment configurations (can support multiple payment options)
///
/// # Examples
///
/// ```
/// use x402_multiversx::server::{PaymentConfig, create_payment_required_response};
/// use std::collections::HashMap;
///
/// let mut configs = HashMap::new();
/// configs.insert("egld".to_string(), PaymentConfig::new(
///     "erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx",
///     "1000",
///     "multiversx:D",
///     "https://facilitator.example.com",
/// ));
///
/// let response = create_payment_required_response(&configs).unwrap();
/// assert_eq!(response.accepts.len(), 1);
/// assert_eq!(response.accepts[0].asset, "EGLD");
/// ```
pub fn create_payment_required_response(
    configs: &HashMap<String, PaymentConfig>,
) -> Result<PaymentRequiredResponse> {
    let accepts: Result<Vec<_>> = configs.values().map(PaymentConfig::to_requirements).collect();

    Ok(PaymentRequiredResponse {
        x402_version: X402_VERSION,
        accepts: accepts?,
        error: Some("X-PAYMENT header is required".to_string()),
    })
}

/// Helper to create a simple EGLD-on-devnet configuration.
///
/// # Examples
///
/// ```
/// use x402_multiversx::server::create_simple_config;
///
/// let config = create_simple_config(
///     "erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx",
///     "1000000000000000",
///     "API access",
///     "https://facilitator.example.com",
/// );
/// assert_eq!(config.network, "multiversx:D");
/// ```
pub fn create_simple_config(
    pay_to: &str,
    amount: &str,
    description: &str,
    facilitator_url: &str,
) -> PaymentConfig {
    PaymentConfig::new(
        pay_to,
        amount,
        network_for_chain_id(DEVNET_CHAIN_ID),
        facilitator_url,
    )
    .with_description(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentPayload;
    use crate::utils::encode_payment_header;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAY_TO: &str = "erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx";

    fn header() -> String {
        encode_payment_header(&PaymentPayload {
            x402_version: 2,
            scheme: "exact".to_string(),
            network: "multiversx:D".to_string(),
            payload: json!({"scheme": "exact", "data": {}}),
        })
        .unwrap()
    }

    #[test]
    fn test_to_requirements() {
        let config = PaymentConfig::new(PAY_TO, "1000", "multiversx:D", "https://facilitator.test")
            .with_asset("USDC-c76f1f")
            .with_resource_id("inv_9")
            .with_description("Test payment")
            .with_timeout(60);

        let requirements = config.to_requirements().unwrap();
        assert_eq!(requirements.scheme, "exact");
        assert_eq!(requirements.amount, "1000");
        assert_eq!(requirements.asset, "USDC-c76f1f");
        assert_eq!(requirements.max_timeout_seconds, 60);
        assert_eq!(requirements.resource_id(), Some("inv_9"));
    }

    #[test]
    fn test_to_requirements_defaults_and_validation() {
        let mut config = PaymentConfig::new(PAY_TO, "1000", "multiversx:D", "https://f.test");
        config.asset.clear();
        assert_eq!(config.to_requirements().unwrap().asset, "EGLD");

        config.pay_to.clear();
        assert!(matches!(
            config.to_requirements(),
            Err(X402Error::MissingRecipient)
        ));

        let config = PaymentConfig::new(PAY_TO, "0.5", "multiversx:D", "https://f.test");
        assert!(matches!(
            config.to_requirements(),
            Err(X402Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_with_price() {
        let config = PaymentConfig::new(PAY_TO, "0", "multiversx:D", "https://f.test")
            .with_asset("USDC-c76f1f")
            .with_price("0.01", 6)
            .unwrap();
        assert_eq!(config.amount, "10000");
    }

    #[test]
    fn test_create_payment_required_response() {
        let mut configs = HashMap::new();
        configs.insert(
            "egld".to_string(),
            create_simple_config(PAY_TO, "1000", "Test", "https://facilitator.test"),
        );

        let response = create_payment_required_response(&configs).unwrap();
        assert_eq!(response.x402_version, 2);
        assert_eq!(response.accepts.len(), 1);
        assert_eq!(response.accepts[0].pay_to, PAY_TO);
    }

    #[tokio::test]
    async fn test_verify_and_settle_payment() {
        let facilitator = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .and(body_partial_json(json!({"paymentRequirements": {"payTo": PAY_TO}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isValid": true,
                "payer": "erd1payer"
            })))
            .expect(1)
            .mount(&facilitator)
            .await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "transaction": "abc123",
                "network": "multiversx:D",
                "payer": "erd1payer"
            })))
            .expect(1)
            .mount(&facilitator)
            .await;

        let config = create_simple_config(PAY_TO, "1000", "Test", &facilitator.uri());
        let settlement = verify_and_settle_payment(&header(), &config).await.unwrap();
        assert_eq!(settlement.transaction, "abc123");
    }

    #[tokio::test]
    async fn test_invalid_payment_is_not_settled() {
        let facilitator = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isValid": false,
                "invalidReason": "Missing signature"
            })))
            .mount(&facilitator)
            .await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&facilitator)
            .await;

        let config = create_simple_config(PAY_TO, "1000", "Test", &facilitator.uri());
        match verify_and_settle_payment(&header(), &config).await {
            Err(X402Error::VerificationFailed(reason)) => assert_eq!(reason, "Missing signature"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_settlement() {
        let facilitator = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isValid": true})))
            .mount(&facilitator)
            .await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errorReason": "Settlement failed: node unavailable"
            })))
            .mount(&facilitator)
            .await;

        let config = create_simple_config(PAY_TO, "1000", "Test", &facilitator.uri());
        assert!(matches!(
            verify_and_settle_payment(&header(), &config).await,
            Err(X402Error::SettlementError(_))
        ));
    }
}
