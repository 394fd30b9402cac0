//! Gateway node collaborators.
//!
//! The verifier and settlement code talk to the chain through three narrow
//! traits ([`Simulator`], [`Broadcaster`], [`NonceProvider`]). [`GatewayClient`]
//! implements all of them against a MultiversX gateway's REST API.

use crate::errors::{Result, X402Error};
use crate::types::TransactionEnvelope;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Default public devnet gateway.
pub const DEFAULT_GATEWAY_URL: &str = "https://devnet-gateway.multiversx.com";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Status reported by the node for a transaction that would execute.
pub const SIMULATION_SUCCESS: &str = "success";

/// Outcome of a transaction simulation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimulationResult {
    /// `"success"` when the transaction would execute
    pub status: String,
    /// Hash the node computed for the transaction
    pub hash: String,
    /// Node-reported reason for a failure
    pub error: Option<String>,
}

impl SimulationResult {
    /// True when the node reported a successful execution.
    pub fn is_success(&self) -> bool {
        self.status == SIMULATION_SUCCESS
    }

    /// Human-readable reason for a non-successful simulation.
    pub fn failure_reason(&self) -> String {
        match &self.error {
            Some(error) if !error.is_empty() => error.clone(),
            _ if self.status.is_empty() => "empty simulation status".to_string(),
            _ => format!("simulation status not success: {}", self.status),
        }
    }
}

/// Executes a transaction on the node without committing it.
#[async_trait]
pub trait Simulator: Send + Sync {
    /// Simulates `tx`. Transport problems are errors; an execution failure
    /// is a successful call returning a non-success [`SimulationResult`].
    async fn simulate(&self, tx: &TransactionEnvelope) -> Result<SimulationResult>;
}

/// Submits a signed transaction to the network.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Sends `tx` and returns its hash.
    async fn broadcast(&self, tx: &TransactionEnvelope) -> Result<String>;
}

/// Looks up the next usable nonce of an account.
#[async_trait]
pub trait NonceProvider: Send + Sync {
    /// Current nonce of `address`.
    async fn nonce(&self, address: &str) -> Result<u64>;
}

/// Transaction body accepted by `/transaction/simulate` and `/transaction/send`.
#[derive(Serialize)]
struct GatewayTransaction<'a> {
    nonce: u64,
    value: &'a str,
    receiver: &'a str,
    sender: &'a str,
    #[serde(rename = "gasPrice")]
    gas_price: u64,
    #[serde(rename = "gasLimit")]
    gas_limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(rename = "chainID")]
    chain_id: &'a str,
    version: u32,
    #[serde(skip_serializing_if = "is_zero")]
    options: u32,
    signature: &'a str,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl<'a> From<&'a TransactionEnvelope> for GatewayTransaction<'a> {
    fn from(tx: &'a TransactionEnvelope) -> Self {
        Self {
            nonce: tx.nonce,
            value: &tx.value,
            receiver: &tx.receiver,
            sender: &tx.sender,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            data: tx.encoded_data(),
            chain_id: &tx.chain_id,
            version: tx.version,
            options: tx.options,
            signature: tx.signature.as_deref().unwrap_or_default(),
        }
    }
}

/// Common `{data, error, code}` wrapper of gateway responses.
#[derive(Deserialize, Debug)]
struct GatewayResponse<T> {
    data: Option<T>,
    #[serde(default)]
    error: String,
    #[serde(default)]
    code: String,
}

impl<T> GatewayResponse<T> {
    fn into_data(self, context: &str) -> Result<T> {
        if !self.error.is_empty() {
            return Err(X402Error::GatewayError(format!(
                "{}: {} (code: {})",
                context, self.error, self.code
            )));
        }
        self.data
            .ok_or_else(|| X402Error::GatewayError(format!("{}: response has no data", context)))
    }
}

#[derive(Deserialize, Debug, Default)]
struct SimulationData {
    #[serde(default)]
    result: SimulationOutcome,
}

#[derive(Deserialize, Debug, Default)]
struct SimulationOutcome {
    #[serde(default)]
    status: String,
    #[serde(default)]
    hash: String,
    #[serde(rename = "failReason", default)]
    fail_reason: String,
}

#[derive(Deserialize, Debug)]
struct SendData {
    #[serde(rename = "txHash")]
    tx_hash: String,
}

#[derive(Deserialize, Debug)]
struct NonceData {
    nonce: u64,
}

/// HTTP client for a MultiversX gateway (proxy) node.
///
/// Requests carry a fixed timeout and are never retried.
#[derive(Clone, Debug)]
pub struct GatewayClient {
    base_url: Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl GatewayClient {
    /// Creates a client for the gateway at `base_url` with the default timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use x402_multiversx::gateway::GatewayClient;
    ///
    /// let gateway = GatewayClient::new("https://devnet-gateway.multiversx.com").unwrap();
    /// assert_eq!(gateway.base_url().host_str(), Some("devnet-gateway.multiversx.com"));
    /// assert!(GatewayClient::new("not a url").is_err());
    /// ```
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom per-request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            client,
            timeout,
        })
    }

    /// The gateway base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn read_json<R: DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> Result<GatewayResponse<R>> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<GatewayResponse<R>>().await?);
        }

        // The node usually explains a rejection in the `error` field.
        let body = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<GatewayResponse<serde_json::Value>>(&body)
            .ok()
            .map(|parsed| parsed.error)
            .filter(|error| !error.is_empty())
            .unwrap_or(body);
        Err(X402Error::GatewayError(format!(
            "{} returned status {}: {}",
            context,
            status.as_u16(),
            reason
        )))
    }
}

#[async_trait]
impl Simulator for GatewayClient {
    #[instrument(
        name = "gateway.simulate",
        skip_all,
        fields(sender = %tx.sender, nonce = tx.nonce),
        err
    )]
    async fn simulate(&self, tx: &TransactionEnvelope) -> Result<SimulationResult> {
        let response = self
            .client
            .post(self.endpoint("transaction/simulate"))
            .json(&GatewayTransaction::from(tx))
            .send()
            .await?;
        let parsed: GatewayResponse<SimulationData> =
            Self::read_json(response, "transaction/simulate").await?;

        if !parsed.error.is_empty() {
            debug!(error = %parsed.error, code = %parsed.code, "simulation rejected by node");
            return Ok(SimulationResult {
                status: "fail".to_string(),
                hash: String::new(),
                error: Some(format!("{} (code: {})", parsed.error, parsed.code)),
            });
        }

        let outcome = parsed.data.unwrap_or_default().result;
        debug!(status = %outcome.status, hash = %outcome.hash, "simulation finished");
        Ok(SimulationResult {
            status: outcome.status,
            hash: outcome.hash,
            error: Some(outcome.fail_reason).filter(|reason| !reason.is_empty()),
        })
    }
}

#[async_trait]
impl Broadcaster for GatewayClient {
    #[instrument(
        name = "gateway.send",
        skip_all,
        fields(sender = %tx.sender, nonce = tx.nonce),
        err
    )]
    async fn broadcast(&self, tx: &TransactionEnvelope) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("transaction/send"))
            .json(&GatewayTransaction::from(tx))
            .send()
            .await?;
        let data: SendData = Self::read_json(response, "transaction/send")
            .await?
            .into_data("transaction/send")?;
        Ok(data.tx_hash)
    }
}

#[async_trait]
impl NonceProvider for GatewayClient {
    #[instrument(name = "gateway.nonce", skip(self), err)]
    async fn nonce(&self, address: &str) -> Result<u64> {
        let path = format!("address/{}/nonce", address);
        let response = self.client.get(self.endpoint(&path)).send().await?;
        let data: NonceData = Self::read_json(response, &path).await?.into_data(&path)?;
        Ok(data.nonce)
    }
}
