//! Facilitator service implementation for the x402 protocol.
//!
//! A facilitator verifies payment payloads on behalf of resource servers and
//! settles them on-chain. [`Facilitator`] implements the logic behind the
//! `/verify`, `/settle` and `/supported` endpoints; any HTTP framework can
//! expose it (see the `facilitator` demo for an axum setup).

use crate::errors::{Result, X402Error};
use crate::gateway::{GatewayClient, DEFAULT_GATEWAY_URL, DEFAULT_TIMEOUT};
use crate::schemes::exact_multiversx::ExactMultiversxFacilitator;
use crate::schemes::SchemeFacilitator;
use crate::types::{
    PaymentPayload, PaymentRequirements, SettlementRequest, SettlementResponse, SupportedKind,
    SupportedResponse, VerificationRequest, VerificationResponse, SCHEME_EXACT, X402_VERSION,
};
use crate::utils::{chain_id_for_network, network_for_chain_id, DEVNET_CHAIN_ID};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

/// Environment variable holding the gateway URL.
pub const ENV_GATEWAY_URL: &str = "MULTIVERSX_API_URL";

/// Environment variable holding the gateway timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "MULTIVERSX_TIMEOUT_SECS";

/// Environment variable naming the network the gateway belongs to.
pub const ENV_NETWORK: &str = "MULTIVERSX_NETWORK";

/// Configuration for a facilitator service.
#[derive(Clone, Debug)]
pub struct FacilitatorConfig {
    /// Base URL of the MultiversX gateway node
    pub gateway_url: String,

    /// Timeout applied to every gateway request
    pub timeout: Duration,

    /// List of supported (scheme, network) combinations
    pub supported: Vec<(String, String)>,
}

impl FacilitatorConfig {
    /// Creates a new facilitator configuration supporting `exact` on devnet.
    ///
    /// # Examples
    ///
    /// ```
    /// use x402_multiversx::facilitator::FacilitatorConfig;
    ///
    /// let config = FacilitatorConfig::new("https://devnet-gateway.multiversx.com");
    /// assert!(config.is_supported("exact", "multiversx:D"));
    /// ```
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            timeout: DEFAULT_TIMEOUT,
            supported: vec![(
                SCHEME_EXACT.to_string(),
                network_for_chain_id(DEVNET_CHAIN_ID),
            )],
        }
    }

    /// Reads `MULTIVERSX_API_URL`, `MULTIVERSX_TIMEOUT_SECS` and
    /// `MULTIVERSX_NETWORK`, falling back to the public devnet gateway and a
    /// 10 second timeout.
    pub fn from_env() -> Result<Self> {
        let gateway_url =
            std::env::var(ENV_GATEWAY_URL).unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
        let mut config = Self::new(gateway_url);
        if let Ok(secs) = std::env::var(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                X402Error::ConfigError(format!(
                    "{} must be a number of seconds: {}",
                    ENV_TIMEOUT_SECS, e
                ))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(network) = std::env::var(ENV_NETWORK) {
            config = config.with_network(network.trim())?;
        }
        Ok(config)
    }

    /// Serves `exact` on `network` only, replacing the supported list.
    ///
    /// `network` must be the chain the configured gateway belongs to.
    pub fn with_network(mut self, network: &str) -> Result<Self> {
        let chain_id = chain_id_for_network(network).map_err(|_| {
            X402Error::ConfigError(format!("{} is not a MultiversX network", network))
        })?;
        self.supported = vec![(SCHEME_EXACT.to_string(), network_for_chain_id(&chain_id))];
        Ok(self)
    }

    /// Sets the gateway timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a supported (scheme, network) combination.
    pub fn add_supported(&mut self, scheme: impl Into<String>, network: impl Into<String>) {
        self.supported.push((scheme.into(), network.into()));
    }

    /// Checks if a (scheme, network) combination is supported.
    ///
    /// Networks are compared by chain id, so `multiversx:1` and `mainnet`
    /// name the same entry.
    pub fn is_supported(&self, scheme: &str, network: &str) -> bool {
        let Ok(chain_id) = chain_id_for_network(network) else {
            return false;
        };
        self.supported.iter().any(|(s, n)| {
            s == scheme && chain_id_for_network(n).is_ok_and(|supported| supported == chain_id)
        })
    }
}

/// Verifies and settles payments for the configured networks.
#[derive(Clone)]
pub struct Facilitator {
    config: FacilitatorConfig,
    scheme: Arc<dyn SchemeFacilitator>,
}

impl Facilitator {
    /// Creates a facilitator that talks to the configured gateway.
    pub fn new(config: FacilitatorConfig) -> Result<Self> {
        let gateway = GatewayClient::with_timeout(&config.gateway_url, config.timeout)?;
        Ok(Self::with_scheme(
            config,
            Arc::new(ExactMultiversxFacilitator::new(gateway)),
        ))
    }

    /// Creates a facilitator around an existing scheme implementation.
    pub fn with_scheme(config: FacilitatorConfig, scheme: Arc<dyn SchemeFacilitator>) -> Self {
        Self { config, scheme }
    }

    /// The facilitator configuration.
    pub fn config(&self) -> &FacilitatorConfig {
        &self.config
    }

    /// Reason to refuse the request before looking at the transaction.
    fn precheck(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Option<String> {
        if !self
            .config
            .is_supported(&requirements.scheme, &requirements.network)
        {
            return Some(format!(
                "Unsupported scheme/network: {}/{}",
                requirements.scheme, requirements.network
            ));
        }
        if requirements.scheme != self.scheme.scheme() {
            return Some(X402Error::UnsupportedScheme(requirements.scheme.clone()).to_string());
        }
        if !payload.scheme.is_empty() && payload.scheme != requirements.scheme {
            return Some(format!(
                "Scheme mismatch: payload uses {}, requirements ask for {}",
                payload.scheme, requirements.scheme
            ));
        }
        if !payload.network.is_empty()
            && chain_id_for_network(&payload.network).ok()
                != chain_id_for_network(&requirements.network).ok()
        {
            return Some(format!(
                "Network mismatch: payload uses {}, requirements ask for {}",
                payload.network, requirements.network
            ));
        }
        None
    }

    /// Handles the `/verify` endpoint.
    ///
    /// Verifies a payment payload without executing it on-chain. Invalid
    /// payments are reported in the response, not as errors.
    #[instrument(skip_all, fields(network = %request.payment_requirements.network))]
    pub async fn verify(&self, request: VerificationRequest) -> Result<VerificationResponse> {
        if let Some(reason) =
            self.precheck(&request.payment_payload, &request.payment_requirements)
        {
            warn!(%reason, "verification refused");
            return Ok(VerificationResponse::invalid(reason));
        }
        self.scheme
            .verify(&request.payment_payload, &request.payment_requirements)
            .await
    }

    /// Handles the `/settle` endpoint.
    ///
    /// Re-verifies the payment and broadcasts the signed transaction.
    #[instrument(skip_all, fields(network = %request.payment_requirements.network))]
    pub async fn settle(&self, request: SettlementRequest) -> Result<SettlementResponse> {
        if let Some(reason) =
            self.precheck(&request.payment_payload, &request.payment_requirements)
        {
            warn!(%reason, "settlement refused");
            return Ok(SettlementResponse::failed(
                &request.payment_requirements.network,
                reason,
            ));
        }
        self.scheme
            .settle(&request.payment_payload, &request.payment_requirements)
            .await
    }

    /// Handles the `/supported` endpoint.
    pub fn supported(&self) -> SupportedResponse {
        let kinds = self
            .config
            .supported
            .iter()
            .map(|(scheme, network)| SupportedKind {
                x402_version: X402_VERSION,
                scheme: scheme.clone(),
                network: network.clone(),
            })
            .collect();

        SupportedResponse { kinds }
    }
}
