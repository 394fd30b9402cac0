//! Resource-server role: price parsing and requirement defaults.

use crate::amount::parse_amount;
use crate::errors::{Result, X402Error};
use crate::schemes::SchemeServer;
use crate::types::{AssetAmount, PaymentRequirements, NATIVE_ASSET, SCHEME_EXACT};
use crate::utils::chain_id_for_network;
use serde_json::Value;

/// Returns a copy of `requirements` ready to be advertised: the asset
/// defaults to `EGLD` and a recipient must be present.
///
/// # Examples
///
/// ```
/// use x402_multiversx::schemes::exact_multiversx::normalize_requirements;
/// use x402_multiversx::types::PaymentRequirements;
///
/// let requirements = PaymentRequirements {
///     pay_to: "erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx".to_string(),
///     amount: "100".to_string(),
///     ..Default::default()
/// };
/// let normalized = normalize_requirements(&requirements).unwrap();
/// assert_eq!(normalized.asset, "EGLD");
/// assert_eq!(requirements.asset, "");
/// ```
pub fn normalize_requirements(requirements: &PaymentRequirements) -> Result<PaymentRequirements> {
    if requirements.pay_to.is_empty() {
        return Err(X402Error::MissingRecipient);
    }

    let mut normalized = requirements.clone();
    if normalized.asset.is_empty() {
        normalized.asset = NATIVE_ASSET.to_string();
    }
    Ok(normalized)
}

/// Server half of the exact scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMultiversxServer;

impl ExactMultiversxServer {
    /// Creates the server scheme.
    pub fn new() -> Self {
        Self
    }
}

impl SchemeServer for ExactMultiversxServer {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn parse_price(&self, price: &Value, network: &str) -> Result<AssetAmount> {
        chain_id_for_network(network)?;

        let (amount, asset) = match price {
            Value::String(amount) => (amount.as_str(), ""),
            Value::Object(fields) => (
                fields.get("amount").and_then(Value::as_str).unwrap_or_default(),
                fields.get("asset").and_then(Value::as_str).unwrap_or_default(),
            ),
            other => {
                return Err(X402Error::InvalidAmount(format!(
                    "invalid price format, expected an amount string or {{amount, asset}}: {}",
                    other
                )))
            }
        };
        parse_amount(amount)?;
        let asset = if asset.is_empty() { NATIVE_ASSET } else { asset };

        Ok(AssetAmount {
            asset: asset.to_string(),
            amount: amount.to_string(),
        })
    }

    fn enhance_payment_requirements(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentRequirements> {
        normalize_requirements(requirements)
    }
}
