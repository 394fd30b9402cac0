//! Utility functions for x402 operations.
//!
//! Header encoding for the X-PAYMENT exchange and network identifier
//! resolution.

use crate::errors::{Result, X402Error};
use crate::types::{PaymentPayload, NETWORK_NAMESPACE};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Chain id of the public devnet, used when no network is given.
pub const DEVNET_CHAIN_ID: &str = "D";

/// Chain id of the public testnet.
pub const TESTNET_CHAIN_ID: &str = "T";

/// Chain id of mainnet.
pub const MAINNET_CHAIN_ID: &str = "1";

/// Encodes a PaymentPayload as Base64 JSON for the X-PAYMENT header.
///
/// # Arguments
///
/// * `payload` - The payment payload to encode
///
/// # Examples
///
/// ```
/// use x402_multiversx::types::PaymentPayload;
/// use x402_multiversx::utils::encode_payment_header;
/// use serde_json::json;
///
/// let payload = PaymentPayload {
///     x402_version: 2,
///     scheme: "exact".to_string(),
///     network: "multiversx:D".to_string(),
///     payload: json!({}),
/// };
///
/// let encoded = encode_payment_header(&payload).unwrap();
/// assert!(!encoded.is_empty());
/// ```
pub fn encode_payment_header(payload: &PaymentPayload) -> Result<String> {
    let json = serde_json::to_string(payload)?;
    Ok(BASE64.encode(json.as_bytes()))
}

/// Decodes a Base64 JSON PaymentPayload from the X-PAYMENT header.
///
/// # Examples
///
/// ```
/// use x402_multiversx::types::PaymentPayload;
/// use x402_multiversx::utils::{encode_payment_header, decode_payment_header};
/// use serde_json::json;
///
/// let payload = PaymentPayload {
///     x402_version: 2,
///     scheme: "exact".to_string(),
///     network: "multiversx:D".to_string(),
///     payload: json!({}),
/// };
///
/// let encoded = encode_payment_header(&payload).unwrap();
/// let decoded = decode_payment_header(&encoded).unwrap();
/// assert_eq!(decoded.network, "multiversx:D");
/// ```
pub fn decode_payment_header(encoded: &str) -> Result<PaymentPayload> {
    let decoded = BASE64.decode(encoded.trim().as_bytes())?;
    let json_str = String::from_utf8(decoded)
        .map_err(|e| X402Error::InvalidPayload(format!("Invalid UTF-8: {}", e)))?;
    let payload: PaymentPayload = serde_json::from_str(&json_str)?;
    Ok(payload)
}

/// Resolves a network identifier to the chain id used in transactions.
///
/// Accepts CAIP-2 style identifiers (`multiversx:1`), the short aliases
/// `mainnet`, `devnet` and `testnet` (optionally prefixed with
/// `multiversx-`), and the empty string, which selects devnet.
///
/// # Examples
///
/// ```
/// use x402_multiversx::utils::chain_id_for_network;
///
/// assert_eq!(chain_id_for_network("multiversx:1").unwrap(), "1");
/// assert_eq!(chain_id_for_network("").unwrap(), "D");
/// assert!(chain_id_for_network("eip155:8453").is_err());
/// ```
pub fn chain_id_for_network(network: &str) -> Result<String> {
    let chain_id = match network {
        "" | "devnet" | "multiversx-devnet" => DEVNET_CHAIN_ID,
        "testnet" | "multiversx-testnet" => TESTNET_CHAIN_ID,
        "mainnet" | "multiversx-mainnet" => MAINNET_CHAIN_ID,
        other => match other
            .strip_prefix(NETWORK_NAMESPACE)
            .and_then(|rest| rest.strip_prefix(':'))
        {
            Some(reference) if !reference.is_empty() => reference,
            _ => return Err(X402Error::UnsupportedNetwork(network.to_string())),
        },
    };
    Ok(chain_id.to_string())
}

/// Formats a chain id as a CAIP-2 network identifier.
pub fn network_for_chain_id(chain_id: &str) -> String {
    format!("{}:{}", NETWORK_NAMESPACE, chain_id)
}

/// True if `network` names a MultiversX network in any accepted form.
pub fn is_multiversx_network(network: &str) -> bool {
    chain_id_for_network(network).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_decode_payment_header() {
        let payload = PaymentPayload {
            x402_version: 2,
            scheme: "exact".to_string(),
            network: "multiversx:D".to_string(),
            payload: json!({"scheme": "exact", "data": {"nonce": 1}}),
        };

        let encoded = encode_payment_header(&payload).unwrap();
        let decoded = decode_payment_header(&encoded).unwrap();

        assert_eq!(decoded.scheme, payload.scheme);
        assert_eq!(decoded.network, payload.network);
        assert_eq!(decoded.payload, payload.payload);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_payment_header("!!!"),
            Err(X402Error::Base64Error(_))
        ));
        let not_json = BASE64.encode(b"hello");
        assert!(matches!(
            decode_payment_header(&not_json),
            Err(X402Error::JsonError(_))
        ));
    }

    #[test]
    fn test_chain_id_for_network() {
        assert_eq!(chain_id_for_network("").unwrap(), "D");
        assert_eq!(chain_id_for_network("multiversx:D").unwrap(), "D");
        assert_eq!(chain_id_for_network("multiversx:T").unwrap(), "T");
        assert_eq!(chain_id_for_network("multiversx:1").unwrap(), "1");
        assert_eq!(chain_id_for_network("mainnet").unwrap(), "1");
        assert_eq!(chain_id_for_network("multiversx-mainnet").unwrap(), "1");
        assert_eq!(chain_id_for_network("devnet").unwrap(), "D");
        assert_eq!(chain_id_for_network("testnet").unwrap(), "T");
    }

    #[test]
    fn test_chain_id_rejects_foreign_networks() {
        for network in ["multiversx:", "multiversx", "eip155:8453", "solana", "multiversxD"] {
            assert!(
                matches!(
                    chain_id_for_network(network),
                    Err(X402Error::UnsupportedNetwork(_))
                ),
                "{network}"
            );
        }
    }

    #[test]
    fn test_network_for_chain_id() {
        assert_eq!(network_for_chain_id("1"), "multiversx:1");
        assert!(is_multiversx_network(&network_for_chain_id("D")));
    }
}
