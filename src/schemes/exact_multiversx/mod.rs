//! The "exact" scheme on MultiversX.
//!
//! The payer signs a complete transaction and hands it over inside the
//! payment payload. EGLD moves through the transaction `value`; any other
//! asset moves through a self-addressed `MultiESDTNFTTransfer` call whose
//! first argument names the real recipient. The facilitator asks a gateway
//! node to simulate the transaction, cross-checks it against the
//! requirements and, on settlement, broadcasts it unchanged.

pub mod client;
pub mod facilitator;
pub mod server;

pub use client::{build_payment_transaction, ExactMultiversxClient};
pub use facilitator::{verify_payment, ExactMultiversxFacilitator, VerifiedPayment};
pub use server::{normalize_requirements, ExactMultiversxServer};

use crate::errors::{Result, X402Error};
use crate::types::{ExactRelayedPayload, PaymentPayload};

/// Gas limit of a plain EGLD transfer.
pub const NATIVE_TRANSFER_GAS_LIMIT: u64 = 50_000;

/// Gas limit of a `MultiESDTNFTTransfer` call.
pub const ESDT_TRANSFER_GAS_LIMIT: u64 = 60_000_000;

/// Minimum gas price on public networks.
pub const DEFAULT_GAS_PRICE: u64 = 1_000_000_000;

/// Transaction version produced by the builder.
pub const TRANSACTION_VERSION: u32 = 1;

/// Extracts the signed transaction from a payment payload.
pub fn relayed_payload(payload: &PaymentPayload) -> Result<ExactRelayedPayload> {
    serde_json::from_value(payload.payload.clone())
        .map_err(|e| X402Error::InvalidPayload(format!("Not an exact MultiversX payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relayed_payload_extraction() {
        let payload = PaymentPayload {
            x402_version: 2,
            scheme: "exact".to_string(),
            network: "multiversx:D".to_string(),
            payload: json!({
                "scheme": "exact",
                "data": {"nonce": 5, "value": "1", "receiver": "erd1r", "sender": "erd1s",
                         "gasPrice": 1, "gasLimit": 2, "chainID": "D", "version": 1,
                         "signature": "00"}
            }),
        };
        let relayed = relayed_payload(&payload).unwrap();
        assert_eq!(relayed.data.nonce, 5);
        assert_eq!(relayed.data.data, "");
        assert!(relayed.data.is_signed());

        let bad = PaymentPayload {
            payload: json!({"authorization": {}}),
            ..payload
        };
        assert!(matches!(
            relayed_payload(&bad),
            Err(X402Error::InvalidPayload(_))
        ));
    }
}
