//! Client role: builds and signs the payment transaction.

use super::{
    DEFAULT_GAS_PRICE, ESDT_TRANSFER_GAS_LIMIT, NATIVE_TRANSFER_GAS_LIMIT, TRANSACTION_VERSION,
};
use crate::address::Address;
use crate::amount::parse_amount;
use crate::errors::{Result, X402Error};
use crate::gateway::NonceProvider;
use crate::schemes::SchemeClient;
use crate::signer::Signer;
use crate::transfer::{TokenTransfer, TransferInstruction};
use crate::types::{
    Asset, ExactRelayedPayload, PaymentPayload, PaymentRequirements, TransactionEnvelope,
    SCHEME_EXACT, X402_VERSION,
};
use crate::utils::chain_id_for_network;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Builds and signs the transaction that pays `requirements`.
///
/// EGLD payments go straight to `payTo` through `value`. Token payments are
/// addressed to the signer itself with `value = 0` and a
/// `MultiESDTNFTTransfer` call carrying the recipient, token, amount and the
/// optional `extra.resourceId` reference.
///
/// Signer failures are returned as [`X402Error::SigningFailed`] carrying the
/// signer's own error.
pub async fn build_payment_transaction(
    requirements: &PaymentRequirements,
    signer: &dyn Signer,
    nonce: u64,
) -> Result<TransactionEnvelope> {
    if requirements.pay_to.is_empty() {
        return Err(X402Error::MissingRecipient);
    }

    let chain_id = chain_id_for_network(&requirements.network)?;
    let amount = parse_amount(&requirements.amount)?;
    let sender = signer.address().to_string();

    let mut tx = TransactionEnvelope {
        nonce,
        sender: sender.clone(),
        gas_price: DEFAULT_GAS_PRICE,
        chain_id,
        version: TRANSACTION_VERSION,
        ..Default::default()
    };

    match Asset::classify(&requirements.asset) {
        Asset::Native => {
            tx.receiver = requirements.pay_to.clone();
            tx.value = amount.to_string();
            tx.gas_limit = NATIVE_TRANSFER_GAS_LIMIT;
        }
        Asset::Token(token) => {
            let destination: Address = requirements.pay_to.parse()?;
            let mut instruction = TransferInstruction::single(
                destination.as_bytes().to_vec(),
                TokenTransfer::fungible(token, amount),
            );
            if let Some(reference) = requirements.resource_id() {
                instruction = instruction.with_reference(reference.as_bytes());
            }
            tx.receiver = sender;
            tx.value = "0".to_string();
            tx.gas_limit = ESDT_TRANSFER_GAS_LIMIT;
            tx.data = instruction.encode();
        }
    }

    let message = tx.signing_bytes()?;
    let signature = signer
        .sign(&message)
        .await
        .map_err(X402Error::SigningFailed)?;
    debug!(
        sender = %tx.sender,
        receiver = %tx.receiver,
        nonce = tx.nonce,
        "signed payment transaction"
    );

    Ok(tx.with_signature(&signature))
}

/// Client half of the exact scheme.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use x402_multiversx::schemes::exact_multiversx::ExactMultiversxClient;
/// use x402_multiversx::signer::Ed25519Signer;
///
/// let client = ExactMultiversxClient::new(Arc::new(Ed25519Signer::generate()));
/// ```
#[derive(Clone)]
pub struct ExactMultiversxClient {
    signer: Arc<dyn Signer>,
    nonces: Option<Arc<dyn NonceProvider>>,
}

impl ExactMultiversxClient {
    /// Creates a client signing with `signer`. Transactions use nonce 0
    /// unless a nonce provider is attached.
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self {
            signer,
            nonces: None,
        }
    }

    /// Looks up the sender nonce through `nonces` before every payment.
    pub fn with_nonce_provider(mut self, nonces: Arc<dyn NonceProvider>) -> Self {
        self.nonces = Some(nonces);
        self
    }

    /// Address payments are sent from.
    pub fn address(&self) -> &str {
        self.signer.address()
    }
}

#[async_trait]
impl SchemeClient for ExactMultiversxClient {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    async fn create_payment_payload(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload> {
        let nonce = match &self.nonces {
            Some(nonces) => nonces.nonce(self.signer.address()).await?,
            None => 0,
        };
        let tx = build_payment_transaction(requirements, self.signer.as_ref(), nonce).await?;
        let relayed = ExactRelayedPayload {
            scheme: SCHEME_EXACT.to_string(),
            data: tx,
        };

        Ok(PaymentPayload {
            x402_version: X402_VERSION,
            scheme: SCHEME_EXACT.to_string(),
            network: requirements.network.clone(),
            payload: serde_json::to_value(relayed)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BoxError;
    use crate::signer::Ed25519Signer;
    use crate::transfer::MULTI_ESDT_NFT_TRANSFER;
    use serde_json::{json, Map};
    use std::sync::Mutex;

    const RECIPIENT: &str = "erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx";
    const RECIPIENT_HEX: &str = "8049d639e5a6980d1cd2392abcce41029cda74a1563523a202f09641cc2618f8";
    const SIGNER_ADDRESS: &str = "erd1qyu5wthldzr8wx5c9ucg8kjagg0jfs53s8nr3zpz3hypefsdd8ssycr6th";

    /// Records what it was asked to sign and returns a fixed signature.
    struct RecordingSigner {
        seen: Mutex<Vec<Vec<u8>>>,
    }

    impl RecordingSigner {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Signer for RecordingSigner {
        fn address(&self) -> &str {
            SIGNER_ADDRESS
        }

        async fn sign(&self, message: &[u8]) -> std::result::Result<Vec<u8>, BoxError> {
            self.seen.lock().unwrap().push(message.to_vec());
            Ok(vec![0xaa; 64])
        }
    }

    struct FailingSigner;

    #[async_trait]
    impl Signer for FailingSigner {
        fn address(&self) -> &str {
            SIGNER_ADDRESS
        }

        async fn sign(&self, _message: &[u8]) -> std::result::Result<Vec<u8>, BoxError> {
            Err("hardware wallet disconnected".into())
        }
    }

    struct FixedNonce(u64);

    #[async_trait]
    impl NonceProvider for FixedNonce {
        async fn nonce(&self, _address: &str) -> Result<u64> {
            Ok(self.0)
        }
    }

    fn requirements(asset: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: "multiversx:D".to_string(),
            amount: "100".to_string(),
            asset: asset.to_string(),
            pay_to: RECIPIENT.to_string(),
            max_timeout_seconds: 60,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_native_transfer() {
        let signer = RecordingSigner::new();
        let tx = build_payment_transaction(&requirements(""), &signer, 9)
            .await
            .unwrap();

        assert_eq!(tx.value, "100");
        assert_eq!(tx.data, "");
        assert_eq!(tx.receiver, RECIPIENT);
        assert_eq!(tx.sender, SIGNER_ADDRESS);
        assert_eq!(tx.nonce, 9);
        assert_eq!(tx.chain_id, "D");
        assert_eq!(tx.gas_limit, NATIVE_TRANSFER_GAS_LIMIT);
        assert_eq!(tx.signature.as_deref(), Some("aa".repeat(64).as_str()));

        let seen = signer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], tx.signing_bytes().unwrap());
    }

    #[tokio::test]
    async fn test_egld_literal_is_native() {
        let tx = build_payment_transaction(&requirements("EGLD"), &RecordingSigner::new(), 0)
            .await
            .unwrap();
        assert_eq!(tx.receiver, RECIPIENT);
        assert_eq!(tx.data, "");
    }

    #[tokio::test]
    async fn test_token_transfer() {
        let tx = build_payment_transaction(&requirements("TEST-123456"), &RecordingSigner::new(), 0)
            .await
            .unwrap();

        assert_eq!(tx.value, "0");
        assert_eq!(tx.receiver, SIGNER_ADDRESS);
        assert_eq!(tx.gas_limit, ESDT_TRANSFER_GAS_LIMIT);
        assert!(tx.data.starts_with(MULTI_ESDT_NFT_TRANSFER));
        assert!(tx.data.contains(&hex::encode("TEST-123456")));
        assert_eq!(
            tx.data,
            format!("MultiESDTNFTTransfer@{RECIPIENT_HEX}@01@544553542d313233343536@00@64")
        );
    }

    #[tokio::test]
    async fn test_fully_qualified_egld_goes_through_token_path() {
        let tx = build_payment_transaction(&requirements("EGLD-000000"), &RecordingSigner::new(), 0)
            .await
            .unwrap();
        assert_eq!(tx.value, "0");
        assert!(tx.data.contains(&hex::encode("EGLD-000000")));
    }

    #[tokio::test]
    async fn test_resource_id_reference() {
        let mut req = requirements("TEST-123456");
        let mut extra = Map::new();
        extra.insert("resourceId".to_string(), json!("inv_123"));
        req.extra = extra;

        let tx = build_payment_transaction(&req, &RecordingSigner::new(), 0)
            .await
            .unwrap();
        let instruction = TransferInstruction::decode(&tx.data).unwrap();
        assert_eq!(instruction.reference.as_deref(), Some(&b"inv_123"[..]));
    }

    #[tokio::test]
    async fn test_missing_recipient() {
        let mut req = requirements("");
        req.pay_to.clear();
        let signer = RecordingSigner::new();
        let err = build_payment_transaction(&req, &signer, 0).await.unwrap_err();
        assert!(matches!(err, X402Error::MissingRecipient));
        assert!(signer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_inputs() {
        let mut req = requirements("TEST-123456");
        req.pay_to = "erd1invalid".to_string();
        let err = build_payment_transaction(&req, &RecordingSigner::new(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, X402Error::InvalidAddress(_)));

        let mut req = requirements("");
        req.amount = "1.5".to_string();
        let err = build_payment_transaction(&req, &RecordingSigner::new(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, X402Error::InvalidAmount(_)));

        let mut req = requirements("");
        req.network = "eip155:8453".to_string();
        let err = build_payment_transaction(&req, &RecordingSigner::new(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, X402Error::UnsupportedNetwork(_)));
    }

    #[tokio::test]
    async fn test_signer_error_propagates() {
        let err = build_payment_transaction(&requirements(""), &FailingSigner, 0)
            .await
            .unwrap_err();
        match err {
            X402Error::SigningFailed(source) => {
                assert_eq!(source.to_string(), "hardware wallet disconnected")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chain_id_defaults_to_devnet() {
        let mut req = requirements("");
        req.network.clear();
        let tx = build_payment_transaction(&req, &RecordingSigner::new(), 0)
            .await
            .unwrap();
        assert_eq!(tx.chain_id, "D");
    }

    #[tokio::test]
    async fn test_create_payment_payload() {
        let client = ExactMultiversxClient::new(Arc::new(Ed25519Signer::from_bytes(&[3u8; 32])))
            .with_nonce_provider(Arc::new(FixedNonce(12)));
        let payload = client
            .create_payment_payload(&requirements(""))
            .await
            .unwrap();

        assert_eq!(payload.x402_version, 2);
        assert_eq!(payload.scheme, "exact");
        assert_eq!(payload.network, "multiversx:D");
        assert_eq!(payload.payload["scheme"], "exact");
        assert_eq!(payload.payload["data"]["nonce"], 12);
        assert_eq!(payload.payload["data"]["sender"], client.address());
        assert_eq!(
            payload.payload["data"]["signature"].as_str().unwrap().len(),
            128
        );
    }

    #[tokio::test]
    async fn test_nonce_defaults_to_zero() {
        let client = ExactMultiversxClient::new(Arc::new(Ed25519Signer::from_bytes(&[3u8; 32])));
        let payload = client
            .create_payment_payload(&requirements(""))
            .await
            .unwrap();
        assert_eq!(payload.payload["data"]["nonce"], 0);
    }
}
