//! Core type definitions for the x402 protocol on MultiversX.
//!
//! This module contains the protocol containers (payment requirements,
//! payloads, verification and settlement messages) and the MultiversX
//! transaction envelope carried inside an "exact" payment payload.

use crate::errors::Result;
use crate::transfer::TransferInstruction;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Version of the x402 protocol.
pub const X402_VERSION: u32 = 2;

/// Name of the exact payment scheme.
pub const SCHEME_EXACT: &str = "exact";

/// Network namespace used in CAIP-2 style identifiers (`multiversx:1`).
pub const NETWORK_NAMESPACE: &str = "multiversx";

/// Identifier of the native asset.
pub const NATIVE_ASSET: &str = "EGLD";

/// Key in [`PaymentRequirements::extra`] whose value is carried as the
/// trailing reference argument of ESDT transfers.
pub const RESOURCE_ID_KEY: &str = "resourceId";

/// Response returned by a server when payment is required (HTTP 402).
///
/// # Examples
///
/// ```
/// use x402_multiversx::types::PaymentRequiredResponse;
///
/// let response = PaymentRequiredResponse {
///     x402_version: 2,
///     accepts: vec![],
///     error: None,
/// };
/// ```
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PaymentRequiredResponse {
    /// Protocol version
    #[serde(rename = "x402Version")]
    pub x402_version: u32,

    /// List of accepted payment requirements
    pub accepts: Vec<PaymentRequirements>,

    /// Optional error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Describes what a resource server wants to be paid.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PaymentRequirements {
    /// Payment scheme (`"exact"`)
    pub scheme: String,

    /// Network identifier, e.g. `"multiversx:D"`
    pub network: String,

    /// Amount in atomic units as a base-10 string
    pub amount: String,

    /// `"EGLD"` (or empty) for the native asset, otherwise an ESDT identifier
    #[serde(default)]
    pub asset: String,

    /// Recipient `erd1…` address
    #[serde(rename = "payTo")]
    pub pay_to: String,

    /// Maximum time in seconds that the payment is valid
    #[serde(rename = "maxTimeoutSeconds", default)]
    pub max_timeout_seconds: u64,

    /// Human-readable description of what the payment is for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Scheme-specific extra data
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl PaymentRequirements {
    /// The non-empty string stored under `extra.resourceId`, if any.
    pub fn resource_id(&self) -> Option<&str> {
        self.extra
            .get(RESOURCE_ID_KEY)
            .and_then(Value::as_str)
            .filter(|rid| !rid.is_empty())
    }
}

/// Which asset a payment moves.
///
/// Only the empty string and the exact `"EGLD"` literal are native. Any other
/// identifier, including `"EGLD-000000"`, is a token and travels through
/// `MultiESDTNFTTransfer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Asset {
    /// EGLD sent through the transaction `value`
    Native,
    /// An ESDT identified by its token identifier
    Token(String),
}

impl Asset {
    /// Classifies the asset field of a payment requirement.
    pub fn classify(asset: &str) -> Self {
        if asset.is_empty() || asset == NATIVE_ASSET {
            Asset::Native
        } else {
            Asset::Token(asset.to_string())
        }
    }

    /// Identifier to advertise for this asset.
    pub fn identifier(&self) -> &str {
        match self {
            Asset::Native => NATIVE_ASSET,
            Asset::Token(id) => id,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// A price expressed as an amount of a given asset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetAmount {
    /// Asset identifier
    #[serde(default)]
    pub asset: String,
    /// Amount in atomic units
    pub amount: String,
}

/// Payment payload sent by the client in the X-PAYMENT header.
///
/// # Examples
///
/// ```
/// use x402_multiversx::types::PaymentPayload;
/// use serde_json::json;
///
/// let payload = PaymentPayload {
///     x402_version: 2,
///     scheme: "exact".to_string(),
///     network: "multiversx:D".to_string(),
///     payload: json!({"scheme": "exact", "data": {}}),
/// };
/// ```
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PaymentPayload {
    /// Protocol version
    #[serde(rename = "x402Version")]
    pub x402_version: u32,

    /// Payment scheme used
    #[serde(default)]
    pub scheme: String,

    /// Network identifier
    #[serde(default)]
    pub network: String,

    /// Scheme-specific payload data
    pub payload: Value,
}

/// Scheme payload of an exact MultiversX payment: the signed transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExactRelayedPayload {
    /// Scheme name
    #[serde(default)]
    pub scheme: String,
    /// The signed transaction
    pub data: TransactionEnvelope,
}

/// A MultiversX transaction as signed by the payer.
///
/// The signature covers [`TransactionEnvelope::signing_bytes`], i.e. every
/// field except `signature` itself. Once `signature` is set the envelope is
/// treated as frozen.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionEnvelope {
    /// Sender account nonce
    #[serde(default)]
    pub nonce: u64,

    /// EGLD amount in atomic units
    #[serde(default)]
    pub value: String,

    /// Receiver `erd1…` address
    #[serde(default)]
    pub receiver: String,

    /// Sender `erd1…` address
    #[serde(default)]
    pub sender: String,

    /// Gas price
    #[serde(rename = "gasPrice", default)]
    pub gas_price: u64,

    /// Gas limit
    #[serde(rename = "gasLimit", default)]
    pub gas_limit: u64,

    /// Plain-text call data; empty for EGLD transfers
    #[serde(default)]
    pub data: String,

    /// Chain identifier (`1`, `D`, `T`)
    #[serde(rename = "chainID", default)]
    pub chain_id: String,

    /// Transaction version
    #[serde(default)]
    pub version: u32,

    /// Transaction options bit field
    #[serde(default, skip_serializing_if = "is_zero")]
    pub options: u32,

    /// Hex-encoded ed25519 signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// Field order and encoding of the node's signable transaction form.
#[derive(Serialize)]
struct SignableTransaction<'a> {
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
}

impl TransactionEnvelope {
    /// Serializes the unsigned fields the way the node hashes them for
    /// signature checks: compact JSON in protocol order, with `data`
    /// base64-encoded and omitted when empty.
    pub fn signing_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&SignableTransaction {
            nonce: self.nonce,
            value: &self.value,
            receiver: &self.receiver,
            sender: &self.sender,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            data: self.encoded_data(),
            chain_id: &self.chain_id,
            version: self.version,
            options: self.options,
        })
    }

    /// The `data` field as the node expects it on the wire.
    pub fn encoded_data(&self) -> Option<String> {
        (!self.data.is_empty()).then(|| BASE64.encode(self.data.as_bytes()))
    }

    /// Returns the envelope with the given signature attached.
    pub fn with_signature(mut self, signature: &[u8]) -> Self {
        self.signature = Some(hex::encode(signature));
        self
    }

    /// True if a non-empty signature is attached.
    pub fn is_signed(&self) -> bool {
        self.signature.as_deref().is_some_and(|sig| !sig.is_empty())
    }

    /// Parses `data` as a `MultiESDTNFTTransfer` call.
    pub fn transfer_instruction(&self) -> Result<TransferInstruction> {
        Ok(TransferInstruction::decode(&self.data)?)
    }
}

/// Request to verify a payment without settling it on-chain.
///
/// Accepts both the protocol field names and the shorter `payload` /
/// `requirements` pair.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerificationRequest {
    /// The payment payload submitted by the client
    #[serde(rename = "paymentPayload", alias = "payload")]
    pub payment_payload: PaymentPayload,

    /// The payment requirements that the server expects
    #[serde(rename = "paymentRequirements", alias = "requirements")]
    pub payment_requirements: PaymentRequirements,
}

/// Request to settle a payment on-chain. Same shape as a verification request.
pub type SettlementRequest = VerificationRequest;

/// Response from the facilitator's `/verify` endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VerificationResponse {
    /// Whether the payment payload is valid
    #[serde(rename = "isValid")]
    pub is_valid: bool,

    /// Reason if invalid
    #[serde(rename = "invalidReason", skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,

    /// Sender address as stated by the signed transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl VerificationResponse {
    /// A positive verdict for `payer`.
    pub fn valid(payer: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
            payer: Some(payer.into()),
        }
    }

    /// A negative verdict with a human-readable reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason.into()),
            payer: None,
        }
    }
}

/// Response from the facilitator's `/settle` endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SettlementResponse {
    /// Whether the transaction was accepted by the node
    pub success: bool,

    /// Transaction hash of the settlement
    #[serde(default)]
    pub transaction: String,

    /// Network the transaction was sent to
    #[serde(default)]
    pub network: String,

    /// Sender address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,

    /// Error message if settlement failed
    #[serde(rename = "errorReason", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SettlementResponse {
    /// A failed settlement.
    pub fn failed(network: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction: String::new(),
            network: network.into(),
            payer: None,
            error: Some(reason.into()),
        }
    }
}

/// A supported payment kind (scheme + network combination).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SupportedKind {
    /// Protocol version
    #[serde(rename = "x402Version")]
    pub x402_version: u32,

    /// Payment scheme
    pub scheme: String,

    /// Network identifier
    pub network: String,
}

/// Response from the facilitator's `/supported` endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SupportedResponse {
    /// List of supported payment kinds
    pub kinds: Vec<SupportedKind>,
}
