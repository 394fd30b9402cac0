//! Error types for the x402-multiversx library.
//!
//! This module defines all error types that can occur while building, verifying
//! and settling MultiversX payments.

use crate::address::Bech32Error;
use crate::transfer::TransferError;
use thiserror::Error;

/// Boxed error returned by pluggable collaborators such as signers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for x402 operations.
#[derive(Error, Debug)]
pub enum X402Error {
    /// Error during HTTP request/response handling
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during Base64 encoding/decoding
    #[error("Base64 error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// Error parsing URL
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// The gateway node answered with an error or an unexpected body
    #[error("Gateway error: {0}")]
    GatewayError(String),

    /// Invalid Bech32 address (length, prefix or checksum)
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The multi-asset transfer string could not be decoded
    #[error("Malformed transfer: {0}")]
    MalformedTransfer(#[from] TransferError),

    /// The transaction data does not carry a verifiable ESDT transfer
    #[error("Invalid ESDT transfer data format: {0}")]
    InvalidTransferFormat(String),

    /// The payment requirements do not name a recipient
    #[error("PayTo is required for MultiversX payments")]
    MissingRecipient,

    /// The submitted transaction is not signed
    #[error("Missing signature")]
    MissingSignature,

    /// The transaction was signed for another chain than the requirements name
    #[error("Chain mismatch: expected chain ID {expected}, got {actual}")]
    ChainMismatch {
        /// Chain id resolved from the requirements' network
        expected: String,
        /// `chainID` of the signed transaction
        actual: String,
    },

    /// The node rejected the transaction or could not be reached
    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    /// Transaction receiver differs from the required recipient
    #[error("Receiver mismatch: expected {expected}, got {actual}")]
    ReceiverMismatch {
        /// Required recipient
        expected: String,
        /// Recipient found in the transaction
        actual: String,
    },

    /// Transferred token differs from the required asset
    #[error("Asset mismatch: expected {expected}, got {actual}")]
    AssetMismatch {
        /// Required asset
        expected: String,
        /// Asset found in the transaction
        actual: String,
    },

    /// Transferred amount is below the required amount
    #[error("Amount mismatch: expected at least {expected}, got {actual}")]
    AmountMismatch {
        /// Required amount in atomic units
        expected: String,
        /// Amount found in the transaction
        actual: String,
    },

    /// The signing capability reported a failure
    #[error("Signing failed: {0}")]
    SigningFailed(#[source] BoxError),

    /// Invalid payment payload
    #[error("Invalid payment payload: {0}")]
    InvalidPayload(String),

    /// Payment verification failed
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Payment settlement failed
    #[error("Settlement failed: {0}")]
    SettlementError(String),

    /// Unsupported payment scheme
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// Unsupported network
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No suitable payment requirement found
    #[error("No suitable payment requirement found")]
    NoSuitableRequirement,

    /// The response was not a 402 Payment Required
    #[error("Expected 402 Payment Required, got status: {0}")]
    Not402Response(u16),
}

/// Result type alias for x402 operations.
pub type Result<T> = std::result::Result<T, X402Error>;

impl From<Bech32Error> for X402Error {
    fn from(err: Bech32Error) -> Self {
        X402Error::InvalidAddress(err.to_string())
    }
}
