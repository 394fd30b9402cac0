//! # x402-multiversx
//!
//! The x402 "exact" payment scheme for the MultiversX blockchain.
//!
//! The x402 protocol revitalizes the HTTP 402 "Payment Required" status code to enable
//! instant payments for web resources like APIs, content, or files. This crate lets a
//! client pay such a request with EGLD or any ESDT token, and lets a facilitator check
//! and settle that payment on-chain.
//!
//! ## Features
//!
//! - **Client Support**: Automatic handling of 402 responses and payment generation
//! - **Server Support**: Payment requirements and facilitator hand-off for resource servers
//! - **Facilitator Support**: Verification by node simulation, settlement by broadcast
//! - **Native and ESDT payments**: EGLD through `value`, tokens through `MultiESDTNFTTransfer`
//! - **Pluggable collaborators**: signing, simulation and broadcasting are traits
//!
//! ## Quick Start
//!
//! ### Client Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use x402_multiversx::client::{X402ClientConfig, get};
//! use x402_multiversx::signer::Ed25519Signer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let signer = Ed25519Signer::from_secret_key_hex("YOUR_SECRET_KEY_HEX")?;
//! let config = X402ClientConfig::with_gateway(
//!     Arc::new(signer),
//!     "https://devnet-gateway.multiversx.com",
//! )?;
//!
//! let response = get(&config, "https://api.example.com/weather").await?;
//! println!("Response: {}", response.text().await?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Server Example
//!
//! ```rust,no_run
//! use x402_multiversx::server::PaymentConfig;
//!
//! let config = PaymentConfig::new(
//!     "erd1spyavw0956vq68xj8y4tenjpq2wd5a9p2c6j8gsz7ztyrnpxrruqzu66jx",
//!     "1000000",      // atomic units
//!     "multiversx:D", // devnet
//!     "https://facilitator.example.com",
//! )
//! .with_asset("USDC-c76f1f")
//! .with_description("API access fee");
//! ```
//!
//! ## Protocol Overview
//!
//! 1. **Client requests resource**: Standard HTTP request
//! 2. **Server responds with 402**: Returns payment requirements
//! 3. **Client signs a transaction**: A complete MultiversX transaction paying `payTo`
//! 4. **Client retries with payment**: Includes X-PAYMENT header
//! 5. **Facilitator verifies**: Simulates the transaction and checks receiver, asset and amount
//! 6. **Facilitator settles**: Broadcasts the signed transaction unchanged
//!
//! ## Networks
//!
//! Networks are named `multiversx:<chain id>`: `multiversx:1` (mainnet),
//! `multiversx:D` (devnet) and `multiversx:T` (testnet).
//!
//! ## Security
//!
//! - The facilitator never holds keys: it only relays what the payer signed
//! - The node's simulation is the signature and balance check
//! - Addresses are checksummed Bech32; a corrupted address never validates

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod address;
pub mod amount;
pub mod client;
pub mod errors;
pub mod facilitator;
pub mod gateway;
pub mod schemes;
pub mod server;
pub mod signer;
pub mod transfer;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use address::Address;
pub use errors::{Result, X402Error};
pub use signer::{Ed25519Signer, Signer};
pub use types::{
    Asset, ExactRelayedPayload, PaymentPayload, PaymentRequiredResponse, PaymentRequirements,
    SettlementRequest, SettlementResponse, SupportedKind, SupportedResponse, TransactionEnvelope,
    VerificationRequest, VerificationResponse, X402_VERSION,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_version_constant() {
        assert_eq!(X402_VERSION, 2);
    }

    #[test]
    fn test_module_accessibility() {
        let _ = client::X402ClientConfig::new(Arc::new(Ed25519Signer::generate()));
        let _ = server::PaymentConfig::new("erd1", "1", "multiversx:D", "http://facilitator");
        let _ = facilitator::FacilitatorConfig::new("http://gateway");
    }
}
